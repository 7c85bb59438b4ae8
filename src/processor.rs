//! Natural language to SQL processing.
//!
//! Introspects the schema, asks the model for SQL, checks it against the
//! read-only guard and executes it. Every step's failure propagates; the
//! caller decides what the user sees.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ChatbotError;
use crate::executor::{QueryExecutor, QueryResult};
use crate::formatter::format_query_result;
use crate::generator::QueryGenerator;
use crate::schema::{Schema, SchemaIntrospector};
use crate::validator::SqlValidator;

/// Body of `POST /query`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct QueryRequest {
    pub question: Option<String>,
}

impl QueryRequest {
    /// # Errors
    ///
    /// Returns `ChatbotError::Input` for a missing or whitespace-only question.
    pub fn question(&self) -> Result<&str, ChatbotError> {
        match self.question.as_deref() {
            Some(q) if !q.trim().is_empty() => Ok(q.trim()),
            _ => Err(ChatbotError::input("Please provide a question.")),
        }
    }
}

/// Generated SQL together with what it returned.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct QueryResponse {
    pub sql_query: String,
    #[serde(flatten)]
    pub result: QueryResult,
    pub reply: String,
}

impl QueryResponse {
    #[must_use]
    pub fn new(
        sql_query: String,
        result: QueryResult,
    ) -> Self {
        let reply = format!("Here's what I found:\n{}", format_query_result(&result));
        Self {
            sql_query,
            result,
            reply,
        }
    }
}

pub struct SqlPipeline {
    introspector: Arc<dyn SchemaIntrospector>,
    generator: QueryGenerator,
    executor: Arc<dyn QueryExecutor>,
    read_only: bool,
}

impl SqlPipeline {
    #[must_use]
    pub fn new(
        introspector: Arc<dyn SchemaIntrospector>,
        generator: QueryGenerator,
        executor: Arc<dyn QueryExecutor>,
        read_only: bool,
    ) -> Self {
        Self {
            introspector,
            generator,
            executor,
            read_only,
        }
    }

    /// # Errors
    ///
    /// Returns `ChatbotError::Connection` or `ChatbotError::Execution` if the catalog cannot be read.
    pub async fn describe_schema(&self) -> Result<Schema, ChatbotError> {
        self.introspector.describe_schema().await
    }

    /// # Errors
    ///
    /// Returns `ChatbotError::Completion` if the model call fails.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema: &Schema,
    ) -> Result<String, ChatbotError> {
        self.generator.generate_sql(question, schema).await
    }

    /// Applies the read-only guard when it is enabled.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Rejected` naming the first violation.
    pub fn check_sql(
        &self,
        sql: &str,
    ) -> Result<(), ChatbotError> {
        if !self.read_only {
            return Ok(());
        }

        let validation = SqlValidator::validate_read_only(sql);
        for warning in &validation.warnings {
            tracing::debug!("SQL warning: {}", warning);
        }

        if validation.is_valid {
            Ok(())
        } else {
            tracing::warn!("Rejected generated SQL {:?}: {:?}", sql, validation.errors);
            Err(ChatbotError::rejected(validation.errors.join("; ")))
        }
    }

    /// # Errors
    ///
    /// Returns the executor's error unchanged.
    pub async fn execute_sql(
        &self,
        sql: &str,
    ) -> Result<QueryResult, ChatbotError> {
        self.executor.execute(sql).await
    }

    /// Runs the whole question-to-rows path.
    ///
    /// # Errors
    ///
    /// Returns the first failure among introspection, generation, the
    /// read-only guard and execution.
    pub async fn answer(
        &self,
        question: &str,
    ) -> Result<QueryResponse, ChatbotError> {
        if question.trim().is_empty() {
            return Err(ChatbotError::input("Please provide a question."));
        }

        let schema = self.describe_schema().await?;
        let sql = self.generate_sql(question, &schema).await?;
        self.check_sql(&sql)?;
        let result = self.execute_sql(&sql).await?;

        Ok(QueryResponse::new(sql, result))
    }
}
