//! # sql-chatbot
//!
//! A conversational interface over a Postgres database.
//!
//! Messages are routed by keyword to one of a few intent handlers (dietary
//! facts, stock levels, item requests) backed by the product catalog, with a
//! language model answering everything else. A second path turns free-form
//! questions into SQL against the live schema and executes it.
//!
//! ## Features
//!
//! - **Intent Routing**: Priority-ordered keyword rules pick exactly one handler per message
//! - **Text to SQL**: Schema introspection plus AI-generated SQL, executed and formatted
//! - **Read-Only Guard**: Generated SQL is validated and run in a read-only transaction by default
//! - **Streaming Progress**: Schema, SQL and rows reported step by step over SSE
//! - **Flexible AI Integration**: Support for multiple AI providers through the genai crate
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! sql-chatbot = { version = "0.1", default-features = false }
//! ```
//!
//! ### Basic Example
//!
//! ```rust,no_run
//! use sql_chatbot::{Config, SqlChatbot};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let config = Config::from_env()?;
//!     let chatbot = SqlChatbot::from_config(&config)?;
//!
//!     // Keyword-routed chat
//!     let reply = chatbot.chat("is quinoa vegan?").await?;
//!     println!("{reply}");
//!
//!     // Natural language to SQL
//!     let answer = chatbot.ask("which products are out of stock?").await?;
//!     println!("Generated query: {}", answer.sql_query);
//!     println!("{}", answer.reply);
//!
//!     Ok(())
//! }
//! ```
//!
//! ### Assembling Components Directly
//!
//! Every collaborator sits behind a trait ([`ProductCatalog`],
//! [`Completion`], [`SchemaIntrospector`], [`QueryExecutor`]), so the router
//! and the pipeline can be built from any implementation:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use sql_chatbot::{Config, GenAiCompletion, IntentRouter, PgConnectionProvider, PgProductCatalog};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let config = Config::from_env()?;
//! let provider = Arc::new(PgConnectionProvider::from_config(&config.database)?);
//! let catalog = Arc::new(PgProductCatalog::new(provider, "products", "requests"));
//! let completion = Arc::new(GenAiCompletion::new("gpt-4o-mini", None, Duration::from_secs(60)));
//!
//! let router = IntentRouter::new(catalog, completion);
//! println!("{}", router.route("do you have oat milk in stock?").await);
//! # Ok(())
//! # }
//! ```
//!
//! ## Server Mode
//!
//! The `server` feature (enabled by default) adds the actix-web service:
//!
//! ```bash
//! cargo run
//! ```

// Core modules - always available
pub mod chat;
pub mod completion;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod formatter;
pub mod generator;
pub mod handlers;
pub mod intent;
pub mod processor;
pub mod router;
pub mod schema;
pub mod template;
pub mod validator;

// Server-specific modules - only when server feature is enabled
#[cfg(feature = "server")]
pub mod server;
#[cfg(feature = "server")]
pub mod streaming;

#[cfg(test)]
mod testing;

use std::sync::Arc;

// Re-export commonly used types for easier access
pub use chat::{ChatMessage, ChatReply, ChatRequest, ChatRole};
pub use completion::{Completion, CompletionOptions, GenAiCompletion};
pub use config::Config;
pub use db::PgConnectionProvider;
pub use error::{ChatbotError, ErrorResponse};
pub use executor::{PgQueryExecutor, QueryExecutor, QueryResult};
pub use generator::QueryGenerator;
pub use handlers::{PgProductCatalog, ProductCatalog};
pub use intent::Intent;
pub use processor::{QueryRequest, QueryResponse, SqlPipeline};
pub use router::IntentRouter;
pub use schema::{PgSchemaIntrospector, Schema, SchemaIntrospector};

/// A fully wired chatbot: one connection pool shared by the intent router
/// and the SQL pipeline, one model client shared by both.
///
/// Nothing connects until the first call that needs the database.
pub struct SqlChatbot {
    provider: Arc<PgConnectionProvider>,
    router: Arc<IntentRouter>,
    pipeline: Arc<SqlPipeline>,
}

impl SqlChatbot {
    /// Builds every component from `config`.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if the database parameters are invalid.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sql_chatbot::{Config, SqlChatbot};
    ///
    /// # fn main() -> Result<(), sql_chatbot::ChatbotError> {
    /// let chatbot = SqlChatbot::from_config(&Config::from_env()?)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn from_config(config: &Config) -> Result<Self, ChatbotError> {
        let provider = Arc::new(PgConnectionProvider::from_config(&config.database)?);
        let completion: Arc<dyn Completion> = Arc::new(GenAiCompletion::new(
            config.llm.model.clone(),
            config.llm.key.as_deref(),
            config.llm.timeout,
        ));

        let catalog = Arc::new(PgProductCatalog::new(
            Arc::clone(&provider),
            &config.products_table,
            &config.requests_table,
        ));
        let router = Arc::new(IntentRouter::new(catalog, Arc::clone(&completion)));

        let pipeline = Arc::new(SqlPipeline::new(
            Arc::new(PgSchemaIntrospector::new(Arc::clone(&provider))),
            QueryGenerator::new(completion),
            Arc::new(PgQueryExecutor::new(Arc::clone(&provider), config.sql_read_only)),
            config.sql_read_only,
        ));

        tracing::info!(
            "Chatbot ready (model: {}, read-only SQL: {})",
            config.llm.model,
            config.sql_read_only
        );

        Ok(Self {
            provider,
            router,
            pipeline,
        })
    }

    #[must_use]
    pub fn router(&self) -> Arc<IntentRouter> {
        Arc::clone(&self.router)
    }

    #[must_use]
    pub fn pipeline(&self) -> Arc<SqlPipeline> {
        Arc::clone(&self.pipeline)
    }

    /// Replies to a chat message through the intent router.
    ///
    /// Handler failures come back as apologies, not errors.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Input` if `message` is empty or whitespace.
    pub async fn chat(
        &self,
        message: &str,
    ) -> Result<String, ChatbotError> {
        if message.trim().is_empty() {
            return Err(ChatbotError::input("Please provide a message."));
        }
        Ok(self.router.route(message).await)
    }

    /// Answers a question by generating and executing SQL.
    ///
    /// # Errors
    ///
    /// Returns the first failure among introspection, generation, the
    /// read-only guard and execution.
    pub async fn ask(
        &self,
        question: &str,
    ) -> Result<QueryResponse, ChatbotError> {
        self.pipeline.answer(question).await
    }

    /// # Errors
    ///
    /// Returns `ChatbotError::Connection` or `ChatbotError::Execution` if the catalog cannot be read.
    pub async fn describe_schema(&self) -> Result<Schema, ChatbotError> {
        self.pipeline.describe_schema().await
    }

    /// Closes the connection pool, if one was opened.
    pub async fn close(&self) {
        self.provider.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_lookup(|key| match key {
            "DEFAULT_KEY" => Some("test-key".to_string()),
            "DB_PORT" => Some("1".to_string()),
            "DB_HOST" => Some("127.0.0.1".to_string()),
            "DB_TIMEOUT_SECS" => Some("2".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn test_from_config_does_not_connect() {
        assert!(SqlChatbot::from_config(&config()).is_ok());
    }

    #[tokio::test]
    async fn test_chat_rejects_blank_message() {
        let chatbot = SqlChatbot::from_config(&config()).unwrap();

        let result = chatbot.chat("   ").await;
        assert_eq!(result.unwrap_err(), ChatbotError::input("Please provide a message."));
    }

    #[tokio::test]
    async fn test_catalog_outage_becomes_apology() {
        let chatbot = SqlChatbot::from_config(&config()).unwrap();

        let reply = chatbot.chat("is quinoa in stock?").await.unwrap();
        assert_eq!(reply, Intent::StockCheck.apology());
    }

    #[tokio::test]
    async fn test_ask_surfaces_connection_error() {
        let chatbot = SqlChatbot::from_config(&config()).unwrap();

        let result = chatbot.ask("how many products are there?").await;
        assert!(matches!(result, Err(ChatbotError::Connection(_))));
        chatbot.close().await;
    }
}
