//! Streaming progress for the question-to-SQL path.
//!
//! Emits one [`Progress`] event per step so a client can render the schema,
//! the generated SQL and the rows as they become available.

use std::pin::Pin;
use std::sync::Arc;

use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::error::ChatbotError;
use crate::executor::QueryResult;
use crate::formatter::format_query_result;
use crate::processor::SqlPipeline;

/// Type alias for the stream returned by [`process_question_stream`]
pub type ProgressStream = Pin<Box<dyn Stream<Item = Progress> + Send>>;

/// Progress update events
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub enum Progress {
    Status(String),
    Schema(String),
    SqlQuery(String),
    SqlResult(QueryResult),
    Reply(String),
    Error(String),
}

impl Progress {
    /// JSON payload for one SSE `data:` line.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| serde_json::json!({ "Error": e.to_string() }).to_string())
    }
}

// Streamed errors get the same treatment as HTTP errors: no internals.
fn failure(
    step: &str,
    err: &ChatbotError,
) -> Progress {
    tracing::error!("{} failed: {}", step, err);
    match err {
        ChatbotError::Input(msg) | ChatbotError::Rejected(msg) => Progress::Error(format!("{step} failed: {msg}")),
        _ => Progress::Error(format!("{step} failed. Please try again later.")),
    }
}

/// Runs the question through the pipeline, yielding progress as it goes.
///
/// The stream always ends with either [`Progress::Reply`] or
/// [`Progress::Error`].
///
/// The stream is polled after the caller returns, so the span current at the
/// call is captured here and every step runs inside it.
#[must_use]
pub fn process_question_stream(
    pipeline: Arc<SqlPipeline>,
    question: String,
) -> ProgressStream {
    let span = tracing::Span::current();

    let events = async_stream::stream! {
        if question.trim().is_empty() {
            yield span.in_scope(|| failure("Input", &ChatbotError::input("Please provide a question.")));
            return;
        }

        yield Progress::Status("Reading database schema...".to_string());
        let schema = match pipeline.describe_schema().instrument(span.clone()).await {
            Ok(schema) => {
                yield Progress::Schema(schema.to_string());
                schema
            }
            Err(e) => {
                yield span.in_scope(|| failure("Schema discovery", &e));
                return;
            }
        };

        yield Progress::Status("Generating SQL query...".to_string());
        let sql = match pipeline.generate_sql(&question, &schema).instrument(span.clone()).await {
            Ok(sql) => {
                yield Progress::SqlQuery(sql.clone());
                sql
            }
            Err(e) => {
                yield span.in_scope(|| failure("Query generation", &e));
                return;
            }
        };

        if let Err(e) = span.in_scope(|| pipeline.check_sql(&sql)) {
            yield span.in_scope(|| failure("Query validation", &e));
            return;
        }

        yield Progress::Status("Executing SQL query...".to_string());
        match pipeline.execute_sql(&sql).instrument(span.clone()).await {
            Ok(result) => {
                let reply = format!("Here's what I found:\n{}", format_query_result(&result));
                yield Progress::SqlResult(result);
                yield Progress::Reply(reply);
            }
            Err(e) => {
                yield span.in_scope(|| failure("Query execution", &e));
            }
        }
    };

    Box::pin(events)
}
