use std::sync::Arc;

use crate::chat::ChatMessage;
use crate::completion::{Completion, CompletionOptions};
use crate::error::ChatbotError;
use crate::schema::Schema;
use crate::template::TemplateEngine;

/// Low temperature keeps generated SQL close to deterministic.
pub const SQL_TEMPERATURE: f64 = 0.2;

/// Turns a question plus schema into SQL text via the model.
pub struct QueryGenerator {
    completion: Arc<dyn Completion>,
    options: CompletionOptions,
}

impl QueryGenerator {
    #[must_use]
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self {
            completion,
            options: CompletionOptions::new(SQL_TEMPERATURE),
        }
    }

    /// Caps the length of generated SQL.
    #[must_use]
    pub fn with_max_tokens(
        mut self,
        max_tokens: u32,
    ) -> Self {
        self.options = self.options.with_max_tokens(max_tokens);
        self
    }

    #[must_use]
    pub fn build_messages(
        question: &str,
        schema: &Schema,
    ) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(TemplateEngine::system_prompt()),
            ChatMessage::user(TemplateEngine::render_user_prompt(&schema.to_string(), question)),
        ]
    }

    /// Returns the model's answer, trimmed and otherwise untouched.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Completion` if the model call fails.
    pub async fn generate_sql(
        &self,
        question: &str,
        schema: &Schema,
    ) -> Result<String, ChatbotError> {
        let messages = Self::build_messages(question, schema);
        tracing::debug!("SQL generation prompt: {}", messages[1].content);

        let sql = self.completion.complete(&messages, self.options).await?;
        let sql = sql.trim().to_string();
        tracing::info!("Generated SQL: {}", sql);
        Ok(sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatRole;
    use crate::schema::{Column, Table};
    use crate::testing::FakeCompletion;

    fn schema() -> Schema {
        Schema {
            tables: vec![Table::new(
                "products".to_string(),
                vec![Column::new("name", "text"), Column::new("quantity", "integer")],
            )],
        }
    }

    #[tokio::test]
    async fn test_generates_trimmed_sql() {
        let completion = Arc::new(FakeCompletion::replying(&["  SELECT count(*) FROM products;\n"]));
        let generator = QueryGenerator::new(completion.clone());

        let sql = generator.generate_sql("how many products are there?", &schema()).await.unwrap();
        assert_eq!(sql, "SELECT count(*) FROM products;");

        let calls = completion.calls();
        assert_eq!(calls.len(), 1);
        let (messages, options) = &calls[0];
        assert!((options.temperature - SQL_TEMPERATURE).abs() < f64::EPSILON);
        assert_eq!(options.max_tokens, None);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(messages[1].role, ChatRole::User);
        assert!(messages[1].content.contains("Table: products\n- name (text)\n- quantity (integer)"));
        assert!(messages[1].content.contains("Question: how many products are there?"));
    }

    #[tokio::test]
    async fn test_output_is_not_validated() {
        let completion = Arc::new(FakeCompletion::replying(&["I cannot answer that."]));
        let generator = QueryGenerator::new(completion);

        let sql = generator.generate_sql("what's the weather", &schema()).await.unwrap();
        assert_eq!(sql, "I cannot answer that.");
    }

    #[tokio::test]
    async fn test_completion_failure_propagates() {
        let completion = Arc::new(FakeCompletion::failing(ChatbotError::completion("quota exceeded")));
        let generator = QueryGenerator::new(completion).with_max_tokens(256);

        let result = generator.generate_sql("anything", &schema()).await;
        assert_eq!(result.unwrap_err(), ChatbotError::completion("quota exceeded"));
    }
}
