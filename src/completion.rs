//! Text completion against a language model.
//!
//! [`Completion`] is the only seam the rest of the crate sees; [`GenAiCompletion`]
//! backs it with the `genai` multi-provider client.

use std::time::Duration;

use async_trait::async_trait;
use genai::ModelIden;
use genai::chat::ChatOptions;
use genai::resolver::{AuthData, AuthResolver};

use crate::chat::{ChatMessage, ChatRole};
use crate::error::ChatbotError;

/// Sampling knobs for one completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f64,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    #[must_use]
    pub const fn new(temperature: f64) -> Self {
        Self {
            temperature,
            max_tokens: None,
        }
    }

    #[must_use]
    pub const fn with_max_tokens(
        mut self,
        max_tokens: u32,
    ) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

#[async_trait]
pub trait Completion: Send + Sync {
    /// Sends `messages` to the model and returns the generated text.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ChatbotError>;
}

/// Creates a genai client, pinning every provider to `key` when one is given.
#[must_use]
pub fn create_genai_client(key: Option<&str>) -> genai::Client {
    match key {
        Some(key) => {
            let key = key.to_string();
            let auth_resolver = AuthResolver::from_resolver_fn(
                move |_model_iden: ModelIden| -> Result<Option<AuthData>, genai::resolver::Error> {
                    Ok(Some(AuthData::from_single(key.clone())))
                },
            );
            genai::Client::builder().with_auth_resolver(auth_resolver).build()
        }
        None => genai::Client::default(),
    }
}

pub struct GenAiCompletion {
    client: genai::Client,
    model: String,
    timeout: Duration,
}

impl GenAiCompletion {
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        key: Option<&str>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: create_genai_client(key),
            model: model.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

fn to_genai_request(messages: &[ChatMessage]) -> genai::chat::ChatRequest {
    let mut chat_req = genai::chat::ChatRequest::default();
    for message in messages {
        chat_req = match message.role {
            ChatRole::System => chat_req.with_system(message.content.clone()),
            ChatRole::User => chat_req.append_message(genai::chat::ChatMessage::user(message.content.clone())),
        };
    }
    chat_req
}

#[async_trait]
impl Completion for GenAiCompletion {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ChatbotError> {
        let chat_req = to_genai_request(messages);

        let mut chat_options = ChatOptions::default().with_temperature(options.temperature);
        if let Some(max_tokens) = options.max_tokens {
            chat_options = chat_options.with_max_tokens(max_tokens);
        }

        tracing::debug!("Sending {} messages to model {}", messages.len(), self.model);

        let response = tokio::time::timeout(
            self.timeout,
            self.client.exec_chat(&self.model, chat_req, Some(&chat_options)),
        )
        .await
        .map_err(|_| ChatbotError::completion(format!("Model call timed out after {}s", self.timeout.as_secs())))??;

        response
            .into_first_text()
            .ok_or_else(|| ChatbotError::completion("No response from AI model"))
    }
}
