use serde::{Deserialize, Serialize};

use crate::error::ChatbotError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub enum ChatRole {
    #[serde(rename = "user")]
    User,
    #[serde(rename = "system")]
    System,
}

/// One entry of a prompt sent to the language model.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// Body of `POST /chat`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ChatRequest {
    pub message: Option<String>,
}

impl ChatRequest {
    /// Returns the message text, or an input error when it is missing or blank.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Input` for a missing or whitespace-only message.
    pub fn message(&self) -> Result<&str, ChatbotError> {
        match self.message.as_deref() {
            Some(msg) if !msg.trim().is_empty() => Ok(msg),
            _ => Err(ChatbotError::input("Please provide a message.")),
        }
    }
}

/// Body returned by `POST /chat`, for successes and failures alike.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ChatReply {
    pub reply: String,
}

impl ChatReply {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into() }
    }
}
