use serde::{Deserialize, Serialize};
use std::fmt;

/// Failure taxonomy shared by every component.
///
/// The `String` payload is diagnostic detail for the logs. It never reaches a
/// user-facing reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatbotError {
    /// The database could not be reached.
    Connection(String),
    /// A statement failed on the database side.
    Execution(String),
    /// The language model call failed.
    Completion(String),
    /// The inbound message was missing or empty.
    Input(String),
    /// Generated SQL was refused by the read-only guard.
    Rejected(String),
    /// Configuration could not be parsed.
    Config(String),
}

impl fmt::Display for ChatbotError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            ChatbotError::Connection(msg) => write!(f, "Connection error: {msg}"),
            ChatbotError::Execution(msg) => write!(f, "Execution error: {msg}"),
            ChatbotError::Completion(msg) => write!(f, "Completion error: {msg}"),
            ChatbotError::Input(msg) => write!(f, "Input error: {msg}"),
            ChatbotError::Rejected(msg) => write!(f, "Rejected query: {msg}"),
            ChatbotError::Config(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for ChatbotError {}

impl ChatbotError {
    pub fn connection(msg: impl Into<String>) -> Self {
        ChatbotError::Connection(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        ChatbotError::Execution(msg.into())
    }

    pub fn completion(msg: impl Into<String>) -> Self {
        ChatbotError::Completion(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        ChatbotError::Input(msg.into())
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        ChatbotError::Rejected(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        ChatbotError::Config(msg.into())
    }

    /// Only input errors are the caller's fault.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, ChatbotError::Input(_))
    }
}

impl From<sqlx::Error> for ChatbotError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(_)
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => ChatbotError::Connection(err.to_string()),
            other => ChatbotError::Execution(other.to_string()),
        }
    }
}

impl From<genai::Error> for ChatbotError {
    fn from(err: genai::Error) -> Self {
        ChatbotError::Completion(format!("Chat request failed: {err}"))
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[cfg_attr(feature = "server", derive(utoipa::ToSchema))]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

#[cfg(feature = "server")]
pub use api::ApiError;

#[cfg(feature = "server")]
mod api {
    use super::{ChatbotError, ErrorResponse};
    use actix_web::http::StatusCode;
    use actix_web::{HttpResponse, ResponseError};
    use std::fmt;

    /// HTTP-facing error. Carries only the generic message that is safe to show.
    #[derive(Debug)]
    pub enum ApiError {
        BadRequest(String),
        BadGateway(String),
        ServiceUnavailable(String),
        InternalServerError(String),
    }

    impl fmt::Display for ApiError {
        fn fmt(
            &self,
            f: &mut fmt::Formatter<'_>,
        ) -> fmt::Result {
            match self {
                ApiError::BadRequest(msg) => write!(f, "Bad request: {msg}"),
                ApiError::BadGateway(msg) => write!(f, "Bad gateway: {msg}"),
                ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {msg}"),
                ApiError::InternalServerError(msg) => write!(f, "Internal server error: {msg}"),
            }
        }
    }

    impl ApiError {
        const fn parts(&self) -> (StatusCode, &'static str) {
            match self {
                ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                ApiError::BadGateway(_) => (StatusCode::BAD_GATEWAY, "COMPLETION_ERROR"),
                ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "DATABASE_UNAVAILABLE"),
                ApiError::InternalServerError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            }
        }

        fn message(&self) -> &str {
            match self {
                ApiError::BadRequest(msg)
                | ApiError::BadGateway(msg)
                | ApiError::ServiceUnavailable(msg)
                | ApiError::InternalServerError(msg) => msg,
            }
        }
    }

    impl ResponseError for ApiError {
        fn status_code(&self) -> StatusCode {
            self.parts().0
        }

        fn error_response(&self) -> HttpResponse {
            let (status, error_type) = self.parts();
            HttpResponse::build(status).json(ErrorResponse {
                error: error_type.to_string(),
                message: self.message().to_string(),
                status_code: status.as_u16(),
            })
        }
    }

    // The detail is logged here and dropped; only input errors keep their text.
    impl From<ChatbotError> for ApiError {
        fn from(err: ChatbotError) -> Self {
            if let ChatbotError::Input(msg) = err {
                return ApiError::BadRequest(msg);
            }

            tracing::error!("Request failed: {}", err);
            let generic = "An error occurred. Please try again later.".to_string();
            match err {
                ChatbotError::Connection(_) => ApiError::ServiceUnavailable(generic),
                ChatbotError::Completion(_) => ApiError::BadGateway(generic),
                _ => ApiError::InternalServerError(generic),
            }
        }
    }
}
