use thiserror::Error;

use crate::models::domain::Quiz;

/// Failure modes of a single chat-completion tool call.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("malformed tool arguments: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("failed to open transcript log: {0}")]
    Transcript(#[from] std::io::Error),

    #[error("generation cancelled after {} questions", .partial.questions.len())]
    Cancelled { partial: Box<Quiz> },

    #[error("question stream ended early after {} questions: {reason}", .partial.questions.len())]
    Exhausted { partial: Box<Quiz>, reason: String },
}

impl From<validator::ValidationErrors> for GenerateError {
    fn from(err: validator::ValidationErrors) -> Self {
        GenerateError::InvalidRequest(err.to_string())
    }
}

pub type GenResult<T> = Result<T, GenerateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_messages() {
        let err = GatewayError::Protocol("no tool calls in response".into());
        assert_eq!(
            err.to_string(),
            "protocol violation: no tool calls in response"
        );
    }

    #[test]
    fn test_invalid_request_message() {
        let err = GenerateError::InvalidRequest("topic must not be empty".into());
        assert_eq!(err.to_string(), "invalid request: topic must not be empty");
    }
}
