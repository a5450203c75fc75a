//! Completion service integration
//!
//! Features:
//! - OpenAI-compatible streaming backend (Groq)
//! - System instruction built from the business catalog
//! - Retrying completion client with exponential backoff

pub mod backend;
pub mod client;
pub mod prompt;

pub use backend::{
    FinishReason, GenerationResult, GroqBackend, LlmBackend, LlmConfig, TokenUsage,
};
pub use client::{CompletionClient, ReplyStream, RetryPolicy};
pub use prompt::{Message, PromptContext, Role, SystemPromptBuilder};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<LlmError> for booking_assistant_core::Error {
    fn from(err: LlmError) -> Self {
        booking_assistant_core::Error::Llm(err.to_string())
    }
}

/// Error surfaced to callers after retries are exhausted
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl From<&LlmError> for ApiError {
    fn from(err: &LlmError) -> Self {
        let (code, status) = match err {
            LlmError::Api { status, code, .. } => (code.clone(), Some(*status)),
            LlmError::Network(_) => (Some("network_error".to_string()), None),
            LlmError::InvalidResponse(_) => (Some("invalid_response".to_string()), None),
            LlmError::Timeout => (Some("timeout".to_string()), None),
            LlmError::Configuration(_) => (Some("not_configured".to_string()), None),
            LlmError::StreamInterrupted(_) => (Some("stream_interrupted".to_string()), None),
        };
        Self {
            message: err.to_string(),
            code,
            status,
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(err: LlmError) -> Self {
        ApiError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_keeps_status_and_code() {
        let err = LlmError::Api {
            status: 429,
            code: Some("rate_limit_exceeded".to_string()),
            message: "Slow down".to_string(),
        };
        let api = ApiError::from(&err);
        assert_eq!(api.status, Some(429));
        assert_eq!(api.code.as_deref(), Some("rate_limit_exceeded"));
        assert!(api.message.contains("Slow down"));
    }

    #[test]
    fn test_api_error_message_never_empty() {
        for err in [
            LlmError::Timeout,
            LlmError::Network(String::new()),
            LlmError::InvalidResponse(String::new()),
            LlmError::Configuration(String::new()),
            LlmError::StreamInterrupted(String::new()),
        ] {
            assert!(!ApiError::from(&err).message.is_empty());
        }
    }
}
