//! Model response and error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for model calls
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AgentError {
    /// The provider answered with an HTTP-like status code
    #[error("model returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Non-retryable failure with no status attached
    #[error("model error: {0}")]
    Fatal(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    /// Transient failures kept coming back until the retry budget ran out
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: Box<AgentError> },
}

impl AgentError {
    /// Status code carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Status { status, .. } => Some(*status),
            AgentError::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Response from the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The response content
    pub content: String,

    /// How many calls it took to get this response
    pub attempts: u32,
}

impl AgentResponse {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            attempts: 1,
        }
    }
}
