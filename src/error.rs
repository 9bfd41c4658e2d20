//! Completion error type

use thiserror::Error;

/// Any failure of a completion call: transport, HTTP status, decoding or schema.
///
/// Turns do not distinguish sub-kinds; every failure rolls the turn back.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CompletionFailure {
    pub message: String,
}

impl CompletionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CompletionFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::new(format!("request failed: {}", err))
    }
}

impl From<serde_json::Error> for CompletionFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::new(format!("invalid response JSON: {}", err))
    }
}
