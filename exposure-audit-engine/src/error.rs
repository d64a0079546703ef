//! Error types for policy parsing and evaluation.

use thiserror::Error;

/// Errors raised while parsing a raw policy document.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// The raw blob was not valid JSON at all.
    #[error("policy document is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The JSON was well-formed but does not have the shape of an IAM
    /// policy document (missing Statement, non-object statement, ...).
    #[error("malformed policy document: {0}")]
    Malformed(String),
}

impl PolicyError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed(reason.into())
    }
}
