//! Formatter error types.

use thiserror::Error;

/// Errors that can occur while rendering a pattern tree.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("failed to serialize document: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Write(#[from] std::fmt::Error),
}
