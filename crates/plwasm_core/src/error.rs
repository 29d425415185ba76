//! Error types for the session layer.

use plwasm_formatters::FormatError;
use thiserror::Error;

/// Errors raised by [`Session`](crate::Session) operations.
///
/// Script failures are not errors at this level: they are part of an
/// [`ExecutionOutcome`](crate::ExecutionOutcome) and end up in the console
/// stream.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The requested formatter is not part of the catalog.
    #[error("unknown formatter '{0}'")]
    UnknownFormatter(String),

    /// Session configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A formatter failed while rendering.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),
}

impl SessionError {
    pub fn unknown_formatter(name: impl Into<String>) -> Self {
        Self::UnknownFormatter(name.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
