//! Result of one script execution.

use plwasm_runtime::ExecutionError;

/// How the most recent execution ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Nothing has been executed yet.
    #[default]
    NotRun,
    /// The script ran to completion.
    Completed {
        /// Number of top-level patterns placed.
        patterns: usize,
    },
    /// The script failed with a located error.
    Failed(ExecutionError),
    /// The runtime itself broke down while executing.
    Faulted {
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn error(&self) -> Option<&ExecutionError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Text of the error entry this outcome contributes to the console
    /// stream, if any.
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::NotRun | Self::Completed { .. } => None,
            Self::Failed(err) => Some(err.to_string()),
            Self::Faulted { message } => Some(format!("internal runtime fault: {message}")),
        }
    }
}
