//! Runtime error types.

use plwasm_ast::Position;
use plwasm_parser::{ParseError, ParseErrorKind};
use thiserror::Error;

/// Errors raised while evaluating a parsed program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// The script is well-formed but cannot be evaluated.
    #[error("{message}")]
    Evaluation { message: String, pos: Position },

    /// A placement or read touched bytes outside the data source.
    #[error(
        "{what} at 0x{offset:X} with size 0x{size:X} is outside of the data source (0x{base:X} - 0x{end:X})"
    )]
    OutOfBounds {
        what: String,
        offset: u64,
        size: u64,
        base: u64,
        end: u64,
        pos: Position,
    },

    /// The capability gate refused a dangerous function.
    #[error("calling of dangerous function '{function}' is not allowed")]
    DangerousFunctionDenied { function: String, pos: Position },

    /// A configured evaluation limit was hit.
    #[error("{what} limit of {limit} exceeded")]
    LimitExceeded {
        what: &'static str,
        limit: u64,
        pos: Position,
    },

    /// The script stopped itself through `std::error` or a failed assertion.
    #[error("{message}")]
    Aborted { message: String, pos: Position },
}

impl EvalError {
    /// Creates an evaluation error.
    pub fn evaluation(message: impl Into<String>, pos: Position) -> Self {
        Self::Evaluation {
            message: message.into(),
            pos,
        }
    }

    /// Creates an abort error.
    pub fn aborted(message: impl Into<String>, pos: Position) -> Self {
        Self::Aborted {
            message: message.into(),
            pos,
        }
    }

    /// Creates a limit error.
    pub fn limit(what: &'static str, limit: u64, pos: Position) -> Self {
        Self::LimitExceeded { what, limit, pos }
    }

    /// Location of the construct that failed.
    pub fn pos(&self) -> Position {
        match self {
            EvalError::Evaluation { pos, .. }
            | EvalError::OutOfBounds { pos, .. }
            | EvalError::DangerousFunctionDenied { pos, .. }
            | EvalError::LimitExceeded { pos, .. }
            | EvalError::Aborted { pos, .. } => *pos,
        }
    }
}

/// Category of an [`ExecutionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Lexer,
    Preprocessor,
    Parser,
    Evaluator,
    OutOfBounds,
    DangerousFunction,
    Limit,
    Aborted,
}

/// Why a script failed, with the location the host should highlight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}:{column} -> {message}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ErrorKind, pos: Position, message: impl Into<String>) -> Self {
        Self {
            kind,
            line: pos.line,
            column: pos.column,
            message: message.into(),
        }
    }
}

impl From<ParseError> for ExecutionError {
    fn from(err: ParseError) -> Self {
        let kind = match err.kind {
            ParseErrorKind::Lexer => ErrorKind::Lexer,
            ParseErrorKind::Preprocessor => ErrorKind::Preprocessor,
            ParseErrorKind::Syntax => ErrorKind::Parser,
        };
        Self::new(kind, err.pos, err.to_string())
    }
}

impl From<EvalError> for ExecutionError {
    fn from(err: EvalError) -> Self {
        let kind = match &err {
            EvalError::Evaluation { .. } => ErrorKind::Evaluator,
            EvalError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
            EvalError::DangerousFunctionDenied { .. } => ErrorKind::DangerousFunction,
            EvalError::LimitExceeded { .. } => ErrorKind::Limit,
            EvalError::Aborted { .. } => ErrorKind::Aborted,
        };
        Self::new(kind, err.pos(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_error_display() {
        let err = ExecutionError::new(ErrorKind::Parser, Position::new(4, 2), "expected ';'");
        assert_eq!(err.to_string(), "4:2 -> expected ';'");
    }

    #[test]
    fn test_from_parse_error_keeps_location_and_file() {
        let parse = ParseError::syntax("boom", Position::new(3, 9)).in_file("/sources/includes/a.pat");
        let err = ExecutionError::from(parse);
        assert_eq!(err.kind, ErrorKind::Parser);
        assert_eq!((err.line, err.column), (3, 9));
        assert_eq!(err.message, "/sources/includes/a.pat: boom");
    }

    #[test]
    fn test_from_eval_error_maps_kind() {
        let err = ExecutionError::from(EvalError::DangerousFunctionDenied {
            function: "std::file::read".into(),
            pos: Position::new(1, 1),
        });
        assert_eq!(err.kind, ErrorKind::DangerousFunction);
        assert_eq!(
            err.message,
            "calling of dangerous function 'std::file::read' is not allowed"
        );
    }
}
