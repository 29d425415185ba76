//! Parse error types.

use plwasm_ast::Position;
use thiserror::Error;

/// Which stage of parsing rejected the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Malformed token: bad literal, stray character, unterminated string.
    Lexer,
    /// Invalid `#include` or `#pragma` directive.
    Preprocessor,
    /// Token sequence does not match the grammar.
    Syntax,
}

/// An error produced while turning script text into a [`plwasm_ast::Program`].
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{prefix}{message}", prefix = file_prefix(.file))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Location of the offending token.
    pub pos: Position,
    /// Virtual path of the included file the error occurred in, if any.
    pub file: Option<String>,
}

fn file_prefix(file: &Option<String>) -> String {
    match file {
        Some(path) => format!("{path}: "),
        None => String::new(),
    }
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: impl Into<String>, pos: Position) -> Self {
        Self {
            kind,
            message: message.into(),
            pos,
            file: None,
        }
    }

    /// Creates a lexer error.
    pub fn lexer(message: impl Into<String>, pos: Position) -> Self {
        Self::new(ParseErrorKind::Lexer, message, pos)
    }

    /// Creates a preprocessor error.
    pub fn preprocessor(message: impl Into<String>, pos: Position) -> Self {
        Self::new(ParseErrorKind::Preprocessor, message, pos)
    }

    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>, pos: Position) -> Self {
        Self::new(ParseErrorKind::Syntax, message, pos)
    }

    /// Attributes the error to an included file, keeping the innermost one.
    pub fn in_file(mut self, path: impl Into<String>) -> Self {
        if self.file.is_none() {
            self.file = Some(path.into());
        }
        self
    }
}
