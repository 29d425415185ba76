//! # plwasm_parser
//!
//! Parser for the pattern language.
//!
//! This crate provides:
//! - A hand-written lexer producing positioned tokens
//! - Directive handling for `#include` and `#pragma`
//! - A recursive-descent parser producing a [`plwasm_ast::Program`]
//!
//! ## Architecture
//!
//! Included files are looked up through the [`IncludeResolver`] trait so
//! that the parser never touches a real filesystem. The runtime supplies a
//! resolver backed by its in-memory file store.
//!
//! ## Example
//!
//! ```rust
//! use plwasm_parser::PatternParser;
//!
//! let program = PatternParser::new().parse("u8 magic @ 0x00;").unwrap();
//! assert_eq!(program.items.len(), 1);
//! ```

mod error;
mod include;
mod lexer;
mod parser;

pub use error::{ParseError, ParseErrorKind};
pub use include::{IncludeResolver, MAX_INCLUDE_DEPTH, ResolvedInclude};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{KNOWN_PRAGMAS, PatternParser};
