//! # plwasm_runtime
//!
//! Pattern language runtime for plwasm.
//!
//! This crate provides:
//! - The [`PatternRuntime`] trait, the seam a session drives
//! - [`PatternLanguage`], the bundled evaluator implementing it
//! - The evaluated [`Pattern`] tree consumed by formatters
//! - Host hooks: [`DataSource`], [`DangerousFunctionGate`], [`LogConsole`]
//!   and the in-memory [`VirtualFileSystem`] used for `#include`
//!
//! ## Architecture
//!
//! A runtime is long-lived: hooks and include paths are installed once,
//! the data source is rebound whenever the host loads new bytes, and each
//! call to [`PatternRuntime::execute_string`] replaces the console log and
//! the pattern tree of the previous run.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use plwasm_runtime::{PatternLanguage, PatternRuntime};
//!
//! let mut runtime = PatternLanguage::new();
//! let bytes: Arc<[u8]> = Arc::from(vec![0x01, 0x02]);
//! runtime.set_data_source(0x00, Box::new(bytes));
//! runtime.execute_string("u8 first @ 0x00;").unwrap();
//! assert_eq!(runtime.patterns()[0].variable_name, "first");
//! ```

mod data_source;
mod error;
mod eval;
mod gate;
mod limits;
mod log;
mod pattern;
mod runtime;
mod types;
mod value;
mod vfs;

pub use data_source::{DataSource, EmptySource};
pub use error::{ErrorKind, EvalError, ExecutionError};
pub use gate::{AllowAll, DangerousFunctionGate, DenyAll};
pub use limits::RuntimeLimits;
pub use log::{LogConsole, LogEntry, LogLevel};
pub use pattern::{BitfieldField, Pattern, PatternAttributes, PatternValue};
pub use runtime::{PatternLanguage, PatternRuntime};
pub use vfs::VirtualFileSystem;
