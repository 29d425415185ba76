//! # plwasm_core
//!
//! The session protocol between a host and the pattern language runtime.
//!
//! This crate provides:
//! - [`Session`], the handle that configures the runtime, binds data and
//!   runs scripts
//! - [`ConsoleOutput`], the sentinel-delimited console stream
//! - [`FormatterCatalog`], lookup and rendering by formatter name
//! - [`ResultSlot`] and [`ResultBuffers`], the C strings handed to hosts
//!
//! ## Example
//!
//! ```rust
//! use plwasm_core::{Session, SessionConfig};
//!
//! let mut session = Session::new(SessionConfig::default());
//! session.initialize();
//! session.set_data(&[0x01, 0x02, 0x03]);
//! session.execute("u8 x @ 0x00;");
//!
//! assert!(session.outcome().is_success());
//! assert!(session.format("json").unwrap().contains("\"value\": 1"));
//! ```

mod buffer;
mod config;
mod dispatcher;
mod error;
mod log_sink;
pub mod marshal;
mod outcome;
mod session;

pub use buffer::{DATA_BASE_ADDRESS, DataBuffer};
pub use config::{DEFAULT_INCLUDE_PATHS, DangerousFunctionPolicy, SessionConfig};
pub use dispatcher::{FORMATTER_DELIMITER, FormatterCatalog};
pub use error::SessionError;
pub use log_sink::{ConsoleOutput, ENTRY_SENTINEL, level_prefix, split_entries};
pub use marshal::{INVALID_FORMATTER, ResultBuffers, ResultSlot};
pub use outcome::ExecutionOutcome;
pub use session::{Session, SessionState};
