//! # plwasm_formatters
//!
//! Renderers that turn an evaluated pattern tree into text.
//!
//! The catalog is fixed: [`create_formatters`] returns one instance of each
//! formatter, and callers look them up by [`Formatter::name`].
//!
//! ## Example
//!
//! ```rust
//! use plwasm_formatters::{FormatOptions, create_formatters};
//!
//! let formatters = create_formatters();
//! let json = formatters.iter().find(|f| f.name() == "json").unwrap();
//! assert_eq!(json.format(&[], &FormatOptions::default()).unwrap(), "{}");
//! ```

mod document;
mod error;
mod html;
mod json;
mod yaml;

pub use error::FormatError;
pub use html::HtmlFormatter;
pub use json::JsonFormatter;
pub use yaml::YamlFormatter;

use plwasm_runtime::Pattern;

/// Rendering switches shared by every formatter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Emit type, address and size next to each value.
    pub meta_information: bool,
}

impl FormatOptions {
    pub fn with_meta_information() -> Self {
        Self {
            meta_information: true,
        }
    }
}

/// A named renderer for pattern trees.
pub trait Formatter: Send + Sync {
    /// Stable catalog key.
    fn name(&self) -> &'static str;

    /// Extension a host would use when saving the output.
    fn file_extension(&self) -> &'static str;

    /// Renders `patterns`, skipping hidden ones.
    fn format(&self, patterns: &[Pattern], options: &FormatOptions) -> Result<String, FormatError>;
}

/// Builds the formatter catalog, in the order it is advertised to hosts.
pub fn create_formatters() -> Vec<Box<dyn Formatter>> {
    vec![
        Box::new(JsonFormatter),
        Box::new(YamlFormatter),
        Box::new(HtmlFormatter),
    ]
}

#[cfg(test)]
mod test_support;
