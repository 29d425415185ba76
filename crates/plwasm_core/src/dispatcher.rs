//! Formatter Dispatcher.

use plwasm_formatters::{FormatOptions, Formatter, create_formatters};
use plwasm_runtime::Pattern;
use tracing::debug;

use crate::SessionError;

/// Separator between names in [`FormatterCatalog::joined_names`].
pub const FORMATTER_DELIMITER: &str = ",";

/// The fixed set of formatters a session can render through.
pub struct FormatterCatalog {
    formatters: Vec<Box<dyn Formatter>>,
    joined_names: String,
}

impl Default for FormatterCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FormatterCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatterCatalog")
            .field("names", &self.joined_names)
            .finish()
    }
}

impl FormatterCatalog {
    /// Builds the catalog from every bundled formatter.
    pub fn new() -> Self {
        Self::from_formatters(create_formatters())
    }

    pub fn from_formatters(formatters: Vec<Box<dyn Formatter>>) -> Self {
        let joined_names = formatters
            .iter()
            .map(|f| f.name())
            .collect::<Vec<_>>()
            .join(FORMATTER_DELIMITER);
        Self {
            formatters,
            joined_names,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.formatters.iter().map(|f| f.name())
    }

    /// Every name, joined with [`FORMATTER_DELIMITER`] in catalog order.
    pub fn joined_names(&self) -> &str {
        &self.joined_names
    }

    /// Looks a formatter up by exact, case-sensitive name.
    pub fn get(&self, name: &str) -> Option<&dyn Formatter> {
        self.formatters
            .iter()
            .find(|f| f.name() == name)
            .map(|f| f.as_ref())
    }

    /// Renders `patterns` through the named formatter with meta
    /// information enabled.
    pub fn render(&self, name: &str, patterns: &[Pattern]) -> Result<String, SessionError> {
        let Some(formatter) = self.get(name) else {
            debug!(formatter = name, "formatter not found");
            return Err(SessionError::unknown_formatter(name));
        };
        debug!(formatter = name, patterns = patterns.len(), "rendering patterns");
        let output = formatter.format(patterns, &FormatOptions::with_meta_information())?;
        Ok(output)
    }
}
