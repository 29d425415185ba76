//! Script console log.

use serde::{Deserialize, Serialize};

/// Severity of a console entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Encoded size of an entry beyond its message: level prefix and terminator.
pub const ENTRY_OVERHEAD: usize = 10;

/// Append-only log of one execution, in emission order.
#[derive(Debug, Clone, Default)]
pub struct LogConsole {
    entries: Vec<LogEntry>,
    size: usize,
}

impl LogConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, level: LogLevel, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        self.size += entry.message.len() + ENTRY_OVERHEAD;
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Bytes the log takes once encoded for the host.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
    }
}
