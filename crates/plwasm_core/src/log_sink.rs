//! Log Sink: the console stream handed to hosts.
//!
//! Each entry is encoded as `[LEVEL] message`, then a line feed and the
//! [`ENTRY_SENTINEL`] byte. Messages may contain line feeds themselves, so
//! hosts split on the sentinel, never on newlines alone. The sentinel is
//! not valid UTF-8 on its own and never appears in an encoded message.

use plwasm_runtime::{LogEntry, LogLevel};

use crate::ExecutionOutcome;

/// Byte terminating every encoded entry.
pub const ENTRY_SENTINEL: u8 = 0xAA;

const TERMINATOR: [u8; 2] = [b'\n', ENTRY_SENTINEL];

/// Fixed-width prefix for `level`.
pub fn level_prefix(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "[DEBUG] ",
        LogLevel::Info => "[INFO]  ",
        LogLevel::Warning => "[WARN]  ",
        LogLevel::Error => "[ERROR] ",
    }
}

/// The encoded log of exactly one execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleOutput {
    bytes: Vec<u8>,
    entries: usize,
}

impl ConsoleOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes the runtime's entries followed by the outcome's error entry,
    /// if it has one.
    pub fn encode(entries: &[LogEntry], outcome: &ExecutionOutcome) -> Self {
        let mut output = Self::new();
        for entry in entries {
            output.push(entry.level, &entry.message);
        }
        if let Some(message) = outcome.error_message() {
            output.push(LogLevel::Error, &message);
        }
        output
    }

    /// Appends one entry. NUL characters are written as the two characters
    /// `\0` so the stream stays a valid C string.
    pub fn push(&mut self, level: LogLevel, message: &str) {
        self.bytes.extend_from_slice(level_prefix(level).as_bytes());
        for (i, part) in message.split('\0').enumerate() {
            if i > 0 {
                self.bytes.extend_from_slice(b"\\0");
            }
            self.bytes.extend_from_slice(part.as_bytes());
        }
        self.bytes.extend_from_slice(&TERMINATOR);
        self.entries += 1;
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of encoded entries.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Number of entries carrying the error prefix.
    pub fn error_count(&self) -> usize {
        split_entries(&self.bytes)
            .iter()
            .filter(|entry| entry.starts_with(level_prefix(LogLevel::Error)))
            .count()
    }
}

/// Splits an encoded stream back into entry texts, prefixes included.
pub fn split_entries(bytes: &[u8]) -> Vec<String> {
    let mut entries = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i..i + 2] == TERMINATOR {
            entries.push(String::from_utf8_lossy(&bytes[start..i]).into_owned());
            i += 2;
            start = i;
        } else {
            i += 1;
        }
    }
    entries
}
