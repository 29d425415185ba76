//! Byte sources patterns are decoded from.

use std::sync::Arc;

/// Read access to the bytes a script pattern-matches against.
///
/// Offsets are relative to the start of the source; the runtime maps them
/// onto the base address the source was bound at.
pub trait DataSource {
    /// Number of readable bytes.
    fn size(&self) -> u64;

    /// Fills `buffer` with the bytes starting at `offset`.
    ///
    /// Returns `false` without touching `buffer` if the range is not fully
    /// inside the source.
    fn read(&self, offset: u64, buffer: &mut [u8]) -> bool;
}

/// A source with no bytes; every non-empty read fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptySource;

impl DataSource for EmptySource {
    fn size(&self) -> u64 {
        0
    }

    fn read(&self, _offset: u64, buffer: &mut [u8]) -> bool {
        buffer.is_empty()
    }
}

fn read_slice(bytes: &[u8], offset: u64, buffer: &mut [u8]) -> bool {
    let Ok(start) = usize::try_from(offset) else {
        return false;
    };
    let Some(end) = start.checked_add(buffer.len()) else {
        return false;
    };
    match bytes.get(start..end) {
        Some(slice) => {
            buffer.copy_from_slice(slice);
            true
        }
        None => false,
    }
}

impl DataSource for Arc<[u8]> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read(&self, offset: u64, buffer: &mut [u8]) -> bool {
        read_slice(self, offset, buffer)
    }
}

impl DataSource for Vec<u8> {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    fn read(&self, offset: u64, buffer: &mut [u8]) -> bool {
        read_slice(self, offset, buffer)
    }
}
