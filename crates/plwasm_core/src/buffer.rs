//! Data Buffer Manager.

use std::sync::Arc;

use plwasm_runtime::DataSource;

/// The bytes scripts read, always exposed at this address.
pub const DATA_BASE_ADDRESS: u64 = 0x00;

/// An owned copy of the host's data.
///
/// The bytes are shared with the runtime through reference counting, so a
/// source handed out by [`source`](DataBuffer::source) keeps reading the
/// bytes it was created from even after the buffer is replaced.
#[derive(Debug, Clone)]
pub struct DataBuffer {
    bytes: Arc<[u8]>,
}

impl Default for DataBuffer {
    fn default() -> Self {
        Self::empty()
    }
}

impl DataBuffer {
    pub fn empty() -> Self {
        Self {
            bytes: Arc::from(Vec::new()),
        }
    }

    /// Copies `bytes` into a new buffer.
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self {
            bytes: Arc::from(bytes),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// A data source reading this buffer's bytes.
    pub fn source(&self) -> Box<dyn DataSource> {
        Box::new(Arc::clone(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_is_independent_of_input() {
        let mut input = vec![1, 2, 3];
        let buffer = DataBuffer::copy_from(&input);
        input[0] = 9;
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn test_source_outlives_replacement() {
        let mut buffer = DataBuffer::copy_from(&[0xAB]);
        let source = buffer.source();
        buffer = DataBuffer::empty();

        let mut out = [0u8; 1];
        assert!(source.read(0, &mut out));
        assert_eq!(out, [0xAB]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.source().size(), 0);
    }
}
