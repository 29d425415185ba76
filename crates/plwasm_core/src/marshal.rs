//! Result Marshaller: owned C strings handed across the boundary.

use std::ffi::{CStr, CString, c_char};

/// Returned instead of formatted output when the formatter name is unknown.
pub const INVALID_FORMATTER: &CStr = c"Invalid Formatter!";

/// One result buffer.
///
/// The pointer returned by [`store`](ResultSlot::store) stays valid until
/// the slot is written again.
#[derive(Debug, Default)]
pub struct ResultSlot {
    value: CString,
}

impl ResultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the slot's contents and returns a pointer to them.
    ///
    /// NUL bytes inside `bytes` are written as the two characters `\0`.
    pub fn store(&mut self, bytes: impl Into<Vec<u8>>) -> *const c_char {
        self.value = to_c_string(bytes.into());
        self.as_ptr()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.value.as_ptr()
    }

    pub fn as_c_str(&self) -> &CStr {
        &self.value
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// The independent slots backing each producing entry point.
#[derive(Debug, Default)]
pub struct ResultBuffers {
    /// Encoded console stream of the last execution.
    pub console: ResultSlot,
    /// Output of the last successful formatter call.
    pub formatted: ResultSlot,
    /// Joined formatter names, filled on first use.
    pub formatters: ResultSlot,
}

impl ResultBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached formatter list, storing `names` on first use.
    pub fn formatter_list(&mut self, names: &str) -> *const c_char {
        if self.formatters.is_empty() {
            self.formatters.store(names);
        }
        self.formatters.as_ptr()
    }
}

fn to_c_string(bytes: Vec<u8>) -> CString {
    let bytes = if bytes.contains(&0) {
        let mut escaped = Vec::with_capacity(bytes.len() + 2);
        for byte in bytes {
            if byte == 0 {
                escaped.extend_from_slice(b"\\0");
            } else {
                escaped.push(byte);
            }
        }
        escaped
    } else {
        bytes
    };
    CString::new(bytes).unwrap_or_default()
}

/// Reads a NUL-terminated string from the host, replacing invalid UTF-8.
///
/// Null pointers read as the empty string.
///
/// # Safety
///
/// `ptr` must be null or point to a NUL-terminated string that stays valid
/// for the duration of the call.
pub unsafe fn read_c_str(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: guaranteed by the caller.
    let text = unsafe { CStr::from_ptr(ptr) };
    text.to_string_lossy().into_owned()
}

/// Copies `len` bytes from host memory.
///
/// A null pointer or zero length yields an empty vector.
///
/// # Safety
///
/// If `ptr` is non-null it must be valid for reads of `len` bytes.
pub unsafe fn read_bytes(ptr: *const u8, len: usize) -> Vec<u8> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    // SAFETY: guaranteed by the caller.
    unsafe { std::slice::from_raw_parts(ptr, len) }.to_vec()
}
