//! # plwasm_wasm
//!
//! C-callable exports over one process-lifetime [`Session`].
//!
//! Hosts call `initialize` once, then `setData`, then
//! `executePatternLanguageCode`, and read results back through
//! `getConsoleResult`, `getFormatters` and `getFormattedResult`. Every
//! returned pointer refers to a buffer owned by this module; it stays valid
//! until the same entry point is called again, so hosts copy it out first.
//!
//! Calls must come from one thread, one at a time.

use std::alloc::{self, Layout};
use std::cell::RefCell;
use std::ffi::c_char;
use std::ptr;

use plwasm_core::marshal::{read_bytes, read_c_str};
use plwasm_core::{INVALID_FORMATTER, ResultBuffers, Session, SessionConfig, SessionError};
use tracing::warn;

/// The session and the buffers its results are returned through.
struct Binding {
    session: Session,
    buffers: ResultBuffers,
}

impl Binding {
    fn new() -> Self {
        Self {
            session: Session::new(SessionConfig::default()),
            buffers: ResultBuffers::new(),
        }
    }
}

thread_local! {
    static BINDING: RefCell<Binding> = RefCell::new(Binding::new());
}

fn with_binding<T>(f: impl FnOnce(&mut Binding) -> T) -> T {
    BINDING.with(|binding| f(&mut binding.borrow_mut()))
}

/// Installs the deny-all gate and the include paths.
#[unsafe(no_mangle)]
pub extern "C" fn initialize() {
    with_binding(|binding| binding.session.initialize());
}

/// Replaces the data buffer with a copy of `size` bytes at `data`.
///
/// # Safety
///
/// `data` must be null or valid for reads of `size` bytes.
#[unsafe(export_name = "setData")]
pub unsafe extern "C" fn set_data(data: *const u8, size: usize) {
    // SAFETY: forwarded from the caller.
    let bytes = unsafe { read_bytes(data, size) };
    with_binding(|binding| binding.session.set_data(&bytes));
}

/// Runs a script and returns the console stream, the same pointer
/// `getConsoleResult` returns afterwards.
///
/// # Safety
///
/// `code` must be null or a valid NUL-terminated string.
#[unsafe(export_name = "executePatternLanguageCode")]
pub unsafe extern "C" fn execute_pattern_language_code(code: *const c_char) -> *const c_char {
    // SAFETY: forwarded from the caller.
    let code = unsafe { read_c_str(code) };
    with_binding(|binding| {
        let output = binding.session.execute(&code);
        binding.buffers.console.store(output.as_bytes())
    })
}

/// Console stream of the last execution, or an empty string before the
/// first one.
#[unsafe(export_name = "getConsoleResult")]
pub extern "C" fn get_console_result() -> *const c_char {
    with_binding(|binding| binding.buffers.console.as_ptr())
}

/// Comma-joined formatter names.
#[unsafe(export_name = "getFormatters")]
pub extern "C" fn get_formatters() -> *const c_char {
    with_binding(|binding| {
        let names = binding.session.formatters().joined_names();
        binding.buffers.formatter_list(names)
    })
}

/// Renders the last execution's patterns through the formatter `name`.
///
/// Unknown names return `Invalid Formatter!` and leave the previous
/// formatted result in place.
///
/// # Safety
///
/// `name` must be null or a valid NUL-terminated string.
#[unsafe(export_name = "getFormattedResult")]
pub unsafe extern "C" fn get_formatted_result(name: *const c_char) -> *const c_char {
    // SAFETY: forwarded from the caller.
    let name = unsafe { read_c_str(name) };
    with_binding(|binding| match binding.session.format(&name) {
        Ok(text) => binding.buffers.formatted.store(text),
        Err(SessionError::UnknownFormatter(_)) => INVALID_FORMATTER.as_ptr(),
        Err(err) => {
            warn!(formatter = %name, error = %err, "formatter failed");
            binding.buffers.formatted.store(err.to_string())
        }
    })
}

/// Stores a file scripts can `#include`.
///
/// # Safety
///
/// Both arguments must be null or valid NUL-terminated strings.
#[unsafe(export_name = "addIncludeFile")]
pub unsafe extern "C" fn add_include_file(path: *const c_char, contents: *const c_char) {
    // SAFETY: forwarded from the caller.
    let (path, contents) = unsafe { (read_c_str(path), read_c_str(contents)) };
    with_binding(|binding| binding.session.add_include_file(&path, &contents));
}

/// Allocates `size` bytes for the host to write into, or returns null when
/// `size` is zero or the allocation fails.
#[unsafe(no_mangle)]
pub extern "C" fn allocate(size: usize) -> *mut u8 {
    let Some(layout) = byte_layout(size) else {
        return ptr::null_mut();
    };
    // SAFETY: the layout has a non-zero size.
    unsafe { alloc::alloc(layout) }
}

/// Frees a buffer returned by [`allocate`]. Null is ignored.
///
/// # Safety
///
/// `ptr` must be null or come from `allocate(size)` with the same `size`,
/// and must not be used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn deallocate(ptr: *mut u8, size: usize) {
    if ptr.is_null() {
        return;
    }
    if let Some(layout) = byte_layout(size) {
        // SAFETY: forwarded from the caller.
        unsafe { alloc::dealloc(ptr, layout) };
    }
}

fn byte_layout(size: usize) -> Option<Layout> {
    if size == 0 {
        return None;
    }
    Layout::array::<u8>(size).ok()
}

#[cfg(test)]
mod tests;
