use std::ffi::{CStr, CString};

use pretty_assertions::assert_eq;
use rstest::rstest;

use super::*;

fn text(ptr: *const c_char) -> Vec<u8> {
    assert!(!ptr.is_null());
    // SAFETY: every export returns a pointer into a live slot or a static.
    unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec()
}

fn execute(code: &str) -> Vec<u8> {
    let code = CString::new(code).unwrap();
    // SAFETY: code is NUL-terminated.
    text(unsafe { execute_pattern_language_code(code.as_ptr()) })
}

fn formatted(name: &str) -> Vec<u8> {
    let name = CString::new(name).unwrap();
    // SAFETY: name is NUL-terminated.
    text(unsafe { get_formatted_result(name.as_ptr()) })
}

fn load(bytes: &[u8]) {
    // SAFETY: bytes is valid for its length.
    unsafe { set_data(bytes.as_ptr(), bytes.len()) };
}

#[test]
fn test_console_is_empty_before_execution() {
    initialize();
    assert_eq!(text(get_console_result()), b"");
}

#[test]
fn test_execute_returns_console_pointer() {
    initialize();
    load(&[1]);
    let code = CString::new("std::print(\"hi\");").unwrap();
    // SAFETY: code is NUL-terminated.
    let returned = unsafe { execute_pattern_language_code(code.as_ptr()) };

    assert_eq!(returned, get_console_result());
    assert_eq!(text(returned), b"[INFO]  hi\n\xAA");
}

#[test]
fn test_formatters_list() {
    assert_eq!(text(get_formatters()), b"json,yaml,html");
    assert_eq!(get_formatters(), get_formatters());
}

#[test]
fn test_formatted_result_reflects_data() {
    initialize();
    load(&[0x01, 0x02, 0x03]);
    execute("u8 x @ 0x00;");

    let json = String::from_utf8(formatted("json")).unwrap();
    assert!(json.contains("\"value\": 1"), "{json}");
    let html = String::from_utf8(formatted("html")).unwrap();
    assert!(html.contains("0x01"), "{html}");
}

#[rstest]
#[case::unknown("pretty")]
#[case::wrong_case("Json")]
#[case::empty("")]
fn test_unknown_formatter_sentinel(#[case] name: &str) {
    initialize();
    load(&[7]);
    execute("u8 x @ 0;");
    let yaml = formatted("yaml");
    let console = text(get_console_result());

    assert_eq!(formatted(name), b"Invalid Formatter!");

    let name = CString::new(name).unwrap();
    // SAFETY: name is NUL-terminated.
    let sentinel = unsafe { get_formatted_result(name.as_ptr()) };
    assert_eq!(sentinel, INVALID_FORMATTER.as_ptr());
    assert_eq!(text(get_console_result()), console);
    with_binding(|binding| {
        assert_eq!(binding.buffers.formatted.as_c_str().to_bytes(), yaml);
        assert_eq!(binding.session.data().as_slice(), &[7]);
    });
}

#[test]
fn test_console_and_formatted_slots_are_independent() {
    initialize();
    load(&[1]);
    execute("std::print(\"log\");\nu8 x @ 0;");

    let console = get_console_result();
    let before = text(console);
    formatted("json");
    formatted("html");

    assert_eq!(get_console_result(), console);
    assert_eq!(text(console), before);
}

#[test]
fn test_null_arguments_are_tolerated() {
    initialize();
    // SAFETY: null is accepted by every pointer argument.
    unsafe {
        set_data(ptr::null(), 16);
        add_include_file(ptr::null(), ptr::null());
        assert_eq!(text(execute_pattern_language_code(ptr::null())), b"");
        assert_eq!(text(get_formatted_result(ptr::null())), b"Invalid Formatter!");
    }
}

#[test]
fn test_include_file_export() {
    initialize();
    load(&[0x10, 0x00]);
    let path = CString::new("/sources/patterns/word.pat").unwrap();
    let contents = CString::new("struct Word { u16 v; };").unwrap();
    // SAFETY: both strings are NUL-terminated.
    unsafe { add_include_file(path.as_ptr(), contents.as_ptr()) };

    let console = execute("#include \"word.pat\"\nWord w @ 0;\nstd::print(\"{}\", w.v);");
    assert_eq!(console, b"[INFO]  16\n\xAA");
}

#[test]
fn test_errors_become_console_entries() {
    initialize();
    let console = execute("u8 x @ 0x00;");
    assert_eq!(
        console,
        b"[ERROR] 1:1 -> pattern 'x' at 0x0 with size 0x1 is outside of the data source (0x0 - 0x0)\n\xAA"
    );
}

#[test]
fn test_allocate_round_trip() {
    assert!(allocate(0).is_null());

    let buffer = allocate(4);
    assert!(!buffer.is_null());
    // SAFETY: buffer was allocated with four bytes.
    unsafe {
        buffer.copy_from_nonoverlapping([9u8, 8, 7, 6].as_ptr(), 4);
        set_data(buffer, 4);
        deallocate(buffer, 4);
        deallocate(ptr::null_mut(), 4);
    }
    with_binding(|binding| assert_eq!(binding.session.data().as_slice(), &[9, 8, 7, 6]));
}
