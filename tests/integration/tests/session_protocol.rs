//! Integration tests for the exported entry points
//!
//! Drives the C-callable exports the way a host would: initialize, load
//! data, execute a script, then read results back through raw pointers.

use std::ffi::{CStr, CString, c_char};
use std::fs;
use std::path::PathBuf;

use plwasm_core::{ENTRY_SENTINEL, split_entries};
use plwasm_wasm::{
    add_include_file, execute_pattern_language_code, get_console_result, get_formatted_result,
    get_formatters, initialize, set_data,
};
use pretty_assertions::assert_eq;
use rstest::rstest;
use serde_json::Value;

const PNG_PREFIX: [u8; 16] = [
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

fn read(ptr: *const c_char) -> Vec<u8> {
    // SAFETY: the exports only return pointers to live, NUL-terminated buffers.
    unsafe { CStr::from_ptr(ptr) }.to_bytes().to_vec()
}

/// A fresh host session on the current test thread.
struct Host;

impl Host {
    fn start() -> Self {
        initialize();
        let common = fixture("includes/common.pat");
        Self::add_include("/sources/includes/common.pat", &common);
        Host
    }

    fn add_include(path: &str, contents: &str) {
        let path = CString::new(path).unwrap();
        let contents = CString::new(contents).unwrap();
        // SAFETY: both strings are NUL-terminated.
        unsafe { add_include_file(path.as_ptr(), contents.as_ptr()) };
    }

    fn load(&self, bytes: &[u8]) {
        // SAFETY: bytes is valid for its length.
        unsafe { set_data(bytes.as_ptr(), bytes.len()) };
    }

    fn execute(&self, code: &str) -> Vec<u8> {
        let code = CString::new(code).unwrap();
        // SAFETY: code is NUL-terminated.
        read(unsafe { execute_pattern_language_code(code.as_ptr()) })
    }

    fn console(&self) -> Vec<String> {
        split_entries(&read(get_console_result()))
    }

    fn formatted(&self, name: &str) -> String {
        let name = CString::new(name).unwrap();
        // SAFETY: name is NUL-terminated.
        let bytes = read(unsafe { get_formatted_result(name.as_ptr()) });
        String::from_utf8(bytes).unwrap()
    }
}

mod execution {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn decodes_png_header() {
        let host = Host::start();
        host.load(&PNG_PREFIX);
        host.execute(&fixture("png_header.pat"));

        assert_eq!(host.console(), vec!["[INFO]  header chunk of 13 bytes"]);
    }

    #[test]
    fn every_entry_ends_with_sentinel() {
        let host = Host::start();
        host.load(&[1, 2]);
        let raw = host.execute(
            "#pragma debug\nu8 a @ 0;\nstd::warning(\"line one\\nline two\");\nu8 b @ 1;",
        );

        assert_eq!(raw.iter().filter(|&&b| b == ENTRY_SENTINEL).count(), 3);
        assert!(raw.ends_with(&[b'\n', ENTRY_SENTINEL]));
        assert_eq!(
            host.console(),
            vec![
                "[DEBUG] placing 'a' of type 'u8' at 0x0",
                "[WARN]  line one\nline two",
                "[DEBUG] placing 'b' of type 'u8' at 0x1",
            ]
        );
    }

    #[test]
    fn parse_failure_is_single_located_entry() {
        let host = Host::start();
        host.load(&PNG_PREFIX);
        host.execute(&fixture("broken.pat"));

        let console = host.console();
        assert_eq!(console.len(), 1);
        assert!(console[0].starts_with("[ERROR] 4:1 -> "), "{}", console[0]);
    }

    #[test]
    fn runtime_error_follows_earlier_output() {
        let host = Host::start();
        host.load(&[0xFF]);
        host.execute("std::print(\"checking\");\nstd::assert(std::mem::size() > 4, \"too small\");");

        assert_eq!(
            host.console(),
            vec!["[INFO]  checking", "[ERROR] 2:1 -> assertion failed: too small"]
        );
    }

    #[test]
    fn missing_data_reports_out_of_bounds() {
        let host = Host::start();
        host.execute("u8 x @ 0x00;");

        assert_eq!(
            host.console(),
            vec![
                "[ERROR] 1:1 -> pattern 'x' at 0x0 with size 0x1 is outside of the data source (0x0 - 0x0)"
            ]
        );
    }

    #[test]
    fn console_is_cleared_per_execution() {
        let host = Host::start();
        host.load(&[1]);
        host.execute("std::error(\"first run failed\");");
        host.execute("std::print(\"second run\");");

        assert_eq!(host.console(), vec!["[INFO]  second run"]);
    }

    #[test]
    fn reexecution_reuses_loaded_data() {
        let host = Host::start();
        host.load(&[0x2A]);
        host.execute("u8 x @ 0;");
        host.execute("u8 y @ 0;\nstd::print(\"{}\", y);");

        assert_eq!(host.console(), vec!["[INFO]  42"]);
    }

    #[test]
    fn console_reads_are_idempotent() {
        let host = Host::start();
        host.load(&[1]);
        host.execute("std::print(\"once\");");

        assert_eq!(read(get_console_result()), read(get_console_result()));
    }

    #[test]
    fn dangerous_functions_are_denied() {
        let host = Host::start();
        host.execute("std::print(\"{}\", std::file::exists(\"/sources/includes/common.pat\"));");

        assert_eq!(
            host.console(),
            vec!["[ERROR] 1:18 -> calling of dangerous function 'std::file::exists' is not allowed"]
        );
    }
}

mod bounds {
    use super::*;
    use pretty_assertions::assert_eq;

    #[rstest]
    #[case::deep_parentheses(
        format!("std::print(\"{{}}\", {}1{});", "(".repeat(10_000), ")".repeat(10_000)),
        "[ERROR] 1:80 -> nesting depth limit of 64 exceeded"
    )]
    #[case::unary_prefixes(
        format!("u8 x = {}1;", "-".repeat(100_000)),
        "[ERROR] 1:71 -> nesting depth limit of 64 exceeded"
    )]
    #[case::format_width(
        "std::print(\"{:99999999999}\", 1);".to_string(),
        "[ERROR] 1:1 -> invalid format specifier '{:99999999999}'"
    )]
    #[case::pragma_ceiling(
        "#pragma loop_limit 0xFFFFFFFF\nu8 x @ 0;".to_string(),
        "[ERROR] 1:1 -> value 4294967295 for pragma 'loop_limit' exceeds the maximum of 16777216"
    )]
    #[case::base_address_overflow(
        "#pragma base_address 0xFFFFFFFFFFFFFFFF\nu8 x @ 0;".to_string(),
        "[ERROR] 1:1 -> base address 0xFFFFFFFFFFFFFFFF leaves no room for 0x10 bytes of data"
    )]
    fn hostile_script_becomes_error_entry(#[case] code: String, #[case] expected: &str) {
        let host = Host::start();
        host.load(&PNG_PREFIX);
        host.execute(&code);

        assert_eq!(host.console(), vec![expected]);
    }

    #[test]
    fn session_survives_rejected_script() {
        let host = Host::start();
        host.load(&[0x2A]);
        host.execute(&format!("{}1;", "(".repeat(10_000)));
        host.execute("u8 x @ 0;\nstd::print(\"{}\", x);");

        assert_eq!(host.console(), vec!["[INFO]  42"]);
    }
}

mod formatting {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lists_catalog() {
        let names = String::from_utf8(read(get_formatters())).unwrap();
        assert_eq!(names.split(',').collect::<Vec<_>>(), vec!["json", "yaml", "html"]);
        assert_eq!(read(get_formatters()), names.into_bytes());
    }

    #[test]
    fn json_reflects_first_byte() {
        let host = Host::start();
        host.load(&[0x01, 0x02, 0x03]);
        host.execute("u8 x @ 0x00;");

        assert_eq!(
            host.formatted("json"),
            r#"{
  "x": {
    "__type": "u8",
    "__address": 0,
    "__size": 1,
    "value": 1
  }
}"#
        );
    }

    #[test]
    fn html_shows_hex_value() {
        let host = Host::start();
        host.load(&[0x01, 0x02, 0x03]);
        host.execute("u8 x @ 0x00;");

        let html = host.formatted("html");
        assert!(html.contains("1 (0x01)"), "{html}");
        assert!(html.contains("0x00000000"), "{html}");
    }

    #[test]
    fn renders_nested_structures() {
        let host = Host::start();
        host.load(&PNG_PREFIX);
        host.execute(&fixture("png_header.pat"));

        let yaml = host.formatted("yaml");
        assert!(yaml.contains("first_chunk:"), "{yaml}");
        assert!(yaml.contains("__comment: \"image header\""), "{yaml}");
        assert!(yaml.contains("value: \"ChunkKind::Header\""), "{yaml}");
        assert!(yaml.contains("value: \"PNG\""), "{yaml}");
    }

    #[test]
    fn duplicate_names_keep_every_pattern() {
        let host = Host::start();
        host.load(&[0x01, 0x02, 0x03]);
        host.execute(
            "u8 x @ 0;\nu8 x @ 1;\nstruct S { u8 a; u8 a; };\nS s @ 0;\nu8 p @ 2 [[name(\"x\")]];",
        );

        let json: Value = serde_json::from_str(&host.formatted("json")).unwrap();
        assert_eq!(json["x"]["__address"], 0);
        assert_eq!(json["x"]["value"], 1);
        assert_eq!(json["x_1"]["value"], 2);
        assert_eq!(json["x_2"]["__address"], 2);
        assert_eq!(json["s"]["a"]["value"], 1);
        assert_eq!(json["s"]["a_1"]["__address"], 1);

        let yaml = host.formatted("yaml");
        assert!(yaml.contains("\nx_1:\n"), "{yaml}");
        assert!(yaml.contains("\nx_2:\n"), "{yaml}");
    }

    #[test]
    fn unknown_formatter_returns_sentinel() {
        let host = Host::start();
        host.load(&[0x01]);
        let console = host.execute("u8 x @ 0;");
        let json = host.formatted("json");

        assert_eq!(host.formatted("pretty"), "Invalid Formatter!");
        assert_eq!(read(get_console_result()), console);
        assert_eq!(host.formatted("json"), json);
    }

    #[test]
    fn formatting_does_not_touch_console() {
        let host = Host::start();
        host.load(&[0x01]);
        host.execute("std::print(\"kept\");\nu8 x @ 0;");
        let console = get_console_result();

        host.formatted("yaml");
        host.formatted("html");

        assert_eq!(get_console_result(), console);
        assert_eq!(host.console(), vec!["[INFO]  kept"]);
    }
}
