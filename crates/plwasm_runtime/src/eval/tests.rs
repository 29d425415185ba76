use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::log::LogLevel;
use crate::pattern::{BitfieldField, Pattern, PatternValue};
use crate::runtime::{PatternLanguage, PatternRuntime};
use crate::{ErrorKind, ExecutionError};

fn run(bytes: &[u8], code: &str) -> Result<PatternLanguage, ExecutionError> {
    let mut runtime = PatternLanguage::new();
    let data: Arc<[u8]> = Arc::from(bytes.to_vec());
    runtime.set_data_source(0x00, Box::new(data));
    runtime.execute_string(code)?;
    Ok(runtime)
}

fn messages(runtime: &PatternLanguage) -> Vec<String> {
    runtime
        .console_log()
        .iter()
        .map(|entry| entry.message.clone())
        .collect()
}

fn top<'r>(runtime: &'r PatternLanguage, name: &str) -> &'r Pattern {
    runtime
        .patterns()
        .iter()
        .find(|p| p.variable_name == name)
        .unwrap()
}

#[rstest]
#[case::little("u16 v @ 0;", PatternValue::Unsigned(0x0201))]
#[case::big_prefix("be u16 v @ 0;", PatternValue::Unsigned(0x0102))]
#[case::pragma("#pragma endian big\nu16 v @ 0;", PatternValue::Unsigned(0x0102))]
#[case::signed("s8 v @ 3;", PatternValue::Signed(-1))]
#[case::character("char v @ 4;", PatternValue::Character('A'))]
#[case::boolean("bool v @ 0;", PatternValue::Boolean(true))]
fn test_builtin_placements(#[case] code: &str, #[case] expected: PatternValue) {
    let runtime = run(&[0x01, 0x02, 0x00, 0xFF, 0x41], code).unwrap();
    assert_eq!(top(&runtime, "v").value, expected);
}

#[test]
fn test_struct_fields_are_sequential() {
    let code = r#"
        struct Header {
            u8 magic;
            u16 length;
            padding[1];
            u8 tail;
        };
        Header hdr @ 0x01;
    "#;
    let runtime = run(&[0xFF, 0x7F, 0x34, 0x12, 0x00, 0x09], code).unwrap();
    let hdr = top(&runtime, "hdr");

    assert_eq!(hdr.offset, 1);
    assert_eq!(hdr.size, 5);
    let fields: Vec<_> = hdr
        .children()
        .unwrap()
        .iter()
        .map(|p| (p.variable_name.as_str(), p.offset, p.format_value()))
        .collect();
    assert_eq!(
        fields,
        vec![
            ("magic", 1, "127".to_string()),
            ("length", 2, "4660".to_string()),
            ("tail", 5, "9".to_string()),
        ]
    );
}

#[test]
fn test_union_members_overlap() {
    let code = "union Word { u16 whole; u8 bytes[2]; };\nWord w @ 0;";
    let runtime = run(&[0x01, 0x02], code).unwrap();
    let word = top(&runtime, "w");

    assert_eq!(word.size, 2);
    assert!(matches!(word.value, PatternValue::Union(_)));
    assert_eq!(word.member("whole").unwrap().offset, 0);
    assert_eq!(word.member("bytes").unwrap().offset, 0);
}

#[test]
fn test_fields_drive_later_fields() {
    let code = r#"
        struct Blob {
            u8 count;
            u8 items[count];
            if (count > 1) {
                u8 extra;
            }
        };
        Blob blob @ 0;
    "#;
    let runtime = run(&[2, 10, 20, 30], code).unwrap();
    let blob = top(&runtime, "blob");

    assert_eq!(blob.size, 4);
    assert_eq!(blob.member("items").unwrap().type_name, "u8[2]");
    assert_eq!(blob.member("extra").unwrap().format_value(), "30");
}

#[test]
fn test_enum_and_bitfield() {
    let code = r#"
        enum Kind : u8 { Zero, One, Ten = 10 };
        bitfield Flags { low : 4; padding : 2; high : 2; };
        Kind a @ 0;
        Kind b @ 1;
        Flags f @ 2;
        if (a == Kind::Ten) std::print("ten");
    "#;
    let runtime = run(&[10, 3, 0b1100_0101], code).unwrap();

    assert_eq!(
        top(&runtime, "a").value,
        PatternValue::Enum {
            value: 10,
            variant: Some("Ten".into())
        }
    );
    assert_eq!(
        top(&runtime, "b").value,
        PatternValue::Enum {
            value: 3,
            variant: None
        }
    );
    assert_eq!(
        top(&runtime, "f").value,
        PatternValue::Bitfield(vec![
            BitfieldField {
                name: "low".into(),
                bit_offset: 0,
                bit_size: 4,
                value: 5
            },
            BitfieldField {
                name: "high".into(),
                bit_offset: 6,
                bit_size: 2,
                value: 3
            },
        ])
    );
    assert_eq!(messages(&runtime), vec!["ten"]);
}

#[test]
fn test_char_array_is_string() {
    let runtime = run(b"PNG\0", "char magic[4] @ 0;").unwrap();
    let magic = top(&runtime, "magic");
    assert_eq!(magic.value, PatternValue::String("PNG".into()));
    assert_eq!(magic.size, 4);
}

#[test]
fn test_while_sized_array_stops_at_terminator() {
    let runtime = run(&[5, 6, 0, 9], "u8 bytes[while(std::mem::read_unsigned($, 1) != 0)] @ 0;")
        .unwrap();
    assert_eq!(top(&runtime, "bytes").children().unwrap().len(), 2);
}

#[test]
fn test_functions_locals_and_loops() {
    let code = r#"
        fn square(u32 v) { return v * v; };
        u32 total = 0;
        u32 i = 1;
        while (i <= 3) {
            total += square(i);
            i += 1;
        }
        std::print("total={} hex={:#04x}", total, total);
    "#;
    let runtime = run(&[], code).unwrap();
    assert_eq!(messages(&runtime), vec!["total=14 hex=0x0e"]);
    assert!(runtime.patterns().is_empty());
}

#[test]
fn test_attributes() {
    let code = r#"u8 x @ 0 [[name("Magic"), color("FF0000"), comment("first"), hidden]];"#;
    let runtime = run(&[1], code).unwrap();
    let attributes = &top(&runtime, "x").attributes;

    assert_eq!(attributes.display_name.as_deref(), Some("Magic"));
    assert_eq!(attributes.color, Some(0xFF0000));
    assert_eq!(attributes.comment.as_deref(), Some("first"));
    assert!(attributes.hidden);
}

#[test]
fn test_sizeof_and_addressof() {
    let code = r#"
        struct Pair { u8 a; u16 b; };
        Pair p @ 1;
        std::print("{} {} {} {}", sizeof(p), addressof(p.b), sizeof(u32), sizeof("abc"));
    "#;
    let runtime = run(&[0; 4], code).unwrap();
    assert_eq!(messages(&runtime), vec!["3 2 4 3"]);
}

#[test]
fn test_log_levels_in_order() {
    let code = "#pragma debug\nstd::warning(\"careful\");\nu8 x @ 0;\nstd::assert_warn(false, \"soft\");";
    let runtime = run(&[1], code).unwrap();
    let levels: Vec<_> = runtime.console_log().iter().map(|e| e.level).collect();
    assert_eq!(
        levels,
        vec![LogLevel::Warning, LogLevel::Debug, LogLevel::Warning]
    );
    assert_eq!(
        messages(&runtime),
        vec![
            "careful".to_string(),
            "placing 'x' of type 'u8' at 0x0".to_string(),
            "assertion failed: soft".to_string(),
        ]
    );
}

#[test]
fn test_placement_without_data_is_out_of_bounds() {
    let mut runtime = PatternLanguage::new();
    let err = runtime.execute_string("u32 x @ 0x00;").unwrap_err();

    assert_eq!(err.kind, ErrorKind::OutOfBounds);
    assert_eq!((err.line, err.column), (1, 1));
    assert_eq!(
        err.message,
        "pattern 'x' at 0x0 with size 0x4 is outside of the data source (0x0 - 0x0)"
    );
}

#[test]
fn test_base_address_pragma_moves_data() {
    let runtime = run(&[7], "#pragma base_address 0x100\nu8 x @ 0x100;").unwrap();
    assert_eq!(top(&runtime, "x").offset, 0x100);
    assert!(run(&[7], "#pragma base_address 0x100\nu8 x @ 0;").is_err());
}

#[rstest]
#[case::unknown_type("Missing m @ 0;", ErrorKind::Evaluator, "unknown type 'Missing'")]
#[case::redefinition(
    "struct A {};\nstruct A {};",
    ErrorKind::Evaluator,
    "redefinition of type 'A'"
)]
#[case::unplaced_struct(
    "struct A { u8 x; };\nA a;",
    ErrorKind::Evaluator,
    "custom type variables must be placed with '@' ('a' of type 'A')"
)]
#[case::division("u8 x = 1 / 0;", ErrorKind::Evaluator, "division by zero")]
#[case::loop_limit(
    "#pragma loop_limit 3\nwhile (true) {}",
    ErrorKind::Limit,
    "loop limit of 3 exceeded"
)]
#[case::array_limit(
    "#pragma array_limit 2\nu8 a[3] @ 0;",
    ErrorKind::Limit,
    "array limit of 2 exceeded"
)]
#[case::recursion(
    "fn f(u8 n) { return f(n); };\nf(1);",
    ErrorKind::Limit,
    "evaluation depth limit of 32 exceeded"
)]
#[case::unknown_attribute(
    "u8 x @ 0 [[sparkle]];",
    ErrorKind::Evaluator,
    "unknown attribute 'sparkle'"
)]
#[case::assertion("std::assert(1 == 2, \"math\");", ErrorKind::Aborted, "assertion failed: math")]
#[case::placement_in_function(
    "fn f() { u8 x @ 0; };\nf();",
    ErrorKind::Evaluator,
    "placement of variable 'x' is not allowed inside functions"
)]
#[case::read_string_limit(
    "#pragma array_limit 2\nstd::mem::read_string(0, 3);",
    ErrorKind::Limit,
    "array limit of 2 exceeded"
)]
#[case::format_width(
    "std::print(\"{:99999999999}\", 1);",
    ErrorKind::Evaluator,
    "invalid format specifier '{:99999999999}'"
)]
#[case::concatenated_string(
    "str s = \"ab\";\nwhile (true) s = s + s;",
    ErrorKind::Limit,
    "string length limit of 65536 exceeded"
)]
#[case::formatted_string(
    "str s = \"ab\";\nwhile (true) s = std::format(\"{}{}\", s, s);",
    ErrorKind::Limit,
    "string length limit of 65536 exceeded"
)]
#[case::console_output(
    "while (true) std::print(\"{:4096}\", 1);",
    ErrorKind::Limit,
    "console output limit of 8388608 exceeded"
)]
#[case::nesting_across_calls(
    "#pragma eval_depth 64\nfn f(u32 n) { return -(-(-(f(n)))); };\nf(0);",
    ErrorKind::Limit,
    "nesting depth limit of 192 exceeded"
)]
#[case::eval_depth_ceiling(
    "#pragma eval_depth 1000000\nu8 x @ 0;",
    ErrorKind::Evaluator,
    "value 1000000 for pragma 'eval_depth' exceeds the maximum of 64"
)]
#[case::base_address_overflow(
    "#pragma base_address 0xFFFFFFFFFFFFFFFF\nu8 x @ 0;",
    ErrorKind::Evaluator,
    "base address 0xFFFFFFFFFFFFFFFF leaves no room for 0x8 bytes of data"
)]
#[case::deep_parentheses(
    &format!("u8 x = {}1{};", "(".repeat(10_000), ")".repeat(10_000)),
    ErrorKind::Parser,
    "nesting depth limit of 64 exceeded"
)]
fn test_evaluation_errors(
    #[case] code: &str,
    #[case] kind: ErrorKind,
    #[case] message: &str,
) {
    let err = run(&[0; 8], code).err().unwrap();
    assert_eq!(err.kind, kind);
    assert_eq!(err.message, message);
}

#[test]
fn test_error_location_points_at_statement() {
    let err = run(&[], "u8 a = 1;\n\n   u8 b = a / 0;").err().unwrap();
    assert_eq!((err.line, err.column), (3, 11));
}
