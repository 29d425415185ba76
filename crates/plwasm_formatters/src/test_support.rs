//! Pattern builders shared by the formatter tests.

use plwasm_ast::Endian;
use plwasm_runtime::{Pattern, PatternAttributes, PatternValue};

pub fn leaf(name: &str, type_name: &str, offset: u64, size: u64, value: PatternValue) -> Pattern {
    Pattern {
        variable_name: name.into(),
        type_name: type_name.into(),
        offset,
        size,
        endian: Endian::Little,
        value,
        attributes: PatternAttributes::default(),
    }
}

/// `struct Header { u8 magic; u16 length[1]; }` placed at 0x10.
pub fn header() -> Pattern {
    let magic = leaf("magic", "u8", 0x10, 1, PatternValue::Unsigned(0x7F));
    let first = leaf("[0]", "u16", 0x11, 2, PatternValue::Unsigned(0x1234));
    let lengths = leaf("length", "u16[1]", 0x11, 2, PatternValue::Array(vec![first]));
    leaf(
        "hdr",
        "Header",
        0x10,
        3,
        PatternValue::Struct(vec![magic, lengths]),
    )
}
