//! Builtin type table and raw value decoding.

use plwasm_ast::Endian;

use crate::pattern::PatternValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BuiltinKind {
    Unsigned,
    Signed,
    Float,
    Char,
    Bool,
    /// Only valid for local variables.
    Str,
}

/// A type the language knows without a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BuiltinType {
    pub name: &'static str,
    pub kind: BuiltinKind,
    pub size: u64,
}

const BUILTINS: &[BuiltinType] = &[
    BuiltinType::new("u8", BuiltinKind::Unsigned, 1),
    BuiltinType::new("u16", BuiltinKind::Unsigned, 2),
    BuiltinType::new("u32", BuiltinKind::Unsigned, 4),
    BuiltinType::new("u64", BuiltinKind::Unsigned, 8),
    BuiltinType::new("u128", BuiltinKind::Unsigned, 16),
    BuiltinType::new("s8", BuiltinKind::Signed, 1),
    BuiltinType::new("s16", BuiltinKind::Signed, 2),
    BuiltinType::new("s32", BuiltinKind::Signed, 4),
    BuiltinType::new("s64", BuiltinKind::Signed, 8),
    BuiltinType::new("s128", BuiltinKind::Signed, 16),
    BuiltinType::new("float", BuiltinKind::Float, 4),
    BuiltinType::new("double", BuiltinKind::Float, 8),
    BuiltinType::new("char", BuiltinKind::Char, 1),
    BuiltinType::new("bool", BuiltinKind::Bool, 1),
    BuiltinType::new("str", BuiltinKind::Str, 0),
];

impl BuiltinType {
    const fn new(name: &'static str, kind: BuiltinKind, size: u64) -> Self {
        Self { name, kind, size }
    }

    pub fn lookup(name: &str) -> Option<BuiltinType> {
        BUILTINS.iter().find(|t| t.name == name).copied()
    }

    pub fn is_placeable(&self) -> bool {
        self.kind != BuiltinKind::Str
    }

    /// Decodes `bytes` (exactly `self.size` long) into a pattern value.
    pub fn decode(&self, bytes: &[u8], endian: Endian) -> PatternValue {
        match self.kind {
            BuiltinKind::Unsigned => PatternValue::Unsigned(read_unsigned(bytes, endian)),
            BuiltinKind::Signed => PatternValue::Signed(sign_extend(
                read_unsigned(bytes, endian),
                self.size as u32 * 8,
            )),
            BuiltinKind::Float => {
                let raw = read_unsigned(bytes, endian);
                let value = if self.size == 4 {
                    f32::from_bits(raw as u32) as f64
                } else {
                    f64::from_bits(raw as u64)
                };
                PatternValue::Float(value)
            }
            BuiltinKind::Char => PatternValue::Character(char::from(bytes[0])),
            BuiltinKind::Bool => PatternValue::Boolean(bytes[0] != 0),
            BuiltinKind::Str => PatternValue::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    }
}

/// Assembles up to 16 bytes into an integer in the given byte order.
pub(crate) fn read_unsigned(bytes: &[u8], endian: Endian) -> u128 {
    let fold = |acc: u128, b: &u8| (acc << 8) | u128::from(*b);
    match endian {
        Endian::Big => bytes.iter().fold(0, fold),
        Endian::Little => bytes.iter().rev().fold(0, fold),
    }
}

/// Interprets the low `bits` of `raw` as a two's complement number.
pub(crate) fn sign_extend(raw: u128, bits: u32) -> i128 {
    if bits == 0 || bits >= 128 {
        return raw as i128;
    }
    let shift = 128 - bits;
    ((raw << shift) as i128) >> shift
}

/// Keeps the low `bits` of `value`.
pub(crate) fn truncate(value: u128, bits: u32) -> u128 {
    if bits >= 128 {
        value
    } else {
        value & ((1u128 << bits) - 1)
    }
}
