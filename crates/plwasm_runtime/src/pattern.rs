//! The evaluated pattern tree.

use plwasm_ast::Endian;

/// A named, typed region of the data source produced by a placement.
#[derive(Debug, Clone, PartialEq)]
pub struct Pattern {
    pub variable_name: String,
    pub type_name: String,
    /// Absolute address, including the data source's base address.
    pub offset: u64,
    pub size: u64,
    pub endian: Endian,
    pub value: PatternValue,
    pub attributes: PatternAttributes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatternValue {
    Unsigned(u128),
    Signed(i128),
    Float(f64),
    Boolean(bool),
    Character(char),
    String(String),
    Enum {
        value: u128,
        /// `None` when the value matches no variant.
        variant: Option<String>,
    },
    Bitfield(Vec<BitfieldField>),
    Struct(Vec<Pattern>),
    Union(Vec<Pattern>),
    Array(Vec<Pattern>),
}

/// One named entry of a bitfield. Padding entries are not recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitfieldField {
    pub name: String,
    /// Offset from the least significant bit of the bitfield.
    pub bit_offset: u32,
    pub bit_size: u32,
    pub value: u128,
}

/// Presentation hints set through `[[...]]` attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternAttributes {
    pub display_name: Option<String>,
    /// `0xRRGGBB`
    pub color: Option<u32>,
    pub comment: Option<String>,
    pub hidden: bool,
}

impl Pattern {
    /// Name shown to users, honouring `[[name(...)]]`.
    pub fn display_name(&self) -> &str {
        self.attributes
            .display_name
            .as_deref()
            .unwrap_or(&self.variable_name)
    }

    pub fn is_hidden(&self) -> bool {
        self.attributes.hidden
    }

    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Child patterns of structs, unions and arrays.
    pub fn children(&self) -> Option<&[Pattern]> {
        match &self.value {
            PatternValue::Struct(children)
            | PatternValue::Union(children)
            | PatternValue::Array(children) => Some(children),
            _ => None,
        }
    }

    /// Looks up a struct or union member by variable name.
    pub fn member(&self, name: &str) -> Option<&Pattern> {
        match &self.value {
            PatternValue::Struct(children) | PatternValue::Union(children) => {
                children.iter().find(|c| c.variable_name == name)
            }
            _ => None,
        }
    }

    /// Human readable rendering of a leaf value.
    ///
    /// Composite patterns render as their type name, as a hex viewer would.
    pub fn format_value(&self) -> String {
        match &self.value {
            PatternValue::Unsigned(v) => v.to_string(),
            PatternValue::Signed(v) => v.to_string(),
            PatternValue::Float(v) => v.to_string(),
            PatternValue::Boolean(v) => v.to_string(),
            PatternValue::Character(c) => format!("'{}'", c.escape_default()),
            PatternValue::String(s) => format!("\"{}\"", s.escape_default()),
            PatternValue::Enum {
                value,
                variant: Some(variant),
            } => format!("{}::{variant} ({value:#X})", self.type_name),
            PatternValue::Enum {
                value,
                variant: None,
            } => format!("{}::??? ({value:#X})", self.type_name),
            PatternValue::Bitfield(fields) => {
                let body = fields
                    .iter()
                    .map(|f| format!("{} = {}", f.name, f.value))
                    .collect::<Vec<_>>()
                    .join(" | ");
                format!("{{ {body} }}")
            }
            PatternValue::Struct(_) | PatternValue::Union(_) | PatternValue::Array(_) => {
                self.type_name.clone()
            }
        }
    }
}
