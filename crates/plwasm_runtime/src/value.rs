//! Values produced by expression evaluation.

use std::fmt;

use crate::pattern::{Pattern, PatternValue};
use crate::types::{BuiltinKind, BuiltinType, sign_extend, truncate};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Value {
    Unsigned(u128),
    Signed(i128),
    Float(f64),
    Bool(bool),
    Char(char),
    Str(String),
    /// A struct, union, array or bitfield pattern.
    Pattern(Box<Pattern>),
    Void,
}

impl Value {
    /// Converts a pattern to the value an expression sees when naming it.
    pub fn from_pattern(pattern: &Pattern) -> Value {
        match &pattern.value {
            PatternValue::Unsigned(v) => Value::Unsigned(*v),
            PatternValue::Signed(v) => Value::Signed(*v),
            PatternValue::Float(v) => Value::Float(*v),
            PatternValue::Boolean(v) => Value::Bool(*v),
            PatternValue::Character(c) => Value::Char(*c),
            PatternValue::String(s) => Value::Str(s.clone()),
            PatternValue::Enum { value, .. } => Value::Unsigned(*value),
            PatternValue::Bitfield(_)
            | PatternValue::Struct(_)
            | PatternValue::Union(_)
            | PatternValue::Array(_) => Value::Pattern(Box::new(pattern.clone())),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unsigned(_) => "unsigned integer",
            Value::Signed(_) => "signed integer",
            Value::Float(_) => "floating point",
            Value::Bool(_) => "boolean",
            Value::Char(_) => "character",
            Value::Str(_) => "string",
            Value::Pattern(_) => "pattern",
            Value::Void => "void",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Value::Float(_))
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Value::Signed(_))
    }

    /// Integer view of a scalar; `None` for strings, patterns and void.
    pub fn as_u128(&self) -> Option<u128> {
        Some(match self {
            Value::Unsigned(v) => *v,
            Value::Signed(v) => *v as u128,
            Value::Float(v) => *v as u128,
            Value::Bool(v) => u128::from(*v),
            Value::Char(c) => u128::from(u32::from(*c)),
            _ => return None,
        })
    }

    pub fn as_i128(&self) -> Option<i128> {
        Some(match self {
            Value::Signed(v) => *v,
            Value::Float(v) => *v as i128,
            other => other.as_u128()? as i128,
        })
    }

    pub fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Value::Float(v) => *v,
            Value::Signed(v) => *v as f64,
            other => other.as_u128()? as f64,
        })
    }

    /// Truthiness used by conditions: non-zero scalars and non-empty strings.
    pub fn truthy(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Float(v) => Some(*v != 0.0),
            Value::Str(s) => Some(!s.is_empty()),
            Value::Pattern(_) | Value::Void => None,
            other => other.as_u128().map(|v| v != 0),
        }
    }

    /// Converts to the representation of a builtin local variable type.
    pub fn cast(self, ty: BuiltinType) -> Option<Value> {
        let bits = (ty.size * 8) as u32;
        Some(match ty.kind {
            BuiltinKind::Unsigned => Value::Unsigned(truncate(self.as_u128()?, bits)),
            BuiltinKind::Signed => {
                Value::Signed(sign_extend(truncate(self.as_i128()? as u128, bits), bits))
            }
            BuiltinKind::Float if ty.size == 4 => Value::Float(self.as_f64()? as f32 as f64),
            BuiltinKind::Float => Value::Float(self.as_f64()?),
            BuiltinKind::Bool => Value::Bool(self.truthy()?),
            BuiltinKind::Char => match self {
                Value::Char(c) => Value::Char(c),
                other => Value::Char(char::from(truncate(other.as_u128()?, 8) as u8)),
            },
            BuiltinKind::Str => match self {
                Value::Str(s) => Value::Str(s),
                Value::Pattern(_) | Value::Void => return None,
                other => Value::Str(other.to_string()),
            },
        })
    }

    /// Zero value of a builtin type.
    pub fn default_for(ty: BuiltinType) -> Value {
        match ty.kind {
            BuiltinKind::Unsigned => Value::Unsigned(0),
            BuiltinKind::Signed => Value::Signed(0),
            BuiltinKind::Float => Value::Float(0.0),
            BuiltinKind::Bool => Value::Bool(false),
            BuiltinKind::Char => Value::Char('\0'),
            BuiltinKind::Str => Value::Str(String::new()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Signed(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Str(s) => f.write_str(s),
            Value::Pattern(p) => f.write_str(&p.format_value()),
            Value::Void => Ok(()),
        }
    }
}
