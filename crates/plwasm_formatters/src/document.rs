//! Intermediate document shared by the JSON and YAML formatters.

use plwasm_runtime::{Pattern, PatternValue};
use serde_json::{Map, Number, Value};

use crate::FormatOptions;

/// Builds an ordered object keyed by display name from the visible patterns.
///
/// A name that is already taken in the same object gets the first free
/// `_1`, `_2`, ... suffix, so every visible pattern keeps an entry.
pub(crate) fn build(patterns: &[Pattern], options: &FormatOptions) -> Value {
    let mut object = Map::new();
    extend_members(&mut object, patterns, options);
    Value::Object(object)
}

fn extend_members(object: &mut Map<String, Value>, patterns: &[Pattern], options: &FormatOptions) {
    for pattern in patterns.iter().filter(|p| !p.is_hidden()) {
        let key = unique_key(object, pattern.display_name());
        object.insert(key, node(pattern, options));
    }
}

fn unique_key(object: &Map<String, Value>, name: &str) -> String {
    if !object.contains_key(name) {
        return name.to_string();
    }
    (1..)
        .map(|n| format!("{name}_{n}"))
        .find(|key| !object.contains_key(key))
        .unwrap_or_else(|| name.to_string())
}

fn node(pattern: &Pattern, options: &FormatOptions) -> Value {
    let body = match &pattern.value {
        PatternValue::Struct(children) | PatternValue::Union(children) => {
            let mut object = meta(pattern, options);
            extend_members(&mut object, children, options);
            return Value::Object(object);
        }
        PatternValue::Array(entries) => Value::Array(
            entries
                .iter()
                .filter(|p| !p.is_hidden())
                .map(|p| node(p, options))
                .collect(),
        ),
        PatternValue::Bitfield(fields) => Value::Object(
            fields
                .iter()
                .map(|f| (f.name.clone(), unsigned(f.value)))
                .collect(),
        ),
        leaf => scalar(pattern, leaf),
    };

    if !options.meta_information {
        return body;
    }
    let mut object = meta(pattern, options);
    object.insert("value".to_string(), body);
    Value::Object(object)
}

fn meta(pattern: &Pattern, options: &FormatOptions) -> Map<String, Value> {
    let mut object = Map::new();
    if options.meta_information {
        object.insert("__type".into(), Value::String(pattern.type_name.clone()));
        object.insert("__address".into(), Value::from(pattern.offset));
        object.insert("__size".into(), Value::from(pattern.size));
        if let Some(comment) = &pattern.attributes.comment {
            object.insert("__comment".into(), Value::String(comment.clone()));
        }
    }
    object
}

fn scalar(pattern: &Pattern, value: &PatternValue) -> Value {
    match value {
        PatternValue::Unsigned(v) => unsigned(*v),
        PatternValue::Signed(v) => i64::try_from(*v)
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(v.to_string())),
        PatternValue::Float(v) => Number::from_f64(*v).map_or(Value::Null, Value::Number),
        PatternValue::Boolean(v) => Value::Bool(*v),
        PatternValue::Character(c) => Value::String(c.to_string()),
        PatternValue::String(s) => Value::String(s.clone()),
        PatternValue::Enum {
            variant: Some(variant),
            ..
        } => Value::String(format!("{}::{variant}", pattern.type_name)),
        PatternValue::Enum { value, .. } => unsigned(*value),
        PatternValue::Bitfield(_)
        | PatternValue::Struct(_)
        | PatternValue::Union(_)
        | PatternValue::Array(_) => Value::Null,
    }
}

/// JSON numbers above `u64::MAX` are emitted as decimal strings.
fn unsigned(value: u128) -> Value {
    u64::try_from(value)
        .map(Value::from)
        .unwrap_or_else(|_| Value::String(value.to_string()))
}
