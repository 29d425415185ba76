//! YAML output formatter

use std::fmt::Write;

use plwasm_runtime::Pattern;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{FormatError, FormatOptions, Formatter, document};

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormatter;

impl Formatter for YamlFormatter {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn file_extension(&self) -> &'static str {
        "yml"
    }

    fn format(&self, patterns: &[Pattern], options: &FormatOptions) -> Result<String, FormatError> {
        debug!(patterns = patterns.len(), "formatting as yaml");
        let mut out = String::new();
        match document::build(patterns, options) {
            Value::Object(map) if !map.is_empty() => write_mapping(&mut out, &map, 0)?,
            _ => out.push_str("{}\n"),
        }
        Ok(out)
    }
}

fn write_mapping(out: &mut String, map: &Map<String, Value>, indent: usize) -> Result<(), FormatError> {
    for (key, value) in map {
        write!(out, "{:indent$}{}:", "", key_text(key)?)?;
        write_nested(out, value, indent)?;
    }
    Ok(())
}

fn write_sequence(out: &mut String, items: &[Value], indent: usize) -> Result<(), FormatError> {
    for item in items {
        write!(out, "{:indent$}-", "")?;
        write_nested(out, item, indent)?;
    }
    Ok(())
}

/// Writes the value after a `key:` or `-` marker.
fn write_nested(out: &mut String, value: &Value, indent: usize) -> Result<(), FormatError> {
    match value {
        Value::Object(map) if !map.is_empty() => {
            out.push('\n');
            write_mapping(out, map, indent + 2)
        }
        Value::Array(items) if !items.is_empty() => {
            out.push('\n');
            write_sequence(out, items, indent + 2)
        }
        scalar => {
            writeln!(out, " {}", scalar_text(scalar)?)?;
            Ok(())
        }
    }
}

fn scalar_text(value: &Value) -> Result<String, FormatError> {
    Ok(match value {
        Value::Object(_) => "{}".to_string(),
        Value::Array(_) => "[]".to_string(),
        // JSON strings are valid double-quoted YAML scalars.
        Value::String(_) => serde_json::to_string(value)?,
        other => other.to_string(),
    })
}

fn key_text(key: &str) -> Result<String, FormatError> {
    let plain = key
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    Ok(if plain {
        key.to_string()
    } else {
        serde_json::to_string(key)?
    })
}
