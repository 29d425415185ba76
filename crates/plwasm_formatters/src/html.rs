//! HTML output formatter
//!
//! Renders a standalone page holding one table row per visible pattern.
//! Children follow their parent and are indented by depth.

use std::fmt::Write;

use plwasm_runtime::{Pattern, PatternValue};
use tracing::debug;

use crate::{FormatError, FormatOptions, Formatter};

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFormatter;

const HEADER: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>Pattern Data</title>
<style>
table { border-collapse: collapse; font-family: monospace; }
th, td { border: 1px solid #999; padding: 2px 8px; text-align: left; }
.color { display: inline-block; width: 10px; height: 10px; margin-right: 4px; }
</style>
</head>
<body>
<table>
"#;

const FOOTER: &str = "</tbody>\n</table>\n</body>\n</html>\n";

impl Formatter for HtmlFormatter {
    fn name(&self) -> &'static str {
        "html"
    }

    fn file_extension(&self) -> &'static str {
        "html"
    }

    fn format(&self, patterns: &[Pattern], options: &FormatOptions) -> Result<String, FormatError> {
        debug!(patterns = patterns.len(), "formatting as html");
        let mut out = String::from(HEADER);
        if options.meta_information {
            out.push_str(
                "<thead><tr><th>Name</th><th>Type</th><th>Address</th><th>Size</th><th>Value</th></tr></thead>\n",
            );
        } else {
            out.push_str("<thead><tr><th>Name</th><th>Value</th></tr></thead>\n");
        }
        out.push_str("<tbody>\n");
        for pattern in patterns {
            write_rows(&mut out, pattern, 0, options)?;
        }
        out.push_str(FOOTER);
        Ok(out)
    }
}

fn write_rows(
    out: &mut String,
    pattern: &Pattern,
    depth: usize,
    options: &FormatOptions,
) -> Result<(), FormatError> {
    if pattern.is_hidden() {
        return Ok(());
    }

    match &pattern.attributes.comment {
        Some(comment) => write!(out, "<tr title=\"{}\">", escape(comment))?,
        None => out.push_str("<tr>"),
    }
    write!(out, "<td style=\"padding-left: {}px\">", 8 + depth * 16)?;
    if let Some(color) = pattern.attributes.color {
        write!(
            out,
            "<span class=\"color\" style=\"background-color: #{color:06X}\"></span>"
        )?;
    }
    write!(out, "{}</td>", escape(pattern.display_name()))?;
    if options.meta_information {
        write!(
            out,
            "<td>{}</td><td>0x{:08X}</td><td>{}</td>",
            escape(&pattern.type_name),
            pattern.offset,
            pattern.size
        )?;
    }
    writeln!(out, "<td>{}</td></tr>", escape(&value_text(pattern)))?;

    if let Some(children) = pattern.children() {
        for child in children {
            write_rows(out, child, depth + 1, options)?;
        }
    }
    Ok(())
}

/// Integers show their decimal value followed by hex padded to the pattern size.
fn value_text(pattern: &Pattern) -> String {
    let width = (pattern.size as usize).clamp(1, 16) * 2;
    match &pattern.value {
        PatternValue::Unsigned(v) => format!("{v} (0x{v:0width$X})"),
        PatternValue::Signed(v) => {
            let bits = width * 4;
            let raw = if bits >= 128 {
                *v as u128
            } else {
                (*v as u128) & ((1u128 << bits) - 1)
            };
            format!("{v} (0x{raw:0width$X})")
        }
        _ => pattern.format_value(),
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            c => escaped.push(c),
        }
    }
    escaped
}
