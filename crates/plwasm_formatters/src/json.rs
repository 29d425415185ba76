//! JSON output formatter

use plwasm_runtime::Pattern;
use tracing::debug;

use crate::{FormatError, FormatOptions, Formatter, document};

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn format(&self, patterns: &[Pattern], options: &FormatOptions) -> Result<String, FormatError> {
        debug!(patterns = patterns.len(), "formatting as json");
        let doc = document::build(patterns, options);
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::header;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_member_order_follows_placement() {
        let output = JsonFormatter
            .format(&[header()], &FormatOptions::default())
            .unwrap();
        assert_eq!(
            output,
            "{\n  \"hdr\": {\n    \"magic\": 127,\n    \"length\": [\n      4660\n    ]\n  }\n}"
        );
    }

    #[test]
    fn test_meta_output_parses_back() {
        let output = JsonFormatter
            .format(&[header()], &FormatOptions::with_meta_information())
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["hdr"]["__type"], "Header");
        assert_eq!(parsed["hdr"]["__address"], 16);
        assert_eq!(parsed["hdr"]["magic"]["value"], 127);
        assert_eq!(parsed["hdr"]["length"]["value"][0]["__address"], 17);
    }
}
