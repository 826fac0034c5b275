use crate::parse;

pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Re-indents `text` with two spaces per level behind an XML declaration. Text content is
/// trimmed and empty elements are written self-closing. Input that does not parse is returned
/// unchanged.
pub fn format_xml(text: &str) -> String {
    match parse::parse(text) {
        Ok(root) => {
            let mut out = String::from(XML_DECLARATION);
            out.push('\n');
            out.push_str(root.to_pretty_xml().trim_end());
            out
        }
        Err(err) => {
            tracing::warn!(error = %err, "format skipped: document does not parse");
            text.to_string()
        }
    }
}
