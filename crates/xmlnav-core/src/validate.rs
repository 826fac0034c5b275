use crate::parse;
use crate::tags::{TagEvent, TagScanner};
use regex::Regex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationErrorKind {
    /// The document does not parse.
    Structure,
    /// Start/end tag bookkeeping found an imbalance.
    Tags,
    Declaration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XmlValidationError {
    pub message: String,
    /// 1-based, 0 when unknown.
    pub line_number: usize,
    /// 1-based, 0 when unknown.
    pub column_number: usize,
    pub error_type: ValidationErrorKind,
    pub severity: Severity,
}

impl XmlValidationError {
    fn new(
        kind: ValidationErrorKind,
        message: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            message: message.into(),
            line_number: line,
            column_number: column,
            error_type: kind,
            severity: Severity::Error,
        }
    }
}

impl fmt::Display for XmlValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line_number, self.column_number) {
            (0, _) => f.write_str(&self.message),
            (l, 0) => write!(f, "Line {l}: {}", self.message),
            (l, c) => write!(f, "Line {l}, Column {c}: {}", self.message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct XmlValidationResult {
    pub is_valid: bool,
    pub errors: Vec<XmlValidationError>,
}

impl XmlValidationResult {
    pub fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.errors
            .iter()
            .filter(|e| e.severity == Severity::Warning)
            .count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }
}

/// Validates `text`: well-formedness first (and nothing else when that fails), then a line-level
/// tag balance scan, then the XML declaration.
pub fn validate_xml(text: &str) -> XmlValidationResult {
    let mut errors = Vec::new();
    if let Err(err) = parse::parse(text) {
        let (line, column) = err.position().unwrap_or((0, 0));
        let message = match err {
            crate::Error::Parse { message, .. } => message,
            other => other.to_string(),
        };
        errors.push(XmlValidationError::new(
            ValidationErrorKind::Structure,
            message,
            line,
            column,
        ));
        return XmlValidationResult {
            is_valid: false,
            errors,
        };
    }

    check_unmatched_tags(text, &mut errors);
    check_declaration(text, &mut errors);
    XmlValidationResult {
        is_valid: errors.is_empty(),
        errors,
    }
}

fn check_unmatched_tags(text: &str, errors: &mut Vec<XmlValidationError>) {
    let mut scanner = TagScanner::default();
    let mut stack: Vec<(String, usize)> = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        for event in scanner.scan_line(idx, line) {
            match event {
                TagEvent::Open { name, line, .. } => stack.push((name, line + 1)),
                TagEvent::SelfClosing { .. } => {}
                TagEvent::Close { name } => {
                    if stack.last().is_some_and(|(top, _)| *top == name) {
                        stack.pop();
                    } else {
                        errors.push(XmlValidationError::new(
                            ValidationErrorKind::Tags,
                            format!("Unmatched closing tag '</{name}>'"),
                            idx + 1,
                            0,
                        ));
                    }
                }
            }
        }
    }
    for (name, line) in stack {
        errors.push(XmlValidationError::new(
            ValidationErrorKind::Tags,
            format!("Unclosed tag '<{name}>'"),
            line,
            0,
        ));
    }
}

fn declaration_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^<\?xml\s+version="1\.0""#).expect("valid regex"))
}

fn check_declaration(text: &str, errors: &mut Vec<XmlValidationError>) {
    let stripped = parse::strip_bom(text).trim();
    if !stripped.starts_with("<?xml") {
        errors.push(XmlValidationError::new(
            ValidationErrorKind::Declaration,
            "Missing XML declaration",
            0,
            0,
        ));
    } else if !declaration_regex().is_match(stripped) {
        errors.push(XmlValidationError::new(
            ValidationErrorKind::Declaration,
            "Invalid XML declaration format",
            1,
            0,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_document_with_declaration_is_valid() {
        let r = validate_xml("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a><b>x</b><c/></a>");
        assert!(r.is_valid, "{:?}", r.messages());
        assert_eq!(r.error_count(), 0);
    }

    #[test]
    fn parse_failure_is_the_only_error() {
        let r = validate_xml("<a>\n<b>\n</a>");
        assert!(!r.is_valid);
        assert_eq!(r.error_count(), 1);
        assert_eq!(r.errors[0].error_type, ValidationErrorKind::Structure);
        assert!(r.errors[0].line_number > 0);
        assert!(r.messages()[0].starts_with("Line "));
    }

    #[test]
    fn declaration_problems_are_reported() {
        let r = validate_xml("<a/>");
        assert_eq!(r.messages(), ["Missing XML declaration"]);
        let r = validate_xml("<?xml version='1.0'?><a/>");
        assert_eq!(r.messages(), ["Line 1: Invalid XML declaration format"]);
    }

    #[test]
    fn commented_out_markup_is_not_a_tag_error() {
        let text = "<?xml version=\"1.0\"?>\n<r>\n  <!-- <old>\n  </gone> -->\n  <a><![CDATA[</a>]]></a>\n</r>";
        let r = validate_xml(text);
        assert!(r.is_valid, "{:?}", r.messages());
    }

    #[test]
    fn display_formats_position() {
        let e = XmlValidationError::new(ValidationErrorKind::Tags, "m", 3, 7);
        assert_eq!(e.to_string(), "Line 3, Column 7: m");
    }
}
