//! Auto-close repair for truncated or in-progress documents.
//!
//! A single forward pass over the lines keeps a stack of open start tags. End tags close the
//! nearest open tag with the same name; tags opened in between stay open. Whatever is still open
//! at the end is closed in LIFO order, each end tag on its own line at the indentation of the
//! line that opened it.

use crate::parse;
use crate::tags::{TagEvent, TagScanner};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Frame {
    tag: String,
    line: usize,
    indent: usize,
}

/// An end tag that had no open start tag anywhere on the stack. It is left in the output as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrayClosingTag {
    pub tag: String,
    /// 1-based.
    pub line_number: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    /// The input parsed as-is and was returned unchanged.
    pub already_well_formed: bool,
    /// Synthesized end tags, in the order they were appended.
    pub closed_tags: Vec<String>,
    pub stray_closing_tags: Vec<StrayClosingTag>,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        !self.closed_tags.is_empty()
    }
}

/// Closes unclosed tags in `text`. Well-formed input is returned unchanged.
pub fn auto_close_tags(text: &str) -> String {
    repair(text).0
}

/// Like [`auto_close_tags`], also reporting what was done.
pub fn repair(text: &str) -> (String, RepairReport) {
    if parse::parse(text).is_ok() {
        return (
            text.to_string(),
            RepairReport {
                already_well_formed: true,
                ..Default::default()
            },
        );
    }

    let mut report = RepairReport::default();
    let mut stack: Vec<Frame> = Vec::new();
    let mut scanner = TagScanner::default();
    let lines: Vec<&str> = text.split('\n').collect();

    for (idx, line) in lines.iter().enumerate() {
        for event in scanner.scan_line(idx, line) {
            match event {
                TagEvent::Open { name, line, indent } => stack.push(Frame {
                    tag: name,
                    line,
                    indent,
                }),
                TagEvent::SelfClosing { .. } => {}
                TagEvent::Close { name } => match stack.iter().rposition(|f| f.tag == name) {
                    Some(pos) => {
                        stack.remove(pos);
                    }
                    None => report.stray_closing_tags.push(StrayClosingTag {
                        tag: name,
                        line_number: idx + 1,
                    }),
                },
            }
        }
    }

    for stray in &report.stray_closing_tags {
        tracing::warn!(
            tag = %stray.tag,
            line = stray.line_number,
            "closing tag without a matching start tag left unchanged"
        );
    }

    if stack.is_empty() {
        return (text.to_string(), report);
    }

    // Keep a trailing newline after the synthesized tags rather than before them.
    let (body, trailing_newline) = match lines.split_last() {
        Some((last, body)) if last.is_empty() && !body.is_empty() => (body, true),
        _ => (&lines[..], false),
    };
    let mut out: Vec<String> = body.iter().map(|l| (*l).to_string()).collect();
    while let Some(frame) = stack.pop() {
        tracing::debug!(tag = %frame.tag, opened_at = frame.line + 1, "closing tag");
        out.push(format!("{}</{}>", " ".repeat(frame.indent), frame.tag));
        report.closed_tags.push(frame.tag);
    }
    let mut repaired = out.join("\n");
    if trailing_newline {
        repaired.push('\n');
    }
    (repaired, report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_missing_end_tags_in_lifo_order() {
        let (out, report) = repair("<root>\n  <item>\n    <name>Test</name>\n");
        assert_eq!(
            out,
            "<root>\n  <item>\n    <name>Test</name>\n  </item>\n</root>\n"
        );
        assert_eq!(report.closed_tags, ["item", "root"]);
        assert!(parse::parse(&out).is_ok());
    }

    #[test]
    fn well_formed_input_is_untouched() {
        let text = "<?xml version=\"1.0\"?>\n<a>\n  <b/>\n</a>";
        let (out, report) = repair(text);
        assert_eq!(out, text);
        assert!(report.already_well_formed);
        assert!(!report.changed());
    }

    #[test]
    fn end_tag_closes_nearest_match_and_keeps_inner_tags_open() {
        // `</a>` resolves the outer `a`; `b` is still open afterwards.
        let text = "<r>\n<a>\n<b>\n</a>";
        let (out, report) = repair(text);
        assert_eq!(report.closed_tags, ["b", "r"]);
        assert_eq!(out, "<r>\n<a>\n<b>\n</a>\n</b>\n</r>");
    }

    #[test]
    fn stray_end_tags_are_reported_and_kept() {
        let (out, report) = repair("<r>\n</zzz>\n<a>x</a>");
        assert_eq!(
            report.stray_closing_tags,
            [StrayClosingTag {
                tag: "zzz".into(),
                line_number: 2
            }]
        );
        assert_eq!(out, "<r>\n</zzz>\n<a>x</a>\n</r>");
    }

    #[test]
    fn markup_inside_comments_and_cdata_is_not_repaired() {
        let (out, report) = repair("<r>\n  <!-- <c> -->\n");
        assert_eq!(out, "<r>\n  <!-- <c> -->\n</r>\n");
        assert_eq!(report.closed_tags, ["r"]);
        assert!(parse::parse(&out).is_ok());

        let out = auto_close_tags("<r>\n  <![CDATA[<x>]]>\n  <!--\n  <y>\n  -->\n  <?pi <z>?>\n");
        assert_eq!(
            out,
            "<r>\n  <![CDATA[<x>]]>\n  <!--\n  <y>\n  -->\n  <?pi <z>?>\n</r>\n"
        );
        assert!(parse::parse(&out).is_ok());
    }

    #[test]
    fn same_line_pairs_and_self_closing_tags_are_balanced() {
        let (out, _) = repair("<doc>\n  <p>one</p><p>two</p>\n  <br/>\n  <sec id=\"1\">");
        assert_eq!(
            out,
            "<doc>\n  <p>one</p><p>two</p>\n  <br/>\n  <sec id=\"1\">\n  </sec>\n</doc>"
        );
        assert!(parse::parse(&out).is_ok());
    }
}
