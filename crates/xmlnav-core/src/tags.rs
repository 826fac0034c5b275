//! Line-oriented tag scanner used by the repair engine and the unmatched-tag check.
//!
//! It works on raw text that may not be well-formed, so it only recognizes the shapes
//! `<name ...>`, `<name .../>` and `</name>`. Comments, CDATA sections, processing instructions
//! and declarations are blanked out by [`MarkupMask`] first, including spans that cross lines.
//! A start tag whose attributes continue on later lines is reported on the line where it closes
//! with `>`.

use regex::Regex;
use std::borrow::Cow;

/// Opening delimiter and terminator of every span whose content is not markup. Longer openers
/// sharing a prefix come first.
const OPAQUE_SPANS: [(&str, &str); 4] = [
    ("<!--", "-->"),
    ("<![CDATA[", "]]>"),
    ("<?", "?>"),
    ("<!", ">"),
];

/// Replaces comment, CDATA, processing-instruction and declaration spans with spaces, line by
/// line. Byte offsets are kept, so columns in the masked line match the raw line.
#[derive(Debug, Default)]
pub(crate) struct MarkupMask {
    /// Terminator of the span left open at the end of the previous line.
    open: Option<&'static str>,
}

fn blank(out: &mut String, span: &str) {
    out.extend(std::iter::repeat_n(' ', span.len()));
}

impl MarkupMask {
    pub(crate) fn mask_line<'a>(&mut self, line: &'a str) -> Cow<'a, str> {
        if self.open.is_none() && !line.contains("<!") && !line.contains("<?") {
            return Cow::Borrowed(line);
        }
        let mut out = String::with_capacity(line.len());
        let mut rest = line;
        loop {
            if let Some(end) = self.open {
                match rest.find(end) {
                    Some(i) => {
                        let stop = i + end.len();
                        blank(&mut out, &rest[..stop]);
                        rest = &rest[stop..];
                        self.open = None;
                    }
                    None => {
                        blank(&mut out, rest);
                        return Cow::Owned(out);
                    }
                }
            }
            let next = OPAQUE_SPANS
                .iter()
                .filter_map(|&(open, close)| rest.find(open).map(|i| (i, open, close)))
                .min_by_key(|&(i, _, _)| i);
            let Some((i, open, close)) = next else {
                out.push_str(rest);
                return Cow::Owned(out);
            };
            out.push_str(&rest[..i]);
            blank(&mut out, open);
            rest = &rest[i + open.len()..];
            self.open = Some(close);
        }
    }
}

/// Masks every line of `text` (split on `\n`).
pub(crate) fn masked_lines(text: &str) -> Vec<Cow<'_, str>> {
    let mut mask = MarkupMask::default();
    text.split('\n').map(|l| mask.mask_line(l)).collect()
}

fn tag_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<(/?)([a-zA-Z_][a-zA-Z0-9_:\-.]*)(?:[\s/][^>]*)?>").expect("valid regex")
    })
}

fn unterminated_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([a-zA-Z_][a-zA-Z0-9_:\-.]*)(?:\s[^>]*)?$").expect("valid regex")
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TagEvent {
    Open {
        name: String,
        /// 0-based line where the start tag begins.
        line: usize,
        /// Leading whitespace width of that line.
        indent: usize,
    },
    SelfClosing {
        name: String,
    },
    Close {
        name: String,
    },
}

#[derive(Debug, Clone)]
struct Pending {
    name: String,
    line: usize,
    indent: usize,
}

#[derive(Debug, Default)]
pub(crate) struct TagScanner {
    pending: Option<Pending>,
    mask: MarkupMask,
}

pub(crate) fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

impl TagScanner {
    /// Scans one line and returns its tag events in order of appearance.
    pub(crate) fn scan_line(&mut self, line_idx: usize, line: &str) -> Vec<TagEvent> {
        let mut events = Vec::new();
        let indent = indent_width(line);
        let masked = self.mask.mask_line(line);
        let line = masked.as_ref();
        let mut rest_start = 0;

        if let Some(p) = self.pending.take() {
            match line.find('>') {
                Some(end) => {
                    if line[..end].ends_with('/') {
                        events.push(TagEvent::SelfClosing { name: p.name });
                    } else {
                        events.push(TagEvent::Open {
                            name: p.name,
                            line: p.line,
                            indent: p.indent,
                        });
                    }
                    rest_start = end + 1;
                }
                None => {
                    self.pending = Some(p);
                    return events;
                }
            }
        }

        let rest = &line[rest_start..];
        let mut last_end = 0;
        for cap in tag_regex().captures_iter(rest) {
            let Some(whole) = cap.get(0) else {
                continue;
            };
            last_end = whole.end();
            let name = cap[2].to_string();
            if &cap[1] == "/" {
                events.push(TagEvent::Close { name });
            } else if whole.as_str().ends_with("/>") {
                events.push(TagEvent::SelfClosing { name });
            } else {
                events.push(TagEvent::Open {
                    name,
                    line: line_idx,
                    indent,
                });
            }
        }

        if let Some(cap) = unterminated_regex().captures(&rest[last_end..]) {
            self.pending = Some(Pending {
                name: cap[1].to_string(),
                line: line_idx,
                indent,
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(events: &[TagEvent]) -> Vec<String> {
        events
            .iter()
            .map(|e| match e {
                TagEvent::Open { name, .. } => format!("+{name}"),
                TagEvent::SelfClosing { name } => format!("={name}"),
                TagEvent::Close { name } => format!("-{name}"),
            })
            .collect()
    }

    #[test]
    fn classifies_tags_in_line_order() {
        let mut s = TagScanner::default();
        let ev = s.scan_line(0, r#"  <a href="http://x/y"><b/></a><c k="1" /><!-- note --><?pi x?>"#);
        assert_eq!(names(&ev), ["+a", "=b", "-a", "=c"]);
        assert!(matches!(&ev[0], TagEvent::Open { indent: 2, line: 0, .. }));
    }

    #[test]
    fn opaque_spans_are_blanked_across_lines() {
        let mut s = TagScanner::default();
        assert_eq!(names(&s.scan_line(0, "<r><!-- <c>")), ["+r"]);
        assert!(s.scan_line(1, "  </d> <e/>").is_empty());
        assert_eq!(names(&s.scan_line(2, "--><x><![CDATA[</x>]]></x>")), ["+x", "-x"]);
        assert_eq!(names(&s.scan_line(3, "<?pi <y>?><!DOCTYPE z></r>")), ["-r"]);
    }

    #[test]
    fn mask_keeps_byte_offsets() {
        let mut mask = MarkupMask::default();
        let line = "<a><!-- größe --><b/>";
        let masked = mask.mask_line(line);
        assert_eq!(masked.len(), line.len());
        assert_eq!(masked.find("<b/>"), line.find("<b/>"));
        assert!(matches!(mask.mask_line("<plain/>"), Cow::Borrowed(_)));
    }

    #[test]
    fn start_tags_may_span_lines() {
        let mut s = TagScanner::default();
        assert!(s.scan_line(0, "<root>").len() == 1);
        assert!(s.scan_line(1, "  <item id=\"1\"").is_empty());
        let ev = s.scan_line(2, "        kind=\"x\">text");
        assert_eq!(
            ev,
            [TagEvent::Open {
                name: "item".into(),
                line: 1,
                indent: 2
            }]
        );
        assert!(s.scan_line(3, "  <leaf").is_empty());
        assert_eq!(names(&s.scan_line(4, "  /></root>")), ["=leaf", "-root"]);
    }
}
