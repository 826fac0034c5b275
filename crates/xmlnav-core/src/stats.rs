use crate::parse::{self, Element};
use regex::Regex;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct XmlStatistics {
    pub element_count: usize,
    pub attribute_count: usize,
    /// Elements with non-whitespace direct text.
    pub text_node_count: usize,
    pub comment_count: usize,
    /// UTF-8 byte length of the input.
    pub total_size: usize,
}

impl XmlStatistics {
    pub fn size_kb(&self) -> f64 {
        self.total_size as f64 / 1024.0
    }

    pub fn size_mb(&self) -> f64 {
        self.total_size as f64 / (1024.0 * 1024.0)
    }

    /// `N bytes`, `X.Y KB` or `X.Y MB`.
    pub fn size_string(&self) -> String {
        if self.total_size < 1024 {
            format!("{} bytes", self.total_size)
        } else if self.total_size < 1024 * 1024 {
            format!("{:.1} KB", self.size_kb())
        } else {
            format!("{:.1} MB", self.size_mb())
        }
    }
}

impl fmt::Display for XmlStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Elements: {}", self.element_count)?;
        writeln!(f, "Attributes: {}", self.attribute_count)?;
        writeln!(f, "Text nodes: {}", self.text_node_count)?;
        writeln!(f, "Comments: {}", self.comment_count)?;
        write!(f, "Total size: {}", self.size_string())
    }
}

fn comment_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"))
}

/// Counts over the parsed tree, plus comments over the raw text. Unparseable input yields all
/// zeros.
pub fn statistics(text: &str) -> XmlStatistics {
    let root = match parse::parse(text) {
        Ok(root) => root,
        Err(err) => {
            tracing::warn!(error = %err, "statistics skipped: document does not parse");
            return XmlStatistics::default();
        }
    };
    statistics_for(text, &root)
}

pub(crate) fn statistics_for(text: &str, root: &Element) -> XmlStatistics {
    let mut stats = XmlStatistics {
        comment_count: comment_regex().find_iter(text).count(),
        total_size: text.len(),
        ..Default::default()
    };
    for el in root.iter() {
        stats.element_count += 1;
        stats.attribute_count += el.attributes.len();
        if !el.trimmed_text().is_empty() {
            stats.text_node_count += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_elements_attributes_text_and_comments() {
        let text = "<!-- a\ncomment --><r k=\"1\"><a x=\"1\" y=\"2\">t</a><b>  </b><!--c--></r>";
        let s = statistics(text);
        assert_eq!(s.element_count, 3);
        assert_eq!(s.attribute_count, 3);
        assert_eq!(s.text_node_count, 1);
        assert_eq!(s.comment_count, 2);
        assert_eq!(s.total_size, text.len());
    }

    #[test]
    fn unparseable_input_yields_zeros() {
        assert_eq!(statistics("<r>"), XmlStatistics::default());
    }

    #[test]
    fn size_string_picks_a_unit() {
        let sized = |total_size| XmlStatistics {
            total_size,
            ..Default::default()
        };
        assert_eq!(sized(512).size_string(), "512 bytes");
        assert_eq!(sized(1536).size_string(), "1.5 KB");
        assert_eq!(sized(3 * 1024 * 1024).size_string(), "3.0 MB");
    }
}
