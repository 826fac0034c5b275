use crate::tags::MarkupMask;
use regex::Regex;
use rustc_hash::FxHashMap;

fn opening_tag_regex() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"<([a-zA-Z_][a-zA-Z0-9_:\-.]*)(?:[\s/>]|$)").expect("valid regex")
    })
}

/// A `<tag` occurrence: 0-based line and byte column of the `<`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagPos {
    pub line: usize,
    pub column: usize,
}

/// Tag name → every `<tag` occurrence, in document order.
///
/// Built with one linear scan so that line attribution during tree building does not re-scan the
/// document from the top for every element. Tags inside comments, CDATA sections and processing
/// instructions are not indexed.
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    by_tag: FxHashMap<String, Vec<TagPos>>,
}

impl LineIndex {
    pub fn build<S: AsRef<str>>(lines: &[S]) -> Self {
        let re = opening_tag_regex();
        let mut by_tag: FxHashMap<String, Vec<TagPos>> = FxHashMap::default();
        let mut mask = MarkupMask::default();
        for (line, text) in lines.iter().enumerate() {
            let text = mask.mask_line(text.as_ref());
            for cap in re.captures_iter(&text) {
                let Some(whole) = cap.get(0) else {
                    continue;
                };
                by_tag.entry(cap[1].to_string()).or_default().push(TagPos {
                    line,
                    column: whole.start(),
                });
            }
        }
        Self { by_tag }
    }

    /// 0-based line indices of every `<tag` occurrence (a line repeats once per occurrence).
    pub fn lines_for(&self, tag: &str) -> Option<Vec<usize>> {
        self.by_tag
            .get(tag)
            .map(|occ| occ.iter().map(|p| p.line).collect())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.by_tag.contains_key(tag)
    }

    /// First occurrence of `tag` after `cursor` (strictly), or from the top when `cursor` is
    /// `None`.
    pub fn next_after(&self, tag: &str, cursor: Option<TagPos>) -> Option<TagPos> {
        let occ = self.by_tag.get(tag)?;
        let pos = match cursor {
            Some(c) => occ.partition_point(|&p| p <= c),
            None => 0,
        };
        occ.get(pos).copied()
    }

    pub fn tag_count(&self) -> usize {
        self.by_tag.len()
    }
}

/// Sequential fallback for tags the index does not know: finds `<tag` followed by a name
/// delimiter, starting after `cursor`. Expects lines already passed through [`MarkupMask`].
pub(crate) fn scan_for_tag<S: AsRef<str>>(
    lines: &[S],
    tag: &str,
    cursor: Option<TagPos>,
) -> Option<TagPos> {
    let needle = format!("<{tag}");
    let (start_line, mut from_col) = match cursor {
        Some(c) => (c.line, c.column + 1),
        None => (0, 0),
    };
    for (line, text) in lines.iter().enumerate().skip(start_line) {
        let text = text.as_ref();
        let mut search_from = from_col.min(text.len());
        while let Some(rel) = text.get(search_from..).and_then(|s| s.find(&needle)) {
            let column = search_from + rel;
            let after = text[column + needle.len()..].chars().next();
            if after.is_none_or(|c| c.is_whitespace() || c == '>' || c == '/') {
                return Some(TagPos { line, column });
            }
            search_from = column + needle.len();
        }
        from_col = 0;
    }
    None
}
