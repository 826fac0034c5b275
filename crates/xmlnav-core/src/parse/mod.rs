//! Parser adapter: raw text → generic [`Element`] tree.
//!
//! Two backends are tried in a fixed order:
//! - `dom`: `roxmltree`, a fast whole-document parser (behind the `fast-parser` feature);
//! - `stream`: `quick-xml`, which also handles the incremental path for large inputs.
//!
//! The first backend that succeeds wins. If every backend fails, the first failure is reported
//! since the DOM parser carries the most precise position information.

#[cfg(feature = "fast-parser")]
mod dom;
mod stream;
mod write;

use crate::error::{Error, Result};
use indexmap::IndexMap;

pub use write::{escape_attr, escape_text};

/// Inputs larger than this many bytes are parsed through the incremental reader.
pub const STREAMING_THRESHOLD: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Byte size above which the standard backend reads the input incrementally.
    pub streaming_threshold: usize,
    /// Allow the DOM backend to run first. Ignored without the `fast-parser` feature.
    pub fast_parser: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            streaming_threshold: STREAMING_THRESHOLD,
            fast_parser: true,
        }
    }
}

/// A parsed XML element.
///
/// `text` is the character data before the first child element, `tail` the character data
/// between this element's end tag and the next sibling (or the parent's end tag). Comments and
/// processing instructions are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: IndexMap<String, String>,
    /// Namespace declarations made on this element: prefix → URI, `""` for the default
    /// namespace. Written back as `xmlns` / `xmlns:prefix` attributes.
    pub namespaces: IndexMap<String, String>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Direct text content, trimmed; empty when absent or whitespace-only.
    pub fn trimmed_text(&self) -> &str {
        self.text.as_deref().map(str::trim).unwrap_or("")
    }

    /// Namespaces in scope for every element of this subtree, in pre-order: the union of the
    /// declarations on the element and its ancestors, inner declarations winning.
    pub fn scoped_namespaces(&self) -> Vec<IndexMap<String, String>> {
        fn walk(
            el: &Element,
            inherited: &IndexMap<String, String>,
            out: &mut Vec<IndexMap<String, String>>,
        ) {
            let mut scope = inherited.clone();
            for (prefix, uri) in &el.namespaces {
                scope.insert(prefix.clone(), uri.clone());
            }
            out.push(scope);
            let idx = out.len() - 1;
            for child in &el.children {
                let scope = out[idx].clone();
                walk(child, &scope, out);
            }
        }
        let mut out = Vec::new();
        walk(self, &IndexMap::new(), &mut out);
        out
    }

    /// Pre-order iterator over this element and all of its descendants.
    pub fn iter(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Number of elements in this subtree, including `self`.
    pub fn element_count(&self) -> usize {
        self.iter().count()
    }

    /// Serializes this subtree as compact XML (no declaration).
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write::write_compact(self, &mut out);
        out
    }

    /// Serializes this subtree with two-space indentation (no declaration).
    pub fn to_pretty_xml(&self) -> String {
        let mut out = String::new();
        write::write_pretty(self, 0, &mut out);
        out
    }

    /// Minimal XPath-like lookup:
    /// - `//tag`: every element named `tag` in this subtree (including `self`);
    /// - `/a/b`: absolute child chain, `a` must be this element's tag;
    /// - `a/b`: child chain relative to this element.
    ///
    /// `*` matches any tag in a chain step. Results are in document order.
    pub fn find_all(&self, expr: &str) -> Vec<&Element> {
        let expr = expr.trim();
        if let Some(tag) = expr.strip_prefix("//") {
            return self
                .iter()
                .filter(|e| tag == "*" || e.tag == tag)
                .collect();
        }
        let (steps, absolute) = match expr.strip_prefix('/') {
            Some(rest) => (rest, true),
            None => (expr, false),
        };
        let mut steps = steps.split('/').filter(|s| !s.is_empty());
        let mut current: Vec<&Element> = if absolute {
            match steps.next() {
                Some(first) if first == "*" || first == self.tag => vec![self],
                Some(_) => return Vec::new(),
                None => return vec![self],
            }
        } else {
            vec![self]
        };
        for step in steps {
            current = current
                .into_iter()
                .flat_map(|e| e.children.iter())
                .filter(|c| step == "*" || c.tag == step)
                .collect();
        }
        current
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}

/// Removes a leading byte-order mark, if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    #[cfg(feature = "fast-parser")]
    Dom,
    Stream,
}

impl Backend {
    fn chain(options: &ParseOptions) -> Vec<Backend> {
        #[cfg(feature = "fast-parser")]
        let chain = if options.fast_parser {
            vec![Backend::Dom, Backend::Stream]
        } else {
            vec![Backend::Stream]
        };
        #[cfg(not(feature = "fast-parser"))]
        let chain = {
            let _ = options.fast_parser;
            vec![Backend::Stream]
        };
        chain
    }

    fn name(self) -> &'static str {
        match self {
            #[cfg(feature = "fast-parser")]
            Backend::Dom => "roxmltree",
            Backend::Stream => "quick-xml",
        }
    }

    fn parse(self, text: &str, options: &ParseOptions) -> Result<Element> {
        match self {
            #[cfg(feature = "fast-parser")]
            Backend::Dom => dom::parse(text),
            Backend::Stream => {
                if text.len() > options.streaming_threshold {
                    stream::parse_incremental(text)
                } else {
                    stream::parse(text)
                }
            }
        }
    }
}

/// Parses `text` with the default options.
pub fn parse(text: &str) -> Result<Element> {
    parse_with(text, &ParseOptions::default())
}

pub fn parse_with(text: &str, options: &ParseOptions) -> Result<Element> {
    let text = strip_bom(text);
    let mut first_err: Option<Error> = None;
    for backend in Backend::chain(options) {
        match backend.parse(text, options) {
            Ok(root) => {
                tracing::debug!(backend = backend.name(), root = %root.tag, "parsed XML");
                return Ok(root);
            }
            Err(err) => {
                tracing::warn!(backend = backend.name(), error = %err, "XML backend failed");
                first_err.get_or_insert(err);
            }
        }
    }
    Err(first_err.unwrap_or_else(|| Error::parse("no XML parser available", 0, 0)))
}

/// Converts a byte offset into a 1-based (line, column) pair.
pub(crate) fn line_col_at(text: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(text.len());
    let before = text.as_bytes().get(..offset).unwrap_or_default();
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}
