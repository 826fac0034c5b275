#![forbid(unsafe_code)]

//! XML tree ingestion, auto-close repair and threshold-based splitting (headless).
//!
//! Pipeline: raw text → [`parse`] (ordered parser fallback) → [`tree::build_tree`]
//! (index-aware paths and source lines) → [`tree::XmlTree`]. The tree feeds the splitter in
//! [`split`] or the graph layout in the `xmlnav-metro` crate.
//!
//! Everything here is a pure function of its inputs apart from the split writer and the part
//! manager, which read and write the split directory they are given.

pub mod error;
mod format;
pub mod parse;
pub mod repair;
pub mod split;
pub mod stats;
mod tags;
pub mod tree;
pub mod validate;

pub use error::{Error, Result};
pub use format::{XML_DECLARATION, format_xml};
pub use parse::{Element, ParseOptions};
pub use repair::{RepairReport, auto_close_tags};
pub use split::{
    AnalysisReport, PartManager, RuleType, XmlSplitConfig, XmlSplitMetadata, XmlSplitRule,
};
pub use stats::{XmlStatistics, statistics};
pub use tree::{NodeId, TreeNode, XmlTree};
pub use validate::{XmlValidationError, XmlValidationResult, validate_xml};

use std::path::Path;

/// Entry point bundling the document operations behind one set of parse options.
#[derive(Debug, Clone, Default)]
pub struct XmlService {
    options: ParseOptions,
}

impl XmlService {
    fn parse_timing_enabled() -> bool {
        static ENABLED: std::sync::OnceLock<bool> = std::sync::OnceLock::new();
        *ENABLED.get_or_init(|| match std::env::var("XMLNAV_PARSE_TIMING").as_deref() {
            Ok("1") | Ok("true") => true,
            _ => false,
        })
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parse_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse_options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn parse(&self, text: &str) -> Result<Element> {
        parse::parse_with(text, &self.options)
    }

    /// Parses `text` and builds its addressable tree. On failure no tree is returned.
    pub fn build_tree(&self, text: &str) -> Result<XmlTree> {
        let timing_enabled = Self::parse_timing_enabled();
        let total_start = timing_enabled.then(std::time::Instant::now);

        let parse_start = timing_enabled.then(std::time::Instant::now);
        let root = self.parse(text)?;
        let parse = parse_start.map(|s| s.elapsed());

        let build_start = timing_enabled.then(std::time::Instant::now);
        let tree = tree::build_tree(text, &root);
        let build = build_start.map(|s| s.elapsed());

        if let Some(start) = total_start {
            eprintln!(
                "[parse-timing] total={:?} parse={:?} build={:?} nodes={} input_bytes={}",
                start.elapsed(),
                parse.unwrap_or_default(),
                build.unwrap_or_default(),
                tree.as_ref().map(XmlTree::len).unwrap_or(0),
                text.len(),
            );
        }
        if let Err(err) = &tree {
            tracing::warn!(error = %err, "tree build failed");
        }
        tree
    }

    pub fn auto_close_tags(&self, text: &str) -> String {
        repair::auto_close_tags(text)
    }

    pub fn repair(&self, text: &str) -> (String, RepairReport) {
        repair::repair(text)
    }

    pub fn validate(&self, text: &str) -> XmlValidationResult {
        validate_xml(text)
    }

    pub fn statistics(&self, text: &str) -> XmlStatistics {
        stats::statistics(text)
    }

    pub fn format(&self, text: &str) -> String {
        format_xml(text)
    }

    /// Source line of the element at an index-aware `path` such as `/root[1]/item[2]`.
    pub fn element_line_number(&self, text: &str, path: &str) -> Option<usize> {
        self.build_tree(text).ok()?.line_of(path)
    }

    /// Elements matching a `//tag`, `/a/b` or `a/b` expression, in document order.
    pub fn find_elements(&self, text: &str, expr: &str) -> Result<Vec<Element>> {
        let root = self.parse(text)?;
        Ok(root.find_all(expr).into_iter().cloned().collect())
    }

    pub fn create_split_config(
        &self,
        threshold_percentage: f64,
        upper_levels: Option<Vec<usize>>,
    ) -> XmlSplitConfig {
        XmlSplitConfig::new(threshold_percentage, upper_levels.unwrap_or_else(|| vec![2, 3]))
    }

    pub fn analyze(&self, text: &str, config: &XmlSplitConfig) -> Result<AnalysisReport> {
        split::analyze(text, config)
    }

    pub fn split(
        &self,
        text: &str,
        output_dir: &Path,
        config: &XmlSplitConfig,
    ) -> Result<XmlSplitMetadata> {
        split::split(text, output_dir, config)
    }

    /// Splits the file at `source`, recording it as the metadata's `original_file`.
    pub fn split_file(
        &self,
        source: &Path,
        output_dir: &Path,
        config: &XmlSplitConfig,
    ) -> Result<XmlSplitMetadata> {
        let text = std::fs::read_to_string(source).map_err(|e| Error::io(source, e))?;
        split::split_document(&text, output_dir, config, &source.display().to_string())
    }

    pub fn open_split_project(&self, dir: &Path) -> Result<PartManager> {
        PartManager::open(dir)
    }

    pub fn reconstruct_from_parts(&self, dir: &Path) -> Result<String> {
        PartManager::open(dir)?.reconstruct()
    }

    pub fn validate_split_project(
        &self,
        dir: &Path,
    ) -> Result<indexmap::IndexMap<String, Vec<String>>> {
        Ok(PartManager::open(dir)?.validate_parts())
    }

    pub fn split_project_info(&self, dir: &Path) -> Result<split::parts::PartStatistics> {
        Ok(PartManager::open(dir)?.statistics())
    }

    pub fn search_split_project(
        &self,
        dir: &Path,
        term: &str,
        case_sensitive: bool,
    ) -> Result<Vec<split::parts::SearchHit>> {
        Ok(PartManager::open(dir)?.search(term, case_sensitive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tree_reports_parse_failures() {
        let service = XmlService::new();
        assert!(matches!(
            service.build_tree("<a><b></a>"),
            Err(Error::Parse { .. })
        ));
        let tree = service.build_tree("<a>\n  <b/>\n</a>").unwrap();
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn element_line_number_uses_index_aware_paths() {
        let text = "<r>\n  <i/>\n  <i/>\n</r>";
        let service = XmlService::new();
        assert_eq!(service.element_line_number(text, "/r[1]/i[2]"), Some(3));
        assert_eq!(service.element_line_number(text, "/r[1]/i[3]"), None);
    }

    #[test]
    fn find_elements_returns_owned_matches() {
        let found = XmlService::new()
            .find_elements("<r><a>1</a><b><a>2</a></b></r>", "//a")
            .unwrap();
        let texts: Vec<_> = found.iter().map(Element::trimmed_text).collect();
        assert_eq!(texts, ["1", "2"]);
    }
}
