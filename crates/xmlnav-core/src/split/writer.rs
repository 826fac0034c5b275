use super::analyze::{AnalysisReport, SplitPoint, analyze_parsed};
use super::{XmlSplitConfig, XmlSplitMetadata};
use crate::error::{Error, Result};
use crate::format::XML_DECLARATION;
use crate::parse::{self, Element};
use crate::tree::build_tree;
use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const PARTS_DIR: &str = "parts";
pub const METADATA_FILE: &str = "metadata.json";
const INDEX_FILE: &str = "root.xml";
const WHOLE_FILE: &str = "original.xml";

/// Hex SHA-256 of the document text.
pub(crate) fn checksum(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

fn part_file_name(number: usize, tag: &str) -> String {
    let safe: String = tag
        .chars()
        .map(|c| if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') { c } else { '_' })
        .collect();
    format!("part_{number:03}_{safe}.xml")
}

/// A part document for `element`. With `scope`, every namespace in scope at the element is
/// declared on the part's root so prefixed names stay bound.
fn standalone(element: &Element, scope: Option<&IndexMap<String, String>>) -> String {
    match scope {
        Some(scope) if scope.len() > element.namespaces.len() => {
            let mut root = element.clone();
            root.namespaces = scope.clone();
            format!("{XML_DECLARATION}\n{}", root.to_xml())
        }
        _ => format!("{XML_DECLARATION}\n{}", element.to_xml()),
    }
}

fn index_document(root_tag: &str, parts: &[(&SplitPoint, String)]) -> String {
    let mut index = Element::new("xml_split_index").with_attribute("original_root", root_tag);
    for (i, (point, file)) in parts.iter().enumerate() {
        index = index.with_child(
            Element::new("part")
                .with_attribute("id", (i + 1).to_string())
                .with_attribute("path", point.path.as_str())
                .with_attribute("file", file.as_str())
                .with_attribute("reason", point.reason.as_str()),
        );
    }
    format!("{XML_DECLARATION}\n{}", index.to_pretty_xml())
}

/// A planned output file, relative to the split directory.
struct PlannedFile {
    relative: String,
    content: String,
}

/// Splits `text` into `output_dir` (created if needed) and writes `metadata.json` beside the
/// `parts/` directory. Nothing is written unless the document parses.
pub fn split(text: &str, output_dir: &Path, config: &XmlSplitConfig) -> Result<XmlSplitMetadata> {
    split_document(text, output_dir, config, "")
}

pub(crate) fn split_document(
    text: &str,
    output_dir: &Path,
    config: &XmlSplitConfig,
    original_file: &str,
) -> Result<XmlSplitMetadata> {
    let root = parse::parse(text)?;
    let tree = build_tree(text, &root)?;
    let report = analyze_parsed(&root, &tree, config);
    let (files, part_mapping) = plan(text, &root, &report, config);

    let mut metadata = XmlSplitMetadata {
        original_file: original_file.to_string(),
        split_timestamp: chrono::Local::now().fixed_offset(),
        split_config: config.clone(),
        total_parts: part_mapping.len(),
        part_mapping,
        dependencies: Vec::new(),
        checksum: checksum(text),
    };
    if metadata.split_config.output_directory.is_empty() {
        metadata.split_config.output_directory = output_dir.display().to_string();
    }

    let parts_dir = output_dir.join(PARTS_DIR);
    fs::create_dir_all(&parts_dir).map_err(|e| Error::io(&parts_dir, e))?;
    for file in &files {
        let path = output_dir.join(&file.relative);
        fs::write(&path, &file.content).map_err(|e| Error::io(&path, e))?;
    }
    write_metadata(output_dir, &metadata)?;

    tracing::debug!(
        parts = metadata.total_parts,
        dir = %output_dir.display(),
        "split document"
    );
    Ok(metadata)
}

fn plan(
    text: &str,
    root: &Element,
    report: &AnalysisReport,
    config: &XmlSplitConfig,
) -> (Vec<PlannedFile>, IndexMap<String, String>) {
    let mut files = Vec::new();
    let mut mapping = IndexMap::new();

    if report.recommended_splits.is_empty() {
        let relative = format!("{PARTS_DIR}/{WHOLE_FILE}");
        files.push(PlannedFile {
            relative: relative.clone(),
            content: text.to_string(),
        });
        mapping.insert("/".to_string(), relative);
        return (files, mapping);
    }

    if report.recommended_splits.len() > config.max_parts {
        tracing::warn!(
            recommended = report.recommended_splits.len(),
            max_parts = config.max_parts,
            "more split points than max_parts; extra points are dropped"
        );
    }

    let elements: Vec<&Element> = root.iter().collect();
    let scopes = config
        .preserve_namespaces
        .then(|| root.scoped_namespaces())
        .unwrap_or_default();
    let mut written: Vec<(&SplitPoint, String)> = Vec::new();
    for (i, point) in report
        .recommended_splits
        .iter()
        .take(config.max_parts)
        .enumerate()
    {
        let Some(element) = elements.get(point.element_index) else {
            continue;
        };
        let name = part_file_name(i + 1, &point.tag);
        let relative = format!("{PARTS_DIR}/{name}");
        files.push(PlannedFile {
            relative: relative.clone(),
            content: standalone(element, scopes.get(point.element_index)),
        });
        mapping.insert(point.path.clone(), relative);
        written.push((point, name));
    }

    if config.create_index_file {
        files.push(PlannedFile {
            relative: format!("{PARTS_DIR}/{INDEX_FILE}"),
            content: index_document(&root.tag, &written),
        });
    }
    (files, mapping)
}

pub(crate) fn write_metadata(dir: &Path, metadata: &XmlSplitMetadata) -> Result<()> {
    let path = dir.join(METADATA_FILE);
    fs::write(&path, metadata.to_json()?).map_err(|e| Error::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_names_are_numbered_and_filesystem_safe() {
        assert_eq!(part_file_name(7, "item"), "part_007_item.xml");
        assert_eq!(part_file_name(12, "ns:rec"), "part_012_ns_rec.xml");
    }

    #[cfg(feature = "fast-parser")]
    #[test]
    fn parts_redeclare_inherited_namespaces() {
        let root = parse::parse(
            "<ns:doc xmlns:ns=\"urn:x\" xmlns=\"urn:d\"><ns:item>1</ns:item><item>2</item></ns:doc>",
        )
        .unwrap();
        let scopes = root.scoped_namespaces();
        let prefixed = standalone(&root.children[0], scopes.get(1));
        assert!(prefixed.starts_with(&format!("{XML_DECLARATION}\n<ns:item ")));
        assert!(prefixed.contains(" xmlns:ns=\"urn:x\""));
        assert!(prefixed.contains(" xmlns=\"urn:d\""));
        let doc = roxmltree::Document::parse(&prefixed).unwrap();
        assert_eq!(doc.root_element().tag_name().namespace(), Some("urn:x"));
        let plain = standalone(&root.children[1], None);
        assert_eq!(plain, format!("{XML_DECLARATION}\n<item>2</item>"));
    }

    #[test]
    fn checksum_is_sha256_hex() {
        assert_eq!(
            checksum(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
