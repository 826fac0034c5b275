//! Access to a split directory produced by [`super::split`]: listing, editing, validating,
//! searching and reassembling parts.

use super::writer::{METADATA_FILE, PARTS_DIR, write_metadata};
use super::XmlSplitMetadata;
use crate::error::{Error, Result};
use crate::format::XML_DECLARATION;
use crate::parse;
use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartInfo {
    /// Structural path of the split element (`/` for a whole-document part).
    pub xpath: String,
    /// Relative to the split directory.
    pub file_path: String,
    pub size: u64,
    pub is_modified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchLine {
    /// 1-based.
    pub line_number: usize,
    pub content: String,
    /// Byte offset of the first match within the line.
    pub start_pos: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub xpath: String,
    pub file_path: String,
    pub matches: usize,
    pub matching_lines: Vec<SearchLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartStatistics {
    pub total_parts: usize,
    pub modified_parts: usize,
    pub split_timestamp: String,
    pub original_checksum: String,
    pub total_size: u64,
    pub total_size_kb: f64,
    pub parts: Vec<PartInfo>,
}

#[derive(Debug)]
pub struct PartManager {
    dir: PathBuf,
    metadata: XmlSplitMetadata,
    cache: FxHashMap<String, String>,
    modified: FxHashSet<String>,
}

impl PartManager {
    /// Loads `metadata.json` from `dir`. Fails with [`Error::NotASplitProject`] when the metadata
    /// file or the `parts/` directory is missing.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !Self::is_split_project(&dir) {
            return Err(Error::NotASplitProject { path: dir });
        }
        let meta_path = dir.join(METADATA_FILE);
        let text = fs::read_to_string(&meta_path).map_err(|e| Error::io(&meta_path, e))?;
        let metadata = XmlSplitMetadata::from_json(&text)?;
        tracing::debug!(
            dir = %dir.display(),
            parts = metadata.part_mapping.len(),
            "opened split project"
        );
        Ok(Self {
            dir,
            metadata,
            cache: FxHashMap::default(),
            modified: FxHashSet::default(),
        })
    }

    pub fn is_split_project(dir: impl AsRef<Path>) -> bool {
        let dir = dir.as_ref();
        dir.join(METADATA_FILE).is_file() && dir.join(PARTS_DIR).is_dir()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn metadata(&self) -> &XmlSplitMetadata {
        &self.metadata
    }

    fn file_for(&self, xpath: &str) -> Result<&str> {
        self.metadata
            .part_mapping
            .get(xpath)
            .map(String::as_str)
            .ok_or_else(|| Error::UnknownPart {
                path: xpath.to_string(),
            })
    }

    /// Parts whose files exist, in mapping order.
    pub fn parts(&self) -> Vec<PartInfo> {
        self.metadata
            .part_mapping
            .iter()
            .filter_map(|(xpath, file)| {
                let meta = fs::metadata(self.dir.join(file)).ok()?;
                Some(PartInfo {
                    xpath: xpath.clone(),
                    file_path: file.clone(),
                    size: meta.len(),
                    is_modified: self.modified.contains(file),
                })
            })
            .collect()
    }

    pub fn part_content(&mut self, xpath: &str) -> Result<String> {
        let file = self.file_for(xpath)?.to_string();
        if let Some(cached) = self.cache.get(&file) {
            return Ok(cached.clone());
        }
        let path = self.dir.join(&file);
        let content = fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
        self.cache.insert(file, content.clone());
        Ok(content)
    }

    /// Replaces a part's file. The new content must parse.
    pub fn update_part(&mut self, xpath: &str, content: &str) -> Result<()> {
        let file = self.file_for(xpath)?.to_string();
        parse::parse(content)?;
        let path = self.dir.join(&file);
        fs::write(&path, content).map_err(|e| Error::io(&path, e))?;
        self.cache.insert(file.clone(), content.to_string());
        self.modified.insert(file);
        Ok(())
    }

    /// Per-part problems; parts without problems are absent.
    pub fn validate_parts(&mut self) -> IndexMap<String, Vec<String>> {
        let mut problems = IndexMap::new();
        let mapping: Vec<(String, String)> = self
            .metadata
            .part_mapping
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (xpath, file) in mapping {
            if !self.dir.join(&file).is_file() {
                problems.insert(xpath, vec![format!("File not found: {file}")]);
                continue;
            }
            match self.part_content(&xpath) {
                Ok(content) => {
                    if let Err(err) = parse::parse(&content) {
                        problems.insert(xpath, vec![format!("Invalid XML: {err}")]);
                    }
                }
                Err(err) => {
                    problems.insert(xpath, vec![format!("Could not read content: {err}")]);
                }
            }
        }
        problems
    }

    /// Reassembles the document. A single whole-document part is returned as-is; otherwise every
    /// part (minus its declaration) is wrapped in a `<reconstructed_xml>` element, each preceded by
    /// a comment naming its path.
    pub fn reconstruct(&mut self) -> Result<String> {
        if self.metadata.part_mapping.len() == 1 && self.metadata.part_mapping.contains_key("/") {
            return self.part_content("/");
        }
        let xpaths: Vec<String> = self
            .metadata
            .part_mapping
            .keys()
            .filter(|k| k.as_str() != "/")
            .cloned()
            .collect();
        let mut out = vec![XML_DECLARATION.to_string(), "<reconstructed_xml>".to_string()];
        for xpath in xpaths {
            let content = self.part_content(&xpath)?;
            let body = content
                .lines()
                .filter(|l| !l.trim_start().starts_with("<?xml"))
                .collect::<Vec<_>>()
                .join("\n");
            let body = body.trim();
            if body.is_empty() {
                continue;
            }
            out.push(format!("  <!-- Part: {} -->", xpath.replace("--", "- -")));
            out.extend(body.lines().map(|l| format!("  {l}")));
        }
        out.push("</reconstructed_xml>".to_string());
        Ok(out.join("\n"))
    }

    pub fn search(&mut self, term: &str, case_sensitive: bool) -> Vec<SearchHit> {
        let needle = if case_sensitive {
            term.to_string()
        } else {
            term.to_lowercase()
        };
        if needle.is_empty() {
            return Vec::new();
        }
        let mapping: Vec<(String, String)> = self
            .metadata
            .part_mapping
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut hits = Vec::new();
        for (xpath, file) in mapping {
            let Ok(content) = self.part_content(&xpath) else {
                continue;
            };
            let matching_lines: Vec<SearchLine> = content
                .lines()
                .enumerate()
                .filter_map(|(i, line)| {
                    let hay = if case_sensitive {
                        line.to_string()
                    } else {
                        line.to_lowercase()
                    };
                    hay.find(&needle).map(|start_pos| SearchLine {
                        line_number: i + 1,
                        content: line.trim().to_string(),
                        start_pos,
                    })
                })
                .collect();
            if !matching_lines.is_empty() {
                hits.push(SearchHit {
                    xpath,
                    file_path: file,
                    matches: matching_lines.len(),
                    matching_lines,
                });
            }
        }
        hits
    }

    pub fn statistics(&self) -> PartStatistics {
        let parts = self.parts();
        let total_size: u64 = parts.iter().map(|p| p.size).sum();
        PartStatistics {
            total_parts: self.metadata.total_parts,
            modified_parts: self.modified.len(),
            split_timestamp: self.metadata.split_timestamp.to_rfc3339(),
            original_checksum: self.metadata.checksum.clone(),
            total_size,
            total_size_kb: (total_size as f64 / 1024.0 * 100.0).round() / 100.0,
            parts,
        }
    }

    pub fn dependencies(&self) -> &[String] {
        &self.metadata.dependencies
    }

    /// Records an external dependency and saves the metadata. Returns `false` if it was already
    /// present.
    pub fn add_dependency(&mut self, dependency: &str) -> Result<bool> {
        if self.metadata.dependencies.iter().any(|d| d == dependency) {
            return Ok(false);
        }
        self.metadata.dependencies.push(dependency.to_string());
        write_metadata(&self.dir, &self.metadata)?;
        Ok(true)
    }

    pub fn remove_dependency(&mut self, dependency: &str) -> Result<bool> {
        let before = self.metadata.dependencies.len();
        self.metadata.dependencies.retain(|d| d != dependency);
        if self.metadata.dependencies.len() == before {
            return Ok(false);
        }
        write_metadata(&self.dir, &self.metadata)?;
        Ok(true)
    }

    /// Drops cached contents and the modified set.
    pub fn refresh(&mut self) {
        self.cache.clear();
        self.modified.clear();
    }
}
