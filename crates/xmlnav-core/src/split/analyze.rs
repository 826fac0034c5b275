use super::{RuleType, XmlSplitConfig, XmlSplitRule};
use crate::error::Result;
use crate::parse::{self, Element};
use crate::tree::{XmlTree, build_tree};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelAnalysis {
    pub element_count: usize,
    pub percentage_of_total: f64,
    pub exceeds_threshold: bool,
    pub recommended_for_splitting: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdAnalysis {
    pub threshold_percentage: f64,
    pub upper_levels: Vec<usize>,
    /// Only levels that exist in the document appear here.
    pub level_analysis: BTreeMap<usize, LevelAnalysis>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitPoint {
    pub path: String,
    pub tag: String,
    /// 1-based document level.
    pub level: usize,
    pub reason: String,
    pub priority: i32,
    pub split_type: RuleType,
    /// Pre-order index of the element in the parsed document.
    #[serde(skip)]
    pub(crate) element_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub total_elements: usize,
    pub element_counts_by_level: BTreeMap<usize, usize>,
    /// `None` when the config has no enabled threshold rule.
    pub threshold_analysis: Option<ThresholdAnalysis>,
    /// Ordered by ascending rule priority; each path appears once.
    pub recommended_splits: Vec<SplitPoint>,
}

/// Parses `text` and reports per-level counts and recommended split points.
pub fn analyze(text: &str, config: &XmlSplitConfig) -> Result<AnalysisReport> {
    let root = parse::parse(text)?;
    let tree = build_tree(text, &root)?;
    Ok(analyze_parsed(&root, &tree, config))
}

/// One entry per element, in pre-order.
struct Located<'a> {
    element: &'a Element,
    path: &'a str,
    level: usize,
}

fn locate<'a>(root: &'a Element, tree: &'a XmlTree) -> Vec<Located<'a>> {
    // The tree builder visits elements in the same pre-order as `Element::iter`.
    root.iter()
        .zip(tree.iter())
        .map(|(element, id)| Located {
            element,
            path: tree.node(id).path.as_str(),
            level: tree.depth(id) + 1,
        })
        .collect()
}

pub(crate) fn analyze_parsed(
    root: &Element,
    tree: &XmlTree,
    config: &XmlSplitConfig,
) -> AnalysisReport {
    let located = locate(root, tree);
    let total_elements = located.len();
    let mut element_counts_by_level: BTreeMap<usize, usize> = BTreeMap::new();
    for loc in &located {
        *element_counts_by_level.entry(loc.level).or_default() += 1;
    }

    let threshold = config
        .threshold_rule()
        .and_then(|rule| Some((rule, rule.threshold_percentage()?)));
    let threshold_analysis = threshold.map(|(_, pct)| {
        let level_analysis = config
            .upper_levels
            .iter()
            .filter_map(|&level| {
                let count = *element_counts_by_level.get(&level)?;
                let percentage = if total_elements > 0 {
                    count as f64 / total_elements as f64 * 100.0
                } else {
                    0.0
                };
                Some((
                    level,
                    LevelAnalysis {
                        element_count: count,
                        percentage_of_total: percentage,
                        exceeds_threshold: percentage > pct,
                        recommended_for_splitting: percentage > pct,
                    },
                ))
            })
            .collect();
        ThresholdAnalysis {
            threshold_percentage: pct,
            upper_levels: config.upper_levels.clone(),
            level_analysis,
        }
    });

    let mut splits: Vec<SplitPoint> = Vec::new();
    if let (Some((rule, pct)), Some(analysis)) = (threshold, &threshold_analysis) {
        for (&level, la) in &analysis.level_analysis {
            if !la.recommended_for_splitting {
                continue;
            }
            for (idx, loc) in located.iter().enumerate().filter(|(_, l)| l.level == level) {
                splits.push(point(
                    idx,
                    loc,
                    rule,
                    format!("Level {level} exceeds {pct}% threshold"),
                ));
            }
        }
    }

    for rule in config
        .rules
        .iter()
        .filter(|r| r.enabled && r.rule_type != RuleType::Threshold)
    {
        match rule.rule_type {
            RuleType::Element => {
                let name = rule.criteria.trim();
                for (idx, loc) in located.iter().enumerate() {
                    if loc.element.tag == name {
                        splits.push(point(
                            idx,
                            loc,
                            rule,
                            format!("Element type '{name}' split rule"),
                        ));
                    }
                }
            }
            RuleType::Depth => {
                let Some(depth) = rule.target_depth() else {
                    continue;
                };
                for (idx, loc) in located.iter().enumerate().filter(|(_, l)| l.level == depth) {
                    splits.push(point(
                        idx,
                        loc,
                        rule,
                        format!("Depth level {depth} split rule"),
                    ));
                }
            }
            RuleType::Xpath => {
                let by_addr: FxHashMap<*const Element, usize> = located
                    .iter()
                    .enumerate()
                    .map(|(idx, loc)| (loc.element as *const Element, idx))
                    .collect();
                let expr = rule.criteria.trim();
                for found in root.find_all(expr) {
                    if let Some(&idx) = by_addr.get(&(found as *const Element)) {
                        splits.push(point(
                            idx,
                            &located[idx],
                            rule,
                            format!("XPath '{expr}' split rule"),
                        ));
                    }
                }
            }
            RuleType::Size | RuleType::Threshold => {}
        }
    }

    splits.sort_by_key(|s| s.priority);
    let mut seen: FxHashSet<String> = FxHashSet::default();
    splits.retain(|s| seen.insert(s.path.clone()));

    tracing::debug!(
        total_elements,
        levels = element_counts_by_level.len(),
        splits = splits.len(),
        "analyzed document for splitting"
    );

    AnalysisReport {
        total_elements,
        element_counts_by_level,
        threshold_analysis,
        recommended_splits: splits,
    }
}

fn point(idx: usize, loc: &Located<'_>, rule: &XmlSplitRule, reason: String) -> SplitPoint {
    SplitPoint {
        path: loc.path.to_string(),
        tag: loc.element.tag.clone(),
        level: loc.level,
        reason,
        priority: rule.priority,
        split_type: rule.rule_type,
        element_index: idx,
    }
}
