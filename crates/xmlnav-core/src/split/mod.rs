//! Threshold-based document splitting.
//!
//! Levels in this module are 1-based document levels (the root element is level 1), unlike the
//! 0-based graph levels used by the layout crate.

mod analyze;
pub mod parts;
mod writer;

pub use analyze::{AnalysisReport, LevelAnalysis, SplitPoint, ThresholdAnalysis, analyze};
pub use parts::PartManager;
pub use writer::{METADATA_FILE, PARTS_DIR, split};
pub(crate) use writer::split_document;

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Threshold,
    Element,
    Depth,
    /// Approximate part size limit in bytes. Planning only: it selects no split points.
    Size,
    Xpath,
}

impl RuleType {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleType::Threshold => "threshold",
            RuleType::Element => "element",
            RuleType::Depth => "depth",
            RuleType::Size => "size",
            RuleType::Xpath => "xpath",
        }
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "threshold" => Ok(RuleType::Threshold),
            "element" => Ok(RuleType::Element),
            "depth" => Ok(RuleType::Depth),
            "size" => Ok(RuleType::Size),
            "xpath" => Ok(RuleType::Xpath),
            other => Err(Error::InvalidRuleType {
                rule_type: other.to_string(),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    1
}

/// One prioritized splitting rule. Lower `priority` wins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRule")]
pub struct XmlSplitRule {
    pub rule_type: RuleType,
    pub criteria: String,
    pub priority: i32,
    pub preserve_context: bool,
    pub enabled: bool,
}

#[derive(Deserialize)]
struct RawRule {
    rule_type: String,
    criteria: String,
    #[serde(default = "default_priority")]
    priority: i32,
    #[serde(default = "default_true")]
    preserve_context: bool,
    #[serde(default = "default_true")]
    enabled: bool,
}

impl TryFrom<RawRule> for XmlSplitRule {
    type Error = Error;

    fn try_from(raw: RawRule) -> Result<Self> {
        let mut rule = XmlSplitRule::new(&raw.rule_type, raw.criteria, raw.priority)?;
        rule.preserve_context = raw.preserve_context;
        rule.enabled = raw.enabled;
        Ok(rule)
    }
}

impl XmlSplitRule {
    /// Builds a rule from its textual type, rejecting unknown types and criteria that cannot be
    /// interpreted for that type.
    pub fn new(rule_type: &str, criteria: impl Into<String>, priority: i32) -> Result<Self> {
        let rule_type: RuleType = rule_type.parse()?;
        let rule = Self {
            rule_type,
            criteria: criteria.into(),
            priority,
            preserve_context: true,
            enabled: true,
        };
        rule.check_criteria()?;
        Ok(rule)
    }

    fn check_criteria(&self) -> Result<()> {
        let ok = match self.rule_type {
            RuleType::Threshold => self.threshold_percentage().is_some(),
            RuleType::Depth => self.target_depth().is_some(),
            RuleType::Size => self.criteria.trim().parse::<u64>().is_ok(),
            RuleType::Element | RuleType::Xpath => !self.criteria.trim().is_empty(),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidRuleCriteria {
                rule_type: self.rule_type.to_string(),
                criteria: self.criteria.clone(),
            })
        }
    }

    pub fn threshold_rule(percentage: f64) -> Self {
        Self {
            rule_type: RuleType::Threshold,
            criteria: format!("{percentage}%"),
            priority: 1,
            preserve_context: true,
            enabled: true,
        }
    }

    pub fn element_rule(name: impl Into<String>) -> Self {
        Self {
            rule_type: RuleType::Element,
            criteria: name.into(),
            priority: 2,
            preserve_context: true,
            enabled: true,
        }
    }

    pub fn depth_rule(level: usize) -> Self {
        Self {
            rule_type: RuleType::Depth,
            criteria: level.to_string(),
            priority: 3,
            preserve_context: true,
            enabled: true,
        }
    }

    pub fn size_rule(limit_bytes: u64) -> Self {
        Self {
            rule_type: RuleType::Size,
            criteria: limit_bytes.to_string(),
            priority: 4,
            preserve_context: true,
            enabled: true,
        }
    }

    pub fn xpath_rule(expr: impl Into<String>) -> Self {
        Self {
            rule_type: RuleType::Xpath,
            criteria: expr.into(),
            priority: 5,
            preserve_context: true,
            enabled: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_preserve_context(mut self, preserve_context: bool) -> Self {
        self.preserve_context = preserve_context;
        self
    }

    /// `"15%"` / `"15"` → 15.0, for threshold rules.
    pub fn threshold_percentage(&self) -> Option<f64> {
        if self.rule_type != RuleType::Threshold {
            return None;
        }
        let pct: f64 = self.criteria.trim().trim_end_matches('%').trim().parse().ok()?;
        pct.is_finite().then_some(pct)
    }

    /// Target 1-based level, for depth rules.
    pub fn target_depth(&self) -> Option<usize> {
        if self.rule_type != RuleType::Depth {
            return None;
        }
        self.criteria.trim().parse().ok()
    }
}

fn default_threshold_percentage() -> f64 {
    15.0
}

fn default_upper_levels() -> Vec<usize> {
    vec![2, 3]
}

fn default_min_elements_per_part() -> usize {
    5
}

fn default_max_parts() -> usize {
    100
}

/// Splitting policy. The rule list is never empty: a threshold rule at `threshold_percentage` is
/// added when none is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawConfig")]
pub struct XmlSplitConfig {
    pub threshold_percentage: f64,
    pub upper_levels: Vec<usize>,
    pub rules: Vec<XmlSplitRule>,
    pub output_directory: String,
    pub preserve_namespaces: bool,
    pub create_index_file: bool,
    pub min_elements_per_part: usize,
    pub max_parts: usize,
    pub include_comments: bool,
    pub preserve_context: bool,
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_threshold_percentage")]
    threshold_percentage: f64,
    #[serde(default = "default_upper_levels")]
    upper_levels: Vec<usize>,
    #[serde(default)]
    rules: Vec<XmlSplitRule>,
    #[serde(default)]
    output_directory: String,
    #[serde(default = "default_true")]
    preserve_namespaces: bool,
    #[serde(default = "default_true")]
    create_index_file: bool,
    #[serde(default = "default_min_elements_per_part")]
    min_elements_per_part: usize,
    #[serde(default = "default_max_parts")]
    max_parts: usize,
    #[serde(default = "default_true")]
    include_comments: bool,
    #[serde(default = "default_true")]
    preserve_context: bool,
}

impl From<RawConfig> for XmlSplitConfig {
    fn from(raw: RawConfig) -> Self {
        let mut config = XmlSplitConfig {
            threshold_percentage: raw.threshold_percentage,
            upper_levels: raw.upper_levels,
            rules: raw.rules,
            output_directory: raw.output_directory,
            preserve_namespaces: raw.preserve_namespaces,
            create_index_file: raw.create_index_file,
            min_elements_per_part: raw.min_elements_per_part,
            max_parts: raw.max_parts,
            include_comments: raw.include_comments,
            preserve_context: raw.preserve_context,
        };
        config.ensure_rules();
        config
    }
}

impl Default for XmlSplitConfig {
    fn default() -> Self {
        Self::new(default_threshold_percentage(), default_upper_levels())
    }
}

impl XmlSplitConfig {
    pub fn new(threshold_percentage: f64, upper_levels: Vec<usize>) -> Self {
        let mut config = Self {
            threshold_percentage,
            upper_levels,
            rules: Vec::new(),
            output_directory: String::new(),
            preserve_namespaces: true,
            create_index_file: true,
            min_elements_per_part: default_min_elements_per_part(),
            max_parts: default_max_parts(),
            include_comments: true,
            preserve_context: true,
        };
        config.ensure_rules();
        config
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn ensure_rules(&mut self) {
        if self.rules.is_empty() {
            self.rules
                .push(XmlSplitRule::threshold_rule(self.threshold_percentage));
        }
    }

    /// Adds a rule and keeps the list ordered by priority (stable for equal priorities).
    pub fn add_rule(&mut self, rule: XmlSplitRule) {
        self.rules.push(rule);
        self.rules.sort_by_key(|r| r.priority);
    }

    /// Sets the threshold and rewrites the criteria of every threshold rule to match.
    pub fn set_threshold(&mut self, percentage: f64) {
        self.threshold_percentage = percentage;
        for rule in self
            .rules
            .iter_mut()
            .filter(|r| r.rule_type == RuleType::Threshold)
        {
            rule.criteria = format!("{percentage}%");
        }
        self.ensure_rules();
    }

    /// The first enabled threshold rule.
    pub fn threshold_rule(&self) -> Option<&XmlSplitRule> {
        self.rules
            .iter()
            .find(|r| r.rule_type == RuleType::Threshold && r.enabled)
    }
}

/// Durable record of a completed split, stored as `metadata.json` beside the `parts/` directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XmlSplitMetadata {
    pub original_file: String,
    pub split_timestamp: DateTime<FixedOffset>,
    pub split_config: XmlSplitConfig,
    /// Structural path → part file, relative to the split directory.
    #[serde(default)]
    pub part_mapping: IndexMap<String, String>,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub checksum: String,
    #[serde(default)]
    pub total_parts: usize,
}

impl XmlSplitMetadata {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_rule_types_are_rejected() {
        let err = XmlSplitRule::new("bogus", "x", 1).unwrap_err();
        assert!(matches!(err, Error::InvalidRuleType { ref rule_type } if rule_type == "bogus"));
        assert!(matches!(
            XmlSplitRule::new("depth", "two", 1),
            Err(Error::InvalidRuleCriteria { .. })
        ));
        let rule = XmlSplitRule::new("threshold", "12.5%", 1).unwrap();
        assert_eq!(rule.threshold_percentage(), Some(12.5));
    }

    #[test]
    fn factories_use_fixed_priorities() {
        assert_eq!(XmlSplitRule::element_rule("item").priority, 2);
        assert_eq!(XmlSplitRule::depth_rule(3).priority, 3);
        assert_eq!(XmlSplitRule::size_rule(1024).priority, 4);
        assert_eq!(XmlSplitRule::xpath_rule("//a").priority, 5);
    }

    #[test]
    fn config_always_has_a_rule_and_sorts_added_rules() {
        let mut config = XmlSplitConfig::new(20.0, vec![2]);
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.threshold_rule().unwrap().criteria, "20%");
        config.add_rule(XmlSplitRule::xpath_rule("//x"));
        config.add_rule(XmlSplitRule::element_rule("e").with_priority(0));
        let kinds: Vec<_> = config.rules.iter().map(|r| r.rule_type).collect();
        assert_eq!(kinds, [RuleType::Element, RuleType::Threshold, RuleType::Xpath]);

        config.set_threshold(7.5);
        assert_eq!(config.threshold_rule().unwrap().threshold_percentage(), Some(7.5));
    }

    #[test]
    fn json_config_takes_defaults_and_validates_rules() {
        let config = XmlSplitConfig::from_json("{}").unwrap();
        assert_eq!(config, XmlSplitConfig::default());
        assert_eq!(config.upper_levels, [2, 3]);

        let config = XmlSplitConfig::from_json(
            r#"{"threshold_percentage": 10, "rules": [{"rule_type": "element", "criteria": "item", "priority": 2}]}"#,
        )
        .unwrap();
        assert!(config.threshold_rule().is_none());
        assert_eq!(config.rules[0].criteria, "item");

        let err = XmlSplitConfig::from_json(r#"{"rules": [{"rule_type": "nope", "criteria": ""}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("Invalid rule type: nope"));
    }
}
