//! Pattern-based danger classification.
//!
//! The classifier searches the whole command string for a fixed table of
//! high-risk patterns. It is a plain substring/regex search: a pattern that
//! shows up inside an argument fires just like one in verb position.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Flag attached to a command that matched any risk pattern.
pub const DANGEROUS_COMMAND: &str = "dangerous_command";

/// Built-in risk patterns as `(name, regex)` pairs, checked in order.
pub const RISK_PATTERNS: &[(&str, &str)] = &[
    ("recursive_force_delete_root", r"(^|\s)rm\s+-rf\s+/"),
    ("shutdown", r"\bshutdown\b"),
    ("reboot", r"\breboot\b"),
    ("device_redirect", r">\s*/dev"),
    ("chmod_zero", r"\bchmod\s+0+\b"),
];

static DEFAULT_CLASSIFIER: LazyLock<DangerClassifier> =
    LazyLock::new(|| DangerClassifier::from_table(RISK_PATTERNS));

/// A single named risk pattern.
#[derive(Debug, Clone)]
pub struct RiskPattern {
    pub name: String,
    regex: Regex,
}

impl RiskPattern {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            regex: Regex::new(pattern)?,
        })
    }

    pub fn is_match(&self, command: &str) -> bool {
        self.regex.is_match(command)
    }
}

/// Stateless matcher of command strings against a list of risk patterns.
#[derive(Debug, Clone, Default)]
pub struct DangerClassifier {
    patterns: Vec<RiskPattern>,
}

impl DangerClassifier {
    /// Build a classifier from a `(name, regex)` table.
    ///
    /// Entries whose regex does not compile are logged and skipped.
    pub fn from_table(table: &[(&str, &str)]) -> Self {
        let patterns = table
            .iter()
            .filter_map(|(name, pattern)| match RiskPattern::new(*name, pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::error!("Skipping invalid risk pattern '{}': {}", name, e);
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    /// Add another pattern to the table.
    pub fn with_pattern(mut self, pattern: RiskPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn patterns(&self) -> &[RiskPattern] {
        &self.patterns
    }

    /// Names of every pattern that matches `command`.
    pub fn matched_patterns(&self, command: &str) -> Vec<&str> {
        self.patterns
            .iter()
            .filter(|p| p.is_match(command))
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Classify a command. An empty set means no pattern matched.
    pub fn classify(&self, command: &str) -> BTreeSet<String> {
        let matched = self.matched_patterns(command);
        let mut flags = BTreeSet::new();
        if !matched.is_empty() {
            tracing::debug!("Command matched risk patterns: {:?}", matched);
            flags.insert(DANGEROUS_COMMAND.to_string());
        }
        flags
    }
}

/// Classify `command` with the built-in pattern table.
pub fn classify(command: &str) -> BTreeSet<String> {
    DEFAULT_CLASSIFIER.classify(command)
}
