//! Data-driven failure categorisation.
//!
//! Rules are evaluated in order against the lowercased gate message; the first
//! match wins. Unmatched results fall back to a per-gate default.

use super::FailureCategory;
use crate::verification::{Gate, GateResult};
use regex::Regex;
use std::collections::BTreeMap;

/// How a rule recognises a message.
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Case-insensitive substring.
    Keyword(String),
    Pattern(Regex),
}

impl Matcher {
    fn matches(&self, message_lower: &str, message: &str) -> bool {
        match self {
            Matcher::Keyword(k) => message_lower.contains(k.as_str()),
            Matcher::Pattern(re) => re.is_match(message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub matcher: Matcher,
    pub category: FailureCategory,
}

#[derive(Debug, Clone)]
pub struct CategoryRules {
    rules: Vec<CategoryRule>,
    gate_defaults: BTreeMap<Gate, FailureCategory>,
    fallback: FailureCategory,
}

const CONFIG_KEYWORDS: &[&str] = &[
    "env var",
    "environment variable",
    "missing config",
    "misconfigured",
    "file not found",
    "no such file",
    "api key",
    "credentials",
];

const EXTERNAL_KEYWORDS: &[&str] = &[
    "connection refused",
    "connection reset",
    "rate limit",
    "timeout",
    "timed out",
    "service unavailable",
];

const WRONG_APPROACH_KEYWORDS: &[&str] = &[
    "approach",
    "architectural",
    "architecture",
    "redesign",
];

impl Default for CategoryRules {
    fn default() -> Self {
        let mut rules = Self::empty();
        for (keywords, category) in [
            (CONFIG_KEYWORDS, FailureCategory::Config),
            (EXTERNAL_KEYWORDS, FailureCategory::External),
            (WRONG_APPROACH_KEYWORDS, FailureCategory::WrongApproach),
        ] {
            for keyword in keywords {
                rules = rules.with_keyword(*keyword, category);
            }
        }
        rules
    }
}

impl CategoryRules {
    /// No overrides; every gate defaults to `CodeBug`.
    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            gate_defaults: Gate::ALL
                .iter()
                .map(|g| (*g, FailureCategory::CodeBug))
                .collect(),
            fallback: FailureCategory::CodeBug,
        }
    }

    /// Append a keyword rule (lowest priority so far).
    pub fn with_keyword(mut self, keyword: impl Into<String>, category: FailureCategory) -> Self {
        self.rules.push(CategoryRule {
            matcher: Matcher::Keyword(keyword.into().to_lowercase()),
            category,
        });
        self
    }

    /// Append a regex rule, matched against the original message.
    pub fn with_pattern(mut self, pattern: Regex, category: FailureCategory) -> Self {
        self.rules.push(CategoryRule {
            matcher: Matcher::Pattern(pattern),
            category,
        });
        self
    }

    pub fn with_gate_default(mut self, gate: Gate, category: FailureCategory) -> Self {
        self.gate_defaults.insert(gate, category);
        self
    }

    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    pub fn gate_default(&self, gate: Gate) -> FailureCategory {
        self.gate_defaults.get(&gate).copied().unwrap_or(self.fallback)
    }

    pub fn categorize(&self, result: &GateResult) -> FailureCategory {
        let lower = result.message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(&lower, &result.message))
            .map(|rule| rule.category)
            .unwrap_or_else(|| self.gate_default(result.gate))
    }
}
