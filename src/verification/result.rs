//! Gate and report value types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// One of the eight quality gates, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gate {
    Build,
    Types,
    Lint,
    Tests,
    Security,
    #[serde(rename = "a11y", alias = "accessibility")]
    Accessibility,
    #[serde(rename = "perf", alias = "performance")]
    Performance,
    Diff,
}

impl Gate {
    /// Every gate in the order `run()` reports them.
    pub const ALL: [Gate; 8] = [
        Gate::Build,
        Gate::Types,
        Gate::Lint,
        Gate::Tests,
        Gate::Security,
        Gate::Accessibility,
        Gate::Performance,
        Gate::Diff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gate::Build => "build",
            Gate::Types => "types",
            Gate::Lint => "lint",
            Gate::Tests => "tests",
            Gate::Security => "security",
            Gate::Accessibility => "a11y",
            Gate::Performance => "perf",
            Gate::Diff => "diff",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Gate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "build" => Ok(Gate::Build),
            "types" => Ok(Gate::Types),
            "lint" => Ok(Gate::Lint),
            "tests" => Ok(Gate::Tests),
            "security" => Ok(Gate::Security),
            "a11y" | "accessibility" => Ok(Gate::Accessibility),
            "perf" | "performance" => Ok(Gate::Performance),
            "diff" => Ok(Gate::Diff),
            other => Err(format!("unknown gate '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of one gate. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateResult {
    pub gate: Gate,
    pub status: GateStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<String>,
}

impl GateResult {
    pub fn passed(gate: Gate, message: impl Into<String>) -> Self {
        Self {
            gate,
            status: GateStatus::Passed,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn failed(gate: Gate, message: impl Into<String>) -> Self {
        Self {
            gate,
            status: GateStatus::Failed,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn skipped(gate: Gate, message: impl Into<String>) -> Self {
        Self {
            gate,
            status: GateStatus::Skipped,
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn is_passed(&self) -> bool {
        self.status == GateStatus::Passed
    }

    pub fn is_failed(&self) -> bool {
        self.status == GateStatus::Failed
    }
}

/// Counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSummary {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Ordered gate results of one verification run.
///
/// A skipped (disabled) gate does not block `all_green`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    results: Vec<GateResult>,
}

impl VerificationReport {
    pub fn new(results: Vec<GateResult>) -> Self {
        Self { results }
    }

    pub fn results(&self) -> &[GateResult] {
        &self.results
    }

    pub fn get(&self, gate: Gate) -> Option<&GateResult> {
        self.results.iter().find(|r| r.gate == gate)
    }

    pub fn all_green(&self) -> bool {
        !self.results.iter().any(GateResult::is_failed)
    }

    pub fn failures(&self) -> Vec<&GateResult> {
        self.results.iter().filter(|r| r.is_failed()).collect()
    }

    pub fn failed_gates(&self) -> BTreeSet<Gate> {
        self.failures().into_iter().map(|r| r.gate).collect()
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_failed()).count()
    }

    pub fn summary(&self) -> GateSummary {
        self.results
            .iter()
            .fold(GateSummary::default(), |mut acc, r| {
                match r.status {
                    GateStatus::Passed => acc.passed += 1,
                    GateStatus::Failed => acc.failed += 1,
                    GateStatus::Skipped => acc.skipped += 1,
                }
                acc
            })
    }
}
