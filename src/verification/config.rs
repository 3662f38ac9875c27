//! Verification configuration and per-run context

use super::result::Gate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-gate switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for GateSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Gates without an entry are enabled.
    pub gates: BTreeMap<Gate, GateSettings>,
    /// Minimum content length (in characters) accepted by the diff gate.
    pub min_content_length: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            gates: BTreeMap::new(),
            min_content_length: 20,
        }
    }
}

impl VerificationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_gate_enabled(mut self, gate: Gate, enabled: bool) -> Self {
        self.gates.insert(gate, GateSettings { enabled });
        self
    }

    pub fn with_min_content_length(mut self, len: usize) -> Self {
        self.min_content_length = len;
        self
    }

    pub fn is_enabled(&self, gate: Gate) -> bool {
        self.gates.get(&gate).map(|s| s.enabled).unwrap_or(true)
    }
}

/// Reference values handed to every gate check alongside the content.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationContext {
    /// Values that must appear verbatim in the content (diff gate).
    #[serde(default)]
    pub ground_truth: Vec<String>,
}

impl VerificationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ground_truth(mut self, value: impl Into<String>) -> Self {
        self.ground_truth.push(value.into());
        self
    }
}
