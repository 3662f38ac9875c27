//! 自愈模块：诊断失败的质量门并驱动 修复→复验 循环，直至全部通过或升级处理。
//!
//! # Self-Healing Module
//!
//! Turns a failing [`VerificationReport`] into a [`Diagnosis`] and drives a
//! bounded fix/re-verify loop.
//!
//! | Component | Role |
//! |-----------|------|
//! | [`FailureCategory`] | Why a gate failed |
//! | [`rules::CategoryRules`] | Ordered keyword rules plus per-gate defaults |
//! | [`SelfHealer`] | `categorize` / `diagnose` / `heal` |
//! | [`fixes::HeuristicFixer`] | Built-in text fixes for lint, security and a11y |
//!
//! The healer never modifies content itself: fixing and re-verifying are
//! caller-supplied closures.

pub mod fixes;
pub mod rules;

pub use fixes::{ContentFixer, FixOutcome, HeuristicFixer};
pub use rules::{CategoryRule, CategoryRules, Matcher};

use crate::resilience::backoff::is_cancelled;
use crate::verification::{Gate, GateResult, VerificationReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    CodeBug,
    Config,
    WrongApproach,
    External,
}

impl FailureCategory {
    /// Generic remediation for this category.
    pub fn action(&self) -> &'static str {
        match self {
            FailureCategory::CodeBug => "Fix code errors in the affected files",
            FailureCategory::Config => "Check configuration files and environment variables",
            FailureCategory::WrongApproach => "Replan with a different implementation strategy",
            FailureCategory::External => "Retry with exponential backoff",
        }
    }
}

impl fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureCategory::CodeBug => "code_bug",
            FailureCategory::Config => "config",
            FailureCategory::WrongApproach => "wrong_approach",
            FailureCategory::External => "external",
        };
        f.write_str(s)
    }
}

fn gate_action(gate: Gate) -> &'static str {
    match gate {
        Gate::Build => "Fix syntax errors so the build succeeds",
        Gate::Types => "Resolve type errors and remove 'any' escapes",
        Gate::Lint => "Run auto-formatter",
        Gate::Tests => "Review and fix failing test cases",
        Gate::Security => "Remove secrets and vulnerabilities",
        Gate::Accessibility => "Fix contrast/ARIA/keyboard issues",
        Gate::Performance => "Optimize performance",
        Gate::Diff => "Regenerate output to cover the expected content",
    }
}

/// Categorised view of one failed gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealAttempt {
    pub gate: Gate,
    pub category: FailureCategory,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnosis {
    pub failed_gates: BTreeSet<Gate>,
    /// One entry per gate that did not pass, in report order.
    pub analyses: Vec<HealAttempt>,
    /// Deduplicated, category actions first then gate-specific ones.
    pub suggested_actions: Vec<String>,
}

impl Diagnosis {
    pub fn categories(&self) -> BTreeSet<FailureCategory> {
        self.analyses.iter().map(|a| a.category).collect()
    }

    pub fn has_gate(&self, gate: Gate) -> bool {
        self.failed_gates.contains(&gate)
    }
}

/// Outcome of one fixer invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub changes: Vec<String>,
}

impl HealResult {
    pub fn success(message: impl Into<String>, changes: Vec<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            changes,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            changes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealCycleResult {
    pub cycle_id: Uuid,
    pub success: bool,
    /// Fixer invocations actually made.
    pub attempts: u32,
    pub escalation_needed: bool,
    pub history: Vec<HealResult>,
    /// Most recent verification report produced during the cycle.
    pub final_report: Option<VerificationReport>,
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealingConfig {
    pub max_attempts: u32,
}

impl Default for HealingConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

impl HealingConfig {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SelfHealer {
    max_attempts: u32,
    rules: CategoryRules,
    cancel: Option<CancellationToken>,
}

impl Default for SelfHealer {
    fn default() -> Self {
        Self::new(HealingConfig::default().max_attempts)
    }
}

impl SelfHealer {
    /// `max_attempts` below 1 is treated as 1.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            rules: CategoryRules::default(),
            cancel: None,
        }
    }

    pub fn from_config(config: &HealingConfig) -> Self {
        Self::new(config.max_attempts)
    }

    pub fn with_rules(mut self, rules: CategoryRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn rules(&self) -> &CategoryRules {
        &self.rules
    }

    pub fn categorize(&self, result: &GateResult) -> FailureCategory {
        self.rules.categorize(result)
    }

    /// `None` when the report is all green. Otherwise every gate that did not
    /// pass is analysed, skipped gates included.
    pub fn diagnose(&self, report: &VerificationReport) -> Option<Diagnosis> {
        if report.all_green() {
            return None;
        }

        let analyses: Vec<HealAttempt> = report
            .results()
            .iter()
            .filter(|r| !r.is_passed())
            .map(|r| HealAttempt {
                gate: r.gate,
                category: self.categorize(r),
                description: r.message.clone(),
            })
            .collect();

        let mut suggested_actions: Vec<String> = Vec::new();
        let category_actions = analyses.iter().map(|a| a.category.action());
        let gate_actions = analyses.iter().map(|a| gate_action(a.gate));
        for action in category_actions.chain(gate_actions) {
            if !suggested_actions.iter().any(|s| s == action) {
                suggested_actions.push(action.to_string());
            }
        }

        Some(Diagnosis {
            failed_gates: analyses.iter().map(|a| a.gate).collect(),
            analyses,
            suggested_actions,
        })
    }

    /// Alternate `fixer` and `verifier` until verification is all green or the
    /// attempt budget runs out.
    ///
    /// A fixer reporting `success = false` consumes an attempt without
    /// re-verifying. After a non-green re-verification the diagnosis is
    /// refreshed from the new report.
    pub async fn heal<Fx, FxFut, V, VFut>(
        &self,
        diagnosis: Diagnosis,
        mut fixer: Fx,
        mut verifier: V,
    ) -> HealCycleResult
    where
        Fx: FnMut(Diagnosis) -> FxFut,
        FxFut: Future<Output = HealResult>,
        V: FnMut() -> VFut,
        VFut: Future<Output = VerificationReport>,
    {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("heal_cycle", %cycle_id);

        async move {
            let cancel = self.cancel.as_ref();
            let mut diagnosis = diagnosis;
            let mut history = Vec::new();
            let mut final_report = None;
            let mut attempts = 0u32;

            info!(
                failed_gates = diagnosis.failed_gates.len(),
                max_attempts = self.max_attempts,
                "starting heal cycle"
            );

            while attempts < self.max_attempts {
                if is_cancelled(cancel) {
                    warn!(attempts, "heal cycle cancelled");
                    return HealCycleResult {
                        cycle_id,
                        success: false,
                        attempts,
                        escalation_needed: true,
                        history,
                        final_report,
                        cancelled: true,
                    };
                }
                attempts += 1;

                let fix = fixer(diagnosis.clone()).await;
                let fixed = fix.success;
                if fixed {
                    info!(attempt = attempts, changes = fix.changes.len(), "fix applied");
                } else {
                    warn!(attempt = attempts, message = %fix.message, "fix attempt failed");
                }
                history.push(fix);
                if !fixed {
                    continue;
                }

                let report = verifier().await;
                if report.all_green() {
                    info!(attempts, "heal cycle succeeded");
                    return HealCycleResult {
                        cycle_id,
                        success: true,
                        attempts,
                        escalation_needed: false,
                        history,
                        final_report: Some(report),
                        cancelled: false,
                    };
                }
                if let Some(next) = self.diagnose(&report) {
                    diagnosis = next;
                }
                final_report = Some(report);
            }

            error!(
                attempts,
                failed_gates = ?diagnosis.failed_gates,
                "heal budget exhausted; escalation needed"
            );
            HealCycleResult {
                cycle_id,
                success: false,
                attempts,
                escalation_needed: true,
                history,
                final_report,
                cancelled: false,
            }
        }
        .instrument(span)
        .await
    }
}
