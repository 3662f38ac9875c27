//! 质量门验证模块：按固定顺序运行八个独立的质量门并汇总结果。
//!
//! # Gate Verification Module
//!
//! Runs the eight quality gates (build, types, lint, tests, security, a11y,
//! perf, diff) over a unit of generated content and aggregates the results
//! into a [`VerificationReport`].
//!
//! ## Contract
//!
//! - Every gate runs on every call; a failing or erroring gate never stops the
//!   others. The report always holds exactly eight results in canonical order.
//! - A gate disabled in [`VerificationConfig`] reports `Skipped`.
//! - A [`GateCheck`] returning `Err` is recorded as `Failed` with the error
//!   message.
//!
//! ```rust
//! use healing_orchestrator::verification::{GateVerifier, VerificationContext};
//!
//! # tokio_test::block_on(async {
//! let verifier = GateVerifier::builtin();
//! let report = verifier
//!     .run("Plain prose without code blocks, long enough to pass.", &VerificationContext::new())
//!     .await;
//! assert!(report.all_green());
//! assert_eq!(report.results().len(), 8);
//! # });
//! ```

pub mod checks;
pub mod config;
pub mod result;

pub use config::{GateSettings, VerificationConfig, VerificationContext};
pub use result::{Gate, GateResult, GateStatus, GateSummary, VerificationReport};

use crate::Result;
use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// One gate's check over `(content, context)`.
///
/// The verifier overwrites the `gate` field of the returned result with the
/// slot the check is registered for.
#[async_trait]
pub trait GateCheck: Send + Sync {
    async fn check(&self, content: &str, context: &VerificationContext) -> Result<GateResult>;
}

/// Adapter turning a synchronous closure into a [`GateCheck`].
pub struct FnGateCheck<F> {
    f: F,
}

impl<F> FnGateCheck<F>
where
    F: Fn(&str, &VerificationContext) -> GateResult + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> GateCheck for FnGateCheck<F>
where
    F: Fn(&str, &VerificationContext) -> GateResult + Send + Sync,
{
    async fn check(&self, content: &str, context: &VerificationContext) -> Result<GateResult> {
        Ok((self.f)(content, context))
    }
}

/// Orchestrates the eight gate checks.
#[derive(Clone)]
pub struct GateVerifier {
    config: VerificationConfig,
    checks: BTreeMap<Gate, Arc<dyn GateCheck>>,
}

impl fmt::Debug for GateVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateVerifier")
            .field("config", &self.config)
            .field("checks", &self.checks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for GateVerifier {
    fn default() -> Self {
        Self::builtin()
    }
}

impl GateVerifier {
    /// Verifier using the built-in heuristic checks.
    pub fn new(config: VerificationConfig) -> Self {
        let diff = checks::DiffCheck {
            min_length: config.min_content_length,
        };
        let mut builtins: BTreeMap<Gate, Arc<dyn GateCheck>> = BTreeMap::new();
        builtins.insert(Gate::Build, Arc::new(checks::BuildCheck));
        builtins.insert(Gate::Types, Arc::new(checks::TypesCheck));
        builtins.insert(Gate::Lint, Arc::new(checks::LintCheck));
        builtins.insert(Gate::Tests, Arc::new(checks::TestsCheck));
        builtins.insert(Gate::Security, Arc::new(checks::SecurityCheck));
        builtins.insert(Gate::Accessibility, Arc::new(checks::AccessibilityCheck));
        builtins.insert(Gate::Performance, Arc::new(checks::PerformanceCheck));
        builtins.insert(Gate::Diff, Arc::new(diff));
        Self {
            config,
            checks: builtins,
        }
    }

    pub fn builtin() -> Self {
        Self::new(VerificationConfig::default())
    }

    /// Verifier whose every gate passes.
    pub fn noop() -> Self {
        let pass: Arc<dyn GateCheck> = Arc::new(checks::PassCheck);
        Self {
            config: VerificationConfig::default(),
            checks: Gate::ALL.iter().map(|g| (*g, pass.clone())).collect(),
        }
    }

    /// Replace the check for `gate`.
    pub fn with_check(mut self, gate: Gate, check: Arc<dyn GateCheck>) -> Self {
        self.checks.insert(gate, check);
        self
    }

    /// Replace the check for `gate` with a closure.
    pub fn with_fn_check<F>(self, gate: Gate, f: F) -> Self
    where
        F: Fn(&str, &VerificationContext) -> GateResult + Send + Sync + 'static,
    {
        self.with_check(gate, Arc::new(FnGateCheck::new(f)))
    }

    pub fn with_config(mut self, config: VerificationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &VerificationConfig {
        &self.config
    }

    /// Run all eight gates and aggregate.
    ///
    /// Gates run cooperatively on the current task; results keep canonical order.
    pub async fn run(&self, content: &str, context: &VerificationContext) -> VerificationReport {
        let results = join_all(
            Gate::ALL
                .iter()
                .map(|gate| self.run_gate(*gate, content, context)),
        )
        .await;

        let report = VerificationReport::new(results);
        let summary = report.summary();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            skipped = summary.skipped,
            "verification finished"
        );
        report
    }

    async fn run_gate(&self, gate: Gate, content: &str, context: &VerificationContext) -> GateResult {
        if !self.config.is_enabled(gate) {
            return GateResult::skipped(gate, "gate disabled");
        }
        let Some(check) = self.checks.get(&gate) else {
            return GateResult::skipped(gate, "no check registered");
        };

        let mut result = match check.check(content, context).await {
            Ok(result) => result,
            Err(e) => GateResult::failed(gate, format!("gate check error: {}", e)),
        };
        result.gate = gate;
        debug!(gate = %gate, status = ?result.status, message = %result.message, "gate finished");
        result
    }
}
