//! Verify-then-heal pipeline over a single piece of content.
//!
//! [`HealingPipeline::run`] verifies the content once; if any gate fails it
//! hands a [`ContentFixer`] and the verifier to a [`SelfHealer`] cycle and
//! returns whatever content the cycle ended with.

use crate::healing::{ContentFixer, Diagnosis, HealCycleResult, SelfHealer};
use crate::verification::{GateVerifier, VerificationContext, VerificationReport};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub content: String,
    /// Report of the last verification performed.
    pub report: VerificationReport,
    /// `None` when the first verification was already green.
    pub heal: Option<HealCycleResult>,
}

impl PipelineOutcome {
    pub fn is_green(&self) -> bool {
        self.report.all_green()
    }
}

#[derive(Debug, Clone, Default)]
pub struct HealingPipeline {
    verifier: GateVerifier,
    healer: SelfHealer,
}

fn lock(content: &Mutex<String>) -> MutexGuard<'_, String> {
    content.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl HealingPipeline {
    pub fn new(verifier: GateVerifier, healer: SelfHealer) -> Self {
        Self { verifier, healer }
    }

    pub fn verifier(&self) -> &GateVerifier {
        &self.verifier
    }

    pub fn healer(&self) -> &SelfHealer {
        &self.healer
    }

    pub async fn run(
        &self,
        content: impl Into<String>,
        context: &VerificationContext,
        fixer: &dyn ContentFixer,
    ) -> PipelineOutcome {
        let content = content.into();
        let report = self.verifier.run(&content, context).await;
        let Some(diagnosis) = self.healer.diagnose(&report) else {
            info!("content verified green on first pass");
            return PipelineOutcome {
                content,
                report,
                heal: None,
            };
        };

        let current = Mutex::new(content);
        let heal = self
            .healer
            .heal(
                diagnosis,
                |d: Diagnosis| {
                    let current = &current;
                    async move {
                        let snapshot = lock(current).clone();
                        let outcome = fixer.fix(&snapshot, &d).await;
                        if outcome.result.success {
                            *lock(current) = outcome.content;
                        }
                        outcome.result
                    }
                },
                || {
                    let current = &current;
                    async move {
                        let snapshot = lock(current).clone();
                        self.verifier.run(&snapshot, context).await
                    }
                },
            )
            .await;

        let content = current
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        PipelineOutcome {
            content,
            report: heal.final_report.clone().unwrap_or(report),
            heal: Some(heal),
        }
    }
}
