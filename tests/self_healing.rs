use healing_orchestrator::healing::{
    CategoryRules, ContentFixer, Diagnosis, FailureCategory, FixOutcome, HealResult,
    HeuristicFixer, SelfHealer,
};
use healing_orchestrator::verification::{
    Gate, GateResult, GateVerifier, VerificationConfig, VerificationContext, VerificationReport,
};
use healing_orchestrator::{HealingPipeline, OrchestratorConfig};
use std::sync::atomic::{AtomicU32, Ordering};

fn report_failing(failed: &[(Gate, &str)]) -> VerificationReport {
    VerificationReport::new(
        Gate::ALL
            .iter()
            .map(|gate| match failed.iter().find(|(g, _)| g == gate) {
                Some((_, message)) => GateResult::failed(*gate, *message),
                None => GateResult::passed(*gate, "ok"),
            })
            .collect(),
    )
}

#[tokio::test]
async fn test_lint_failure_healed_in_one_attempt() {
    let healer = SelfHealer::default();
    let report = report_failing(&[(Gate::Lint, "unused import")]);

    let lint = report.get(Gate::Lint).unwrap();
    assert_eq!(healer.categorize(lint), FailureCategory::CodeBug);

    let diagnosis = healer.diagnose(&report).expect("lint failed");
    assert_eq!(diagnosis.analyses.len(), 1);
    assert!(diagnosis
        .suggested_actions
        .iter()
        .any(|a| a == "Run auto-formatter"));

    let result = healer
        .heal(
            diagnosis,
            |_| async { HealResult::success("ran formatter", vec!["src/app.ts".into()]) },
            || async { report_failing(&[]) },
        )
        .await;

    assert!(result.success);
    assert_eq!(result.attempts, 1);
    assert!(!result.escalation_needed);
}

#[test]
fn test_missing_api_key_is_config_problem() {
    let healer = SelfHealer::default();
    let report = report_failing(&[(Gate::Security, "missing API key")]);

    assert_eq!(
        healer.categorize(report.get(Gate::Security).unwrap()),
        FailureCategory::Config
    );
    let diagnosis = healer.diagnose(&report).unwrap();
    assert!(diagnosis
        .suggested_actions
        .iter()
        .any(|a| a == "Check configuration files and environment variables"));
}

#[test]
fn test_diagnosis_present_iff_not_green() {
    let healer = SelfHealer::default();
    assert!(healer.diagnose(&report_failing(&[])).is_none());

    let many = report_failing(&[
        (Gate::Build, "syntax error"),
        (Gate::Tests, "2 failing"),
        (Gate::Diff, "too short"),
    ]);
    let diagnosis = healer.diagnose(&many).unwrap();
    assert_eq!(diagnosis.analyses.len(), many.failed_count());
    let gates: Vec<Gate> = diagnosis.analyses.iter().map(|a| a.gate).collect();
    assert_eq!(gates, vec![Gate::Build, Gate::Tests, Gate::Diff]);
}

#[tokio::test]
async fn test_heal_never_exceeds_budget() {
    for budget in 1..=4u32 {
        let healer = SelfHealer::new(budget);
        let fixes = AtomicU32::new(0);
        let verifications = AtomicU32::new(0);
        let diagnosis = healer
            .diagnose(&report_failing(&[(Gate::Tests, "flaky")]))
            .unwrap();

        let result = healer
            .heal(
                diagnosis,
                |_| {
                    fixes.fetch_add(1, Ordering::SeqCst);
                    async { HealResult::success("patched", vec![]) }
                },
                || {
                    verifications.fetch_add(1, Ordering::SeqCst);
                    async { report_failing(&[(Gate::Tests, "still flaky")]) }
                },
            )
            .await;

        assert!(!result.success);
        assert_eq!(result.escalation_needed, !result.success);
        assert_eq!(result.attempts, budget);
        assert_eq!(fixes.load(Ordering::SeqCst), budget);
        assert_eq!(verifications.load(Ordering::SeqCst), budget);
        assert_eq!(result.history.len() as u32, budget);
    }
}

#[test]
fn test_custom_rules_reclassify() {
    let healer = SelfHealer::default().with_rules(
        CategoryRules::empty()
            .with_keyword("quota", FailureCategory::External)
            .with_gate_default(Gate::Diff, FailureCategory::WrongApproach),
    );
    let report = report_failing(&[
        (Gate::Tests, "Quota exceeded on fixture service"),
        (Gate::Diff, "output does not match"),
        (Gate::Security, "missing API key"),
    ]);
    let categories: Vec<FailureCategory> = healer
        .diagnose(&report)
        .unwrap()
        .analyses
        .iter()
        .map(|a| a.category)
        .collect();
    assert_eq!(
        categories,
        vec![
            FailureCategory::External,
            FailureCategory::CodeBug,
            FailureCategory::WrongApproach,
        ]
    );
}

/// Appends a required phrase on every call.
struct AppendFixer;

#[async_trait::async_trait]
impl ContentFixer for AppendFixer {
    async fn fix(&self, content: &str, _diagnosis: &Diagnosis) -> FixOutcome {
        FixOutcome {
            content: format!("{content}\nLicense: MIT"),
            result: HealResult::success("appended license line", vec!["README.md".into()]),
        }
    }
}

#[tokio::test]
async fn test_pipeline_with_custom_fixer_and_ground_truth() {
    let pipeline = HealingPipeline::new(GateVerifier::builtin(), SelfHealer::default());
    let context = VerificationContext::new().with_ground_truth("License: MIT");

    let outcome = pipeline
        .run("# Project\n\nA short but sufficient readme.", &context, &AppendFixer)
        .await;

    assert!(outcome.is_green());
    assert!(outcome.content.ends_with("License: MIT"));
    assert_eq!(outcome.heal.unwrap().attempts, 1);
}

#[tokio::test]
async fn test_pipeline_from_config_heals_markup() {
    let config = OrchestratorConfig::from_yaml_str("healing:\n  max_attempts: 1\n").unwrap();
    let content = "Gallery markup:\n\n```html\n<div class=\"gallery\">\n  <img src=\"cat.png\">\n</div>\n```\n";

    let outcome = config
        .build_pipeline()
        .run(content, &VerificationContext::new(), &HeuristicFixer)
        .await;

    assert!(outcome.is_green());
    assert!(outcome.content.contains("<img alt=\"\" src=\"cat.png\">"));
}

#[tokio::test]
async fn test_disabled_gate_does_not_trigger_healing() {
    let verifier = GateVerifier::new(
        VerificationConfig::new().with_gate_enabled(Gate::Diff, false),
    );
    let outcome = HealingPipeline::new(verifier, SelfHealer::default())
        .run("tiny", &VerificationContext::new(), &HeuristicFixer)
        .await;
    assert!(outcome.is_green());
    assert!(outcome.heal.is_none());
}
