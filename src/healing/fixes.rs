//! Content fixers used inside a heal cycle.

use super::{Diagnosis, HealResult};
use crate::verification::checks::{ALT_ATTR, IMG_TAG};
use crate::verification::Gate;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// `console.log(...)` with at most one level of nested parentheses.
const CONSOLE_LOG_CALL: &str = r"\bconsole\.log\s*\((?:[^()\n]|\([^()\n]*\))*\)";

static CONSOLE_LOG_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?m)^[ \t]*{CONSOLE_LOG_CALL}[ \t]*;?[ \t]*(?:\r?\n|$)"))
        .expect("valid console line regex")
});
static CONSOLE_LOG_STATEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{CONSOLE_LOG_CALL}[ \t]*;[ \t]*")).expect("valid console statement regex")
});
static DEBUGGER_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*debugger[ \t]*;?[ \t]*(?:\r?\n|$)").expect("valid debugger line regex")
});
static INNER_HTML_ASSIGN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.innerHTML(\s*=[^=])").expect("valid innerHTML regex"));

/// Rewritten content plus what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixOutcome {
    pub content: String,
    pub result: HealResult,
}

/// Produces a new version of `content` addressing `diagnosis`.
#[async_trait]
pub trait ContentFixer: Send + Sync {
    async fn fix(&self, content: &str, diagnosis: &Diagnosis) -> FixOutcome;
}

/// Mechanical text fixes for the lint, security and a11y gates.
///
/// - lint: drops `console.log(...)` statements (the whole line when nothing
///   else is on it) and `debugger` lines
/// - security: `.innerHTML =` becomes `.textContent =`
/// - a11y: `<img>` tags without `alt` get `alt=""`
///
/// Gates without a mechanical fix are left alone. The result reports failure
/// when nothing changed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicFixer;

impl HeuristicFixer {
    pub fn new() -> Self {
        Self
    }

    pub fn apply(&self, content: &str, diagnosis: &Diagnosis) -> FixOutcome {
        let mut current = content.to_string();
        let mut changes = Vec::new();

        if diagnosis.has_gate(Gate::Lint) {
            // Whole lines first, then statements sharing a line with other code.
            let mut removed = 0;
            for pattern in [&*CONSOLE_LOG_LINE, &*CONSOLE_LOG_STATEMENT, &*DEBUGGER_LINE] {
                let count = pattern.find_iter(&current).count();
                if count > 0 {
                    current = pattern.replace_all(&current, "").into_owned();
                    removed += count;
                }
            }
            if removed > 0 {
                changes.push(format!("lint: removed {} debug statement(s)", removed));
            }
        }

        if diagnosis.has_gate(Gate::Security) {
            let count = INNER_HTML_ASSIGN.find_iter(&current).count();
            if count > 0 {
                current = INNER_HTML_ASSIGN
                    .replace_all(&current, ".textContent$1")
                    .into_owned();
                changes.push(format!("security: replaced {} innerHTML assignment(s)", count));
            }
        }

        if diagnosis.has_gate(Gate::Accessibility) {
            let mut count = 0usize;
            let rewritten = IMG_TAG.replace_all(&current, |caps: &Captures| {
                let tag = &caps[0];
                if ALT_ATTR.is_match(tag) {
                    tag.to_string()
                } else {
                    count += 1;
                    format!("{} alt=\"\"{}", &tag[..4], &tag[4..])
                }
            });
            if count > 0 {
                current = rewritten.into_owned();
                changes.push(format!("a11y: added alt to {} img tag(s)", count));
            }
        }

        let result = if changes.is_empty() {
            HealResult::failure("no automatic fix applies")
        } else {
            HealResult::success(format!("applied {} fix(es)", changes.len()), changes)
        };
        FixOutcome {
            content: current,
            result,
        }
    }
}

#[async_trait]
impl ContentFixer for HeuristicFixer {
    async fn fix(&self, content: &str, diagnosis: &Diagnosis) -> FixOutcome {
        self.apply(content, diagnosis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::healing::{FailureCategory, HealAttempt};

    fn diagnosis(gates: &[Gate]) -> Diagnosis {
        Diagnosis {
            failed_gates: gates.iter().copied().collect(),
            analyses: gates
                .iter()
                .map(|g| HealAttempt {
                    gate: *g,
                    category: FailureCategory::CodeBug,
                    description: "failed".into(),
                })
                .collect(),
            suggested_actions: Vec::new(),
        }
    }

    #[test]
    fn test_removes_console_log_lines() {
        let out = HeuristicFixer.apply(
            "const x = 1;\nconsole.log(x);\nreturn x;",
            &diagnosis(&[Gate::Lint]),
        );
        assert_eq!(out.content, "const x = 1;\nreturn x;");
        assert!(out.result.success);
    }

    #[test]
    fn test_console_log_sharing_a_line_keeps_other_code() {
        let out = HeuristicFixer.apply(
            "console.log(x); doWork();\nlet y = f(); console.log(\"y\", g(y));\n",
            &diagnosis(&[Gate::Lint]),
        );
        assert_eq!(out.content, "doWork();\nlet y = f(); \n");
        assert_eq!(out.result.changes, vec!["lint: removed 2 debug statement(s)".to_string()]);
    }

    #[test]
    fn test_inner_html_rewritten() {
        let out = HeuristicFixer.apply("el.innerHTML = userInput;", &diagnosis(&[Gate::Security]));
        assert_eq!(out.content, "el.textContent = userInput;");
    }

    #[test]
    fn test_inner_html_comparison_untouched() {
        let out = HeuristicFixer.apply("if (el.innerHTML == '') {}", &diagnosis(&[Gate::Security]));
        assert!(!out.result.success);
        assert_eq!(out.content, "if (el.innerHTML == '') {}");
    }

    #[test]
    fn test_img_gets_empty_alt() {
        let out = HeuristicFixer.apply(
            "<img src=\"photo.jpg\"><img alt=\"logo\" src=\"l.png\">",
            &diagnosis(&[Gate::Accessibility]),
        );
        assert_eq!(out.content, "<img alt=\"\" src=\"photo.jpg\"><img alt=\"logo\" src=\"l.png\">");
        assert_eq!(out.result.changes.len(), 1);
    }

    #[test]
    fn test_only_diagnosed_gates_fixed() {
        let content = "console.log(1);\nel.innerHTML = x;\n";
        let out = HeuristicFixer.apply(content, &diagnosis(&[Gate::Security]));
        assert!(out.content.starts_with("console.log(1);"));
        assert!(out.content.contains("textContent"));
    }

    #[test]
    fn test_nothing_to_fix_reports_failure() {
        let out = HeuristicFixer.apply("fine", &diagnosis(&[Gate::Tests, Gate::Lint]));
        assert!(!out.result.success);
        assert_eq!(out.content, "fine");
    }
}
