//! Built-in heuristic gate checks.
//!
//! These work on the fenced code blocks (```` ```lang ````) embedded in
//! generated content. They are cheap static heuristics, not a substitute for
//! running the real toolchain; callers can replace any of them through
//! [`GateVerifier::with_check`](super::GateVerifier::with_check).

use super::config::VerificationContext;
use super::result::{Gate, GateResult};
use super::GateCheck;
use crate::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

static CODE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```([A-Za-z0-9_+\-]*)[ \t]*\r?\n(.*?)```").expect("valid code block regex")
});
static TS_ANY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":\s*any\b|\bas\s+any\b|<any>").expect("valid any regex"));
static CONSOLE_LOG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bconsole\.log\s*\(").expect("valid console regex"));
static DEBUGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*debugger\s*;?\s*$").expect("valid debugger regex"));
static FOCUSED_TEST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:it|describe|test)\.(?:only|skip)\s*\(|\bx(?:it|describe)\s*\(|@pytest\.mark\.skip")
        .expect("valid focused test regex")
});
static SECRET_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\bsk-[A-Za-z0-9_\-]{20,}", "OpenAI-style API key"),
        (r"\bAKIA[0-9A-Z]{16}\b", "AWS access key id"),
        (r"\bgh[pousr]_[A-Za-z0-9]{30,}", "GitHub token"),
        (
            r#"(?i)\b(?:api[_\-]?key|secret|password|token)\s*[:=]\s*["'][^"'\s]{8,}["']"#,
            "hardcoded credential",
        ),
        (r"-----BEGIN (?:RSA |EC |OPENSSH )?PRIVATE KEY-----", "private key"),
    ]
    .into_iter()
    .map(|(p, label)| (Regex::new(p).expect("valid secret regex"), label))
    .collect()
});
static UNSAFE_DOM: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"\.innerHTML\s*=[^=]", "innerHTML assignment"),
        (r"\bdocument\.write\s*\(", "document.write call"),
        (r"\beval\s*\(", "eval call"),
    ]
    .into_iter()
    .map(|(p, label)| (Regex::new(p).expect("valid dom regex"), label))
    .collect()
});
pub(crate) static IMG_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<img\b[^>]*>").expect("valid img regex"));
pub(crate) static ALT_ATTR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\balt\s*=").expect("valid alt regex"));
static WILDCARD_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*import\s+\*\s+as\s+\w+").expect("valid import regex")
});

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock<'a> {
    /// Lowercased info string; empty when the fence has none.
    pub lang: String,
    pub body: &'a str,
}

impl CodeBlock<'_> {
    pub fn is_script(&self) -> bool {
        matches!(
            self.lang.as_str(),
            "js" | "javascript" | "jsx" | "mjs" | "ts" | "typescript" | "tsx"
        )
    }

    pub fn is_typescript(&self) -> bool {
        matches!(self.lang.as_str(), "ts" | "typescript" | "tsx")
    }

    pub fn is_markup(&self) -> bool {
        matches!(
            self.lang.as_str(),
            "html" | "htm" | "jsx" | "tsx" | "vue" | "svelte" | "liquid"
        )
    }
}

/// Extract every fenced code block from `content`.
pub fn code_blocks(content: &str) -> Vec<CodeBlock<'_>> {
    CODE_BLOCK
        .captures_iter(content)
        .filter_map(|caps| {
            let body = caps.get(2)?.as_str();
            let lang = caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default();
            Some(CodeBlock { lang, body })
        })
        .collect()
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}

/// Check `()[]{}` nesting, ignoring quoted strings on a single line.
pub fn check_brackets(code: &str) -> std::result::Result<(), String> {
    let mut stack: Vec<(char, usize)> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut line = 1;

    for ch in code.chars() {
        if ch == '\n' {
            line += 1;
            if quote != Some('`') {
                quote = None;
            }
            escaped = false;
            continue;
        }
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => quote = Some(ch),
            '(' | '[' | '{' => stack.push((ch, line)),
            ')' | ']' | '}' => {
                let expected = match ch {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some((open, _)) if open == expected => {}
                    Some((open, open_line)) => {
                        return Err(format!(
                            "line {}: '{}' closes '{}' opened on line {}",
                            line, ch, open, open_line
                        ))
                    }
                    None => return Err(format!("line {}: unmatched '{}'", line, ch)),
                }
            }
            _ => {}
        }
    }

    match stack.pop() {
        Some((open, open_line)) => Err(format!("line {}: unclosed '{}'", open_line, open)),
        None => Ok(()),
    }
}

fn scan_blocks<'b, 'a: 'b>(
    blocks: impl Iterator<Item = &'b CodeBlock<'a>>,
    patterns: &[(&Regex, &str)],
) -> Vec<String> {
    let mut findings = Vec::new();
    for (index, block) in blocks.enumerate() {
        for (re, label) in patterns {
            for m in re.find_iter(block.body) {
                findings.push(format!(
                    "block {}, line {}: {}",
                    index + 1,
                    line_of(block.body, m.start()),
                    label
                ));
            }
        }
    }
    findings
}

fn verdict(gate: Gate, findings: Vec<String>, ok: &str, failed: impl FnOnce(usize) -> String) -> GateResult {
    if findings.is_empty() {
        GateResult::passed(gate, ok)
    } else {
        let msg = failed(findings.len());
        GateResult::failed(gate, msg).with_details(findings)
    }
}

/// Passes unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassCheck;

#[async_trait]
impl GateCheck for PassCheck {
    async fn check(&self, _content: &str, _context: &VerificationContext) -> Result<GateResult> {
        Ok(GateResult::passed(Gate::Build, "no-op check"))
    }
}

/// JSON blocks must parse; every block must have balanced brackets.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildCheck;

#[async_trait]
impl GateCheck for BuildCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let mut errors = Vec::new();
        for (index, block) in code_blocks(content).iter().enumerate() {
            if block.lang == "json" {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(block.body) {
                    errors.push(format!("block {} (json): {}", index + 1, e));
                }
            } else if let Err(e) = check_brackets(block.body) {
                let lang = if block.lang.is_empty() { "text" } else { block.lang.as_str() };
                errors.push(format!("block {} ({}): {}", index + 1, lang, e));
            }
        }
        Ok(verdict(Gate::Build, errors, "All code blocks are syntactically valid", |n| {
            format!("Build failed: syntax errors in {} code block(s)", n)
        }))
    }
}

/// TypeScript blocks must not fall back to `any`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TypesCheck;

#[async_trait]
impl GateCheck for TypesCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let blocks = code_blocks(content);
        let errors = scan_blocks(
            blocks.iter().filter(|b| b.is_typescript()),
            &[(&*TS_ANY, "explicit 'any' type")],
        );
        Ok(verdict(Gate::Types, errors, "No type escapes found", |n| {
            format!("Type check failed: {} use(s) of 'any'", n)
        }))
    }
}

/// Script blocks must not keep debug statements.
#[derive(Debug, Clone, Copy, Default)]
pub struct LintCheck;

#[async_trait]
impl GateCheck for LintCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let blocks = code_blocks(content);
        let errors = scan_blocks(
            blocks.iter().filter(|b| b.is_script()),
            &[
                (&*CONSOLE_LOG, "console.log statement"),
                (&*DEBUGGER, "debugger statement"),
            ],
        );
        Ok(verdict(Gate::Lint, errors, "No lint violations", |n| {
            format!("Lint failed: {} violation(s)", n)
        }))
    }
}

/// No focused or skipped tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TestsCheck;

#[async_trait]
impl GateCheck for TestsCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let blocks = code_blocks(content);
        let errors = scan_blocks(blocks.iter(), &[(&*FOCUSED_TEST, "focused or skipped test")]);
        Ok(verdict(Gate::Tests, errors, "No focused or skipped tests", |n| {
            format!("Tests gate failed: {} focused or skipped test(s)", n)
        }))
    }
}

/// Secrets anywhere in the content; unsafe DOM sinks in code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecurityCheck;

#[async_trait]
impl GateCheck for SecurityCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let mut findings = Vec::new();
        for (re, label) in SECRET_PATTERNS.iter() {
            for m in re.find_iter(content) {
                findings.push(format!("SECRET: {} (line {})", label, line_of(content, m.start())));
            }
        }
        let blocks = code_blocks(content);
        let dom: Vec<(&Regex, &str)> = UNSAFE_DOM.iter().map(|(re, l)| (re, *l)).collect();
        findings.extend(
            scan_blocks(blocks.iter(), &dom)
                .into_iter()
                .map(|f| format!("XSS: {}", f)),
        );
        Ok(verdict(Gate::Security, findings, "No security findings", |n| {
            format!("Security issues found: {}", n)
        }))
    }
}

/// Images in markup need `alt` text.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessibilityCheck;

#[async_trait]
impl GateCheck for AccessibilityCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let mut violations = Vec::new();
        for (index, block) in code_blocks(content).iter().enumerate() {
            if !block.is_markup() {
                continue;
            }
            for tag in IMG_TAG.find_iter(block.body) {
                if !ALT_ATTR.is_match(tag.as_str()) {
                    violations.push(format!(
                        "block {}, line {}: img missing alt attribute",
                        index + 1,
                        line_of(block.body, tag.start())
                    ));
                }
            }
        }
        Ok(verdict(Gate::Accessibility, violations, "No accessibility violations", |n| {
            format!("Accessibility violations: {}", n)
        }))
    }
}

/// Script blocks must not pull whole modules in.
#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceCheck;

#[async_trait]
impl GateCheck for PerformanceCheck {
    async fn check(&self, content: &str, _context: &VerificationContext) -> Result<GateResult> {
        let blocks = code_blocks(content);
        let issues = scan_blocks(
            blocks.iter().filter(|b| b.is_script()),
            &[(&*WILDCARD_IMPORT, "wildcard import defeats tree shaking")],
        );
        Ok(verdict(Gate::Performance, issues, "No performance issues", |n| {
            format!("Performance issues: {}", n)
        }))
    }
}

/// Content must be substantial and contain every ground-truth value.
#[derive(Debug, Clone, Copy)]
pub struct DiffCheck {
    pub min_length: usize,
}

impl Default for DiffCheck {
    fn default() -> Self {
        Self { min_length: 20 }
    }
}

#[async_trait]
impl GateCheck for DiffCheck {
    async fn check(&self, content: &str, context: &VerificationContext) -> Result<GateResult> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Ok(GateResult::failed(Gate::Diff, "Empty content"));
        }
        let len = trimmed.chars().count();
        if len < self.min_length {
            return Ok(GateResult::failed(
                Gate::Diff,
                format!("Content too short ({} < {} characters)", len, self.min_length),
            ));
        }
        let missing: Vec<String> = context
            .ground_truth
            .iter()
            .filter(|value| !content.contains(value.as_str()))
            .map(|value| format!("missing ground truth value: {}", value))
            .collect();
        Ok(verdict(Gate::Diff, missing, "Content matches expectations", |n| {
            format!("Ground truth mismatch: {} value(s) missing", n)
        }))
    }
}
