// Branch counting over function bodies

use once_cell::sync::Lazy;
use regex::Regex;

use crate::index::ControlFlowSummary;

/// Cyclomatic scores are capped here.
pub const MAX_COMPLEXITY: u32 = 10;

static STRINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'|`(?:\\.|[^`\\])*`"#).unwrap());
static LINE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"//.*$|#[^\[!].*$|#$").unwrap());
static CONDITIONAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:if|elif)\b").unwrap());
static LOOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:for|while|loop)\b").unwrap());
static CASE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcase\b").unwrap());
static HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?:catch|except)\b").unwrap());
static TERNARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s\?\s").unwrap());
static LOGICAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"&&|\|\||\band\b|\bor\b").unwrap());
static RETURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\breturn\b").unwrap());

/// Raw construct counts for one body
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchCounts {
    pub conditionals: u32,
    pub loops: u32,
    pub switch_cases: u32,
    pub exception_handlers: u32,
    pub ternaries: u32,
    pub logical_operators: u32,
    pub early_returns: u32,
}

impl BranchCounts {
    /// Base 1 plus one per decision point, capped at `MAX_COMPLEXITY`.
    pub fn score(&self) -> u32 {
        let decisions = self.conditionals
            + self.loops
            + self.switch_cases
            + self.exception_handlers
            + self.ternaries
            + self.logical_operators;
        (1 + decisions).min(MAX_COMPLEXITY)
    }

    pub fn summary(&self, symbol: &str, start_line: u32, end_line: u32) -> ControlFlowSummary {
        ControlFlowSummary {
            symbol: symbol.to_string(),
            start_line,
            end_line,
            conditionals: self.conditionals,
            loops: self.loops,
            switch_cases: self.switch_cases,
            exception_handlers: self.exception_handlers,
            ternaries: self.ternaries,
            logical_operators: self.logical_operators,
            early_returns: self.early_returns,
            complexity: self.score(),
        }
    }
}

fn count(re: &Regex, text: &str) -> u32 {
    re.find_iter(text).count() as u32
}

/// Count decision points in `body`, ignoring string literals and line comments.
pub fn analyze(body: &str) -> BranchCounts {
    let mut counts = BranchCounts::default();
    let mut returns = Vec::new();

    for (idx, raw) in body.lines().enumerate() {
        let without_strings = STRINGS.replace_all(raw, "\"\"");
        let line = LINE_COMMENT.replace(&without_strings, "");
        if line.trim().is_empty() {
            continue;
        }
        counts.conditionals += count(&CONDITIONAL, &line);
        counts.loops += count(&LOOP, &line);
        counts.switch_cases += count(&CASE, &line);
        counts.exception_handlers += count(&HANDLER, &line);
        counts.ternaries += count(&TERNARY, &line);
        counts.logical_operators += count(&LOGICAL, &line);
        for _ in RETURN.find_iter(&line) {
            returns.push(idx);
        }
    }

    // A return on the last statement line is the normal exit, not an early one.
    let last_code_line = body
        .lines()
        .enumerate()
        .filter(|(_, l)| {
            let t = l.trim();
            !t.is_empty() && t != "}" && t != "};"
        })
        .map(|(i, _)| i)
        .last();
    counts.early_returns = returns
        .iter()
        .filter(|&&i| Some(i) != last_code_line)
        .count() as u32;

    counts
}

pub fn complexity(body: &str) -> u32 {
    analyze(body).score()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_straight_line_code_scores_one() {
        assert_eq!(complexity("let x = 1;\nlet y = x + 2;\n"), 1);
        assert_eq!(complexity(""), 1);
    }

    #[test]
    fn test_counts_branches() {
        let body = r#"
            if (a && b) {
                for (let i = 0; i < n; i++) {}
            } else if (c) {
                while (d) {}
            }
            try { run(); } catch (e) {}
            const v = ok ? 1 : 2;
        "#;
        let counts = analyze(body);
        assert_eq!(counts.conditionals, 2);
        assert_eq!(counts.loops, 2);
        assert_eq!(counts.exception_handlers, 1);
        assert_eq!(counts.ternaries, 1);
        assert_eq!(counts.logical_operators, 1);
        assert_eq!(counts.score(), 8);
    }

    #[test]
    fn test_ignores_strings_and_comments() {
        let body = "log(\"if while for\");\n// if if if\nx = 1";
        assert_eq!(complexity(body), 1);
    }

    #[test]
    fn test_python_keywords() {
        let body = "def f(x):\n    if x and y:\n        return 1\n    elif x or z:\n        pass\n    try:\n        g()\n    except ValueError:\n        pass\n    return 2\n";
        let counts = analyze(body);
        assert_eq!(counts.conditionals, 2);
        assert_eq!(counts.logical_operators, 2);
        assert_eq!(counts.exception_handlers, 1);
        assert_eq!(counts.early_returns, 1);
    }

    #[test]
    fn test_score_is_capped() {
        let body = "if a {}\n".repeat(40);
        assert_eq!(complexity(&body), MAX_COMPLEXITY);
    }
}
