//! Inline suppression of violations via comments.
//!
//! Directives are collected from comment nodes during fact collection:
//! - `# connascence:ignore <target> - <reason>`: same line when trailing
//!   code, next line when on a line of its own
//! - `# connascence:ignore-next-line <target> - <reason>`
//! - `# connascence:ignore-file <target> - <reason>` (first 10 lines only)
//!
//! `<target>` is a rule id (`CON_TIMING`), a detector kind (`timing`) or `*`.

use crate::analysis::{Suppression, SuppressionScope};

use super::Violation;

/// Check if a violation matches a suppression from the same file.
pub fn matches_suppression(violation: &Violation, suppression: &Suppression) -> bool {
    let target = suppression.target.as_str();
    let rule_matches = target == "*"
        || target.eq_ignore_ascii_case(violation.rule.as_str())
        || target.eq_ignore_ascii_case(violation.kind.as_str());
    if !rule_matches {
        return false;
    }

    match suppression.scope {
        SuppressionScope::File => true,
        SuppressionScope::Line => violation.line == suppression.line,
        SuppressionScope::NextLine => violation.line == suppression.line + 1,
    }
}

/// Drop suppressed violations. Returns the survivors and how many were removed.
pub fn filter_suppressed(
    violations: Vec<Violation>,
    suppressions: &[Suppression],
) -> (Vec<Violation>, usize) {
    if suppressions.is_empty() {
        return (violations, 0);
    }

    let before = violations.len();
    let active: Vec<Violation> = violations
        .into_iter()
        .filter(|v| !suppressions.iter().any(|s| matches_suppression(v, s)))
        .collect();
    let suppressed = before - active.len();
    (active, suppressed)
}
