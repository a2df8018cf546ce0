//! Merging per-file violation lists into one deterministic report.
//!
//! Two violations are the same finding when they share file, line and rule.
//! The survivor is chosen by a total order (severity, then column, then
//! message), so the outcome never depends on which worker finished first.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::detect::{RuleId, Violation};

/// Collects violations and produces the final sorted, deduplicated list.
#[derive(Debug, Default)]
pub struct ViolationAggregator {
    findings: BTreeMap<(String, usize, RuleId), Violation>,
}

impl ViolationAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge several per-file lists in one call.
    pub fn merge<I>(lists: I) -> Vec<Violation>
    where
        I: IntoIterator<Item = Vec<Violation>>,
    {
        let mut aggregator = Self::new();
        for list in lists {
            aggregator.extend(list);
        }
        aggregator.finish()
    }

    pub fn add(&mut self, violation: Violation) {
        let key = violation.dedup_key();
        match self.findings.get_mut(&key) {
            Some(existing) => {
                if preferred(&violation, existing) == Ordering::Less {
                    *existing = violation;
                }
            }
            None => {
                self.findings.insert(key, violation);
            }
        }
    }

    pub fn extend<I: IntoIterator<Item = Violation>>(&mut self, violations: I) {
        for violation in violations {
            self.add(violation);
        }
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Most severe first, then by file, line, column, rule and message.
    pub fn finish(self) -> Vec<Violation> {
        let mut violations: Vec<Violation> = self.findings.into_values().collect();
        violations.sort_by(report_order);
        violations
    }
}

/// `Less` when `a` should win over `b` for the same finding.
fn preferred(a: &Violation, b: &Violation) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.column.cmp(&b.column))
        .then_with(|| a.message.cmp(&b.message))
        .then_with(|| a.suggestion.cmp(&b.suggestion))
}

fn report_order(a: &Violation, b: &Violation) -> Ordering {
    b.severity
        .cmp(&a.severity)
        .then_with(|| a.file.cmp(&b.file))
        .then_with(|| a.line.cmp(&b.line))
        .then_with(|| a.column.cmp(&b.column))
        .then_with(|| a.rule.cmp(&b.rule))
        .then_with(|| a.message.cmp(&b.message))
}
