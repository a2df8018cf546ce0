//! Scoring and grading for connascence findings.
//!
//! The compliance score is 1.0 for a clean project and falls with every
//! critical and high violation:
//!
//! ```text
//! score = max(0, 1 - (critical * critical_weight + high * high_weight))
//! ```
//!
//! Medium, low and info findings are counted but do not move the score.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::ScoringConfig;
use crate::detect::{DetectorKind, Severity, Violation};

/// Grade thresholds (minimum score for each letter).
pub mod grades {
    pub const A_MIN: f64 = 0.9;
    pub const B_MIN: f64 = 0.8;
    pub const C_MIN: f64 = 0.7;
    pub const D_MIN: f64 = 0.6;
}

/// Summary metrics over an aggregated violation list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceScore {
    /// In [0, 1]; higher is better.
    pub value: f64,
    /// Letter grade: "A" (>= 0.9), "B", "C", "D", "F" (< 0.6)
    pub grade: String,
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_kind: BTreeMap<DetectorKind, usize>,
}

impl ComplianceScore {
    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }

    /// Whether the score reaches `min_score`.
    pub fn passes(&self, min_score: f64) -> bool {
        self.value >= min_score
    }
}

/// Determine the letter grade from a score.
fn calculate_grade(value: f64) -> String {
    match value {
        v if v >= grades::A_MIN => "A".to_string(),
        v if v >= grades::B_MIN => "B".to_string(),
        v if v >= grades::C_MIN => "C".to_string(),
        v if v >= grades::D_MIN => "D".to_string(),
        _ => "F".to_string(),
    }
}

/// Computes [`ComplianceScore`]s. Stateless.
pub struct ComplianceScorer;

impl ComplianceScorer {
    pub fn score(violations: &[Violation], config: &ScoringConfig) -> ComplianceScore {
        let mut by_severity = BTreeMap::new();
        let mut by_kind = BTreeMap::new();

        for v in violations {
            *by_severity.entry(v.severity).or_insert(0) += 1;
            *by_kind.entry(v.kind).or_insert(0) += 1;
        }

        let critical = by_severity.get(&Severity::Critical).copied().unwrap_or(0) as f64;
        let high = by_severity.get(&Severity::High).copied().unwrap_or(0) as f64;
        let penalty = critical * config.critical_weight + high * config.high_weight;
        let value = (1.0 - penalty).clamp(0.0, 1.0);

        ComplianceScore {
            value,
            grade: calculate_grade(value),
            total: violations.len(),
            by_severity,
            by_kind,
        }
    }
}
