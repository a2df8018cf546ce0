//! Connascence of meaning: the same unnamed literal repeated across a file.

use std::collections::HashMap;

use crate::analysis::{CollectedFacts, LiteralValue, Location};
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

#[derive(Debug, Clone, Copy)]
struct Tally {
    count: usize,
    first: Location,
}

#[derive(Default)]
pub struct MagicLiteralDetector {
    tallies: HashMap<LiteralValue, Tally>,
}

impl Detector for MagicLiteralDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MagicLiteral
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.magic_literal;
        let threshold = cfg.repetition_threshold;

        for literal in &facts.literals {
            // Naming a value is the fix, not the smell.
            if literal.context.names_constant {
                continue;
            }
            if cfg.allowed_literals.iter().any(|a| a == literal.value.key()) {
                continue;
            }
            self.tallies
                .entry(literal.value.clone())
                .and_modify(|t| {
                    t.count += 1;
                    if literal.location < t.first {
                        t.first = literal.location;
                    }
                })
                .or_insert(Tally {
                    count: 1,
                    first: literal.location,
                });
        }

        let mut violations: Vec<Violation> = self
            .tallies
            .iter()
            .filter(|(_, t)| t.count > threshold)
            .map(|(value, t)| {
                let severity = if t.count >= threshold.saturating_mul(2) {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Violation::new(
                    RuleId::MagicLiteral,
                    severity,
                    &facts.path,
                    t.first.line,
                    t.first.column,
                    format!(
                        "literal {} appears {} times (threshold {})",
                        value, t.count, threshold
                    ),
                )
                .with_suggestion("extract the value into a named constant")
            })
            .collect();

        violations.sort_by(|a, b| (a.line, a.column).cmp(&(b.line, b.column)));
        Ok(violations)
    }

    fn reset(&mut self) {
        self.tallies.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LiteralContext, LiteralFact};

    fn literal(value: LiteralValue, line: usize, names_constant: bool) -> LiteralFact {
        LiteralFact {
            location: Location { line, column: 5 },
            value,
            context: LiteralContext {
                function: None,
                class_name: None,
                names_constant,
            },
        }
    }

    fn int(v: &str) -> LiteralValue {
        LiteralValue::Int(v.to_string())
    }

    fn run(literals: Vec<LiteralFact>) -> Vec<Violation> {
        let mut facts = CollectedFacts::empty("a.py");
        facts.literals = literals;
        let mut detector = MagicLiteralDetector::default();
        detector.detect(&facts, &DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_four_occurrences_flagged_once_at_first() {
        let violations = run((1..=4).map(|l| literal(int("42"), l, false)).collect());
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 1);
        assert_eq!(violations[0].severity, Severity::Medium);
        assert!(violations[0].message.contains("42"));
    }

    #[test]
    fn test_below_threshold_is_clean() {
        let violations = run((1..=2).map(|l| literal(int("42"), l, false)).collect());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_heavy_repetition_is_high() {
        let violations = run((1..=6).map(|l| literal(int("42"), l, false)).collect());
        assert_eq!(violations[0].severity, Severity::High);
    }

    #[test]
    fn test_allowed_and_constant_definitions_ignored() {
        let mut literals: Vec<LiteralFact> = (1..=5).map(|l| literal(int("0"), l, false)).collect();
        literals.extend((10..=13).map(|l| literal(int("7"), l, l != 13)));
        assert!(run(literals).is_empty());
    }

    #[test]
    fn test_strings_compared_by_content() {
        let violations = run((1..=4)
            .map(|l| literal(LiteralValue::Str("admin".to_string()), l, false))
            .collect());
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("\"admin\""));
    }

    #[test]
    fn test_reset_clears_tallies() {
        let mut facts = CollectedFacts::empty("a.py");
        facts.literals = (1..=2).map(|l| literal(int("42"), l, false)).collect();
        let mut detector = MagicLiteralDetector::default();
        let config = DetectorConfig::default();

        detector.detect(&facts, &config).unwrap();
        detector.reset();
        // Without the reset, 2 + 2 occurrences would cross the threshold.
        assert!(detector.detect(&facts, &config).unwrap().is_empty());
    }
}
