//! Connascence of algorithm: functions that implement the same procedure
//! and must change together.
//!
//! Each function body is reduced to its sequence of syntax-node kinds. Two
//! bodies are compared by the Dice coefficient of their kind bigrams, which
//! ignores naming and tolerates small local edits.

use std::collections::HashMap;

use crate::analysis::{CollectedFacts, FunctionFact};
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

struct Profile {
    function: usize,
    bigrams: HashMap<(u16, u16), usize>,
    total: usize,
}

#[derive(Default)]
pub struct AlgorithmDetector {
    profiles: Vec<Profile>,
}

impl AlgorithmDetector {
    fn profile(index: usize, function: &FunctionFact) -> Profile {
        let mut bigrams = HashMap::new();
        for pair in function.body_shape.windows(2) {
            *bigrams.entry((pair[0], pair[1])).or_insert(0) += 1;
        }
        Profile {
            function: index,
            total: function.body_shape.len().saturating_sub(1),
            bigrams,
        }
    }
}

/// Multiset Dice coefficient of two bigram profiles.
fn similarity(a: &Profile, b: &Profile) -> f64 {
    if a.total + b.total == 0 {
        return 0.0;
    }
    let (small, large) = if a.bigrams.len() <= b.bigrams.len() {
        (a, b)
    } else {
        (b, a)
    };
    let shared: usize = small
        .bigrams
        .iter()
        .map(|(k, n)| (*n).min(large.bigrams.get(k).copied().unwrap_or(0)))
        .sum();
    (2 * shared) as f64 / (a.total + b.total) as f64
}

/// Upper bound on similarity given only the profile sizes.
fn size_bound(a: &Profile, b: &Profile) -> f64 {
    let (lo, hi) = (a.total.min(b.total), a.total.max(b.total));
    if lo + hi == 0 {
        return 0.0;
    }
    (2 * lo) as f64 / (lo + hi) as f64
}

impl Detector for AlgorithmDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Algorithm
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.algorithm;
        let mut violations = Vec::new();

        for (index, function) in facts.functions.iter().enumerate() {
            if function.body_shape.len() < cfg.min_body_tokens {
                continue;
            }
            let qualified = function.qualified_name();
            if cfg
                .exclusions
                .iter()
                .any(|e| *e == function.name || *e == qualified)
            {
                continue;
            }

            let current = Self::profile(index, function);

            // Best earlier match; the first one wins ties.
            let mut best: Option<(usize, f64)> = None;
            for earlier in &self.profiles {
                if size_bound(&current, earlier) < cfg.similarity_threshold {
                    continue;
                }
                let score = similarity(&current, earlier);
                if score >= cfg.similarity_threshold && best.map_or(true, |(_, s)| score > s) {
                    best = Some((earlier.function, score));
                }
            }

            if let Some((other, score)) = best {
                let original = &facts.functions[other];
                let severity = if original.body_shape == function.body_shape {
                    Severity::High
                } else {
                    Severity::Medium
                };
                violations.push(
                    Violation::new(
                        RuleId::Algorithm,
                        severity,
                        &facts.path,
                        function.location.line,
                        function.location.column,
                        format!(
                            "'{}' repeats the algorithm of '{}' (line {}, {:.0}% similar)",
                            qualified,
                            original.qualified_name(),
                            original.location.line,
                            score * 100.0
                        ),
                    )
                    .with_suggestion("extract the shared logic into one function"),
                );
            }

            self.profiles.push(current);
        }

        Ok(violations)
    }

    fn reset(&mut self) {
        self.profiles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Location;

    fn function(name: &str, line: usize, shape: Vec<u16>) -> FunctionFact {
        FunctionFact {
            name: name.to_string(),
            class_name: None,
            location: Location { line, column: 1 },
            end_line: line + 5,
            parameter_count: 1,
            positional_count: 1,
            decorators: Vec::new(),
            body_shape: shape,
        }
    }

    fn shape(len: usize, seed: u16) -> Vec<u16> {
        (0..len as u16).map(|i| (i * 7 + seed) % 31).collect()
    }

    fn run(functions: Vec<FunctionFact>) -> Vec<Violation> {
        let mut facts = CollectedFacts::empty("a.py");
        facts.functions = functions;
        let mut detector = AlgorithmDetector::default();
        detector.detect(&facts, &DetectorConfig::default()).unwrap()
    }

    #[test]
    fn test_identical_bodies_are_high() {
        let violations = run(vec![
            function("first", 1, shape(60, 0)),
            function("second", 10, shape(60, 0)),
        ]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 10);
        assert_eq!(violations[0].severity, Severity::High);
        assert!(violations[0].message.contains("'first'"));
    }

    #[test]
    fn test_near_identical_bodies_are_medium() {
        let mut edited = shape(100, 0);
        edited[50] = 99;
        let violations = run(vec![
            function("first", 1, shape(100, 0)),
            function("second", 10, edited),
        ]);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].severity, Severity::Medium);
    }

    #[test]
    fn test_short_bodies_ignored() {
        let violations = run(vec![
            function("first", 1, shape(10, 0)),
            function("second", 10, shape(10, 0)),
        ]);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_different_bodies_are_clean() {
        let violations = run(vec![
            function("first", 1, shape(60, 0)),
            function("second", 10, (0..60).map(|i| 100 + (i % 3)).collect()),
        ]);
        assert!(violations.is_empty());
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let a = AlgorithmDetector::profile(0, &function("a", 1, shape(50, 0)));
        let b = AlgorithmDetector::profile(1, &function("b", 1, shape(50, 3)));
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }
}
