//! Connascence of position: functions whose callers must remember the order
//! of many positional arguments.

use crate::analysis::CollectedFacts;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

pub struct PositionDetector;

impl Detector for PositionDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Position
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.position;
        let max = cfg.max_parameter_count;
        let mut violations = Vec::new();

        for function in &facts.functions {
            if function.positional_count <= max {
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

            let excess = function.positional_count - max;
            violations.push(
                Violation::new(
                    RuleId::Position,
                    severity_for_excess(excess),
                    &facts.path,
                    function.location.line,
                    function.location.column,
                    format!(
                        "'{}' takes {} positional parameters (max {})",
                        qualified, function.positional_count, max
                    ),
                )
                .with_suggestion(
                    "group related parameters into an object or make trailing ones keyword-only",
                ),
            );
        }

        Ok(violations)
    }
}

fn severity_for_excess(excess: usize) -> Severity {
    match excess {
        0 | 1 => Severity::Low,
        2..=3 => Severity::Medium,
        4..=5 => Severity::High,
        _ => Severity::Critical,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{FunctionFact, Location};

    fn function(name: &str, positional: usize) -> FunctionFact {
        FunctionFact {
            name: name.to_string(),
            class_name: None,
            location: Location { line: 1, column: 1 },
            end_line: 2,
            parameter_count: positional,
            positional_count: positional,
            decorators: Vec::new(),
            body_shape: Vec::new(),
        }
    }

    fn run(functions: Vec<FunctionFact>, config: &DetectorConfig) -> Vec<Violation> {
        let mut facts = CollectedFacts::empty("a.py");
        facts.functions = functions;
        PositionDetector.detect(&facts, config).unwrap()
    }

    #[test]
    fn test_at_limit_is_clean() {
        let violations = run(vec![function("f", 5)], &DetectorConfig::default());
        assert!(violations.is_empty());
    }

    #[test]
    fn test_severity_scales_with_excess() {
        let config = DetectorConfig::default();
        let six = run(vec![function("f", 6)], &config);
        let seven = run(vec![function("f", 7)], &config);

        assert_eq!(six.len(), 1);
        assert_eq!(seven.len(), 1);
        assert_eq!(six[0].severity, Severity::Low);
        assert_eq!(seven[0].severity, Severity::Medium);
        assert!(seven[0].severity > six[0].severity);
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(severity_for_excess(3), Severity::Medium);
        assert_eq!(severity_for_excess(5), Severity::High);
        assert_eq!(severity_for_excess(6), Severity::Critical);
    }

    #[test]
    fn test_exclusions() {
        let mut config = DetectorConfig::default();
        config.position.exclusions = vec!["legacy_entry".to_string()];
        let violations = run(vec![function("legacy_entry", 9)], &config);
        assert!(violations.is_empty());
    }
}
