//! Detection of god objects.
//!
//! A class that gathers too many methods, attributes or lines couples every
//! caller to everything it does. Each oversized class yields one violation
//! that lists every ceiling it breaks.

use crate::analysis::CollectedFacts;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

pub struct GodObjectDetector;

impl Detector for GodObjectDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::GodObject
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.god_object;
        let mut violations = Vec::new();

        for class in &facts.classes {
            if cfg.exclusions.contains(&class.name) {
                continue;
            }

            let measures = [
                ("methods", class.method_count(), cfg.max_methods),
                ("attributes", class.attribute_count(), cfg.max_attributes),
                ("lines", class.line_count(), cfg.max_lines),
            ];
            let exceeded: Vec<_> = measures
                .iter()
                .filter(|(_, count, max)| count > max)
                .collect();
            if exceeded.is_empty() {
                continue;
            }

            let severity = if exceeded
                .iter()
                .any(|(_, count, max)| *count >= max.saturating_mul(2))
            {
                Severity::Critical
            } else {
                Severity::High
            };

            let details = exceeded
                .iter()
                .map(|(what, count, max)| format!("{} {} (max {})", count, what, max))
                .collect::<Vec<_>>()
                .join(", ");

            violations.push(
                Violation::new(
                    RuleId::GodObject,
                    severity,
                    &facts.path,
                    class.location.line,
                    class.location.column,
                    format!("class '{}' is too large: {}", class.name, details),
                )
                .with_suggestion("split the class along its separate responsibilities"),
            );
        }

        Ok(violations)
    }
}
