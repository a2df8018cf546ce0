//! Connascence of value: constants whose values must be kept in step by hand.

use std::collections::HashMap;

use crate::analysis::{BindingScope, CollectedFacts, LiteralValue};
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

type ScopeKey = (BindingScope, Option<String>, String);

#[derive(Default)]
pub struct ValuesDetector {
    // Indices into `facts.assignments`, in source order.
    by_name: HashMap<ScopeKey, Vec<usize>>,
    by_value: HashMap<LiteralValue, Vec<usize>>,
}

impl Detector for ValuesDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Values
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.values;
        let allowed = &config.magic_literal.allowed_literals;

        for (index, binding) in facts.assignments.iter().enumerate() {
            if !binding.is_constant() || cfg.ignored_names.contains(&binding.name) {
                continue;
            }
            self.by_name
                .entry((binding.scope, binding.owner.clone(), binding.name.clone()))
                .or_default()
                .push(index);
            if !allowed.iter().any(|a| a == binding.value.key()) {
                self.by_value
                    .entry(binding.value.clone())
                    .or_default()
                    .push(index);
            }
        }

        let mut violations = Vec::new();

        for indices in self.by_name.values() {
            let first = &facts.assignments[indices[0]];
            for &i in &indices[1..] {
                let later = &facts.assignments[i];
                if later.value == first.value {
                    continue;
                }
                violations.push(
                    Violation::new(
                        RuleId::InconsistentValue,
                        Severity::Medium,
                        &facts.path,
                        later.location.line,
                        later.location.column,
                        format!(
                            "constant '{}' rebound to {} (was {} at line {})",
                            later.name, later.value, first.value, first.location.line
                        ),
                    )
                    .with_suggestion("define the constant once"),
                );
            }
        }

        if cfg.report_duplicates {
            for indices in self.by_value.values() {
                let first = &facts.assignments[indices[0]];
                let mut seen = vec![first.name.as_str()];
                for &i in &indices[1..] {
                    let other = &facts.assignments[i];
                    if seen.contains(&other.name.as_str()) {
                        continue;
                    }
                    seen.push(&other.name);
                    violations.push(
                        Violation::new(
                            RuleId::DuplicateValue,
                            Severity::Low,
                            &facts.path,
                            other.location.line,
                            other.location.column,
                            format!(
                                "constants '{}' and '{}' (line {}) share the value {}",
                                other.name, first.name, first.location.line, other.value
                            ),
                        )
                        .with_suggestion("derive one constant from the other if they must agree"),
                    );
                }
            }
        }

        violations.sort_by(|a, b| {
            (a.line, a.column, a.rule, &a.message).cmp(&(b.line, b.column, b.rule, &b.message))
        });
        Ok(violations)
    }

    fn reset(&mut self) {
        self.by_name.clear();
        self.by_value.clear();
    }
}
