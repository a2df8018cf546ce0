//! Connascence of execution: behavior assembled from strings at run time.

use crate::analysis::CollectedFacts;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

/// Calls that run arbitrary code when handed a computed argument.
const CODE_EVALUATORS: &[&str] = &["eval", "exec", "builtins.eval", "builtins.exec"];

pub struct ExecutionDetector;

impl Detector for ExecutionDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Execution
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.execution;
        let mut violations = Vec::new();

        for call in &facts.calls {
            if let Some(function) = &call.enclosing_function {
                if cfg.exclusions.contains(function) {
                    continue;
                }
            }

            // Unimported names resolve to themselves, so builtins still match.
            let resolved = facts.resolve_callee(&call.callee);
            if !cfg.dynamic_calls.iter().any(|c| *c == resolved) {
                continue;
            }

            let evaluates_code = CODE_EVALUATORS.contains(&resolved.as_str());
            let (severity, message) = if evaluates_code && !call.first_arg_literal {
                (
                    Severity::Critical,
                    format!("'{}' executes a computed expression", call.callee),
                )
            } else {
                (
                    Severity::High,
                    format!("'{}' resolves behavior at run time", call.callee),
                )
            };

            violations.push(
                Violation::new(
                    RuleId::DynamicExecution,
                    severity,
                    &facts.path,
                    call.location.line,
                    call.location.column,
                    message,
                )
                .with_suggestion("dispatch through an explicit table of callables"),
            );
        }

        Ok(violations)
    }
}
