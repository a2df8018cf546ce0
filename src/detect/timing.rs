//! Connascence of timing: code that depends on sleeps or timers instead of
//! explicit synchronization.

use crate::analysis::CollectedFacts;
use crate::config::DetectorConfig;
use crate::error::DetectorError;

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

pub struct TimingDetector;

impl Detector for TimingDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Timing
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let cfg = &config.timing;
        let mut violations = Vec::new();

        for call in &facts.calls {
            // A sleep under a lock or context manager is deliberate pacing.
            if call.in_with {
                continue;
            }
            if let Some(function) = &call.enclosing_function {
                if cfg.exclusions.contains(function) {
                    continue;
                }
            }

            let resolved = facts.resolve_callee(&call.callee);
            if !cfg.time_sensitive_calls.iter().any(|c| *c == resolved) {
                continue;
            }

            let (severity, message) = if call.in_loop {
                (
                    Severity::High,
                    format!("'{}' inside a loop polls on timing", call.callee),
                )
            } else {
                (
                    Severity::Medium,
                    format!("'{}' couples correctness to timing", call.callee),
                )
            };

            violations.push(
                Violation::new(
                    RuleId::Timing,
                    severity,
                    &facts.path,
                    call.location.line,
                    call.location.column,
                    message,
                )
                .with_suggestion("wait on an event, condition or future instead of a fixed delay"),
            );
        }

        Ok(violations)
    }
}
