//! The detector interface and factory.

use crate::analysis::CollectedFacts;
use crate::config::DetectorConfig;
use crate::error::{ConfigError, DetectorError};

use super::{
    AlgorithmDetector, ConventionDetector, DetectorKind, ExecutionDetector, GodObjectDetector,
    MagicLiteralDetector, PositionDetector, TimingDetector, ValuesDetector, Violation,
};

/// One connascence check.
///
/// Implementations may hold scratch buffers that are reused across files;
/// [`Detector::reset`] must return them to a blank state. The violations
/// produced for a file depend only on the facts and the configuration, never
/// on what the instance saw before.
pub trait Detector: Send {
    /// The kind this detector reports.
    fn kind(&self) -> DetectorKind;

    /// Evaluate one file's facts.
    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError>;

    /// Clear per-file state before the instance is reused.
    fn reset(&mut self) {}
}

/// Build a fresh detector of `kind`.
///
/// Fails only when the configuration cannot be compiled for this kind
/// (an invalid naming regex, for example).
pub fn create(kind: DetectorKind, config: &DetectorConfig) -> Result<Box<dyn Detector>, ConfigError> {
    let detector: Box<dyn Detector> = match kind {
        DetectorKind::Position => Box::new(PositionDetector),
        DetectorKind::MagicLiteral => Box::new(MagicLiteralDetector::default()),
        DetectorKind::Algorithm => Box::new(AlgorithmDetector::default()),
        DetectorKind::GodObject => Box::new(GodObjectDetector),
        DetectorKind::Timing => Box::new(TimingDetector),
        DetectorKind::Convention => Box::new(ConventionDetector::new(&config.convention)?),
        DetectorKind::Values => Box::new(ValuesDetector::default()),
        DetectorKind::Execution => Box::new(ExecutionDetector),
    };
    Ok(detector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_every_kind() {
        let config = DetectorConfig::default();
        for kind in DetectorKind::ALL {
            let detector = create(kind, &config).unwrap();
            assert_eq!(detector.kind(), kind);
        }
    }

    #[test]
    fn test_factory_rejects_bad_pattern() {
        let mut config = DetectorConfig::default();
        config.convention.class_pattern = "[".to_string();
        assert!(create(DetectorKind::Convention, &config).is_err());
    }
}
