//! Connascence detectors and the pool that lends them out.

mod algorithm;
mod convention;
mod execution;
mod god_objects;
mod magic_literal;
mod pool;
mod position;
mod suppress;
mod timing;
mod traits;
mod types;
mod values;

pub use algorithm::AlgorithmDetector;
pub use convention::ConventionDetector;
pub use execution::ExecutionDetector;
pub use god_objects::GodObjectDetector;
pub use magic_literal::MagicLiteralDetector;
pub(crate) use pool::Factory;
pub use pool::{DetectorHandle, DetectorPool, PoolStats};
pub use position::PositionDetector;
pub use suppress::{filter_suppressed, matches_suppression};
pub use timing::TimingDetector;
pub use traits::{create, Detector};
pub use types::{DetectorKind, RuleId, Severity, Violation};
pub use values::ValuesDetector;
