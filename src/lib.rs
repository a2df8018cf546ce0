//! Connascence - coupling analysis for Python source trees.
//!
//! Connascence scans a project for forms of excessive coupling (shared magic
//! literals, positional parameters, duplicated algorithms, god objects,
//! timing dependencies, naming drift, value coupling and dynamic execution)
//! and produces a severity-ranked report with a compliance score.
//!
//! # Architecture
//!
//! Each file flows through one pipeline:
//!
//! - `ingest`: discovers files and parses them with tree-sitter
//! - `analysis`: walks each tree once and records [`CollectedFacts`]
//! - `detect`: eight detectors, lent out per file by a [`DetectorPool`]
//! - `aggregate`: deduplicates and orders violations across files
//! - `score`: the compliance score over the aggregated list
//! - `engine`: drives the pipeline on a rayon pool
//!
//! `config` loads thresholds; `report` and `cli` are the thin binary front end.
//!
//! ```no_run
//! use std::path::Path;
//! use connascence::{analyze, ConfigurationManager};
//!
//! let config = ConfigurationManager::load(None)?;
//! let result = analyze(Path::new("src"), &config)?;
//! println!("{} violations, score {:.2}", result.violations.len(), result.score.value);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod aggregate;
pub mod analysis;
pub mod cli;
pub mod config;
pub mod detect;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod report;
pub mod score;

pub use aggregate::ViolationAggregator;
pub use analysis::{CollectedFacts, UnifiedTreeCollector};
pub use config::{AnalysisConfig, ConfigurationManager, DetectorConfig};
pub use detect::{DetectorKind, DetectorPool, RuleId, Severity, Violation};
pub use engine::{analyze, AnalysisResult, Analyzer, Diagnostic, DiagnosticKind, FileStatus};
pub use error::{AnalysisError, ConfigError, DetectorError, ParseError, PoolError};
pub use ingest::{SourceFile, SourceIngestor};
pub use score::{ComplianceScore, ComplianceScorer};
