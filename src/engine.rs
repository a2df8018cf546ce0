//! The analysis pipeline: discover, parse, collect, detect, aggregate, score.
//!
//! Files are processed independently on a rayon pool. A file that fails to
//! parse, or a detector that fails on one file, is recorded as a
//! [`Diagnostic`] and the run carries on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::ViolationAggregator;
use crate::analysis::UnifiedTreeCollector;
use crate::config::{validate, AnalysisConfig};
use crate::detect::{
    create, filter_suppressed, DetectorKind, DetectorPool, Factory, PoolStats, Violation,
};
use crate::error::AnalysisError;
use crate::ingest::{SourceCandidate, SourceIngestor};
use crate::score::{ComplianceScore, ComplianceScorer};

/// What went wrong for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The file could not be read or contains a syntax error.
    ParseError,
    /// A detector failed or panicked on this file.
    InternalError,
    /// The run budget ran out before the file was started.
    Timeout,
}

/// A recoverable problem recorded instead of aborting the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<DetectorKind>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Analyzed,
    ParseFailed,
    Skipped,
}

/// Per-file outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    /// Violations attributed to this file before cross-file deduplication.
    pub violations: usize,
    pub suppressed: usize,
    /// Syntax-tree nodes visited while collecting facts.
    pub node_count: usize,
}

/// Everything one `analyze` call produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub root: String,
    /// False when the run budget expired and some files were skipped.
    pub complete: bool,
    pub detectors: Vec<DetectorKind>,
    pub files: Vec<FileReport>,
    pub violations: Vec<Violation>,
    pub diagnostics: Vec<Diagnostic>,
    pub suppressed: usize,
    pub score: ComplianceScore,
}

impl AnalysisResult {
    pub fn files_analyzed(&self) -> usize {
        self.files
            .iter()
            .filter(|f| f.status == FileStatus::Analyzed)
            .count()
    }

    pub fn parse_errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::ParseError)
    }

    /// Violations reported against `path`.
    pub fn violations_in<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Violation> {
        self.violations.iter().filter(move |v| v.file == path)
    }
}

struct FileOutcome {
    report: FileReport,
    violations: Vec<Violation>,
    diagnostics: Vec<Diagnostic>,
}

/// Owns the configuration, detector pool and worker threads for a series
/// of runs.
pub struct Analyzer {
    config: Arc<AnalysisConfig>,
    ingestor: SourceIngestor,
    pool: DetectorPool,
    workers: rayon::ThreadPool,
}

impl Analyzer {
    pub fn new(config: AnalysisConfig) -> Result<Self, AnalysisError> {
        Self::with_factory(config, create)
    }

    fn with_factory(config: AnalysisConfig, factory: Factory) -> Result<Self, AnalysisError> {
        validate(&config)?;
        let pool =
            DetectorPool::with_factory(Arc::new(config.detectors.clone()), &config.runtime, factory)?;
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(config.runtime.workers)
            .thread_name(|i| format!("connascence-{}", i))
            .build()?;

        Ok(Self {
            ingestor: SourceIngestor::new(&config),
            config: Arc::new(config),
            pool,
            workers,
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Analyze every matching file under `root`.
    pub fn analyze(&self, root: &Path) -> Result<AnalysisResult, AnalysisError> {
        ensure_root(root)?;
        let candidates: Vec<SourceCandidate> = self.ingestor.discover(root).collect();
        Ok(self.run(root, candidates))
    }

    /// Analyze an explicit list of files, reported relative to `root`.
    pub fn analyze_files(
        &self,
        root: &Path,
        files: &[PathBuf],
    ) -> Result<AnalysisResult, AnalysisError> {
        ensure_root(root)?;
        let mut candidates = self.ingestor.explicit(root, files);
        candidates.sort();
        candidates.dedup();
        Ok(self.run(root, candidates))
    }

    /// Release pooled detectors and return the pool's final counters.
    pub fn shutdown(self) -> PoolStats {
        self.pool.shutdown()
    }

    fn run(&self, root: &Path, candidates: Vec<SourceCandidate>) -> AnalysisResult {
        let kinds = self.config.active_detectors();
        let deadline = self
            .config
            .runtime
            .timeout_secs
            // A budget too large to represent as an instant means no deadline.
            .and_then(|secs| Instant::now().checked_add(Duration::from_secs(secs)));

        tracing::debug!(
            root = %root.display(),
            files = candidates.len(),
            detectors = kinds.len(),
            "starting analysis"
        );

        // Collecting from an indexed parallel iterator keeps input order.
        let outcomes: Vec<FileOutcome> = self.workers.install(|| {
            candidates
                .par_iter()
                .map(|candidate| self.analyze_one(candidate, &kinds, deadline))
                .collect()
        });

        let mut files = Vec::with_capacity(outcomes.len());
        let mut diagnostics = Vec::new();
        let mut suppressed = 0;
        let mut aggregator = ViolationAggregator::new();

        for outcome in outcomes {
            suppressed += outcome.report.suppressed;
            files.push(outcome.report);
            diagnostics.extend(outcome.diagnostics);
            aggregator.extend(outcome.violations);
        }

        let violations = aggregator.finish();
        diagnostics.sort_by(|a, b| {
            (&a.file, a.line, a.kind, a.detector, &a.message)
                .cmp(&(&b.file, b.line, b.kind, b.detector, &b.message))
        });
        let complete = !diagnostics.iter().any(|d| d.kind == DiagnosticKind::Timeout);
        let score = ComplianceScorer::score(&violations, &self.config.scoring);

        tracing::info!(
            files = files.len(),
            violations = violations.len(),
            diagnostics = diagnostics.len(),
            suppressed,
            score = score.value,
            "analysis finished"
        );

        AnalysisResult {
            root: root.display().to_string(),
            complete,
            detectors: kinds,
            files,
            violations,
            diagnostics,
            suppressed,
            score,
        }
    }

    fn analyze_one(
        &self,
        candidate: &SourceCandidate,
        kinds: &[DetectorKind],
        deadline: Option<Instant>,
    ) -> FileOutcome {
        let path = candidate.display.clone();

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return FileOutcome {
                report: report(&path, FileStatus::Skipped, 0, 0, 0),
                violations: Vec::new(),
                diagnostics: vec![Diagnostic {
                    kind: DiagnosticKind::Timeout,
                    file: path,
                    detector: None,
                    message: "run time budget exhausted before the file was analyzed".to_string(),
                    line: None,
                    column: None,
                }],
            };
        }

        let file = match self.ingestor.load(candidate) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(file = %path, error = %e.message, "skipping unparsable file");
                return FileOutcome {
                    report: report(&path, FileStatus::ParseFailed, 0, 0, 0),
                    violations: Vec::new(),
                    diagnostics: vec![Diagnostic {
                        kind: DiagnosticKind::ParseError,
                        file: path,
                        detector: None,
                        message: e.message,
                        line: e.line,
                        column: e.column,
                    }],
                };
            }
        };

        let facts = UnifiedTreeCollector::collect(&file);
        drop(file);

        let mut violations = Vec::new();
        let mut diagnostics = Vec::new();
        for &kind in kinds {
            match self.pool.evaluate(kind, &facts) {
                Ok(found) => violations.extend(found),
                Err(e) => {
                    tracing::warn!(file = %path, detector = %kind, error = %e, "detector failed");
                    diagnostics.push(Diagnostic {
                        kind: DiagnosticKind::InternalError,
                        file: path.clone(),
                        detector: Some(kind),
                        message: e.to_string(),
                        line: None,
                        column: None,
                    });
                }
            }
        }

        let (violations, suppressed) = filter_suppressed(violations, &facts.suppressions);
        tracing::debug!(
            file = %path,
            nodes = facts.node_count,
            violations = violations.len(),
            suppressed,
            "file analyzed"
        );

        FileOutcome {
            report: report(
                &path,
                FileStatus::Analyzed,
                violations.len(),
                suppressed,
                facts.node_count,
            ),
            violations,
            diagnostics,
        }
    }
}

fn report(
    path: &str,
    status: FileStatus,
    violations: usize,
    suppressed: usize,
    node_count: usize,
) -> FileReport {
    FileReport {
        path: path.to_string(),
        status,
        violations,
        suppressed,
        node_count,
    }
}

fn ensure_root(root: &Path) -> Result<(), AnalysisError> {
    if root.exists() {
        Ok(())
    } else {
        Err(AnalysisError::RootNotFound(root.to_path_buf()))
    }
}

/// Analyze `root` with `config` using a pool built for this call.
pub fn analyze(root: &Path, config: &AnalysisConfig) -> Result<AnalysisResult, AnalysisError> {
    Analyzer::new(config.clone())?.analyze(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_is_fatal() {
        let err = analyze(Path::new("/nonexistent/project"), &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AnalysisError::RootNotFound(_)));
    }

    #[test]
    fn test_invalid_config_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut config = AnalysisConfig::default();
        config.detectors.position.max_parameter_count = 0;
        assert!(matches!(
            analyze(temp.path(), &config),
            Err(AnalysisError::Config(_))
        ));
    }

    #[test]
    fn test_empty_project() {
        let temp = TempDir::new().unwrap();
        let result = analyze(temp.path(), &AnalysisConfig::default()).unwrap();
        assert!(result.complete);
        assert!(result.files.is_empty());
        assert!(result.violations.is_empty());
        assert_eq!(result.score.value, 1.0);
    }

    #[test]
    fn test_suppressed_violations_are_counted() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join("dyn.py"),
            "def run(src):\n    return eval(src)  # connascence:ignore CON_EXECUTION - sandboxed\n",
        )
        .unwrap();

        let result = analyze(temp.path(), &AnalysisConfig::default()).unwrap();
        assert!(result.violations.iter().all(|v| v.rule != crate::detect::RuleId::DynamicExecution));
        assert_eq!(result.suppressed, 1);
        assert_eq!(result.files[0].suppressed, 1);
    }

    #[test]
    fn test_timeout_marks_result_incomplete() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "x = 1\n").unwrap();

        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        // A deadline already in the past skips every file.
        let candidates: Vec<SourceCandidate> = analyzer.ingestor.discover(temp.path()).collect();
        let outcome = analyzer.analyze_one(
            &candidates[0],
            &analyzer.config.active_detectors(),
            Some(Instant::now() - Duration::from_secs(1)),
        );

        assert_eq!(outcome.report.status, FileStatus::Skipped);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::Timeout);
    }

    #[test]
    fn test_unrepresentable_timeout_means_no_deadline() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "def run(src):\n    return eval(src)\n").unwrap();

        let mut config = AnalysisConfig::default();
        config.runtime.timeout_secs = Some(u64::MAX);
        let result = analyze(temp.path(), &config).unwrap();

        assert!(result.complete);
        assert_eq!(result.files[0].status, FileStatus::Analyzed);
        assert_eq!(result.violations.len(), 1);
    }

    struct Exploding;

    impl crate::detect::Detector for Exploding {
        fn kind(&self) -> DetectorKind {
            DetectorKind::Timing
        }

        fn detect(
            &mut self,
            facts: &crate::analysis::CollectedFacts,
            _config: &crate::config::DetectorConfig,
        ) -> Result<Vec<Violation>, crate::error::DetectorError> {
            if facts.path == "boom.py" {
                panic!("unexpected node in {}", facts.path);
            }
            Ok(Vec::new())
        }
    }

    fn exploding_timing(
        kind: DetectorKind,
        config: &crate::config::DetectorConfig,
    ) -> Result<Box<dyn crate::detect::Detector>, crate::error::ConfigError> {
        match kind {
            DetectorKind::Timing => Ok(Box::new(Exploding)),
            other => create(other, config),
        }
    }

    #[test]
    fn test_detector_panic_becomes_internal_error() {
        let temp = TempDir::new().unwrap();
        let source = "def run(src):\n    return eval(src)\n";
        fs::write(temp.path().join("boom.py"), source).unwrap();
        fs::write(temp.path().join("calm.py"), source).unwrap();

        let mut config = AnalysisConfig::default();
        config.runtime.workers = 1;
        let analyzer = Analyzer::with_factory(config, exploding_timing).unwrap();
        let result = analyzer.analyze(temp.path()).unwrap();

        let internal: Vec<&Diagnostic> = result
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::InternalError)
            .collect();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].file, "boom.py");
        assert_eq!(internal[0].detector, Some(DetectorKind::Timing));
        assert!(internal[0].message.contains("panicked"), "{}", internal[0].message);

        // Every file is still analyzed and the other detectors still report.
        assert!(result.complete);
        assert_eq!(result.files_analyzed(), 2);
        assert_eq!(result.violations_in("boom.py").count(), 1);
        assert_eq!(result.violations_in("calm.py").count(), 1);
        assert_eq!(analyzer.pool_stats().discarded, 1);
    }

    #[test]
    fn test_analyzer_is_reusable() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.py"), "import time\n\ndef f():\n    time.sleep(1)\n").unwrap();

        let analyzer = Analyzer::new(AnalysisConfig::default()).unwrap();
        let first = analyzer.analyze(temp.path()).unwrap();
        let second = analyzer.analyze(temp.path()).unwrap();
        assert_eq!(first, second);
        assert!(analyzer.pool_stats().reused > 0);
    }
}
