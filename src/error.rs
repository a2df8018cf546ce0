//! Error taxonomy for the analysis pipeline.
//!
//! Only [`ConfigError`] and [`AnalysisError`] abort a run. Parse and detector
//! failures are recorded as diagnostics inside the `AnalysisResult`.

use std::path::PathBuf;

use thiserror::Error;

use crate::detect::DetectorKind;

/// Malformed or self-contradictory configuration. Fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// A source file that could not be read or parsed. Recoverable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{path}: {message}")]
pub struct ParseError {
    pub path: String,
    pub message: String,
    pub line: Option<usize>,
    pub column: Option<usize>,
}

impl ParseError {
    pub fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
            line: None,
            column: None,
        }
    }

    pub fn at(mut self, line: usize, column: usize) -> Self {
        self.line = Some(line);
        self.column = Some(column);
        self
    }
}

/// Failure to hand out a detector instance.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("cannot construct {kind} detector: {source}")]
    Creation {
        kind: DetectorKind,
        #[source]
        source: ConfigError,
    },
}

/// An unexpected failure inside one detector for one file. Recoverable.
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("{kind} detector panicked: {message}")]
    Panicked { kind: DetectorKind, message: String },
    #[error(transparent)]
    Unavailable(#[from] PoolError),
}

/// Run-level failure returned to the caller of `analyze`.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("analysis root {0} does not exist or is not readable")]
    RootNotFound(PathBuf),
    #[error("building worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
