//! Configuration schema and loading.
//!
//! A configuration file tunes detector thresholds and enablement. Every key is
//! optional; anything absent falls back to the documented defaults, so running
//! without a file is equivalent to running with [`AnalysisConfig::default`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::detect::DetectorKind;
use crate::error::ConfigError;

/// Default config file names to search for.
pub const DEFAULT_CONFIG_NAMES: &[&str] =
    &["connascence.yaml", ".connascence.yaml", "connascence.yml"];

/// Top-level configuration for one analysis run.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Detector kinds to run (default: all).
    pub enabled_detectors: BTreeSet<DetectorKind>,
    /// Glob patterns for paths to exclude from discovery (e.g. "**/migrations/**").
    pub excluded_paths: Vec<String>,
    /// File extensions to analyze, without the dot.
    pub extensions: Vec<String>,
    /// Per-detector threshold sections.
    pub detectors: DetectorConfig,
    pub scoring: ScoringConfig,
    pub runtime: RuntimeConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled_detectors: DetectorKind::ALL.into_iter().collect(),
            excluded_paths: Vec::new(),
            extensions: vec!["py".to_string()],
            detectors: DetectorConfig::default(),
            scoring: ScoringConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Whether a detector kind should run: listed in `enabled_detectors`
    /// and its own section is enabled.
    pub fn is_enabled(&self, kind: DetectorKind) -> bool {
        self.enabled_detectors.contains(&kind) && self.detectors.section_enabled(kind)
    }

    /// Enabled kinds in evaluation order.
    pub fn active_detectors(&self) -> Vec<DetectorKind> {
        DetectorKind::ALL
            .into_iter()
            .filter(|k| self.is_enabled(*k))
            .collect()
    }

    /// Compile `excluded_paths` into a single matcher. Invalid patterns are
    /// skipped here; [`validate`] rejects them up front.
    pub fn exclusion_set(&self) -> GlobSet {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    }
}

/// Per-detector threshold sections, shared read-only by every pooled
/// detector instance.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    pub position: PositionConfig,
    pub magic_literal: MagicLiteralConfig,
    pub algorithm: AlgorithmConfig,
    pub god_object: GodObjectConfig,
    pub timing: TimingConfig,
    pub convention: ConventionConfig,
    pub values: ValuesConfig,
    pub execution: ExecutionConfig,
}

impl DetectorConfig {
    /// Whether the section for `kind` is enabled.
    pub fn section_enabled(&self, kind: DetectorKind) -> bool {
        match kind {
            DetectorKind::Position => self.position.enabled,
            DetectorKind::MagicLiteral => self.magic_literal.enabled,
            DetectorKind::Algorithm => self.algorithm.enabled,
            DetectorKind::GodObject => self.god_object.enabled,
            DetectorKind::Timing => self.timing.enabled,
            DetectorKind::Convention => self.convention.enabled,
            DetectorKind::Values => self.values.enabled,
            DetectorKind::Execution => self.execution.enabled,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Positional-parameter coupling.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PositionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum positional parameters before flagging (default: 5)
    pub max_parameter_count: usize,
    /// Function names exempt from the check.
    pub exclusions: Vec<String>,
}

impl Default for PositionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_parameter_count: 5,
            exclusions: Vec::new(),
        }
    }
}

/// Repeated magic literals.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MagicLiteralConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// A literal repeated more than this many times is flagged (default: 3)
    pub repetition_threshold: usize,
    /// Literal values never flagged. Strings are compared by content.
    pub allowed_literals: Vec<String>,
}

impl Default for MagicLiteralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            repetition_threshold: 3,
            allowed_literals: vec![
                "0".to_string(),
                "1".to_string(),
                "-1".to_string(),
                String::new(),
            ],
        }
    }
}

/// Duplicated algorithms.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlgorithmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum body-shape similarity (0, 1] to report a pair (default: 0.9)
    pub similarity_threshold: f64,
    /// Bodies shorter than this many syntax tokens are ignored (default: 40)
    pub min_body_tokens: usize,
    /// Function names exempt from the check.
    pub exclusions: Vec<String>,
}

impl Default for AlgorithmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: 0.9,
            min_body_tokens: 40,
            exclusions: Vec::new(),
        }
    }
}

/// Classes with too many responsibilities.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GodObjectConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Maximum methods per class (default: 20)
    pub max_methods: usize,
    /// Maximum distinct attributes per class (default: 15)
    pub max_attributes: usize,
    /// Maximum lines per class (default: 500)
    pub max_lines: usize,
    /// Class names exempt from the check.
    pub exclusions: Vec<String>,
}

impl Default for GodObjectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_methods: 20,
            max_attributes: 15,
            max_lines: 500,
            exclusions: Vec::new(),
        }
    }
}

/// Timing coupling through sleeps and timers.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Dotted callee names treated as time-sensitive.
    pub time_sensitive_calls: Vec<String>,
    /// Enclosing function names exempt from the check.
    pub exclusions: Vec<String>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            time_sensitive_calls: vec![
                "time.sleep".to_string(),
                "sleep".to_string(),
                "asyncio.sleep".to_string(),
                "threading.Timer".to_string(),
                "signal.alarm".to_string(),
            ],
            exclusions: Vec::new(),
        }
    }
}

/// Naming-convention drift.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConventionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Regex every function and method name must match.
    pub function_pattern: String,
    /// Regex every class name must match.
    pub class_pattern: String,
    /// Names exempt from the check (framework hooks and the like).
    pub ignored_names: Vec<String>,
}

impl Default for ConventionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            function_pattern: r"^_{0,2}[a-z][a-z0-9_]*$".to_string(),
            class_pattern: r"^_?[A-Z][a-zA-Z0-9]*$".to_string(),
            ignored_names: vec![
                "setUp".to_string(),
                "tearDown".to_string(),
                "setUpClass".to_string(),
                "tearDownClass".to_string(),
            ],
        }
    }
}

/// Value coupling between constants.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValuesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Constant names exempt from the check.
    pub ignored_names: Vec<String>,
    /// Report distinct constants bound to the same literal (default: true)
    pub report_duplicates: bool,
}

impl Default for ValuesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignored_names: vec!["__all__".to_string(), "__version__".to_string()],
            report_duplicates: true,
        }
    }
}

/// Dynamic code execution.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Dotted callee names that execute or load code dynamically.
    pub dynamic_calls: Vec<String>,
    /// Enclosing function names exempt from the check.
    pub exclusions: Vec<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dynamic_calls: vec![
                "eval".to_string(),
                "exec".to_string(),
                "compile".to_string(),
                "__import__".to_string(),
                "importlib.import_module".to_string(),
            ],
            exclusions: Vec::new(),
        }
    }
}

/// Weights for the compliance score.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringConfig {
    /// Score lost per critical violation (default: 0.1)
    pub critical_weight: f64,
    /// Score lost per high violation (default: 0.05)
    pub high_weight: f64,
    /// Minimum acceptable score for a passing run (default: 0.75)
    pub min_score: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            critical_weight: 0.1,
            high_weight: 0.05,
            min_score: 0.75,
        }
    }
}

/// Worker, pool and timeout settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Worker threads; 0 lets rayon decide.
    pub workers: usize,
    /// Upper bound on live pooled instances per detector kind.
    pub pool_max_instances: usize,
    /// Instances pre-built per kind when the pool is created.
    pub pool_warm_instances: usize,
    /// How long to wait on an exhausted pool before creating an overflow instance.
    pub acquire_timeout_ms: u64,
    /// Run-level budget; files not started before it elapses are skipped.
    pub timeout_secs: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            pool_max_instances: 8,
            pool_warm_instances: 2,
            acquire_timeout_ms: 50,
            timeout_secs: None,
        }
    }
}

/// Loads and validates configuration.
pub struct ConfigurationManager;

impl ConfigurationManager {
    /// Load configuration from `source`, or the defaults when `None`.
    ///
    /// The result is validated; any problem fails the whole run.
    pub fn load(source: Option<&Path>) -> Result<AnalysisConfig, ConfigError> {
        let config = match source {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })?;
                Self::parse_str(&content)?
            }
            None => AnalysisConfig::default(),
        };
        validate(&config)?;
        tracing::debug!(
            source = %source.map(|p| p.display().to_string()).unwrap_or_else(|| "defaults".into()),
            detectors = config.active_detectors().len(),
            "configuration loaded"
        );
        Ok(config)
    }

    /// Parse and validate a YAML (or JSON) document.
    pub fn from_yaml_str(content: &str) -> Result<AnalysisConfig, ConfigError> {
        let config = Self::parse_str(content)?;
        validate(&config)?;
        Ok(config)
    }

    /// Look for a default-named config file in `dir`.
    pub fn discover(dir: &Path) -> Option<PathBuf> {
        DEFAULT_CONFIG_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }

    fn parse_str(content: &str) -> Result<AnalysisConfig, ConfigError> {
        // An empty document means "all defaults".
        if content.trim().is_empty() {
            return Ok(AnalysisConfig::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

/// Validate a configuration for correctness.
pub fn validate(config: &AnalysisConfig) -> Result<(), ConfigError> {
    let d = &config.detectors;

    require_positive("position.max_parameter_count", d.position.max_parameter_count)?;
    require_positive(
        "magic_literal.repetition_threshold",
        d.magic_literal.repetition_threshold,
    )?;
    require_positive("algorithm.min_body_tokens", d.algorithm.min_body_tokens)?;
    require_positive("god_object.max_methods", d.god_object.max_methods)?;
    require_positive("god_object.max_attributes", d.god_object.max_attributes)?;
    require_positive("god_object.max_lines", d.god_object.max_lines)?;

    let t = d.algorithm.similarity_threshold;
    if !t.is_finite() || t <= 0.0 || t > 1.0 {
        return Err(invalid(format!(
            "algorithm.similarity_threshold must be in (0, 1], got {}",
            t
        )));
    }

    for (name, pattern) in [
        ("convention.function_pattern", &d.convention.function_pattern),
        ("convention.class_pattern", &d.convention.class_pattern),
    ] {
        regex::Regex::new(pattern)
            .map_err(|e| invalid(format!("invalid {} {:?}: {}", name, pattern, e)))?;
    }

    for (name, calls) in [
        ("timing.time_sensitive_calls", &d.timing.time_sensitive_calls),
        ("execution.dynamic_calls", &d.execution.dynamic_calls),
    ] {
        if calls.iter().any(|c| c.trim().is_empty()) {
            return Err(invalid(format!("{} contains an empty name", name)));
        }
    }

    for pattern in &config.excluded_paths {
        Glob::new(pattern)
            .map_err(|e| invalid(format!("invalid excluded_paths pattern {:?}: {}", pattern, e)))?;
    }

    if config.extensions.is_empty() {
        return Err(invalid("extensions must not be empty".to_string()));
    }

    let s = &config.scoring;
    for (name, weight) in [
        ("scoring.critical_weight", s.critical_weight),
        ("scoring.high_weight", s.high_weight),
    ] {
        if !weight.is_finite() || weight < 0.0 {
            return Err(invalid(format!(
                "{} must be a non-negative number, got {}",
                name, weight
            )));
        }
    }
    if !(0.0..=1.0).contains(&s.min_score) {
        return Err(invalid(format!(
            "scoring.min_score must be in [0, 1], got {}",
            s.min_score
        )));
    }

    let r = &config.runtime;
    require_positive("runtime.pool_max_instances", r.pool_max_instances)?;
    if r.pool_warm_instances > r.pool_max_instances {
        return Err(invalid(format!(
            "runtime.pool_warm_instances ({}) exceeds runtime.pool_max_instances ({})",
            r.pool_warm_instances, r.pool_max_instances
        )));
    }
    if r.timeout_secs == Some(0) {
        return Err(invalid("runtime.timeout_secs must be positive".to_string()));
    }

    Ok(())
}

fn require_positive(name: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(format!("{} must be a positive integer", name)));
    }
    Ok(())
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
enabled_detectors: [position, god_object]
detectors:
  position:
    max_parameter_count: 4
  god_object:
    max_methods: 10
"#;
        let config = ConfigurationManager::from_yaml_str(yaml).unwrap();
        assert_eq!(config.detectors.position.max_parameter_count, 4);
        assert_eq!(config.detectors.god_object.max_methods, 10);
        // Untouched keys keep their defaults
        assert_eq!(config.detectors.god_object.max_attributes, 15);
        assert_eq!(
            config.active_detectors(),
            vec![DetectorKind::Position, DetectorKind::GodObject]
        );
    }

    #[test]
    fn test_empty_document_is_defaults() {
        let config = ConfigurationManager::from_yaml_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
    }

    #[test]
    fn test_missing_source_falls_back_to_defaults() {
        let config = ConfigurationManager::load(None).unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.active_detectors().len(), DetectorKind::ALL.len());
    }

    #[test]
    fn test_section_disable_wins_over_enabled_list() {
        let yaml = "detectors:\n  timing:\n    enabled: false\n";
        let config = ConfigurationManager::from_yaml_str(yaml).unwrap();
        assert!(!config.is_enabled(DetectorKind::Timing));
        assert!(config.is_enabled(DetectorKind::Execution));
    }

    #[test]
    fn test_rejects_zero_threshold() {
        let yaml = "detectors:\n  position:\n    max_parameter_count: 0\n";
        let err = ConfigurationManager::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_negative_threshold() {
        let yaml = "detectors:\n  magic_literal:\n    repetition_threshold: -2\n";
        let err = ConfigurationManager::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        let yaml = "detectors:\n  positon:\n    max_parameter_count: 3\n";
        assert!(ConfigurationManager::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_rejects_unknown_detector_kind() {
        let yaml = "enabled_detectors: [position, byzantine]\n";
        assert!(ConfigurationManager::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_rejects_bad_regex() {
        let yaml = "detectors:\n  convention:\n    function_pattern: \"([a-z\"\n";
        let err = ConfigurationManager::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("function_pattern"));
    }

    #[test]
    fn test_rejects_contradictory_pool_sizes() {
        let yaml = "runtime:\n  pool_max_instances: 2\n  pool_warm_instances: 4\n";
        let err = ConfigurationManager::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("pool_warm_instances"));
    }

    #[test]
    fn test_rejects_similarity_out_of_range() {
        let yaml = "detectors:\n  algorithm:\n    similarity_threshold: 1.5\n";
        assert!(ConfigurationManager::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_path_exclusion() {
        let config = AnalysisConfig {
            excluded_paths: vec!["**/migrations/**".to_string()],
            ..Default::default()
        };
        let excluded = config.exclusion_set();
        assert!(excluded.is_match(Path::new("app/migrations/0001_initial.py")));
        assert!(!excluded.is_match(Path::new("app/models.py")));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ConfigurationManager::load(Some(Path::new("/nonexistent/connascence.yaml")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
