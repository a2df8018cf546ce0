//! Pipeline-wide properties: determinism, single traversal, pool
//! statelessness, aggregation, threshold monotonicity and failure isolation.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use connascence::analysis::UnifiedTreeCollector;
use connascence::config::RuntimeConfig;
use connascence::detect::{DetectorKind, DetectorPool, RuleId, Severity};
use connascence::ingest::SourceFile;
use connascence::{
    analyze, AnalysisConfig, AnalysisResult, Analyzer, ConfigurationManager, ViolationAggregator,
};

fn write(dir: &Path, rel: &str, content: &str) {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn only(kinds: &[DetectorKind]) -> AnalysisConfig {
    AnalysisConfig {
        enabled_detectors: kinds.iter().copied().collect(),
        ..AnalysisConfig::default()
    }
}

/// A small project that trips most detectors.
fn sample_project() -> TempDir {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "app/orders.py",
        r#"import time
from importlib import import_module

RATE = 0.2
FEE = 0.2


def place(order, customer, store, clerk, channel, region, note):
    total = order.amount * 1.15
    if total > 1000:
        total = total * 1.15
    return total * 1.15 + 1.15


def wait(queue):
    for _ in range(10):
        time.sleep(2)


def plugin(name):
    return import_module(name)
"#,
    );
    write(
        temp.path(),
        "app/models.py",
        r#"class customerRecord:
    def __init__(self, name):
        self.name = name

    def Rename(self, name):
        self.name = name


def run(expr):
    return eval(expr)
"#,
    );
    write(temp.path(), "app/__init__.py", "");
    temp
}

fn class_with_methods(name: &str, methods: usize) -> String {
    let mut src = format!("class {}:\n", name);
    for i in 0..methods {
        writeln!(src, "    def method_{}(self):\n        pass\n", i).unwrap();
    }
    src
}

fn function_with_params(name: &str, params: usize) -> String {
    let params: Vec<String> = (0..params).map(|i| format!("p{}", i)).collect();
    format!("def {}({}):\n    return p0\n", name, params.join(", "))
}

// ----------------------------------------------------------------------------
// Determinism
// ----------------------------------------------------------------------------

#[test]
fn test_same_input_same_result() {
    let project = sample_project();
    let config = AnalysisConfig::default();

    let first = analyze(project.path(), &config).unwrap();
    let second = analyze(project.path(), &config).unwrap();
    assert_eq!(first, second);
    assert!(!first.violations.is_empty());
}

#[test]
fn test_result_independent_of_worker_count() {
    let project = sample_project();

    let mut serial = AnalysisConfig::default();
    serial.runtime.workers = 1;
    let mut parallel = AnalysisConfig::default();
    parallel.runtime.workers = 4;
    parallel.runtime.pool_max_instances = 1;
    parallel.runtime.pool_warm_instances = 0;

    let a = analyze(project.path(), &serial).unwrap();
    let b = analyze(project.path(), &parallel).unwrap();
    assert_eq!(a, b);
}

// ----------------------------------------------------------------------------
// Single traversal
// ----------------------------------------------------------------------------

#[test]
fn test_visit_count_equals_node_count() {
    let project = sample_project();
    let result = analyze(project.path(), &AnalysisConfig::default()).unwrap();

    for report in &result.files {
        let text = fs::read_to_string(project.path().join(&report.path)).unwrap();
        let file = SourceFile::parse(&report.path, text).unwrap();
        assert_eq!(
            report.node_count,
            file.tree.root_node().descendant_count(),
            "{}",
            report.path
        );
    }
}

#[test]
fn test_visit_count_independent_of_enabled_detectors() {
    let project = sample_project();

    let all = analyze(project.path(), &AnalysisConfig::default()).unwrap();
    let one = analyze(project.path(), &only(&[DetectorKind::Position])).unwrap();

    let counts = |r: &AnalysisResult| -> Vec<usize> { r.files.iter().map(|f| f.node_count).collect() };
    assert_eq!(counts(&all), counts(&one));
}

// ----------------------------------------------------------------------------
// Pool statelessness
// ----------------------------------------------------------------------------

#[test]
fn test_reused_instances_match_fresh_ones() {
    let first = SourceFile::parse(
        "first.py",
        "def a():\n    return 42 + 42 + 42\n\ndef b():\n    return 42\n".to_string(),
    )
    .unwrap();
    let second = SourceFile::parse(
        "second.py",
        "def c():\n    return 42 + 42\n\nLIMIT = 7\nCAP = 7\n".to_string(),
    )
    .unwrap();
    let first = UnifiedTreeCollector::collect(&first);
    let second = UnifiedTreeCollector::collect(&second);

    let runtime = RuntimeConfig {
        pool_max_instances: 1,
        pool_warm_instances: 1,
        ..RuntimeConfig::default()
    };
    let config = Arc::new(AnalysisConfig::default().detectors);

    let reused = DetectorPool::new(config.clone(), &runtime).unwrap();
    for kind in DetectorKind::ALL {
        reused.evaluate(kind, &first).unwrap();
    }

    let fresh = DetectorPool::new(config, &runtime).unwrap();
    for kind in DetectorKind::ALL {
        assert_eq!(
            reused.evaluate(kind, &second).unwrap(),
            fresh.evaluate(kind, &second).unwrap(),
            "{} leaked state between files",
            kind
        );
    }

    // Two files' worth of 42s would cross the threshold if tallies leaked.
    assert!(reused
        .evaluate(DetectorKind::MagicLiteral, &second)
        .unwrap()
        .is_empty());
    assert!(reused.stats().reused > 0);
}

// ----------------------------------------------------------------------------
// Aggregation
// ----------------------------------------------------------------------------

#[test]
fn test_aggregation_is_idempotent() {
    let project = sample_project();
    let result = analyze(project.path(), &AnalysisConfig::default()).unwrap();

    let again = ViolationAggregator::merge(vec![result.violations.clone()]);
    assert_eq!(again, result.violations);

    let doubled = ViolationAggregator::merge(vec![result.violations.clone(), result.violations.clone()]);
    assert_eq!(doubled, result.violations);
}

// ----------------------------------------------------------------------------
// Thresholds
// ----------------------------------------------------------------------------

#[test]
fn test_raising_thresholds_never_adds_violations() {
    let project = sample_project();

    let mut previous = usize::MAX;
    for limit in 1..=10 {
        let mut config = AnalysisConfig::default();
        config.detectors.position.max_parameter_count = limit;
        config.detectors.magic_literal.repetition_threshold = limit;
        config.detectors.god_object.max_methods = limit;
        let count = analyze(project.path(), &config).unwrap().violations.len();
        assert!(count <= previous, "limit {} gave {} > {}", limit, count, previous);
        previous = count;
    }
}

#[test]
fn test_position_threshold_boundary() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "wide.py", &function_with_params("wide", 7));
    write(temp.path(), "narrow.py", &function_with_params("narrow", 6));

    let mut config = only(&[DetectorKind::Position]);
    config.detectors.position.max_parameter_count = 6;
    let result = analyze(temp.path(), &config).unwrap();

    assert_eq!(result.violations.len(), 1);
    let v = &result.violations[0];
    assert_eq!(v.rule, RuleId::Position);
    assert_eq!(v.file, "wide.py");
    assert_eq!(v.line, 1);
}

#[test]
fn test_magic_literal_threshold_boundary() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "often.py",
        "def f(x):\n    return x * 86400 + 86400 - 86400 / 86400\n",
    );
    write(temp.path(), "rare.py", "def g(x):\n    return x * 86400 + 86400\n");

    let config = only(&[DetectorKind::MagicLiteral]);
    assert_eq!(config.detectors.magic_literal.repetition_threshold, 3);
    let result = analyze(temp.path(), &config).unwrap();

    assert_eq!(result.violations.len(), 1);
    assert_eq!(result.violations[0].file, "often.py");
    assert!(result.violations[0].message.contains("86400"));
}

#[test]
fn test_god_object_threshold_boundary() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "big.py", &class_with_methods("Everything", 25));
    write(temp.path(), "small.py", &class_with_methods("Focused", 15));

    let config = only(&[DetectorKind::GodObject]);
    assert_eq!(config.detectors.god_object.max_methods, 20);
    let result = analyze(temp.path(), &config).unwrap();

    assert_eq!(result.violations.len(), 1);
    let v = &result.violations[0];
    assert_eq!(v.rule, RuleId::GodObject);
    assert_eq!(v.file, "big.py");
    assert_eq!(v.severity, Severity::High);
    assert!(v.message.contains("25 methods"), "{}", v.message);
}

// ----------------------------------------------------------------------------
// Failure isolation
// ----------------------------------------------------------------------------

#[test]
fn test_one_broken_file_of_ten() {
    let temp = TempDir::new().unwrap();
    for i in 0..9 {
        write(
            temp.path(),
            &format!("module_{}.py", i),
            &format!("def add_{}(a, b):\n    return a + b\n", i),
        );
    }
    write(temp.path(), "module_9.py", "def broken(a, b:\n    return a +\n");

    let result = analyze(temp.path(), &AnalysisConfig::default()).unwrap();

    assert_eq!(result.files.len(), 10);
    assert_eq!(result.files_analyzed(), 9);
    let errors: Vec<_> = result.parse_errors().collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file, "module_9.py");
    assert!(result.score.value > 0.0);
    assert!(result.complete);
}

#[test]
fn test_invalid_utf8_is_a_parse_error() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("latin1.py"), b"name = '\xe9t\xe9'\n").unwrap();
    write(temp.path(), "ok.py", "x = 1\n");

    let result = analyze(temp.path(), &AnalysisConfig::default()).unwrap();
    assert_eq!(result.files_analyzed(), 1);
    assert_eq!(result.parse_errors().count(), 1);
}

// ----------------------------------------------------------------------------
// Import resolution
// ----------------------------------------------------------------------------

#[test]
fn test_imported_compile_is_not_dynamic_execution() {
    let temp = TempDir::new().unwrap();
    write(
        temp.path(),
        "patterns.py",
        "from re import compile\n\nDIGITS = compile(r\"\\d+\")\n",
    );
    write(temp.path(), "builder.py", "def build(src):\n    return compile(src, \"<x>\", \"exec\")\n");

    let result = analyze(temp.path(), &only(&[DetectorKind::Execution])).unwrap();

    assert_eq!(result.violations_in("patterns.py").count(), 0);
    assert_eq!(result.violations_in("builder.py").count(), 1);
    assert_eq!(result.score.value, 1.0 - AnalysisConfig::default().scoring.high_weight);
}

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

#[test]
fn test_default_file_equals_no_file() {
    let project = sample_project();
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("connascence.yaml");
    fs::write(
        &config_path,
        serde_yaml::to_string(&AnalysisConfig::default()).unwrap(),
    )
    .unwrap();

    let from_file = ConfigurationManager::load(Some(config_path.as_path())).unwrap();
    let from_defaults = ConfigurationManager::load(None).unwrap();
    assert_eq!(from_file, from_defaults);

    assert_eq!(
        analyze(project.path(), &from_file).unwrap(),
        analyze(project.path(), &from_defaults).unwrap()
    );
}

#[test]
fn test_malformed_config_fails_the_run() {
    let temp = TempDir::new().unwrap();
    let config_path = temp.path().join("connascence.yaml");
    fs::write(&config_path, "detectors:\n  god_object:\n    max_methods: 0\n").unwrap();

    assert!(ConfigurationManager::load(Some(config_path.as_path())).is_err());
}

// ----------------------------------------------------------------------------
// Concurrency
// ----------------------------------------------------------------------------

#[test]
fn test_concurrent_runs_share_one_analyzer() {
    let project = sample_project();
    let mut config = AnalysisConfig::default();
    config.runtime.pool_max_instances = 2;
    config.runtime.workers = 2;

    let analyzer = Analyzer::new(config).unwrap();
    let expected = analyzer.analyze(project.path()).unwrap();

    let results: Vec<AnalysisResult> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| analyzer.analyze(project.path()).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in results {
        assert_eq!(result, expected);
    }

    let stats = analyzer.shutdown();
    assert!(stats.reused > 0);
}
