//! Command-line interface for connascence.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigurationManager, DEFAULT_CONFIG_NAMES};
use crate::detect::DetectorKind;
use crate::engine::Analyzer;
use crate::report;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Connascence analyzer - detect coupling violations in Python code.
///
/// Scans a source tree for shared magic literals, positional-parameter
/// coupling, duplicated algorithms, god objects, timing dependencies,
/// naming drift, value coupling and dynamic code execution, then reports
/// the findings with a 0-1 compliance score.
#[derive(Parser)]
#[command(name = "connascence")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze a file or directory
    #[command(visible_alias = "check")]
    Analyze(AnalyzeArgs),
    /// Write a configuration file from a template
    Init(InitArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover, then built-in defaults)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Minimum acceptable compliance score (overrides scoring.min_score)
    #[arg(short, long)]
    pub min_score: Option<f64>,

    /// Only run these detectors (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub only: Vec<String>,

    /// Worker threads (overrides runtime.workers)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Run-level timeout in seconds (overrides runtime.timeout_secs)
    #[arg(long)]
    pub timeout: Option<u64>,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "connascence.yaml")]
    pub output: PathBuf,

    /// Template to use
    #[arg(short, long, default_value = "default")]
    pub template: String,

    /// List available templates
    #[arg(short, long)]
    pub list: bool,
}

/// Available configuration templates.
struct Template {
    name: &'static str,
    description: &'static str,
    content: &'static str,
}

static TEMPLATES: &[Template] = &[
    Template {
        name: "default",
        description: "Every setting at its built-in default, ready to tune",
        content: include_str!("templates/default.yaml"),
    },
    Template {
        name: "strict",
        description: "Tighter thresholds and a higher passing score for new code",
        content: include_str!("templates/strict.yaml"),
    },
];

/// Install the stderr log subscriber. `RUST_LOG` wins over `-v`.
pub fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "connascence=debug",
        _ => "connascence=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse `--only` values into detector kinds.
fn parse_only(names: &[String]) -> Result<Vec<DetectorKind>, String> {
    names
        .iter()
        .map(|name| {
            DetectorKind::parse(name.trim()).ok_or_else(|| {
                let known: Vec<&str> = DetectorKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("unknown detector {:?} (known: {})", name, known.join(", "))
            })
        })
        .collect()
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    // Validate format
    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let only = match parse_only(&args.only) {
        Ok(kinds) => kinds,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    // Explicit path, then a default-named file in the working directory
    let config_path = match &args.config {
        Some(p) => Some(p.clone()),
        None => ConfigurationManager::discover(&std::env::current_dir()?),
    };

    let mut config = match ConfigurationManager::load(config_path.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: invalid configuration: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    if !only.is_empty() {
        config.enabled_detectors = only.into_iter().collect();
    }
    if let Some(workers) = args.workers {
        config.runtime.workers = workers;
    }
    if let Some(timeout) = args.timeout {
        config.runtime.timeout_secs = Some(timeout);
    }
    if let Some(min_score) = args.min_score {
        config.scoring.min_score = min_score;
    }

    let min_score = config.scoring.min_score;
    let analyzer = match Analyzer::new(config) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let result = match analyzer.analyze(&args.path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let stats = analyzer.shutdown();
    tracing::debug!(
        created = stats.created,
        reused = stats.reused,
        overflow = stats.overflow,
        "detector pool released"
    );

    if result.files.is_empty() {
        eprintln!("Warning: no files to analyze");
    }

    // Output results
    let config_str = config_path.map(|p| p.to_string_lossy().to_string());

    match args.format.as_str() {
        "json" => report::write_json(&result, config_str.as_deref(), min_score)?,
        _ => report::write_pretty(&result, config_str.as_deref(), min_score),
    }

    // Return appropriate exit code
    if result.score.passes(min_score) {
        Ok(EXIT_SUCCESS)
    } else {
        Ok(EXIT_FAILED)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    // List mode
    if args.list {
        return list_templates();
    }

    // Find template
    let template = match TEMPLATES.iter().find(|t| t.name == args.template) {
        Some(t) => t,
        None => {
            eprintln!("Error: unknown template {:?}", args.template);
            eprintln!("Run 'connascence init --list' to see available templates");
            return Ok(EXIT_ERROR);
        }
    };

    // Check if output already exists
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    // Create output directory if needed
    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    // Write config file
    if let Err(e) = std::fs::write(&args.output, template.content) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {} from template '{}'", args.output.display(), template.name);
    println!();
    println!("Next steps:");
    println!("  1. Edit {} to customize for your project", args.output.display());
    if DEFAULT_CONFIG_NAMES.iter().any(|n| args.output == Path::new(n)) {
        println!("  2. Run: connascence analyze .");
    } else {
        println!("  2. Run: connascence analyze . --config {}", args.output.display());
    }

    Ok(EXIT_SUCCESS)
}

/// List available templates.
fn list_templates() -> anyhow::Result<i32> {
    println!("Available templates:");
    println!();

    for template in TEMPLATES {
        let name = if template.name == "default" {
            format!("{} (default)", template.name)
        } else {
            template.name.to_string()
        };
        println!("  {:<20} {}", name, template.description);
    }

    println!();
    println!("Usage:");
    println!("  connascence init --template <name>");

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;

    #[test]
    fn test_templates_are_valid_configs() {
        for template in TEMPLATES {
            let parsed = ConfigurationManager::from_yaml_str(template.content);
            assert!(parsed.is_ok(), "template {} failed: {:?}", template.name, parsed);
        }
    }

    #[test]
    fn test_default_template_matches_defaults() {
        let parsed = ConfigurationManager::from_yaml_str(TEMPLATES[0].content).unwrap();
        let expected = AnalysisConfig {
            excluded_paths: vec!["**/migrations/**".to_string()],
            ..AnalysisConfig::default()
        };
        assert_eq!(parsed, expected);
    }

    #[test]
    fn test_parse_only() {
        let kinds = parse_only(&["position".to_string(), " god_object".to_string()]).unwrap();
        assert_eq!(kinds, vec![DetectorKind::Position, DetectorKind::GodObject]);

        let err = parse_only(&["byzantine".to_string()]).unwrap_err();
        assert!(err.contains("byzantine"));
    }

    #[test]
    fn test_cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "connascence",
            "-v",
            "check",
            "src",
            "--format",
            "json",
            "--only",
            "position,timing",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.path, PathBuf::from("src"));
                assert_eq!(args.format, "json");
                assert_eq!(args.only, vec!["position", "timing"]);
            }
            Commands::Init(_) => panic!("expected analyze"),
        }
    }
}
