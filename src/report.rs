//! Output formatting for analysis results.
//!
//! Supports two output formats:
//! - Pretty: colored terminal output for human readability
//! - JSON: the full [`AnalysisResult`] plus run metadata

use colored::*;
use serde::Serialize;

use crate::detect::{Severity, Violation};
use crate::engine::{AnalysisResult, Diagnostic, DiagnosticKind};
use crate::score::ComplianceScore;

/// JSON report envelope.
#[derive(Serialize)]
pub struct JsonReport<'a> {
    pub version: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<&'a str>,
    pub min_score: f64,
    pub passed: bool,
    #[serde(flatten)]
    pub result: &'a AnalysisResult,
}

/// Render results as pretty-printed JSON.
pub fn render_json(
    result: &AnalysisResult,
    config_path: Option<&str>,
    min_score: f64,
) -> anyhow::Result<String> {
    let report = JsonReport {
        version: env!("CARGO_PKG_VERSION"),
        config: config_path,
        min_score,
        passed: result.score.passes(min_score),
        result,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// Write results in JSON format to stdout.
pub fn write_json(
    result: &AnalysisResult,
    config_path: Option<&str>,
    min_score: f64,
) -> anyhow::Result<()> {
    println!("{}", render_json(result, config_path, min_score)?);
    Ok(())
}

/// Write results in pretty (human-readable) format.
pub fn write_pretty(result: &AnalysisResult, config_path: Option<&str>, min_score: f64) {
    // Header
    println!();
    print!("  ");
    print!("{}", "connascence".cyan().bold());
    println!(" v{}", env!("CARGO_PKG_VERSION"));
    println!();

    print!("  {}", "Scanning: ".dimmed());
    println!("{}", result.root);
    print!("  {}", "Config:   ".dimmed());
    println!("{}", config_path.unwrap_or("(defaults)"));
    print!("  {}", "Files:    ".dimmed());
    println!("{} analyzed of {}", result.files_analyzed(), result.files.len());
    println!();

    write_result_summary(result, min_score);
    println!();

    if !result.violations.is_empty() {
        write_violations(&result.violations);
        println!();
    }

    if !result.diagnostics.is_empty() {
        write_diagnostics(&result.diagnostics);
        println!();
    }

    if result.score.total > 0 {
        write_breakdown(&result.score);
        println!();
    }

    write_final_status(&result.score, min_score);
    println!();
}

fn write_result_summary(result: &AnalysisResult, min_score: f64) {
    if result.score.passes(min_score) {
        print!("  {}", "✓ PASS".green());
    } else {
        print!("  {}", "✗ FAIL".red());
    }

    print!("  Compliance: ");
    write_colored_score(result.score.value);
    print!("  Grade: ");
    write_colored_grade(&result.score.grade);

    if result.suppressed > 0 {
        print!(
            "  {}",
            format!("({} suppressed)", result.suppressed).dimmed()
        );
    }
    if !result.complete {
        print!("  {}", "(incomplete: timed out)".yellow());
    }

    println!();
}

fn write_colored_score(value: f64) {
    let s = format!("{:.2}", value);
    match value {
        v if v >= 0.9 => print!("{}", s.green().bold()),
        v if v >= 0.75 => print!("{}", s.green()),
        v if v >= 0.5 => print!("{}", s.yellow()),
        v if v >= 0.25 => print!("{}", s.yellow().bold()),
        _ => print!("{}", s.red()),
    }
}

fn write_colored_grade(grade: &str) {
    match grade {
        "A" => print!("{}", grade.green().bold()),
        "B" => print!("{}", grade.green()),
        "C" => print!("{}", grade.yellow()),
        "D" => print!("{}", grade.yellow().bold()),
        _ => print!("{}", grade.red()),
    }
}

fn write_violations(violations: &[Violation]) {
    println!("  {} ({}):", "Violations".bold(), violations.len());
    println!();

    for v in violations {
        write_severity_tag(&v.severity);
        print!("   ");
        print!("{:<25}", v.rule.as_str().dimmed());
        print!("{}", v.file.blue());
        print!("{}", format!(":{}:{}", v.line, v.column).dimmed());
        println!();

        // Message on next line, indented
        println!("            {}", v.message);
        if let Some(suggestion) = &v.suggestion {
            println!("            {}", format!("hint: {}", suggestion).dimmed());
        }
        println!();
    }
}

fn write_severity_tag(severity: &Severity) {
    match severity {
        Severity::Critical => print!("    {} ", "CRIT ".red().bold()),
        Severity::High => print!("    {} ", "HIGH ".red()),
        Severity::Medium => print!("    {} ", "MED  ".yellow()),
        Severity::Low => print!("    {} ", "LOW  ".blue()),
        Severity::Info => print!("    {} ", "INFO ".dimmed()),
    }
}

fn write_diagnostics(diagnostics: &[Diagnostic]) {
    println!("  {} ({}):", "Diagnostics".bold(), diagnostics.len());

    for d in diagnostics {
        let tag = match d.kind {
            DiagnosticKind::ParseError => "parse error",
            DiagnosticKind::InternalError => "internal error",
            DiagnosticKind::Timeout => "timeout",
        };
        print!("    {:<16}", tag.yellow());
        print!("{}", d.file.blue());
        if let Some(line) = d.line {
            print!("{}", format!(":{}", line).dimmed());
        }
        if let Some(detector) = d.detector {
            print!(" {}", format!("[{}]", detector).dimmed());
        }
        println!();
        println!("            {}", d.message);
    }
}

fn write_breakdown(score: &ComplianceScore) {
    println!("  {}", "Breakdown:".bold());

    let mut kinds: Vec<_> = score.by_kind.iter().collect();
    kinds.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (kind, count) in kinds {
        let plural = if *count != 1 { "s" } else { "" };
        println!("    {:<20} {:>3} violation{}", kind.as_str(), count, plural);
    }

    let severities: Vec<String> = Severity::ALL
        .iter()
        .rev()
        .filter(|s| score.count(**s) > 0)
        .map(|s| format!("{} {}", score.count(*s), s))
        .collect();
    println!("    {}", severities.join(", ").dimmed());
}

fn write_final_status(score: &ComplianceScore, min_score: f64) {
    print!("  {}", format!("Minimum: {:.2}", min_score).dimmed());
    print!("  Score: ");
    write_colored_score(score.value);
    print!("  ");

    if score.passes(min_score) {
        print!("{}", "PASSED".green());
    } else {
        print!("{}", "FAILED".red());
    }
    println!();
}
