//! Core types for detection results.

use serde::{Deserialize, Serialize};

/// Severity levels for violations, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All severities, least severe first.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// The connascence category a detector is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    Position,
    MagicLiteral,
    Algorithm,
    GodObject,
    Timing,
    Convention,
    Values,
    Execution,
}

impl DetectorKind {
    /// Every detector kind, in evaluation order.
    pub const ALL: [DetectorKind; 8] = [
        DetectorKind::Position,
        DetectorKind::MagicLiteral,
        DetectorKind::Algorithm,
        DetectorKind::GodObject,
        DetectorKind::Timing,
        DetectorKind::Convention,
        DetectorKind::Values,
        DetectorKind::Execution,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorKind::Position => "position",
            DetectorKind::MagicLiteral => "magic_literal",
            DetectorKind::Algorithm => "algorithm",
            DetectorKind::GodObject => "god_object",
            DetectorKind::Timing => "timing",
            DetectorKind::Convention => "convention",
            DetectorKind::Values => "values",
            DetectorKind::Execution => "execution",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        DetectorKind::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stable rule identifiers carried by every violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RuleId {
    #[serde(rename = "CON_POSITION")]
    Position,
    #[serde(rename = "CON_MAGIC_LITERAL")]
    MagicLiteral,
    #[serde(rename = "CON_ALGORITHM")]
    Algorithm,
    #[serde(rename = "CON_GOD_OBJECT")]
    GodObject,
    #[serde(rename = "CON_TIMING")]
    Timing,
    #[serde(rename = "CON_NAMING_FUNCTION")]
    FunctionNaming,
    #[serde(rename = "CON_NAMING_CLASS")]
    ClassNaming,
    #[serde(rename = "CON_VALUES_INCONSISTENT")]
    InconsistentValue,
    #[serde(rename = "CON_VALUES_DUPLICATE")]
    DuplicateValue,
    #[serde(rename = "CON_EXECUTION")]
    DynamicExecution,
}

impl RuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleId::Position => "CON_POSITION",
            RuleId::MagicLiteral => "CON_MAGIC_LITERAL",
            RuleId::Algorithm => "CON_ALGORITHM",
            RuleId::GodObject => "CON_GOD_OBJECT",
            RuleId::Timing => "CON_TIMING",
            RuleId::FunctionNaming => "CON_NAMING_FUNCTION",
            RuleId::ClassNaming => "CON_NAMING_CLASS",
            RuleId::InconsistentValue => "CON_VALUES_INCONSISTENT",
            RuleId::DuplicateValue => "CON_VALUES_DUPLICATE",
            RuleId::DynamicExecution => "CON_EXECUTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CON_POSITION" => Some(RuleId::Position),
            "CON_MAGIC_LITERAL" => Some(RuleId::MagicLiteral),
            "CON_ALGORITHM" => Some(RuleId::Algorithm),
            "CON_GOD_OBJECT" => Some(RuleId::GodObject),
            "CON_TIMING" => Some(RuleId::Timing),
            "CON_NAMING_FUNCTION" => Some(RuleId::FunctionNaming),
            "CON_NAMING_CLASS" => Some(RuleId::ClassNaming),
            "CON_VALUES_INCONSISTENT" => Some(RuleId::InconsistentValue),
            "CON_VALUES_DUPLICATE" => Some(RuleId::DuplicateValue),
            "CON_EXECUTION" => Some(RuleId::DynamicExecution),
            _ => None,
        }
    }

    /// The detector kind that owns this rule.
    pub fn kind(&self) -> DetectorKind {
        match self {
            RuleId::Position => DetectorKind::Position,
            RuleId::MagicLiteral => DetectorKind::MagicLiteral,
            RuleId::Algorithm => DetectorKind::Algorithm,
            RuleId::GodObject => DetectorKind::GodObject,
            RuleId::Timing => DetectorKind::Timing,
            RuleId::FunctionNaming | RuleId::ClassNaming => DetectorKind::Convention,
            RuleId::InconsistentValue | RuleId::DuplicateValue => DetectorKind::Values,
            RuleId::DynamicExecution => DetectorKind::Execution,
        }
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single detected coupling issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub kind: DetectorKind,
    pub rule: RuleId,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Violation {
    /// Create a violation; the kind is derived from the rule.
    pub fn new(
        rule: RuleId,
        severity: Severity,
        file: &str,
        line: usize,
        column: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: rule.kind(),
            rule,
            severity,
            file: file.to_string(),
            line,
            column,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Identity used for deduplication: two violations are the same finding
    /// when they share file, line and rule.
    pub fn dedup_key(&self) -> (String, usize, RuleId) {
        (self.file.clone(), self.line, self.rule)
    }
}
