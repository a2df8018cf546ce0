//! Connascence of name: identifiers that drift from the project's naming
//! convention, so every reader has to learn the exceptions.

use regex::Regex;

use crate::analysis::CollectedFacts;
use crate::config::{ConventionConfig, DetectorConfig};
use crate::error::{ConfigError, DetectorError};

use super::{Detector, DetectorKind, RuleId, Severity, Violation};

pub struct ConventionDetector {
    function_pattern: Regex,
    class_pattern: Regex,
}

impl ConventionDetector {
    /// Compile the configured patterns.
    pub fn new(config: &ConventionConfig) -> Result<Self, ConfigError> {
        let compile = |name: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("invalid convention.{} {:?}: {}", name, pattern, e))
            })
        };
        Ok(Self {
            function_pattern: compile("function_pattern", &config.function_pattern)?,
            class_pattern: compile("class_pattern", &config.class_pattern)?,
        })
    }
}

impl Detector for ConventionDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Convention
    }

    fn detect(
        &mut self,
        facts: &CollectedFacts,
        config: &DetectorConfig,
    ) -> Result<Vec<Violation>, DetectorError> {
        let ignored = &config.convention.ignored_names;
        let mut violations = Vec::new();

        for function in &facts.functions {
            // Dunder methods belong to the language, not the project.
            let dunder = function.name.starts_with("__") && function.name.ends_with("__");
            if dunder || ignored.contains(&function.name) {
                continue;
            }
            if !self.function_pattern.is_match(&function.name) {
                violations.push(
                    Violation::new(
                        RuleId::FunctionNaming,
                        Severity::Low,
                        &facts.path,
                        function.location.line,
                        function.location.column,
                        format!(
                            "function name '{}' does not match {}",
                            function.name,
                            self.function_pattern.as_str()
                        ),
                    )
                    .with_suggestion("rename to follow the project convention"),
                );
            }
        }

        for class in &facts.classes {
            if ignored.contains(&class.name) || self.class_pattern.is_match(&class.name) {
                continue;
            }
            violations.push(
                Violation::new(
                    RuleId::ClassNaming,
                    Severity::Low,
                    &facts.path,
                    class.location.line,
                    class.location.column,
                    format!(
                        "class name '{}' does not match {}",
                        class.name,
                        self.class_pattern.as_str()
                    ),
                )
                .with_suggestion("rename to follow the project convention"),
            );
        }

        Ok(violations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ClassFact, FunctionFact, Location};

    fn function(name: &str, line: usize) -> FunctionFact {
        FunctionFact {
            name: name.to_string(),
            class_name: None,
            location: Location { line, column: 1 },
            end_line: line,
            parameter_count: 0,
            positional_count: 0,
            decorators: Vec::new(),
            body_shape: Vec::new(),
        }
    }

    fn class(name: &str, line: usize) -> ClassFact {
        ClassFact {
            name: name.to_string(),
            location: Location { line, column: 1 },
            end_line: line,
            methods: Vec::new(),
            attributes: Default::default(),
        }
    }

    #[test]
    fn test_flags_mismatched_names() {
        let config = DetectorConfig::default();
        let mut detector = ConventionDetector::new(&config.convention).unwrap();

        let mut facts = CollectedFacts::empty("a.py");
        facts.functions = vec![
            function("load_data", 1),
            function("_private", 2),
            function("getData", 3),
            function("__init__", 4),
            function("setUp", 5),
        ];
        facts.classes = vec![class("UserStore", 10), class("user_store", 20)];

        let violations = detector.detect(&facts, &config).unwrap();
        let found: Vec<(RuleId, usize)> = violations.iter().map(|v| (v.rule, v.line)).collect();
        assert_eq!(
            found,
            vec![(RuleId::FunctionNaming, 3), (RuleId::ClassNaming, 20)]
        );
        assert!(violations.iter().all(|v| v.severity == Severity::Low));
    }

    #[test]
    fn test_custom_pattern() {
        let mut config = DetectorConfig::default();
        config.convention.function_pattern = "^[a-z][a-zA-Z0-9]*$".to_string();
        let mut detector = ConventionDetector::new(&config.convention).unwrap();

        let mut facts = CollectedFacts::empty("a.py");
        facts.functions = vec![function("getData", 1), function("load_data", 2)];

        let violations = detector.detect(&facts, &config).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].line, 2);
    }
}
