//! Single-pass fact collection.
//!
//! The tree is walked exactly once with a [`tree_sitter::TreeCursor`]. Every
//! detector reads the resulting [`CollectedFacts`]; none of them touches the
//! tree, so enabling more detectors never adds a traversal.

use once_cell::sync::Lazy;
use regex::Regex;
use tree_sitter::Node;

use super::facts::{
    is_constant_name, AssignmentFact, BindingScope, CallFact, ClassFact, CollectedFacts,
    FunctionFact, ImportFact, LiteralContext, LiteralFact, LiteralValue, Location, Suppression,
    SuppressionScope,
};
use crate::ingest::SourceFile;

/// `# connascence:ignore[-next-line|-file] <target> [- reason]`
static SUPPRESSION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#\s*connascence:(ignore(?:-file|-next-line)?)\s+(\S+)\s*(?:-\s*(.*))?$")
        .expect("suppression pattern is valid")
});

/// File-level directives only count near the top of a file.
const FILE_DIRECTIVE_MAX_LINE: usize = 10;

#[derive(Debug, Clone, Copy)]
enum FrameKind {
    Function {
        index: usize,
        class: Option<usize>,
        body: (usize, usize),
    },
    Class {
        index: usize,
    },
    With,
    Try,
    Loop,
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    node_id: usize,
    kind: FrameKind,
}

/// Walks one syntax tree and records everything the detectors need.
pub struct UnifiedTreeCollector<'a> {
    source: &'a str,
    facts: CollectedFacts,
    stack: Vec<Frame>,
}

impl<'a> UnifiedTreeCollector<'a> {
    /// Collect facts from a parsed file in one traversal.
    pub fn collect(file: &'a SourceFile) -> CollectedFacts {
        let mut collector = UnifiedTreeCollector {
            source: &file.text,
            facts: CollectedFacts::empty(&file.path),
            stack: Vec::new(),
        };
        collector.facts.line_count = file.line_count;

        let mut cursor = file.tree.walk();
        'walk: loop {
            let node = cursor.node();
            collector.enter(node);
            if cursor.goto_first_child() {
                continue;
            }
            collector.leave(node);

            loop {
                if cursor.goto_next_sibling() {
                    continue 'walk;
                }
                if !cursor.goto_parent() {
                    break 'walk;
                }
                collector.leave(cursor.node());
            }
        }

        tracing::trace!(
            file = %collector.facts.path,
            nodes = collector.facts.node_count,
            functions = collector.facts.functions.len(),
            classes = collector.facts.classes.len(),
            "facts collected"
        );
        collector.facts
    }

    fn enter(&mut self, node: Node<'a>) {
        self.facts.node_count += 1;

        if node.is_named() && node.kind() != "comment" {
            self.extend_body_shapes(node);
        }

        match node.kind() {
            "function_definition" => self.enter_function(node),
            "class_definition" => self.enter_class(node),
            "with_statement" => self.push(node, FrameKind::With),
            "try_statement" => self.push(node, FrameKind::Try),
            "for_statement" | "while_statement" => self.push(node, FrameKind::Loop),
            "import_statement" => self.collect_import(node),
            "import_from_statement" => self.collect_from_import(node),
            "integer" | "float" => self.collect_number(node),
            "string" => self.collect_string(node),
            "call" => self.collect_call(node),
            "assignment" | "augmented_assignment" => self.collect_assignment(node),
            "comment" => self.collect_comment(node),
            _ => {}
        }
    }

    fn leave(&mut self, node: Node<'a>) {
        if self.stack.last().map(|f| f.node_id) == Some(node.id()) {
            self.stack.pop();
        }
    }

    fn push(&mut self, node: Node<'a>, kind: FrameKind) {
        self.stack.push(Frame {
            node_id: node.id(),
            kind,
        });
    }

    fn text(&self, node: Node<'a>) -> &'a str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Innermost enclosing function or class frame.
    fn innermost_scope(&self) -> Option<FrameKind> {
        self.stack
            .iter()
            .rev()
            .map(|f| f.kind)
            .find(|k| matches!(k, FrameKind::Function { .. } | FrameKind::Class { .. }))
    }

    fn enclosing_function(&self) -> Option<String> {
        self.stack.iter().rev().find_map(|f| match f.kind {
            FrameKind::Function { index, .. } => Some(self.facts.functions[index].name.clone()),
            _ => None,
        })
    }

    fn enclosing_class(&self) -> Option<String> {
        self.stack.iter().rev().find_map(|f| match f.kind {
            FrameKind::Class { index } => Some(self.facts.classes[index].name.clone()),
            _ => None,
        })
    }

    fn extend_body_shapes(&mut self, node: Node<'a>) {
        let (start, end) = (node.start_byte(), node.end_byte());
        for frame in &self.stack {
            if let FrameKind::Function { index, body, .. } = frame.kind {
                if start >= body.0 && end <= body.1 {
                    self.facts.functions[index].body_shape.push(node.kind_id());
                }
            }
        }
    }

    fn enter_function(&mut self, node: Node<'a>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();

        let class = match self.innermost_scope() {
            Some(FrameKind::Class { index }) => Some(index),
            _ => None,
        };
        let class_name = class.map(|i| self.facts.classes[i].name.clone());
        let decorators = self.decorators(node);

        let takes_receiver =
            class.is_some() && !decorators.iter().any(|d| d == "staticmethod");
        let (parameter_count, positional_count) = match node.child_by_field_name("parameters") {
            Some(params) => self.count_parameters(params, takes_receiver),
            None => (0, 0),
        };

        let body = node
            .child_by_field_name("body")
            .map(|b| (b.start_byte(), b.end_byte()))
            .unwrap_or((0, 0));

        let index = self.facts.functions.len();
        if let Some(c) = class {
            self.facts.classes[c].methods.push(name.clone());
        }
        self.facts.functions.push(FunctionFact {
            name,
            class_name,
            location: Location::from_node(node),
            end_line: node.end_position().row + 1,
            parameter_count,
            positional_count,
            decorators,
            body_shape: Vec::new(),
        });
        self.push(node, FrameKind::Function { index, class, body });
    }

    /// Decorator names without the `@` or call arguments.
    fn decorators(&self, function: Node<'a>) -> Vec<String> {
        let Some(parent) = function.parent() else {
            return Vec::new();
        };
        if parent.kind() != "decorated_definition" {
            return Vec::new();
        }

        let mut cursor = parent.walk();
        parent
            .named_children(&mut cursor)
            .filter(|c| c.kind() == "decorator")
            .map(|d| {
                let text = self.text(d).trim_start_matches('@').trim();
                text.split('(').next().unwrap_or(text).trim().to_string()
            })
            .collect()
    }

    /// Returns (all declared parameters, positional parameters).
    fn count_parameters(&self, params: Node<'a>, takes_receiver: bool) -> (usize, usize) {
        let mut total = 0;
        let mut keyword_only = false;
        let mut positional: Vec<&str> = Vec::new();

        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            match param.kind() {
                "keyword_separator" => keyword_only = true,
                "positional_separator" | "comment" => {}
                "list_splat_pattern" => {
                    total += 1;
                    keyword_only = true;
                }
                "dictionary_splat_pattern" => total += 1,
                "typed_parameter" if is_splat(param) => {
                    total += 1;
                    if param.named_child(0).map(|c| c.kind()) == Some("list_splat_pattern") {
                        keyword_only = true;
                    }
                }
                _ => {
                    total += 1;
                    if !keyword_only {
                        positional.push(self.parameter_name(param).unwrap_or(""));
                    }
                }
            }
        }

        let mut positional_count = positional.len();
        if takes_receiver && matches!(positional.first(), Some(&"self") | Some(&"cls")) {
            positional_count -= 1;
        }
        (total, positional_count)
    }

    fn parameter_name(&self, param: Node<'a>) -> Option<&'a str> {
        match param.kind() {
            "identifier" => Some(self.text(param)),
            "default_parameter" | "typed_default_parameter" => {
                param.child_by_field_name("name").map(|n| self.text(n))
            }
            "typed_parameter" => param
                .named_child(0)
                .filter(|c| c.kind() == "identifier")
                .map(|n| self.text(n)),
            _ => None,
        }
    }

    fn enter_class(&mut self, node: Node<'a>) {
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();

        let index = self.facts.classes.len();
        self.facts.classes.push(ClassFact {
            name,
            location: Location::from_node(node),
            end_line: node.end_position().row + 1,
            methods: Vec::new(),
            attributes: Default::default(),
        });
        self.push(node, FrameKind::Class { index });
    }

    fn collect_import(&mut self, node: Node<'a>) {
        let line = node.start_position().row + 1;
        let mut cursor = node.walk();
        let names: Vec<Node<'a>> = node.children_by_field_name("name", &mut cursor).collect();

        for name in names {
            let (module, alias) = self.import_name(name);
            self.facts.imports.push(ImportFact {
                module,
                symbol: None,
                alias,
                line,
            });
        }
    }

    fn collect_from_import(&mut self, node: Node<'a>) {
        let line = node.start_position().row + 1;
        let module = node
            .child_by_field_name("module_name")
            .map(|n| self.text(n).to_string())
            .unwrap_or_default();

        let mut cursor = node.walk();
        let names: Vec<Node<'a>> = node.children_by_field_name("name", &mut cursor).collect();
        let wildcard = node
            .named_children(&mut node.walk())
            .any(|c| c.kind() == "wildcard_import");

        if wildcard {
            self.facts.imports.push(ImportFact {
                module: module.clone(),
                symbol: Some("*".to_string()),
                alias: None,
                line,
            });
        }
        for name in names {
            let (symbol, alias) = self.import_name(name);
            self.facts.imports.push(ImportFact {
                module: module.clone(),
                symbol: Some(symbol),
                alias,
                line,
            });
        }
    }

    fn import_name(&self, node: Node<'a>) -> (String, Option<String>) {
        if node.kind() == "aliased_import" {
            let name = node
                .child_by_field_name("name")
                .map(|n| self.text(n).to_string())
                .unwrap_or_default();
            let alias = node
                .child_by_field_name("alias")
                .map(|n| self.text(n).to_string());
            (name, alias)
        } else {
            (self.text(node).to_string(), None)
        }
    }

    /// Numbers, with a leading unary minus folded in.
    fn number_value(&self, node: Node<'a>) -> Option<LiteralValue> {
        match node.kind() {
            "integer" => Some(LiteralValue::Int(self.text(node).to_string())),
            "float" => Some(LiteralValue::Float(self.text(node).to_string())),
            "unary_operator" => {
                let operator = node.child_by_field_name("operator").map(|o| self.text(o));
                let argument = node.child_by_field_name("argument")?;
                if operator != Some("-") {
                    return None;
                }
                match self.number_value(argument)? {
                    LiteralValue::Int(s) => Some(LiteralValue::Int(format!("-{}", s))),
                    LiteralValue::Float(s) => Some(LiteralValue::Float(format!("-{}", s))),
                    LiteralValue::Str(_) => None,
                }
            }
            _ => None,
        }
    }

    /// Content of a plain string; `None` for f-strings.
    fn string_value(&self, node: Node<'a>) -> Option<String> {
        if node.kind() != "string" {
            return None;
        }

        let mut content = String::new();
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            match child.kind() {
                "interpolation" => return None,
                "string_start" => {
                    if self.text(child).to_ascii_lowercase().contains('f') {
                        return None;
                    }
                }
                "string_content" | "escape_sequence" => content.push_str(self.text(child)),
                _ => {}
            }
        }
        Some(content)
    }

    fn literal_value(&self, node: Node<'a>) -> Option<LiteralValue> {
        self.number_value(node)
            .or_else(|| self.string_value(node).map(LiteralValue::Str))
    }

    fn collect_number(&mut self, node: Node<'a>) {
        let anchor = match node.parent() {
            Some(parent)
                if parent.kind() == "unary_operator"
                    && parent.child_by_field_name("operator").map(|o| self.text(o))
                        == Some("-") =>
            {
                parent
            }
            _ => node,
        };
        if let Some(value) = self.number_value(anchor) {
            self.push_literal(anchor, value);
        }
    }

    fn collect_string(&mut self, node: Node<'a>) {
        // Docstrings and other bare string statements carry no coupling.
        if matches!(
            node.parent().map(|p| p.kind()),
            Some("expression_statement") | Some("concatenated_string")
        ) {
            return;
        }
        if let Some(content) = self.string_value(node) {
            self.push_literal(node, LiteralValue::Str(content));
        }
    }

    fn push_literal(&mut self, anchor: Node<'a>, value: LiteralValue) {
        let names_constant = anchor.parent().is_some_and(|parent| {
            parent.kind() == "assignment"
                && parent.child_by_field_name("right").map(|r| r.id()) == Some(anchor.id())
                && parent
                    .child_by_field_name("left")
                    .is_some_and(|l| l.kind() == "identifier" && is_constant_name(self.text(l)))
        });

        self.facts.literals.push(LiteralFact {
            location: Location::from_node(anchor),
            value,
            context: LiteralContext {
                function: self.enclosing_function(),
                class_name: self.enclosing_class(),
                names_constant,
            },
        });
    }

    fn collect_call(&mut self, node: Node<'a>) {
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        if !matches!(function.kind(), "identifier" | "attribute") {
            return;
        }
        let callee: String = self.text(function).split_whitespace().collect();

        let mut positional_args = 0;
        let mut keyword_args = 0;
        let mut keyword_names = Vec::new();
        let mut first_arg_literal = false;

        if let Some(arguments) = node.child_by_field_name("arguments") {
            if arguments.kind() == "argument_list" {
                let mut cursor = arguments.walk();
                for arg in arguments.named_children(&mut cursor) {
                    match arg.kind() {
                        "comment" => {}
                        "keyword_argument" => {
                            keyword_args += 1;
                            if let Some(name) = arg.child_by_field_name("name") {
                                keyword_names.push(self.text(name).to_string());
                            }
                        }
                        "dictionary_splat" => keyword_args += 1,
                        _ => {
                            if positional_args == 0 {
                                first_arg_literal = self.is_plain_literal(arg);
                            }
                            positional_args += 1;
                        }
                    }
                }
            } else {
                // Bare generator argument: `sum(x for x in xs)`
                positional_args = 1;
            }
        }

        let (in_with, in_try, in_loop) = self.control_context();
        self.facts.calls.push(CallFact {
            callee,
            location: Location::from_node(node),
            positional_args,
            keyword_args,
            keyword_names,
            first_arg_literal,
            enclosing_function: self.enclosing_function(),
            in_with,
            in_try,
            in_loop,
        });
    }

    fn is_plain_literal(&self, node: Node<'a>) -> bool {
        match node.kind() {
            "true" | "false" | "none" => true,
            "concatenated_string" => node
                .named_children(&mut node.walk())
                .all(|c| self.string_value(c).is_some()),
            _ => self.literal_value(node).is_some(),
        }
    }

    /// (inside `with`, inside `try`, inside a loop), stopping at the
    /// innermost function or class boundary.
    fn control_context(&self) -> (bool, bool, bool) {
        let mut context = (false, false, false);
        for frame in self.stack.iter().rev() {
            match frame.kind {
                FrameKind::Function { .. } | FrameKind::Class { .. } => break,
                FrameKind::With => context.0 = true,
                FrameKind::Try => context.1 = true,
                FrameKind::Loop => context.2 = true,
            }
        }
        context
    }

    fn collect_assignment(&mut self, node: Node<'a>) {
        let Some(left) = node.child_by_field_name("left") else {
            return;
        };
        self.record_attribute_targets(left);

        if node.kind() != "assignment" || left.kind() != "identifier" {
            return;
        }
        let Some(value) = node
            .child_by_field_name("right")
            .and_then(|r| self.literal_value(r))
        else {
            return;
        };

        let (scope, owner) = match self.innermost_scope() {
            Some(FrameKind::Class { index }) => (
                BindingScope::Class,
                Some(self.facts.classes[index].name.clone()),
            ),
            Some(FrameKind::Function { index, .. }) => (
                BindingScope::Function,
                Some(self.facts.functions[index].name.clone()),
            ),
            _ => (BindingScope::Module, None),
        };

        self.facts.assignments.push(AssignmentFact {
            name: self.text(left).to_string(),
            scope,
            owner,
            value,
            location: Location::from_node(node),
        });
    }

    /// Class attributes: bare names bound in a class body and `self.x`
    /// targets inside its methods.
    fn record_attribute_targets(&mut self, target: Node<'a>) {
        match target.kind() {
            "identifier" => {
                if let Some(FrameKind::Class { index }) = self.innermost_scope() {
                    let name = self.text(target).to_string();
                    self.facts.classes[index].attributes.insert(name);
                }
            }
            "attribute" => {
                let Some(FrameKind::Function {
                    class: Some(class), ..
                }) = self.innermost_scope()
                else {
                    return;
                };
                let is_self = target
                    .child_by_field_name("object")
                    .is_some_and(|o| o.kind() == "identifier" && self.text(o) == "self");
                if let (true, Some(attr)) = (is_self, target.child_by_field_name("attribute")) {
                    let name = self.text(attr).to_string();
                    self.facts.classes[class].attributes.insert(name);
                }
            }
            "pattern_list" | "tuple_pattern" | "list_pattern" => {
                let mut cursor = target.walk();
                let parts: Vec<Node<'a>> = target.named_children(&mut cursor).collect();
                for part in parts {
                    self.record_attribute_targets(part);
                }
            }
            _ => {}
        }
    }

    fn collect_comment(&mut self, node: Node<'a>) {
        let text = self.text(node).trim_end();
        let Some(caps) = SUPPRESSION_PATTERN.captures(text) else {
            return;
        };

        let line = node.start_position().row + 1;
        let directive = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let target = caps.get(2).map(|m| m.as_str()).unwrap_or("*").to_string();
        let reason = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let start = node.start_byte();
        let line_start = self.source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let standalone = self.source[line_start..start].trim().is_empty();

        let scope = match directive {
            "ignore-file" if line <= FILE_DIRECTIVE_MAX_LINE => SuppressionScope::File,
            "ignore-file" => return,
            "ignore-next-line" => SuppressionScope::NextLine,
            _ if standalone => SuppressionScope::NextLine,
            _ => SuppressionScope::Line,
        };

        self.facts.suppressions.push(Suppression {
            target,
            reason,
            line,
            scope,
        });
    }
}

fn is_splat(param: Node) -> bool {
    matches!(
        param.named_child(0).map(|c| c.kind()),
        Some("list_splat_pattern") | Some("dictionary_splat_pattern")
    )
}
