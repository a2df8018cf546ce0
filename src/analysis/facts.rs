//! Fact structures collected from a single syntax-tree traversal.
//!
//! Facts are plain owned data. Nothing here borrows from the tree, so the
//! tree and its source buffer can be dropped as soon as collection finishes.

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Source location (1-indexed line and column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    /// Location of a tree-sitter node's first byte.
    pub fn from_node(node: tree_sitter::Node) -> Self {
        let start = node.start_position();
        Self {
            line: start.row + 1, // tree-sitter is 0-indexed
            column: start.column + 1,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A function or method definition.
#[derive(Debug, Clone, Serialize)]
pub struct FunctionFact {
    pub name: String,
    /// Owning class for methods (innermost enclosing class).
    pub class_name: Option<String>,
    pub location: Location,
    pub end_line: usize,
    /// Every declared parameter, including `self`, splats and keyword-only ones.
    pub parameter_count: usize,
    /// Parameters a caller must supply by position: excludes the implicit
    /// receiver of methods, `*args`, `**kwargs` and keyword-only parameters.
    pub positional_count: usize,
    pub decorators: Vec<String>,
    /// Grammar kind ids of every node in the body, in traversal order.
    /// Identifiers and literals collapse to their kind, so two bodies that
    /// differ only in naming share a shape.
    pub body_shape: Vec<u16>,
}

impl FunctionFact {
    /// `Class.method` for methods, the bare name otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.class_name {
            Some(class) => format!("{}.{}", class, self.name),
            None => self.name.clone(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.class_name.is_some()
    }

    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.location.line) + 1
    }
}

/// A class definition.
#[derive(Debug, Clone, Serialize)]
pub struct ClassFact {
    pub name: String,
    pub location: Location,
    pub end_line: usize,
    pub methods: Vec<String>,
    /// Distinct attribute names: class-level bindings and `self.x = ...`
    /// assignments inside the class's methods.
    pub attributes: BTreeSet<String>,
}

impl ClassFact {
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.location.line) + 1
    }
}

/// An imported module or symbol.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ImportFact {
    /// Dotted module path (e.g. "os.path").
    pub module: String,
    /// Imported name for `from x import y` forms.
    pub symbol: Option<String>,
    pub alias: Option<String>,
    pub line: usize,
}

impl ImportFact {
    /// The name this import binds in the module namespace.
    pub fn bound_name(&self) -> &str {
        if let Some(alias) = &self.alias {
            return alias;
        }
        match &self.symbol {
            Some(symbol) => symbol,
            None => &self.module,
        }
    }
}

/// A literal constant value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum LiteralValue {
    Int(String),
    Float(String),
    Str(String),
}

impl LiteralValue {
    /// Text used for allow-list comparison: numbers as written, strings by content.
    pub fn key(&self) -> &str {
        match self {
            LiteralValue::Int(s) | LiteralValue::Float(s) | LiteralValue::Str(s) => s,
        }
    }
}

impl fmt::Display for LiteralValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LiteralValue::Int(s) | LiteralValue::Float(s) => write!(f, "{}", s),
            LiteralValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Where a literal appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiteralContext {
    /// Innermost enclosing function, if any.
    pub function: Option<String>,
    /// Innermost enclosing class, if any.
    pub class_name: Option<String>,
    /// The literal is the whole right-hand side of an UPPER_CASE binding,
    /// i.e. it is being given a name.
    pub names_constant: bool,
}

/// A literal occurrence.
#[derive(Debug, Clone, Serialize)]
pub struct LiteralFact {
    pub location: Location,
    pub value: LiteralValue,
    pub context: LiteralContext,
}

/// A call expression.
#[derive(Debug, Clone, Serialize)]
pub struct CallFact {
    /// Dotted callee text (`time.sleep`, `eval`, `self.run`).
    pub callee: String,
    pub location: Location,
    pub positional_args: usize,
    pub keyword_args: usize,
    pub keyword_names: Vec<String>,
    /// The first argument is a plain (non-interpolated) literal.
    pub first_arg_literal: bool,
    pub enclosing_function: Option<String>,
    pub in_with: bool,
    pub in_try: bool,
    pub in_loop: bool,
}

impl CallFact {
    pub fn argument_count(&self) -> usize {
        self.positional_args + self.keyword_args
    }

    /// Last dotted segment of the callee.
    pub fn short_name(&self) -> &str {
        self.callee.rsplit('.').next().unwrap_or(&self.callee)
    }
}

/// Scope a binding lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingScope {
    Module,
    Class,
    Function,
}

/// A simple `NAME = <literal>` binding.
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentFact {
    pub name: String,
    pub scope: BindingScope,
    /// Name of the owning class or function for non-module scopes.
    pub owner: Option<String>,
    pub value: LiteralValue,
    pub location: Location,
}

impl AssignmentFact {
    /// UPPER_CASE names are treated as constants.
    pub fn is_constant(&self) -> bool {
        is_constant_name(&self.name)
    }
}

/// Whether `name` follows the UPPER_CASE constant convention.
pub fn is_constant_name(name: &str) -> bool {
    let mut has_letter = false;
    for c in name.chars() {
        if c.is_ascii_lowercase() {
            return false;
        }
        if c.is_ascii_uppercase() {
            has_letter = true;
        } else if !(c.is_ascii_digit() || c == '_') {
            return false;
        }
    }
    has_letter
}

/// How an inline suppression directive applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionScope {
    Line,
    NextLine,
    File,
}

/// An inline `# connascence:ignore` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suppression {
    /// Rule id, detector kind, or "*".
    pub target: String,
    pub reason: String,
    pub line: usize,
    pub scope: SuppressionScope,
}

/// Everything the detectors know about one file.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedFacts {
    pub path: String,
    pub line_count: usize,
    pub functions: Vec<FunctionFact>,
    pub classes: Vec<ClassFact>,
    pub imports: Vec<ImportFact>,
    pub literals: Vec<LiteralFact>,
    pub calls: Vec<CallFact>,
    pub assignments: Vec<AssignmentFact>,
    pub suppressions: Vec<Suppression>,
    /// Nodes visited while collecting.
    pub node_count: usize,
}

impl CollectedFacts {
    /// Create empty facts for a file.
    pub fn empty(path: &str) -> Self {
        Self {
            path: path.to_string(),
            line_count: 0,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            literals: Vec::new(),
            calls: Vec::new(),
            assignments: Vec::new(),
            suppressions: Vec::new(),
            node_count: 0,
        }
    }

    /// Find a function by name.
    pub fn find_function(&self, name: &str) -> Option<&FunctionFact> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Find a class by name.
    pub fn find_class(&self, name: &str) -> Option<&ClassFact> {
        self.classes.iter().find(|c| c.name == name)
    }

    /// Resolve a callee through import aliases so `from time import sleep as nap`
    /// followed by `nap(1)` resolves to `time.sleep`.
    pub fn resolve_callee(&self, callee: &str) -> String {
        let (head, rest) = match callee.split_once('.') {
            Some((h, r)) => (h, Some(r)),
            None => (callee, None),
        };

        for import in &self.imports {
            if import.bound_name() != head {
                continue;
            }
            let base = match &import.symbol {
                Some(symbol) => format!("{}.{}", import.module, symbol),
                None => import.module.clone(),
            };
            return match rest {
                Some(r) => format!("{}.{}", base, r),
                None => base,
            };
        }

        callee.to_string()
    }
}
