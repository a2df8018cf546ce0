//! Source discovery and parsing.
//!
//! [`SourceIngestor::discover`] walks a project lazily and yields candidate
//! files; [`SourceIngestor::load`] reads and parses one candidate. A file that
//! cannot be read or contains a syntax error fails on its own with a
//! [`ParseError`] and never aborts the run.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use globset::GlobSet;
use once_cell::sync::Lazy;
use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::config::AnalysisConfig;
use crate::error::ParseError;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[
    "__pycache__",
    "node_modules",
    "venv",
    "site-packages",
    "build",
    "dist",
];

static ERROR_QUERY: Lazy<Option<Query>> =
    Lazy::new(|| Query::new(&python_language(), "(ERROR) @error").ok());

thread_local! {
    // tree_sitter::Parser is not Sync; each worker keeps its own.
    static PARSER: RefCell<Option<Parser>> = const { RefCell::new(None) };
}

/// The tree-sitter grammar for Python.
pub fn python_language() -> Language {
    tree_sitter_python::LANGUAGE.into()
}

/// A file found by discovery, not yet read.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceCandidate {
    /// Absolute (or caller-supplied) filesystem path.
    pub path: PathBuf,
    /// Path relative to the analysis root, used in every report.
    pub display: String,
}

/// A parsed source file. Lives only while its facts are collected.
pub struct SourceFile {
    pub path: String,
    pub text: String,
    pub tree: Tree,
    pub line_count: usize,
}

impl SourceFile {
    /// Parse in-memory source text.
    pub fn parse(path: &str, text: String) -> Result<Self, ParseError> {
        let tree = parse_python(&text).map_err(|e| ParseError::new(path, e))?;

        if tree.root_node().has_error() {
            let (node, what) = first_syntax_error(&tree, text.as_bytes());
            let start = node.start_position();
            return Err(ParseError::new(path, format!("syntax error: {}", what))
                .at(start.row + 1, start.column + 1));
        }

        let line_count = text.lines().count();
        Ok(Self {
            path: path.to_string(),
            text,
            tree,
            line_count,
        })
    }

    /// Get the source code as bytes.
    pub fn source(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Get text for a tree-sitter node.
    pub fn node_text(&self, node: Node) -> &str {
        node.utf8_text(self.text.as_bytes()).unwrap_or("")
    }
}

fn parse_python(source: &str) -> Result<Tree, String> {
    PARSER.with(|cell| {
        let mut slot = cell.borrow_mut();
        if slot.is_none() {
            let mut parser = Parser::new();
            parser
                .set_language(&python_language())
                .map_err(|e| format!("loading Python grammar: {}", e))?;
            *slot = Some(parser);
        }
        let Some(parser) = slot.as_mut() else {
            return Err("parser unavailable".to_string());
        };
        match parser.parse(source, None) {
            Some(tree) => Ok(tree),
            None => {
                parser.reset();
                Err("failed to parse Python source".to_string())
            }
        }
    })
}

/// Locate the first ERROR or MISSING node of a tree that reports errors.
fn first_syntax_error<'t>(tree: &'t Tree, source: &[u8]) -> (Node<'t>, String) {
    let root = tree.root_node();

    if let Some(query) = ERROR_QUERY.as_ref() {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, root, source);
        if let Some(m) = matches.next() {
            if let Some(capture) = m.captures.first() {
                let node = capture.node;
                let snippet = node
                    .utf8_text(source)
                    .unwrap_or("")
                    .lines()
                    .next()
                    .unwrap_or("")
                    .trim()
                    .chars()
                    .take(40)
                    .collect::<String>();
                return (node, format!("unexpected {:?}", snippet));
            }
        }
    }

    // No ERROR node: descend along erroneous children to the MISSING one.
    let mut node = root;
    'descend: loop {
        if node.is_missing() {
            return (node, format!("missing {}", node.kind()));
        }
        let mut walker = node.walk();
        for child in node.children(&mut walker) {
            if child.has_error() {
                node = child;
                continue 'descend;
            }
        }
        return (node, "invalid syntax".to_string());
    }
}

/// Resolves project paths to source files and parses them.
pub struct SourceIngestor {
    extensions: Vec<String>,
    excluded: GlobSet,
}

impl SourceIngestor {
    pub fn new(config: &AnalysisConfig) -> Self {
        Self {
            extensions: config.extensions.clone(),
            excluded: config.exclusion_set(),
        }
    }

    /// Lazily enumerate analyzable files under `root`.
    ///
    /// Each call rescans the filesystem. Entries are yielded in file-name order.
    pub fn discover(&self, root: &Path) -> Discovery<'_> {
        Discovery {
            root: root.to_path_buf(),
            walker: walkdir::WalkDir::new(root)
                .sort_by_file_name()
                .into_iter(),
            ingestor: self,
        }
    }

    /// Candidates for an explicit file list, displayed relative to `root`.
    pub fn explicit(&self, root: &Path, files: &[PathBuf]) -> Vec<SourceCandidate> {
        files
            .iter()
            .map(|p| {
                let path = if p.is_absolute() { p.clone() } else { root.join(p) };
                let display = display_path(root, &path);
                SourceCandidate { path, display }
            })
            .collect()
    }

    /// Read and parse a candidate.
    pub fn load(&self, candidate: &SourceCandidate) -> Result<SourceFile, ParseError> {
        let bytes = fs::read(&candidate.path).map_err(|e| {
            ParseError::new(&candidate.display, format!("cannot read file: {}", e))
        })?;
        let text = String::from_utf8(bytes).map_err(|e| {
            ParseError::new(
                &candidate.display,
                format!("file is not valid UTF-8: {}", e.utf8_error()),
            )
        })?;
        SourceFile::parse(&candidate.display, text)
    }

    fn wants_file(&self, path: &Path, rel: &Path) -> bool {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        self.extensions.iter().any(|e| e == ext) && !self.excluded.is_match(rel)
    }

    fn skips_dir(&self, name: &str, rel: &Path) -> bool {
        (name.starts_with('.') && name != "." && name != "..")
            || SKIPPED_DIRS.contains(&name)
            || self.excluded.is_match(rel)
    }
}

/// Lazy, finite walk over a project tree.
pub struct Discovery<'a> {
    root: PathBuf,
    walker: walkdir::IntoIter,
    ingestor: &'a SourceIngestor,
}

impl Iterator for Discovery<'_> {
    type Item = SourceCandidate;

    fn next(&mut self) -> Option<SourceCandidate> {
        loop {
            let entry = match self.walker.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let path = entry.path();
            let rel = path.strip_prefix(&self.root).unwrap_or(path);

            if entry.file_type().is_dir() {
                let name = entry.file_name().to_string_lossy();
                if entry.depth() > 0 && self.ingestor.skips_dir(&name, rel) {
                    self.walker.skip_current_dir();
                }
                continue;
            }

            if !entry.file_type().is_file() || !self.ingestor.wants_file(path, rel) {
                continue;
            }

            let display = display_path(&self.root, path);
            return Some(SourceCandidate {
                path: entry.into_path(),
                display,
            });
        }
    }
}

/// Path relative to `root` with forward slashes; the file name when `root`
/// is the file itself.
fn display_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = if rel.as_os_str().is_empty() {
        path.file_name().map(Path::new).unwrap_or(path)
    } else {
        rel
    };
    rel.to_string_lossy().replace('\\', "/")
}
