//! Symbol extraction: functions and classes per source file.
//!
//! Extraction follows the language's [`Strategy`]:
//!
//! - **Parsed** (Python): the file is parsed with tree-sitter and every
//!   `function_definition` / `class_definition` node yields a symbol at its
//!   `def`/`class` line. A file with syntax errors yields no symbols at all.
//! - **Pattern** (JavaScript/TypeScript): each trimmed line is matched against
//!   declaration patterns (`function`, `class`, const-bound arrow and function
//!   expressions). Declarations split across lines are missed and similarly
//!   shaped statements can match; this is the accepted trade-off without a
//!   grammar.
//! - **Unsupported**: no symbols.
//!
//! Extraction never fails: problems are logged and produce an empty result so
//! one bad file cannot abort a batch.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::lang::{Language, Strategy};

/// A code symbol extracted from a source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub language: Language,
    /// Workspace-relative file path.
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
}

/// Kind of code symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Function,
    Class,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKind::Function => write!(f, "function"),
            SymbolKind::Class => write!(f, "class"),
        }
    }
}

impl FromStr for SymbolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "function" => Ok(SymbolKind::Function),
            "class" => Ok(SymbolKind::Class),
            other => Err(format!(
                "unknown symbol kind {other:?}, expected \"function\" or \"class\""
            )),
        }
    }
}

/// Filter for symbol queries. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SymbolQuery {
    pub kind: Option<SymbolKind>,
    /// Case-insensitive substring of the symbol name.
    pub name: Option<String>,
    pub language: Option<Language>,
}

impl SymbolQuery {
    fn matches(&self, symbol: &Symbol, name_lower: Option<&str>) -> bool {
        self.kind.is_none_or(|k| k == symbol.kind)
            && self.language.as_ref().is_none_or(|l| *l == symbol.language)
            && name_lower.is_none_or(|n| symbol.name.to_lowercase().contains(n))
    }
}

/// An immutable table of symbols from one indexing run.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    /// Flat list of all symbols, in indexing order.
    all: Vec<Symbol>,
    /// Indices into `all`, keyed by file path.
    by_file: HashMap<String, Vec<usize>>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the symbols of one file.
    pub fn insert_file(&mut self, symbols: Vec<Symbol>) {
        for symbol in symbols {
            self.by_file
                .entry(symbol.file.clone())
                .or_default()
                .push(self.all.len());
            self.all.push(symbol);
        }
    }

    /// Symbols matching `query`, in indexing order.
    pub fn search(&self, query: &SymbolQuery) -> Vec<&Symbol> {
        let name_lower = query.name.as_ref().map(|n| n.to_lowercase());
        self.all
            .iter()
            .filter(|s| query.matches(s, name_lower.as_deref()))
            .collect()
    }

    /// Symbols in a specific file.
    pub fn in_file(&self, file: &str) -> Vec<&Symbol> {
        self.by_file
            .get(file)
            .map(|idx| idx.iter().map(|&i| &self.all[i]).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Number of files that contributed at least one symbol.
    pub fn file_count(&self) -> usize {
        self.by_file.len()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.all
    }

    /// One-line summary per kind, used in logs.
    pub fn summary(&self) -> String {
        let mut by_kind: HashMap<SymbolKind, usize> = HashMap::new();
        for sym in &self.all {
            *by_kind.entry(sym.kind).or_default() += 1;
        }
        let functions = by_kind.get(&SymbolKind::Function).copied().unwrap_or(0);
        let classes = by_kind.get(&SymbolKind::Class).copied().unwrap_or(0);
        format!(
            "{} symbols in {} files ({functions} functions, {classes} classes)",
            self.len(),
            self.file_count()
        )
    }
}

/// Extract symbols from one file's content.
pub fn extract_symbols(file: &str, content: &str, language: &Language) -> Vec<Symbol> {
    match language.strategy() {
        Strategy::Parsed => extract_python_symbols(file, content),
        Strategy::Pattern => extract_pattern_symbols(file, content, language),
        Strategy::Unsupported => Vec::new(),
    }
}

// ── Parser-backed extraction ────────────────────────────────────────────

/// Parse Python with tree-sitter and collect definitions in document order.
fn extract_python_symbols(file: &str, content: &str) -> Vec<Symbol> {
    let mut parser = tree_sitter::Parser::new();
    if let Err(e) = parser.set_language(&tree_sitter_python::LANGUAGE.into()) {
        debug!(file, error = %e, "parse_soft_failure: grammar unavailable");
        return Vec::new();
    }
    let Some(tree) = parser.parse(content, None) else {
        debug!(file, "parse_soft_failure: parser returned no tree");
        return Vec::new();
    };
    let root = tree.root_node();
    if root.has_error() {
        debug!(file, "parse_soft_failure: syntax error, skipping file");
        return Vec::new();
    }

    let source = content.as_bytes();
    let mut symbols = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kind = match node.kind() {
            "function_definition" => Some(SymbolKind::Function),
            "class_definition" => Some(SymbolKind::Class),
            _ => None,
        };
        if let Some(kind) = kind
            && let Some(name) = node
                .child_by_field_name("name")
                .and_then(|n| n.utf8_text(source).ok())
        {
            symbols.push(Symbol {
                name: name.to_string(),
                kind,
                language: Language::Python,
                file: file.to_string(),
                line: (node.start_position().row + 1) as u32,
            });
        }

        let mut cursor = node.walk();
        let children: Vec<_> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    symbols
}

// ── Pattern-based extraction ────────────────────────────────────────────

static JS_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)")
        .expect("valid function pattern")
});

static JS_BOUND_FUNCTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]+)?=\s*(?:async\s+)?(?:function\b|(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*(?::[^=]+)?=>)",
    )
    .expect("valid bound function pattern")
});

static JS_CLASS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)")
        .expect("valid class pattern")
});

/// Scan JavaScript/TypeScript line by line for declaration-shaped lines.
fn extract_pattern_symbols(file: &str, content: &str, language: &Language) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    for (line_num, line) in content.lines().enumerate() {
        let trimmed = line.trim();

        let hit = if let Some(c) = JS_FUNCTION.captures(trimmed) {
            Some((c, SymbolKind::Function))
        } else if let Some(c) = JS_BOUND_FUNCTION.captures(trimmed) {
            Some((c, SymbolKind::Function))
        } else {
            JS_CLASS.captures(trimmed).map(|c| (c, SymbolKind::Class))
        };

        if let Some((captures, kind)) = hit
            && let Some(name) = captures.get(1)
        {
            symbols.push(Symbol {
                name: name.as_str().to_string(),
                kind,
                language: language.clone(),
                file: file.to_string(),
                line: (line_num + 1) as u32,
            });
        }
    }
    symbols
}
