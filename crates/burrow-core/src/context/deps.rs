//! Dependency extraction: raw import identifiers per source file.
//!
//! Identifiers are reported as written (module names or relative paths).
//! Nothing is resolved to a file on disk.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::lang::{Language, Strategy};

/// A declared import: `from` imports `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Workspace-relative importing file.
    pub from: String,
    /// Raw module name or path as written in the source.
    pub to: String,
}

/// Files touched by a dep-graph rebuild and the imports they declare.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Record one file and its dependencies.
    pub fn add_file(&mut self, file: &str, deps: Vec<String>) {
        self.nodes.push(file.to_string());
        self.edges.extend(deps.into_iter().map(|to| DependencyEdge {
            from: file.to_string(),
            to,
        }));
    }

    /// Dependencies declared by one file.
    pub fn dependencies_of(&self, file: &str) -> Vec<&str> {
        self.edges
            .iter()
            .filter(|e| e.from == file)
            .map(|e| e.to.as_str())
            .collect()
    }
}

/// Extract the raw dependency identifiers of one file, first occurrence order.
pub fn extract_deps(content: &str, language: &Language) -> Vec<String> {
    let raw = match (language.strategy(), language) {
        (Strategy::Parsed, Language::Python) => python_imports(content),
        (Strategy::Pattern, _) => js_imports(content),
        _ => Vec::new(),
    };
    dedup(raw)
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

// ── Python ──────────────────────────────────────────────────────────────

/// `import a.b, c as d` yields `a.b` and `c`; `from x import y` yields `x`.
fn python_imports(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("import ") {
            let rest = strip_comment(rest);
            for part in rest.split(',') {
                if let Some(module) = part.split_whitespace().next() {
                    deps.push(module.trim_matches(|c| c == '(' || c == ')').to_string());
                }
            }
        } else if let Some(rest) = line.strip_prefix("from ") {
            let mut words = strip_comment(rest).split_whitespace();
            if let (Some(module), Some("import")) = (words.next(), words.next()) {
                deps.push(module.to_string());
            }
        }
    }
    deps.retain(|d| !d.is_empty());
    deps
}

fn strip_comment(s: &str) -> &str {
    s.split('#').next().unwrap_or(s)
}

// ── JavaScript / TypeScript ─────────────────────────────────────────────

static JS_FROM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:import|export)\b[^'"]*?\bfrom\s*['"]([^'"]+)['"]"#)
        .expect("valid from pattern")
});

static JS_SIDE_EFFECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*import\s*['"]([^'"]+)['"]"#).expect("valid side-effect import pattern")
});

static JS_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(?:require|import)\s*\(\s*['"]([^'"]+)['"]\s*\)"#)
        .expect("valid require pattern")
});

/// Quoted module references following `import`/`export … from`, `require(…)`
/// or dynamic `import(…)`.
fn js_imports(content: &str) -> Vec<String> {
    let mut deps = Vec::new();
    for line in content.lines() {
        if line.trim_start().starts_with("//") {
            continue;
        }
        if let Some(c) = JS_FROM.captures(line).or_else(|| JS_SIDE_EFFECT.captures(line)) {
            deps.push(c[1].to_string());
        }
        for c in JS_CALL.captures_iter(line) {
            deps.push(c[1].to_string());
        }
    }
    deps
}
