//! Literal and regex search over enumerated files.
//!
//! Literal queries are escaped and compiled through the same regex engine as
//! regex queries, so case folding never shifts reported columns. The pattern
//! is compiled once per request; a bad pattern fails the whole request.
//!
//! Files that are too large, unreadable or not text are skipped. The scan
//! stops as soon as `limit` matches are collected or the deadline passes.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WorkspaceError};
use crate::files::load_text;
use crate::pool::Deadline;
use crate::sandbox::{ResolvedPath, Sandbox};
use crate::walker::{TruncationReason, WalkOptions, enumerate};

/// One occurrence of the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMatch {
    /// Workspace-relative path.
    pub path: String,
    /// 1-based line number.
    pub line: u32,
    /// 1-based character column of the first matched character.
    pub column_start: u32,
    /// 1-based character column one past the last matched character.
    pub column_end: u32,
    /// The full line, trailing whitespace trimmed.
    pub snippet: String,
}

/// Search parameters.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub regex: bool,
    pub case_sensitive: bool,
    pub limit: usize,
    pub max_file_bytes: u64,
}

/// Matches plus how the scan ended.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub matches: Vec<SearchMatch>,
    pub files_scanned: usize,
    pub truncated: Option<TruncationReason>,
}

/// Compile the query into a matcher.
pub fn build_matcher(query: &str, regex: bool, case_sensitive: bool) -> Result<Regex> {
    if query.is_empty() {
        return Err(WorkspaceError::InvalidArgument(
            "search query must not be empty".to_string(),
        ));
    }
    let pattern = if regex {
        query.to_string()
    } else {
        regex::escape(query)
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| WorkspaceError::InvalidPattern {
            pattern: query.to_string(),
            message: e.to_string(),
        })
}

/// Search every file under `root` admitted by `walk`.
pub fn search(
    sandbox: &Sandbox,
    root: &ResolvedPath,
    walk: &WalkOptions,
    request: &SearchRequest,
    deadline: Deadline,
) -> Result<SearchOutcome> {
    let matcher = build_matcher(&request.query, request.regex, request.case_sensitive)?;
    let mut outcome = SearchOutcome::default();
    if request.limit == 0 {
        return Ok(outcome);
    }

    let enumeration = enumerate(sandbox, root, walk, deadline)?;
    outcome.truncated = enumeration.truncated;

    'files: for entry in &enumeration.entries {
        if deadline.expired() {
            outcome.truncated = Some(TruncationReason::TimeBudget);
            break;
        }
        let Some(content) = load_text(&sandbox.root().join(&entry.path), request.max_file_bytes)
        else {
            continue;
        };
        outcome.files_scanned += 1;

        for (idx, line) in content.lines().enumerate() {
            for m in matcher.find_iter(line) {
                if m.is_empty() {
                    continue;
                }
                let column_start = line[..m.start()].chars().count() + 1;
                let column_end = column_start + m.as_str().chars().count();
                outcome.matches.push(SearchMatch {
                    path: entry.path.clone(),
                    line: (idx + 1) as u32,
                    column_start: column_start as u32,
                    column_end: column_end as u32,
                    snippet: line.trim_end().to_string(),
                });
                if outcome.matches.len() >= request.limit {
                    outcome.truncated = Some(TruncationReason::Count);
                    break 'files;
                }
            }
        }
    }

    debug!(
        query = %request.query,
        matches = outcome.matches.len(),
        files = outcome.files_scanned,
        truncated = ?outcome.truncated,
        elapsed_ms = deadline.elapsed().as_millis() as u64,
        "Search finished"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Sandbox) {
        let tmp = TempDir::new().unwrap();
        let files: &[(&str, &[u8])] = &[
            ("a.py", b"foo = 1\nx = Foo() + foo\n"),
            ("b/c.js", b"const naive = 'caf\xc3\xa9 foo';   \n"),
            ("bin.dat", b"foo\x00foo"),
            ("node_modules/dep/index.js", b"foo\n"),
        ];
        for (rel, content) in files {
            let path = tmp.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let sandbox = Sandbox::new(tmp.path()).unwrap();
        (tmp, sandbox)
    }

    fn request(query: &str, regex: bool, case_sensitive: bool) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            regex,
            case_sensitive,
            limit: 100,
            max_file_bytes: 1 << 20,
        }
    }

    fn run(sandbox: &Sandbox, req: &SearchRequest) -> SearchOutcome {
        let root = sandbox.resolve(".").unwrap();
        search(sandbox, &root, &WalkOptions::default(), req, Deadline::unbounded()).unwrap()
    }

    fn positions(outcome: &SearchOutcome) -> Vec<(&str, u32, u32, u32)> {
        outcome
            .matches
            .iter()
            .map(|m| (m.path.as_str(), m.line, m.column_start, m.column_end))
            .collect()
    }

    #[test]
    fn test_literal_case_insensitive_by_default() {
        let (_tmp, sandbox) = fixture();
        let outcome = run(&sandbox, &request("foo", false, false));
        assert_eq!(
            positions(&outcome),
            vec![
                ("a.py", 1, 1, 4),
                ("a.py", 2, 5, 8),
                ("a.py", 2, 13, 16),
                ("b/c.js", 1, 21, 24),
            ]
        );
        assert_eq!(outcome.matches[3].snippet, "const naive = 'café foo';");
    }

    #[test]
    fn test_literal_case_sensitive() {
        let (_tmp, sandbox) = fixture();
        let outcome = run(&sandbox, &request("Foo", false, true));
        assert_eq!(positions(&outcome), vec![("a.py", 2, 5, 8)]);
    }

    #[test]
    fn test_literal_metacharacters_are_escaped() {
        let (_tmp, sandbox) = fixture();
        let outcome = run(&sandbox, &request("Foo()", false, true));
        assert_eq!(positions(&outcome), vec![("a.py", 2, 5, 10)]);
    }

    #[test]
    fn test_regex_query() {
        let (_tmp, sandbox) = fixture();
        let outcome = run(&sandbox, &request(r"^\w+ =", true, true));
        assert_eq!(
            positions(&outcome),
            vec![("a.py", 1, 1, 6), ("a.py", 2, 1, 4)]
        );
    }

    #[test]
    fn test_invalid_regex_fails_request() {
        let (_tmp, sandbox) = fixture();
        let root = sandbox.resolve(".").unwrap();
        let err = search(
            &sandbox,
            &root,
            &WalkOptions::default(),
            &request("foo(", true, false),
            Deadline::unbounded(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidPattern { .. }));
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(matches!(
            build_matcher("", false, false),
            Err(WorkspaceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_limit_is_hard_cap() {
        let (_tmp, sandbox) = fixture();
        let mut req = request("foo", false, false);
        req.limit = 2;
        let outcome = run(&sandbox, &req);
        assert_eq!(outcome.matches.len(), 2);
        assert_eq!(outcome.truncated, Some(TruncationReason::Count));

        req.limit = 0;
        assert!(run(&sandbox, &req).matches.is_empty());
    }

    #[test]
    fn test_binary_and_excluded_files_skipped() {
        let (_tmp, sandbox) = fixture();
        let outcome = run(&sandbox, &request("foo", false, false));
        assert!(outcome.matches.iter().all(|m| m.path != "bin.dat"));
        assert!(outcome.matches.iter().all(|m| !m.path.starts_with("node_modules")));
        assert_eq!(outcome.files_scanned, 2);
    }

    #[test]
    fn test_include_globs_narrow_scope() {
        let (_tmp, sandbox) = fixture();
        let root = sandbox.resolve(".").unwrap();
        let walk = WalkOptions {
            include: vec!["**/*.js".to_string()],
            ..WalkOptions::default()
        };
        let outcome = search(
            &sandbox,
            &root,
            &walk,
            &request("foo", false, false),
            Deadline::unbounded(),
        )
        .unwrap();
        assert_eq!(positions(&outcome), vec![("b/c.js", 1, 21, 24)]);
    }
}
