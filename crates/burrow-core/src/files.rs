//! File operations on sandboxed paths.
//!
//! Every function here takes a [`ResolvedPath`], so containment has already
//! been checked. Policy and read-only checks happen in the façade before any
//! mutating call reaches this module.

use std::io::Write;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{Result, WorkspaceError};
use crate::sandbox::{ResolvedPath, to_slash};

/// Type of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    File,
    Directory,
    Symlink,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    /// Workspace-relative path.
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub size: u64,
}

/// File content as returned to callers: UTF-8 text or base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileContent {
    Text { content: String },
    Binary { content_base64: String },
}

impl FileContent {
    fn from_bytes(bytes: Vec<u8>, as_binary: bool) -> Self {
        if as_binary {
            return Self::binary(&bytes);
        }
        match String::from_utf8(bytes) {
            Ok(content) => FileContent::Text { content },
            Err(e) => Self::binary(e.as_bytes()),
        }
    }

    fn binary(bytes: &[u8]) -> Self {
        FileContent::Binary {
            content_base64: BASE64.encode(bytes),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text { content } => Some(content),
            FileContent::Binary { .. } => None,
        }
    }
}

/// Result of a ranged repository read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeRead {
    pub path: String,
    #[serde(flatten)]
    pub content: FileContent,
    /// SHA-256 of the whole file, hex encoded.
    pub content_hash: String,
    pub total_lines: usize,
}

/// Result of a write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub ok: bool,
    pub path: String,
    pub bytes_written: usize,
    /// Workspace-relative backup path, when a backup was taken.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup: Option<String>,
}

// ── Reads ───────────────────────────────────────────────────────────────

/// List the immediate children of a directory, sorted by name.
pub fn list_dir(dir: &ResolvedPath) -> Result<Vec<DirEntry>> {
    let meta = std::fs::metadata(&dir.absolute).map_err(|e| WorkspaceError::io(&dir.relative, e))?;
    if !meta.is_dir() {
        return Err(WorkspaceError::not_found(&dir.relative, "not a directory"));
    }

    let reader =
        std::fs::read_dir(&dir.absolute).map_err(|e| WorkspaceError::io(&dir.relative, e))?;
    let mut entries = Vec::new();
    for item in reader {
        let item = match item {
            Ok(item) => item,
            Err(e) => {
                debug!(dir = %dir.display_relative(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        let Ok(meta) = item.path().symlink_metadata() else {
            continue;
        };
        let entry_type = if meta.file_type().is_symlink() {
            EntryType::Symlink
        } else if meta.is_dir() {
            EntryType::Directory
        } else if meta.is_file() {
            EntryType::File
        } else {
            EntryType::Other
        };
        let name = item.file_name().to_string_lossy().into_owned();
        entries.push(DirEntry {
            path: to_slash(&dir.relative.join(&name)),
            name,
            entry_type,
            size: if entry_type == EntryType::File { meta.len() } else { 0 },
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

fn read_bytes(file: &ResolvedPath) -> Result<Vec<u8>> {
    let meta =
        std::fs::metadata(&file.absolute).map_err(|e| WorkspaceError::io(&file.relative, e))?;
    if meta.is_dir() {
        return Err(WorkspaceError::not_found(&file.relative, "is a directory"));
    }
    std::fs::read(&file.absolute).map_err(|e| WorkspaceError::io(&file.relative, e))
}

/// Read a whole file. Non-UTF-8 content comes back as base64.
pub fn read_file(file: &ResolvedPath, as_binary: bool) -> Result<FileContent> {
    Ok(FileContent::from_bytes(read_bytes(file)?, as_binary))
}

/// Read a file, optionally restricted to an inclusive 1-based line range.
///
/// The hash always covers the whole file so callers can detect concurrent
/// edits between reads. Ranges past the end are clamped; binary files ignore
/// the range.
pub fn read_range(
    file: &ResolvedPath,
    start_line: Option<usize>,
    end_line: Option<usize>,
) -> Result<RangeRead> {
    if start_line == Some(0) || end_line == Some(0) {
        return Err(WorkspaceError::InvalidArgument(
            "line numbers are 1-based".to_string(),
        ));
    }
    if let (Some(start), Some(end)) = (start_line, end_line)
        && start > end
    {
        return Err(WorkspaceError::InvalidArgument(format!(
            "start_line {start} is after end_line {end}"
        )));
    }

    let bytes = read_bytes(file)?;
    let content_hash = sha256_hex(&bytes);
    let content = FileContent::from_bytes(bytes, false);

    let (content, total_lines) = match content {
        FileContent::Text { content } => {
            let lines: Vec<&str> = content.split_inclusive('\n').collect();
            let total = lines.len();
            let start = start_line.unwrap_or(1).min(total + 1) - 1;
            let end = end_line.unwrap_or(total).min(total);
            let slice = if start < end { lines[start..end].concat() } else { String::new() };
            (FileContent::Text { content: slice }, total)
        }
        binary => (binary, 0),
    };

    Ok(RangeRead {
        path: file.display_relative(),
        content,
        content_hash,
        total_lines,
    })
}

/// Load a file as text for scanning. Returns `None` for files that are too
/// large, unreadable, contain NUL bytes or are not UTF-8.
pub fn load_text(absolute: &Path, max_bytes: u64) -> Option<String> {
    let meta = std::fs::metadata(absolute).ok()?;
    if meta.len() > max_bytes {
        debug!(path = %absolute.display(), size = meta.len(), "Skipping oversized file");
        return None;
    }
    let bytes = match std::fs::read(absolute) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(path = %absolute.display(), error = %e, "Skipping unreadable file");
            return None;
        }
    };
    if bytes.contains(&0) {
        return None;
    }
    String::from_utf8(bytes).ok()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ── Mutations ───────────────────────────────────────────────────────────

/// Write `content` to `file`.
///
/// With `backup`, an existing file is first copied to `<name>.bak` next to
/// it. The new content goes to a temp file in the same directory which is
/// then renamed over the target, so readers see either the old or the new
/// content.
pub fn write_file(
    file: &ResolvedPath,
    content: &[u8],
    create_dirs: bool,
    backup: bool,
) -> Result<WriteOutcome> {
    if file.is_root() {
        return Err(WorkspaceError::InvalidArgument(
            "cannot write to the workspace root".to_string(),
        ));
    }
    let Some(parent) = file.absolute.parent() else {
        return Err(WorkspaceError::InvalidArgument("path has no parent".to_string()));
    };

    if !parent.is_dir() {
        if !create_dirs {
            return Err(WorkspaceError::not_found(
                &file.relative,
                "parent directory does not exist",
            ));
        }
        std::fs::create_dir_all(parent).map_err(|e| WorkspaceError::io(&file.relative, e))?;
    }

    let existing = std::fs::metadata(&file.absolute).ok();
    if existing.as_ref().is_some_and(|m| m.is_dir()) {
        return Err(WorkspaceError::InvalidArgument(format!(
            "{} is a directory",
            file.display_relative()
        )));
    }

    let mut backup_path = None;
    if backup && existing.is_some() {
        let bak = backup_sibling(&file.absolute);
        write_backup(&file.absolute, parent, &bak, existing.as_ref())
            .map_err(|e| WorkspaceError::io(&file.relative, e))?;
        let rel = file.relative.with_file_name(
            bak.file_name()
                .map(|n| n.to_os_string())
                .unwrap_or_default(),
        );
        debug!(backup = %to_slash(&rel), "Backup written");
        backup_path = Some(to_slash(&rel));
    }

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| WorkspaceError::io(&file.relative, e))?;
    tmp.write_all(content)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| WorkspaceError::io(&file.relative, e))?;
    if let Some(meta) = &existing {
        // Keep the original mode; the temp file is created 0600.
        let _ = std::fs::set_permissions(tmp.path(), meta.permissions());
    }
    tmp.persist(&file.absolute)
        .map_err(|e| WorkspaceError::io(&file.relative, e.error))?;

    info!(path = %file.display_relative(), bytes = content.len(), "File written");
    Ok(WriteOutcome {
        ok: true,
        path: file.display_relative(),
        bytes_written: content.len(),
        backup: backup_path,
    })
}

/// Copy `source` to `bak` through a temp file renamed into place, so an
/// existing `.bak` symlink is replaced rather than written through.
fn write_backup(
    source: &Path,
    parent: &Path,
    bak: &Path,
    meta: Option<&std::fs::Metadata>,
) -> std::io::Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    let mut original = std::fs::File::open(source)?;
    std::io::copy(&mut original, tmp.as_file_mut())?;
    tmp.as_file().sync_all()?;
    if let Some(meta) = meta {
        let _ = std::fs::set_permissions(tmp.path(), meta.permissions());
    }
    tmp.persist(bak).map_err(|e| e.error)?;
    Ok(())
}

/// `<dir>/<name>.bak`
pub fn backup_sibling(path: &Path) -> std::path::PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Delete a file or directory. Non-empty directories need `recursive`.
pub fn delete_path(target: &ResolvedPath, recursive: bool) -> Result<()> {
    if target.is_root() {
        return Err(WorkspaceError::PolicyDenied {
            path: target.relative.clone(),
            reason: "the workspace root cannot be deleted".to_string(),
        });
    }
    let meta = target
        .absolute
        .symlink_metadata()
        .map_err(|e| WorkspaceError::io(&target.relative, e))?;

    let result = if meta.is_dir() {
        if recursive {
            std::fs::remove_dir_all(&target.absolute)
        } else {
            std::fs::remove_dir(&target.absolute)
        }
    } else {
        std::fs::remove_file(&target.absolute)
    };

    result.map_err(|e| match e.kind() {
        std::io::ErrorKind::DirectoryNotEmpty => WorkspaceError::InvalidArgument(format!(
            "{} is not empty; pass recursive to delete it",
            target.display_relative()
        )),
        _ => WorkspaceError::io(&target.relative, e),
    })?;

    info!(path = %target.display_relative(), recursive, "Deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sandbox::Sandbox;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Sandbox) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("src/nested")).unwrap();
        std::fs::write(tmp.path().join("src/a.py"), "line1\nline2\nline3\n").unwrap();
        std::fs::write(tmp.path().join("src/blob.bin"), [0xff, 0x00, 0xfe]).unwrap();
        let sandbox = Sandbox::new(tmp.path()).unwrap();
        (tmp, sandbox)
    }

    #[test]
    fn test_list_dir_sorted_with_types() {
        let (_tmp, sandbox) = fixture();
        let entries = list_dir(&sandbox.resolve("src").unwrap()).unwrap();
        let summary: Vec<_> = entries
            .iter()
            .map(|e| (e.path.as_str(), e.entry_type))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("src/a.py", EntryType::File),
                ("src/blob.bin", EntryType::File),
                ("src/nested", EntryType::Directory),
            ]
        );
        assert_eq!(entries[0].size, 18);
    }

    #[test]
    fn test_list_dir_on_file_is_not_found() {
        let (_tmp, sandbox) = fixture();
        let err = list_dir(&sandbox.resolve("src/a.py").unwrap()).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }

    #[test]
    fn test_read_text_and_binary() {
        let (_tmp, sandbox) = fixture();
        let text = read_file(&sandbox.resolve("src/a.py").unwrap(), false).unwrap();
        assert_eq!(text.as_text(), Some("line1\nline2\nline3\n"));

        let bin = read_file(&sandbox.resolve("src/blob.bin").unwrap(), false).unwrap();
        assert_eq!(
            bin,
            FileContent::Binary {
                content_base64: "/wD+".to_string()
            }
        );

        let forced = read_file(&sandbox.resolve("src/a.py").unwrap(), true).unwrap();
        assert!(forced.as_text().is_none());
    }

    #[test]
    fn test_read_directory_is_not_found() {
        let (_tmp, sandbox) = fixture();
        let err = read_file(&sandbox.resolve("src").unwrap(), false).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }

    #[test]
    fn test_read_range() {
        let (_tmp, sandbox) = fixture();
        let file = sandbox.resolve("src/a.py").unwrap();

        let full = read_range(&file, None, None).unwrap();
        assert_eq!(full.total_lines, 3);
        assert_eq!(full.content_hash, sha256_hex(b"line1\nline2\nline3\n"));

        let middle = read_range(&file, Some(2), Some(2)).unwrap();
        assert_eq!(middle.content.as_text(), Some("line2\n"));
        assert_eq!(middle.content_hash, full.content_hash);

        let tail = read_range(&file, Some(3), Some(99)).unwrap();
        assert_eq!(tail.content.as_text(), Some("line3\n"));

        let past = read_range(&file, Some(10), None).unwrap();
        assert_eq!(past.content.as_text(), Some(""));

        assert!(matches!(
            read_range(&file, Some(3), Some(1)),
            Err(WorkspaceError::InvalidArgument(_))
        ));
        assert!(matches!(
            read_range(&file, Some(0), None),
            Err(WorkspaceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_load_text_skips_binary_and_oversized() {
        let (tmp, _sandbox) = fixture();
        assert!(load_text(&tmp.path().join("src/a.py"), 1024).is_some());
        assert!(load_text(&tmp.path().join("src/a.py"), 4).is_none());
        assert!(load_text(&tmp.path().join("src/blob.bin"), 1024).is_none());
        assert!(load_text(&tmp.path().join("missing"), 1024).is_none());
    }

    #[test]
    fn test_write_creates_dirs() {
        let (tmp, sandbox) = fixture();
        let target = sandbox.resolve("docs/new/readme.md").unwrap();
        let outcome = write_file(&target, b"# hi\n", true, false).unwrap();
        assert_eq!(outcome.path, "docs/new/readme.md");
        assert_eq!(outcome.bytes_written, 5);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("docs/new/readme.md")).unwrap(),
            "# hi\n"
        );
    }

    #[test]
    fn test_write_without_create_dirs_fails() {
        let (tmp, sandbox) = fixture();
        let target = sandbox.resolve("missing/x.txt").unwrap();
        let err = write_file(&target, b"x", false, false).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
        assert!(!tmp.path().join("missing").exists());
    }

    #[test]
    fn test_write_backup_keeps_previous_bytes() {
        let (tmp, sandbox) = fixture();
        let target = sandbox.resolve("src/a.py").unwrap();
        let outcome = write_file(&target, b"new\n", true, true).unwrap();
        assert_eq!(outcome.backup.as_deref(), Some("src/a.py.bak"));
        assert_eq!(
            std::fs::read(tmp.path().join("src/a.py.bak")).unwrap(),
            b"line1\nline2\nline3\n"
        );
        assert_eq!(std::fs::read(tmp.path().join("src/a.py")).unwrap(), b"new\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_backup_replaces_symlink_instead_of_following_it() {
        let (tmp, sandbox) = fixture();
        let outside = TempDir::new().unwrap();
        let victim = outside.path().join("victim.txt");
        std::fs::write(&victim, "keep me\n").unwrap();
        std::os::unix::fs::symlink(&victim, tmp.path().join("src/a.py.bak")).unwrap();

        let target = sandbox.resolve("src/a.py").unwrap();
        write_file(&target, b"new\n", true, true).unwrap();

        assert_eq!(std::fs::read(&victim).unwrap(), b"keep me\n");
        let bak = tmp.path().join("src/a.py.bak");
        assert!(!std::fs::symlink_metadata(&bak).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read(&bak).unwrap(), b"line1\nline2\nline3\n");
    }

    #[test]
    fn test_write_new_file_takes_no_backup() {
        let (tmp, sandbox) = fixture();
        let target = sandbox.resolve("src/fresh.py").unwrap();
        let outcome = write_file(&target, b"x = 1\n", true, true).unwrap();
        assert!(outcome.backup.is_none());
        assert!(!tmp.path().join("src/fresh.py.bak").exists());
    }

    #[test]
    fn test_write_over_directory_rejected() {
        let (_tmp, sandbox) = fixture();
        let err = write_file(&sandbox.resolve("src/nested").unwrap(), b"x", true, false)
            .unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidArgument(_)));
    }

    #[test]
    fn test_delete_file_and_dirs() {
        let (tmp, sandbox) = fixture();
        delete_path(&sandbox.resolve("src/a.py").unwrap(), false).unwrap();
        assert!(!tmp.path().join("src/a.py").exists());

        delete_path(&sandbox.resolve("src/nested").unwrap(), false).unwrap();
        assert!(!tmp.path().join("src/nested").exists());

        let err = delete_path(&sandbox.resolve("src").unwrap(), false).unwrap_err();
        assert!(matches!(err, WorkspaceError::InvalidArgument(_)));
        assert!(tmp.path().join("src/blob.bin").exists());

        delete_path(&sandbox.resolve("src").unwrap(), true).unwrap();
        assert!(!tmp.path().join("src").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_delete_symlink_entry_keeps_target() {
        let (tmp, sandbox) = fixture();
        std::os::unix::fs::symlink(tmp.path().join("src/nested"), tmp.path().join("link"))
            .unwrap();
        std::fs::write(tmp.path().join("src/nested/x.py"), "x = 1\n").unwrap();

        delete_path(&sandbox.resolve_entry("link").unwrap(), true).unwrap();
        assert!(std::fs::symlink_metadata(tmp.path().join("link")).is_err());
        assert!(tmp.path().join("src/nested/x.py").exists());
    }

    #[test]
    fn test_delete_root_and_missing() {
        let (_tmp, sandbox) = fixture();
        let err = delete_path(&sandbox.resolve(".").unwrap(), true).unwrap_err();
        assert!(matches!(err, WorkspaceError::PolicyDenied { .. }));

        let err = delete_path(&sandbox.resolve("nope.txt").unwrap(), false).unwrap_err();
        assert!(matches!(err, WorkspaceError::NotFound { .. }));
    }
}
