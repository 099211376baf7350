//! Source enumeration
//!
//! A source entry names one file, a directory walked recursively, or a glob
//! pattern (`*`, `?`, `[...]`, with `**` matching any number of
//! directories). Enumeration only collects paths; reading happens in
//! [`crate::processor`].

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::document_type::is_supported;
use crate::error::LoaderError;

/// Characters that turn a source entry into a glob pattern.
const GLOB_CHARS: &[char] = &['*', '?', '['];

/// How a source entry is expanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Directory,
    Glob,
}

/// Files found for a set of sources.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SourceFiles {
    /// Files with a supported extension, in enumeration order.
    pub files: Vec<PathBuf>,
    /// Files found by a walk or glob whose extension no converter handles.
    pub skipped: Vec<PathBuf>,
}

/// Classify a source entry.
///
/// Existing paths win over glob interpretation, so a file literally named
/// `notes[1].md` is read as a file.
///
/// # Errors
///
/// Returns `LoaderError::Io` with `NotFound` when the entry is neither an
/// existing path nor a glob pattern.
pub fn classify(source: &Path) -> Result<SourceKind, LoaderError> {
    if source.is_file() {
        return Ok(SourceKind::File);
    }
    if source.is_dir() {
        return Ok(SourceKind::Directory);
    }
    if is_glob_pattern(source) {
        return Ok(SourceKind::Glob);
    }
    Err(LoaderError::io(
        source,
        std::io::Error::new(std::io::ErrorKind::NotFound, "source not found"),
    ))
}

/// Returns true if the entry contains glob metacharacters.
pub fn is_glob_pattern(source: &Path) -> bool {
    source.to_string_lossy().contains(GLOB_CHARS)
}

/// Expand every source entry into the files to process.
///
/// Paths reached by more than one entry are listed once, at their first
/// position.
///
/// # Errors
///
/// - `LoaderError::Io` for a missing source or an unreadable directory
/// - `LoaderError::UnsupportedFile` for a single-file entry with an
///   unsupported extension
/// - `LoaderError::Glob` for an invalid pattern
pub fn collect_files(sources: &[PathBuf]) -> Result<SourceFiles, LoaderError> {
    let mut result = SourceFiles::default();
    let mut seen = HashSet::new();

    for source in sources {
        let kind = classify(source)?;
        tracing::info!(source = %source.display(), ?kind, "processing source");

        let found = match kind {
            SourceKind::File => {
                if !is_supported(source) {
                    return Err(LoaderError::UnsupportedFile(source.clone()));
                }
                vec![source.clone()]
            }
            SourceKind::Directory => walk_directory(source)?,
            SourceKind::Glob => expand_glob(source)?,
        };

        for path in found {
            if !seen.insert(path.clone()) {
                continue;
            }
            if is_supported(&path) {
                result.files.push(path);
            } else {
                tracing::debug!(path = %path.display(), "skipping unsupported file");
                result.skipped.push(path);
            }
        }
    }

    Ok(result)
}

/// Regular files below `dir`, sorted by name at each level.
fn walk_directory(dir: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            LoaderError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Files matching a glob pattern, sorted by path.
fn expand_glob(pattern: &Path) -> Result<Vec<PathBuf>, LoaderError> {
    let pattern = pattern.to_string_lossy();
    let mut files = Vec::new();

    for entry in glob::glob(&pattern)? {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    path = %e.path().display(),
                    error = %e.error(),
                    "unreadable glob match, skipping"
                );
            }
        }
    }
    files.sort();
    Ok(files)
}
