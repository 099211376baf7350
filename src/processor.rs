//! File processing
//!
//! Turns enumerated source files into [`Document`]s. Files are independent,
//! so reading and conversion run on the rayon thread pool; the returned
//! documents keep the enumeration order.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;

use crate::document_type::detect_document_type;
use crate::error::LoaderError;
use crate::formats;
use crate::source::collect_files;
use crate::types::{Document, Stats};

/// How stored file names are derived from paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions<'a> {
    /// Keep only the base name.
    pub strip_path: bool,
    /// Store names relative to this directory (the root of a git clone).
    pub base_dir: Option<&'a Path>,
}

/// Enumerate `sources` and convert every supported file.
///
/// Per-file failures are recorded in the returned [`Stats`] and do not stop
/// the run.
///
/// # Errors
///
/// Returns an error only when enumeration fails (missing source, invalid
/// pattern, unsupported single file).
pub fn process_sources(
    sources: &[PathBuf],
    options: ProcessOptions<'_>,
) -> Result<(Vec<Document>, Stats), LoaderError> {
    let found = collect_files(sources)?;
    let mut stats = Stats {
        files_skipped: found.skipped.len(),
        ..Stats::default()
    };

    let results: Vec<Result<Document, LoaderError>> = found
        .files
        .par_iter()
        .map(|path| process_file(path, options))
        .collect();

    let mut documents = Vec::with_capacity(results.len());
    for (path, result) in found.files.iter().zip(results) {
        match result {
            Ok(document) => {
                documents.push(document);
                stats.files_processed += 1;
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "failed to process file");
                stats.add_error(err);
                stats.files_skipped += 1;
            }
        }
    }

    Ok((documents, stats))
}

/// Read, convert and describe a single file.
///
/// # Errors
///
/// Returns `LoaderError::Io` if the file or its metadata cannot be read and
/// `LoaderError::Conversion` if its type is not supported.
pub fn process_file(path: &Path, options: ProcessOptions<'_>) -> Result<Document, LoaderError> {
    let source_content = std::fs::read(path).map_err(|e| LoaderError::io(path, e))?;
    let document_type = detect_document_type(path);
    let converted = formats::convert(&source_content, document_type)?;

    let metadata = std::fs::metadata(path).map_err(|e| LoaderError::io(path, e))?;
    let file_modified = metadata.modified().ok().map(DateTime::<Utc>::from);
    let file_created = metadata.created().ok().map(DateTime::<Utc>::from);

    tracing::debug!(
        path = %path.display(),
        %document_type,
        title = %converted.title,
        source_bytes = source_content.len(),
        markdown_bytes = converted.markdown.len(),
        "processed file"
    );

    Ok(Document {
        title: converted.title,
        content: converted.markdown,
        source_content,
        file_name: stored_file_name(path, options),
        file_created,
        file_modified,
        document_type,
    })
}

/// Name stored for `path` in the file-name column.
pub fn stored_file_name(path: &Path, options: ProcessOptions<'_>) -> String {
    if options.strip_path {
        return path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
    }
    let relative = options
        .base_dir
        .and_then(|base| path.strip_prefix(base).ok())
        .unwrap_or(path);
    relative.to_string_lossy().into_owned()
}
