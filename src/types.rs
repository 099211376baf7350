//! Records produced by the processing pipeline

use chrono::{DateTime, Utc};

use crate::document_type::DocumentType;
use crate::error::LoaderError;

/// A converted document ready to be written to the target table
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub title: String,
    /// Normalized Markdown
    pub content: String,
    /// Original file bytes, stored as `bytea`
    pub source_content: Vec<u8>,
    pub file_name: String,
    /// Not every platform or filesystem reports a creation time
    pub file_created: Option<DateTime<Utc>>,
    pub file_modified: Option<DateTime<Utc>>,
    pub document_type: DocumentType,
}

/// Counters for one run
#[derive(Debug, Default)]
pub struct Stats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub rows_inserted: usize,
    pub rows_updated: usize,
    pub errors: Vec<LoaderError>,
}

impl Stats {
    pub fn add_error(&mut self, err: LoaderError) {
        self.errors.push(err);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
