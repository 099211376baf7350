//! Error types for conversion and loading operations

use std::fmt;
use std::path::PathBuf;

use crate::document_type::DocumentType;

/// Errors that can occur while converting a document to Markdown
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// No converter exists for the document type
    UnsupportedFormat(DocumentType),
    /// Character encoding error
    EncodingError(String),
    /// Invalid input data
    InvalidInput(String),
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::UnsupportedFormat(doc_type) => {
                write!(f, "Unsupported document format: {}", doc_type)
            }
            ConversionError::EncodingError(msg) => write!(f, "Encoding error: {}", msg),
            ConversionError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
        }
    }
}

impl std::error::Error for ConversionError {}

/// Errors raised by the loading pipeline around the converters
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error tied to a path.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid glob pattern.
    #[error("invalid glob pattern: {0}")]
    Glob(#[from] glob::PatternError),

    /// A single-file source has an extension no converter handles.
    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    /// Conversion failure.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Git command failure.
    #[error("git error: {0}")]
    Git(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LoaderError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoaderError::Io {
            path: path.into(),
            source,
        }
    }
}
