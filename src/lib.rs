//! Document loader
//!
//! This library converts HTML, Markdown, reStructuredText and SGML/DocBook
//! documents to normalized Markdown with an extracted title, and loads the
//! results into a PostgreSQL table under a configurable column mapping.
//!
//! # Architecture
//!
//! The conversion core is pure and performs no I/O:
//! - `document_type`: file extension to [`DocumentType`]
//! - `formats`: conversion dispatcher and the per-format converters
//! - `parser`: HTML5 parsing using html5ever
//! - `converter`: Markdown generation from the DOM tree
//! - `charset`: character encoding detection and decoding
//! - `security`: element and URL policy for the DOM walk
//!
//! Around it sit the loading layers:
//! - `config`: YAML file and command-line configuration
//! - `source`: file, directory and glob enumeration
//! - `git`: git working tree as a source
//! - `processor`: parallel read and conversion into [`Document`]s
//! - `database`: statement construction and transactional writes
//!
//! # Examples
//!
//! ```rust
//! use docloader::{DocumentType, convert, detect_document_type};
//!
//! let doc_type = detect_document_type("guide/INSTALL.MD");
//! assert_eq!(doc_type, DocumentType::Markdown);
//!
//! let result = convert(b"# Installing\n\nRun the installer.\n", doc_type)
//!     .expect("Markdown is supported");
//! assert_eq!(result.title, "Installing");
//! ```

pub mod charset;
pub mod config;
pub mod converter;
pub mod database;
pub mod document_type;
pub mod error;
pub mod formats;
pub mod git;
pub mod parser;
pub mod processor;
pub mod security;
pub mod source;
pub mod types;

// Re-export main types for convenience
pub use converter::MarkdownConverter;
pub use document_type::{DocumentType, detect_document_type, is_supported};
pub use error::{ConversionError, LoaderError};
pub use formats::{ConversionResult, convert};
pub use parser::parse_html;
pub use types::{Document, Stats};
