//! Document type detection from file names

use std::fmt;
use std::path::Path;

/// Source document formats understood by the converters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DocumentType {
    /// Extension not recognized
    #[default]
    Unknown,
    /// `.html`, `.htm`
    Html,
    /// `.md`
    Markdown,
    /// `.rst`
    ReStructuredText,
    /// `.sgml`, `.sgm`, `.xml` (DocBook)
    Sgml,
}

/// Extension table in the order reported by `docloader formats`
const EXTENSIONS: &[(&str, DocumentType)] = &[
    (".html", DocumentType::Html),
    (".htm", DocumentType::Html),
    (".md", DocumentType::Markdown),
    (".rst", DocumentType::ReStructuredText),
    (".sgml", DocumentType::Sgml),
    (".sgm", DocumentType::Sgml),
    (".xml", DocumentType::Sgml),
];

impl DocumentType {
    /// Human readable format name
    pub fn name(self) -> &'static str {
        match self {
            DocumentType::Html => "HTML",
            DocumentType::Markdown => "Markdown",
            DocumentType::ReStructuredText => "reStructuredText",
            DocumentType::Sgml => "SGML/DocBook",
            DocumentType::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Detect the document type from a file name's extension
///
/// Matching is case-insensitive; a file without an extension, or with one
/// not listed in [`supported_extensions`], is [`DocumentType::Unknown`].
///
/// # Examples
///
/// ```rust
/// use docloader::document_type::{detect_document_type, DocumentType};
///
/// assert_eq!(detect_document_type("guide/INDEX.HTML"), DocumentType::Html);
/// assert_eq!(detect_document_type("notes.txt"), DocumentType::Unknown);
/// ```
pub fn detect_document_type(filename: impl AsRef<Path>) -> DocumentType {
    let Some(name) = filename.as_ref().file_name().and_then(|name| name.to_str()) else {
        return DocumentType::Unknown;
    };
    let Some(dot) = name.rfind('.') else {
        return DocumentType::Unknown;
    };
    let ext = &name[dot..];

    EXTENSIONS
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(ext))
        .map(|(_, doc_type)| *doc_type)
        .unwrap_or(DocumentType::Unknown)
}

/// Returns true if a converter exists for the file's extension
pub fn is_supported(filename: impl AsRef<Path>) -> bool {
    detect_document_type(filename) != DocumentType::Unknown
}

/// Supported file extensions, with leading dot
pub fn supported_extensions() -> Vec<&'static str> {
    EXTENSIONS.iter().map(|(ext, _)| *ext).collect()
}
