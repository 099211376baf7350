//! Per-format converters and the conversion dispatcher
//!
//! Every supported [`DocumentType`] maps to one converter that turns raw
//! document bytes into normalized Markdown plus a best-effort title. The
//! converters are pure and total: they perform no I/O, keep no state across
//! calls and return a result for any input.
//!
//! # Examples
//!
//! ```rust
//! use docloader::document_type::DocumentType;
//! use docloader::formats::convert;
//!
//! let result = convert(b"Main Title\n==========\n\nContent", DocumentType::ReStructuredText)
//!     .expect("reStructuredText is supported");
//! assert_eq!(result.title, "Main Title");
//! assert_eq!(result.markdown, "# Main Title\n\nContent");
//! ```

pub mod html;
pub mod markdown;
pub mod rst;
pub mod sgml;
pub mod structure;

use std::borrow::Cow;

use crate::charset::decode_to_utf8;
use crate::document_type::DocumentType;
use crate::error::ConversionError;

/// Markdown rendering of one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionResult {
    pub markdown: String,
    /// Empty when no title could be found
    pub title: String,
}

/// Convert raw document content according to its type
///
/// # Errors
///
/// - `ConversionError::UnsupportedFormat` for [`DocumentType::Unknown`]
pub fn convert(
    content: &[u8],
    doc_type: DocumentType,
) -> Result<ConversionResult, ConversionError> {
    let result = match doc_type {
        DocumentType::Html => html::convert(content),
        DocumentType::Markdown => markdown::convert(&decode_text(content)),
        DocumentType::ReStructuredText => rst::convert(&decode_text(content)),
        DocumentType::Sgml => sgml::convert(&decode_to_utf8(content)),
        DocumentType::Unknown => return Err(ConversionError::UnsupportedFormat(doc_type)),
    };

    tracing::debug!(
        %doc_type,
        title = %result.title,
        input_bytes = content.len(),
        output_bytes = result.markdown.len(),
        "converted document"
    );
    Ok(result)
}

/// Plain-text formats are read as UTF-8; invalid sequences are replaced
fn decode_text(content: &[u8]) -> Cow<'_, str> {
    String::from_utf8_lossy(content)
}

/// Decode HTML character references (`&amp;`, `&#8212;`, `&eacute;`, ...)
pub fn decode_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}
