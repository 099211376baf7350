//! HTML5 parser using html5ever
//!
//! Parsing follows the WHATWG algorithm, so malformed pages (unclosed tags,
//! misnested inline elements, stray end tags) still produce a tree. Input
//! bytes are decoded to UTF-8 first through [`crate::charset`].
//!
//! # Examples
//!
//! ```rust
//! use docloader::parser::parse_html_bytes;
//!
//! let dom = parse_html_bytes(b"<html><body><h1>Hello").expect("non-empty input parses");
//! assert!(!dom.document.children.borrow().is_empty());
//! ```

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::RcDom;

use crate::charset::decode_to_utf8;
use crate::error::ConversionError;

/// Parse already decoded HTML text into a DOM tree
pub fn parse_html(html: &str) -> RcDom {
    parse_document(RcDom::default(), Default::default()).one(html)
}

/// Decode HTML bytes and parse them into a DOM tree
///
/// Decoding uses the charset detection cascade and never fails; bytes that
/// are invalid for the detected charset are replaced.
///
/// # Errors
///
/// - `ConversionError::InvalidInput` if the input is empty
pub fn parse_html_bytes(html: &[u8]) -> Result<RcDom, ConversionError> {
    if html.is_empty() {
        return Err(ConversionError::InvalidInput(
            "HTML input is empty".to_string(),
        ));
    }

    let text = decode_to_utf8(html);
    Ok(parse_html(&text))
}
