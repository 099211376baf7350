//! Character encoding detection and decoding
//!
//! Documents are read from disk as raw bytes. HTML and SGML/DocBook files
//! may declare their encoding in-band, so before conversion the bytes are
//! decoded to UTF-8 following a detection cascade:
//!
//! 1. **Byte Order Mark**: UTF-8, UTF-16LE or UTF-16BE BOM
//! 2. **XML Declaration**: `<?xml version="1.0" encoding="ISO-8859-1"?>`
//! 3. **HTML Meta Tags**: `<meta charset>` or `<meta http-equiv="Content-Type">`
//! 4. **Default to UTF-8**: If nothing is declared
//!
//! Decoding through [`decode_to_utf8`] never fails: bytes that are invalid
//! for the detected charset fall back to lossy UTF-8 so every document
//! still yields text.
//!
//! # Examples
//!
//! ```rust
//! use docloader::charset::detect_charset;
//!
//! // Detect from the XML declaration
//! let charset = detect_charset(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><book/>");
//! assert_eq!(charset, "ISO-8859-1");
//!
//! // Detect from HTML meta tag
//! let html = b"<html><head><meta charset=\"UTF-8\"></head></html>";
//! assert_eq!(detect_charset(html), "UTF-8");
//!
//! // Default to UTF-8
//! assert_eq!(detect_charset(b"<html><body>No charset</body></html>"), "UTF-8");
//! ```

use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use crate::error::ConversionError;

/// Default charset when detection fails
const DEFAULT_CHARSET: &str = "UTF-8";

/// Maximum bytes to scan for in-band charset declarations (first 1024 bytes)
const DECLARATION_SCAN_LIMIT: usize = 1024;

/// Detect character encoding using the detection cascade
///
/// Always returns a charset name, normalized to uppercase, defaulting to
/// "UTF-8" when the content declares nothing.
///
/// # Examples
///
/// ```rust
/// use docloader::charset::detect_charset;
///
/// // A BOM wins over any declaration
/// let charset = detect_charset(b"\xEF\xBB\xBF<meta charset=\"ISO-8859-1\">");
/// assert_eq!(charset, "UTF-8");
/// ```
pub fn detect_charset(content: &[u8]) -> String {
    if let Some((encoding, _)) = encoding_rs::Encoding::for_bom(content) {
        return normalize_charset(encoding.name());
    }

    if let Some(charset) = extract_charset_from_xml_declaration(content) {
        return normalize_charset(&charset);
    }

    if let Some(charset) = extract_charset_from_html(content) {
        return normalize_charset(&charset);
    }

    DEFAULT_CHARSET.to_string()
}

/// Extract the `encoding` pseudo-attribute from an XML declaration
///
/// Only a declaration at the very start of the document (optionally after
/// whitespace) is considered, as required by XML.
///
/// # Examples
///
/// ```rust
/// use docloader::charset::extract_charset_from_xml_declaration;
///
/// assert_eq!(
///     extract_charset_from_xml_declaration(b"<?xml version=\"1.0\" encoding='windows-1252'?>"),
///     Some("windows-1252".to_string())
/// );
/// assert_eq!(extract_charset_from_xml_declaration(b"<?xml version=\"1.0\"?>"), None);
/// ```
pub fn extract_charset_from_xml_declaration(content: &[u8]) -> Option<String> {
    let scan_limit = std::cmp::min(content.len(), DECLARATION_SCAN_LIMIT);
    let prefix = String::from_utf8_lossy(&content[..scan_limit]);

    static XML_DECL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let regex = XML_DECL_REGEX.get_or_init(|| {
        Regex::new(r#"^\s*<\?xml\s[^?]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#).ok()
    });
    let regex = regex.as_ref()?;

    regex
        .captures(&prefix)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Extract charset from HTML meta tags
///
/// Scans the first 1024 bytes for charset declarations in meta tags.
///
/// # Supported Formats
///
/// - HTML5: `<meta charset="UTF-8">`
/// - HTML4: `<meta http-equiv="Content-Type" content="text/html; charset=UTF-8">`
///
/// # Examples
///
/// ```rust
/// use docloader::charset::extract_charset_from_html;
///
/// // HTML5 meta charset
/// let html = b"<html><head><meta charset=\"UTF-8\"></head></html>";
/// assert_eq!(extract_charset_from_html(html), Some("UTF-8".to_string()));
///
/// // HTML4 meta http-equiv
/// let html = b"<meta http-equiv=\"Content-Type\" content=\"text/html; charset=ISO-8859-1\">";
/// assert_eq!(extract_charset_from_html(html), Some("ISO-8859-1".to_string()));
///
/// // No charset found
/// let html = b"<html><body>No charset</body></html>";
/// assert_eq!(extract_charset_from_html(html), None);
/// ```
pub fn extract_charset_from_html(html: &[u8]) -> Option<String> {
    let scan_limit = std::cmp::min(html.len(), DECLARATION_SCAN_LIMIT);
    let html_prefix = &html[..scan_limit];

    // Lossy conversion is fine here: the declarations themselves are ASCII
    let html_str = String::from_utf8_lossy(html_prefix);

    static HTML5_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let html5_regex =
        HTML5_REGEX.get_or_init(|| Regex::new(r#"(?i)<meta\s+charset\s*=\s*"?([^";>\s]+)"?"#).ok());
    let html5_regex = html5_regex.as_ref()?;

    if let Some(caps) = html5_regex.captures(&html_str)
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().to_string());
    }

    static HTML4_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    let html4_regex = HTML4_REGEX.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta\s+http-equiv\s*=\s*"?Content-Type"?\s+content\s*=\s*"?[^">]*charset\s*=\s*([^";>\s]+)"?"#,
        )
        .ok()
    });
    let html4_regex = html4_regex.as_ref()?;

    if let Some(caps) = html4_regex.captures(&html_str)
        && let Some(m) = caps.get(1)
    {
        return Some(m.as_str().to_string());
    }

    None
}

/// Normalize charset name to uppercase
///
/// ```rust
/// use docloader::charset::normalize_charset;
///
/// assert_eq!(normalize_charset("utf-8"), "UTF-8");
/// assert_eq!(normalize_charset("windows-1252"), "WINDOWS-1252");
/// ```
pub fn normalize_charset(charset: &str) -> String {
    charset.to_uppercase()
}

/// Decode bytes with an explicit charset
///
/// A leading BOM matching the charset is skipped.
///
/// # Errors
///
/// - `ConversionError::EncodingError` if the charset label is unknown or the
///   bytes are invalid for it
pub fn decode_with_charset<'a>(
    content: &'a [u8],
    charset: &str,
) -> Result<Cow<'a, str>, ConversionError> {
    let encoding = encoding_rs::Encoding::for_label(charset.as_bytes()).ok_or_else(|| {
        ConversionError::EncodingError(format!("Unsupported charset '{}'", charset))
    })?;

    let body = match encoding_rs::Encoding::for_bom(content) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &content[bom_len..],
        _ => content,
    };

    if encoding == encoding_rs::UTF_8 {
        return std::str::from_utf8(body).map(Cow::Borrowed).map_err(|e| {
            ConversionError::EncodingError(format!(
                "Invalid UTF-8 at byte position {}: {}",
                e.valid_up_to(),
                e
            ))
        });
    }

    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| {
            ConversionError::EncodingError(format!(
                "Invalid byte sequence for charset '{}'",
                charset
            ))
        })
}

/// Decode document bytes to UTF-8 text using the detection cascade
///
/// Never fails: when the detected charset is unknown or the bytes do not
/// decode cleanly, invalid sequences are replaced with U+FFFD.
pub fn decode_to_utf8(content: &[u8]) -> Cow<'_, str> {
    let charset = detect_charset(content);
    match decode_with_charset(content, &charset) {
        Ok(text) => text,
        Err(err) => {
            tracing::debug!(%charset, error = %err, "falling back to lossy UTF-8 decoding");
            String::from_utf8_lossy(content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ============================================================================
    // XML declaration
    // ============================================================================

    #[test]
    fn test_xml_declaration_double_quotes() {
        let xml = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<book/>";
        assert_eq!(
            extract_charset_from_xml_declaration(xml),
            Some("UTF-8".to_string())
        );
    }

    #[test]
    fn test_xml_declaration_leading_whitespace() {
        let xml = b"\n  <?xml version=\"1.0\" encoding=\"latin1\"?><book/>";
        assert_eq!(
            extract_charset_from_xml_declaration(xml),
            Some("latin1".to_string())
        );
    }

    #[test]
    fn test_xml_declaration_not_at_start_is_ignored() {
        let xml = b"<book><?xml version=\"1.0\" encoding=\"latin1\"?></book>";
        assert_eq!(extract_charset_from_xml_declaration(xml), None);
    }

    // ============================================================================
    // HTML meta tags
    // ============================================================================

    #[test]
    fn test_extract_charset_from_html_html5_no_quotes() {
        let html = b"<meta charset=UTF-8>";
        assert_eq!(extract_charset_from_html(html), Some("UTF-8".to_string()));
    }

    #[test]
    fn test_extract_charset_from_html_case_insensitive() {
        let html = b"<META CHARSET=\"iso-8859-1\">";
        assert_eq!(
            extract_charset_from_html(html),
            Some("iso-8859-1".to_string())
        );
    }

    #[test]
    fn test_extract_charset_from_html_beyond_scan_limit() {
        let mut html = vec![b' '; 2048];
        html.extend_from_slice(b"<meta charset=\"ISO-8859-1\">");
        assert_eq!(extract_charset_from_html(&html), None);
    }

    // ============================================================================
    // Cascade
    // ============================================================================

    #[test]
    fn test_detect_charset_bom_has_priority() {
        let content = b"\xEF\xBB\xBF<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>";
        assert_eq!(detect_charset(content), "UTF-8");
    }

    #[test]
    fn test_detect_charset_xml_before_meta() {
        let content =
            b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><html><meta charset=\"UTF-8\"></html>";
        assert_eq!(detect_charset(content), "WINDOWS-1252");
    }

    #[test]
    fn test_detect_charset_fallback_to_default() {
        assert_eq!(detect_charset(b"plain text"), "UTF-8");
        assert_eq!(detect_charset(b""), "UTF-8");
    }

    // ============================================================================
    // Decoding
    // ============================================================================

    #[test]
    fn test_decode_iso_8859_1_declaration() {
        let content = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><para>Caf\xE9</para>";
        let text = decode_to_utf8(content);
        assert!(text.contains("Café"), "got {text:?}");
    }

    #[test]
    fn test_decode_windows_1252_meta() {
        let content = b"<meta charset=\"windows-1252\"><p>Price \x80 10</p>";
        let text = decode_to_utf8(content);
        assert!(text.contains("Price € 10"), "got {text:?}");
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        let text = decode_to_utf8(b"\xEF\xBB\xBF<p>Hi</p>");
        assert_eq!(text, "<p>Hi</p>");
    }

    #[test]
    fn test_decode_utf16le_bom() {
        let content = b"\xFF\xFE<\0p\0>\0";
        assert_eq!(decode_to_utf8(content), "<p>");
    }

    #[test]
    fn test_decode_invalid_utf8_falls_back_to_lossy() {
        let text = decode_to_utf8(b"<p>bad \xFF byte</p>");
        assert_eq!(text, "<p>bad \u{FFFD} byte</p>");
    }

    #[test]
    fn test_decode_unknown_charset_falls_back_to_lossy() {
        let text = decode_to_utf8(b"<meta charset=\"x-unknown-test\"><p>ok</p>");
        assert!(text.contains("<p>ok</p>"));
    }

    #[test]
    fn test_decode_with_charset_reports_unknown_label() {
        match decode_with_charset(b"abc", "x-unknown-test") {
            Err(ConversionError::EncodingError(message)) => {
                assert!(message.contains("Unsupported charset"));
            }
            other => panic!("Expected EncodingError, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_valid_utf8_is_borrowed() {
        let content = "<p>✓ Unicode</p>".as_bytes();
        assert!(matches!(decode_to_utf8(content), Cow::Borrowed(_)));
    }

    // ============================================================================
    // Property-Based Tests
    // ============================================================================

    proptest! {
        #[test]
        fn prop_decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode_to_utf8(&bytes);
        }

        #[test]
        fn prop_valid_utf8_without_declaration_is_unchanged(text in "[a-zA-Z0-9 .,\u{e9}\u{4e2d}]{0,200}") {
            let decoded = decode_to_utf8(text.as_bytes());
            prop_assert_eq!(decoded.as_ref(), text.as_str());
        }
    }
}
