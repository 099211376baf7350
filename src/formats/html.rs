//! HTML to Markdown
//!
//! The page body goes through the DOM converter with every heading pushed
//! down one level; the `<title>` then becomes the only level-one heading.

use regex::Regex;
use std::sync::OnceLock;

use super::{ConversionResult, decode_entities};
use crate::charset::decode_to_utf8;
use crate::converter::{ConversionOptions, MarkdownConverter};
use crate::parser::parse_html_bytes;

/// Levels every `<hN>` is shifted by to make room for the title
const HEADING_OFFSET: usize = 1;

/// Convert an HTML page and promote its `<title>`
///
/// # Examples
///
/// ```rust
/// use docloader::formats::html::convert;
///
/// let page = b"<html><head><title>Test &#8212; Title</title></head>\
///              <body><h1>Intro</h1><p>Content with &#8212; dash</p></body></html>";
/// let result = convert(page);
/// assert_eq!(result.title, "Test — Title");
/// assert_eq!(result.markdown, "# Test — Title\n\n## Intro\n\nContent with — dash");
/// ```
pub fn convert(content: &[u8]) -> ConversionResult {
    let dom = match parse_html_bytes(content) {
        Ok(dom) => dom,
        Err(err) => {
            tracing::debug!(error = %err, "empty HTML document");
            return ConversionResult::default();
        }
    };

    let converter = MarkdownConverter::with_options(ConversionOptions {
        heading_offset: HEADING_OFFSET,
        ..Default::default()
    });
    let body = converter.convert(&dom);
    let body = body.trim();

    let Some(raw_title) = capture_title(&decode_to_utf8(content)) else {
        return ConversionResult {
            markdown: body.to_string(),
            title: String::new(),
        };
    };
    let title = decode_entities(&raw_title).trim().to_string();
    if title.is_empty() {
        return ConversionResult {
            markdown: body.to_string(),
            title,
        };
    }

    // The converter renders the title as the first line of text. Compare
    // with the decoded form first, then whitespace-collapsed, then raw.
    let collapsed = title.split_whitespace().collect::<Vec<_>>().join(" ");
    let body = [title.as_str(), collapsed.as_str(), raw_title.trim()]
        .into_iter()
        .find_map(|candidate| strip_leading_line(body, candidate))
        .unwrap_or(body)
        .trim();

    ConversionResult {
        markdown: format!("# {title}\n\n{body}"),
        title,
    }
}

/// Decoded, trimmed text of the first `<title>` element, or empty
pub fn extract_title(content: &[u8]) -> String {
    capture_title(&decode_to_utf8(content))
        .map(|raw| decode_entities(&raw).trim().to_string())
        .unwrap_or_default()
}

/// Undecoded text of the first `<title>` element
fn capture_title(text: &str) -> Option<String> {
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = TITLE
        .get_or_init(|| Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").ok())
        .as_ref()?;
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// `body` without a leading line equal to `line`
fn strip_leading_line<'a>(body: &'a str, line: &str) -> Option<&'a str> {
    if line.is_empty() {
        return None;
    }
    let rest = body.strip_prefix(line)?;
    (rest.is_empty() || rest.starts_with('\n')).then_some(rest)
}
