//! reStructuredText to Markdown
//!
//! A line-oriented rewrite rather than a full docutils parse: section
//! headings become ATX headings (levels assigned by first appearance of each
//! adornment), directive and anchor lines are dropped, and `image`/`figure`
//! directives become Markdown images. Everything else passes through.

use regex::Regex;
use std::sync::OnceLock;

use super::ConversionResult;
use super::structure::{
    HeadingPatternTable, HeadingStyle, TITLE_UNDERLINE_CHARS, display_len, is_directive_line,
    markdown_heading, underline_char,
};

/// Convert an RST document, extracting its title first
pub fn convert(text: &str) -> ConversionResult {
    let title = extract_title(text);
    let markdown = convert_images(&convert_headings(text));
    ConversionResult { markdown, title }
}

/// A heading matched at some line position
struct HeadingMatch<'a> {
    adornment: char,
    style: HeadingStyle,
    text: &'a str,
    /// Lines consumed by the heading, adornment included
    span: usize,
}

/// Overline, text, identical underline
fn match_overline<'a>(lines: &[&'a str], i: usize) -> Option<HeadingMatch<'a>> {
    if i + 2 >= lines.len() {
        return None;
    }
    let overline = lines[i].trim();
    let adornment = underline_char(overline)?;
    let text = lines[i + 1].trim();
    let underline = lines[i + 2].trim();
    if text.is_empty() || overline != underline {
        return None;
    }
    Some(HeadingMatch {
        adornment,
        style: HeadingStyle::OverlineUnderline,
        text,
        span: 3,
    })
}

/// Text followed by an underline at least as long as the text
fn match_underline<'a>(lines: &[&'a str], i: usize) -> Option<HeadingMatch<'a>> {
    if i + 1 >= lines.len() {
        return None;
    }
    let text = lines[i].trim();
    if text.is_empty() {
        return None;
    }
    let underline = lines[i + 1].trim();
    let adornment = underline_char(underline)?;
    if display_len(underline) < display_len(text) {
        return None;
    }
    Some(HeadingMatch {
        adornment,
        style: HeadingStyle::Underline,
        text,
        span: 2,
    })
}

/// Find the document title: the first heading outside directive lines
///
/// An overline/underline heading is accepted with any adornment character.
/// An underline-only heading is accepted only when adorned with one of
/// `= - ~ # *`, which keeps transitions and table borders from being
/// mistaken for the title.
///
/// # Examples
///
/// ```rust
/// use docloader::formats::rst::extract_title;
///
/// assert_eq!(extract_title("Main Title\n==========\n\nContent"), "Main Title");
/// assert_eq!(extract_title("####\nTop\n####\n"), "Top");
/// assert_eq!(extract_title("just text\n"), "");
/// ```
pub fn extract_title(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();

    for i in 0..lines.len().saturating_sub(1) {
        let current = lines[i].trim();
        if is_directive_line(current) {
            continue;
        }

        if let Some(heading) = match_overline(&lines, i)
            && !is_directive_line(heading.text)
        {
            return clean_heading_text(heading.text);
        }

        let next = lines[i + 1].trim();
        if current.is_empty() || next.is_empty() {
            continue;
        }
        if let Some(adornment) = underline_char(next)
            && TITLE_UNDERLINE_CHARS.contains(&adornment)
            && display_len(next) >= display_len(current)
        {
            return clean_heading_text(current);
        }
    }

    String::new()
}

/// Rewrite section headings as Markdown headings and drop directive lines
///
/// Overline/underline headings are checked before underline-only ones.
/// Heading levels come from a fresh [`HeadingPatternTable`].
pub fn convert_headings(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut table = HeadingPatternTable::new();
    let mut output: Vec<String> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        if is_directive_line(lines[i].trim()) {
            i += 1;
            continue;
        }

        let heading = match_overline(&lines, i).or_else(|| match_underline(&lines, i));
        match heading {
            Some(heading) => {
                let level = table.level_for(heading.adornment, heading.style);
                output.push(markdown_heading(level, &clean_heading_text(heading.text)));
                i += heading.span;
            }
            None => {
                output.push(lines[i].to_string());
                i += 1;
            }
        }
    }

    output.join("\n")
}

/// Rewrite `image` and `figure` directives as Markdown images
///
/// Indented option lines directly below the directive are consumed; only
/// `:alt:` is used. A blank line is emitted after each image.
///
/// # Examples
///
/// ```rust
/// use docloader::formats::rst::convert_images;
///
/// let rst = ".. image:: images/screenshot.png\n   :alt: Screenshot of the application\n\nNext";
/// assert_eq!(
///     convert_images(rst),
///     "![Screenshot of the application](images/screenshot.png)\n\n\nNext"
/// );
/// ```
pub fn convert_images(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut output: Vec<String> = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let trimmed = lines[i].trim();
        let Some(path) = image_directive_target(trimmed) else {
            output.push(lines[i].to_string());
            i += 1;
            continue;
        };

        let mut alt = "";
        let mut j = i + 1;
        while j < lines.len() {
            let option = lines[j].trim();
            if option.is_empty() || !(lines[j].starts_with("   ") || lines[j].starts_with('\t')) {
                break;
            }
            if let Some(value) = option.strip_prefix(":alt:") {
                alt = value.trim();
            }
            j += 1;
        }

        output.push(format!("![{alt}]({path})"));
        output.push(String::new());
        i = j;
    }

    output.join("\n")
}

fn image_directive_target(trimmed: &str) -> Option<&str> {
    if !(trimmed.starts_with(".. image::") || trimmed.starts_with(".. figure::")) {
        return None;
    }
    trimmed.split_once("::").map(|(_, target)| target.trim())
}

/// Strip inline roles from heading text
///
/// `` `text`:role: `` keeps `text`; a bare `:role:` is removed.
///
/// # Examples
///
/// ```rust
/// use docloader::formats::rst::clean_heading_text;
///
/// assert_eq!(clean_heading_text("`pgEdge`:index: Setup"), "pgEdge Setup");
/// assert_eq!(clean_heading_text(" :ref: Overview "), "Overview");
/// ```
pub fn clean_heading_text(text: &str) -> String {
    static ROLE_WITH_TEXT: OnceLock<Option<Regex>> = OnceLock::new();
    static BARE_ROLE: OnceLock<Option<Regex>> = OnceLock::new();

    let mut cleaned = text.to_string();
    if let Some(re) = ROLE_WITH_TEXT
        .get_or_init(|| Regex::new(r"`([^`]+)`:[a-zA-Z]+:").ok())
        .as_ref()
    {
        cleaned = re.replace_all(&cleaned, "${1}").into_owned();
    }
    if let Some(re) = BARE_ROLE
        .get_or_init(|| Regex::new(r":[a-zA-Z]+:").ok())
        .as_ref()
    {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }

    cleaned.trim().to_string()
}
