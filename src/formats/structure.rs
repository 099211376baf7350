//! Heading and structure matching shared by the RST and DocBook converters
//!
//! reStructuredText has no fixed heading levels: a document declares them
//! implicitly through the order in which underline styles first appear.
//! [`HeadingPatternTable`] records that order for a single document.
//! DocBook, in contrast, encodes the level in the element name, which
//! [`SGML_HEADINGS`] maps to a fixed Markdown level.

/// Characters reStructuredText accepts as section adornment
pub const RST_PUNCTUATION: &str = "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Characters accepted below a line when guessing the document title
pub const TITLE_UNDERLINE_CHARS: &[char] = &['=', '-', '~', '#', '*'];

/// Deepest heading level Markdown can express
pub const MAX_HEADING_LEVEL: u8 = 6;

/// Returns true if `c` can be used as RST section adornment
pub fn is_rst_punctuation(c: char) -> bool {
    RST_PUNCTUATION.contains(c)
}

/// Returns true if `line` is a run of one repeated adornment character
///
/// # Examples
///
/// ```rust
/// use docloader::formats::structure::is_underline;
///
/// assert!(is_underline("====="));
/// assert!(is_underline("~"));
/// assert!(!is_underline("=-=-"));
/// assert!(!is_underline("aaaa"));
/// assert!(!is_underline(""));
/// ```
pub fn is_underline(line: &str) -> bool {
    underline_char(line).is_some()
}

/// The adornment character of an underline, if `line` is one
pub fn underline_char(line: &str) -> Option<char> {
    let mut chars = line.chars();
    let first = chars.next()?;
    if !is_rst_punctuation(first) {
        return None;
    }
    chars.all(|c| c == first).then_some(first)
}

/// Returns true for RST directive, label and anchor lines (`.. name:`, `.. _name:`)
///
/// The line must already be trimmed.
pub fn is_directive_line(trimmed: &str) -> bool {
    trimmed.starts_with("..") && trimmed.ends_with(':')
}

/// Length of a line in characters, used when comparing a heading with its underline
pub fn display_len(line: &str) -> usize {
    line.chars().count()
}

/// Adornment style of an RST heading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingStyle {
    /// Text followed by an underline
    Underline,
    /// Text enclosed by an identical overline and underline
    OverlineUnderline,
}

/// Per-document mapping from adornment to Markdown heading level
///
/// Levels are handed out in order of first appearance, starting at 1. Once
/// level 6 is reached every new adornment also maps to 6. The same
/// character used with a different [`HeadingStyle`] is a distinct key.
///
/// # Examples
///
/// ```rust
/// use docloader::formats::structure::{HeadingPatternTable, HeadingStyle};
///
/// let mut table = HeadingPatternTable::new();
/// assert_eq!(table.level_for('=', HeadingStyle::Underline), 1);
/// assert_eq!(table.level_for('=', HeadingStyle::OverlineUnderline), 2);
/// assert_eq!(table.level_for('=', HeadingStyle::Underline), 1);
/// ```
#[derive(Debug, Clone)]
pub struct HeadingPatternTable {
    entries: Vec<((char, HeadingStyle), u8)>,
    next_level: u8,
}

impl HeadingPatternTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_level: 1,
        }
    }

    /// Look up the level for an adornment, assigning the next free level on first use
    pub fn level_for(&mut self, adornment: char, style: HeadingStyle) -> u8 {
        let key = (adornment, style);
        if let Some((_, level)) = self.entries.iter().find(|(k, _)| *k == key) {
            return *level;
        }

        let level = self.next_level;
        self.entries.push((key, level));
        self.next_level = (self.next_level + 1).min(MAX_HEADING_LEVEL);
        level
    }

    /// Number of distinct adornments seen so far
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for HeadingPatternTable {
    fn default() -> Self {
        Self::new()
    }
}

/// DocBook section elements and the Markdown level each one becomes
///
/// Order matters: rewrite passes run through the table front to back.
pub const SGML_HEADINGS: &[(&str, u8)] = &[
    ("chapter", 1),
    ("appendix", 1),
    ("article", 1),
    ("book", 1),
    ("sect1", 2),
    ("refsect1", 2),
    ("refsynopsisdiv", 2),
    ("sect2", 3),
    ("refsect2", 3),
    ("sect3", 4),
    ("refsect3", 4),
    ("sect4", 5),
    ("sect5", 6),
    // Generic fallback
    ("section", 2),
];

/// Markdown level for a DocBook section element, case-insensitive
pub fn sgml_heading_level(tag: &str) -> Option<u8> {
    SGML_HEADINGS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tag))
        .map(|(_, level)| *level)
}

/// Render a Markdown ATX heading
pub fn markdown_heading(level: u8, text: &str) -> String {
    let level = level.clamp(1, MAX_HEADING_LEVEL) as usize;
    format!("{} {}", "#".repeat(level), text)
}
