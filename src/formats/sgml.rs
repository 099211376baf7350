//! SGML/DocBook to Markdown
//!
//! DocBook sources (PostgreSQL reference pages in particular) are rewritten
//! by a fixed sequence of text passes. Each pass is total: it replaces
//! well-formed matches and leaves anything else untouched, so malformed
//! markup degrades into stray text instead of an error. Pass order is
//! significant; list items must be handled before generic paragraphs, and
//! tag stripping must come after every element-specific rewrite.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use super::structure::{SGML_HEADINGS, markdown_heading};
use super::{ConversionResult, decode_entities};

/// A single rewrite pass over the cumulative output
type Pass = fn(&str) -> String;

/// The rewrite pipeline, in application order
const PIPELINE: &[(&str, Pass)] = &[
    ("comments", strip_comments),
    ("declarations", strip_declarations),
    ("headings", convert_headings),
    ("lists", convert_lists),
    ("paragraphs", convert_paragraphs),
    ("emphasis", convert_emphasis),
    ("inline-code", convert_inline_code),
    ("code-blocks", convert_code_blocks),
    ("links", convert_links),
    ("xrefs", convert_xrefs),
    ("refentry", convert_refentry),
    ("tags", strip_tags),
    ("entities", decode_remaining_entities),
    ("whitespace", normalize_whitespace),
];

/// Convert a DocBook document and promote its title to a level-one heading
pub fn convert(text: &str) -> ConversionResult {
    let title = extract_title(text);
    let mut markdown = convert_tags(text);

    if !title.is_empty() {
        let heading = format!("# {title}");
        let trimmed = markdown.trim();
        markdown = if trimmed.starts_with(&heading) {
            trimmed.to_string()
        } else {
            format!("{heading}\n\n{trimmed}")
        };
    }

    ConversionResult { markdown, title }
}

/// Run the full rewrite pipeline without title promotion
pub fn convert_tags(text: &str) -> String {
    PIPELINE.iter().fold(text.to_string(), |acc, (name, pass)| {
        let next = pass(&acc);
        tracing::trace!(pass = name, before = acc.len(), after = next.len(), "sgml pass");
        next
    })
}

/// Document title: the first `<refentrytitle>`, else the first `<title>`
///
/// # Examples
///
/// ```rust
/// use docloader::formats::sgml::extract_title;
///
/// let doc = "<refentry><refmeta><refentrytitle>SELECT</refentrytitle></refmeta>\
///            <refsect1><title>Description</title></refsect1></refentry>";
/// assert_eq!(extract_title(doc), "SELECT");
/// assert_eq!(extract_title("<book><title>Guide &amp; Notes</title></book>"), "Guide & Notes");
/// ```
pub fn extract_title(text: &str) -> String {
    static REFENTRYTITLE: OnceLock<Option<Regex>> = OnceLock::new();
    static TITLE: OnceLock<Option<Regex>> = OnceLock::new();

    let candidates = [
        REFENTRYTITLE
            .get_or_init(|| Regex::new(r"(?i)<refentrytitle[^>]*>([^<]+)</refentrytitle>").ok()),
        TITLE.get_or_init(|| Regex::new(r"(?i)<title[^>]*>([^<]+)</title>").ok()),
    ];

    candidates
        .into_iter()
        .filter_map(Option::as_ref)
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .unwrap_or_default()
}

/// Apply a lazily compiled regex; a pattern that failed to compile is a no-op
fn replace_all(
    cell: &'static OnceLock<Option<Regex>>,
    pattern: &str,
    text: &str,
    replacement: &str,
) -> String {
    match cell.get_or_init(|| Regex::new(pattern).ok()) {
        Some(re) => re.replace_all(text, replacement).into_owned(),
        None => text.to_string(),
    }
}

/// Remove `<!-- ... -->` comments
///
/// An unterminated comment stops the scan; the rest of the input is kept.
pub fn strip_comments(text: &str) -> String {
    let mut result = text.to_string();
    let mut from = 0;

    while let Some(offset) = result[from..].find("<!--") {
        let start = from + offset;
        let Some(len) = result[start..].find("-->") else {
            break;
        };
        result.replace_range(start..start + len + 3, "");
        // Removal can join a `<!` prefix with a following `--`
        from = start.saturating_sub(3);
        while !result.is_char_boundary(from) {
            from -= 1;
        }
    }

    result
}

fn strip_declarations(text: &str) -> String {
    static DOCTYPE: OnceLock<Option<Regex>> = OnceLock::new();
    static XML_DECL: OnceLock<Option<Regex>> = OnceLock::new();

    let text = replace_all(&DOCTYPE, r"(?i)<!DOCTYPE[^>]*>", text, "");
    replace_all(&XML_DECL, r"<\?xml[^?]*\?>", &text, "")
}

struct HeadingRule {
    open: Regex,
    close: Regex,
    level: u8,
}

fn heading_rules() -> &'static [HeadingRule] {
    static RULES: OnceLock<Vec<HeadingRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        SGML_HEADINGS
            .iter()
            .filter_map(|(tag, level)| {
                let open =
                    Regex::new(&format!(r"(?is)<{tag}[^>]*>\s*<title[^>]*>([^<]*)</title>")).ok()?;
                let close = Regex::new(&format!(r"(?i)</{tag}>")).ok()?;
                Some(HeadingRule {
                    open,
                    close,
                    level: *level,
                })
            })
            .collect()
    })
}

/// Section elements with a leading `<title>` become Markdown headings
fn convert_headings(text: &str) -> String {
    heading_rules()
        .iter()
        .fold(text.to_string(), |acc, rule| {
            let acc = rule.open.replace_all(&acc, |caps: &Captures| {
                let title = decode_entities(caps[1].trim());
                format!("\n{}\n", markdown_heading(rule.level, &title))
            });
            rule.close.replace_all(&acc, "\n").into_owned()
        })
}

fn convert_lists(text: &str) -> String {
    static ITEM_WITH_PARA: OnceLock<Option<Regex>> = OnceLock::new();
    static ITEM: OnceLock<Option<Regex>> = OnceLock::new();
    static PARA_ITEM_END: OnceLock<Option<Regex>> = OnceLock::new();
    static ITEM_END: OnceLock<Option<Regex>> = OnceLock::new();
    static CONTAINER: OnceLock<Option<Regex>> = OnceLock::new();

    let text = replace_all(
        &ITEM_WITH_PARA,
        r"(?i)<listitem[^>]*>\s*<para[^>]*>",
        text,
        "\n- ",
    );
    let text = replace_all(&ITEM, r"(?i)<listitem[^>]*>", &text, "\n- ");
    let text = replace_all(&PARA_ITEM_END, r"(?i)</para>\s*</listitem>", &text, "");
    let text = replace_all(&ITEM_END, r"(?i)</listitem>", &text, "");
    replace_all(
        &CONTAINER,
        r"(?i)</?(?:itemizedlist|orderedlist|variablelist|simplelist)[^>]*>",
        &text,
        "\n",
    )
}

fn convert_paragraphs(text: &str) -> String {
    static PARA: OnceLock<Option<Regex>> = OnceLock::new();
    static PARA_END: OnceLock<Option<Regex>> = OnceLock::new();

    let text = replace_all(&PARA, r"(?i)<para[^>]*>", text, "\n\n");
    replace_all(&PARA_END, r"(?i)</para>", &text, "\n\n")
}

fn convert_emphasis(text: &str) -> String {
    static EMPHASIS: OnceLock<Option<Regex>> = OnceLock::new();
    replace_all(
        &EMPHASIS,
        r"(?i)<emphasis[^>]*>([^<]*)</emphasis>",
        text,
        "*${1}*",
    )
}

/// Elements rendered as inline code, in rewrite order
const INLINE_CODE_ELEMENTS: &[&str] = &[
    "literal",
    "command",
    "filename",
    "function",
    "type",
    "varname",
    "option",
    "parameter",
    "constant",
    "replaceable",
];

fn convert_inline_code(text: &str) -> String {
    static RULES: OnceLock<Vec<Regex>> = OnceLock::new();
    let rules = RULES.get_or_init(|| {
        INLINE_CODE_ELEMENTS
            .iter()
            .filter_map(|element| {
                Regex::new(&format!(r"(?i)<{element}[^>]*>([^<]*)</{element}>")).ok()
            })
            .collect()
    });

    rules.iter().fold(text.to_string(), |acc, re| {
        re.replace_all(&acc, "`${1}`").into_owned()
    })
}

fn convert_code_blocks(text: &str) -> String {
    static PROGRAMLISTING: OnceLock<Option<Regex>> = OnceLock::new();
    static SCREEN: OnceLock<Option<Regex>> = OnceLock::new();

    let blocks = [
        PROGRAMLISTING
            .get_or_init(|| Regex::new(r"(?is)<programlisting[^>]*>(.*?)</programlisting>").ok()),
        SCREEN.get_or_init(|| Regex::new(r"(?is)<screen[^>]*>(.*?)</screen>").ok()),
    ];

    blocks
        .into_iter()
        .filter_map(Option::as_ref)
        .fold(text.to_string(), |acc, re| {
            re.replace_all(&acc, |caps: &Captures| {
                format!("\n```\n{}\n```\n", caps[1].trim())
            })
            .into_owned()
        })
}

fn convert_links(text: &str) -> String {
    static ULINK: OnceLock<Option<Regex>> = OnceLock::new();
    replace_all(
        &ULINK,
        r#"(?i)<ulink[^>]*url="([^"]*)"[^>]*>([^<]*)</ulink>"#,
        text,
        "[${2}](${1})",
    )
}

fn convert_xrefs(text: &str) -> String {
    static XREF: OnceLock<Option<Regex>> = OnceLock::new();
    replace_all(
        &XREF,
        r#"(?i)<xref[^>]*linkend="([^"]*)"[^>]*/>"#,
        text,
        "`${1}`",
    )
}

/// Drop `<refentry>` wrappers and render `<refnamediv>` as name and purpose
fn convert_refentry(text: &str) -> String {
    static REFENTRY: OnceLock<Option<Regex>> = OnceLock::new();
    static REFENTRY_END: OnceLock<Option<Regex>> = OnceLock::new();
    static REFNAMEDIV: OnceLock<Option<Regex>> = OnceLock::new();

    let text = replace_all(&REFENTRY, r"(?is)<refentry[^>]*>", text, "");
    let text = replace_all(&REFENTRY_END, r"(?i)</refentry>", &text, "");

    let refnamediv = REFNAMEDIV.get_or_init(|| {
        Regex::new(
            r"(?is)<refnamediv[^>]*>.*?<refname[^>]*>([^<]*)</refname>.*?<refpurpose[^>]*>([^<]*)</refpurpose>.*?</refnamediv>",
        )
        .ok()
    });
    match refnamediv {
        Some(re) => re
            .replace_all(&text, |caps: &Captures| {
                let name = decode_entities(caps[1].trim());
                let purpose = decode_entities(caps[2].trim());
                format!("\n{}\n\n{purpose}\n", markdown_heading(2, &name))
            })
            .into_owned(),
        None => text,
    }
}

fn strip_tags(text: &str) -> String {
    static TAG: OnceLock<Option<Regex>> = OnceLock::new();
    replace_all(&TAG, r"<[^>]+>", text, "")
}

fn decode_remaining_entities(text: &str) -> String {
    decode_entities(text)
}

/// Collapse blank-line runs, right-trim lines, trim the whole text
fn normalize_whitespace(text: &str) -> String {
    static BLANK_RUNS: OnceLock<Option<Regex>> = OnceLock::new();
    let text = replace_all(&BLANK_RUNS, r"\n{3,}", text, "\n\n");

    text.split('\n')
        .map(|line| line.trim_end_matches([' ', '\t']))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
