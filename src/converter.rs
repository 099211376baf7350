//! Markdown converter - transforms an html5ever DOM into Markdown
//!
//! The converter walks the tree depth-first in document order and writes
//! Markdown into a single buffer. Block elements (headings, paragraphs,
//! lists, code blocks, tables, block quotes) are separated by one blank
//! line; inline elements (links, images, emphasis, inline code) are written
//! in place. Elements the [`ElementPolicy`] drops never reach the output.
//!
//! # Heading offset
//!
//! Documents loaded from HTML pages get their `<title>` promoted to the
//! single level-one heading, so every `<hN>` is pushed down by
//! [`ConversionOptions::heading_offset`] levels, capped at `######`.
//!
//! # Examples
//!
//! ```rust
//! use docloader::converter::{ConversionOptions, MarkdownConverter};
//! use docloader::parser::parse_html;
//!
//! let dom = parse_html("<h1>Install</h1><p>Run <code>make</code>.</p>");
//!
//! let markdown = MarkdownConverter::new().convert(&dom);
//! assert_eq!(markdown, "# Install\n\nRun `make`.\n");
//!
//! let shifted = MarkdownConverter::with_options(ConversionOptions {
//!     heading_offset: 1,
//!     ..Default::default()
//! });
//! assert_eq!(shifted.convert(&dom), "## Install\n\nRun `make`.\n");
//! ```

use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::security::{ElementAction, ElementPolicy, MAX_NESTING_DEPTH};

/// Deepest ATX heading level
const MAX_HEADING_LEVEL: usize = 6;

/// Table column alignment (GFM)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableAlignment {
    Left,
    Center,
    Right,
}

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Levels added to every `<hN>`; the result is capped at 6
    pub heading_offset: usize,
    /// Render `<table>` as a GFM pipe table instead of running text
    pub preserve_tables: bool,
    /// Subtrees nested deeper than this are skipped
    pub max_depth: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            heading_offset: 0,
            preserve_tables: true,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// DOM to Markdown converter
///
/// Holds no per-document state; one instance can convert any number of
/// documents, from any number of threads.
#[derive(Debug, Clone)]
pub struct MarkdownConverter {
    options: ConversionOptions,
    policy: ElementPolicy,
}

impl MarkdownConverter {
    pub fn new() -> Self {
        Self::with_options(ConversionOptions::default())
    }

    pub fn with_options(options: ConversionOptions) -> Self {
        let policy = ElementPolicy::with_max_depth(options.max_depth);
        Self { options, policy }
    }

    /// Convert a parsed document
    ///
    /// The result is normalized: LF line endings, no trailing whitespace,
    /// no runs of blank lines and exactly one final newline. An empty
    /// document yields an empty string.
    pub fn convert(&self, dom: &RcDom) -> String {
        let mut output = String::with_capacity(1024);
        self.walk(&dom.document, &mut output, 0);
        normalize_output(&output)
    }

    fn walk(&self, node: &Handle, output: &mut String, depth: usize) {
        match node.data {
            NodeData::Document => {
                for child in node.children.borrow().iter() {
                    self.walk(child, output, depth);
                }
            }
            NodeData::Element { ref name, .. } => {
                self.handle_element(node, name.local.as_ref(), output, depth);
            }
            NodeData::Text { ref contents } => {
                write_text(&contents.borrow(), output);
            }
            NodeData::Comment { .. }
            | NodeData::Doctype { .. }
            | NodeData::ProcessingInstruction { .. } => {}
        }
    }

    fn walk_children(&self, node: &Handle, output: &mut String, depth: usize) {
        for child in node.children.borrow().iter() {
            self.walk(child, output, depth + 1);
        }
    }

    /// Render the children of `node` into a fresh buffer
    fn render_inline(&self, node: &Handle, depth: usize) -> String {
        let mut buffer = String::new();
        self.walk_children(node, &mut buffer, depth);
        buffer
    }

    fn handle_element(&self, node: &Handle, tag_name: &str, output: &mut String, depth: usize) {
        if self.policy.action_for(tag_name) == ElementAction::Drop {
            return;
        }
        if !self.policy.within_depth(depth) {
            tracing::debug!(depth, tag = tag_name, "skipping subtree beyond nesting limit");
            return;
        }

        match tag_name {
            "h1" => self.handle_heading(node, 1, output, depth),
            "h2" => self.handle_heading(node, 2, output, depth),
            "h3" => self.handle_heading(node, 3, output, depth),
            "h4" => self.handle_heading(node, 4, output, depth),
            "h5" => self.handle_heading(node, 5, output, depth),
            "h6" => self.handle_heading(node, 6, output, depth),

            // The document title is kept as a leading line of text; callers
            // decide whether to promote it to a heading.
            "title" | "p" => self.handle_paragraph(node, output, depth),

            "a" => self.handle_link(node, output, depth),
            "img" => self.handle_image(node, output),

            "ul" => self.handle_list(node, output, depth, 0, false),
            "ol" => self.handle_list(node, output, depth, 0, true),
            "li" => self.handle_list_item(node, output, depth, 0, "- "),

            "pre" => self.handle_code_block(node, output),
            "code" => self.handle_inline_code(node, output),

            "strong" | "b" => self.handle_emphasis(node, "**", output, depth),
            "em" | "i" => self.handle_emphasis(node, "*", output, depth),

            "blockquote" => self.handle_blockquote(node, output, depth),
            "br" => output.push('\n'),
            "hr" => {
                ensure_blank_line(output);
                output.push_str("* * *\n\n");
            }

            "table" if self.options.preserve_tables => self.handle_table(node, output, depth),

            _ => self.walk_children(node, output, depth),
        }
    }

    fn handle_heading(&self, node: &Handle, level: usize, output: &mut String, depth: usize) {
        let text = collapse_whitespace(&self.render_inline(node, depth));
        if text.is_empty() {
            return;
        }

        let level = (level + self.options.heading_offset).min(MAX_HEADING_LEVEL);
        ensure_blank_line(output);
        output.push_str(&"#".repeat(level));
        output.push(' ');
        output.push_str(&text);
        output.push_str("\n\n");
    }

    fn handle_paragraph(&self, node: &Handle, output: &mut String, depth: usize) {
        ensure_blank_line(output);
        let start_len = output.len();
        self.walk_children(node, output, depth);
        if output.len() > start_len {
            output.push_str("\n\n");
        }
    }

    /// `[text](href)`; plain text when the target is missing or unsafe
    fn handle_link(&self, node: &Handle, output: &mut String, depth: usize) {
        let text = collapse_whitespace(&self.render_inline(node, depth));
        if text.is_empty() {
            return;
        }

        let href = attribute(node, "href");
        match href.as_deref().and_then(|url| self.policy.safe_url(url)) {
            Some(url) if !url.trim().is_empty() => {
                output.push('[');
                output.push_str(&text);
                output.push_str("](");
                output.push_str(url.trim());
                output.push(')');
            }
            _ => output.push_str(&text),
        }
    }

    fn handle_image(&self, node: &Handle, output: &mut String) {
        let Some(src) = attribute(node, "src") else {
            return;
        };
        let Some(url) = self.policy.safe_url(&src) else {
            return;
        };
        let alt = attribute(node, "alt").unwrap_or_default();

        output.push_str("![");
        output.push_str(&collapse_whitespace(&alt));
        output.push_str("](");
        output.push_str(url.trim());
        output.push(')');
    }

    fn handle_list(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        indent: usize,
        ordered: bool,
    ) {
        if indent == 0 {
            ensure_blank_line(output);
        } else if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }

        let mut number = attribute(node, "start")
            .and_then(|start| start.trim().parse::<u32>().ok())
            .unwrap_or(1);

        for child in node.children.borrow().iter() {
            if element_name(child) != Some("li") {
                continue;
            }
            let marker = if ordered {
                let marker = format!("{number}. ");
                number += 1;
                marker
            } else {
                "- ".to_string()
            };
            self.handle_list_item(child, output, depth + 1, indent, &marker);
        }

        if indent == 0 {
            ensure_blank_line(output);
        }
    }

    /// One list item; nested lists are indented two spaces per level
    fn handle_list_item(
        &self,
        node: &Handle,
        output: &mut String,
        depth: usize,
        indent: usize,
        marker: &str,
    ) {
        output.push_str(&"  ".repeat(indent));
        output.push_str(marker);

        let mut line = String::new();
        for child in node.children.borrow().iter() {
            match element_name(child) {
                Some(tag @ ("ul" | "ol")) => {
                    output.push_str(&collapse_whitespace(&line));
                    line.clear();
                    self.handle_list(child, output, depth + 1, indent + 1, tag == "ol");
                }
                _ => self.walk(child, &mut line, depth + 1),
            }
        }
        output.push_str(&collapse_whitespace(&line));

        if !output.ends_with('\n') {
            output.push('\n');
        }
    }

    /// Fenced block; the language comes from a `language-*` or `lang-*` class
    fn handle_code_block(&self, node: &Handle, output: &mut String) {
        ensure_blank_line(output);

        let language = node
            .children
            .borrow()
            .iter()
            .filter(|child| element_name(child) == Some("code"))
            .filter_map(|code| attribute(code, "class"))
            .find_map(|class| {
                class.split_whitespace().find_map(|name| {
                    name.strip_prefix("language-")
                        .or_else(|| name.strip_prefix("lang-"))
                        .map(str::to_string)
                })
            })
            .unwrap_or_default();

        let mut code = String::new();
        code_text(node, &mut code);
        let code = code.strip_prefix('\n').unwrap_or(&code);

        output.push_str("```");
        output.push_str(&language);
        output.push('\n');
        output.push_str(code);
        if !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str("```\n\n");
    }

    fn handle_inline_code(&self, node: &Handle, output: &mut String) {
        let mut code = String::new();
        code_text(node, &mut code);
        let code = code.replace('\n', " ");

        let fence = if code.contains('`') { "``" } else { "`" };
        output.push_str(fence);
        if fence.len() > 1 {
            output.push(' ');
            output.push_str(&code);
            output.push(' ');
        } else {
            output.push_str(&code);
        }
        output.push_str(fence);
    }

    fn handle_emphasis(&self, node: &Handle, marker: &str, output: &mut String, depth: usize) {
        let text = self.render_inline(node, depth);
        let trimmed = text.trim();
        let mut raw = String::new();
        code_text(node, &mut raw);

        if raw.starts_with(char::is_whitespace) && !output.is_empty() && !ends_with_whitespace(output)
        {
            output.push(' ');
        }
        if trimmed.is_empty() {
            return;
        }
        output.push_str(marker);
        output.push_str(trimmed);
        output.push_str(marker);
        if raw.ends_with(char::is_whitespace) {
            output.push(' ');
        }
    }

    fn handle_blockquote(&self, node: &Handle, output: &mut String, depth: usize) {
        let inner = normalize_output(&self.render_inline(node, depth));
        let inner = inner.trim();
        if inner.is_empty() {
            return;
        }

        ensure_blank_line(output);
        for line in inner.lines() {
            if line.is_empty() {
                output.push_str(">\n");
            } else {
                output.push_str("> ");
                output.push_str(line);
                output.push('\n');
            }
        }
        output.push('\n');
    }

    /// GFM pipe table; the first row is the header
    fn handle_table(&self, node: &Handle, output: &mut String, depth: usize) {
        let mut rows = Vec::new();
        self.collect_table_rows(node, &mut rows, depth);

        let mut rows = rows.into_iter();
        let Some((headers, alignments)) = rows.next() else {
            return;
        };
        let body: Vec<Vec<String>> = rows.map(|(cells, _)| cells).collect();
        let columns = headers.len().max(body.iter().map(Vec::len).max().unwrap_or(0));
        if columns == 0 {
            return;
        }

        ensure_blank_line(output);
        write_table_row(output, &headers, columns);

        output.push('|');
        for column in 0..columns {
            let alignment = alignments.get(column).copied().unwrap_or(TableAlignment::Left);
            output.push_str(match alignment {
                TableAlignment::Left => " --- |",
                TableAlignment::Center => " :---: |",
                TableAlignment::Right => " ---: |",
            });
        }
        output.push('\n');

        for row in &body {
            write_table_row(output, row, columns);
        }
        output.push('\n');
    }

    /// Rows in document order across `thead`, `tbody`, `tfoot` and bare `tr`
    fn collect_table_rows(
        &self,
        node: &Handle,
        rows: &mut Vec<(Vec<String>, Vec<TableAlignment>)>,
        depth: usize,
    ) {
        for child in node.children.borrow().iter() {
            match element_name(child) {
                Some("thead" | "tbody" | "tfoot") => {
                    self.collect_table_rows(child, rows, depth + 1)
                }
                Some("tr") => {
                    let mut cells = Vec::new();
                    let mut alignments = Vec::new();
                    for cell in child.children.borrow().iter() {
                        if matches!(element_name(cell), Some("th" | "td")) {
                            let text = collapse_whitespace(&self.render_inline(cell, depth + 2));
                            cells.push(text.replace('|', "\\|"));
                            alignments.push(cell_alignment(cell));
                        }
                    }
                    rows.push((cells, alignments));
                }
                _ => {}
            }
        }
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

fn element_name(node: &Handle) -> Option<&str> {
    match node.data {
        NodeData::Element { ref name, .. } => Some(name.local.as_ref()),
        _ => None,
    }
}

fn attribute(node: &Handle, name: &str) -> Option<String> {
    match node.data {
        NodeData::Element { ref attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| attr.name.local.as_ref() == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

fn cell_alignment(cell: &Handle) -> TableAlignment {
    let from_value = |value: &str| {
        let value = value.to_ascii_lowercase();
        if value.contains("center") {
            Some(TableAlignment::Center)
        } else if value.contains("right") {
            Some(TableAlignment::Right)
        } else if value.contains("left") {
            Some(TableAlignment::Left)
        } else {
            None
        }
    };

    attribute(cell, "align")
        .and_then(|align| from_value(&align))
        .or_else(|| {
            attribute(cell, "style")
                .filter(|style| style.to_ascii_lowercase().contains("text-align"))
                .and_then(|style| from_value(&style))
        })
        .unwrap_or(TableAlignment::Left)
}

fn write_table_row(output: &mut String, cells: &[String], columns: usize) {
    output.push('|');
    for column in 0..columns {
        output.push(' ');
        output.push_str(cells.get(column).map(String::as_str).unwrap_or(""));
        output.push_str(" |");
    }
    output.push('\n');
}

/// Append a text node, keeping one space where the source had whitespace
fn write_text(text: &str, output: &mut String) {
    let collapsed = collapse_whitespace(text);
    if text.starts_with(char::is_whitespace) && !output.is_empty() && !ends_with_whitespace(output)
    {
        output.push(' ');
    }
    if collapsed.is_empty() {
        return;
    }
    output.push_str(&collapsed);
    if text.ends_with(char::is_whitespace) {
        output.push(' ');
    }
}

/// Raw text of a subtree, whitespace preserved
fn code_text(node: &Handle, output: &mut String) {
    match node.data {
        NodeData::Text { ref contents } => output.push_str(&contents.borrow()),
        NodeData::Element { .. } => {
            for child in node.children.borrow().iter() {
                code_text(child, output);
            }
        }
        _ => {}
    }
}

fn ends_with_whitespace(output: &str) -> bool {
    output.ends_with(char::is_whitespace)
}

/// Start a new block: the buffer ends with a blank line unless it is empty
fn ensure_blank_line(output: &mut String) {
    let trimmed_len = output.trim_end_matches([' ', '\t']).len();
    output.truncate(trimmed_len);
    if output.is_empty() || output.ends_with("\n\n") {
        return;
    }
    if output.ends_with('\n') {
        output.push('\n');
    } else {
        output.push_str("\n\n");
    }
}

/// Collapse runs of whitespace to single spaces and trim
fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize the raw buffer
///
/// Outside fenced code blocks, runs of spaces inside a line collapse to one
/// (leading indentation and inline code spans are kept). Everywhere,
/// trailing whitespace is removed and blank-line runs collapse to one.
fn normalize_output(output: &str) -> String {
    let output = output.replace("\r\n", "\n");
    let mut result = String::with_capacity(output.len());
    let mut prev_blank = true;
    let mut in_fence = false;

    for line in output.lines() {
        let is_fence = line.trim_start().starts_with("```");
        let trimmed = line.trim_end();

        if trimmed.is_empty() && !in_fence {
            if !prev_blank {
                result.push('\n');
                prev_blank = true;
            }
            continue;
        }

        if in_fence || is_fence {
            result.push_str(trimmed);
        } else {
            result.push_str(&collapse_inline_spaces(trimmed));
        }
        result.push('\n');
        prev_blank = false;

        if is_fence {
            in_fence = !in_fence;
        }
    }

    while result.ends_with("\n\n") {
        result.pop();
    }
    result
}

fn collapse_inline_spaces(line: &str) -> String {
    let mut result = String::with_capacity(line.len());
    let mut at_start = true;
    let mut in_code = false;
    let mut prev_space = false;

    for ch in line.chars() {
        match ch {
            '`' => {
                in_code = !in_code;
                at_start = false;
                prev_space = false;
                result.push(ch);
            }
            ' ' if at_start || in_code => result.push(ch),
            ' ' => {
                if !prev_space {
                    result.push(ch);
                }
                prev_space = true;
            }
            _ => {
                at_start = false;
                prev_space = false;
                result.push(ch);
            }
        }
    }
    result
}
