//! Hostile and malformed HTML
//!
//! Pages pulled from documentation sites may carry scripts, embedded
//! objects and executable URLs. None of that may reach the stored Markdown.

use docloader::converter::{ConversionOptions, MarkdownConverter};
use docloader::parser::parse_html;
use docloader::{DocumentType, convert};

fn html_to_markdown(html: &str) -> String {
    convert(html.as_bytes(), DocumentType::Html)
        .expect("HTML is supported")
        .markdown
}

#[test]
fn test_script_tag_removal() {
    let html = r#"<html><body>
        <p>Before dangerous element</p>
        <script>alert('xss')</script>
        <p>After dangerous element</p>
    </body></html>"#;

    let markdown = html_to_markdown(html);

    assert!(!markdown.contains("<script"));
    assert!(!markdown.contains("alert"));
    assert!(markdown.contains("Before dangerous element"));
    assert!(markdown.contains("After dangerous element"));
}

#[test]
fn test_inline_script_removal() {
    let markdown = html_to_markdown(r#"<p>Text <script>malicious()</script> more text</p>"#);

    assert!(!markdown.contains("malicious"));
    assert!(markdown.contains("Text"));
    assert!(markdown.contains("more text"));
}

#[test]
fn test_event_handler_attributes_dropped() {
    let html = r#"<html><body>
        <p onclick="alert('xss')">Click me</p>
        <div onload="malicious()">Content</div>
        <a href="test.html" onmouseover="attack()">Link</a>
    </body></html>"#;

    let markdown = html_to_markdown(html);

    assert!(!markdown.contains("onclick"));
    assert!(!markdown.contains("attack"));
    assert!(markdown.contains("Click me"));
    assert!(markdown.contains("[Link](test.html)"));
}

#[test]
fn test_javascript_url_in_link_any_case() {
    for html in [
        r#"<a href="javascript:alert('xss')">Test1</a>"#,
        r#"<a href="JavaScript:alert('xss')">Test2</a>"#,
        r#"<a href=" JAVASCRIPT:alert('xss')">Test3</a>"#,
    ] {
        let markdown = html_to_markdown(html);
        assert!(!markdown.to_lowercase().contains("javascript:"), "{html}");
        assert!(!markdown.contains("alert"), "{html}");
        assert!(!markdown.contains("]("), "{html}");
    }
}

#[test]
fn test_data_url_in_link() {
    let markdown =
        html_to_markdown(r#"<a href="data:text/html,<script>alert('xss')</script>">Click</a>"#);

    assert!(!markdown.contains("data:"));
    assert_eq!(markdown, "Click");
}

#[test]
fn test_unsafe_image_sources_dropped() {
    let html = r#"<p>A<img src="javascript:alert(1)" alt="x">B<img src="data:image/png;base64,AAAA" alt="y">C</p>"#;
    let markdown = html_to_markdown(html);

    assert!(!markdown.contains("!["));
    assert_eq!(markdown, "ABC");
}

#[test]
fn test_other_unsafe_schemes_blocked() {
    for (html, scheme) in [
        (r#"<a href="vbscript:msgbox('xss')">Click</a>"#, "vbscript:"),
        (r#"<a href="file:///etc/passwd">Passwords</a>"#, "file:"),
        (r#"<a href="about:blank">About</a>"#, "about:"),
    ] {
        let markdown = html_to_markdown(html);
        assert!(!markdown.contains(scheme), "{html}");
    }
}

#[test]
fn test_safe_urls_preserved() {
    let html = r#"<p><a href="https://www.postgresql.org/docs/">Docs</a>
        <a href="../install.html#linux">Install</a>
        <img src="images/arch.png" alt="Architecture"></p>"#;
    let markdown = html_to_markdown(html);

    assert!(markdown.contains("[Docs](https://www.postgresql.org/docs/)"));
    assert!(markdown.contains("[Install](../install.html#linux)"));
    assert!(markdown.contains("![Architecture](images/arch.png)"));
}

#[test]
fn test_embedded_content_removed() {
    let html = r#"<html><head>
        <style>body { background: url('javascript:alert(1)'); }</style>
        <link rel="stylesheet" href="https://evil.example/malicious.css">
        <base href="https://evil.example/">
    </head><body>
        <iframe src="https://evil.example/frame">frame text</iframe>
        <object data="movie.swf">object text</object>
        <embed src="movie.swf">
        <noscript>enable scripts</noscript>
        <p>Content</p>
    </body></html>"#;

    let markdown = html_to_markdown(html);
    assert_eq!(markdown, "Content");
}

#[test]
fn test_doctype_and_entities_never_fetched() {
    let html = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN"
        "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">
    <html><body><p>Content &amp; more</p></body></html>"#;

    let markdown = html_to_markdown(html);
    assert!(!markdown.contains("w3.org"));
    assert_eq!(markdown, "Content & more");
}

#[test]
fn test_deeply_nested_html_within_limit() {
    let html = format!(
        "<html><body>{}<p>Deep content</p>{}</body></html>",
        "<div>".repeat(100),
        "</div>".repeat(100)
    );
    assert_eq!(html_to_markdown(&html), "Deep content");
}

#[test]
fn test_nesting_beyond_limit_is_skipped() {
    let html = format!(
        "<p>Shallow</p>{}<p>Too deep</p>{}",
        "<div>".repeat(50),
        "</div>".repeat(50)
    );
    let converter = MarkdownConverter::with_options(ConversionOptions {
        max_depth: 20,
        ..Default::default()
    });
    let markdown = converter.convert(&parse_html(&html));

    assert!(markdown.contains("Shallow"));
    assert!(!markdown.contains("Too deep"));
}

#[test]
fn test_table_cells_are_sanitized() {
    let html = r#"<table>
        <tr><th onclick="alert('xss')">Header</th></tr>
        <tr><td><a href="javascript:alert('xss')">Link</a></td></tr>
    </table>"#;

    let markdown = html_to_markdown(html);

    assert!(markdown.contains("Header"));
    assert!(markdown.contains("| Link |"));
    assert!(!markdown.contains("javascript:"));
    assert!(!markdown.contains("alert"));
}

#[test]
fn test_malformed_markup_still_converts() {
    let markdown = html_to_markdown("<p>unclosed <b>bold <i>both</b> italic<div><span>stray");
    assert!(markdown.contains("unclosed"));
    assert!(markdown.contains("italic"));
    assert!(markdown.contains("stray"));
}
