//! Markdown passthrough

use super::ConversionResult;

/// Front matter delimiter line
const FRONT_MATTER_DELIMITER: &str = "---";

/// Markdown is already the target format; only the title is extracted
pub fn convert(text: &str) -> ConversionResult {
    ConversionResult {
        markdown: text.to_string(),
        title: extract_title(text),
    }
}

/// Extract the text of the first level-one `# ` heading
///
/// Lines inside a leading YAML front matter block are ignored. The first
/// line consisting solely of `---` opens the block, the second closes it;
/// later `---` lines are ordinary content.
///
/// # Examples
///
/// ```rust
/// use docloader::formats::markdown::extract_title;
///
/// let doc = "---\ntitle: ignored\n# Not this\n---\n\n## Sub\n# Real Title \n";
/// assert_eq!(extract_title(doc), "Real Title");
/// ```
pub fn extract_title(text: &str) -> String {
    let mut delimiters_seen = 0;
    let mut in_front_matter = false;

    for line in text.lines() {
        if line == FRONT_MATTER_DELIMITER && delimiters_seen < 2 {
            delimiters_seen += 1;
            in_front_matter = delimiters_seen == 1;
            continue;
        }

        if in_front_matter {
            continue;
        }

        if let Some(rest) = line.trim().strip_prefix("# ") {
            return rest.trim().to_string();
        }
    }

    String::new()
}
