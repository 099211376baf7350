//! Element policy for the DOM walk
//!
//! HTML pages collected from documentation sites carry scripts, styles,
//! embedded players and similar elements that have no textual content worth
//! storing. The policy decides which elements the converter renders, how
//! deep it is willing to recurse, and which link targets are kept.
//!
//! # Policy
//!
//! - **Non-content elements** (`script`, `style`, `iframe`, ...) are dropped
//!   together with their children.
//! - **Nesting depth** is capped; subtrees below the cap are skipped rather
//!   than failing the whole document.
//! - **URL schemes** that execute code or reference local resources
//!   (`javascript:`, `data:`, `vbscript:`, `file:`, `about:`) are never
//!   written into link or image targets.
//!
//! # Examples
//!
//! ```rust
//! use docloader::security::{ElementAction, ElementPolicy};
//!
//! let policy = ElementPolicy::new();
//! assert_eq!(policy.action_for("script"), ElementAction::Drop);
//! assert_eq!(policy.action_for("p"), ElementAction::Render);
//! assert_eq!(policy.safe_url("javascript:alert(1)"), None);
//! assert_eq!(policy.safe_url("/docs/install.html"), Some("/docs/install.html"));
//! ```

/// Maximum DOM nesting depth rendered by default
pub const MAX_NESTING_DEPTH: usize = 1000;

/// Elements removed together with their children
const NON_CONTENT_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "iframe", "object", "embed", "applet", "link", "base",
    "template",
];

/// Link and image schemes that are never emitted
const UNSAFE_URL_SCHEMES: &[&str] = &["javascript:", "data:", "vbscript:", "file:", "about:"];

/// What the converter does with an element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementAction {
    /// Convert the element and its children
    Render,
    /// Skip the element and everything below it
    Drop,
}

/// Rendering policy applied while walking the DOM
#[derive(Debug, Clone)]
pub struct ElementPolicy {
    max_depth: usize,
}

impl ElementPolicy {
    pub fn new() -> Self {
        Self::with_max_depth(MAX_NESTING_DEPTH)
    }

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Decide whether an element is rendered, by lowercase tag name
    pub fn action_for(&self, tag_name: &str) -> ElementAction {
        if NON_CONTENT_ELEMENTS.contains(&tag_name) {
            ElementAction::Drop
        } else {
            ElementAction::Render
        }
    }

    /// Returns true while `depth` is within the nesting cap
    pub fn within_depth(&self, depth: usize) -> bool {
        depth <= self.max_depth
    }

    /// Returns true if the URL uses a scheme that is never emitted
    ///
    /// Leading whitespace and scheme case are ignored, as browsers do.
    pub fn is_unsafe_url(&self, url: &str) -> bool {
        let url = url.trim_start();
        UNSAFE_URL_SCHEMES.iter().any(|scheme| {
            url.get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
    }

    /// The URL itself when safe to emit, `None` otherwise
    pub fn safe_url<'a>(&self, url: &'a str) -> Option<&'a str> {
        if self.is_unsafe_url(url) {
            None
        } else {
            Some(url)
        }
    }
}

impl Default for ElementPolicy {
    fn default() -> Self {
        Self::new()
    }
}
