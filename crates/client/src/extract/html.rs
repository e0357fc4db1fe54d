//! Transcript text from HTML pages.
//!
//! Content containers are tried in order of specificity; page chrome
//! (`script`, `style`, `nav`, `header`, `footer`, `aside`) never contributes text.

use super::Extractor;
use scraper::{ElementRef, Html, Node, Selector};
use sejmbot_core::Error;
use std::sync::LazyLock;

const STRIPPED: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

const CONTENT_SELECTORS: &[&str] = &[
    r#"div[id*="stenogram"]"#,
    r#"div[class*="stenogram"]"#,
    r#"div[class*="transcript"]"#,
    r#"div[class*="protokol"]"#,
    r#"div[id*="protokol"]"#,
    ".stenogram-content",
    ".transcript-content",
    "main",
    "article",
    ".main-content",
    ".content",
    "#content",
    ".post-content",
    "body",
];

static SELECTORS: LazyLock<Vec<(Selector, &'static str)>> = LazyLock::new(|| {
    CONTENT_SELECTORS.iter().map(|s| (Selector::parse(s).expect("invalid selector"), *s)).collect()
});

/// Extracts transcript text from HTML.
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    /// A container must yield more than this many characters to be accepted.
    pub min_candidate_chars: usize,
}

impl Default for HtmlExtractor {
    fn default() -> Self {
        Self { min_candidate_chars: 200 }
    }
}

fn is_stripped(element: &scraper::node::Element) -> bool {
    STRIPPED.contains(&element.name())
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    out.push(text.to_string());
                }
            }
            Node::Element(el) if !is_stripped(el) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// Visible text of an element, pieces joined by single spaces.
fn visible_text(element: ElementRef<'_>) -> String {
    let mut pieces = Vec::new();
    collect_text(element, &mut pieces);
    pieces.join(" ")
}

fn inside_stripped(element: ElementRef<'_>) -> bool {
    is_stripped(element.value())
        || element.ancestors().any(|node| node.value().as_element().is_some_and(is_stripped))
}

impl HtmlExtractor {
    /// Extract text from an HTML string.
    pub fn extract_html(&self, html: &str) -> String {
        let document = Html::parse_document(html);

        for (selector, name) in SELECTORS.iter() {
            let Some(candidate) = document.select(selector).find(|el| !inside_stripped(*el)) else {
                continue;
            };

            let text = visible_text(candidate);
            if text.chars().count() > self.min_candidate_chars {
                tracing::debug!(selector = *name, chars = text.len(), "Selected HTML content container");
                return text;
            }
        }

        visible_text(document.root_element())
    }
}

impl Extractor for HtmlExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<String, Error> {
        Ok(self.extract_html(&String::from_utf8_lossy(bytes)))
    }
}
