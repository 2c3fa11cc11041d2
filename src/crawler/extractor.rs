//! Page content extraction
//!
//! This module turns a fetched HTML body into:
//! - The page title (from the `<title>` tag)
//! - Sanitized body text, without script/style/navigation chrome
//! - Absolute outbound links, deduplicated in document order
//!
//! Extraction never fails: html5ever builds a best-effort tree out of any
//! input, and undecodable bytes are replaced.

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose whole subtree is left out of the body text
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "noscript", "template",
];

/// Extracted content of one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContent {
    /// Trimmed `<title>` text, None when missing or empty
    pub title: Option<String>,

    /// Visible text, one collapsed text node per line
    pub body_text: String,

    /// Absolute http(s) links
    pub links: Vec<String>,
}

/// Extracts title, body text and links from raw HTML
///
/// # Arguments
///
/// * `raw` - Response body, decoded as UTF-8 (lossily)
/// * `base` - URL relative links are resolved against
/// * `max_body_chars` - Truncate body text to this many characters
///
/// # Example
///
/// ```
/// use priority_crawl::crawler::extract;
/// use url::Url;
///
/// let html = br#"<html><head><title>Test</title></head><body><p>Hello</p><a href="/page">Link</a></body></html>"#;
/// let base = Url::parse("https://example.com/").unwrap();
/// let content = extract(html, &base, None);
/// assert_eq!(content.title, Some("Test".to_string()));
/// assert_eq!(content.links, vec!["https://example.com/page"]);
/// ```
pub fn extract(raw: &[u8], base: &Url, max_body_chars: Option<usize>) -> PageContent {
    let html = String::from_utf8_lossy(raw);
    let document = Html::parse_document(&html);

    let mut body_text = extract_body_text(&document);
    if let Some(limit) = max_body_chars {
        truncate_chars(&mut body_text, limit);
    }

    PageContent {
        title: extract_title(&document),
        body_text,
        links: extract_links(&document, base),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_body_text(document: &Html) -> String {
    let body = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut pieces = Vec::new();
    collect_text(body, &mut pieces);
    pieces.join("\n")
}

/// Depth-first walk collecting whitespace-collapsed text nodes
///
/// Uses an explicit stack; nesting depth is attacker-controlled.
fn collect_text(root: ElementRef<'_>, pieces: &mut Vec<String>) {
    let mut stack: Vec<_> = root.children().rev().collect();

    while let Some(node) = stack.pop() {
        match node.value() {
            Node::Text(text) => {
                let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
                if !collapsed.is_empty() {
                    pieces.push(collapsed);
                }
            }
            Node::Element(el) => {
                if SKIPPED_ELEMENTS.contains(&el.name()) {
                    continue;
                }
                stack.extend(node.children().rev());
            }
            _ => {}
        }
    }
}

/// Truncates to at most `limit` characters, on a char boundary
fn truncate_chars(text: &mut String, limit: usize) {
    if let Some((byte_idx, _)) = text.char_indices().nth(limit) {
        text.truncate(byte_idx);
    }
}

/// Extracts all followable links, first occurrence wins
fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();
    let mut seen = HashSet::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                if seen.insert(absolute_url.clone()) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}
