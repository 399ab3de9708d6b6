//! HTML parser for extracting references and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Link references (from `<a href>` tags) with their anchor text
//! - Image references (from `<img src>` tags) with their alt text
//! - Page title

use crate::crawler::types::Reference;
use crate::url::to_absolute;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// The page title (from `<title>` tag)
    pub title: Option<String>,

    /// All references found on the page, in document order
    pub references: Vec<Reference>,
}

/// Parses HTML content and extracts references and metadata
///
/// # Reference Extraction Rules
///
/// **Include:**
/// - `<a href="...">` as links, anchor text trimmed and whitespace-collapsed
/// - `<img src="...">` as images, with the `alt` attribute as text
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` targets
/// - Fragment-only hrefs (same page anchors)
/// - Anything that does not resolve to an HTTP(S) URL
///
/// Relative targets resolve against `<base href>` when the document has
/// one, otherwise against `base_url`.
///
/// # Example
///
/// ```
/// use sumi_sweep::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url);
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.references[0].target.as_str(), "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);
    let base = document_base(&document, base_url);

    ParsedPage {
        title: extract_title(&document),
        references: extract_references_from(&document, &base),
    }
}

/// Convenience function for extracting just the references from HTML
pub fn extract_references(html: &str, page_url: &Url) -> Vec<Reference> {
    parse_html(html, page_url).references
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Honors `<base href>` if present and resolvable
fn document_base(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|element| element.value().attr("href"))
                .and_then(|href| to_absolute(href, page_url))
        })
        .unwrap_or_else(|| page_url.clone())
}

fn extract_references_from(document: &Html, base_url: &Url) -> Vec<Reference> {
    let mut references = Vec::new();

    // Anchors and images in one pass keeps document order
    let Ok(selector) = Selector::parse("a[href], img[src]") else {
        return references;
    };

    for element in document.select(&selector) {
        match element.value().name() {
            "a" => {
                let Some(target) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) else {
                    continue;
                };
                references.push(Reference::link(target, anchor_text(&element)));
            }
            "img" => {
                let Some(target) = element.value().attr("src").and_then(|s| resolve_link(s, base_url)) else {
                    continue;
                };
                let alt = element.value().attr("alt").unwrap_or_default();
                references.push(Reference::image(target, collapse_whitespace(alt)));
            }
            _ => {}
        }
    }

    references
}

fn anchor_text(element: &ElementRef<'_>) -> String {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }

    // Image-only anchors: fall back to the image's alt text, then the title
    Selector::parse("img[alt]")
        .ok()
        .and_then(|selector| {
            element
                .select(&selector)
                .next()
                .and_then(|img| img.value().attr("alt"))
                .map(collapse_whitespace)
        })
        .or_else(|| element.value().attr("title").map(collapse_whitespace))
        .unwrap_or_default()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves an href or src to an absolute URL and validates it
///
/// Returns None if the reference should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    to_absolute(href, base_url).filter(|url| url.scheme() == "http" || url.scheme() == "https")
}
