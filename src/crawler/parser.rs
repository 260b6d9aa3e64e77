//! HTML link extraction
//!
//! Collects the raw `href` of every anchor in a document. Resolution against
//! the site root happens later, in [`crate::url::normalize_links`].

use scraper::{Html, Selector};
use std::collections::HashSet;

/// Extracts the href of every `<a>` element in document order
///
/// Values are trimmed of surrounding whitespace and exact repeats are
/// dropped. A document without anchors yields an empty vector; malformed
/// markup is parsed leniently and never fails.
///
/// # Example
///
/// ```
/// use sitemapper::crawler::extract_links;
///
/// let html = r#"<a href="/a">A</a><a href="b.html">B</a><a href="/a">again</a>"#;
/// assert_eq!(extract_links(html), vec!["/a", "b.html"]);
/// ```
pub fn extract_links(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);

    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.trim().to_string())
        .filter(|href| seen.insert(href.clone()))
        .collect()
}
