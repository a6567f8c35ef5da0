//! Scan the `<head>` of raw HTML for the manifest link.

use regex::Regex;
use scraper::{Html, Selector};
use std::sync::OnceLock;

/// Whether the markup opens a `<head>` element (not `<header>`).
pub fn has_head(markup: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<head[\s>]").expect("valid regex"))
        .is_match(markup)
}

/// Find the first `<link rel="manifest">` and resolve its href against `base_url`.
///
/// `rel` is a token list, matched case-insensitively, so `rel="Manifest"`
/// and `rel="preload manifest"` both count.
pub fn find_manifest_link(markup: &str, base_url: &str) -> Option<String> {
    let doc = Html::parse_document(markup);
    let selector = Selector::parse("link[rel][href]").expect("valid selector");

    let href = doc.select(&selector).find_map(|el| {
        let rel = el.value().attr("rel")?;
        let is_manifest = rel
            .split_ascii_whitespace()
            .any(|token| token.eq_ignore_ascii_case("manifest"));
        let href = el.value().attr("href")?.trim();
        (is_manifest && !href.is_empty()).then(|| href.to_string())
    })?;

    resolve_href(&href, base_url)
}

/// Resolve an href against a base URL. Absolute hrefs pass through.
pub fn resolve_href(href: &str, base_url: &str) -> Option<String> {
    match url::Url::parse(href) {
        Ok(abs) => Some(abs.to_string()),
        Err(_) => url::Url::parse(base_url)
            .ok()?
            .join(href)
            .ok()
            .map(|u| u.to_string()),
    }
}
