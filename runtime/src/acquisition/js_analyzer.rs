//! Regex scanning of page markup and service worker scripts.
//!
//! Finds the service worker path a page registers and the scripts a
//! service worker pulls in with `importScripts(...)`, then fetches those
//! imports so the static analyzer sees the whole corpus. Best-effort like
//! any regex scan: computed paths and minified wrappers are missed.

use crate::acquisition::http_client::HttpClient;
use pwa_inspect::ServiceWorkerResolution;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Maximum number of imported scripts fetched per service worker.
const MAX_IMPORTS: usize = 10;

/// Imported scripts larger than this are skipped (5 MB).
const MAX_SCRIPT_SIZE: usize = 5 * 1024 * 1024;

const IMPORT_TIMEOUT_MS: u64 = 10_000;

fn register_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // navigator.serviceWorker.register("/sw.js", ...)
            r#"serviceWorker\s*\.\s*register\(\s*['"`]([^'"`]+)['"`]"#,
            // workbox-window: new Workbox("/sw.js")
            r#"new\s+Workbox\(\s*['"`]([^'"`]+)['"`]"#,
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
    })
}

fn import_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"importScripts\(([^)]*)\)").expect("valid regex"))
}

fn string_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"['"`]([^'"`]+)['"`]"#).expect("valid regex"))
}

/// Extract the first service worker script path registered in the markup.
///
/// Template literals with interpolation are ignored.
pub fn extract_register_path(markup: &str) -> Option<String> {
    register_patterns().iter().find_map(|re| {
        re.captures_iter(markup)
            .filter_map(|cap| cap.get(1))
            .map(|m| m.as_str().trim())
            .find(|path| !path.is_empty() && !path.contains("${"))
            .map(str::to_string)
    })
}

/// Extract every string literal passed to `importScripts(...)`, in call order.
pub fn extract_import_scripts(source: &str) -> Vec<String> {
    import_call()
        .captures_iter(source)
        .filter_map(|cap| cap.get(1))
        .flat_map(|args| {
            string_literal()
                .captures_iter(args.as_str())
                .filter_map(|lit| lit.get(1))
                .map(|m| m.as_str().trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|s| !s.is_empty() && !s.contains("${"))
        .collect()
}

/// Resolve a script reference against a base URL.
///
/// Absolute URLs (including `data:`) pass through unchanged; everything else
/// is joined onto the base.
pub fn resolve_script_url(src: &str, base_url: &str) -> Option<String> {
    if src.starts_with("data:") {
        return Some(src.to_string());
    }
    if let Ok(abs) = url::Url::parse(src) {
        return Some(abs.to_string());
    }
    url::Url::parse(base_url)
        .ok()?
        .join(src)
        .ok()
        .map(|u| u.to_string())
}

/// Origin of a script URL with a trailing slash, e.g. `https://example.com/`.
fn origin_base(script_url: &str) -> Option<String> {
    let origin = url::Url::parse(script_url).ok()?.origin();
    origin
        .is_tuple()
        .then(|| format!("{}/", origin.ascii_serialization()))
}

/// Fetch the scripts imported by the main source and append them to `sources`.
///
/// Relative imports resolve against the service worker's origin. Imports
/// that cannot be fetched are skipped.
pub async fn expand_imports(
    mut resolution: ServiceWorkerResolution,
    client: &HttpClient,
) -> ServiceWorkerResolution {
    let Some(main) = resolution.sources.first() else {
        return resolution;
    };

    let base = origin_base(&resolution.script_url);
    let urls: Vec<String> = extract_import_scripts(main)
        .iter()
        .filter_map(|src| match &base {
            Some(base) => resolve_script_url(src, base),
            None => url::Url::parse(src).ok().map(|u| u.to_string()),
        })
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .take(MAX_IMPORTS)
        .collect();

    if urls.is_empty() {
        return resolution;
    }

    let fetches = urls.iter().map(|u| client.get(u, IMPORT_TIMEOUT_MS));
    let responses = futures::future::join_all(fetches).await;

    for (url, resp) in urls.iter().zip(responses) {
        match resp.and_then(|r| r.error_for_status()) {
            Ok(r) if r.body.len() <= MAX_SCRIPT_SIZE => resolution.sources.push(r.body),
            Ok(r) => debug!(%url, bytes = r.body.len(), "imported script too large, skipped"),
            Err(e) => debug!(%url, "imported script unreachable: {e}"),
        }
    }

    resolution
}
