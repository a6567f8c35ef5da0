//! Static feature analysis of service worker source.
//!
//! Runs fixed regex probe sets over the concatenated, whitespace-collapsed
//! sources. This is a heuristic: listeners registered conditionally, or code
//! that has been minified beyond recognition, can evade the probes. A positive
//! result means the text looks like it uses a feature, not that it works.

use crate::types::{FeatureFlags, RawSources, ServiceWorkerFeatures};
use regex::Regex;
use std::sync::OnceLock;

/// Sources at or above this aggregate size are not echoed back (2 MB).
pub const MAX_RAW_BYTES: usize = 2 * 1024 * 1024;

/// Placeholder returned instead of oversize sources.
pub const OVERSIZE_SENTINEL: &str = "Service worker sources exceed 2 MB and were not returned";

const BACKGROUND_SYNC: &[&str] = &[
    r#"addEventListener\(\s*['"`]sync['"`]"#,
    r"\bonsync\s*=",
    r"\bBackgroundSyncPlugin\b",
    r"\bworkbox\.backgroundSync\b",
    r"\bbackgroundSync\.Queue\b",
];

const PERIODIC_SYNC: &[&str] = &[
    r#"addEventListener\(\s*['"`]periodicsync['"`]"#,
    r"\bonperiodicsync\s*=",
    r"\bperiodicSync\.register\(",
];

const PUSH: &[&str] = &[
    r#"addEventListener\(\s*['"`]push['"`]"#,
    r"\bonpush\s*=",
    r"\bpushManager\.subscribe\(",
];

const SIGNS_OF_LOGIC: &[&str] = &[
    r"\bself\.",
    r"\bimportScripts\(",
    r"\.addAll\(",
    r#"addEventListener\(\s*['"`](?:install|fetch)['"`]"#,
];

// Handler heads: `function (e)`, `async function name(e)`, `(e) =>`, `e =>`.
const HANDLER_HEAD: &str = r"(?:async\s*)?(?:function\s*\w*\s*\(\s*\w*\s*\)|\(\s*\w*\s*\)\s*=>|\w+\s*=>)";
const PASS_THROUGH: &str = r"\w+\.respondWith\(\s*fetch\(\s*\w+\.request\s*\)\s*\)";

/// Compiled probe sets. Build once and reuse; [`analyze`] keeps a shared copy.
pub struct FeatureAnalyzer {
    background_sync: Vec<Regex>,
    periodic_sync: Vec<Regex>,
    push: Vec<Regex>,
    signs_of_logic: Vec<Regex>,
    empty_fetch: Vec<Regex>,
}

impl FeatureAnalyzer {
    pub fn new() -> Self {
        let fetch_listener = r#"addEventListener\(\s*['"`]fetch['"`]\s*,\s*"#;
        let empty_fetch = vec![
            // Empty body or a bare `return`.
            format!(r"{fetch_listener}{HANDLER_HEAD}\s*\{{\s*(?:return\s*;?\s*)?\}}\s*\)"),
            // Block body that only forwards the request.
            format!(
                r"{fetch_listener}{HANDLER_HEAD}\s*\{{\s*(?:return\s+)?{PASS_THROUGH}\s*;?\s*\}}\s*\)"
            ),
            // Arrow with an expression body that only forwards the request.
            format!(r"{fetch_listener}(?:async\s*)?(?:\(\s*\w*\s*\)|\w+)\s*=>\s*{PASS_THROUGH}\s*\)"),
            format!(r"\bonfetch\s*=\s*{HANDLER_HEAD}\s*\{{\s*(?:return\s*;?\s*)?\}}"),
            format!(r"\bonfetch\s*=\s*{HANDLER_HEAD}\s*\{{\s*(?:return\s+)?{PASS_THROUGH}\s*;?\s*\}}"),
        ];

        Self {
            background_sync: compile(BACKGROUND_SYNC.iter().copied()),
            periodic_sync: compile(PERIODIC_SYNC.iter().copied()),
            push: compile(PUSH.iter().copied()),
            signs_of_logic: compile(SIGNS_OF_LOGIC.iter().copied()),
            empty_fetch: compile(empty_fetch.iter().map(String::as_str)),
        }
    }

    /// Derive feature flags from the sources without echoing them.
    pub fn flags(&self, sources: &[String]) -> FeatureFlags {
        let corpus = collapse_whitespace(sources);
        let any = |probes: &[Regex]| probes.iter().any(|re| re.is_match(&corpus));

        FeatureFlags {
            has_background_sync: any(&self.background_sync),
            has_periodic_sync: any(&self.periodic_sync),
            has_push_registration: any(&self.push),
            has_fetch_logic: any(&self.signs_of_logic),
            is_empty_fetch_handler: any(&self.empty_fetch),
            size_kb: size_kb(aggregate_bytes(sources)),
        }
    }

    /// Derive feature flags and attach the sources (or the oversize sentinel).
    pub fn analyze(&self, sources: &[String]) -> ServiceWorkerFeatures {
        let flags = self.flags(sources);
        let bytes = aggregate_bytes(sources);
        let raw = if bytes < MAX_RAW_BYTES {
            RawSources::Sources(sources.to_vec())
        } else {
            tracing::debug!(bytes, "service worker sources oversize, not echoed");
            RawSources::Oversize(OVERSIZE_SENTINEL.to_string())
        };
        ServiceWorkerFeatures { flags, raw }
    }
}

impl Default for FeatureAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Analyze sources with a process-wide compiled analyzer.
pub fn analyze(sources: &[String]) -> ServiceWorkerFeatures {
    static ANALYZER: OnceLock<FeatureAnalyzer> = OnceLock::new();
    ANALYZER.get_or_init(FeatureAnalyzer::new).analyze(sources)
}

fn compile<'a>(patterns: impl Iterator<Item = &'a str>) -> Vec<Regex> {
    patterns
        .map(|p| Regex::new(p).expect("valid regex"))
        .collect()
}

/// Join all sources and collapse every whitespace run (newlines included) to one space.
fn collapse_whitespace(sources: &[String]) -> String {
    let mut out = String::with_capacity(aggregate_bytes(sources));
    for word in sources.iter().flat_map(|s| s.split_whitespace()) {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    out
}

fn aggregate_bytes(sources: &[String]) -> usize {
    sources.iter().map(String::len).sum()
}

fn size_kb(bytes: usize) -> f64 {
    (bytes as f64 / 1024.0 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags_of(src: &str) -> FeatureFlags {
        FeatureAnalyzer::new().flags(&[src.to_string()])
    }

    #[test]
    fn test_background_sync_listener() {
        let f = flags_of("self.addEventListener('sync', event => { event.waitUntil(flush()); });");
        assert!(f.has_background_sync);
        assert!(!f.has_periodic_sync);
    }

    #[test]
    fn test_background_sync_plugin_and_onsync() {
        assert!(flags_of("new workbox.backgroundSync.BackgroundSyncPlugin('q')").has_background_sync);
        assert!(flags_of("self.onsync = function (e) { }").has_background_sync);
    }

    #[test]
    fn test_periodic_sync_does_not_count_as_sync() {
        let f = flags_of("self.addEventListener(\"periodicsync\", e => refresh(e));");
        assert!(f.has_periodic_sync);
        assert!(!f.has_background_sync);
    }

    #[test]
    fn test_push_registration() {
        assert!(flags_of("self.addEventListener('push', e => show(e.data));").has_push_registration);
        assert!(flags_of("reg.pushManager.subscribe({ userVisibleOnly: true })").has_push_registration);
        assert!(!flags_of("console.log('pushed')").has_push_registration);
    }

    #[test]
    fn test_signs_of_logic() {
        assert!(flags_of("caches.open('v1').then(c => c.addAll(['/']))").has_fetch_logic);
        assert!(flags_of("importScripts('lib.js')").has_fetch_logic);
        assert!(!flags_of("console.log(1)").has_fetch_logic);
    }

    #[test]
    fn test_pass_through_fetch_is_empty() {
        let f = flags_of(r#"self.addEventListener("fetch",(e)=>{e.respondWith(fetch(e.request))})"#);
        assert!(f.is_empty_fetch_handler);
        assert!(f.has_fetch_logic);
    }

    #[test]
    fn test_empty_and_bare_return_handlers() {
        assert!(flags_of("self.addEventListener('fetch', function(event) {});").is_empty_fetch_handler);
        assert!(flags_of("self.addEventListener('fetch', event => {\n  return;\n});").is_empty_fetch_handler);
        assert!(flags_of("self.onfetch = function (e) { }").is_empty_fetch_handler);
        assert!(flags_of("addEventListener('fetch', e => e.respondWith(fetch(e.request)));").is_empty_fetch_handler);
    }

    #[test]
    fn test_conditional_fetch_is_not_empty() {
        let src = r#"
            self.addEventListener('fetch', (event) => {
                if (event.request.method !== 'GET') return;
                event.respondWith(caches.match(event.request).then(r => r || fetch(event.request)));
            });
        "#;
        let f = flags_of(src);
        assert!(!f.is_empty_fetch_handler);
        assert!(f.has_fetch_logic);
    }

    #[test]
    fn test_probes_span_sources() {
        let sources = vec![
            "importScripts('push.js');".to_string(),
            "self.addEventListener('push', () => {});".to_string(),
        ];
        assert!(FeatureAnalyzer::new().flags(&sources).has_push_registration);
    }

    #[test]
    fn test_size_and_raw_echo() {
        let sources = vec!["a".repeat(2048)];
        let features = analyze(&sources);
        assert_eq!(features.flags.size_kb, 2.0);
        assert_eq!(features.raw, RawSources::Sources(sources));
    }

    #[test]
    fn test_oversize_sentinel() {
        let sources = vec!["x".repeat(MAX_RAW_BYTES)];
        let features = analyze(&sources);
        assert_eq!(features.raw, RawSources::Oversize(OVERSIZE_SENTINEL.to_string()));
        assert_eq!(features.flags.size_kb, 2048.0);
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let sources = vec![
            "self.addEventListener('sync', e => e.waitUntil(send()));\nself.addEventListener('fetch', e => {});"
                .to_string(),
        ];
        let first = serde_json::to_string(&analyze(&sources)).unwrap();
        let second = serde_json::to_string(&analyze(&sources)).unwrap();
        let fresh = serde_json::to_string(&FeatureAnalyzer::new().analyze(&sources)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, fresh);
    }

    #[test]
    fn test_empty_sources() {
        let f = FeatureAnalyzer::new().flags(&[]);
        assert!(!f.has_fetch_logic);
        assert_eq!(f.size_kb, 0.0);
    }
}
