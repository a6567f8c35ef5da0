//! Read fields out of raw audit-tool (Lighthouse) JSON output.
//!
//! Every accessor tolerates missing or mistyped fields: the output may be
//! the empty object when the audit run was killed or failed.

use serde_json::Value;

/// Lowest score counted as a pass. Lighthouse's binary audits score 0 or 1.
pub const PASS_THRESHOLD: f64 = 0.9;

pub const IS_ON_HTTPS: &str = "is-on-https";
pub const INSTALLABLE_MANIFEST: &str = "installable-manifest";
pub const SERVICE_WORKER: &str = "service-worker";
pub const MASKABLE_ICON: &str = "maskable-icon";
pub const SPLASH_SCREEN: &str = "splash-screen";
pub const THEMED_OMNIBOX: &str = "themed-omnibox";
pub const VIEWPORT: &str = "viewport";

/// The audits requested from the tool, in `--only-audits` order.
pub const AUDIT_IDS: &[&str] = &[
    INSTALLABLE_MANIFEST,
    IS_ON_HTTPS,
    SERVICE_WORKER,
    MASKABLE_ICON,
    SPLASH_SCREEN,
    THEMED_OMNIBOX,
    VIEWPORT,
];

/// Whether the output carries at least one audit result.
pub fn has_audits(raw: &Value) -> bool {
    raw.get("audits")
        .and_then(Value::as_object)
        .is_some_and(|audits| !audits.is_empty())
}

/// Score present and at or above [`PASS_THRESHOLD`]. No partial credit.
pub fn passes(raw: &Value, audit_id: &str) -> bool {
    audit(raw, audit_id)
        .and_then(|a| a.get("score"))
        .and_then(Value::as_f64)
        .is_some_and(|score| score >= PASS_THRESHOLD)
}

/// Manifest URL the tool found while checking installability.
pub fn manifest_url(raw: &Value) -> Option<String> {
    let details = details(raw, INSTALLABLE_MANIFEST)?;
    non_empty_str(details.pointer("/debugData/manifestUrl"))
        .or_else(|| non_empty_str(details.get("manifestUrl")))
}

/// Service worker script URL the tool observed.
pub fn service_worker_url(raw: &Value) -> Option<String> {
    let details = details(raw, SERVICE_WORKER)?;
    non_empty_str(details.get("scriptUrl"))
        .or_else(|| non_empty_str(details.pointer("/debugData/scriptUrl")))
}

/// Scope of the observed service worker registration.
pub fn service_worker_scope(raw: &Value) -> Option<String> {
    let details = details(raw, SERVICE_WORKER)?;
    non_empty_str(details.get("scopeUrl"))
        .or_else(|| non_empty_str(details.pointer("/debugData/scopeUrl")))
}

/// Installability failure reasons listed by the manifest audit.
pub fn manifest_failures(raw: &Value) -> Vec<String> {
    details(raw, INSTALLABLE_MANIFEST)
        .and_then(|d| d.get("items"))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| non_empty_str(item.get("reason")))
                .collect()
        })
        .unwrap_or_default()
}

fn audit<'a>(raw: &'a Value, audit_id: &str) -> Option<&'a Value> {
    raw.get("audits")?.get(audit_id)
}

fn details<'a>(raw: &'a Value, audit_id: &str) -> Option<&'a Value> {
    audit(raw, audit_id)?.get("details")
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
