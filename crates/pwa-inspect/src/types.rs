//! Core data types for manifest and service worker detection.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a manifest was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManifestStrategy {
    /// Head-only page fetch, manifest parsed under the baseline user agent.
    FastFetch,
    /// Head-only page fetch, manifest parsed only under the suffixed user agent.
    DualAgentFetch,
    /// Link discovered from the rendered DOM.
    BrowserFallback,
}

impl ManifestStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FastFetch => "fast-fetch",
            Self::DualAgentFetch => "dual-agent-fetch",
            Self::BrowserFallback => "browser-fallback",
        }
    }
}

/// A located and parsed web app manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResolution {
    pub url: String,
    pub raw_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed_json: Option<Value>,
    pub strategy: ManifestStrategy,
    /// Failures of earlier strategies, in the order they were tried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// How a service worker script URL was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerStrategy {
    /// `register(...)` call found in the raw markup.
    FastFetch,
    /// Registration read from the live page.
    BrowserFallback,
    /// URL named by the audit tool.
    Audit,
}

/// A located service worker script and the text it pulls in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWorkerResolution {
    pub script_url: String,
    /// Main script first, then each imported script in call order.
    pub sources: Vec<String>,
    pub strategy: WorkerStrategy,
    /// Set when the URL was found but its content could not be fetched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceWorkerResolution {
    /// URL found but no content reachable.
    pub fn is_unreachable(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Capability indicators inferred from service worker text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlags {
    pub has_background_sync: bool,
    pub has_periodic_sync: bool,
    pub has_push_registration: bool,
    pub has_fetch_logic: bool,
    pub is_empty_fetch_handler: bool,
    pub size_kb: f64,
}

/// Service worker text echoed back to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSources {
    Sources(Vec<String>),
    /// Replaces the sources when they are too large to return.
    Oversize(String),
}

/// Feature flags together with the analyzed text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceWorkerFeatures {
    #[serde(flatten)]
    pub flags: FeatureFlags,
    pub raw: RawSources,
}

/// Errors from manifest text handling.
#[derive(thiserror::Error, Debug)]
pub enum ManifestParseError {
    #[error("manifest is empty")]
    Empty,

    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest is not a JSON object")]
    NotAnObject,
}
