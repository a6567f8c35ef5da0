//! The final PWA report: per-check booleans plus resolved artifacts.

use crate::audit_output as lh;
use crate::types::{FeatureFlags, ManifestResolution, RawSources, ServiceWorkerFeatures};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub audits: Audits,
    pub artifacts: Artifacts,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audits {
    pub is_on_https: Check,
    pub installable_manifest: ManifestCheck,
    pub service_worker: ServiceWorkerCheck,
    pub maskable_icon: Check,
    pub splash_screen: Check,
    pub themed_omnibox: Check,
    pub viewport: Check,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Check {
    pub score: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManifestCheck {
    pub score: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ManifestCheckDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestCheckDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceWorkerCheck {
    pub score: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ServiceWorkerCheckDetails>,
}

/// Service worker details. `features` never carries the raw sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceWorkerCheckDetails {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureFlags>,
}

/// Artifacts keyed by category. A key is absent when no URL was named for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifacts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_app_manifest: Option<ManifestArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_worker: Option<ServiceWorkerArtifact>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestArtifact {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ManifestArtifact {
    pub fn resolved(resolution: ManifestResolution) -> Self {
        Self {
            url: resolution.url,
            raw: Some(resolution.raw_text),
            json: resolution.parsed_json,
            error: None,
        }
    }

    /// URL named but the manifest could not be fetched or parsed.
    pub fn failed(url: impl Into<String>, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            raw: None,
            json: None,
            error: Some(error.to_string()),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.json.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceWorkerArtifact {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<RawSources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Kept out of the wire format; surfaced under `audits.serviceWorker.details`.
    #[serde(skip)]
    pub features: Option<FeatureFlags>,
}

impl ServiceWorkerArtifact {
    pub fn analyzed(url: impl Into<String>, features: ServiceWorkerFeatures) -> Self {
        Self {
            url: url.into(),
            raw: Some(features.raw),
            error: None,
            features: Some(features.flags),
        }
    }

    pub fn failed(url: impl Into<String>, error: impl ToString) -> Self {
        Self {
            url: url.into(),
            raw: None,
            error: Some(error.to_string()),
            features: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.features.is_some()
    }
}

impl Report {
    /// Merge raw audit output with independently resolved artifacts.
    ///
    /// Check details use the URL named by the audit, falling back to the
    /// artifact's own URL when the audit named none.
    pub fn from_parts(
        raw: &Value,
        web_app_manifest: Option<ManifestArtifact>,
        service_worker: Option<ServiceWorkerArtifact>,
    ) -> Self {
        let manifest_url = lh::manifest_url(raw)
            .or_else(|| web_app_manifest.as_ref().map(|a| a.url.clone()));
        let worker_url = lh::service_worker_url(raw)
            .or_else(|| service_worker.as_ref().map(|a| a.url.clone()));

        let audits = Audits {
            is_on_https: Check::of(raw, lh::IS_ON_HTTPS),
            installable_manifest: ManifestCheck {
                score: lh::passes(raw, lh::INSTALLABLE_MANIFEST),
                details: manifest_url.map(|url| ManifestCheckDetails {
                    url,
                    failures: lh::manifest_failures(raw),
                }),
            },
            service_worker: ServiceWorkerCheck {
                score: lh::passes(raw, lh::SERVICE_WORKER),
                details: worker_url.map(|url| ServiceWorkerCheckDetails {
                    url,
                    scope: lh::service_worker_scope(raw),
                    features: service_worker.as_ref().and_then(|a| a.features.clone()),
                }),
            },
            maskable_icon: Check::of(raw, lh::MASKABLE_ICON),
            splash_screen: Check::of(raw, lh::SPLASH_SCREEN),
            themed_omnibox: Check::of(raw, lh::THEMED_OMNIBOX),
            viewport: Check::of(raw, lh::VIEWPORT),
        };

        Self {
            audits,
            artifacts: Artifacts {
                web_app_manifest,
                service_worker,
            },
        }
    }

    /// At least one artifact was actually fetched (not merely named).
    pub fn has_resolved_artifact(&self) -> bool {
        self.artifacts
            .web_app_manifest
            .as_ref()
            .is_some_and(ManifestArtifact::is_resolved)
            || self
                .artifacts
                .service_worker
                .as_ref()
                .is_some_and(ServiceWorkerArtifact::is_resolved)
    }
}

impl Check {
    fn of(raw: &Value, audit_id: &str) -> Self {
        Self {
            score: lh::passes(raw, audit_id),
        }
    }
}
