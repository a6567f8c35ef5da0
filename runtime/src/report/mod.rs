//! Report assembly: one audit run joined with independently resolved artifacts.
//!
//! The audit runs first. Once its output is in (or has timed out to the
//! empty object) the manifest and service worker tasks run concurrently
//! under [`settle_both`], so one failing never costs the other its result.

pub mod settle;

use crate::acquisition::manifest_resolver::ManifestResolver;
use crate::acquisition::sw_resolver::ServiceWorkerResolver;
use crate::audit::{AuditRequest, AuditRun, AuditRunner};
use crate::error::DetectResult;
use pwa_inspect::audit_output as lh;
use pwa_inspect::{ManifestArtifact, Report, ServiceWorkerArtifact, WorkerStrategy};
use serde_json::{json, Value};
use settle::{settle_both, Settled};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A finished report and the audit run behind it.
#[derive(Debug)]
pub struct ReportOutcome {
    pub report: Report,
    pub audit: AuditRun,
    audited: bool,
}

impl ReportOutcome {
    /// The audit produced at least one check result.
    pub fn audited(&self) -> bool {
        self.audited
    }

    /// 200 whenever any audit or artifact data exists, else 500.
    pub fn status(&self) -> u16 {
        if self.audited || self.report.has_resolved_artifact() {
            200
        } else {
            500
        }
    }

    /// Wire body: the report, or `{error}` on total failure.
    pub fn body(&self) -> Value {
        if self.status() == 200 {
            return serde_json::to_value(&self.report).unwrap_or_else(|e| json!({ "error": e.to_string() }));
        }
        let reason = self
            .audit
            .error()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "audit produced no results".to_string());
        let mut message = format!("no audit data and no artifact resolved: {reason}");
        let artifacts = &self.report.artifacts;
        // Located but unreadable artifacts are named so they read differently from not found.
        if let Some(m) = &artifacts.web_app_manifest {
            let error = m.error.as_deref().unwrap_or("no content");
            message.push_str(&format!("; manifest {} unreadable: {error}", m.url));
        }
        if let Some(w) = &artifacts.service_worker {
            let error = w.error.as_deref().unwrap_or("no content");
            message.push_str(&format!("; service worker {} unreachable: {error}", w.url));
        }
        json!({ "error": message })
    }
}

pub struct ReportAssembler {
    auditor: Arc<dyn AuditRunner>,
    manifests: ManifestResolver,
    workers: ServiceWorkerResolver,
}

impl ReportAssembler {
    pub fn new(
        auditor: Arc<dyn AuditRunner>,
        manifests: ManifestResolver,
        workers: ServiceWorkerResolver,
    ) -> Self {
        Self {
            auditor,
            manifests,
            workers,
        }
    }

    pub fn manifests(&self) -> &ManifestResolver {
        &self.manifests
    }

    pub fn workers(&self) -> &ServiceWorkerResolver {
        &self.workers
    }

    /// Audit `site_url` and enrich the result with fetched artifacts.
    ///
    /// When the audit names a URL only that URL is fetched, and an artifact
    /// appears exactly for each named URL. When the audit produced nothing
    /// at all, both discovery chains run against the site instead.
    pub async fn assemble(&self, site_url: &str, desktop: bool) -> ReportOutcome {
        let audit = self
            .auditor
            .run(&AuditRequest {
                url: site_url.to_string(),
                desktop,
            })
            .await;
        let raw = audit.result();
        let audited = lh::has_audits(&raw);
        if !audited {
            warn!(site = site_url, state = ?audit.state, "audit returned no results, discovering artifacts directly");
        }

        let manifest_url = lh::manifest_url(&raw);
        let worker_url = lh::service_worker_url(&raw);

        let (manifest, worker) = settle_both(
            self.manifest_task(site_url, manifest_url.as_deref(), !audited),
            self.worker_task(site_url, worker_url.as_deref(), !audited),
        )
        .await;

        let web_app_manifest = match manifest {
            Settled::Fulfilled(artifact) => artifact,
            Settled::Rejected(e) => {
                warn!(site = site_url, "manifest enrichment failed: {e}");
                manifest_url.map(|url| ManifestArtifact::failed(url, e))
            }
        };
        let service_worker = match worker {
            Settled::Fulfilled(artifact) => artifact,
            Settled::Rejected(e) => {
                warn!(site = site_url, "service worker enrichment failed: {e}");
                worker_url.map(|url| ServiceWorkerArtifact::failed(url, e))
            }
        };

        let report = Report::from_parts(&raw, web_app_manifest, service_worker);
        let outcome = ReportOutcome {
            report,
            audit,
            audited,
        };
        info!(site = site_url, status = outcome.status(), "report assembled");
        outcome
    }

    async fn manifest_task(
        &self,
        site_url: &str,
        named: Option<&str>,
        discover: bool,
    ) -> DetectResult<Option<ManifestArtifact>> {
        let resolution = match named {
            Some(url) => self.manifests.fetch_and_parse(url).await?,
            None if discover => self.manifests.resolve(site_url).await?,
            None => return Ok(None),
        };
        Ok(Some(ManifestArtifact::resolved(resolution)))
    }

    async fn worker_task(
        &self,
        site_url: &str,
        named: Option<&str>,
        discover: bool,
    ) -> DetectResult<Option<ServiceWorkerArtifact>> {
        let resolution = match named {
            Some(url) => {
                self.workers
                    .fetch_resolution(url.to_string(), WorkerStrategy::Audit)
                    .await
            }
            None if discover => self.workers.resolve(site_url).await?,
            None => return Ok(None),
        };
        let script_url = resolution.script_url.clone();
        match self.workers.analyze(resolution).await {
            Ok((expanded, features)) => Ok(Some(ServiceWorkerArtifact::analyzed(
                expanded.script_url,
                features,
            ))),
            // Located but unreadable: keep the URL and the reason.
            Err(e) => {
                debug!(%script_url, "service worker located but not analyzable: {e}");
                Ok(Some(ServiceWorkerArtifact::failed(script_url, e.to_string())))
            }
        }
    }
}
