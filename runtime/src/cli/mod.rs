//! CLI subcommand implementations for the pwa-inspect binary.

pub mod doctor;
pub mod manifest_cmd;
pub mod output;
pub mod report_cmd;
pub mod serve;
pub mod sw_cmd;

use crate::acquisition::http_client::HttpClient;
use crate::acquisition::manifest_resolver::ManifestResolver;
use crate::acquisition::sw_resolver::ServiceWorkerResolver;
use crate::audit::lighthouse::LighthouseRunner;
use crate::audit::profile::RuntimeProfile;
use crate::audit::{AuditRunner, UnavailableAuditRunner};
use crate::config::Config;
use crate::renderer::chromium::ChromiumRenderer;
use crate::renderer::{NoopRenderer, Renderer};
use crate::report::ReportAssembler;
use std::sync::Arc;
use tracing::{info, warn};

/// Whole-request timeout for plain HTTP fetches; per-call timeouts are tighter.
const HTTP_CLIENT_TIMEOUT_MS: u64 = 30_000;

/// Wire the pipeline from configuration.
///
/// A missing browser degrades to HTTP-only discovery and a missing audit
/// tool to artifact-only reports; neither is fatal.
pub fn build_assembler(config: &Config) -> ReportAssembler {
    let client = HttpClient::new(&config.user_agent, HTTP_CLIENT_TIMEOUT_MS);

    let renderer: Arc<dyn Renderer> =
        match ChromiumRenderer::new(config.chromium_path.as_deref(), &config.user_agent) {
            Ok(renderer) => {
                info!(chrome = %renderer.chrome_path().display(), "Chromium renderer initialized");
                Arc::new(renderer)
            }
            Err(e) => {
                warn!("Failed to initialize Chromium: {e:#}");
                warn!("Running in HTTP-only mode (no browser fallback)");
                Arc::new(NoopRenderer)
            }
        };

    let profile = RuntimeProfile::detect(config);
    let auditor: Arc<dyn AuditRunner> = match LighthouseRunner::from_config(config, profile) {
        Ok(runner) => {
            info!(budget_ms = runner.budget().as_millis() as u64, "audit tool ready");
            Arc::new(runner)
        }
        Err(e) => {
            warn!("Audit tool unavailable: {e:#}");
            Arc::new(UnavailableAuditRunner {
                reason: format!("{e:#}"),
            })
        }
    };

    ReportAssembler::new(
        auditor,
        ManifestResolver::new(client.clone(), Arc::clone(&renderer), config),
        ServiceWorkerResolver::new(client, renderer),
    )
}
