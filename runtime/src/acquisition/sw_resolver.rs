//! Layered service worker discovery.
//!
//! Layer 1 scans the raw markup (redirects followed by hand so the true
//! origin is known) for a registration call. Layer 2 renders the page and
//! asks the registration API directly. A found URL whose content cannot be
//! fetched is still a result, with empty sources.

use crate::acquisition::http_client::HttpClient;
use crate::acquisition::js_analyzer::{expand_imports, extract_register_path, resolve_script_url};
use crate::error::{DetectError, DetectResult};
use crate::renderer::{self, RenderContext, Renderer, WaitUntil};
use base64::Engine;
use percent_encoding::percent_decode_str;
use pwa_inspect::{ServiceWorkerFeatures, ServiceWorkerResolution, WorkerStrategy};
use std::sync::Arc;
use tracing::{debug, info};

const FAST_TIMEOUT_MS: u64 = 5_000;
const NAVIGATION_TIMEOUT_MS: u64 = 15_000;
const NETWORK_IDLE_TIMEOUT_MS: u64 = 3_000;
const NETWORK_IDLE_QUIET_MS: u64 = 500;
const SCRIPT_TIMEOUT_MS: u64 = 10_000;

/// Reads the script URL of the page's active, installing or waiting worker.
const REGISTRATION_SCRIPT: &str = r#"(async () => {
    if (!('serviceWorker' in navigator)) return null;
    const reg = await navigator.serviceWorker.getRegistration();
    const worker = reg && (reg.active || reg.installing || reg.waiting);
    return worker ? worker.scriptURL : null;
})()"#;

/// Locates and fetches a site's service worker script.
#[derive(Clone)]
pub struct ServiceWorkerResolver {
    client: HttpClient,
    renderer: Arc<dyn Renderer>,
}

impl ServiceWorkerResolver {
    pub fn new(client: HttpClient, renderer: Arc<dyn Renderer>) -> Self {
        Self { client, renderer }
    }

    /// Run the full discovery chain for `site_url`.
    pub async fn resolve(&self, site_url: &str) -> DetectResult<ServiceWorkerResolution> {
        let mut attempts: Vec<String> = Vec::new();

        let mut found = match self.script_url_from_markup(site_url).await {
            Ok(url) => Some((url, WorkerStrategy::FastFetch)),
            Err(e) => {
                attempts.push(format!("fast-fetch: {e}"));
                None
            }
        };

        if found.is_none() {
            info!(site = site_url, "service worker fast path exhausted, rendering page");
            match self.script_url_from_browser(site_url).await {
                Ok(url) => found = Some((url, WorkerStrategy::BrowserFallback)),
                Err(e) => attempts.push(format!("browser-fallback: {e}")),
            }
        }

        let Some((script_url, strategy)) = found else {
            return Err(DetectError::NotFound { attempts });
        };
        debug!(%script_url, ?strategy, "service worker located");
        Ok(self.fetch_resolution(script_url, strategy).await)
    }

    /// Fetch a known script URL. Unreachable content yields empty sources.
    pub async fn fetch_resolution(
        &self,
        script_url: String,
        strategy: WorkerStrategy,
    ) -> ServiceWorkerResolution {
        match self.fetch_script(&script_url).await {
            Ok(body) => ServiceWorkerResolution {
                script_url,
                sources: vec![body],
                strategy,
                error: None,
            },
            Err(e) => {
                debug!(%script_url, "service worker content unreachable: {e}");
                ServiceWorkerResolution {
                    script_url,
                    sources: Vec::new(),
                    strategy,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Pull in imported scripts and run the static analyzer over the whole corpus.
    ///
    /// Returns the expanded resolution alongside its features; a resolution
    /// with no reachable content is a network error.
    pub async fn analyze(
        &self,
        resolution: ServiceWorkerResolution,
    ) -> DetectResult<(ServiceWorkerResolution, ServiceWorkerFeatures)> {
        if resolution.is_unreachable() {
            return Err(DetectError::Network(resolution.error.unwrap_or_else(|| {
                format!("{} returned no content", resolution.script_url)
            })));
        }
        let expanded = expand_imports(resolution, &self.client).await;
        let features = pwa_inspect::analyze(&expanded.sources);
        debug!(
            script_url = %expanded.script_url,
            sources = expanded.sources.len(),
            size_kb = features.flags.size_kb,
            "service worker analyzed"
        );
        Ok((expanded, features))
    }

    /// Fetch script text with the configured user agent. `data:` URIs decode locally.
    pub async fn fetch_script(&self, script_url: &str) -> DetectResult<String> {
        if script_url.starts_with("data:") {
            return decode_data_uri(script_url);
        }
        let resp = self
            .client
            .get(script_url, SCRIPT_TIMEOUT_MS)
            .await?
            .error_for_status()?;
        Ok(resp.body)
    }

    async fn script_url_from_markup(&self, site_url: &str) -> DetectResult<String> {
        let (resp, hops) = self
            .client
            .get_observing_redirects(site_url, FAST_TIMEOUT_MS)
            .await?;
        if hops.len() > 1 {
            debug!(hops = ?hops, "redirects observed");
        }

        let path = extract_register_path(&resp.body)
            .ok_or_else(|| DetectError::Parse("no register() call in markup".to_string()))?;
        resolve_script_url(&path, &resp.url)
            .ok_or_else(|| DetectError::Parse(format!("unresolvable script path {path:?}")))
    }

    /// Open a browser session, read the registration, and always close the session.
    async fn script_url_from_browser(&self, site_url: &str) -> DetectResult<String> {
        let mut ctx = self
            .renderer
            .new_context()
            .await
            .map_err(|e| DetectError::Network(format!("{e:#}")))?;
        let url = read_registration(ctx.as_mut(), site_url).await;
        renderer::release(ctx).await;
        url
    }
}

async fn read_registration(ctx: &mut dyn RenderContext, site_url: &str) -> DetectResult<String> {
    ctx.navigate(site_url, NAVIGATION_TIMEOUT_MS, WaitUntil::Load)
        .await
        .map_err(|e| DetectError::Network(format!("{e:#}")))?;

    // Best-effort: a page that never goes idle is still inspected.
    match ctx
        .wait_for_network_idle(NETWORK_IDLE_QUIET_MS, NETWORK_IDLE_TIMEOUT_MS)
        .await
    {
        Ok(true) => {}
        Ok(false) => debug!("network not idle after {NETWORK_IDLE_TIMEOUT_MS}ms, continuing"),
        Err(e) => debug!("network idle wait failed, continuing: {e:#}"),
    }

    let value = ctx
        .execute_js(REGISTRATION_SCRIPT)
        .await
        .map_err(|e| DetectError::Network(format!("{e:#}")))?;
    value
        .as_str()
        .filter(|u| !u.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| DetectError::Parse("page has no service worker registration".to_string()))
}

/// Decode a `data:` URI body, base64 or percent-encoded.
fn decode_data_uri(uri: &str) -> DetectResult<String> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| DetectError::parse("not a data: URI"))?;
    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| DetectError::parse("data: URI has no payload"))?;

    let bytes = if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(DetectError::parse)?
    } else {
        percent_decode_str(data).collect()
    };
    String::from_utf8(bytes).map_err(DetectError::parse)
}
