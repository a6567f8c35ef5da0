//! Layered manifest discovery.
//!
//! Layer 1 reads only the page `<head>` over HTTP and fetches the linked
//! manifest under two user agents at once. Layer 2 renders the page in a
//! browser to find a link injected by script. Layers run strictly in order;
//! the browser is only opened when layer 1 is exhausted.

use crate::acquisition::head_scanner::{find_manifest_link, has_head, resolve_href};
use crate::acquisition::http_client::HttpClient;
use crate::config::Config;
use crate::error::{DetectError, DetectResult};
use crate::renderer::{self, RenderContext, Renderer, WaitUntil};
use pwa_inspect::{parse_manifest, ManifestResolution, ManifestStrategy};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

const PAGE_TIMEOUT_MS: u64 = 15_000;
const MANIFEST_TIMEOUT_MS: u64 = 10_000;
const NAVIGATION_TIMEOUT_MS: u64 = 15_000;

/// Reads the resolved manifest href from the live DOM.
const MANIFEST_LINK_SCRIPT: &str = r#"(() => {
    const link = document.querySelector('link[rel~="manifest" i][href]');
    return link ? link.href : null;
})()"#;

/// One user agent's attempt: raw text and parsed JSON.
type Variant = DetectResult<(String, String, Value)>;

/// Locates and parses a site's web app manifest.
#[derive(Clone)]
pub struct ManifestResolver {
    client: HttpClient,
    renderer: Arc<dyn Renderer>,
    user_agent: String,
    suffixed_user_agent: String,
}

impl ManifestResolver {
    pub fn new(client: HttpClient, renderer: Arc<dyn Renderer>, config: &Config) -> Self {
        Self {
            client,
            renderer,
            user_agent: config.user_agent.clone(),
            suffixed_user_agent: config.suffixed_user_agent(),
        }
    }

    /// Run the full discovery chain for `site_url`.
    pub async fn resolve(&self, site_url: &str) -> DetectResult<ManifestResolution> {
        let mut attempts: Vec<String> = Vec::new();

        match self.client.get_head(site_url, PAGE_TIMEOUT_MS).await {
            Ok(head) if !has_head(&head.markup) => {
                attempts.push(format!("fast-fetch: {} has no <head>", head.final_url));
                return Err(DetectError::NotFound { attempts });
            }
            Ok(head) => match find_manifest_link(&head.markup, &head.final_url) {
                Some(href) => {
                    debug!(%href, "manifest link found in <head>");
                    match self.fetch_and_parse(&href).await {
                        Ok(resolution) => return Ok(resolution),
                        Err(e) => attempts.push(format!("fast-fetch: {e}")),
                    }
                }
                None => attempts.push("fast-fetch: no manifest link in <head>".to_string()),
            },
            Err(e) => attempts.push(format!("fast-fetch: {e}")),
        }

        info!(site = site_url, "manifest fast path exhausted, rendering page");
        let fallback = match self.href_from_browser(site_url).await {
            Ok(href) => self.fetch_and_parse(&href).await,
            Err(e) => Err(e),
        };

        match fallback {
            Ok(mut resolution) => {
                resolution.strategy = ManifestStrategy::BrowserFallback;
                resolution.error = join_errors(resolution.error.take(), attempts);
                Ok(resolution)
            }
            Err(e) => {
                attempts.push(format!("browser-fallback: {e}"));
                Err(DetectError::NotFound { attempts })
            }
        }
    }

    /// Fetch a known manifest URL under both user agents concurrently and parse it.
    ///
    /// The baseline agent's result wins whenever it parses.
    pub async fn fetch_and_parse(&self, manifest_url: &str) -> DetectResult<ManifestResolution> {
        let (primary, secondary) = tokio::join!(
            self.fetch_variant(manifest_url, &self.user_agent),
            self.fetch_variant(manifest_url, &self.suffixed_user_agent),
        );
        select_variant(primary, secondary)
    }

    async fn fetch_variant(&self, url: &str, user_agent: &str) -> Variant {
        let resp = self
            .client
            .get_as(url, user_agent, MANIFEST_TIMEOUT_MS)
            .await?
            .error_for_status()?;
        let json = parse_manifest(&resp.body)?;
        Ok((resp.final_url, resp.body, json))
    }

    /// Open a browser session, read the manifest href, and always close the session.
    async fn href_from_browser(&self, site_url: &str) -> DetectResult<String> {
        let mut ctx = self
            .renderer
            .new_context()
            .await
            .map_err(|e| DetectError::Network(format!("{e:#}")))?;
        let href = read_manifest_href(ctx.as_mut(), site_url).await;
        renderer::release(ctx).await;
        href
    }
}

async fn read_manifest_href(ctx: &mut dyn RenderContext, site_url: &str) -> DetectResult<String> {
    let nav = ctx
        .navigate(site_url, NAVIGATION_TIMEOUT_MS, WaitUntil::Load)
        .await
        .map_err(|e| DetectError::Network(format!("{e:#}")))?;
    let value = ctx
        .execute_js(MANIFEST_LINK_SCRIPT)
        .await
        .map_err(|e| DetectError::Network(format!("{e:#}")))?;

    value
        .as_str()
        .filter(|href| !href.trim().is_empty())
        .and_then(|href| resolve_href(href.trim(), &nav.final_url))
        .ok_or_else(|| DetectError::Parse("rendered DOM has no manifest link".to_string()))
}

/// Apply the fixed precedence: baseline agent, then suffixed agent.
fn select_variant(primary: Variant, secondary: Variant) -> DetectResult<ManifestResolution> {
    let resolution = |(url, raw_text, json): (String, String, Value), strategy, error| {
        ManifestResolution {
            url,
            raw_text,
            parsed_json: Some(json),
            strategy,
            error,
        }
    };

    match (primary, secondary) {
        (Ok(hit), _) => Ok(resolution(hit, ManifestStrategy::FastFetch, None)),
        (Err(first), Ok(hit)) => Ok(resolution(
            hit,
            ManifestStrategy::DualAgentFetch,
            Some(format!("baseline agent: {first}")),
        )),
        (Err(first), Err(second)) => {
            let message = format!("baseline agent: {first}; suffixed agent: {second}");
            Err(match (&first, &second) {
                (DetectError::Network(_), DetectError::Network(_)) => DetectError::Network(message),
                _ => DetectError::Parse(message),
            })
        }
    }
}

fn join_errors(existing: Option<String>, attempts: Vec<String>) -> Option<String> {
    let chain: Vec<String> = attempts.into_iter().chain(existing).collect();
    (!chain.is_empty()).then(|| chain.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn hit(url: &str) -> Variant {
        Ok((url.to_string(), "{}".to_string(), json!({})))
    }

    #[test]
    fn test_baseline_agent_wins() {
        let res = select_variant(hit("https://a/m.json"), hit("https://b/m.json")).unwrap();
        assert_eq!(res.strategy, ManifestStrategy::FastFetch);
        assert_eq!(res.url, "https://a/m.json");
        assert!(res.error.is_none());
    }

    #[test]
    fn test_suffixed_agent_used_when_baseline_fails() {
        let res = select_variant(
            Err(DetectError::Parse("not JSON".into())),
            hit("https://b/m.json"),
        )
        .unwrap();
        assert_eq!(res.strategy, ManifestStrategy::DualAgentFetch);
        assert!(res.error.unwrap().contains("not JSON"));
    }

    #[test]
    fn test_both_fail() {
        let err = select_variant(
            Err(DetectError::Network("HTTP 403".into())),
            Err(DetectError::Network("HTTP 403".into())),
        )
        .unwrap_err();
        assert_eq!(err.code(), "NETWORK_ERROR");

        let err = select_variant(
            Err(DetectError::Network("HTTP 403".into())),
            Err(DetectError::Parse("bad".into())),
        )
        .unwrap_err();
        assert_eq!(err.code(), "PARSE_ERROR");
    }

    #[test]
    fn test_join_errors() {
        assert_eq!(join_errors(None, vec![]), None);
        assert_eq!(
            join_errors(Some("b".into()), vec!["a".into()]).as_deref(),
            Some("a; b")
        );
    }
}
