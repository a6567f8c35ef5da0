//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `Renderer` and `RenderContext` traits that abstract over
//! the browser engine (currently Chromium via chromiumoxide). Resolvers only
//! open a context on their fallback path and must hand it back through
//! [`release`] on every exit branch.

pub mod chromium;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
}

/// Lifecycle event a navigation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    /// The `load` event.
    Load,
}

/// A browser engine that can create rendering contexts.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a new isolated browser session.
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser session for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Navigate to a URL with a timeout.
    async fn navigate(
        &mut self,
        url: &str,
        timeout_ms: u64,
        wait_until: WaitUntil,
    ) -> Result<NavigationResult>;

    /// Execute JavaScript in the page and return the (awaited) result.
    async fn execute_js(&self, script: &str) -> Result<serde_json::Value>;

    /// Close this context and release the browser behind it.
    async fn close(self: Box<Self>) -> Result<()>;

    /// Wait until no new resource entries appear for `idle_ms`, up to `timeout_ms`.
    ///
    /// Returns whether the page went idle. Timing out is not an error.
    async fn wait_for_network_idle(&self, idle_ms: u64, timeout_ms: u64) -> Result<bool> {
        const POLL: Duration = Duration::from_millis(100);
        let script = "performance.getEntriesByType('resource').length";

        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut last_count = self.execute_js(script).await?.as_u64().unwrap_or(0);
        let mut quiet_since = Instant::now();

        while Instant::now() < deadline {
            tokio::time::sleep(POLL).await;
            let count = self.execute_js(script).await?.as_u64().unwrap_or(0);
            if count != last_count {
                last_count = count;
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= Duration::from_millis(idle_ms) {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Close a context, logging (never propagating) a cleanup failure.
pub async fn release(ctx: Box<dyn RenderContext>) {
    if let Err(e) = ctx.close().await {
        let err = crate::error::DetectError::Cleanup(format!("{e:#}"));
        tracing::warn!(code = err.code(), "{err}");
    }
}

/// A no-op renderer used when Chromium is unavailable.
///
/// The HTTP fast paths work without a browser; every fallback that needs
/// one fails and the resolver reports its chain as exhausted.
pub struct NoopRenderer;

#[async_trait]
impl Renderer for NoopRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        Err(anyhow::anyhow!("browser not available, running HTTP-only"))
    }
    fn active_contexts(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_renderer_refuses_contexts() {
        let renderer = NoopRenderer;
        assert!(renderer.new_context().await.is_err());
        assert_eq!(renderer.active_contexts(), 0);
    }
}
