//! Chromium-based renderer using chromiumoxide.
//!
//! Every context launches its own headless browser with a private profile
//! directory, so concurrent requests never share browser state. Closing the
//! context shuts that browser down; dropping an unclosed context schedules
//! the same shutdown on the runtime.

use super::{NavigationResult, RenderContext, Renderer, WaitUntil};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Find the Chromium binary path.
///
/// Order: explicit path, cached revision under `~/.pwa-inspect/chromium/`,
/// system PATH, then platform default install locations.
pub fn find_chromium(explicit: Option<&Path>) -> Option<PathBuf> {
    // 1. Configured path
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
    }

    // 2. ~/.pwa-inspect/chromium/
    if let Some(home) = dirs::home_dir() {
        let cache = home.join(".pwa-inspect/chromium");
        let candidates = if cfg!(target_os = "macos") {
            vec![
                cache.join("chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                cache.join("chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                cache.join("chrome"),
            ]
        } else if cfg!(target_os = "windows") {
            vec![cache.join("chrome-win64/chrome.exe"), cache.join("chrome.exe")]
        } else {
            vec![cache.join("chrome-linux64/chrome"), cache.join("chrome")]
        };
        for c in candidates {
            if c.exists() {
                return Some(c);
            }
        }
    }

    // 3. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 4. Platform defaults
    let defaults: &[&str] = if cfg!(target_os = "macos") {
        &["/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &["/usr/bin/google-chrome", "/usr/bin/chromium"]
    };
    defaults.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Chromium-based renderer. Launches one browser per context.
pub struct ChromiumRenderer {
    chrome_path: PathBuf,
    user_agent: String,
    /// Parent of the per-context profile directories.
    profile_root: PathBuf,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumRenderer {
    /// Locate Chromium; fails when no executable can be found.
    pub fn new(explicit: Option<&Path>, user_agent: &str) -> Result<Self> {
        let chrome_path = find_chromium(explicit)
            .context("Chromium not found. Set PWA_CHROMIUM_PATH or install Chrome.")?;
        Ok(Self {
            chrome_path,
            user_agent: user_agent.to_string(),
            profile_root: std::env::temp_dir(),
            active_count: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn with_profile_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profile_root = root.into();
        self
    }

    pub fn chrome_path(&self) -> &Path {
        &self.chrome_path
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let profile_dir = self
            .profile_root
            .join(format!("pwa-inspect-{}", uuid::Uuid::new_v4()));

        let config = BrowserConfig::builder()
            .chrome_executable(&self.chrome_path)
            .user_data_dir(&profile_dir)
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg(format!("--user-agent={}", self.user_agent))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, mut handler) = match Browser::launch(config).await {
            Ok(launched) => launched,
            Err(e) => {
                // No session owns the profile yet.
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                return Err(anyhow::Error::new(e).context("failed to launch Chromium"));
            }
        };

        // Spawn the handler task
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let mut session = ChromiumContext {
            browser: Some(browser),
            page: None,
            handler: Some(handler_task),
            profile_dir,
            active_count: Arc::clone(&self.active_count),
        };
        self.active_count.fetch_add(1, Ordering::Relaxed);

        // On failure `session` drops here and tears the browser down.
        let page = session
            .browser
            .as_ref()
            .context("browser already closed")?
            .new_page("about:blank")
            .await
            .context("failed to create new page")?;
        session.page = Some(page);

        debug!(chrome = %self.chrome_path.display(), "browser session opened");
        Ok(Box::new(session))
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// A single Chromium session: one browser process and one page.
pub struct ChromiumContext {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
    active_count: Arc<AtomicUsize>,
}

impl ChromiumContext {
    fn page(&self) -> Result<&Page> {
        self.page.as_ref().context("browser session already closed")
    }

    /// Take ownership of everything that needs async teardown.
    fn take_parts(&mut self) -> Option<SessionParts> {
        let browser = self.browser.take()?;
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        Some(SessionParts {
            browser,
            page: self.page.take(),
            handler: self.handler.take(),
            profile_dir: self.profile_dir.clone(),
        })
    }
}

struct SessionParts {
    browser: Browser,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    profile_dir: PathBuf,
}

impl SessionParts {
    async fn shutdown(mut self) -> Result<()> {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        let closed = self.browser.close().await;
        let _ = self.browser.wait().await;
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        let _ = tokio::fs::remove_dir_all(&self.profile_dir).await;
        closed.map(|_| ()).context("failed to close browser")
    }
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        if let Some(parts) = self.take_parts() {
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move {
                        if let Err(e) = parts.shutdown().await {
                            tracing::warn!("browser cleanup after drop failed: {e:#}");
                        }
                    });
                }
                // No runtime left: dropping the Browser kills its process.
                Err(_) => drop(parts),
            }
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn navigate(
        &mut self,
        url: &str,
        timeout_ms: u64,
        wait_until: WaitUntil,
    ) -> Result<NavigationResult> {
        let page = self.page()?;

        let result = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
            page.goto(url).await?;
            match wait_until {
                WaitUntil::Load => {
                    page.wait_for_navigation().await?;
                }
            }
            Ok::<_, chromiumoxide::error::CdpError>(())
        })
        .await;

        match result {
            Ok(Ok(())) => {
                let final_url = page
                    .url()
                    .await
                    .unwrap_or_default()
                    .unwrap_or_else(|| url.to_string());

                Ok(NavigationResult { final_url })
            }
            Ok(Err(e)) => bail!("navigation failed: {e}"),
            Err(_) => bail!("navigation timed out after {timeout_ms}ms"),
        }
    }

    async fn execute_js(&self, script: &str) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid evaluate params: {e}"))?;

        let result = self
            .page()?
            .evaluate_expression(params)
            .await
            .context("JS execution failed")?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        match this.take_parts() {
            Some(parts) => parts.shutdown().await,
            None => Ok(()),
        }
    }
}
