//! Runtime configuration resolved from `PWA_*` environment variables.
//!
//! CLI flags override individual fields after [`Config::from_env`].

use std::path::PathBuf;
use std::time::Duration;

/// Desktop Chrome user agent used for every fetch unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0";

/// Appended to the baseline agent for the second manifest fetch.
pub const DEFAULT_USER_AGENT_SUFFIX: &str = " PWAInspectAgent";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;
pub const DEFAULT_AUDIT_MARGIN_MS: u64 = 10_000;
pub const DEFAULT_HTTP_PORT: u16 = 3000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Wall-clock limit the host imposes on one request.
    pub request_timeout_ms: u64,
    /// Subtracted from the request timeout to get the audit budget.
    pub audit_margin_ms: u64,
    pub user_agent: String,
    pub user_agent_suffix: String,
    /// Explicit browser executable; discovery runs when unset.
    pub chromium_path: Option<PathBuf>,
    /// Explicit audit tool executable; `lighthouse` on PATH when unset.
    pub lighthouse_path: Option<PathBuf>,
    /// Temp directory handed to the audit tool's browser launcher.
    pub temp_dir: Option<PathBuf>,
    pub http_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            audit_margin_ms: DEFAULT_AUDIT_MARGIN_MS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            user_agent_suffix: DEFAULT_USER_AGENT_SUFFIX.to_string(),
            chromium_path: None,
            lighthouse_path: None,
            temp_dir: None,
            http_port: DEFAULT_HTTP_PORT,
        }
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            request_timeout_ms: get("PWA_REQUEST_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_ms),
            audit_margin_ms: get("PWA_AUDIT_MARGIN_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.audit_margin_ms),
            user_agent: get("PWA_USER_AGENT").unwrap_or(defaults.user_agent),
            // The suffix is appended verbatim, so keep its leading space.
            user_agent_suffix: lookup("PWA_USER_AGENT_SUFFIX")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.user_agent_suffix),
            chromium_path: get("PWA_CHROMIUM_PATH").map(PathBuf::from),
            lighthouse_path: get("PWA_LIGHTHOUSE_PATH").map(PathBuf::from),
            temp_dir: get("PWA_TEMP_DIR").map(PathBuf::from),
            http_port: get("PWA_HTTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_port),
        }
    }

    /// Budget for one audit run: request timeout minus the margin, at least one second.
    pub fn audit_budget(&self) -> Duration {
        let ms = self
            .request_timeout_ms
            .saturating_sub(self.audit_margin_ms)
            .max(1_000);
        Duration::from_millis(ms)
    }

    /// The second manifest fetch's user agent.
    pub fn suffixed_user_agent(&self) -> String {
        format!("{}{}", self.user_agent, self.user_agent_suffix)
    }
}
