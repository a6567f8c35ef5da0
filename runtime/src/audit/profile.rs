//! Environment handed to the audit tool.
//!
//! The tool launches its own browser, so it needs to find one and have a
//! writable temp directory for the browser profile. Both are resolved once
//! at startup and injected into every spawned command.

use crate::config::Config;
use crate::renderer::chromium::find_chromium;
use std::path::PathBuf;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct RuntimeProfile {
    pub temp_dir: PathBuf,
    pub chrome_path: Option<PathBuf>,
    pub extra_env: Vec<(String, String)>,
}

impl RuntimeProfile {
    /// Resolve the profile for this host.
    pub fn detect(config: &Config) -> Self {
        let temp_dir = config
            .temp_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        let chrome_path = find_chromium(config.chromium_path.as_deref());
        if chrome_path.is_none() {
            tracing::warn!("no Chromium found; the audit tool will use its own discovery");
        }
        Self {
            temp_dir,
            chrome_path,
            extra_env: Vec::new(),
        }
    }

    /// Environment variables set on every audit command.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        let temp = self.temp_dir.to_string_lossy().to_string();
        let mut pairs = vec![
            ("TMPDIR".to_string(), temp.clone()),
            ("TMP".to_string(), temp.clone()),
            ("TEMP".to_string(), temp),
        ];
        if let Some(chrome) = &self.chrome_path {
            pairs.push(("CHROME_PATH".to_string(), chrome.to_string_lossy().to_string()));
        }
        pairs.extend(self.extra_env.iter().cloned());
        pairs
    }

    pub fn apply(&self, command: &mut Command) {
        command.envs(self.env_pairs());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_pairs() {
        let profile = RuntimeProfile {
            temp_dir: PathBuf::from("/var/tmp/pwa"),
            chrome_path: Some(PathBuf::from("/usr/bin/chromium")),
            extra_env: vec![("NODE_OPTIONS".into(), "--max-old-space-size=512".into())],
        };
        let pairs = profile.env_pairs();
        assert!(pairs.contains(&("TMPDIR".into(), "/var/tmp/pwa".into())));
        assert!(pairs.contains(&("TEMP".into(), "/var/tmp/pwa".into())));
        assert!(pairs.contains(&("CHROME_PATH".into(), "/usr/bin/chromium".into())));
        assert_eq!(pairs.last().unwrap().0, "NODE_OPTIONS");
    }

    #[test]
    fn test_no_chrome_path() {
        let profile = RuntimeProfile {
            temp_dir: PathBuf::from("/tmp"),
            ..Default::default()
        };
        assert!(!profile.env_pairs().iter().any(|(k, _)| k == "CHROME_PATH"));
    }
}
