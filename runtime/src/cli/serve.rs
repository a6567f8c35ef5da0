//! `pwa-inspect serve`: run the REST API in the foreground.

use crate::cli::output::{self, Styled};
use crate::config::Config;
use crate::rest::{self, AppState};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

pub async fn run(config: &Config, port: Option<u16>) -> Result<()> {
    let s = Styled::new();
    let port = port.unwrap_or(config.http_port);

    info!("starting pwa-inspect v{}", env!("CARGO_PKG_VERSION"));
    let state = Arc::new(AppState {
        assembler: super::build_assembler(config),
    });

    if !output::is_quiet() {
        eprintln!(
            "  {} pwa-inspect v{} listening on port {port}",
            s.ok_sym(),
            env!("CARGO_PKG_VERSION"),
        );
    }

    tokio::select! {
        result = rest::start(port, state) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            if !output::is_quiet() {
                eprintln!("  {} pwa-inspect stopped.", s.ok_sym());
            }
            Ok(())
        }
    }
}
