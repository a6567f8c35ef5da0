// Copyright 2026 pwa-inspect Contributors
// SPDX-License-Identifier: Apache-2.0

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pwa_inspect_runtime::cli;
use pwa_inspect_runtime::config::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "pwa-inspect",
    about = "pwa-inspect: Progressive Web App detection and audit",
    version,
    after_help = "Run 'pwa-inspect <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Browser executable (overrides PWA_CHROMIUM_PATH)
    #[arg(long, global = true)]
    chromium: Option<PathBuf>,

    /// Audit tool executable (overrides PWA_LIGHTHOUSE_PATH)
    #[arg(long, global = true)]
    lighthouse: Option<PathBuf>,

    /// Host request timeout in milliseconds (overrides PWA_REQUEST_TIMEOUT_MS)
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the REST API
    Serve {
        /// Port to listen on (default PWA_HTTP_PORT or 3000)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Audit a site and print the full PWA report
    Report {
        /// Site URL (e.g. "https://example.com")
        url: String,
        /// Audit with the desktop form factor
        #[arg(long)]
        desktop: bool,
    },
    /// Locate and parse a site's web app manifest
    Manifest {
        /// Site URL
        url: String,
    },
    /// Locate a site's service worker and analyze its features
    ServiceWorker {
        /// Site URL
        url: String,
    },
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(json: bool, verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("pwa_inspect={level}")));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("PWA_INSPECT_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("PWA_INSPECT_QUIET", "1");
    }
    init_tracing(cli.json, cli.verbose);

    let mut config = Config::from_env();
    if let Some(path) = cli.chromium {
        config.chromium_path = Some(path);
    }
    if let Some(path) = cli.lighthouse {
        config.lighthouse_path = Some(path);
    }
    if let Some(ms) = cli.timeout {
        config.request_timeout_ms = ms;
    }

    let result = match cli.command {
        Commands::Serve { port } => cli::serve::run(&config, port).await,
        Commands::Report { url, desktop } => cli::report_cmd::run(&config, &url, desktop).await,
        Commands::Manifest { url } => cli::manifest_cmd::run(&config, &url).await,
        Commands::ServiceWorker { url } => cli::sw_cmd::run(&config, &url).await,
        Commands::Doctor => cli::doctor::run(&config).await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "pwa-inspect", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success, 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
