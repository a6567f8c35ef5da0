//! `pwa-inspect report <url>`: audit a site and print the full report.

use crate::cli::output::{self, Styled};
use crate::config::Config;
use anyhow::{bail, Result};
use pwa_inspect::Report;

pub async fn run(config: &Config, url: &str, desktop: bool) -> Result<()> {
    let assembler = super::build_assembler(config);

    let bar = output::spinner(format!("Auditing {url}"));
    let outcome = assembler.assemble(url, desktop).await;
    bar.finish_and_clear();

    if outcome.status() == 200 && output::is_json() {
        output::print_json(&outcome.body());
    } else if outcome.status() == 200 {
        print_summary(url, &outcome.report);
        if !output::is_quiet() {
            if let Some(e) = outcome.audit.error() {
                eprintln!("  Warning: {e}");
            }
        }
    }

    if outcome.status() != 200 {
        let body = outcome.body();
        let message = body["error"].as_str().unwrap_or("report failed").to_string();
        bail!(message);
    }
    Ok(())
}

fn print_summary(url: &str, report: &Report) {
    let s = Styled::new();
    let a = &report.audits;

    println!("  PWA report for {url}");
    println!();
    println!("  {} HTTPS", s.yes_no(a.is_on_https.score));
    println!("  {} Installable manifest", s.yes_no(a.installable_manifest.score));
    if let Some(details) = &a.installable_manifest.details {
        println!("      {}", details.url);
        for failure in &details.failures {
            println!("      - {failure}");
        }
    }
    println!("  {} Service worker", s.yes_no(a.service_worker.score));
    if let Some(details) = &a.service_worker.details {
        println!("      {}", details.url);
        if let Some(f) = &details.features {
            println!(
                "      background sync: {}  periodic sync: {}  push: {}  fetch logic: {}  ({:.2} KB)",
                f.has_background_sync, f.has_periodic_sync, f.has_push_registration, f.has_fetch_logic, f.size_kb
            );
        }
    }
    println!("  {} Maskable icon", s.yes_no(a.maskable_icon.score));
    println!("  {} Splash screen", s.yes_no(a.splash_screen.score));
    println!("  {} Themed omnibox", s.yes_no(a.themed_omnibox.score));
    println!("  {} Viewport", s.yes_no(a.viewport.score));

    if let Some(m) = &report.artifacts.web_app_manifest {
        println!();
        match &m.error {
            Some(e) => println!("  Manifest {} could not be read: {e}", m.url),
            None => println!("  Manifest fetched from {}", m.url),
        }
    }
    if let Some(w) = &report.artifacts.service_worker {
        match &w.error {
            Some(e) => println!("  Service worker {} could not be read: {e}", w.url),
            None => println!("  Service worker fetched from {}", w.url),
        }
    }
}
