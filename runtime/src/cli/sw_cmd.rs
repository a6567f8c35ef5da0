//! `pwa-inspect service-worker <url>`: locate a service worker and analyze it.

use crate::cli::output::{self, Styled};
use crate::config::Config;
use anyhow::Result;

pub async fn run(config: &Config, url: &str) -> Result<()> {
    let assembler = super::build_assembler(config);
    let workers = assembler.workers();

    let bar = output::spinner(format!("Resolving service worker for {url}"));
    let resolution = workers.resolve(url).await;
    let resolution = match resolution {
        Ok(r) => r,
        Err(e) => {
            bar.finish_and_clear();
            return Err(e.into());
        }
    };
    bar.set_message(format!("Analyzing {}", resolution.script_url));
    let analyzed = workers.analyze(resolution.clone()).await;
    bar.finish_and_clear();

    if output::is_json() {
        match &analyzed {
            Ok((expanded, features)) => output::print_json(&serde_json::json!({
                "resolution": expanded,
                "features": features,
            })),
            Err(e) => output::print_json(&serde_json::json!({
                "resolution": resolution,
                "features": null,
                "error": e.to_string(),
            })),
        }
        return Ok(());
    }

    let s = Styled::new();
    println!("  Service worker: {}", resolution.script_url);
    println!("  Strategy:       {:?}", resolution.strategy);
    match analyzed {
        Ok((expanded, features)) => {
            let f = &features.flags;
            println!("  Scripts:        {}", expanded.sources.len());
            println!("  Size:           {:.2} KB", f.size_kb);
            println!();
            println!("  {} Background sync", s.yes_no(f.has_background_sync));
            println!("  {} Periodic sync", s.yes_no(f.has_periodic_sync));
            println!("  {} Push registration", s.yes_no(f.has_push_registration));
            println!("  {} Fetch logic", s.yes_no(f.has_fetch_logic));
            if f.is_empty_fetch_handler {
                println!("  {} Fetch handler only passes requests through", s.warn_sym());
            }
        }
        Err(e) => println!("  {} Content unreachable: {e}", s.warn_sym()),
    }
    Ok(())
}
