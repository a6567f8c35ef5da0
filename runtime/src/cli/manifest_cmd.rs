//! `pwa-inspect manifest <url>`: locate and parse a site's manifest.

use crate::cli::output;
use crate::config::Config;
use anyhow::Result;

pub async fn run(config: &Config, url: &str) -> Result<()> {
    let assembler = super::build_assembler(config);

    let bar = output::spinner(format!("Resolving manifest for {url}"));
    let result = assembler.manifests().resolve(url).await;
    bar.finish_and_clear();

    let resolution = result?;
    if output::is_json() {
        output::print_json(&resolution);
        return Ok(());
    }

    println!("  Manifest: {}", resolution.url);
    println!("  Strategy: {}", resolution.strategy.as_str());
    if let Some(e) = &resolution.error {
        println!("  Notes:    {e}");
    }
    if !output::is_quiet() {
        if let Some(json) = &resolution.parsed_json {
            println!();
            println!("{}", serde_json::to_string_pretty(json)?);
        }
    }
    Ok(())
}
