//! Environment readiness check.

use crate::cli::output::{self, Styled};
use crate::config::Config;
use crate::renderer::chromium::find_chromium;
use anyhow::Result;
use std::path::Path;
use std::process::Command;

/// Check browser and audit tool availability and the temp directory.
pub async fn run(config: &Config) -> Result<()> {
    let chromium = find_chromium(config.chromium_path.as_deref());
    let lighthouse = config
        .lighthouse_path
        .clone()
        .filter(|p| p.exists())
        .or_else(|| which::which("lighthouse").ok());
    let lighthouse_version = lighthouse.as_ref().and_then(|p| tool_version(p));
    let temp_dir = config.temp_dir.clone().unwrap_or_else(std::env::temp_dir);
    let temp_writable = is_writable(&temp_dir);

    if output::is_json() {
        output::print_json(&serde_json::json!({
            "os": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "chromium": chromium,
            "lighthouse": lighthouse,
            "lighthouseVersion": lighthouse_version,
            "tempDir": temp_dir,
            "tempDirWritable": temp_writable,
            "auditBudgetMs": config.audit_budget().as_millis() as u64,
            "ready": chromium.is_some() && lighthouse.is_some(),
        }));
        return Ok(());
    }

    let s = Styled::new();
    println!("pwa-inspect Doctor");
    println!("==================");
    println!();
    println!("OS:   {}", std::env::consts::OS);
    println!("Arch: {}", std::env::consts::ARCH);
    println!();

    match &chromium {
        Some(path) => println!("{} Chromium found: {}", s.ok_sym(), path.display()),
        None => println!(
            "{} Chromium NOT found. Set PWA_CHROMIUM_PATH or install Chrome; browser fallbacks are disabled.",
            s.warn_sym()
        ),
    }
    match (&lighthouse, &lighthouse_version) {
        (Some(path), Some(v)) => println!("{} Lighthouse {v}: {}", s.ok_sym(), path.display()),
        (Some(path), None) => println!("{} Lighthouse found: {}", s.ok_sym(), path.display()),
        (None, _) => println!(
            "{} Lighthouse NOT found. Run `npm install -g lighthouse` or set PWA_LIGHTHOUSE_PATH.",
            s.warn_sym()
        ),
    }
    if temp_writable {
        println!("{} Temp directory {} is writable", s.ok_sym(), temp_dir.display());
    } else {
        println!("{} Temp directory {} is not writable", s.err_sym(), temp_dir.display());
    }
    println!(
        "   Audit budget: {}ms (request timeout {}ms minus {}ms margin)",
        config.audit_budget().as_millis(),
        config.request_timeout_ms,
        config.audit_margin_ms
    );

    println!();
    if chromium.is_some() && lighthouse.is_some() && temp_writable {
        println!("Status: READY");
    } else {
        println!("Status: DEGRADED");
        println!("  Reports will contain only what can be resolved without the missing tools.");
    }
    Ok(())
}

fn tool_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let v = String::from_utf8_lossy(&output.stdout).trim().to_string();
    (!v.is_empty()).then_some(v)
}

fn is_writable(dir: &Path) -> bool {
    let probe = dir.join(format!("pwa-inspect-doctor-{}", uuid::Uuid::new_v4()));
    let ok = std::fs::write(&probe, b"ok").is_ok();
    let _ = std::fs::remove_file(&probe);
    ok
}
