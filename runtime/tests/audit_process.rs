//! Supervision of real child processes standing in for the audit tool.

#![cfg(unix)]

use pwa_inspect_runtime::audit::lighthouse::LighthouseRunner;
use pwa_inspect_runtime::audit::profile::RuntimeProfile;
use pwa_inspect_runtime::audit::{AuditRequest, AuditRunner, AuditState};
use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

fn request() -> AuditRequest {
    AuditRequest {
        url: "https://example.com/".into(),
        desktop: false,
    }
}

/// `/bin/sh -c <script> sh <argv...>`: the script sees the audit argv as `$@`.
fn shell_runner(script: &str, budget: Duration) -> LighthouseRunner {
    LighthouseRunner::new("/bin/sh", budget, RuntimeProfile::default())
        .with_prefix_args(["-c", script, "sh"])
}

/// Live and not a zombie.
#[cfg(target_os = "linux")]
fn is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

#[tokio::test]
async fn json_stdout_is_parsed() {
    let runner = shell_runner(
        r#"printf '{"audits":{"viewport":{"score":1}},"requestedUrl":"%s"}' "$1""#,
        Duration::from_secs(10),
    );
    let run = runner.run(&request()).await;

    assert_eq!(run.state, AuditState::Parsed);
    assert_eq!(run.exit_code, Some(0));
    assert!(!run.killed);
    let result = run.result();
    assert_eq!(result["audits"]["viewport"]["score"], 1);
    assert_eq!(result["requestedUrl"], "https://example.com/");
}

#[tokio::test]
async fn garbage_stdout_yields_empty_result() {
    let runner = shell_runner(
        "echo 'Runtime error encountered: Chrome prevented page load'; exit 1",
        Duration::from_secs(10),
    );
    let run = runner.run(&request()).await;

    assert_eq!(run.state, AuditState::Unparseable);
    assert_eq!(run.exit_code, Some(1));
    assert_eq!(run.result(), serde_json::json!({}));
    assert_eq!(run.error().unwrap().code(), "PROCESS_FAILURE");
}

#[tokio::test]
async fn profile_environment_reaches_the_child() {
    let temp = tempfile::tempdir().unwrap();
    let profile = RuntimeProfile {
        temp_dir: temp.path().to_path_buf(),
        chrome_path: Some(PathBuf::from("/opt/chrome/chrome")),
        extra_env: Vec::new(),
    };
    let runner = LighthouseRunner::new("/bin/sh", Duration::from_secs(10), profile).with_prefix_args([
        "-c",
        r#"printf '{"tmp":"%s","chrome":"%s"}' "$TMPDIR" "$CHROME_PATH""#,
        "sh",
    ]);
    let run = runner.run(&request()).await;

    let result = run.result();
    assert_eq!(result["tmp"], temp.path().to_string_lossy().to_string());
    assert_eq!(result["chrome"], "/opt/chrome/chrome");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn hanging_audit_is_killed_with_its_children() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("grandchild.pid");

    // Spawns a grandchild (standing in for the browser), records its pid, then hangs.
    let mut script = tempfile::NamedTempFile::new_in(dir.path()).unwrap();
    writeln!(
        script,
        "sleep 300 &\necho $! > '{}'\necho '{{\"partial\":' \nwait",
        pid_file.display()
    )
    .unwrap();
    let script_path = script.path().to_string_lossy().to_string();

    let budget = Duration::from_millis(1_500);
    let runner = LighthouseRunner::new("/bin/sh", budget, RuntimeProfile::default())
        .with_prefix_args([script_path]);

    let started = Instant::now();
    let run = runner.run(&request()).await;
    let elapsed = started.elapsed();

    assert!(run.killed);
    assert_eq!(run.state, AuditState::Killed);
    assert_eq!(run.result(), serde_json::json!({}));
    assert_eq!(run.error().unwrap().code(), "PROCESS_TIMEOUT");
    assert!(elapsed >= budget);
    assert!(elapsed < budget + Duration::from_secs(8), "took {elapsed:?}");

    let leader = run.pid.expect("pid recorded");
    let grandchild: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    // Give the kernel a moment to tear down the group.
    let deadline = Instant::now() + Duration::from_secs(2);
    while (is_running(leader) || is_running(grandchild)) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!is_running(leader), "audit process {leader} survived its budget");
    assert!(!is_running(grandchild), "child process {grandchild} survived its budget");
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn exited_audit_does_not_orphan_its_children() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("browser.pid");

    // Leaves a background child behind (a crashed tool's browser), then exits.
    let script = format!(
        "sleep 300 >/dev/null 2>&1 &\necho $! > '{}'\nprintf '{{\"audits\":{{}}}}'",
        pid_file.display()
    );
    let runner = shell_runner(&script, Duration::from_secs(10));
    let run = runner.run(&request()).await;

    assert!(!run.killed);
    assert_eq!(run.exit_code, Some(0));
    assert_eq!(run.state, AuditState::Parsed);

    let orphan: u32 = std::fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let deadline = Instant::now() + Duration::from_secs(2);
    while is_running(orphan) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!is_running(orphan), "child process {orphan} outlived the audit");
}
