//! Lighthouse as an [`AuditRunner`].
//!
//! One isolated child per request, spawned as its own process group so the
//! browser it launches dies with it. A timer armed at spawn kills the tree
//! when the budget elapses; stdout is buffered as it arrives and parsed once
//! the child has exited.

use crate::audit::process::{kill_process_tree, process_group_alive};
use crate::audit::profile::RuntimeProfile;
use crate::audit::{AuditRequest, AuditRun, AuditRunner, AuditState};
use crate::config::Config;
use anyhow::{Context, Result};
use async_trait::async_trait;
use pwa_inspect::audit_output::AUDIT_IDS;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Browser flags for the tool's own Chrome.
const CHROME_FLAGS: &str = "--headless=new --no-sandbox --disable-gpu --disable-dev-shm-usage";

/// How long the stdout reader may lag behind process exit.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the kernel to reap a killed child.
const REAP_TIMEOUT: Duration = Duration::from_secs(5);

/// Throttling disabled: runs measure a controlled environment, not real latency.
const THROTTLING_ARGS: &[&str] = &[
    "--throttling-method=provided",
    "--throttling.rttMs=0",
    "--throttling.throughputKbps=0",
    "--throttling.requestLatencyMs=0",
    "--throttling.downloadThroughputKbps=0",
    "--throttling.uploadThroughputKbps=0",
    "--throttling.cpuSlowdownMultiplier=1",
];

pub struct LighthouseRunner {
    program: PathBuf,
    /// Inserted between the program and the target URL (e.g. a script path).
    prefix_args: Vec<String>,
    budget: Duration,
    profile: RuntimeProfile,
}

impl LighthouseRunner {
    pub fn new(program: impl Into<PathBuf>, budget: Duration, profile: RuntimeProfile) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
            budget,
            profile,
        }
    }

    /// Locate the tool from config or PATH.
    pub fn from_config(config: &Config, profile: RuntimeProfile) -> Result<Self> {
        let program = match &config.lighthouse_path {
            Some(path) => path.clone(),
            None => which::which("lighthouse")
                .context("lighthouse not found on PATH (set PWA_LIGHTHOUSE_PATH)")?,
        };
        Ok(Self::new(program, config.audit_budget(), profile))
    }

    pub fn with_prefix_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    /// Full command line, program first.
    pub fn argv(&self, request: &AuditRequest) -> Vec<String> {
        let mut argv = vec![self.program.to_string_lossy().to_string()];
        argv.extend(self.prefix_args.iter().cloned());
        argv.push(request.url.clone());
        argv.push(format!("--only-audits={}", AUDIT_IDS.join(",")));
        argv.push("--output=json".to_string());
        argv.push("--output-path=stdout".to_string());
        argv.push("--quiet".to_string());
        argv.push(format!("--chrome-flags={CHROME_FLAGS}"));
        argv.extend(THROTTLING_ARGS.iter().map(|a| a.to_string()));
        if request.desktop {
            argv.push("--preset=desktop".to_string());
        }
        argv
    }

    fn command(&self, argv: &[String]) -> Command {
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.profile.apply(&mut cmd);

        #[cfg(unix)]
        cmd.process_group(0);
        #[cfg(windows)]
        {
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
            cmd.creation_flags(CREATE_NEW_PROCESS_GROUP);
        }
        cmd
    }
}

#[async_trait]
impl AuditRunner for LighthouseRunner {
    async fn run(&self, request: &AuditRequest) -> AuditRun {
        let argv = self.argv(request);
        let mut run = AuditRun::new(argv.clone(), self.budget.as_millis() as u64);

        let mut child = match self.command(&argv).spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %argv[0], "audit spawn failed: {e}");
                run.state = AuditState::SpawnFailed;
                run.failure = Some(e.to_string());
                return run;
            }
        };
        run.pid = child.id();
        run.state = AuditState::Running;
        info!(url = %request.url, pid = ?run.pid, budget_ms = run.budget_ms, "audit started");

        let buffer = Arc::new(Mutex::new(Vec::new()));
        let mut reader = child
            .stdout
            .take()
            .map(|stdout| spawn_buffering(stdout, Arc::clone(&buffer)));
        if let Some(stderr) = child.stderr.take() {
            spawn_stderr_logger(stderr);
        }

        match tokio::time::timeout(self.budget, child.wait()).await {
            Ok(Ok(status)) => {
                run.exit_code = status.code();
                debug!(exit_code = ?run.exit_code, "audit exited");
            }
            Ok(Err(e)) => {
                warn!("audit wait failed: {e}");
                run.failure = Some(e.to_string());
            }
            Err(_) => {
                warn!(pid = ?run.pid, budget_ms = run.budget_ms, "audit over budget, killing process tree");
                run.killed = true;
            }
        }

        // Sweep the group either way: a crashed tool can orphan its browser.
        // After a normal exit the leader is already reaped, so only signal a
        // group that still has members.
        if let Some(pid) = run.pid {
            let sweep = run.killed || process_group_alive(pid);
            if sweep {
                if run.exit_code.is_some() {
                    debug!(pid, "audit exited with live group members, sweeping");
                }
                if let Err(e) = kill_process_tree(pid).await {
                    warn!(pid, "process tree kill failed: {e}");
                }
            }
        }
        if run.killed {
            let _ = child.start_kill();
            if tokio::time::timeout(REAP_TIMEOUT, child.wait()).await.is_err() {
                warn!(pid = ?run.pid, "killed audit process was not reaped in time");
            }
        }

        if let Some(handle) = reader.as_mut() {
            if tokio::time::timeout(DRAIN_TIMEOUT, &mut *handle).await.is_err() {
                handle.abort();
            }
        }

        if run.killed {
            run.state = AuditState::Killed;
            return run;
        }

        let bytes = match buffer.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match parse_stdout(&bytes) {
            Some(json) => {
                run.stdout_json = Some(json);
                run.state = AuditState::Parsed;
            }
            None => {
                run.state = AuditState::Unparseable;
                let exit_code = run.exit_code;
                run.failure.get_or_insert_with(|| {
                    format!(
                        "exit code {exit_code:?}, {} bytes of unparseable stdout",
                        bytes.len()
                    )
                });
                if let Some(e) = run.error() {
                    warn!(code = e.code(), "{e}");
                }
            }
        }
        run
    }
}

/// Parse the buffered stdout. Anything but a JSON object counts as unparseable.
pub fn parse_stdout(bytes: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

fn spawn_buffering<R>(mut stream: R, buffer: Arc<Mutex<Vec<u8>>>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) => break,
                Ok(n) => match buffer.lock() {
                    Ok(mut buf) => buf.extend_from_slice(&chunk[..n]),
                    Err(poisoned) => poisoned.into_inner().extend_from_slice(&chunk[..n]),
                },
                Err(e) => {
                    debug!("audit stdout read failed: {e}");
                    break;
                }
            }
        }
    })
}

/// Drain stderr so the child never blocks on a full pipe.
fn spawn_stderr_logger<R>(stream: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "pwa_inspect_runtime::audit::stderr", "{line}");
        }
    });
}
