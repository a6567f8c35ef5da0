//! Supervised runs of the external audit tool.
//!
//! An [`AuditRunner`] never fails: a run that is killed, crashes, or prints
//! garbage produces an [`AuditRun`] whose result is the empty object, so the
//! rest of the pipeline proceeds on partial data.

pub mod lighthouse;
pub mod process;
pub mod profile;

use crate::error::DetectError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// What to audit.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    pub url: String,
    pub desktop: bool,
}

/// Lifecycle of one audit process.
///
/// `Spawned → Running → {Parsed | Unparseable | Killed}`; `SpawnFailed`
/// when the process never started. Every terminal state is non-throwing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditState {
    Spawned,
    Running,
    /// Exited and stdout parsed as a JSON object.
    Parsed,
    /// Exited but stdout was empty or not a JSON object.
    Unparseable,
    /// Killed at the budget.
    Killed,
    SpawnFailed,
}

impl AuditState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Spawned | Self::Running)
    }
}

/// Record of a single audit invocation. Never retried.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRun {
    pub argv: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub budget_ms: u64,
    pub pid: Option<u32>,
    pub exit_code: Option<i32>,
    pub stdout_json: Option<Value>,
    pub killed: bool,
    pub state: AuditState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl AuditRun {
    pub fn new(argv: Vec<String>, budget_ms: u64) -> Self {
        Self {
            argv,
            started_at: Utc::now(),
            budget_ms,
            pid: None,
            exit_code: None,
            stdout_json: None,
            killed: false,
            state: AuditState::Spawned,
            failure: None,
        }
    }

    /// Raw tool output, or the empty object when there is none.
    pub fn result(&self) -> Value {
        self.stdout_json
            .clone()
            .unwrap_or_else(|| Value::Object(Default::default()))
    }

    /// The error this run would have raised, for logging.
    pub fn error(&self) -> Option<DetectError> {
        match self.state {
            AuditState::Killed => Some(DetectError::ProcessTimeout {
                budget_ms: self.budget_ms,
            }),
            AuditState::Unparseable | AuditState::SpawnFailed => Some(DetectError::ProcessFailure(
                self.failure
                    .clone()
                    .unwrap_or_else(|| format!("exit code {:?}", self.exit_code)),
            )),
            _ => None,
        }
    }
}

/// Runs the audit tool against a URL.
#[async_trait]
pub trait AuditRunner: Send + Sync {
    async fn run(&self, request: &AuditRequest) -> AuditRun;
}

/// Runner used when no audit tool is installed: every run is a spawn failure.
pub struct UnavailableAuditRunner {
    pub reason: String,
}

#[async_trait]
impl AuditRunner for UnavailableAuditRunner {
    async fn run(&self, request: &AuditRequest) -> AuditRun {
        let mut run = AuditRun::new(vec![request.url.clone()], 0);
        run.state = AuditState::SpawnFailed;
        run.failure = Some(self.reason.clone());
        run
    }
}
