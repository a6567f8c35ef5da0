//! Shared fixtures: a counting renderer and a scripted audit runner.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use pwa_inspect_runtime::acquisition::http_client::HttpClient;
use pwa_inspect_runtime::acquisition::manifest_resolver::ManifestResolver;
use pwa_inspect_runtime::acquisition::sw_resolver::ServiceWorkerResolver;
use pwa_inspect_runtime::audit::{AuditRequest, AuditRun, AuditRunner, AuditState};
use pwa_inspect_runtime::config::Config;
use pwa_inspect_runtime::renderer::{NavigationResult, RenderContext, Renderer, WaitUntil};
use pwa_inspect_runtime::report::ReportAssembler;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Which session step the renderer double should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fault {
    #[default]
    None,
    Navigate,
    Script,
    /// Network idle wait runs out its timeout.
    IdleTimeout,
    IdleError,
}

/// Renderer double that counts sessions and answers every script with a fixed value.
pub struct CountingRenderer {
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    scripts_run: Arc<AtomicUsize>,
    script_result: Value,
    fault: Fault,
}

impl CountingRenderer {
    pub fn new(script_result: Value) -> Arc<Self> {
        Self::with_fault(script_result, Fault::None)
    }

    pub fn with_fault(script_result: Value, fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
            scripts_run: Arc::new(AtomicUsize::new(0)),
            script_result,
            fault,
        })
    }

    /// Number of in-page scripts evaluated across all sessions.
    pub fn scripts_run(&self) -> usize {
        self.scripts_run.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for CountingRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingContext {
            closed: Arc::clone(&self.closed),
            scripts_run: Arc::clone(&self.scripts_run),
            script_result: self.script_result.clone(),
            fault: self.fault,
            url: String::new(),
        }))
    }

    fn active_contexts(&self) -> usize {
        self.opened() - self.closed()
    }
}

struct CountingContext {
    closed: Arc<AtomicUsize>,
    scripts_run: Arc<AtomicUsize>,
    script_result: Value,
    fault: Fault,
    url: String,
}

#[async_trait]
impl RenderContext for CountingContext {
    async fn navigate(
        &mut self,
        url: &str,
        _timeout_ms: u64,
        _wait_until: WaitUntil,
    ) -> Result<NavigationResult> {
        if self.fault == Fault::Navigate {
            bail!("navigation to {url} failed: net::ERR_CONNECTION_RESET");
        }
        self.url = url.to_string();
        Ok(NavigationResult {
            final_url: url.to_string(),
        })
    }

    async fn execute_js(&self, _script: &str) -> Result<Value> {
        self.scripts_run.fetch_add(1, Ordering::SeqCst);
        if self.fault == Fault::Script {
            bail!("Runtime.evaluate failed: execution context was destroyed");
        }
        Ok(self.script_result.clone())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_for_network_idle(&self, _idle_ms: u64, _timeout_ms: u64) -> Result<bool> {
        match self.fault {
            Fault::IdleTimeout => Ok(false),
            Fault::IdleError => bail!("network idle probe failed"),
            _ => Ok(true),
        }
    }
}

/// Audit runner double returning canned output.
pub struct ScriptedAuditor {
    pub output: Option<Value>,
    pub state: AuditState,
}

impl ScriptedAuditor {
    pub fn parsed(output: Value) -> Arc<Self> {
        Arc::new(Self {
            output: Some(output),
            state: AuditState::Parsed,
        })
    }

    pub fn killed() -> Arc<Self> {
        Arc::new(Self {
            output: None,
            state: AuditState::Killed,
        })
    }
}

#[async_trait]
impl AuditRunner for ScriptedAuditor {
    async fn run(&self, request: &AuditRequest) -> AuditRun {
        let mut run = AuditRun::new(vec!["lighthouse".into(), request.url.clone()], 1_000);
        run.stdout_json = self.output.clone();
        run.killed = self.state == AuditState::Killed;
        run.state = self.state;
        run
    }
}

pub fn client() -> HttpClient {
    HttpClient::new(&Config::default().user_agent, 10_000)
}

pub fn manifest_resolver(renderer: Arc<dyn Renderer>) -> ManifestResolver {
    ManifestResolver::new(client(), renderer, &Config::default())
}

pub fn worker_resolver(renderer: Arc<dyn Renderer>) -> ServiceWorkerResolver {
    ServiceWorkerResolver::new(client(), renderer)
}

pub fn assembler(auditor: Arc<dyn AuditRunner>, renderer: Arc<dyn Renderer>) -> ReportAssembler {
    ReportAssembler::new(
        auditor,
        manifest_resolver(Arc::clone(&renderer)),
        worker_resolver(renderer),
    )
}

pub fn html(body: &str) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(body.to_string())
}

pub fn javascript(body: &str) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(200)
        .insert_header("content-type", "application/javascript")
        .set_body_string(body.to_string())
}
