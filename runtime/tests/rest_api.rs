//! REST surface over a real listener.

mod common;

use common::{CountingRenderer, ScriptedAuditor};
use pwa_inspect_runtime::rest::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;

async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn state() -> AppState {
    AppState {
        assembler: common::assembler(
            ScriptedAuditor::parsed(json!({ "audits": { "viewport": { "score": 1 } } })),
            CountingRenderer::new(Value::Null),
        ),
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let base = serve(state()).await;
    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn loopback_and_malformed_sites_are_rejected() {
    let base = serve(state()).await;
    for site in ["http://localhost/", "http://127.0.0.1:8080/", "not a url", "file:///etc/passwd"] {
        let resp = reqwest::Client::new()
            .get(format!("{base}/api/v1/report"))
            .query(&[("site", site)])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 400, "site {site:?}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn missing_site_parameter_is_a_client_error() {
    let base = serve(state()).await;
    let resp = reqwest::get(format!("{base}/api/v1/manifest")).await.unwrap();
    assert!(resp.status().is_client_error());
}
