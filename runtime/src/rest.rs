// Copyright 2026 pwa-inspect Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP REST API for pwa-inspect.
//!
//! Thin host for the pipeline: validates the site parameter, runs the
//! requested resolution on its own task, and maps outcomes to status codes.

use crate::error::DetectError;
use crate::report::ReportAssembler;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use url::{Host, Url};

/// Shared, immutable request handling state.
pub struct AppState {
    pub assembler: ReportAssembler,
}

#[derive(Debug, Deserialize)]
pub struct SiteQuery {
    pub site: String,
    #[serde(default)]
    pub desktop: bool,
}

/// Build the axum Router with all REST endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/report", get(handle_report))
        .route("/api/v1/manifest", get(handle_manifest))
        .route("/api/v1/service-worker", get(handle_service_worker))
        .layer(cors)
        .with_state(state)
}

/// Start the REST API server on the given port.
pub async fn start(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("REST API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Accept only absolute http(s) URLs that do not point at this host.
pub fn validate_site(site: &str) -> Result<Url, String> {
    let url = Url::parse(site.trim()).map_err(|e| format!("invalid site URL: {e}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme {:?}", url.scheme()));
    }
    let local = match url.host() {
        None => return Err("site URL has no host".to_string()),
        Some(Host::Domain(domain)) => {
            let domain = domain.trim_end_matches('.').to_ascii_lowercase();
            domain == "localhost" || domain.ends_with(".localhost")
        }
        Some(Host::Ipv4(ip)) => is_local(IpAddr::V4(ip)),
        Some(Host::Ipv6(ip)) => is_local(IpAddr::V6(ip)),
    };
    if local {
        return Err("loopback and unspecified hosts are not allowed".to_string());
    }
    Ok(url)
}

fn is_local(ip: IpAddr) -> bool {
    ip.is_loopback() || ip.is_unspecified()
}

// ── Helpers ─────────────────────────────────────────────────────

fn error_response(status: StatusCode, message: impl ToString) -> Response {
    (status, Json(json!({ "error": message.to_string() }))).into_response()
}

/// Run `fut` on its own task so a panic becomes a 500 instead of a dropped connection.
async fn isolated<F>(fut: F) -> Result<Response, Response>
where
    F: Future<Output = Response> + Send + 'static,
{
    tokio::task::spawn(fut).await.map_err(|e| {
        error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("task panicked: {e}"),
        )
    })
}

fn not_found_status(e: &DetectError) -> StatusCode {
    match e {
        DetectError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_GATEWAY,
    }
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn handle_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SiteQuery>,
) -> Response {
    let site = match validate_site(&query.site) {
        Ok(url) => url.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };
    let desktop = query.desktop;

    isolated(async move {
        let outcome = state.assembler.assemble(&site, desktop).await;
        let status = StatusCode::from_u16(outcome.status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(outcome.body())).into_response()
    })
    .await
    .unwrap_or_else(|e| e)
}

async fn handle_manifest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SiteQuery>,
) -> Response {
    let site = match validate_site(&query.site) {
        Ok(url) => url.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    isolated(async move {
        match state.assembler.manifests().resolve(&site).await {
            Ok(resolution) => Json(resolution).into_response(),
            Err(e) => error_response(not_found_status(&e), e),
        }
    })
    .await
    .unwrap_or_else(|e| e)
}

async fn handle_service_worker(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SiteQuery>,
) -> Response {
    let site = match validate_site(&query.site) {
        Ok(url) => url.to_string(),
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    isolated(async move {
        let workers = state.assembler.workers();
        let resolution = match workers.resolve(&site).await {
            Ok(resolution) => resolution,
            Err(e) => return error_response(not_found_status(&e), e),
        };
        match workers.analyze(resolution.clone()).await {
            Ok((expanded, features)) => Json(json!({
                "resolution": expanded,
                "features": features,
            }))
            .into_response(),
            // Located but unreadable: still a result, without features.
            Err(e) => Json(json!({
                "resolution": resolution,
                "features": null,
                "error": e.to_string(),
            }))
            .into_response(),
        }
    })
    .await
    .unwrap_or_else(|e| e)
}
