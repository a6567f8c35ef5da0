//! Manifest discovery against local HTTP fixtures.

mod common;

use common::{html, CountingRenderer, Fault};
use pwa_inspect::ManifestStrategy;
use pwa_inspect_runtime::renderer::Renderer;
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MANIFEST: &str = r#"{"name": "Example", "short_name": "Ex", "start_url": "/", "display": "standalone"}"#;

async fn mount_page(server: &MockServer, head: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html(&format!(
            "<!doctype html><html><head>{head}</head><body><h1>hi</h1></body></html>"
        )))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fast_path_opens_no_browser() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<link rel="manifest" href="/manifest.json">"#).await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/manifest+json")
                .set_body_string(MANIFEST),
        )
        .mount(&server)
        .await;

    let renderer = CountingRenderer::new(Value::Null);
    let resolver = common::manifest_resolver(renderer.clone());

    let res = resolver.resolve(&server.uri()).await.unwrap();
    assert!(res.url.ends_with("/manifest.json"));
    assert_eq!(res.strategy, ManifestStrategy::FastFetch);
    assert_eq!(res.parsed_json.unwrap()["short_name"], "Ex");
    assert_eq!(renderer.opened(), 0);
}

#[tokio::test]
async fn manifest_with_comments_and_relative_href() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/app/"))
        .respond_with(html(
            r#"<html><HEAD><link rel="icon manifest" href="site.webmanifest"></HEAD><body></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/app/site.webmanifest"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "// generated\n{\n  /* app */ \"name\": \"App\", \"start_url\": \"/app/\"\n}",
        ))
        .mount(&server)
        .await;

    let renderer = CountingRenderer::new(Value::Null);
    let resolver = common::manifest_resolver(renderer.clone());

    let res = resolver
        .resolve(&format!("{}/app/", server.uri()))
        .await
        .unwrap();
    assert!(res.url.ends_with("/app/site.webmanifest"));
    assert_eq!(res.parsed_json.unwrap(), json!({"name": "App", "start_url": "/app/"}));
    assert_eq!(renderer.opened(), 0);
}

#[tokio::test]
async fn suffixed_agent_rescues_blocked_manifest() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<link rel="manifest" href="/manifest.json">"#).await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .and(header_regex("user-agent", "PWAInspectAgent$"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(ResponseTemplate::new(403).set_body_string("<html>blocked</html>"))
        .mount(&server)
        .await;

    let renderer = CountingRenderer::new(Value::Null);
    let resolver = common::manifest_resolver(renderer.clone());

    let res = resolver.resolve(&server.uri()).await.unwrap();
    assert_eq!(res.strategy, ManifestStrategy::DualAgentFetch);
    assert!(res.error.is_some());
    assert_eq!(res.parsed_json.unwrap()["name"], "Example");
    assert_eq!(renderer.opened(), 0);
}

#[tokio::test]
async fn non_json_under_both_agents_opens_exactly_one_browser() {
    let server = MockServer::start().await;
    mount_page(&server, r#"<link rel="manifest" href="/manifest.json">"#).await;
    Mock::given(method("GET"))
        .and(path("/manifest.json"))
        .respond_with(html("<html><body>Not Found</body></html>"))
        .mount(&server)
        .await;

    // The rendered DOM points at the same broken manifest.
    let renderer = CountingRenderer::new(json!(format!("{}/manifest.json", server.uri())));
    let resolver = common::manifest_resolver(renderer.clone());

    let err = resolver.resolve(&server.uri()).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(renderer.opened(), 1);
    assert_eq!(renderer.closed(), 1);
    assert_eq!(renderer.active_contexts(), 0);
}

#[tokio::test]
async fn injected_link_found_by_browser_fallback() {
    let server = MockServer::start().await;
    mount_page(&server, "<title>spa</title>").await;
    Mock::given(method("GET"))
        .and(path("/injected.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
        .mount(&server)
        .await;

    let renderer = CountingRenderer::new(json!(format!("{}/injected.json", server.uri())));
    let resolver = common::manifest_resolver(renderer.clone());

    let res = resolver.resolve(&server.uri()).await.unwrap();
    assert_eq!(res.strategy, ManifestStrategy::BrowserFallback);
    assert!(res.url.ends_with("/injected.json"));
    assert!(res.error.unwrap().contains("no manifest link"));
    assert_eq!(renderer.opened(), 1);
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn missing_head_fails_without_browser() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("plain text, no markup"))
        .mount(&server)
        .await;

    let renderer = CountingRenderer::new(Value::Null);
    let resolver = common::manifest_resolver(renderer.clone());

    let err = resolver.resolve(&server.uri()).await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
    assert_eq!(renderer.opened(), 0);
}

#[tokio::test]
async fn fetch_and_parse_known_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/m.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MANIFEST))
        .mount(&server)
        .await;

    let renderer: Arc<dyn Renderer> = CountingRenderer::new(Value::Null);
    let resolver = common::manifest_resolver(renderer);

    let res = resolver
        .fetch_and_parse(&format!("{}/m.json", server.uri()))
        .await
        .unwrap();
    assert_eq!(res.raw_text, MANIFEST);

    let err = resolver
        .fetch_and_parse(&format!("{}/missing.json", server.uri()))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NETWORK_ERROR");
}

#[tokio::test]
async fn failing_browser_session_is_still_closed() {
    let server = MockServer::start().await;
    mount_page(&server, "<title>spa</title>").await;
    let href = json!(format!("{}/injected.json", server.uri()));

    for fault in [Fault::Navigate, Fault::Script] {
        let renderer = CountingRenderer::with_fault(href.clone(), fault);
        let resolver = common::manifest_resolver(renderer.clone());

        let err = resolver.resolve(&server.uri()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND", "{fault:?}");
        assert!(err.to_string().contains("browser-fallback"), "{fault:?}");
        assert_eq!(renderer.opened(), 1, "{fault:?}");
        assert_eq!(renderer.closed(), 1, "{fault:?}");
    }
}
