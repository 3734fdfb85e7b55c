use std::fs;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use hyper::Request;
use mcp_autoload::infra::http_app::build_app;
use mcp_autoload::{AutoloadConfig, Host, Registry, ServerIdentity};
use serde_json::Value as J;
use tower::ServiceExt;

const BODY_LIMIT: usize = 1024 * 1024;

async fn loaded_registry() -> (tempfile::TempDir, Arc<Registry>) {
    let dir = tempfile::tempdir().unwrap();
    let tool = dir.path().join("tools/greet");
    fs::create_dir_all(&tool).unwrap();
    fs::write(tool.join("tool.toml"), "name = \"greet\"\nexecute = { template = \"Hi {{name}}\" }\n").unwrap();
    let prompt = dir.path().join("prompts/review");
    fs::create_dir_all(&prompt).unwrap();
    fs::write(
        prompt.join("prompt.json"),
        r#"{"name": "review", "messages": [{"role": "user", "content": "Review {{code}}"}]}"#,
    )
    .unwrap();

    let mut registry = Registry::new(Host::with_builtins());
    let report = registry.load_all(&AutoloadConfig::rooted_at(dir.path())).await;
    assert!(report.errors.is_empty(), "{:?}", report.errors);
    (dir, Arc::new(registry))
}

#[tokio::test]
async fn healthz_and_registry_summary() {
    let (_dir, registry) = loaded_registry().await;
    let app = build_app(registry, ServerIdentity::default());

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let bytes = to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(&bytes[..], b"ok");

    let resp = app
        .clone()
        .oneshot(Request::builder().uri("/v1/registry").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let bytes = to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: J = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["stats"]["tools"], 1);
    assert_eq!(v["stats"]["prompts"], 1);
    assert_eq!(v["stats"]["total"], 2);
    assert_eq!(v["tools"][0], "greet");
    assert_eq!(v["prompts"][0], "review");
}

#[tokio::test]
async fn unknown_routes_are_404() {
    let (_dir, registry) = loaded_registry().await;
    let app = build_app(registry, ServerIdentity::default());
    let resp = app
        .oneshot(Request::builder().uri("/v1/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
