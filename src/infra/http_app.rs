use axum::{
    routing::{any_service, get},
    Router,
};
use std::sync::Arc;

use crate::infra::mcp::{ComponentServer, ServerIdentity};
use crate::infra::runtime::mcp_transport::{make_streamable_http_service, LocalSessionManager};
use crate::registry::Registry;

/// `/healthz`, streamable MCP at `/mcp` and the read-only `/v1/registry` summary.
pub fn build_app(registry: Arc<Registry>, identity: ServerIdentity) -> Router {
    let session_mgr = Arc::new(LocalSessionManager::default());
    let for_sessions = registry.clone();
    let mcp_service = make_streamable_http_service(
        move || ComponentServer::new(for_sessions.clone(), identity.clone()),
        session_mgr,
    );

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/v1/registry", get(crate::api::registry::summary))
        .route_service("/mcp", any_service(mcp_service))
        .with_state(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{ResourceContent, ResourceDefinition};
    use crate::host::Host;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn healthz_is_ok() {
        let app = build_app(Arc::new(Registry::new(Host::new())), ServerIdentity::default());
        let resp = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn registry_summary_lists_components() {
        let registry = Registry::new(Host::new());
        registry.store().add_resource(ResourceDefinition {
            uri: "info://about".into(),
            name: "about".into(),
            description: None,
            content_type: None,
            content: ResourceContent::Text("hi".into()),
            source: None,
        });
        let app = build_app(Arc::new(registry), ServerIdentity::default());
        let resp = app
            .oneshot(Request::builder().uri("/v1/registry").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["stats"]["resources"], 1);
        assert_eq!(v["stats"]["total"], 1);
        assert_eq!(v["resources"][0]["uri"], "info://about");
    }
}
