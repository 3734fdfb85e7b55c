use std::net::SocketAddr;
use std::sync::Arc;

use crate::host::Host;
use crate::infra::config::{AppConfig, Mode};
use crate::infra::mcp::ComponentServer;
use crate::registry::{LoadReport, Registry};

/// Load every component the config points at into a fresh registry.
pub async fn build_registry(cfg: &AppConfig, host: Host) -> (Registry, LoadReport) {
    let mut registry = Registry::new(host);
    let report = registry.load_all(&cfg.autoload_config()).await;
    for error in &report.errors {
        tracing::warn!(%error, "component not loaded");
    }
    for warning in &report.warnings {
        tracing::warn!(%warning, "component warning");
    }
    (registry, report)
}

pub async fn run_server(cfg: AppConfig, host: Host) -> anyhow::Result<()> {
    tracing::info!(
        mode = ?cfg.mode,
        port = cfg.port,
        base_dir = %cfg.autoload.base_dir.display(),
        "BOOT mcp-autoload"
    );

    let (registry, _report) = build_registry(&cfg, host).await;
    let registry = Arc::new(registry);
    let identity = cfg.identity();

    if cfg.mode == Mode::Stdio {
        let server = ComponentServer::new(registry, identity);
        return crate::infra::runtime::mcp_transport::serve_stdio(server).await;
    }

    let app = crate::infra::http_app::build_app(registry, identity);
    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    tracing::info!(%addr, "listening");
    axum::serve(tokio::net::TcpListener::bind(addr).await?, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn builds_registry_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let tool_dir = dir.path().join("tools/hello");
        fs::create_dir_all(&tool_dir).unwrap();
        fs::write(tool_dir.join("tool.json"), r#"{"name": "hello", "description": "Hi", "execute": "echo"}"#).unwrap();

        let mut cfg = AppConfig::default();
        cfg.autoload.base_dir = dir.path().to_path_buf();
        let (registry, report) = build_registry(&cfg, Host::with_builtins()).await;
        assert!(report.is_clean());
        assert!(registry.get_tool("hello").is_some());
    }
}
