use async_trait::async_trait;
use serde_json::{json, Value};

use crate::core::callable::ToolHandler;
use crate::core::error::ToolError;
use crate::host::Host;

/// Returns its input unchanged. Handy for wiring checks.
#[derive(Clone, Default)]
pub struct EchoHandler;

#[async_trait]
impl ToolHandler for EchoHandler {
    async fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        Ok(arguments.clone())
    }
}

/// Current UTC time, RFC 3339.
#[derive(Clone, Default)]
pub struct NowHandler;

#[async_trait]
impl ToolHandler for NowHandler {
    async fn call(&self, _arguments: &Value) -> Result<Value, ToolError> {
        Ok(json!({ "now": chrono::Utc::now().to_rfc3339() }))
    }
}

pub fn register(host: Host) -> Host {
    host.with_tool_handler("echo", EchoHandler)
        .with_tool_handler("now", NowHandler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_arguments() {
        let out = EchoHandler.call(&json!({"name": "Niamh"})).await.unwrap();
        assert_eq!(out["name"], "Niamh");
    }

    #[tokio::test]
    async fn now_is_rfc3339() {
        let out = NowHandler.call(&Value::Null).await.unwrap();
        let now = out["now"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(now).is_ok());
    }
}
