//! MCP server handler over the component registry.
//!
//! Everything listed or invoked here comes out of the [`Registry`]; this file
//! only translates between canonical definitions and rmcp's model types.

use std::sync::Arc;

use serde_json::{json, Map, Value as JsonValue};

use rmcp::{
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, GetPromptRequestParam, GetPromptResult,
        JsonObject, ListPromptsResult, ListResourcesResult, ListToolsResult, PaginatedRequestParam, Prompt,
        PromptMessage as McpPromptMessage, PromptMessageRole, RawResource, ReadResourceRequestParam,
        ReadResourceResult, Resource, ResourceContents, ServerCapabilities, ServerInfo, Tool,
    },
    service::RequestContext,
    ErrorData as McpError, RoleServer, ServerHandler,
};

use crate::core::definition::{PromptDefinition, ResourceDefinition, Role, ToolDefinition};
use crate::core::error::ToolError;
use crate::registry::Registry;

/// Name, version and instructions advertised during initialisation.
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerIdentity {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
        }
    }
}

#[derive(Clone)]
pub struct ComponentServer {
    registry: Arc<Registry>,
    identity: ServerIdentity,
}

/// Tool schemas may be written as a bare map of fields; clients expect an
/// object schema.
fn object_schema(schema: Option<&JsonValue>) -> JsonObject {
    match schema {
        Some(JsonValue::Object(map)) if map.contains_key("type") || map.contains_key("properties") => map.clone(),
        Some(JsonValue::Object(fields)) if !fields.is_empty() => {
            let mut wrapped = JsonObject::new();
            wrapped.insert("type".into(), json!("object"));
            wrapped.insert("properties".into(), JsonValue::Object(fields.clone()));
            wrapped
        }
        _ => {
            let mut empty = JsonObject::new();
            empty.insert("type".into(), json!("object"));
            empty
        }
    }
}

fn to_mcp_tool(def: &ToolDefinition) -> Tool {
    let mut tool = Tool::new(
        def.name.clone(),
        def.description.clone(),
        Arc::new(object_schema(def.input_schema.as_ref())),
    );
    if let Some(annotations) = &def.annotations {
        match serde_json::from_value(annotations.clone()) {
            Ok(parsed) => tool.annotations = Some(parsed),
            Err(e) => tracing::debug!(tool = %def.name, error = %e, "ignoring unrecognised annotations"),
        }
    }
    tool
}

fn to_mcp_resource(def: &ResourceDefinition) -> Resource {
    let mut raw = RawResource::new(def.uri.clone(), def.name.clone());
    raw.description = def.description.clone();
    raw.mime_type = def.content_type.clone();
    raw.no_annotation()
}

fn to_mcp_prompt(def: &PromptDefinition) -> Option<Prompt> {
    let value = json!({
        "name": def.name,
        "description": def.description,
        "arguments": def.arguments,
    });
    match serde_json::from_value(value) {
        Ok(prompt) => Some(prompt),
        Err(e) => {
            tracing::warn!(prompt = %def.name, error = %e, "prompt cannot be advertised");
            None
        }
    }
}

fn tool_error(name: &str, err: ToolError) -> Result<CallToolResult, McpError> {
    match err {
        ToolError::InvalidArguments(msg) => Err(McpError::invalid_params(msg, None)),
        other => {
            tracing::warn!(tool = %name, error = %other, "tool call failed");
            Ok(CallToolResult::error(vec![Content::text(other.to_string())]))
        }
    }
}

impl ComponentServer {
    pub fn new(registry: Arc<Registry>, identity: ServerIdentity) -> Self {
        Self { registry, identity }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn tool_list(&self) -> Vec<Tool> {
        self.registry.all_tools().iter().map(|t| to_mcp_tool(t)).collect()
    }

    pub async fn invoke_tool(&self, name: &str, arguments: JsonValue) -> Result<CallToolResult, McpError> {
        let tool = self
            .registry
            .get_tool(name)
            .ok_or_else(|| McpError::invalid_params(format!("unknown tool: {name}"), None))?;
        tracing::debug!(tool = %name, "tool invoked");
        match tool.call(&arguments).await {
            Ok(JsonValue::String(text)) => Ok(CallToolResult::success(vec![Content::text(text)])),
            Ok(value) => Ok(CallToolResult::success(vec![Content::text(value.to_string())])),
            Err(err) => tool_error(name, err),
        }
    }

    pub fn resource_list(&self) -> Vec<Resource> {
        self.registry.all_resources().iter().map(|r| to_mcp_resource(r)).collect()
    }

    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let resource = self
            .registry
            .get_resource(uri)
            .ok_or_else(|| McpError::resource_not_found(format!("unknown resource: {uri}"), None))?;
        let text = resource
            .read()
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        let mut contents = ResourceContents::text(text, uri.to_string());
        if let ResourceContents::TextResourceContents { mime_type, .. } = &mut contents {
            *mime_type = resource.content_type.clone();
        }
        Ok(ReadResourceResult { contents: vec![contents] })
    }

    pub fn prompt_list(&self) -> Vec<Prompt> {
        self.registry.all_prompts().iter().filter_map(|p| to_mcp_prompt(p)).collect()
    }

    pub async fn prompt(&self, name: &str, arguments: Map<String, JsonValue>) -> Result<GetPromptResult, McpError> {
        let prompt = self
            .registry
            .get_prompt(name)
            .ok_or_else(|| McpError::invalid_params(format!("unknown prompt: {name}"), None))?;
        let messages = prompt.get_messages(&arguments).await.map_err(|e| match e {
            ToolError::InvalidArguments(msg) => McpError::invalid_params(msg, None),
            other => McpError::internal_error(other.to_string(), None),
        })?;
        Ok(GetPromptResult {
            description: prompt.description.clone(),
            messages: messages
                .into_iter()
                .map(|m| {
                    let role = match m.role {
                        Role::User => PromptMessageRole::User,
                        Role::Assistant => PromptMessageRole::Assistant,
                    };
                    McpPromptMessage::new_text(role, m.content)
                })
                .collect(),
        })
    }
}

impl ServerHandler for ComponentServer {
    fn get_info(&self) -> ServerInfo {
        let mut info = ServerInfo::default();
        info.capabilities = ServerCapabilities::builder()
            .enable_tools()
            .enable_resources()
            .enable_prompts()
            .build();
        info.server_info.name = self.identity.name.clone();
        info.server_info.version = self.identity.version.clone();
        info.instructions = self.identity.instructions.clone();
        info
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.tool_list()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let arguments = JsonValue::Object(request.arguments.unwrap_or_default());
        self.invoke_tool(&request.name, arguments).await
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resource_list()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }

    async fn list_prompts(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListPromptsResult, McpError> {
        Ok(ListPromptsResult::with_all_items(self.prompt_list()))
    }

    async fn get_prompt(
        &self,
        request: GetPromptRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<GetPromptResult, McpError> {
        self.prompt(&request.name, request.arguments.unwrap_or_default()).await
    }
}
