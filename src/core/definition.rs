//! Canonical component definitions: the single shape per kind that storage,
//! validation and server wiring consume.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::callable::{ContentProducer, MessageProducer, ToolHandler};
use crate::core::error::ToolError;
use crate::host::template;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Tool,
    Resource,
    Prompt,
}

impl Kind {
    /// Load order of a pass.
    pub const ALL: [Kind; 3] = [Kind::Tool, Kind::Resource, Kind::Prompt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Tool => "tool",
            Kind::Resource => "resource",
            Kind::Prompt => "prompt",
        }
    }

    /// Reserved base names marking a file as a component of this kind,
    /// native module first, then source dialect.
    pub fn file_names(&self) -> [&'static str; 2] {
        match self {
            Kind::Tool => ["tool.json", "tool.toml"],
            Kind::Resource => ["resource.json", "resource.toml"],
            Kind::Prompt => ["prompt.json", "prompt.toml"],
        }
    }

    pub fn default_directory(&self) -> &'static str {
        match self {
            Kind::Tool => "tools",
            Kind::Resource => "resources",
            Kind::Prompt => "prompts",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Option<Value>,
    pub annotations: Option<Value>,
    /// `None` when the file's `execute` spec could not be bound to anything callable.
    pub execute: Option<Arc<dyn ToolHandler>>,
    pub source: Option<PathBuf>,
}

impl ToolDefinition {
    pub async fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        match &self.execute {
            Some(handler) => handler.call(arguments).await,
            None => Err(ToolError::NotCallable(self.name.clone())),
        }
    }
}

impl fmt::Debug for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema)
            .field("annotations", &self.annotations)
            .field("callable", &self.execute.is_some())
            .field("source", &self.source)
            .finish()
    }
}

/// Either a literal or a producer invoked on every read.
#[derive(Clone)]
pub enum ResourceContent {
    Text(String),
    Producer(Arc<dyn ContentProducer>),
}

pub struct ResourceDefinition {
    pub uri: String,
    pub name: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub content: ResourceContent,
    pub source: Option<PathBuf>,
}

impl ResourceDefinition {
    pub async fn read(&self) -> Result<String, ToolError> {
        match &self.content {
            ResourceContent::Text(text) => Ok(text.clone()),
            ResourceContent::Producer(producer) => producer.produce().await,
        }
    }
}

impl fmt::Debug for ResourceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let content = match &self.content {
            ResourceContent::Text(text) => format!("text({} bytes)", text.len()),
            ResourceContent::Producer(_) => "producer".to_string(),
        };
        f.debug_struct("ResourceDefinition")
            .field("uri", &self.uri)
            .field("name", &self.name)
            .field("description", &self.description)
            .field("content_type", &self.content_type)
            .field("content", &content)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptArgument {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
}

#[derive(Clone)]
pub enum PromptMessages {
    /// Message templates rendered against the argument map.
    Templates(Vec<PromptMessage>),
    Producer(Arc<dyn MessageProducer>),
}

pub struct PromptDefinition {
    pub name: String,
    pub description: Option<String>,
    pub arguments: Vec<PromptArgument>,
    pub messages: PromptMessages,
    pub source: Option<PathBuf>,
}

impl PromptDefinition {
    pub async fn get_messages(&self, arguments: &Map<String, Value>) -> Result<Vec<PromptMessage>, ToolError> {
        let missing: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required.unwrap_or(false) && !arguments.contains_key(&a.name))
            .map(|a| a.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::InvalidArguments(format!(
                "prompt '{}' is missing required argument(s): {}",
                self.name,
                missing.join(", ")
            )));
        }

        match &self.messages {
            PromptMessages::Templates(templates) => Ok(templates
                .iter()
                .map(|m| PromptMessage::new(m.role, template::render(&m.content, arguments)))
                .collect()),
            PromptMessages::Producer(producer) => producer.messages(arguments).await,
        }
    }
}

impl fmt::Debug for PromptDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages = match &self.messages {
            PromptMessages::Templates(t) => format!("templates({})", t.len()),
            PromptMessages::Producer(_) => "producer".to_string(),
        };
        f.debug_struct("PromptDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("arguments", &self.arguments)
            .field("messages", &messages)
            .field("source", &self.source)
            .finish()
    }
}

#[derive(Debug)]
pub enum Definition {
    Tool(ToolDefinition),
    Resource(ResourceDefinition),
    Prompt(PromptDefinition),
}

impl Definition {
    pub fn kind(&self) -> Kind {
        match self {
            Definition::Tool(_) => Kind::Tool,
            Definition::Resource(_) => Kind::Resource,
            Definition::Prompt(_) => Kind::Prompt,
        }
    }

    /// Unique key within the kind's index: name for tools and prompts, uri for resources.
    pub fn key(&self) -> &str {
        match self {
            Definition::Tool(t) => &t.name,
            Definition::Resource(r) => &r.uri,
            Definition::Prompt(p) => &p.name,
        }
    }
}
