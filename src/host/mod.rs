//! Static registration table for user code referenced from component files.
//!
//! Component files are data; anything executable they mention is either a
//! backend spec ([`backends`]) or a name looked up here. Package imports
//! (non-relative specifiers) resolve against the package table as well.

pub mod backends;
pub mod template;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::core::callable::{ContentProducer, DefinitionFactory, MessageProducer, ToolHandler};
use crate::infra::runtime::limits::make_http_client;
use backends::{CommandBackend, FileContent, HttpBackend, TemplateBackend};

/// How a tool file says what its `execute` is.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ExecuteSpec {
    Named(String),
    Handler {
        handler: String,
    },
    Command {
        command: Vec<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
    Http {
        http: String,
    },
    Template {
        template: String,
    },
}

/// How a resource file says where its content comes from.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentSpec {
    Text(String),
    Handler {
        handler: String,
    },
    File {
        file: String,
    },
    Command {
        command: Vec<String>,
        #[serde(default)]
        timeout_ms: Option<u64>,
    },
}

/// `getMessages` of a prompt file: a producer name.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessagesSpec {
    Named(String),
    Handler { handler: String },
}

#[derive(Clone)]
pub struct Host {
    // Cloned into every `http` backend so they share one connection pool.
    http: reqwest::Client,
    tool_handlers: HashMap<String, Arc<dyn ToolHandler>>,
    content_producers: HashMap<String, Arc<dyn ContentProducer>>,
    message_producers: HashMap<String, Arc<dyn MessageProducer>>,
    factories: HashMap<String, Arc<dyn DefinitionFactory>>,
    packages: HashMap<String, Value>,
}

impl Default for Host {
    fn default() -> Self {
        Self {
            http: make_http_client(),
            tool_handlers: HashMap::new(),
            content_producers: HashMap::new(),
            message_producers: HashMap::new(),
            factories: HashMap::new(),
            packages: HashMap::new(),
        }
    }
}

impl Host {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host preloaded with the crate's builtin handlers.
    pub fn with_builtins() -> Self {
        crate::tools::builtin::register(Self::new())
    }

    /// Replace the client `http` backends send requests with.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn with_tool_handler(mut self, name: impl Into<String>, handler: impl ToolHandler + 'static) -> Self {
        self.tool_handlers.insert(name.into(), Arc::new(handler));
        self
    }

    pub fn with_content_producer(mut self, name: impl Into<String>, producer: impl ContentProducer + 'static) -> Self {
        self.content_producers.insert(name.into(), Arc::new(producer));
        self
    }

    pub fn with_message_producer(mut self, name: impl Into<String>, producer: impl MessageProducer + 'static) -> Self {
        self.message_producers.insert(name.into(), Arc::new(producer));
        self
    }

    pub fn with_factory(mut self, name: impl Into<String>, factory: impl DefinitionFactory + 'static) -> Self {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    pub fn with_package(mut self, name: impl Into<String>, module: Value) -> Self {
        self.packages.insert(name.into(), module);
        self
    }

    pub fn tool_handler(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tool_handlers.get(name).cloned()
    }

    pub fn content_producer(&self, name: &str) -> Option<Arc<dyn ContentProducer>> {
        self.content_producers.get(name).cloned()
    }

    pub fn message_producer(&self, name: &str) -> Option<Arc<dyn MessageProducer>> {
        self.message_producers.get(name).cloned()
    }

    pub fn factory(&self, name: &str) -> Option<Arc<dyn DefinitionFactory>> {
        self.factories.get(name).cloned()
    }

    pub fn package(&self, specifier: &str) -> Option<&Value> {
        self.packages.get(specifier)
    }

    /// Resolve an `execute` spec. `None` means nothing callable is behind it.
    pub fn bind_tool(&self, spec: &ExecuteSpec, base_dir: &Path) -> Option<Arc<dyn ToolHandler>> {
        match spec {
            ExecuteSpec::Named(name) | ExecuteSpec::Handler { handler: name } => self.tool_handler(name),
            ExecuteSpec::Command { command, timeout_ms } => Some(Arc::new(CommandBackend::new(
                command.clone(),
                base_dir,
                timeout_ms.map(Duration::from_millis),
            ))),
            ExecuteSpec::Http { http } => Some(Arc::new(HttpBackend::new(http.clone(), self.http.clone()))),
            ExecuteSpec::Template { template } => Some(Arc::new(TemplateBackend::new(template.clone()))),
        }
    }

    /// Resolve a producer-style `content` spec. Literals are handled by the caller.
    pub fn bind_content(&self, spec: &ContentSpec, base_dir: &Path) -> Option<Arc<dyn ContentProducer>> {
        match spec {
            ContentSpec::Text(_) => None,
            ContentSpec::Handler { handler } => self.content_producer(handler),
            ContentSpec::File { file } => Some(Arc::new(FileContent::new(base_dir.join(file)))),
            ContentSpec::Command { command, timeout_ms } => Some(Arc::new(CommandBackend::new(
                command.clone(),
                base_dir,
                timeout_ms.map(Duration::from_millis),
            ))),
        }
    }

    pub fn bind_messages(&self, spec: &MessagesSpec) -> Option<Arc<dyn MessageProducer>> {
        match spec {
            MessagesSpec::Named(name) | MessagesSpec::Handler { handler: name } => self.message_producer(name),
        }
    }
}
