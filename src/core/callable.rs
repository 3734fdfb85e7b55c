use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::definition::PromptMessage;
use crate::core::error::ToolError;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Executes a tool: structured input in, structured result out.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: &Value) -> Result<Value, ToolError>;
}

/// Zero-argument producer of resource content.
#[async_trait]
pub trait ContentProducer: Send + Sync {
    async fn produce(&self) -> Result<String, ToolError>;
}

/// Builds the message list of a prompt from its named arguments.
#[async_trait]
pub trait MessageProducer: Send + Sync {
    async fn messages(&self, arguments: &Map<String, Value>) -> Result<Vec<PromptMessage>, ToolError>;
}

/// The "produce canonical definition" capability a component file can defer
/// to by exporting `{ factory = "<name>", options = {...} }`.
#[async_trait]
pub trait DefinitionFactory: Send + Sync {
    async fn to_definition(&self, options: &Value) -> anyhow::Result<Value>;
}

/// Thin wrapper around a boxed async fn so closures can be registered as handlers.
#[derive(Clone)]
pub struct FnToolHandler {
    inner: Arc<dyn Fn(Value) -> BoxFuture<Result<Value, ToolError>> + Send + Sync>,
}

impl FnToolHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ToolError>> + Send + 'static,
    {
        Self { inner: Arc::new(move |v| Box::pin(f(v))) }
    }
}

#[async_trait]
impl ToolHandler for FnToolHandler {
    async fn call(&self, arguments: &Value) -> Result<Value, ToolError> {
        (self.inner)(arguments.clone()).await
    }
}

#[derive(Clone)]
pub struct FnContentProducer {
    inner: Arc<dyn Fn() -> BoxFuture<Result<String, ToolError>> + Send + Sync>,
}

impl FnContentProducer {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, ToolError>> + Send + 'static,
    {
        Self { inner: Arc::new(move || Box::pin(f())) }
    }
}

#[async_trait]
impl ContentProducer for FnContentProducer {
    async fn produce(&self) -> Result<String, ToolError> {
        (self.inner)().await
    }
}

#[derive(Clone)]
pub struct FnMessageProducer {
    inner: Arc<dyn Fn(Map<String, Value>) -> BoxFuture<Result<Vec<PromptMessage>, ToolError>> + Send + Sync>,
}

impl FnMessageProducer {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Map<String, Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Vec<PromptMessage>, ToolError>> + Send + 'static,
    {
        Self { inner: Arc::new(move |args| Box::pin(f(args))) }
    }
}

#[async_trait]
impl MessageProducer for FnMessageProducer {
    async fn messages(&self, arguments: &Map<String, Value>) -> Result<Vec<PromptMessage>, ToolError> {
        (self.inner)(arguments.clone()).await
    }
}

#[derive(Clone)]
pub struct FnFactory {
    inner: Arc<dyn Fn(Value) -> BoxFuture<anyhow::Result<Value>> + Send + Sync>,
}

impl FnFactory {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        Self { inner: Arc::new(move |v| Box::pin(f(v))) }
    }
}

#[async_trait]
impl DefinitionFactory for FnFactory {
    async fn to_definition(&self, options: &Value) -> anyhow::Result<Value> {
        (self.inner)(options.clone()).await
    }
}
