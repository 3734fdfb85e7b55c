//! Core types & traits: canonical definitions, callable contracts, errors.

pub mod callable;
pub mod definition;
pub mod error;

pub use callable::{
    ContentProducer, DefinitionFactory, FnContentProducer, FnFactory, FnMessageProducer, FnToolHandler,
    MessageProducer, ToolHandler,
};
pub use definition::{
    Definition, Kind, PromptArgument, PromptDefinition, PromptMessage, PromptMessages, ResourceContent,
    ResourceDefinition, Role, ToolDefinition,
};
pub use error::{LoadError, ToolError, ValidationError};
