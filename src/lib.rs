//! Convention-driven MCP component loading.
//!
//! Tools, resources and prompts are discovered by file name under configured
//! directories, compiled or imported into canonical definitions, validated
//! and stored in a [`Registry`] that an rmcp server handler serves from.

pub mod api;
pub mod autoload;
pub mod cli;
pub mod core;
pub mod host;
pub mod infra;
pub mod registry;
pub mod tools;

pub use crate::autoload::{AutoloadConfig, KindConfig, ValidationPolicy};
pub use crate::core::{Definition, Kind, LoadError, ToolError, ValidationError};
pub use crate::host::Host;
pub use crate::infra::mcp::{ComponentServer, ServerIdentity};
pub use crate::registry::{ComponentStore, LoadReport, LoadState, Registry, RegistryStats};
