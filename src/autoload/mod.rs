//! The component pipeline: discovery -> compile -> import/normalize -> validate.

pub mod compiler;
pub mod discovery;
pub mod module;
pub mod normalize;
pub mod validate;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::definition::Kind;

pub use compiler::{CompiledModule, Compiler};
pub use discovery::{discover, FileMatcher};
pub use module::Importer;
pub use normalize::ExportShape;
pub use validate::{validate_schema_descriptions, validate_tools};

/// What happens to tools that fail structural validation after a load pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPolicy {
    /// Keep every tool and report problems as warnings.
    #[default]
    Warn,
    /// Report problems as errors and drop the offending tools.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Glob matched against paths relative to `directory`; replaces the
    /// reserved base-name convention when set.
    pub pattern: Option<String>,
}

impl KindConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            directory: directory.into(),
            pattern: None,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoloadConfig {
    pub tools: KindConfig,
    pub resources: KindConfig,
    pub prompts: KindConfig,
    pub validation: ValidationPolicy,
    /// Persistent compile output; a per-run temporary directory when unset.
    pub cache_dir: Option<PathBuf>,
}

impl AutoloadConfig {
    /// `tools/`, `resources/` and `prompts/` under `base`.
    pub fn rooted_at(base: &Path) -> Self {
        Self {
            tools: KindConfig::new(base.join(Kind::Tool.default_directory())),
            resources: KindConfig::new(base.join(Kind::Resource.default_directory())),
            prompts: KindConfig::new(base.join(Kind::Prompt.default_directory())),
            validation: ValidationPolicy::default(),
            cache_dir: None,
        }
    }

    pub fn kind(&self, kind: Kind) -> &KindConfig {
        match kind {
            Kind::Tool => &self.tools,
            Kind::Resource => &self.resources,
            Kind::Prompt => &self.prompts,
        }
    }

    pub fn kind_mut(&mut self, kind: Kind) -> &mut KindConfig {
        match kind {
            Kind::Tool => &mut self.tools,
            Kind::Resource => &mut self.resources,
            Kind::Prompt => &mut self.prompts,
        }
    }
}
