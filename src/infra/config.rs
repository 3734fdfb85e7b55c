use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::autoload::{AutoloadConfig, KindConfig, ValidationPolicy};
use crate::core::definition::Kind;
use crate::infra::mcp::ServerIdentity;

pub const CONFIG_ENV: &str = "MCP_AUTOLOAD_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "mcp-autoload.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {name}: {value:?}")]
    Env { name: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Server,
    Stdio,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub name: String,
    pub version: String,
    pub instructions: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        let identity = ServerIdentity::default();
        Self {
            name: identity.name,
            version: identity.version,
            instructions: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KindSection {
    pub enabled: bool,
    /// Relative paths are taken from `base_dir`.
    pub directory: Option<PathBuf>,
    pub pattern: Option<String>,
}

impl Default for KindSection {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: None,
            pattern: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AutoloadSection {
    pub base_dir: PathBuf,
    pub validation: ValidationPolicy,
    pub cache_dir: Option<PathBuf>,
    pub tools: KindSection,
    pub resources: KindSection,
    pub prompts: KindSection,
}

impl Default for AutoloadSection {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            validation: ValidationPolicy::default(),
            cache_dir: None,
            tools: KindSection::default(),
            resources: KindSection::default(),
            prompts: KindSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub port: u16,
    pub server: ServerSection,
    pub autoload: AutoloadSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            port: 8080,
            server: ServerSection::default(),
            autoload: AutoloadSection::default(),
        }
    }
}

impl AppConfig {
    /// File from `MCP_AUTOLOAD_CONFIG` (must exist), else `./mcp-autoload.toml`
    /// when present, else defaults; then `MODE`, `PORT` and `COMPONENTS_DIR`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ if Path::new(DEFAULT_CONFIG_FILE).is_file() => Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?,
            _ => Self::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(mode) = std::env::var("MODE") {
            self.mode = match mode.trim() {
                "server" => Mode::Server,
                "stdio" => Mode::Stdio,
                _ => return Err(ConfigError::Env { name: "MODE", value: mode }),
            };
        }
        if let Ok(port) = std::env::var("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::Env { name: "PORT", value: port.clone() })?;
        }
        if let Ok(dir) = std::env::var("COMPONENTS_DIR") {
            if !dir.trim().is_empty() {
                self.autoload.base_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    pub fn identity(&self) -> ServerIdentity {
        ServerIdentity {
            name: self.server.name.clone(),
            version: self.server.version.clone(),
            instructions: self.server.instructions.clone(),
        }
    }

    /// Resolve per-kind directories against `base_dir`.
    pub fn autoload_config(&self) -> AutoloadConfig {
        let base = &self.autoload.base_dir;
        let mut config = AutoloadConfig::rooted_at(base);
        for kind in Kind::ALL {
            let section = match kind {
                Kind::Tool => &self.autoload.tools,
                Kind::Resource => &self.autoload.resources,
                Kind::Prompt => &self.autoload.prompts,
            };
            let directory = match &section.directory {
                Some(dir) => base.join(dir),
                None => base.join(kind.default_directory()),
            };
            *config.kind_mut(kind) = KindConfig {
                enabled: section.enabled,
                directory,
                pattern: section.pattern.clone(),
            };
        }
        config.validation = self.autoload.validation;
        config.cache_dir = self.autoload.cache_dir.clone();
        config
    }
}
