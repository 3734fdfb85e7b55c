use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failure to load a single component file. Every variant carries the file it
/// originated from so the orchestrator can report it without extra context.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to compile {}: {message}", path.display())]
    Compile { path: PathBuf, message: String },
    #[error("cannot resolve import '{specifier}' from {}", path.display())]
    UnresolvedImport { path: PathBuf, specifier: String },
    #[error("import cycle through {} (via '{specifier}')", path.display())]
    ImportCycle { path: PathBuf, specifier: String },
    #[error("factory '{factory}' failed for {}: {message}", path.display())]
    Factory {
        path: PathBuf,
        factory: String,
        message: String,
    },
    #[error("{} references unknown {what} '{name}'", path.display())]
    Bind {
        path: PathBuf,
        what: &'static str,
        name: String,
    },
    #[error("invalid definition in {}: {message}", path.display())]
    Shape { path: PathBuf, message: String },
    /// A failure in something `path` imports, or in its compiled artifact.
    #[error("failed to load {}: {source}", path.display())]
    Dependency {
        path: PathBuf,
        #[source]
        source: Box<LoadError>,
    },
}

// Compile failures are remembered per pass and raised again for every
// importer; io errors are rebuilt from their kind and message.
impl Clone for LoadError {
    fn clone(&self) -> Self {
        match self {
            LoadError::Io { path, source } => LoadError::Io {
                path: path.clone(),
                source: std::io::Error::new(source.kind(), source.to_string()),
            },
            LoadError::Parse { path, message } => LoadError::Parse {
                path: path.clone(),
                message: message.clone(),
            },
            LoadError::Compile { path, message } => LoadError::Compile {
                path: path.clone(),
                message: message.clone(),
            },
            LoadError::UnresolvedImport { path, specifier } => LoadError::UnresolvedImport {
                path: path.clone(),
                specifier: specifier.clone(),
            },
            LoadError::ImportCycle { path, specifier } => LoadError::ImportCycle {
                path: path.clone(),
                specifier: specifier.clone(),
            },
            LoadError::Factory { path, factory, message } => LoadError::Factory {
                path: path.clone(),
                factory: factory.clone(),
                message: message.clone(),
            },
            LoadError::Bind { path, what, name } => LoadError::Bind {
                path: path.clone(),
                what: *what,
                name: name.clone(),
            },
            LoadError::Shape { path, message } => LoadError::Shape {
                path: path.clone(),
                message: message.clone(),
            },
            LoadError::Dependency { path, source } => LoadError::Dependency {
                path: path.clone(),
                source: source.clone(),
            },
        }
    }
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> LoadError {
        let path = path.into();
        move |source| LoadError::Io { path, source }
    }

    /// The file this error originated from.
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Parse { path, .. }
            | LoadError::Compile { path, .. }
            | LoadError::UnresolvedImport { path, .. }
            | LoadError::ImportCycle { path, .. }
            | LoadError::Factory { path, .. }
            | LoadError::Bind { path, .. }
            | LoadError::Shape { path, .. }
            | LoadError::Dependency { path, .. } => path,
        }
    }

    /// Attribute this error to `origin` when it was raised for another file.
    pub fn within(self, origin: &Path) -> LoadError {
        if self.path() == origin {
            self
        } else {
            LoadError::Dependency {
                path: origin.to_path_buf(),
                source: Box::new(self),
            }
        }
    }

    /// The innermost error, past any dependency wrapping.
    pub fn root(&self) -> &LoadError {
        match self {
            LoadError::Dependency { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Aggregate structural validation failure: every problem found, reported once.
#[derive(Debug, Error)]
#[error("tool validation failed:\n  {}", .messages.join("\n  "))]
pub struct ValidationError {
    pub messages: Vec<String>,
}

/// Failure while invoking a tool handler or producing resource/prompt content.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Message(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("'{0}' has no callable handler")]
    NotCallable(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<anyhow::Error> for ToolError {
    fn from(e: anyhow::Error) -> Self {
        ToolError::Message(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_error_mentions_origin_path() {
        let e = LoadError::Compile {
            path: PathBuf::from("/srv/tools/broken/tool.toml"),
            message: "expected `=`".into(),
        };
        assert!(e.to_string().contains("/srv/tools/broken/tool.toml"));
        assert_eq!(e.path(), Path::new("/srv/tools/broken/tool.toml"));
    }

    #[test]
    fn errors_from_imports_are_attributed_to_the_importer() {
        let tool = Path::new("/srv/tools/a/tool.toml");
        let inner = LoadError::Compile {
            path: PathBuf::from("/srv/shared/schema.toml"),
            message: "expected a value".into(),
        };
        let err = inner.within(tool);
        assert_eq!(err.path(), tool);
        let text = err.to_string();
        assert!(text.contains("/srv/tools/a/tool.toml"), "{text}");
        assert!(text.contains("/srv/shared/schema.toml"), "{text}");
        assert!(matches!(err.root(), LoadError::Compile { .. }));

        let own = LoadError::Parse { path: tool.to_path_buf(), message: "x".into() };
        assert!(matches!(own.within(tool), LoadError::Parse { .. }));
    }

    #[test]
    fn cloned_io_errors_keep_kind_and_path() {
        let err = LoadError::io("/srv/tool.json")(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let copy = err.clone();
        assert_eq!(copy.path(), Path::new("/srv/tool.json"));
        assert!(matches!(copy, LoadError::Io { ref source, .. } if source.kind() == std::io::ErrorKind::NotFound));
        assert_eq!(copy.to_string(), err.to_string());
    }

    #[test]
    fn validation_error_lists_every_message() {
        let e = ValidationError {
            messages: vec!["tool 'a': execute must be callable".into(), "tool #1: name must be a non-empty string".into()],
        };
        let text = e.to_string();
        assert!(text.contains("tool 'a'"));
        assert!(text.contains("tool #1"));
    }

    #[test]
    fn it_converts_from_anyhow() {
        let any: anyhow::Error = anyhow::anyhow!("nope");
        let err: ToolError = any.into();
        assert_eq!(err.to_string(), "nope");
    }
}
