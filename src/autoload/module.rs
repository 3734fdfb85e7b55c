//! Loads one component file into a typed definition.
//!
//! JSON modules are read directly; TOML sources go through the [`Compiler`]
//! first. `$ref` nodes are replaced by the primary export of the module the
//! alias imports, so shared schemas and message lists can live in their own
//! files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::autoload::compiler::{is_relative, is_toml, Compiler};
use crate::autoload::normalize;
use crate::core::definition::{Definition, Kind};
use crate::core::error::LoadError;
use crate::host::Host;

const REF_KEY: &str = "$ref";

/// The value a module contributes when imported: its `default` member if
/// present, else the module minus `imports`; a nested `default` is
/// unwrapped one more level.
pub fn primary_export(module: Value) -> Value {
    let export = match module {
        Value::Object(mut map) => {
            map.remove("imports");
            match map.remove("default") {
                Some(default) => default,
                None => Value::Object(map),
            }
        }
        other => other,
    };
    match export {
        Value::Object(mut map) if map.contains_key("default") => map.remove("default").unwrap_or(Value::Null),
        other => other,
    }
}

enum ImportTarget {
    File(PathBuf),
    Package(Value),
}

pub struct Importer<'a> {
    host: &'a Host,
    compiler: Option<&'a mut Compiler>,
    modules: HashMap<PathBuf, Value>,
    in_progress: Vec<PathBuf>,
}

impl<'a> Importer<'a> {
    /// Without a compiler only JSON modules can be loaded.
    pub fn new(host: &'a Host, compiler: Option<&'a mut Compiler>) -> Self {
        Self {
            host,
            compiler,
            modules: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// `Ok(None)` when the file's export is not a `kind` component. Failures
    /// in imported files or compiled artifacts come back attributed to `path`.
    pub async fn load(&mut self, path: &Path, kind: Kind) -> Result<Option<Definition>, LoadError> {
        let path = path.canonicalize().map_err(LoadError::io(path))?;
        let export = self.import(&path).map_err(|err| err.within(&path))?;
        let Some(map) = normalize::canonicalize(export, kind, self.host, &path).await? else {
            tracing::debug!(path = %path.display(), %kind, "export is not an object; skipping");
            return Ok(None);
        };
        if !normalize::accepts(kind, &map) {
            tracing::debug!(path = %path.display(), %kind, "export does not match the kind; skipping");
            return Ok(None);
        }
        normalize::bind(kind, map, self.host, &path).map(Some)
    }

    fn import(&mut self, path: &Path) -> Result<Value, LoadError> {
        if !is_toml(path) {
            return self.evaluate(path);
        }
        let compiler = self.compiler.as_deref_mut().ok_or_else(|| LoadError::Compile {
            path: path.to_path_buf(),
            message: "no compiler available for source files".into(),
        })?;
        let output = compiler.compile(path)?.output;
        self.evaluate(&output)
    }

    /// Primary export of the module at `path`, `$ref`s resolved. Cached per importer.
    fn evaluate(&mut self, path: &Path) -> Result<Value, LoadError> {
        if let Some(cached) = self.modules.get(path) {
            return Ok(cached.clone());
        }

        let text = fs::read_to_string(path).map_err(LoadError::io(path))?;
        let module: Value = serde_json::from_str(&text).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let imports = self.import_table(path, &module)?;

        self.in_progress.push(path.to_path_buf());
        let resolved = self.resolve_refs(primary_export(module), path, &imports);
        self.in_progress.pop();

        let value = resolved?;
        self.modules.insert(path.to_path_buf(), value.clone());
        Ok(value)
    }

    fn import_table(&self, path: &Path, module: &Value) -> Result<HashMap<String, ImportTarget>, LoadError> {
        let mut table = HashMap::new();
        let Some(imports) = module.get("imports") else {
            return Ok(table);
        };
        let imports = imports.as_object().ok_or_else(|| LoadError::Shape {
            path: path.to_path_buf(),
            message: "`imports` must be a table of alias -> specifier".into(),
        })?;

        let base = path.parent().unwrap_or_else(|| Path::new("/"));
        for (alias, specifier) in imports {
            let spec = specifier.as_str().ok_or_else(|| LoadError::Shape {
                path: path.to_path_buf(),
                message: format!("import '{alias}' must be a string specifier"),
            })?;
            let unresolved = || LoadError::UnresolvedImport {
                path: path.to_path_buf(),
                specifier: spec.to_string(),
            };
            let target = if is_relative(spec) {
                ImportTarget::File(resolve_module(base, spec).ok_or_else(unresolved)?)
            } else if Path::new(spec).is_absolute() {
                let file = Path::new(spec);
                if !file.is_file() {
                    return Err(unresolved());
                }
                ImportTarget::File(file.to_path_buf())
            } else {
                ImportTarget::Package(primary_export(self.host.package(spec).cloned().ok_or_else(unresolved)?))
            };
            table.insert(alias.clone(), target);
        }
        Ok(table)
    }

    fn resolve_refs(
        &mut self,
        value: Value,
        path: &Path,
        imports: &HashMap<String, ImportTarget>,
    ) -> Result<Value, LoadError> {
        match value {
            Value::Object(map) => {
                if let Some(reference) = as_reference(&map) {
                    return self.dereference(reference, path, imports);
                }
                let mut out = Map::with_capacity(map.len());
                for (key, child) in map {
                    out.insert(key, self.resolve_refs(child, path, imports)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .into_iter()
                .map(|item| self.resolve_refs(item, path, imports))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Ok(other),
        }
    }

    fn dereference(
        &mut self,
        reference: &str,
        path: &Path,
        imports: &HashMap<String, ImportTarget>,
    ) -> Result<Value, LoadError> {
        let (alias, pointer) = match reference.split_once('#') {
            Some((alias, pointer)) => (alias, Some(pointer)),
            None => (reference, None),
        };
        let target = imports.get(alias).ok_or_else(|| LoadError::UnresolvedImport {
            path: path.to_path_buf(),
            specifier: alias.to_string(),
        })?;

        let export = match target {
            ImportTarget::Package(value) => value.clone(),
            ImportTarget::File(dependency) => {
                // Importing a module that is still being evaluated is fine;
                // using its value is not.
                if self.in_progress.iter().any(|p| p == dependency) {
                    return Err(LoadError::ImportCycle {
                        path: path.to_path_buf(),
                        specifier: alias.to_string(),
                    });
                }
                self.evaluate(dependency)?
            }
        };

        match pointer {
            None | Some("") => Ok(export),
            Some(pointer) => export.pointer(pointer).cloned().ok_or_else(|| LoadError::Shape {
                path: path.to_path_buf(),
                message: format!("'{reference}' does not point at anything"),
            }),
        }
    }
}

fn as_reference(map: &Map<String, Value>) -> Option<&str> {
    if map.len() != 1 {
        return None;
    }
    map.get(REF_KEY).and_then(Value::as_str)
}

/// `spec`, `spec.json`, `spec/index.json`.
fn resolve_module(base: &Path, specifier: &str) -> Option<PathBuf> {
    let target = base.join(specifier);
    let mut with_ext = target.clone().into_os_string();
    with_ext.push(".json");
    [target.clone(), PathBuf::from(with_ext), target.join("index.json")]
        .into_iter()
        .find(|c| c.is_file())
        .and_then(|c| c.canonicalize().ok())
}
