//! Turns TOML component sources into JSON modules the importer can load.
//!
//! Each source compiles to `<out_root>/<absolute source path>.json`. Relative
//! imports are compiled into the same tree and their specifiers rewritten to
//! the absolute output path, so a compiled module never refers back to the
//! source tree.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use crate::core::error::LoadError;

/// Extensions a relative import may name, preferred first.
const SOURCE_EXTENSIONS: [&str; 2] = ["toml", "json"];

#[derive(Debug, Clone)]
pub struct CompiledModule {
    pub source: PathBuf,
    pub output: PathBuf,
    pub text: String,
}

#[derive(Debug)]
pub struct Compiler {
    out_root: PathBuf,
    // Held for its Drop: removes the per-run tree.
    _scratch: Option<TempDir>,
    persistent: bool,
    seen: HashSet<PathBuf>,
    // Raised again for every later importer in the same pass.
    failed: HashMap<PathBuf, LoadError>,
}

impl Compiler {
    /// Compile into `cache_dir` when given (kept across runs, reused when the
    /// source hash is unchanged), otherwise into a fresh temporary directory.
    pub fn new(cache_dir: Option<&Path>) -> std::io::Result<Self> {
        match cache_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Self {
                    out_root: dir.canonicalize()?,
                    _scratch: None,
                    persistent: true,
                    seen: HashSet::new(),
                    failed: HashMap::new(),
                })
            }
            None => {
                let scratch = tempfile::Builder::new().prefix("mcp-autoload-").tempdir()?;
                Ok(Self {
                    out_root: scratch.path().to_path_buf(),
                    _scratch: Some(scratch),
                    persistent: false,
                    seen: HashSet::new(),
                    failed: HashMap::new(),
                })
            }
        }
    }

    pub fn out_root(&self) -> &Path {
        &self.out_root
    }

    /// Deterministic artifact location for a canonical source path.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        let mut out = self.out_root.clone();
        for component in source.components() {
            if let Component::Normal(part) = component {
                out.push(part);
            }
        }
        let file_name = out
            .file_name()
            .map(|n| format!("{}.json", n.to_string_lossy()))
            .unwrap_or_else(|| "index.json".to_string());
        out.set_file_name(file_name);
        out
    }

    /// Forget which files were compiled so the next pass rebuilds them.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.failed.clear();
    }

    pub fn compile(&mut self, source: &Path) -> Result<CompiledModule, LoadError> {
        let source = source.canonicalize().map_err(LoadError::io(source))?;
        self.compile_dependency(&source)?;
        let output = self.output_path(&source);
        let text = fs::read_to_string(&output).map_err(LoadError::io(&output))?;
        Ok(CompiledModule { source, output, text })
    }

    fn compile_dependency(&mut self, source: &Path) -> Result<(), LoadError> {
        if let Some(err) = self.failed.get(source) {
            return Err(err.clone());
        }
        // Also what terminates import cycles: a module already on its way is
        // not revisited, and its output path is known up front.
        if !self.seen.insert(source.to_path_buf()) {
            return Ok(());
        }

        let result = self.build(source);
        if let Err(err) = &result {
            self.discard(source);
            self.failed.insert(source.to_path_buf(), err.clone());
        }
        result
    }

    /// A failed source must not leave an artifact a later pass could pick up.
    fn discard(&self, source: &Path) {
        let output = self.output_path(source);
        for stale in [sidecar_path(&output), output] {
            if let Err(err) = fs::remove_file(&stale) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %stale.display(), error = %err, "could not remove stale artifact");
                }
            }
        }
    }

    fn build(&mut self, source: &Path) -> Result<(), LoadError> {
        let bytes = fs::read(source).map_err(LoadError::io(source))?;
        let hash = hex::encode(Sha256::digest(&bytes));
        let output = self.output_path(source);
        let sidecar = sidecar_path(&output);

        if self.persistent && output.is_file() {
            if let Some(dependencies) = read_sidecar(&sidecar, &hash) {
                tracing::debug!(source = %source.display(), "compile cache hit");
                for dependency in dependencies {
                    self.compile_dependency(&dependency)?;
                }
                return Ok(());
            }
        }

        let text = String::from_utf8(bytes).map_err(|e| LoadError::Compile {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut module = parse_source(source, &text)?;

        let mut dependencies = Vec::new();
        if let Some(imports) = module.get_mut("imports").and_then(Value::as_object_mut) {
            let base = source.parent().unwrap_or_else(|| Path::new("/"));
            for (alias, specifier) in imports.iter_mut() {
                let spec = specifier.as_str().ok_or_else(|| LoadError::Compile {
                    path: source.to_path_buf(),
                    message: format!("import '{alias}' must be a string specifier"),
                })?;
                if !is_relative(spec) {
                    continue;
                }
                let dependency = resolve_source(base, spec).ok_or_else(|| LoadError::UnresolvedImport {
                    path: source.to_path_buf(),
                    specifier: spec.to_string(),
                })?;
                *specifier = Value::String(self.output_path(&dependency).to_string_lossy().into_owned());
                dependencies.push(dependency);
            }
        }

        for dependency in &dependencies {
            self.compile_dependency(dependency)?;
        }

        let rendered = serde_json::to_string_pretty(&module).map_err(|e| LoadError::Compile {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).map_err(LoadError::io(parent))?;
        }
        fs::write(&output, rendered).map_err(LoadError::io(&output))?;
        fs::write(&sidecar, render_sidecar(&hash, &dependencies)).map_err(LoadError::io(&sidecar))?;

        metrics::counter!("autoload_compiled_total").increment(1);
        tracing::debug!(
            source = %source.display(),
            output = %output.display(),
            dependencies = dependencies.len(),
            "compiled module"
        );
        Ok(())
    }
}

/// `./x` and `../x` are relative; anything else is a package or an absolute path.
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

pub fn is_toml(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "toml")
}

fn parse_source(path: &Path, text: &str) -> Result<Value, LoadError> {
    if is_toml(path) {
        toml::from_str::<Value>(text).map_err(|e| LoadError::Compile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    } else {
        serde_json::from_str(text).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Exact file (when it already carries a known extension), then `.toml`,
/// `.json`, `/index.toml`, `/index.json`.
fn resolve_source(base: &Path, specifier: &str) -> Option<PathBuf> {
    let target = base.join(specifier);
    let has_known_extension = target
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.contains(&e));

    let mut candidates = Vec::with_capacity(5);
    if has_known_extension {
        candidates.push(target.clone());
    }
    for ext in SOURCE_EXTENSIONS {
        let mut with_ext = target.clone().into_os_string();
        with_ext.push(".");
        with_ext.push(ext);
        candidates.push(PathBuf::from(with_ext));
    }
    for ext in SOURCE_EXTENSIONS {
        candidates.push(target.join(format!("index.{ext}")));
    }

    candidates
        .into_iter()
        .find(|c| c.is_file())
        .and_then(|c| c.canonicalize().ok())
}

fn sidecar_path(output: &Path) -> PathBuf {
    let mut path = output.to_path_buf().into_os_string();
    path.push(".sha256");
    PathBuf::from(path)
}

// First line is the source hash, then one dependency source path per line.
fn render_sidecar(hash: &str, dependencies: &[PathBuf]) -> String {
    let mut out = String::from(hash);
    for dependency in dependencies {
        out.push('\n');
        out.push_str(&dependency.to_string_lossy());
    }
    out.push('\n');
    out
}

fn read_sidecar(path: &Path, expected_hash: &str) -> Option<Vec<PathBuf>> {
    let text = fs::read_to_string(path).ok()?;
    let mut lines = text.lines();
    if lines.next()? != expected_hash {
        return None;
    }
    Some(lines.filter(|l| !l.is_empty()).map(PathBuf::from).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let p = root.join(rel);
        fs::create_dir_all(p.parent().unwrap()).unwrap();
        fs::write(&p, text).unwrap();
        p
    }

    #[test]
    fn toml_source_becomes_json_module() {
        let src = tempfile::tempdir().unwrap();
        let tool = write(
            src.path(),
            "greet/tool.toml",
            "name = \"greet\"\nexecute = \"echo\"\n[inputSchema]\ntype = \"object\"\n",
        );
        let mut compiler = Compiler::new(None).unwrap();
        let compiled = compiler.compile(&tool).unwrap();

        assert!(compiled.output.starts_with(compiler.out_root()));
        assert!(compiled.output.ends_with("greet/tool.toml.json"));
        let value: Value = serde_json::from_str(&compiled.text).unwrap();
        assert_eq!(value["name"], "greet");
        assert_eq!(value["inputSchema"]["type"], "object");
    }

    #[test]
    fn output_path_is_deterministic() {
        let compiler = Compiler::new(None).unwrap();
        let a = compiler.output_path(Path::new("/srv/components/tools/x/tool.toml"));
        let b = compiler.output_path(Path::new("/srv/components/tools/x/tool.toml"));
        assert_eq!(a, b);
        assert_eq!(a, compiler.out_root().join("srv/components/tools/x/tool.toml.json"));
    }

    #[test]
    fn separate_compilers_use_separate_trees() {
        let a = Compiler::new(None).unwrap();
        let b = Compiler::new(None).unwrap();
        assert_ne!(a.out_root(), b.out_root());
    }

    #[test]
    fn relative_imports_are_compiled_and_rewritten() {
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "shared/schema.toml", "type = \"object\"\n");
        let tool = write(
            src.path(),
            "tools/a/tool.toml",
            "name = \"a\"\nexecute = \"echo\"\ninputSchema = { \"$ref\" = \"schema\" }\n[imports]\nschema = \"../../shared/schema\"\nhttp = \"some-package\"\n",
        );
        let mut compiler = Compiler::new(None).unwrap();
        let compiled = compiler.compile(&tool).unwrap();
        let value: Value = serde_json::from_str(&compiled.text).unwrap();

        let rewritten = PathBuf::from(value["imports"]["schema"].as_str().unwrap());
        assert!(rewritten.is_absolute());
        assert!(rewritten.is_file());
        assert_eq!(value["imports"]["http"], "some-package");
        let dep: Value = serde_json::from_str(&fs::read_to_string(rewritten).unwrap()).unwrap();
        assert_eq!(dep, json!({"type": "object"}));
    }

    #[test]
    fn resolution_prefers_toml_then_json_then_index() {
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "lib/a.toml", "v = 1\n");
        write(src.path(), "lib/a.json", "{\"v\": 2}");
        write(src.path(), "lib/b/index.json", "{\"v\": 3}");
        let base = src.path().join("lib");
        assert!(resolve_source(&base, "./a").unwrap().ends_with("lib/a.toml"));
        assert!(resolve_source(&base, "./a.json").unwrap().ends_with("lib/a.json"));
        assert!(resolve_source(&base, "./b").unwrap().ends_with("lib/b/index.json"));
        assert!(resolve_source(&base, "./c").is_none());
    }

    #[test]
    fn unresolved_relative_import_names_both_sides() {
        let src = tempfile::tempdir().unwrap();
        let tool = write(src.path(), "tool.toml", "name = \"a\"\n[imports]\nx = \"./missing\"\n");
        let mut compiler = Compiler::new(None).unwrap();
        let err = compiler.compile(&tool).unwrap_err();
        assert!(matches!(err, LoadError::UnresolvedImport { ref specifier, .. } if specifier == "./missing"));
        assert!(err.to_string().contains("tool.toml"));
    }

    #[test]
    fn broken_toml_is_a_compile_error() {
        let src = tempfile::tempdir().unwrap();
        let tool = write(src.path(), "tool.toml", "name = \n");
        let mut compiler = Compiler::new(None).unwrap();
        assert!(matches!(compiler.compile(&tool), Err(LoadError::Compile { .. })));
    }

    #[test]
    fn import_cycles_compile_each_member_once() {
        let src = tempfile::tempdir().unwrap();
        let a = write(src.path(), "a.toml", "[imports]\nb = \"./b\"\n");
        write(src.path(), "b.toml", "[imports]\na = \"./a\"\n");
        let mut compiler = Compiler::new(None).unwrap();
        let compiled = compiler.compile(&a).unwrap();
        assert!(compiled.output.is_file());
        let b_out = compiler.output_path(&src.path().join("b.toml").canonicalize().unwrap());
        assert!(b_out.is_file());
    }

    #[test]
    fn a_pass_compiles_each_file_once_until_reset() {
        let src = tempfile::tempdir().unwrap();
        let tool = write(src.path(), "tool.toml", "v = 1\n");
        let mut compiler = Compiler::new(None).unwrap();
        compiler.compile(&tool).unwrap();

        fs::write(&tool, "v = 2\n").unwrap();
        let again: Value = serde_json::from_str(&compiler.compile(&tool).unwrap().text).unwrap();
        assert_eq!(again["v"], 1);

        compiler.reset();
        let fresh: Value = serde_json::from_str(&compiler.compile(&tool).unwrap().text).unwrap();
        assert_eq!(fresh["v"], 2);
    }

    #[test]
    fn failed_dependencies_fail_every_importer() {
        let src = tempfile::tempdir().unwrap();
        write(src.path(), "shared/schema.toml", "type = \n");
        let import = "name = \"t\"\n[imports]\nschema = \"../../shared/schema\"\n";
        let a = write(src.path(), "tools/a/tool.toml", import);
        let b = write(src.path(), "tools/b/tool.toml", import);
        let mut compiler = Compiler::new(None).unwrap();

        for tool in [&a, &b] {
            let err = compiler.compile(tool).unwrap_err();
            assert!(matches!(err, LoadError::Compile { .. }), "{err}");
            assert!(err.path().ends_with("shared/schema.toml"), "{err}");
        }
    }

    #[test]
    fn broken_source_drops_its_cached_artifact() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let schema = write(src.path(), "shared/schema.toml", "type = \"object\"\n");
        let tool = write(
            src.path(),
            "tools/a/tool.toml",
            "name = \"a\"\n[imports]\nschema = \"../../shared/schema\"\n",
        );
        let tool_out = {
            let mut compiler = Compiler::new(Some(cache.path())).unwrap();
            compiler.compile(&tool).unwrap().output
        };

        fs::write(&schema, "type = \n").unwrap();
        let mut compiler = Compiler::new(Some(cache.path())).unwrap();
        assert!(compiler.compile(&tool).is_err());
        let schema_out = compiler.output_path(&schema.canonicalize().unwrap());
        assert!(!schema_out.exists());
        assert!(!sidecar_path(&schema_out).exists());
        assert!(!tool_out.exists());
    }

    #[test]
    fn persistent_cache_skips_unchanged_sources() {
        let src = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let tool = write(src.path(), "tool.toml", "v = 1\n");

        let output = {
            let mut compiler = Compiler::new(Some(cache.path())).unwrap();
            compiler.compile(&tool).unwrap().output
        };
        assert!(cache.path().canonicalize().unwrap().exists());
        // Tamper with the artifact: a cache hit must serve it untouched.
        fs::write(&output, "{\"cached\": true}").unwrap();

        let mut compiler = Compiler::new(Some(cache.path())).unwrap();
        let hit: Value = serde_json::from_str(&compiler.compile(&tool).unwrap().text).unwrap();
        assert_eq!(hit, json!({"cached": true}));

        fs::write(&tool, "v = 3\n").unwrap();
        compiler.reset();
        let miss: Value = serde_json::from_str(&compiler.compile(&tool).unwrap().text).unwrap();
        assert_eq!(miss["v"], 3);
    }
}
