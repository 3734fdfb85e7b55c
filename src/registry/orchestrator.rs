use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::autoload::discovery::{discover, FileMatcher};
use crate::autoload::validate::{tool_problems, validate_schema_descriptions, validate_tools};
use crate::autoload::{AutoloadConfig, Compiler, Importer, ValidationPolicy};
use crate::core::definition::{Definition, Kind, PromptDefinition, ResourceDefinition, ToolDefinition};
use crate::host::Host;
use crate::registry::storage::{ComponentStore, RegistryStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Outcome of one load pass. Problems with individual files never abort the
/// pass; they end up here.
#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub already_loaded: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl LoadReport {
    fn begin() -> Self {
        let now = Utc::now();
        Self {
            tools: 0,
            resources: 0,
            prompts: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            already_loaded: false,
            started_at: now,
            finished_at: now,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn count_mut(&mut self, kind: Kind) -> &mut usize {
        match kind {
            Kind::Tool => &mut self.tools,
            Kind::Resource => &mut self.resources,
            Kind::Prompt => &mut self.prompts,
        }
    }
}

/// Owns the component store and drives load passes over it.
pub struct Registry {
    store: Arc<ComponentStore>,
    host: Arc<Host>,
    state: LoadState,
}

impl Registry {
    pub fn new(host: Host) -> Self {
        Self::with_store(Arc::new(ComponentStore::new()), Arc::new(host))
    }

    pub fn with_store(store: Arc<ComponentStore>, host: Arc<Host>) -> Self {
        Self {
            store,
            host,
            state: LoadState::Unloaded,
        }
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    /// Direct access for programmatic registration alongside discovered components.
    pub fn store(&self) -> &Arc<ComponentStore> {
        &self.store
    }

    /// Discover, import and store every component under the configured
    /// directories. Runs once; later calls return a report flagged
    /// `already_loaded` and change nothing.
    pub async fn load_all(&mut self, config: &AutoloadConfig) -> LoadReport {
        let mut report = LoadReport::begin();
        if self.state == LoadState::Loaded {
            tracing::warn!("components already loaded; ignoring repeated load");
            report.already_loaded = true;
            return report;
        }
        self.state = LoadState::Loading;

        let mut compiler = match Compiler::new(config.cache_dir.as_deref()) {
            Ok(c) => Some(c),
            Err(err) => {
                let msg = format!("compiler unavailable, source files will fail to load: {err}");
                tracing::warn!(error = %err, "compiler unavailable");
                report.errors.push(msg);
                None
            }
        };
        let host = self.host.clone();
        let mut importer = Importer::new(&host, compiler.as_mut());

        for kind in Kind::ALL {
            let kind_config = config.kind(kind);
            if !kind_config.enabled {
                tracing::debug!(%kind, "kind disabled; skipping");
                continue;
            }
            let matcher = match FileMatcher::for_kind(kind, kind_config.pattern.as_deref()) {
                Ok(m) => m,
                Err(err) => {
                    report.errors.push(format!("invalid {kind} pattern: {err}"));
                    metrics::counter!("autoload_errors_total", "kind" => kind.as_str()).increment(1);
                    continue;
                }
            };

            let files = discover(&kind_config.directory, &matcher);
            tracing::debug!(%kind, directory = %kind_config.directory.display(), files = files.len(), "discovered");

            let mut definitions = Vec::new();
            for file in &files {
                match importer.load(file, kind).await {
                    Ok(Some(definition)) => {
                        tracing::debug!(%kind, key = definition.key(), path = %file.display(), "loaded");
                        definitions.push(definition);
                    }
                    Ok(None) => {
                        tracing::debug!(%kind, path = %file.display(), "not a component; skipped");
                    }
                    Err(err) => {
                        tracing::warn!(%kind, error = %err, "failed to load component");
                        metrics::counter!("autoload_errors_total", "kind" => kind.as_str()).increment(1);
                        report.errors.push(err.to_string());
                    }
                }
            }

            let loaded = definitions.len();
            let mut keys: Vec<String> = Vec::with_capacity(loaded);
            for definition in definitions {
                let key = definition.key().to_string();
                if self.store.add(definition) {
                    tracing::warn!(%kind, %key, "duplicate key; later definition replaced earlier one");
                }
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            *report.count_mut(kind) = loaded;
            metrics::counter!("autoload_components_loaded_total", "kind" => kind.as_str()).increment(loaded as u64);

            if kind == Kind::Tool {
                // Only what this pass loaded; programmatic registrations are not ours to judge.
                let tools: Vec<Arc<ToolDefinition>> =
                    keys.iter().filter_map(|name| self.store.get_tool(name)).collect();
                self.check_tools(&tools, config.validation, &mut report);
            }
        }

        let stats = self.store.stats();
        metrics::gauge!("registry_components", "kind" => "tool").set(stats.tools as f64);
        metrics::gauge!("registry_components", "kind" => "resource").set(stats.resources as f64);
        metrics::gauge!("registry_components", "kind" => "prompt").set(stats.prompts as f64);

        self.state = LoadState::Loaded;
        report.finished_at = Utc::now();
        tracing::info!(
            tools = report.tools,
            resources = report.resources,
            prompts = report.prompts,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "component load finished"
        );
        report
    }

    fn check_tools(&self, tools: &[Arc<ToolDefinition>], policy: ValidationPolicy, report: &mut LoadReport) {
        for tool in tools {
            if let Some(schema) = &tool.input_schema {
                for missing in validate_schema_descriptions(schema) {
                    report.warnings.push(format!("tool '{}': {missing}", tool.name));
                }
            }
        }

        let Err(err) = validate_tools(tools) else {
            return;
        };
        match policy {
            ValidationPolicy::Warn => {
                tracing::warn!(problems = err.messages.len(), "tool validation failed");
                report.warnings.extend(err.messages);
            }
            ValidationPolicy::Strict => {
                tracing::warn!(problems = err.messages.len(), "tool validation failed; dropping invalid tools");
                let invalid: HashSet<String> = tools
                    .iter()
                    .enumerate()
                    .filter(|(i, t)| !tool_problems(t, *i).is_empty())
                    .map(|(_, t)| t.name.clone())
                    .collect();
                for name in &invalid {
                    self.store.remove_tool(name);
                }
                report.tools = report.tools.saturating_sub(invalid.len());
                report.errors.extend(err.messages);
            }
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.store.get_tool(name)
    }

    pub fn get_resource(&self, uri: &str) -> Option<Arc<ResourceDefinition>> {
        self.store.get_resource(uri)
    }

    pub fn get_prompt(&self, name: &str) -> Option<Arc<PromptDefinition>> {
        self.store.get_prompt(name)
    }

    pub fn all_tools(&self) -> Vec<Arc<ToolDefinition>> {
        self.store.all_tools()
    }

    pub fn all_resources(&self) -> Vec<Arc<ResourceDefinition>> {
        self.store.all_resources()
    }

    pub fn all_prompts(&self) -> Vec<Arc<PromptDefinition>> {
        self.store.all_prompts()
    }

    pub fn stats(&self) -> RegistryStats {
        self.store.stats()
    }

    /// Register a definition alongside whatever was discovered.
    pub fn register(&self, definition: Definition) -> bool {
        self.store.add(definition)
    }
}
