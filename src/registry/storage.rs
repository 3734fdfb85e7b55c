use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;

use crate::core::definition::{Definition, PromptDefinition, ResourceDefinition, ToolDefinition};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
    pub total: usize,
}

#[derive(Default)]
struct Indexes {
    tools: HashMap<String, Arc<ToolDefinition>>,
    resources: HashMap<String, Arc<ResourceDefinition>>,
    prompts: HashMap<String, Arc<PromptDefinition>>,
}

/// Keyed storage for loaded components: tools and prompts by name, resources
/// by uri. All three indexes sit behind one lock so `clear` is observed
/// atomically.
#[derive(Default)]
pub struct ComponentStore {
    inner: RwLock<Indexes>,
}

fn sorted<T>(map: &HashMap<String, Arc<T>>) -> Vec<Arc<T>> {
    let mut entries: Vec<(&String, &Arc<T>)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter().map(|(_, v)| v.clone()).collect()
}

impl ComponentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert under the definition's key. Returns `true` when an existing
    /// entry was replaced.
    pub fn add(&self, definition: Definition) -> bool {
        match definition {
            Definition::Tool(t) => self.add_tool(t),
            Definition::Resource(r) => self.add_resource(r),
            Definition::Prompt(p) => self.add_prompt(p),
        }
    }

    pub fn add_tool(&self, tool: ToolDefinition) -> bool {
        self.inner.write().tools.insert(tool.name.clone(), Arc::new(tool)).is_some()
    }

    pub fn add_resource(&self, resource: ResourceDefinition) -> bool {
        self.inner
            .write()
            .resources
            .insert(resource.uri.clone(), Arc::new(resource))
            .is_some()
    }

    pub fn add_prompt(&self, prompt: PromptDefinition) -> bool {
        self.inner.write().prompts.insert(prompt.name.clone(), Arc::new(prompt)).is_some()
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.inner.read().tools.get(name).cloned()
    }

    pub fn get_resource(&self, uri: &str) -> Option<Arc<ResourceDefinition>> {
        self.inner.read().resources.get(uri).cloned()
    }

    pub fn get_prompt(&self, name: &str) -> Option<Arc<PromptDefinition>> {
        self.inner.read().prompts.get(name).cloned()
    }

    /// Snapshot sorted by name.
    pub fn all_tools(&self) -> Vec<Arc<ToolDefinition>> {
        sorted(&self.inner.read().tools)
    }

    /// Snapshot sorted by uri.
    pub fn all_resources(&self) -> Vec<Arc<ResourceDefinition>> {
        sorted(&self.inner.read().resources)
    }

    /// Snapshot sorted by name.
    pub fn all_prompts(&self) -> Vec<Arc<PromptDefinition>> {
        sorted(&self.inner.read().prompts)
    }

    pub fn remove_tool(&self, name: &str) -> bool {
        self.inner.write().tools.remove(name).is_some()
    }

    pub fn remove_resource(&self, uri: &str) -> bool {
        self.inner.write().resources.remove(uri).is_some()
    }

    pub fn remove_prompt(&self, name: &str) -> bool {
        self.inner.write().prompts.remove(name).is_some()
    }

    pub fn clear(&self) {
        let mut guard = self.inner.write();
        guard.tools.clear();
        guard.resources.clear();
        guard.prompts.clear();
    }

    pub fn stats(&self) -> RegistryStats {
        let guard = self.inner.read();
        let (tools, resources, prompts) = (guard.tools.len(), guard.resources.len(), guard.prompts.len());
        RegistryStats {
            tools,
            resources,
            prompts,
            total: tools + resources + prompts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::definition::{PromptMessage, PromptMessages, ResourceContent, Role};

    fn tool(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            input_schema: None,
            annotations: None,
            execute: None,
            source: None,
        }
    }

    fn resource(uri: &str) -> ResourceDefinition {
        ResourceDefinition {
            uri: uri.into(),
            name: uri.into(),
            description: None,
            content_type: None,
            content: ResourceContent::Text("x".into()),
            source: None,
        }
    }

    fn prompt(name: &str) -> PromptDefinition {
        PromptDefinition {
            name: name.into(),
            description: None,
            arguments: vec![],
            messages: PromptMessages::Templates(vec![PromptMessage::new(Role::User, "hi")]),
            source: None,
        }
    }

    #[test]
    fn last_write_wins() {
        let store = ComponentStore::new();
        assert!(!store.add_tool(tool("a", "first")));
        assert!(store.add_tool(tool("a", "second")));
        assert_eq!(store.get_tool("a").unwrap().description, "second");
        assert_eq!(store.stats().tools, 1);
    }

    #[test]
    fn listings_are_sorted_snapshots() {
        let store = ComponentStore::new();
        for name in ["zeta", "alpha", "mid"] {
            store.add_tool(tool(name, ""));
        }
        let names: Vec<String> = store.all_tools().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, ["alpha", "mid", "zeta"]);

        let snapshot = store.all_tools();
        store.clear();
        assert_eq!(snapshot.len(), 3);
        assert!(store.all_tools().is_empty());
    }

    #[test]
    fn stats_track_every_kind() {
        let store = ComponentStore::new();
        store.add(Definition::Tool(tool("t", "")));
        store.add(Definition::Resource(resource("info://a")));
        store.add(Definition::Resource(resource("info://b")));
        store.add(Definition::Prompt(prompt("p")));
        assert_eq!(store.stats(), RegistryStats { tools: 1, resources: 2, prompts: 1, total: 4 });

        assert!(store.remove_resource("info://a"));
        assert!(!store.remove_resource("info://a"));
        assert!(store.get_resource("info://a").is_none());
        assert_eq!(store.stats().total, 3);

        store.clear();
        assert_eq!(store.stats(), RegistryStats::default());
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let store = Arc::new(ComponentStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..50 {
                        store.add_tool(tool(&format!("t{i}-{j}"), ""));
                        let _ = store.all_tools();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.stats().tools, 400);
    }
}
