//! Export normalisation: every historical way of writing a component is
//! reduced to the one canonical shape per kind, then bound against the host.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::core::definition::{
    Definition, Kind, PromptArgument, PromptDefinition, PromptMessage, PromptMessages, ResourceContent,
    ResourceDefinition, ToolDefinition,
};
use crate::core::error::LoadError;
use crate::host::{ContentSpec, ExecuteSpec, Host, MessagesSpec};

/// Factories producing factories are followed this many times at most.
const MAX_FACTORY_DEPTH: usize = 4;

/// Shape of an export as found in a file, decided structurally.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportShape {
    Canonical(Map<String, Value>),
    /// A tool declaring its schema as `parameters`.
    LegacyParameters(Map<String, Value>),
    /// A prompt identified by `id` instead of `name`.
    LegacyPromptId(Map<String, Value>),
    /// Defers to a host factory: `{ factory = "...", options = ... }`.
    Factory { name: String, options: Value },
    Opaque(Value),
}

impl ExportShape {
    pub fn detect(value: Value, kind: Kind) -> Self {
        let map = match value {
            Value::Object(map) => map,
            other => return ExportShape::Opaque(other),
        };

        if let Some(Value::String(name)) = map.get("factory") {
            if map.keys().all(|k| k == "factory" || k == "options") {
                return ExportShape::Factory {
                    name: name.clone(),
                    options: map.get("options").cloned().unwrap_or(Value::Null),
                };
            }
        }

        match kind {
            Kind::Tool if map.contains_key("parameters") && !map.contains_key("inputSchema") => {
                ExportShape::LegacyParameters(map)
            }
            Kind::Prompt if map.contains_key("id") && !map.contains_key("name") => ExportShape::LegacyPromptId(map),
            _ => ExportShape::Canonical(map),
        }
    }
}

fn rename(mut map: Map<String, Value>, from: &str, to: &str) -> Map<String, Value> {
    if let Some(v) = map.remove(from) {
        map.insert(to.to_string(), v);
    }
    map
}

/// Reduce an export to its canonical map. `None` means it is not an object
/// and cannot be a component.
pub async fn canonicalize(
    value: Value,
    kind: Kind,
    host: &Host,
    path: &Path,
) -> Result<Option<Map<String, Value>>, LoadError> {
    let mut shape = ExportShape::detect(value, kind);
    let mut depth = 0;
    loop {
        shape = match shape {
            ExportShape::Canonical(map) => return Ok(Some(map)),
            ExportShape::Opaque(_) => return Ok(None),
            ExportShape::LegacyParameters(map) => ExportShape::Canonical(rename(map, "parameters", "inputSchema")),
            ExportShape::LegacyPromptId(map) => ExportShape::Canonical(rename(map, "id", "name")),
            ExportShape::Factory { name, options } => {
                depth += 1;
                if depth > MAX_FACTORY_DEPTH {
                    return Err(LoadError::Factory {
                        path: path.to_path_buf(),
                        factory: name,
                        message: format!("factories nested deeper than {MAX_FACTORY_DEPTH}"),
                    });
                }
                let factory = host.factory(&name).ok_or_else(|| LoadError::Bind {
                    path: path.to_path_buf(),
                    what: "factory",
                    name: name.clone(),
                })?;
                let produced = factory.to_definition(&options).await.map_err(|e| LoadError::Factory {
                    path: path.to_path_buf(),
                    factory: name.clone(),
                    message: e.to_string(),
                })?;
                tracing::debug!(path = %path.display(), factory = %name, "factory produced definition");
                ExportShape::detect(produced, kind)
            }
        };
    }
}

/// Structural check deciding whether a canonical map is a component of `kind`.
pub fn accepts(kind: Kind, map: &Map<String, Value>) -> bool {
    let has_string = |key: &str| map.get(key).is_some_and(Value::is_string);
    match kind {
        Kind::Tool => has_string("name") && map.contains_key("execute"),
        Kind::Resource => has_string("uri") && map.contains_key("content"),
        Kind::Prompt => has_string("name") && (map.contains_key("messages") || map.contains_key("getMessages")),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTool {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    input_schema: Option<Value>,
    #[serde(default)]
    annotations: Option<Value>,
    execute: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawResource {
    uri: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, alias = "mimeType")]
    content_type: Option<String>,
    content: Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPrompt {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    arguments: Vec<PromptArgument>,
    #[serde(default)]
    messages: Option<Vec<PromptMessage>>,
    #[serde(default)]
    get_messages: Option<Value>,
}

fn shape_error(path: &Path, kind: Kind, err: serde_json::Error) -> LoadError {
    LoadError::Shape {
        path: path.to_path_buf(),
        message: format!("not a valid {kind}: {err}"),
    }
}

/// Turn an accepted canonical map into a typed definition. Callables are
/// resolved relative to the directory of `path`.
pub fn bind(kind: Kind, map: Map<String, Value>, host: &Host, path: &Path) -> Result<Definition, LoadError> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let value = Value::Object(map);
    match kind {
        Kind::Tool => {
            let raw: RawTool = serde_json::from_value(value).map_err(|e| shape_error(path, kind, e))?;
            let execute = match serde_json::from_value::<ExecuteSpec>(raw.execute) {
                Ok(spec) => host.bind_tool(&spec, base_dir),
                Err(_) => None,
            };
            if execute.is_none() {
                tracing::warn!(path = %path.display(), tool = %raw.name, "execute does not resolve to a handler");
            }
            Ok(Definition::Tool(ToolDefinition {
                name: raw.name,
                description: raw.description.unwrap_or_default(),
                input_schema: raw.input_schema,
                annotations: raw.annotations,
                execute,
                source: Some(path.to_path_buf()),
            }))
        }
        Kind::Resource => {
            let raw: RawResource = serde_json::from_value(value).map_err(|e| shape_error(path, kind, e))?;
            let content = match raw.content {
                Value::String(text) => ResourceContent::Text(text),
                other => {
                    let spec: ContentSpec = serde_json::from_value(other).map_err(|e| shape_error(path, kind, e))?;
                    let producer = host.bind_content(&spec, base_dir).ok_or_else(|| LoadError::Bind {
                        path: path.to_path_buf(),
                        what: "content producer",
                        name: match &spec {
                            ContentSpec::Handler { handler } => handler.clone(),
                            _ => raw.uri.clone(),
                        },
                    })?;
                    ResourceContent::Producer(producer)
                }
            };
            Ok(Definition::Resource(ResourceDefinition {
                name: raw.name.unwrap_or_else(|| raw.uri.clone()),
                uri: raw.uri,
                description: raw.description,
                content_type: raw.content_type,
                content,
                source: Some(path.to_path_buf()),
            }))
        }
        Kind::Prompt => {
            let raw: RawPrompt = serde_json::from_value(value).map_err(|e| shape_error(path, kind, e))?;
            let messages = match (raw.get_messages, raw.messages) {
                (Some(spec), _) => {
                    let spec: MessagesSpec = serde_json::from_value(spec).map_err(|e| shape_error(path, kind, e))?;
                    let producer = host.bind_messages(&spec).ok_or_else(|| LoadError::Bind {
                        path: path.to_path_buf(),
                        what: "message producer",
                        name: match &spec {
                            MessagesSpec::Named(n) | MessagesSpec::Handler { handler: n } => n.clone(),
                        },
                    })?;
                    PromptMessages::Producer(producer)
                }
                (None, Some(templates)) => PromptMessages::Templates(templates),
                (None, None) => {
                    return Err(LoadError::Shape {
                        path: path.to_path_buf(),
                        message: format!("prompt '{}' has no messages", raw.name),
                    })
                }
            };
            Ok(Definition::Prompt(PromptDefinition {
                name: raw.name,
                description: raw.description,
                arguments: raw.arguments,
                messages,
                source: Some(path.to_path_buf()),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::callable::FnFactory;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn detects_each_shape() {
        assert!(matches!(ExportShape::detect(json!(3), Kind::Tool), ExportShape::Opaque(_)));
        assert!(matches!(
            ExportShape::detect(json!({"name": "a", "parameters": {}, "execute": "echo"}), Kind::Tool),
            ExportShape::LegacyParameters(_)
        ));
        assert!(matches!(
            ExportShape::detect(json!({"name": "a", "parameters": {}, "inputSchema": {}}), Kind::Tool),
            ExportShape::Canonical(_)
        ));
        assert!(matches!(
            ExportShape::detect(json!({"id": "p", "messages": []}), Kind::Prompt),
            ExportShape::LegacyPromptId(_)
        ));
        // `id` only means something for prompts.
        assert!(matches!(
            ExportShape::detect(json!({"id": "p", "messages": []}), Kind::Tool),
            ExportShape::Canonical(_)
        ));
        assert_eq!(
            ExportShape::detect(json!({"factory": "weather", "options": {"city": "Cork"}}), Kind::Tool),
            ExportShape::Factory { name: "weather".into(), options: json!({"city": "Cork"}) }
        );
    }

    #[tokio::test]
    async fn legacy_parameters_become_input_schema() {
        let host = Host::new();
        let map = canonicalize(
            json!({"name": "a", "parameters": {"type": "object"}, "execute": "echo"}),
            Kind::Tool,
            &host,
            Path::new("/x/tool.json"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(map.get("inputSchema"), Some(&json!({"type": "object"})));
        assert!(!map.contains_key("parameters"));
    }

    #[tokio::test]
    async fn factory_output_is_normalised_again() {
        let host = Host::new().with_factory(
            "legacy",
            FnFactory::new(|options: Value| async move {
                Ok(json!({"id": options["id"].clone(), "messages": [{"role": "user", "content": "hi"}]}))
            }),
        );
        let map = canonicalize(
            json!({"factory": "legacy", "options": {"id": "greeting"}}),
            Kind::Prompt,
            &host,
            Path::new("/x/prompt.json"),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(map["name"], "greeting");
        assert!(accepts(Kind::Prompt, &map));
    }

    #[tokio::test]
    async fn factory_failure_names_the_file() {
        let host = Host::new().with_factory(
            "broken",
            FnFactory::new(|_: Value| async move { Err(anyhow::anyhow!("upstream down")) }),
        );
        let err = canonicalize(json!({"factory": "broken"}), Kind::Tool, &host, Path::new("/x/tool.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::Factory { .. }));
        assert!(err.to_string().contains("/x/tool.json"));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn kind_predicates() {
        assert!(accepts(Kind::Tool, &obj(json!({"name": "a", "execute": "echo"}))));
        assert!(!accepts(Kind::Tool, &obj(json!({"name": 3, "execute": "echo"}))));
        assert!(!accepts(Kind::Tool, &obj(json!({"name": "a"}))));
        assert!(accepts(Kind::Resource, &obj(json!({"uri": "info://x", "content": "hi"}))));
        assert!(!accepts(Kind::Resource, &obj(json!({"name": "x", "content": "hi"}))));
        assert!(accepts(Kind::Prompt, &obj(json!({"name": "p", "getMessages": "gen"}))));
        assert!(!accepts(Kind::Prompt, &obj(json!({"name": "p"}))));
    }

    #[tokio::test]
    async fn binds_a_tool_with_an_unknown_handler_as_uncallable() {
        let def = bind(
            Kind::Tool,
            obj(json!({"name": "a", "execute": "does-not-exist"})),
            &Host::with_builtins(),
            Path::new("/x/tool.json"),
        )
        .unwrap();
        match def {
            Definition::Tool(t) => {
                assert!(t.execute.is_none());
                assert_eq!(t.description, "");
            }
            other => panic!("expected tool, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resource_defaults_name_to_uri_and_accepts_mime_type() {
        let def = bind(
            Kind::Resource,
            obj(json!({"uri": "info://about", "mimeType": "text/plain", "content": "hello"})),
            &Host::new(),
            Path::new("/x/resource.json"),
        )
        .unwrap();
        let Definition::Resource(r) = def else { panic!("expected resource") };
        assert_eq!(r.name, "info://about");
        assert_eq!(r.content_type.as_deref(), Some("text/plain"));
        assert_eq!(r.read().await.unwrap(), "hello");
    }

    #[test]
    fn unknown_content_producer_is_a_bind_error() {
        let err = bind(
            Kind::Resource,
            obj(json!({"uri": "info://x", "content": {"handler": "nope"}})),
            &Host::new(),
            Path::new("/x/resource.json"),
        )
        .unwrap_err();
        assert!(matches!(err, LoadError::Bind { what: "content producer", ref name, .. } if name == "nope"));
    }

    #[test]
    fn get_messages_wins_over_templates() {
        use crate::core::callable::FnMessageProducer;
        let host = Host::new().with_message_producer(
            "gen",
            FnMessageProducer::new(|_| async move { Ok(vec![]) }),
        );
        let def = bind(
            Kind::Prompt,
            obj(json!({"name": "p", "getMessages": "gen", "messages": [{"role": "user", "content": "x"}]})),
            &host,
            Path::new("/x/prompt.json"),
        )
        .unwrap();
        let Definition::Prompt(p) = def else { panic!("expected prompt") };
        assert!(matches!(p.messages, PromptMessages::Producer(_)));
    }
}
