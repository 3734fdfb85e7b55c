use std::sync::Arc;

use serde_json::Value;

use crate::core::definition::ToolDefinition;
use crate::core::error::ValidationError;

/// Structural problems of one tool. `index` labels tools without a usable name.
pub fn tool_problems(tool: &ToolDefinition, index: usize) -> Vec<String> {
    let mut problems = Vec::new();
    let label = if tool.name.trim().is_empty() {
        problems.push(format!("tool #{index}: name must be a non-empty string"));
        format!("tool #{index}")
    } else {
        format!("tool '{}'", tool.name)
    };
    if tool.execute.is_none() {
        problems.push(format!("{label}: execute must be a callable"));
    }
    if let Some(schema) = &tool.input_schema {
        if !schema.is_object() {
            problems.push(format!("{label}: inputSchema must be an object"));
        }
    }
    problems
}

/// Check every tool and report all problems at once.
pub fn validate_tools(tools: &[Arc<ToolDefinition>]) -> Result<(), ValidationError> {
    let messages: Vec<String> = tools
        .iter()
        .enumerate()
        .flat_map(|(i, tool)| tool_problems(tool, i))
        .collect();
    if messages.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { messages })
    }
}

/// One message per schema field lacking a non-empty `description`. Accepts a
/// JSON Schema object (`properties`) or a bare map of field name -> field schema.
pub fn validate_schema_descriptions(schema: &Value) -> Vec<String> {
    let mut missing = Vec::new();
    if let Some(fields) = field_map(schema) {
        walk_fields(fields, "", &mut missing);
    }
    missing
}

fn field_map(schema: &Value) -> Option<&serde_json::Map<String, Value>> {
    let obj = schema.as_object()?;
    match obj.get("properties") {
        Some(props) => props.as_object(),
        None if !obj.contains_key("type") => Some(obj),
        None => None,
    }
}

fn walk_fields(fields: &serde_json::Map<String, Value>, prefix: &str, missing: &mut Vec<String>) {
    for (name, field) in fields {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        let described = field
            .get("description")
            .and_then(Value::as_str)
            .is_some_and(|d| !d.trim().is_empty());
        if !described {
            missing.push(format!("field '{path}' is missing a description"));
        }
        if let Some(nested) = field.get("properties").and_then(Value::as_object) {
            walk_fields(nested, &path, missing);
        }
        if let Some(items) = field.get("items") {
            if let Some(nested) = items.get("properties").and_then(Value::as_object) {
                walk_fields(nested, &format!("{path}[]"), missing);
            }
        }
    }
}
