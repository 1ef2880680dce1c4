//! JSON Schema validation for workflow definitions.
//!
//! Graph specifications are checked against `schema/workflow.schema.json`
//! before typed parsing, so structural mistakes are reported with their
//! location instead of as a serde error.

use std::sync::OnceLock;
use thiserror::Error;

/// Embedded workflow schema (loaded at compile time).
const WORKFLOW_SCHEMA_JSON: &str = include_str!("../../schema/workflow.schema.json");

/// Compiled JSON Schema validator (initialized once, reused).
static COMPILED_SCHEMA: OnceLock<Result<jsonschema::Validator, String>> = OnceLock::new();

/// Errors from schema loading.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Failed to load schema: {0}")]
    LoadError(String),
}

fn get_validator() -> Result<&'static jsonschema::Validator, SchemaError> {
    let result = COMPILED_SCHEMA.get_or_init(|| {
        let schema_value: serde_json::Value = serde_json::from_str(WORKFLOW_SCHEMA_JSON)
            .map_err(|e| format!("Invalid schema JSON: {}", e))?;

        jsonschema::options()
            .build(&schema_value)
            .map_err(|e| format!("Failed to compile schema: {}", e))
    });

    result
        .as_ref()
        .map_err(|e| SchemaError::LoadError(e.clone()))
}

/// Validate a workflow definition value against the schema.
///
/// Returns every violation, each formatted as `<message> at <path>`.
pub fn validate_workflow_schema(workflow_json: &serde_json::Value) -> Result<(), Vec<String>> {
    let validator = get_validator().map_err(|e| vec![e.to_string()])?;

    let errors: Vec<String> = validator
        .iter_errors(workflow_json)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_minimal_workflow_passes() {
        let value = json!({
            "start_node": "a",
            "nodes": [{ "id": "a", "type": "ResultAggregatorNode" }]
        });
        assert!(validate_workflow_schema(&value).is_ok());
    }

    #[test]
    fn test_missing_start_node_field_fails() {
        let value = json!({ "nodes": [{ "id": "a", "type": "X" }] });
        assert!(validate_workflow_schema(&value).is_err());
    }

    #[test]
    fn test_empty_node_list_fails() {
        let value = json!({ "start_node": "a", "nodes": [] });
        assert!(validate_workflow_schema(&value).is_err());
    }

    #[test]
    fn test_non_string_route_target_fails() {
        let value = json!({
            "start_node": "a",
            "nodes": [{ "id": "a", "type": "X", "routes": { "default": 3 } }]
        });
        let errors = validate_workflow_schema(&value).unwrap_err();
        assert!(errors.iter().any(|e| e.contains("/nodes/0/routes/default")));
    }

    #[test]
    fn test_unknown_node_field_fails() {
        let value = json!({
            "start_node": "a",
            "nodes": [{ "id": "a", "type": "X", "next": "b" }]
        });
        assert!(validate_workflow_schema(&value).is_err());
    }

    #[test]
    fn test_params_must_be_object() {
        let value = json!({
            "start_node": "a",
            "nodes": [{ "id": "a", "type": "X", "params": ["not", "an", "object"] }]
        });
        assert!(validate_workflow_schema(&value).is_err());
    }
}
