//! Policy and workflow definitions parsed from YAML/JSON.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use super::schema::validate_workflow_schema;
use crate::types::{Criterion, LogicOperator, PolicyContext};

/// Errors that can occur when loading definitions.
#[derive(Error, Debug)]
pub enum DefinitionError {
    #[error("Failed to read definition file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Workflow schema validation failed: {}", .0.join("; "))]
    SchemaError(Vec<String>),

    #[error("Definition validation failed: {0}")]
    ValidationError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// One node in a declarative workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeConfig {
    /// Unique within the workflow
    pub id: String,

    /// Registered node type tag (e.g. "PatternMatchNode")
    #[serde(rename = "type")]
    pub node_type: String,

    /// Node-specific constructor parameters
    #[serde(default = "empty_params")]
    pub params: JsonValue,

    /// Transition label -> next node id
    #[serde(default)]
    pub routes: BTreeMap<String, String>,
}

fn empty_params() -> JsonValue {
    JsonValue::Object(Default::default())
}

impl NodeConfig {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, params: JsonValue) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            params,
            routes: BTreeMap::new(),
        }
    }

    /// Add a route from `label` to `target`.
    pub fn route(mut self, label: impl Into<String>, target: impl Into<String>) -> Self {
        self.routes.insert(label.into(), target.into());
        self
    }
}

/// A node graph: node list plus the id to start from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowDefinition {
    pub nodes: Vec<NodeConfig>,
    pub start_node: String,
}

impl WorkflowDefinition {
    /// Parse from YAML, validating against the workflow schema first.
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    /// Parse from JSON, validating against the workflow schema first.
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    /// Validate an already-decoded value and convert it.
    pub fn from_value(value: JsonValue) -> Result<Self, DefinitionError> {
        validate_workflow_schema(&value).map_err(DefinitionError::SchemaError)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn node(&self, id: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// A policy decomposed into criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedPolicy {
    pub title: String,
    pub description: String,
    pub criteria: Vec<Criterion>,

    /// How top-level criteria combine
    #[serde(default)]
    pub logic: LogicOperator,

    /// Original policy text
    #[serde(default)]
    pub raw_text: String,
}

impl ParsedPolicy {
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let policy: ParsedPolicy = serde_yaml::from_str(yaml)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let policy: ParsedPolicy = serde_json::from_str(json)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn context(&self) -> PolicyContext {
        PolicyContext::new(&self.title, &self.description)
    }

    fn validate(&self) -> Result<(), DefinitionError> {
        if self.title.trim().is_empty() {
            return Err(DefinitionError::MissingField("title".to_string()));
        }

        let mut seen = HashSet::new();
        for criterion in &self.criteria {
            if !seen.insert(criterion.id.as_str()) {
                return Err(DefinitionError::ValidationError(format!(
                    "Duplicate criterion ID: {}",
                    criterion.id
                )));
            }

            let mut sub_seen = HashSet::new();
            for sub in &criterion.sub_criteria {
                if !sub_seen.insert(sub.id.as_str()) {
                    return Err(DefinitionError::ValidationError(format!(
                        "Duplicate sub-criterion ID: {}.{}",
                        criterion.id, sub.id
                    )));
                }
            }
        }

        Ok(())
    }
}

/// A policy expressed directly as a workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParsedWorkflowPolicy {
    pub title: String,
    pub description: String,
    pub workflow: WorkflowDefinition,

    #[serde(default)]
    pub raw_text: String,
}

impl ParsedWorkflowPolicy {
    /// Parse from YAML. The `workflow` section is schema-validated before
    /// typed parsing.
    pub fn from_yaml(yaml: &str) -> Result<Self, DefinitionError> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        Self::from_value(value)
    }

    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        let value: JsonValue = serde_json::from_str(json)?;
        Self::from_value(value)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    fn from_value(value: JsonValue) -> Result<Self, DefinitionError> {
        let workflow = value
            .get("workflow")
            .ok_or_else(|| DefinitionError::MissingField("workflow".to_string()))?;
        validate_workflow_schema(workflow).map_err(DefinitionError::SchemaError)?;

        Ok(serde_json::from_value(value)?)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    pub fn context(&self) -> PolicyContext {
        PolicyContext::new(&self.title, &self.description)
    }
}
