//! Self-description of node kinds.
//!
//! Every registered factory publishes a [`NodeSchema`]: what the node does,
//! the params it accepts and the labels it can emit. Tools that generate
//! workflow definitions read the catalog from
//! [`NodeRegistry::exposed_schemas`](super::NodeRegistry::exposed_schemas).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Broad role of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeCategory {
    /// Makes a reasoning call
    Llm,
    /// Pure computation over the input or store
    Deterministic,
    /// Only chooses the next node
    Routing,
    /// Emitted by the policy compiler, not written by hand
    Internal,
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NodeCategory::Llm => "llm",
            NodeCategory::Deterministic => "deterministic",
            NodeCategory::Routing => "routing",
            NodeCategory::Internal => "internal",
        })
    }
}

/// One entry of a node's `params`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeParameter {
    pub name: String,

    /// Type as written in definitions, e.g. `list[string]`
    #[serde(rename = "type")]
    pub param_type: String,

    pub description: String,

    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
}

impl NodeParameter {
    /// A required parameter.
    pub fn required(name: &str, param_type: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            description: generated_description(name, param_type),
            required: true,
            default: None,
        }
    }

    /// An optional parameter with its default.
    pub fn optional(name: &str, param_type: &str, default: JsonValue) -> Self {
        Self {
            required: false,
            default: Some(default),
            ..Self::required(name, param_type)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// `"input_key"` + `"string"` → `"Input key parameter (string)"`.
fn generated_description(name: &str, param_type: &str) -> String {
    let words = name.replace('_', " ");
    let mut chars = words.chars();
    let words = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    };
    format!("{} parameter ({})", words, param_type)
}

/// Catalog entry for one node kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSchema {
    /// Type tag used in definitions
    pub name: String,

    pub description: String,

    pub category: NodeCategory,

    #[serde(default)]
    pub parameters: Vec<NodeParameter>,

    /// Transition labels the node can emit
    #[serde(default)]
    pub actions: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub yaml_example: String,

    /// Whether definition generators may use this node kind
    pub parser_exposed: bool,
}

impl NodeSchema {
    /// Internal nodes start unexposed; every other category starts exposed.
    pub fn new(name: &str, description: &str, category: NodeCategory) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            category,
            parameters: Vec::new(),
            actions: Vec::new(),
            yaml_example: String::new(),
            parser_exposed: category != NodeCategory::Internal,
        }
    }

    pub fn param(mut self, parameter: NodeParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn actions(mut self, labels: &[&str]) -> Self {
        self.actions = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn yaml_example(mut self, example: &str) -> Self {
        self.yaml_example = example.to_string();
        self
    }

    pub fn exposed(mut self, parser_exposed: bool) -> Self {
        self.parser_exposed = parser_exposed;
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&NodeParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Names of the required parameters, in declared order.
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_and_exposure_defaults() {
        let schema = NodeSchema::new("ClassifierNode", "Classify input", NodeCategory::Llm)
            .param(NodeParameter::required("categories", "list[string]"))
            .param(NodeParameter::optional("model", "string", json!(null)))
            .actions(&["spam", "ham"]);

        assert!(schema.parser_exposed);
        assert_eq!(schema.actions, vec!["spam", "ham"]);
        assert_eq!(schema.required_params(), vec!["categories"]);
        assert_eq!(schema.parameter("model").unwrap().default, Some(json!(null)));

        let internal = NodeSchema::new("StepNode", "d", NodeCategory::Internal);
        assert!(!internal.parser_exposed);
        assert!(internal.exposed(true).parser_exposed);
    }

    #[test]
    fn test_generated_and_explicit_descriptions() {
        let p = NodeParameter::required("input_key", "string");
        assert_eq!(p.description, "Input key parameter (string)");

        let p = p.describe("Output to read text from");
        assert_eq!(p.description, "Output to read text from");
    }

    #[test]
    fn test_serialized_shape() {
        let schema = NodeSchema::new("GateNode", "Route on confidence", NodeCategory::Routing)
            .param(NodeParameter::optional("logic", "string", json!("any")));
        let value = serde_json::to_value(&schema).unwrap();

        assert_eq!(value["category"], json!("routing"));
        assert_eq!(value["parameters"][0]["type"], json!("string"));
        assert_eq!(value["parameters"][0]["required"], json!(false));
        assert!(value.get("yaml_example").is_none());

        let back: NodeSchema = serde_json::from_value(value).unwrap();
        assert_eq!(back, schema);
    }
}
