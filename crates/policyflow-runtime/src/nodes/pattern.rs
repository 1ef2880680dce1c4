//! Deterministic regex screening node.
//!
//! Runs a `PatternSet` over the input text (or a string output recorded
//! by an earlier node) and routes on the combined match. No reasoning call
//! is made, so this node is often placed first to skip LLM work.

use async_trait::async_trait;
use policyflow_core::{LogicOperator, NodeConfig, PatternOutcome, PatternSet, SharedStore};
use serde::Deserialize;

use super::registry::{parse_params, NodeFactory};
use super::{
    labels, Node, NodeCategory, NodeParameter, NodeResult, NodeSchema, NodeServices, Step,
    Transition,
};
use crate::graph::BuildError;

const NODE_TYPE: &str = "PatternMatchNode";

/// Routes on whether a pattern set matches.
pub struct PatternMatchNode {
    id: String,
    patterns: PatternSet,
    input_key: String,
    output_key: Option<String>,
}

impl PatternMatchNode {
    pub fn new(id: impl Into<String>, patterns: PatternSet) -> Self {
        Self {
            id: id.into(),
            patterns,
            input_key: default_input_key(),
            output_key: None,
        }
    }

    /// Read text from a recorded output instead of the run input.
    pub fn with_input_key(mut self, key: impl Into<String>) -> Self {
        self.input_key = key.into();
        self
    }

    /// Record the match outcome under `key`.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }
}

#[async_trait]
impl Node for PatternMatchNode {
    type Context = String;
    type Outcome = PatternOutcome;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        NODE_TYPE
    }

    fn prepare(&self, store: &SharedStore) -> NodeResult<Self::Context> {
        Ok(store.text(&self.input_key)?.to_string())
    }

    async fn execute(&self, text: &Self::Context) -> NodeResult<Self::Outcome> {
        Ok(self.patterns.evaluate(text))
    }

    fn finalize(
        &self,
        store: &mut SharedStore,
        _text: Self::Context,
        outcome: Self::Outcome,
    ) -> NodeResult<Transition> {
        tracing::debug!(
            node = %self.id,
            matched = outcome.matched,
            hits = outcome.hits.len(),
            "Pattern screening done"
        );

        let label = if outcome.matched {
            labels::MATCHED
        } else {
            labels::NOT_MATCHED
        };

        if let Some(key) = &self.output_key {
            store.record_output(key.clone(), serde_json::to_value(&outcome)?)?;
        }

        Ok(Transition::new(label))
    }
}

fn default_input_key() -> String {
    "input_text".to_string()
}

fn default_logic() -> LogicOperator {
    LogicOperator::Any
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PatternParams {
    patterns: Vec<String>,
    #[serde(default = "default_logic")]
    logic: LogicOperator,
    #[serde(default)]
    case_insensitive: bool,
    #[serde(default = "default_input_key")]
    input_key: String,
    #[serde(default)]
    output_key: Option<String>,
}

/// Factory for `PatternMatchNode`.
///
/// Params: `patterns` (regexes or `builtin:<name>`), optional `logic`
/// (default `any`), `case_insensitive`, `input_key`, `output_key`.
pub struct PatternMatchNodeFactory;

impl NodeFactory for PatternMatchNodeFactory {
    fn node_type(&self) -> &'static str {
        NODE_TYPE
    }

    fn labels(&self) -> &'static [&'static str] {
        &[labels::MATCHED, labels::NOT_MATCHED]
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new(
            NODE_TYPE,
            "Match regex patterns against text without a reasoning call",
            NodeCategory::Deterministic,
        )
        .param(
            NodeParameter::required("patterns", "list[string]")
                .describe("Regexes, or builtin:<name> for email, phone, ssn, credit_card, url, api_key"),
        )
        .param(
            NodeParameter::optional("logic", "string", serde_json::json!("any"))
                .describe("How pattern hits combine: any or all"),
        )
        .param(NodeParameter::optional("case_insensitive", "bool", serde_json::json!(false)))
        .param(
            NodeParameter::optional("input_key", "string", serde_json::json!("input_text"))
                .describe("Output to read text from; input_text is the run input"),
        )
        .param(
            NodeParameter::optional("output_key", "string", serde_json::Value::Null)
                .describe("Output to record the match outcome under"),
        )
        .actions(self.labels())
        .yaml_example(
            "- id: screen\n  type: PatternMatchNode\n  params:\n    patterns: [\"builtin:email\"]\n  routes:\n    matched: review\n    not_matched: evaluate\n",
        )
    }

    fn create(
        &self,
        config: &NodeConfig,
        _services: &NodeServices,
    ) -> Result<Box<dyn Step>, BuildError> {
        let params: PatternParams = parse_params(config)?;
        let patterns = PatternSet::new(params.patterns.as_slice(), params.logic, params.case_insensitive)
            .map_err(|e| BuildError::InvalidParams {
                node: config.id.clone(),
                reason: e.to_string(),
            })?;

        let mut node = PatternMatchNode::new(&config.id, patterns).with_input_key(params.input_key);
        if let Some(key) = params.output_key {
            node = node.with_output_key(key);
        }
        Ok(Box::new(node))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::services;
    use crate::nodes::NodeError;
    use crate::providers::mock::MockProvider;
    use policyflow_core::{PolicyContext, StoreError};
    use serde_json::json;
    use std::sync::Arc;

    fn build(params: serde_json::Value) -> Result<Box<dyn Step>, BuildError> {
        let services = services(Arc::new(MockProvider::always("")));
        PatternMatchNodeFactory.create(&NodeConfig::new("screen", NODE_TYPE, params), &services)
    }

    #[tokio::test]
    async fn test_matched_and_output_recorded() {
        let step = build(json!({
            "patterns": ["guaranteed returns", "builtin:email"],
            "case_insensitive": true,
            "output_key": "screen_hits"
        }))
        .unwrap();
        let mut store = SharedStore::new(
            "GUARANTEED RETURNS, contact sales@example.com",
            PolicyContext::default(),
        );

        let label = step.run(&mut store).await.unwrap();

        assert_eq!(label.as_str(), labels::MATCHED);
        let output = store.output("screen_hits").unwrap();
        assert_eq!(output["matched"], json!(true));
        assert_eq!(output["matched_patterns"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_all_logic_requires_every_pattern() {
        let step = build(json!({ "patterns": ["fund", "guarantee"], "logic": "all" })).unwrap();
        let mut store = SharedStore::new("Our fund is great", PolicyContext::default());

        let label = step.run(&mut store).await.unwrap();
        assert_eq!(label.as_str(), labels::NOT_MATCHED);
        assert!(store.output("screen").is_none());
    }

    #[tokio::test]
    async fn test_missing_input_key_fails() {
        let step = build(json!({ "patterns": ["x"], "input_key": "summary" })).unwrap();
        let mut store = SharedStore::new("text", PolicyContext::default());

        let err = step.run(&mut store).await.unwrap_err();
        assert!(matches!(err, NodeError::Store(StoreError::Missing(ref k)) if k == "summary"));
    }

    #[test]
    fn test_bad_patterns_rejected_at_build() {
        assert!(matches!(
            build(json!({ "patterns": ["(unclosed"] })),
            Err(BuildError::InvalidParams { .. })
        ));
        assert!(matches!(
            build(json!({ "patterns": ["builtin:passport"] })),
            Err(BuildError::InvalidParams { .. })
        ));
        assert!(matches!(
            build(json!({ "patterns": [] })),
            Err(BuildError::InvalidParams { .. })
        ));
        assert!(matches!(
            build(json!({ "patterns": ["x"], "regex": true })),
            Err(BuildError::InvalidParams { .. })
        ));
    }
}
