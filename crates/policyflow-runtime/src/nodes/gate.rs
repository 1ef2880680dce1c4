//! Confidence routing node.
//!
//! Classifies a confidence score against the gate and routes on the tier:
//! `high_confidence`, `needs_review` (medium) or `low_confidence`.

use async_trait::async_trait;
use policyflow_core::{ConfidenceGate, ConfidenceLevel, NodeConfig, SharedStore, StoreError};
use serde::Deserialize;

use super::registry::{parse_params, NodeFactory};
use super::{
    labels, Node, NodeCategory, NodeParameter, NodeResult, NodeSchema, NodeServices, Step,
    Transition,
};
use crate::graph::BuildError;

const NODE_TYPE: &str = "ConfidenceGateNode";

/// Routes on the confidence of one criterion or of the whole run.
pub struct ConfidenceGateNode {
    id: String,
    gate: ConfidenceGate,
    criterion_id: Option<String>,
}

impl ConfidenceGateNode {
    pub fn new(id: impl Into<String>, gate: ConfidenceGate) -> Self {
        Self {
            id: id.into(),
            gate,
            criterion_id: None,
        }
    }

    /// Gate on a single criterion's confidence.
    pub fn for_criterion(mut self, criterion_id: impl Into<String>) -> Self {
        self.criterion_id = Some(criterion_id.into());
        self
    }
}

#[async_trait]
impl Node for ConfidenceGateNode {
    type Context = f64;
    type Outcome = ConfidenceLevel;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        NODE_TYPE
    }

    /// Picks the score: the named criterion if set, else the report's
    /// overall confidence, else the minimum recorded criterion confidence.
    /// An empty store scores 0.
    fn prepare(&self, store: &SharedStore) -> NodeResult<Self::Context> {
        if let Some(id) = &self.criterion_id {
            return store
                .criterion(id)
                .map(|r| r.confidence)
                .ok_or_else(|| StoreError::Missing(format!("criterion_results.{}", id)).into());
        }

        if let Some(report) = store.report() {
            return Ok(report.overall_confidence);
        }

        Ok(store
            .criterion_results()
            .iter()
            .map(|r| r.confidence)
            .reduce(f64::min)
            .unwrap_or(0.0))
    }

    async fn execute(&self, confidence: &Self::Context) -> NodeResult<Self::Outcome> {
        Ok(self.gate.classify(*confidence))
    }

    fn finalize(
        &self,
        _store: &mut SharedStore,
        confidence: Self::Context,
        level: Self::Outcome,
    ) -> NodeResult<Transition> {
        tracing::debug!(node = %self.id, confidence, level = %level, "Confidence classified");

        Ok(Transition::new(match level {
            ConfidenceLevel::High => labels::HIGH_CONFIDENCE,
            ConfidenceLevel::Medium => labels::NEEDS_REVIEW,
            ConfidenceLevel::Low => labels::LOW_CONFIDENCE,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GateParams {
    #[serde(default)]
    criterion_id: Option<String>,

    /// Overrides the configured gate
    #[serde(default)]
    gate: Option<ConfidenceGate>,
}

/// Factory for `ConfidenceGateNode`.
pub struct ConfidenceGateNodeFactory;

impl NodeFactory for ConfidenceGateNodeFactory {
    fn node_type(&self) -> &'static str {
        NODE_TYPE
    }

    fn labels(&self) -> &'static [&'static str] {
        &[
            labels::HIGH_CONFIDENCE,
            labels::NEEDS_REVIEW,
            labels::LOW_CONFIDENCE,
        ]
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new(
            NODE_TYPE,
            "Route on a confidence score classified against the gate thresholds",
            NodeCategory::Routing,
        )
        .param(
            NodeParameter::optional("criterion_id", "string", serde_json::Value::Null)
                .describe("Criterion whose confidence is gated; defaults to the whole run"),
        )
        .param(
            NodeParameter::optional("gate", "{high: float, low: float}", serde_json::Value::Null)
                .describe("Thresholds overriding the configured gate"),
        )
        .actions(self.labels())
    }

    fn create(
        &self,
        config: &NodeConfig,
        services: &NodeServices,
    ) -> Result<Box<dyn Step>, BuildError> {
        let params: GateParams = parse_params(config)?;
        let gate = match params.gate {
            Some(gate) => {
                gate.validate().map_err(|e| BuildError::InvalidParams {
                    node: config.id.clone(),
                    reason: e.to_string(),
                })?;
                gate
            }
            None => services.config.confidence_gate,
        };

        let mut node = ConfidenceGateNode::new(&config.id, gate);
        if let Some(id) = params.criterion_id {
            node = node.for_criterion(id);
        }
        Ok(Box::new(node))
    }
}
