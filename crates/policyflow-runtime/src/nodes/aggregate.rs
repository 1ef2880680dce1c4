//! Final aggregation node: recorded criterion results → report.

use async_trait::async_trait;
use policyflow_core::{
    ConfidenceGate, CriterionResult, EvaluationReport, LogicOperator, NodeConfig,
    ReportSynthesizer, SharedStore,
};
use serde::Deserialize;

use super::registry::{parse_params, NodeFactory};
use super::{
    labels, Node, NodeCategory, NodeParameter, NodeResult, NodeSchema, NodeServices, Step,
    Transition,
};
use crate::graph::BuildError;

const NODE_TYPE: &str = "ResultAggregatorNode";

#[derive(Debug, Clone)]
pub struct AggregateContext {
    pub input_text: String,
    pub policy_title: String,
    pub results: Vec<CriterionResult>,
}

/// Combines every recorded criterion result under one logic operator and
/// records the final report.
pub struct ResultAggregatorNode {
    id: String,
    logic: LogicOperator,
    synthesizer: ReportSynthesizer,
}

impl ResultAggregatorNode {
    pub fn new(id: impl Into<String>, logic: LogicOperator, gate: ConfidenceGate) -> Self {
        Self {
            id: id.into(),
            logic,
            synthesizer: ReportSynthesizer::new(gate),
        }
    }
}

#[async_trait]
impl Node for ResultAggregatorNode {
    type Context = AggregateContext;
    type Outcome = EvaluationReport;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        NODE_TYPE
    }

    fn prepare(&self, store: &SharedStore) -> NodeResult<Self::Context> {
        Ok(AggregateContext {
            input_text: store.input_text().to_string(),
            policy_title: store.policy().title.clone(),
            results: store.criterion_results().into_iter().cloned().collect(),
        })
    }

    async fn execute(&self, context: &Self::Context) -> NodeResult<Self::Outcome> {
        Ok(self.synthesizer.synthesize(
            &context.input_text,
            &context.policy_title,
            context.results.clone(),
            self.logic,
        ))
    }

    fn finalize(
        &self,
        store: &mut SharedStore,
        _context: Self::Context,
        report: Self::Outcome,
    ) -> NodeResult<Transition> {
        tracing::debug!(
            node = %self.id,
            satisfied = report.policy_satisfied,
            confidence = report.overall_confidence,
            needs_review = report.needs_review,
            "Report synthesized"
        );
        store.record_report(report)?;
        Ok(Transition::default_route())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct AggregateParams {
    #[serde(default)]
    logic: LogicOperator,
}

/// Factory for `ResultAggregatorNode`. Params: optional `logic` (default
/// `all`). The gate comes from the workflow config.
pub struct ResultAggregatorNodeFactory;

impl NodeFactory for ResultAggregatorNodeFactory {
    fn node_type(&self) -> &'static str {
        NODE_TYPE
    }

    fn labels(&self) -> &'static [&'static str] {
        &[labels::DEFAULT]
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new(
            NODE_TYPE,
            "Combine recorded criterion results into the final report",
            NodeCategory::Deterministic,
        )
        .param(
            NodeParameter::optional("logic", "string", serde_json::json!("all"))
                .describe("How criterion verdicts combine: all or any"),
        )
        .actions(self.labels())
    }

    fn create(
        &self,
        config: &NodeConfig,
        services: &NodeServices,
    ) -> Result<Box<dyn Step>, BuildError> {
        let params: AggregateParams = parse_params(config)?;
        Ok(Box::new(ResultAggregatorNode::new(
            &config.id,
            params.logic,
            services.config.confidence_gate,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::services;
    use crate::nodes::NodeError;
    use crate::providers::mock::MockProvider;
    use policyflow_core::{ConfidenceLevel, PolicyContext};
    use serde_json::json;
    use std::sync::Arc;

    fn store_with(results: &[(&str, bool, f64)]) -> SharedStore {
        let mut store = SharedStore::new("text", PolicyContext::new("Advice Policy", ""));
        for (id, met, confidence) in results {
            store
                .record_criterion(CriterionResult {
                    criterion_id: id.to_string(),
                    criterion_name: format!("Criterion {}", id),
                    met: *met,
                    reasoning: String::new(),
                    confidence: *confidence,
                    sub_results: Vec::new(),
                })
                .unwrap();
        }
        store
    }

    fn build(params: serde_json::Value) -> Box<dyn Step> {
        let services = services(Arc::new(MockProvider::always("")));
        ResultAggregatorNodeFactory
            .create(&NodeConfig::new("aggregate", NODE_TYPE, params), &services)
            .unwrap()
    }

    #[tokio::test]
    async fn test_all_logic_report() {
        let step = build(json!({}));
        let mut store = store_with(&[("c1", true, 0.9), ("c2", false, 0.6)]);

        step.run(&mut store).await.unwrap();

        let report = store.report().unwrap();
        assert!(!report.policy_satisfied);
        assert_eq!(report.policy_title, "Advice Policy");
        assert_eq!(report.overall_confidence, 0.6);
        assert_eq!(report.confidence_level, ConfidenceLevel::Medium);
        let ids: Vec<_> = report.criterion_results.iter().map(|r| r.criterion_id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn test_any_logic_report() {
        let step = build(json!({ "logic": "any" }));
        let mut store = store_with(&[("c1", false, 0.9), ("c2", true, 0.3)]);

        step.run(&mut store).await.unwrap();

        let report = store.report().unwrap();
        assert!(report.policy_satisfied);
        assert!(report.needs_review);
        assert_eq!(report.low_confidence_criteria, vec!["c2".to_string()]);
    }

    #[tokio::test]
    async fn test_report_written_once() {
        let step = build(json!({}));
        let mut store = store_with(&[("c1", true, 0.9)]);

        step.run(&mut store).await.unwrap();
        assert!(matches!(
            step.run(&mut store).await,
            Err(NodeError::Store(_))
        ));
    }
}
