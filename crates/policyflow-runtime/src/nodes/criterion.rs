//! Criterion evaluation node.
//!
//! A plain criterion is judged with one reasoning call. A criterion with
//! sub-criteria is decided by its sub-criteria instead, evaluated in order
//! with short-circuiting.

use async_trait::async_trait;
use policyflow_core::{
    Criterion, CriterionResult, NodeConfig, PolicyContext, SharedStore, StoreError,
};
use serde::Deserialize;

use super::registry::{parse_params, NodeFactory};
use super::subcriterion::{SubCriterionEvaluator, SubCriterionOutcome};
use super::{
    labels, Node, NodeCategory, NodeParameter, NodeResult, NodeSchema, NodeServices, Step,
    Transition,
};
use crate::client::Verdict;
use crate::graph::BuildError;
use crate::prompts;
use crate::resilience::FailurePolicy;

const NODE_TYPE: &str = "CriterionEvaluationNode";

#[derive(Debug, Clone)]
pub struct CriterionContext {
    pub input_text: String,
    pub policy: PolicyContext,
}

/// How the verdict was reached.
#[derive(Debug, Clone)]
pub enum CriterionOutcome {
    Direct(Verdict),
    Composite(SubCriterionOutcome),
}

/// Evaluates one top-level criterion and records its result.
pub struct CriterionEvaluationNode {
    id: String,
    criterion: Criterion,
    on_failure: FailurePolicy,
    services: NodeServices,
}

impl CriterionEvaluationNode {
    pub fn new(id: impl Into<String>, criterion: Criterion, services: NodeServices) -> Self {
        Self {
            id: id.into(),
            criterion,
            on_failure: FailurePolicy::default(),
            services,
        }
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn criterion(&self) -> &Criterion {
        &self.criterion
    }

    async fn evaluate_direct(&self, context: &CriterionContext) -> NodeResult<Verdict> {
        let system_prompt = prompts::criterion_prompt(&self.criterion, &context.policy);
        let completion = self.services.config.completion_config(NODE_TYPE);

        let result = self
            .services
            .client
            .evaluate(
                &format!("criterion_{}", self.criterion.id),
                &system_prompt,
                &prompts::evaluation_request(&context.input_text),
                &completion,
            )
            .await;

        match result {
            Ok(verdict) => Ok(verdict),
            Err(e) if self.on_failure == FailurePolicy::DefaultResult => {
                tracing::warn!(
                    node = %self.id,
                    criterion = %self.criterion.id,
                    error = %e,
                    "Criterion evaluation failed, recording default result"
                );
                Ok(Verdict {
                    met: false,
                    reasoning: FailurePolicy::default_reasoning(&e),
                    confidence: 0.0,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl Node for CriterionEvaluationNode {
    type Context = CriterionContext;
    type Outcome = CriterionOutcome;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        NODE_TYPE
    }

    fn prepare(&self, store: &SharedStore) -> NodeResult<Self::Context> {
        Ok(CriterionContext {
            input_text: store.input_text().to_string(),
            policy: store.policy().clone(),
        })
    }

    async fn execute(&self, context: &Self::Context) -> NodeResult<Self::Outcome> {
        if !self.criterion.has_sub_criteria() {
            return self.evaluate_direct(context).await.map(CriterionOutcome::Direct);
        }

        tracing::debug!(
            criterion = %self.criterion.id,
            sub_criteria = self.criterion.sub_criteria.len(),
            logic = %self.criterion.effective_sub_logic(),
            "Evaluating criterion through sub-criteria"
        );

        SubCriterionEvaluator::new(&self.criterion, &self.services)
            .with_failure_policy(self.on_failure)
            .evaluate(&context.input_text, &context.policy)
            .await
            .map(CriterionOutcome::Composite)
    }

    fn finalize(
        &self,
        store: &mut SharedStore,
        _context: Self::Context,
        outcome: Self::Outcome,
    ) -> NodeResult<Transition> {
        // Nothing is written unless the criterion result can be written too
        if store.criterion(&self.criterion.id).is_some() {
            return Err(StoreError::AlreadyWritten(format!(
                "criterion_results.{}",
                self.criterion.id
            ))
            .into());
        }

        let result = match outcome {
            CriterionOutcome::Direct(verdict) => CriterionResult {
                criterion_id: self.criterion.id.clone(),
                criterion_name: self.criterion.name.clone(),
                met: verdict.met,
                reasoning: verdict.reasoning,
                confidence: verdict.confidence,
                sub_results: Vec::new(),
            },
            CriterionOutcome::Composite(composite) => {
                for sub in &composite.results {
                    store.record_sub_criterion(&self.criterion.id, sub.clone())?;
                }
                CriterionResult {
                    criterion_id: self.criterion.id.clone(),
                    criterion_name: self.criterion.name.clone(),
                    met: composite.met,
                    reasoning: composite.reasoning,
                    confidence: composite.confidence,
                    sub_results: composite.results,
                }
            }
        };

        tracing::debug!(
            criterion = %result.criterion_id,
            met = result.met,
            confidence = result.confidence,
            "Criterion evaluated"
        );
        store.record_criterion(result)?;
        Ok(Transition::default_route())
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CriterionParams {
    criterion: Criterion,
    #[serde(default)]
    on_failure: FailurePolicy,
}

/// Factory for `CriterionEvaluationNode`.
pub struct CriterionEvaluationNodeFactory;

impl NodeFactory for CriterionEvaluationNodeFactory {
    fn node_type(&self) -> &'static str {
        NODE_TYPE
    }

    fn labels(&self) -> &'static [&'static str] {
        &[labels::DEFAULT]
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new(
            NODE_TYPE,
            "Judge one policy criterion, through its sub-criteria when it has any",
            NodeCategory::Internal,
        )
        .param(NodeParameter::required("criterion", "criterion"))
        .param(
            NodeParameter::optional("on_failure", "string", serde_json::json!("propagate"))
                .describe("propagate or default_result"),
        )
        .actions(self.labels())
    }

    fn create(
        &self,
        config: &NodeConfig,
        services: &NodeServices,
    ) -> Result<Box<dyn Step>, BuildError> {
        let params: CriterionParams = parse_params(config)?;
        Ok(Box::new(
            CriterionEvaluationNode::new(&config.id, params.criterion, services.clone())
                .with_failure_policy(params.on_failure),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::services;
    use crate::nodes::NodeError;
    use crate::providers::mock::{verdict, MockProvider};
    use crate::providers::ProviderError;
    use policyflow_core::LogicOperator;
    use std::sync::Arc;

    fn store() -> SharedStore {
        SharedStore::new("Buy this fund now", PolicyContext::new("Advice", "Detect advice"))
    }

    #[tokio::test]
    async fn test_plain_criterion_records_verdict() {
        let provider = Arc::new(MockProvider::always(verdict(true, 0.92)));
        let node = CriterionEvaluationNode::new(
            "criterion_c1",
            Criterion::new("c1", "Recommendation", "Recommends a product"),
            services(provider.clone()),
        );
        let mut store = store();

        let label = Step::run(&node, &mut store).await.unwrap();

        assert_eq!(label.as_str(), labels::DEFAULT);
        let result = store.criterion("c1").unwrap();
        assert!(result.met);
        assert_eq!(result.confidence, 0.92);
        assert!(result.sub_results.is_empty());
        assert_eq!(provider.calls(), 1);
        assert!(provider.system_prompts()[0].contains("Recommendation (c1)"));
    }

    #[tokio::test]
    async fn test_composite_criterion_short_circuits() {
        let provider = Arc::new(MockProvider::verdicts(&[(false, 0.9), (true, 0.75), (true, 0.9)]));
        let criterion = Criterion::new("c2", "Personal", "Tailored").with_sub_criteria(
            LogicOperator::Any,
            vec![
                Criterion::new("c2a", "Suitable", "d"),
                Criterion::new("c2b", "Circumstances", "d"),
                Criterion::new("c2c", "Direct", "d"),
            ],
        );
        let node = CriterionEvaluationNode::new("criterion_c2", criterion, services(provider.clone()));
        let mut store = store();

        Step::run(&node, &mut store).await.unwrap();

        let result = store.criterion("c2").unwrap();
        assert!(result.met);
        assert_eq!(result.confidence, 0.75);
        assert_eq!(result.sub_results.len(), 2);
        assert_eq!(store.sub_criterion_results("c2").len(), 2);
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_failure_propagates_by_default() {
        let provider = Arc::new(MockProvider::new(|_| {
            Err(ProviderError::Timeout(std::time::Duration::from_secs(15)))
        }));
        let node = CriterionEvaluationNode::new(
            "criterion_c1",
            Criterion::new("c1", "Recommendation", "d"),
            services(provider),
        );
        let mut store = store();

        let err = Step::run(&node, &mut store).await.unwrap_err();
        assert!(matches!(err, NodeError::Client(_)));
        assert!(store.criterion("c1").is_none());
    }

    #[tokio::test]
    async fn test_default_result_policy() {
        let provider = Arc::new(MockProvider::always("not json at all"));
        let node = CriterionEvaluationNode::new(
            "criterion_c1",
            Criterion::new("c1", "Recommendation", "d"),
            services(provider),
        )
        .with_failure_policy(FailurePolicy::DefaultResult);
        let mut store = store();

        Step::run(&node, &mut store).await.unwrap();

        let result = store.criterion("c1").unwrap();
        assert!(!result.met);
        assert_eq!(result.confidence, 0.0);
        assert!(result.reasoning.starts_with("Evaluation failed"));
    }

    #[tokio::test]
    async fn test_second_write_is_rejected() {
        let provider = Arc::new(MockProvider::always(verdict(true, 0.9)));
        let node = CriterionEvaluationNode::new(
            "criterion_c1",
            Criterion::new("c1", "Recommendation", "d"),
            services(provider),
        );
        let mut store = store();

        Step::run(&node, &mut store).await.unwrap();
        let err = Step::run(&node, &mut store).await.unwrap_err();
        assert!(matches!(err, NodeError::Store(_)));
    }

    #[tokio::test]
    async fn test_rejected_composite_leaves_sub_results_untouched() {
        let provider = Arc::new(MockProvider::always(verdict(true, 0.8)));
        let criterion = Criterion::new("c2", "Personal", "Tailored").with_sub_criteria(
            LogicOperator::Any,
            vec![
                Criterion::new("c2a", "Suitable", "d"),
                Criterion::new("c2b", "Circumstances", "d"),
            ],
        );
        let node = CriterionEvaluationNode::new("criterion_c2", criterion, services(provider));
        let mut store = store();

        Step::run(&node, &mut store).await.unwrap();
        assert_eq!(store.sub_criterion_results("c2").len(), 1);

        let err = Step::run(&node, &mut store).await.unwrap_err();
        assert!(matches!(
            err,
            NodeError::Store(StoreError::AlreadyWritten(ref key)) if key == "criterion_results.c2"
        ));
        assert_eq!(store.sub_criterion_results("c2").len(), 1);
    }

    #[test]
    fn test_factory_reads_params() {
        let services = services(Arc::new(MockProvider::always("")));
        let config = NodeConfig::new(
            "criterion_c1",
            NODE_TYPE,
            serde_json::json!({
                "criterion": { "id": "c1", "name": "R", "description": "d" },
                "on_failure": "default_result"
            }),
        );
        let step = CriterionEvaluationNodeFactory.create(&config, &services).unwrap();
        assert_eq!(step.id(), "criterion_c1");

        let bad = NodeConfig::new("x", NODE_TYPE, serde_json::json!({ "criterion": "c1" }));
        assert!(matches!(
            CriterionEvaluationNodeFactory.create(&bad, &services),
            Err(BuildError::InvalidParams { .. })
        ));
    }
}
