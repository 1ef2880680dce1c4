//! Sub-criterion evaluation with short-circuiting.
//!
//! `SubCriterionNode` judges one sub-criterion and reports whether the
//! parent's outcome is already decided:
//! - `satisfied`: met under ANY logic, skip the rest
//! - `failed`: not met under ALL logic, skip the rest
//! - `default`: keep going
//!
//! `SubCriterionEvaluator` drives those nodes in declared order for one
//! parent and stops at the first decisive verdict.

use async_trait::async_trait;
use policyflow_core::{
    Criterion, LogicOperator, NodeConfig, PolicyContext, SharedStore, SubCriterionResult,
};
use serde::Deserialize;

use super::registry::{parse_params, NodeFactory};
use super::{
    labels, Node, NodeCategory, NodeError, NodeParameter, NodeResult, NodeSchema, NodeServices,
    Step, Transition,
};
use crate::client::Verdict;
use crate::graph::BuildError;
use crate::prompts;
use crate::resilience::FailurePolicy;

const NODE_TYPE: &str = "SubCriterionNode";

/// Snapshot for one sub-criterion evaluation.
#[derive(Debug, Clone)]
pub struct SubCriterionContext {
    pub input_text: String,
    pub policy: PolicyContext,
}

/// Evaluates one sub-criterion of a parent criterion.
pub struct SubCriterionNode {
    id: String,
    parent: Criterion,
    sub_criterion: Criterion,
    logic: LogicOperator,
    on_failure: FailurePolicy,
    services: NodeServices,
}

impl SubCriterionNode {
    pub fn new(
        id: impl Into<String>,
        parent: Criterion,
        sub_criterion: Criterion,
        logic: LogicOperator,
        services: NodeServices,
    ) -> Self {
        Self {
            id: id.into(),
            parent,
            sub_criterion,
            logic,
            on_failure: FailurePolicy::default(),
            services,
        }
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    fn call_label(&self) -> String {
        format!("subcriterion_{}_{}", self.parent.id, self.sub_criterion.id)
    }
}

#[async_trait]
impl Node for SubCriterionNode {
    type Context = SubCriterionContext;
    type Outcome = Verdict;

    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> &'static str {
        NODE_TYPE
    }

    fn prepare(&self, store: &SharedStore) -> NodeResult<Self::Context> {
        Ok(SubCriterionContext {
            input_text: store.input_text().to_string(),
            policy: store.policy().clone(),
        })
    }

    async fn execute(&self, context: &Self::Context) -> NodeResult<Self::Outcome> {
        let system_prompt =
            prompts::sub_criterion_prompt(&self.parent, &self.sub_criterion, &context.policy);
        let completion = self.services.config.completion_config(NODE_TYPE);

        let result = self
            .services
            .client
            .evaluate(
                &self.call_label(),
                &system_prompt,
                &prompts::evaluation_request(&context.input_text),
                &completion,
            )
            .await;

        match (result, self.on_failure) {
            (Ok(verdict), _) => Ok(verdict),
            (Err(e), FailurePolicy::DefaultResult) => {
                tracing::warn!(
                    node = %self.id,
                    sub_criterion = %self.sub_criterion.id,
                    error = %e,
                    "Sub-criterion evaluation failed, recording default result"
                );
                Ok(Verdict {
                    met: false,
                    reasoning: FailurePolicy::default_reasoning(&e),
                    confidence: 0.0,
                })
            }
            (Err(e), FailurePolicy::Propagate) => Err(e.into()),
        }
    }

    fn finalize(
        &self,
        store: &mut SharedStore,
        _context: Self::Context,
        outcome: Self::Outcome,
    ) -> NodeResult<Transition> {
        let met = outcome.met;
        store.record_sub_criterion(
            &self.parent.id,
            SubCriterionResult {
                sub_criterion_id: self.sub_criterion.id.clone(),
                sub_criterion_name: self.sub_criterion.name.clone(),
                met,
                reasoning: outcome.reasoning,
                confidence: outcome.confidence,
            },
        )?;

        let label = match (self.logic.is_decisive(met), met) {
            (true, true) => labels::SATISFIED,
            (true, false) => labels::FAILED,
            (false, _) => labels::DEFAULT,
        };
        Ok(Transition::new(label))
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SubCriterionParams {
    parent: Criterion,
    sub_criterion: Criterion,
    #[serde(default)]
    sub_logic: Option<LogicOperator>,
    #[serde(default)]
    on_failure: FailurePolicy,
}

/// Factory for `SubCriterionNode`.
///
/// Params: `parent` and `sub_criterion` (criterion objects), optional
/// `sub_logic` (defaults to the parent's), optional `on_failure`.
pub struct SubCriterionNodeFactory;

impl NodeFactory for SubCriterionNodeFactory {
    fn node_type(&self) -> &'static str {
        NODE_TYPE
    }

    fn labels(&self) -> &'static [&'static str] {
        &[labels::SATISFIED, labels::FAILED, labels::DEFAULT]
    }

    fn schema(&self) -> NodeSchema {
        NodeSchema::new(
            NODE_TYPE,
            "Judge one sub-criterion and report whether the parent is decided",
            NodeCategory::Internal,
        )
        .param(NodeParameter::required("parent", "criterion"))
        .param(NodeParameter::required("sub_criterion", "criterion"))
        .param(
            NodeParameter::optional("sub_logic", "string", serde_json::Value::Null)
                .describe("any or all; defaults to the parent's sub_logic"),
        )
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
        let params: SubCriterionParams = parse_params(config)?;
        let logic = params
            .sub_logic
            .unwrap_or_else(|| params.parent.effective_sub_logic());

        Ok(Box::new(
            SubCriterionNode::new(
                &config.id,
                params.parent,
                params.sub_criterion,
                logic,
                services.clone(),
            )
            .with_failure_policy(params.on_failure),
        ))
    }
}

/// Result of evaluating a parent's sub-criteria.
#[derive(Debug, Clone, PartialEq)]
pub struct SubCriterionOutcome {
    pub met: bool,

    /// Results for the evaluated prefix, in declared order
    pub results: Vec<SubCriterionResult>,

    /// Minimum confidence over the evaluated prefix
    pub confidence: f64,

    pub reasoning: String,
}

/// Drives `SubCriterionNode`s for one parent criterion.
pub struct SubCriterionEvaluator<'a> {
    parent: &'a Criterion,
    services: &'a NodeServices,
    on_failure: FailurePolicy,
}

impl<'a> SubCriterionEvaluator<'a> {
    pub fn new(parent: &'a Criterion, services: &'a NodeServices) -> Self {
        Self {
            parent,
            services,
            on_failure: FailurePolicy::default(),
        }
    }

    pub fn with_failure_policy(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Evaluate sub-criteria in order until one decides the outcome.
    ///
    /// Each sub-criterion runs the full node lifecycle against a scratch
    /// store seeded from the run's input and policy; the caller commits the
    /// returned results to the run's store.
    pub async fn evaluate(
        &self,
        input_text: &str,
        policy: &PolicyContext,
    ) -> NodeResult<SubCriterionOutcome> {
        let logic = self.parent.effective_sub_logic();
        let mut scratch = SharedStore::new(input_text, policy.clone());
        let mut decided_by = None;

        for sub in &self.parent.sub_criteria {
            let node = SubCriterionNode::new(
                format!("{}.{}", self.parent.id, sub.id),
                self.parent.clone(),
                sub.clone(),
                logic,
                self.services.clone(),
            )
            .with_failure_policy(self.on_failure);

            let label = Step::run(&node, &mut scratch).await.map_err(|e| {
                NodeError::SubCriterion {
                    sub_criterion: sub.id.clone(),
                    source: Box::new(e),
                }
            })?;

            if label.as_str() != labels::DEFAULT {
                tracing::debug!(
                    criterion = %self.parent.id,
                    sub_criterion = %sub.id,
                    label = %label,
                    "Sub-criterion decided outcome, skipping the rest"
                );
                decided_by = Some(sub);
                break;
            }
        }

        let results = scratch.sub_criterion_results(&self.parent.id).to_vec();
        let met = match decided_by {
            Some(_) => !logic.exhausted_outcome(),
            None => logic.exhausted_outcome(),
        };
        let confidence = results
            .iter()
            .map(|r| r.confidence)
            .fold(None, |acc: Option<f64>, c| Some(acc.map_or(c, |a| a.min(c))))
            .unwrap_or(0.0);

        let reasoning = match decided_by {
            Some(sub) => {
                let detail = results
                    .last()
                    .map(|r| r.reasoning.as_str())
                    .unwrap_or_default();
                format!(
                    "{} by sub-criterion {} ({}) under {} logic: {}",
                    if met { "Met" } else { "Not met" },
                    sub.id,
                    sub.name,
                    logic,
                    detail
                )
            }
            None => format!(
                "{}: {} of {} sub-criteria met under {} logic",
                if met { "Met" } else { "Not met" },
                results.iter().filter(|r| r.met).count(),
                results.len(),
                logic
            ),
        };

        Ok(SubCriterionOutcome {
            met,
            results,
            confidence,
            reasoning,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::testing::services;
    use crate::providers::mock::MockProvider;
    use crate::providers::ProviderError;
    use std::sync::Arc;

    fn parent(logic: LogicOperator, n: usize) -> Criterion {
        Criterion::new("c1", "Parent", "Parent criterion").with_sub_criteria(
            logic,
            (0..n)
                .map(|i| Criterion::new(format!("s{}", i), format!("Sub {}", i), "desc"))
                .collect(),
        )
    }

    async fn run_evaluator(
        logic: LogicOperator,
        verdicts: &[(bool, f64)],
    ) -> (SubCriterionOutcome, usize) {
        let provider = Arc::new(MockProvider::verdicts(verdicts));
        let services = services(provider.clone());
        let parent = parent(logic, verdicts.len());

        let outcome = SubCriterionEvaluator::new(&parent, &services)
            .evaluate("text", &PolicyContext::default())
            .await
            .unwrap();
        (outcome, provider.calls())
    }

    #[tokio::test]
    async fn test_any_stops_at_first_met() {
        let (outcome, calls) =
            run_evaluator(LogicOperator::Any, &[(false, 0.9), (true, 0.8), (false, 0.9)]).await;

        assert!(outcome.met);
        assert_eq!(calls, 2);
        let ids: Vec<_> = outcome.results.iter().map(|r| r.sub_criterion_id.as_str()).collect();
        assert_eq!(ids, vec!["s0", "s1"]);
        assert!(outcome.reasoning.contains("s1"));
    }

    #[tokio::test]
    async fn test_all_stops_at_first_unmet() {
        let (outcome, calls) =
            run_evaluator(LogicOperator::All, &[(true, 0.9), (false, 0.7), (true, 0.9)]).await;

        assert!(!outcome.met);
        assert_eq!(calls, 2);
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_all_exhausted_is_met() {
        let (outcome, calls) =
            run_evaluator(LogicOperator::All, &[(true, 0.9), (true, 0.85), (true, 0.95)]).await;

        assert!(outcome.met);
        assert_eq!(calls, 3);
        assert_eq!(outcome.results.len(), 3);
        assert_eq!(outcome.confidence, 0.85);
    }

    #[tokio::test]
    async fn test_any_exhausted_is_unmet() {
        let (outcome, calls) =
            run_evaluator(LogicOperator::Any, &[(false, 0.6), (false, 0.9)]).await;

        assert!(!outcome.met);
        assert_eq!(calls, 2);
        assert!(outcome.reasoning.contains("0 of 2"));
    }

    #[tokio::test]
    async fn test_failure_propagates_with_sub_id() {
        let provider = Arc::new(MockProvider::new(|_| {
            Err(ProviderError::HttpError("down".to_string()))
        }));
        let services = services(provider);
        let parent = parent(LogicOperator::All, 2);

        let err = SubCriterionEvaluator::new(&parent, &services)
            .evaluate("text", &PolicyContext::default())
            .await
            .unwrap_err();

        assert!(matches!(err, NodeError::SubCriterion { ref sub_criterion, .. } if sub_criterion == "s0"));
    }

    #[tokio::test]
    async fn test_default_result_policy_records_unmet() {
        let provider = Arc::new(MockProvider::new(|_| {
            Err(ProviderError::HttpError("down".to_string()))
        }));
        let services = services(provider);
        let parent = parent(LogicOperator::All, 3);

        let outcome = SubCriterionEvaluator::new(&parent, &services)
            .with_failure_policy(FailurePolicy::DefaultResult)
            .evaluate("text", &PolicyContext::default())
            .await
            .unwrap();

        // First defaulted verdict is unmet, which decides ALL
        assert!(!outcome.met);
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.confidence, 0.0);
        assert!(outcome.results[0].reasoning.contains("down"));
    }

    #[tokio::test]
    async fn test_node_labels_and_store_write() {
        let provider = Arc::new(MockProvider::verdicts(&[(true, 0.9), (false, 0.9)]));
        let services = services(provider);
        let parent = parent(LogicOperator::Any, 2);
        let mut store = SharedStore::new("text", PolicyContext::default());

        let met = SubCriterionNode::new(
            "n0",
            parent.clone(),
            parent.sub_criteria[0].clone(),
            LogicOperator::Any,
            services.clone(),
        );
        let label = Step::run(&met, &mut store).await.unwrap();
        assert_eq!(label.as_str(), labels::SATISFIED);

        let unmet = SubCriterionNode::new(
            "n1",
            parent.clone(),
            parent.sub_criteria[1].clone(),
            LogicOperator::Any,
            services,
        );
        let label = Step::run(&unmet, &mut store).await.unwrap();
        assert_eq!(label.as_str(), labels::DEFAULT);

        assert_eq!(store.sub_criterion_results("c1").len(), 2);
    }

    #[tokio::test]
    async fn test_all_logic_unmet_emits_failed() {
        let provider = Arc::new(MockProvider::verdicts(&[(false, 0.9)]));
        let services = services(provider);
        let parent = parent(LogicOperator::All, 1);
        let mut store = SharedStore::new("text", PolicyContext::default());

        let node = SubCriterionNode::new(
            "n0",
            parent.clone(),
            parent.sub_criteria[0].clone(),
            LogicOperator::All,
            services,
        );
        assert_eq!(Step::run(&node, &mut store).await.unwrap().as_str(), labels::FAILED);
    }

    #[test]
    fn test_factory_defaults_logic_to_parent() {
        let services = services(Arc::new(MockProvider::always("")));
        let config = NodeConfig::new(
            "sub",
            NODE_TYPE,
            serde_json::json!({
                "parent": { "id": "c1", "name": "P", "description": "d", "sub_logic": "any" },
                "sub_criterion": { "id": "s1", "name": "S", "description": "d" }
            }),
        );
        let step = SubCriterionNodeFactory.create(&config, &services).unwrap();
        assert_eq!(step.kind(), NODE_TYPE);
    }

    #[test]
    fn test_factory_rejects_missing_sub_criterion() {
        let services = services(Arc::new(MockProvider::always("")));
        let config = NodeConfig::new(
            "sub",
            NODE_TYPE,
            serde_json::json!({ "parent": { "id": "c1", "name": "P", "description": "d" } }),
        );
        assert!(matches!(
            SubCriterionNodeFactory.create(&config, &services),
            Err(BuildError::InvalidParams { .. })
        ));
    }
}
