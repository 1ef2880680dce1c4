//! Compile a criteria-based policy into a linear workflow.
//!
//! Each top-level criterion becomes one `CriterionEvaluationNode`
//! (`criterion_<id>`), chained by `default` routes, ending in a
//! `ResultAggregatorNode` (`aggregate`) that carries the top-level logic.

use serde_json::json;

use super::definition::{NodeConfig, ParsedPolicy, ParsedWorkflowPolicy, WorkflowDefinition};

/// Node id of the terminal aggregator in compiled workflows.
pub const AGGREGATE_NODE_ID: &str = "aggregate";

/// Node id for a criterion's evaluation node.
pub fn criterion_node_id(criterion_id: &str) -> String {
    format!("criterion_{}", criterion_id)
}

/// Build the linear evaluation workflow for `policy`.
pub fn compile_policy(policy: &ParsedPolicy) -> ParsedWorkflowPolicy {
    let ids: Vec<String> = policy
        .criteria
        .iter()
        .map(|c| criterion_node_id(&c.id))
        .collect();

    let mut nodes: Vec<NodeConfig> = policy
        .criteria
        .iter()
        .enumerate()
        .map(|(i, criterion)| {
            let next = ids.get(i + 1).map(String::as_str).unwrap_or(AGGREGATE_NODE_ID);
            NodeConfig::new(
                &ids[i],
                "CriterionEvaluationNode",
                json!({ "criterion": criterion }),
            )
            .route("default", next)
        })
        .collect();

    nodes.push(NodeConfig::new(
        AGGREGATE_NODE_ID,
        "ResultAggregatorNode",
        json!({ "logic": policy.logic }),
    ));

    let start_node = ids
        .first()
        .cloned()
        .unwrap_or_else(|| AGGREGATE_NODE_ID.to_string());

    tracing::debug!(
        policy = %policy.title,
        criteria = policy.criteria.len(),
        logic = %policy.logic,
        "Compiled policy into linear workflow"
    );

    ParsedWorkflowPolicy {
        title: policy.title.clone(),
        description: policy.description.clone(),
        workflow: WorkflowDefinition { nodes, start_node },
        raw_text: policy.raw_text.clone(),
    }
}
