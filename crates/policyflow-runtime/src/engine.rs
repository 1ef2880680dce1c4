//! Workflow engine.
//!
//! Runs the current node, looks its label up in the node's routes, and
//! advances. A label with no route ends the run normally. The loop is
//! bounded by `max_steps` so cyclic graphs fail instead of spinning.

use policyflow_core::SharedStore;
use thiserror::Error;

use crate::graph::Graph;
use crate::nodes::NodeError;

/// Errors from a workflow run.
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Node '{node}' failed: {source}")]
    Node {
        node: String,
        #[source]
        source: NodeError,
    },

    #[error("Step limit of {limit} exceeded (next node: {next_node})")]
    StepLimitExceeded { limit: usize, next_node: String },

    #[error("Node '{0}' is not in the graph")]
    MissingNode(String),
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Node ids in execution order (repeats included)
    pub visited: Vec<String>,

    /// Label emitted by the last node
    pub final_label: String,

    pub steps: usize,
}

/// Drives a graph over one run's shared store.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowEngine {
    max_steps: usize,
}

impl Default for WorkflowEngine {
    fn default() -> Self {
        Self { max_steps: 1000 }
    }
}

impl WorkflowEngine {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.max(1),
        }
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    /// Run `graph` from its start node until a label has no route.
    pub async fn run(
        &self,
        graph: &Graph,
        store: &mut SharedStore,
    ) -> Result<RunSummary, WorkflowError> {
        let mut current = graph.start().to_string();
        let mut visited = Vec::new();

        loop {
            if visited.len() >= self.max_steps {
                return Err(WorkflowError::StepLimitExceeded {
                    limit: self.max_steps,
                    next_node: current,
                });
            }

            let node = graph
                .node(&current)
                .ok_or_else(|| WorkflowError::MissingNode(current.clone()))?;

            let label = node
                .step
                .run(store)
                .await
                .map_err(|source| WorkflowError::Node {
                    node: current.clone(),
                    source,
                })?;

            tracing::debug!(
                node = %current,
                kind = node.step.kind(),
                label = %label,
                "Step completed"
            );
            visited.push(current.clone());

            match graph.next(&current, label.as_str()) {
                Some(next) => current = next.to_string(),
                None => {
                    let steps = visited.len();
                    return Ok(RunSummary {
                        visited,
                        final_label: label.into_string(),
                        steps,
                    });
                }
            }
        }
    }
}
