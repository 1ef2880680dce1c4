//! Workflow nodes.
//!
//! A node runs in three phases over the run's [`SharedStore`]:
//! 1. `prepare` takes a snapshot of what it needs (no writes)
//! 2. `execute` does the work, possibly calling the reasoning service
//! 3. `finalize` commits the keys the node owns and returns a transition
//!    label
//!
//! Graphs hold nodes as `Box<dyn Step>`; every [`Node`] is a [`Step`].

use std::sync::Arc;

use async_trait::async_trait;
use policyflow_core::{SharedStore, StoreError};
use thiserror::Error;

use crate::client::{ClientError, LlmClient};
use crate::config::WorkflowConfig;

mod aggregate;
mod criterion;
mod gate;
mod pattern;
mod registry;
mod schema;
mod subcriterion;

pub use aggregate::{ResultAggregatorNode, ResultAggregatorNodeFactory};
pub use criterion::{CriterionEvaluationNode, CriterionEvaluationNodeFactory};
pub use gate::{ConfidenceGateNode, ConfidenceGateNodeFactory};
pub use pattern::{PatternMatchNode, PatternMatchNodeFactory};
pub use registry::{parse_params, NodeFactory, NodeRegistry};
pub use schema::{NodeCategory, NodeParameter, NodeSchema};
pub use subcriterion::{
    SubCriterionEvaluator, SubCriterionNode, SubCriterionNodeFactory, SubCriterionOutcome,
};

/// Transition labels emitted by the built-in nodes.
pub mod labels {
    pub const DEFAULT: &str = "default";
    pub const SATISFIED: &str = "satisfied";
    pub const FAILED: &str = "failed";
    pub const MATCHED: &str = "matched";
    pub const NOT_MATCHED: &str = "not_matched";
    pub const HIGH_CONFIDENCE: &str = "high_confidence";
    pub const NEEDS_REVIEW: &str = "needs_review";
    pub const LOW_CONFIDENCE: &str = "low_confidence";
}

/// Errors raised while a node runs.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Reasoning call failed: {0}")]
    Client(#[from] ClientError),

    #[error("Shared state error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to serialize node output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sub-criterion '{sub_criterion}' failed: {source}")]
    SubCriterion {
        sub_criterion: String,
        #[source]
        source: Box<NodeError>,
    },
}

pub type NodeResult<T> = Result<T, NodeError>;

/// Label a node emits to select the next node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Transition(String);

impl Transition {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn default_route() -> Self {
        Self::new(labels::DEFAULT)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Transition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Long-lived services handed to every node a graph builds.
#[derive(Debug, Clone)]
pub struct NodeServices {
    pub client: Arc<LlmClient>,
    pub config: Arc<WorkflowConfig>,
}

impl NodeServices {
    pub fn new(client: Arc<LlmClient>, config: Arc<WorkflowConfig>) -> Self {
        Self { client, config }
    }
}

/// A typed unit of work with prepare / execute / finalize phases.
#[async_trait]
pub trait Node: Send + Sync {
    /// Snapshot taken from the store before execution
    type Context: Send + Sync;

    /// Result of execution, committed by `finalize`
    type Outcome: Send;

    fn id(&self) -> &str;

    /// Registered type tag
    fn kind(&self) -> &'static str;

    fn prepare(&self, store: &SharedStore) -> NodeResult<Self::Context>;

    async fn execute(&self, context: &Self::Context) -> NodeResult<Self::Outcome>;

    fn finalize(
        &self,
        store: &mut SharedStore,
        context: Self::Context,
        outcome: Self::Outcome,
    ) -> NodeResult<Transition>;
}

/// Object-safe view of a node, as held by a graph.
#[async_trait]
pub trait Step: Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> &'static str;

    /// Run the full lifecycle against `store`.
    async fn run(&self, store: &mut SharedStore) -> NodeResult<Transition>;
}

#[async_trait]
impl<N: Node> Step for N {
    fn id(&self) -> &str {
        Node::id(self)
    }

    fn kind(&self) -> &'static str {
        Node::kind(self)
    }

    async fn run(&self, store: &mut SharedStore) -> NodeResult<Transition> {
        let context = self.prepare(store)?;
        let outcome = self.execute(&context).await?;
        self.finalize(store, context, outcome)
    }
}
