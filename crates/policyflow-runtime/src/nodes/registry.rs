//! Type-tag dispatch for declarative node lists.
//!
//! Each node kind registers a factory under its type tag. The graph builder
//! resolves every `NodeConfig.type` through the registry, so adding a node
//! kind never touches the builder.
//!
//! ## Usage
//!
//! ```ignore
//! let mut registry = NodeRegistry::with_defaults();
//! registry.register(Arc::new(MyNodeFactory));
//!
//! let step = registry.create(&node_config, &services)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use policyflow_core::NodeConfig;
use serde::de::DeserializeOwned;

use super::{
    ConfidenceGateNodeFactory, CriterionEvaluationNodeFactory, NodeSchema, NodeServices,
    PatternMatchNodeFactory, ResultAggregatorNodeFactory, Step, SubCriterionNodeFactory,
};
use crate::graph::BuildError;

/// Creates nodes of one type from their configuration.
pub trait NodeFactory: Send + Sync {
    /// Type tag this factory answers to (e.g. "PatternMatchNode").
    fn node_type(&self) -> &'static str;

    /// Transition labels nodes of this type can emit.
    fn labels(&self) -> &'static [&'static str];

    /// Catalog entry for this node type. Its `actions` should match
    /// `labels()`.
    fn schema(&self) -> NodeSchema;

    /// Build a node. Parameter problems are reported as
    /// `BuildError::InvalidParams`.
    fn create(&self, config: &NodeConfig, services: &NodeServices)
        -> Result<Box<dyn Step>, BuildError>;
}

/// Deserialize a node's `params` into its typed parameter struct.
pub fn parse_params<T: DeserializeOwned>(config: &NodeConfig) -> Result<T, BuildError> {
    serde_json::from_value(config.params.clone()).map_err(|e| BuildError::InvalidParams {
        node: config.id.clone(),
        reason: e.to_string(),
    })
}

/// Registry of node factories keyed by type tag.
#[derive(Default, Clone)]
pub struct NodeRegistry {
    factories: BTreeMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every built-in node kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(CriterionEvaluationNodeFactory));
        registry.register(Arc::new(SubCriterionNodeFactory));
        registry.register(Arc::new(PatternMatchNodeFactory));
        registry.register(Arc::new(ConfidenceGateNodeFactory));
        registry.register(Arc::new(ResultAggregatorNodeFactory));
        registry
    }

    /// Register a factory, replacing any existing one for the same tag.
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        self.factories
            .insert(factory.node_type().to_string(), factory);
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeFactory>> {
        self.factories.get(node_type)
    }

    /// Instantiate the node described by `config`.
    pub fn create(
        &self,
        config: &NodeConfig,
        services: &NodeServices,
    ) -> Result<Box<dyn Step>, BuildError> {
        self.factories
            .get(&config.node_type)
            .ok_or_else(|| BuildError::UnknownNodeType {
                node: config.id.clone(),
                node_type: config.node_type.clone(),
                available: self.available_types().join(", "),
            })?
            .create(config, services)
    }

    /// List registered type tags.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_type(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Schema of every registered type, ordered by type tag.
    pub fn schemas(&self) -> Vec<NodeSchema> {
        self.factories.values().map(|f| f.schema()).collect()
    }

    /// Schemas of the types definition generators may use.
    pub fn exposed_schemas(&self) -> Vec<NodeSchema> {
        self.schemas()
            .into_iter()
            .filter(|s| s.parser_exposed)
            .collect()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("types", &self.available_types())
            .finish()
    }
}
