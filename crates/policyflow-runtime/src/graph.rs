//! Graph construction from a declarative workflow definition.
//!
//! Building is all-or-nothing: either every node instantiates and every
//! route resolves, or a `BuildError` names the first offending node and no
//! graph is returned.

use std::collections::{BTreeMap, HashSet};

use policyflow_core::{NodeConfig, WorkflowDefinition};
use thiserror::Error;

use crate::nodes::{NodeRegistry, NodeServices, Step};

/// Errors from graph construction.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Unknown node type '{node_type}' for node '{node}' (available: {available})")]
    UnknownNodeType {
        node: String,
        node_type: String,
        available: String,
    },

    #[error("Start node '{0}' is not defined")]
    MissingStartNode(String),

    #[error("Node '{node}' routes '{label}' to undefined node '{target}'")]
    DanglingRoute {
        node: String,
        label: String,
        target: String,
    },

    #[error("Duplicate node id: {0}")]
    DuplicateNodeId(String),

    #[error("Invalid params for node '{node}': {reason}")]
    InvalidParams { node: String, reason: String },
}

/// An instantiated node plus its outgoing routes.
pub struct GraphNode {
    pub step: Box<dyn Step>,
    pub routes: BTreeMap<String, String>,
}

/// A runnable workflow graph.
pub struct Graph {
    nodes: BTreeMap<String, GraphNode>,
    start: String,
}

impl Graph {
    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Target of `label` out of `id`, if routed.
    pub fn next(&self, id: &str, label: &str) -> Option<&str> {
        self.nodes
            .get(id)
            .and_then(|n| n.routes.get(label))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("start", &self.start)
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builds graphs from definitions using a node registry.
pub struct GraphBuilder<'a> {
    registry: &'a NodeRegistry,
    services: NodeServices,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(registry: &'a NodeRegistry, services: NodeServices) -> Self {
        Self { registry, services }
    }

    /// Instantiate every node and resolve every route.
    ///
    /// Checks, in order: duplicate ids, node types and params, start node,
    /// route targets.
    pub fn build(&self, definition: &WorkflowDefinition) -> Result<Graph, BuildError> {
        let mut seen = HashSet::new();
        for config in &definition.nodes {
            if !seen.insert(config.id.as_str()) {
                return Err(BuildError::DuplicateNodeId(config.id.clone()));
            }
        }

        let mut nodes = BTreeMap::new();
        for config in &definition.nodes {
            let step = self.registry.create(config, &self.services)?;
            self.warn_unused_labels(config);
            nodes.insert(
                config.id.clone(),
                GraphNode {
                    step,
                    routes: config.routes.clone(),
                },
            );
        }

        if !nodes.contains_key(&definition.start_node) {
            return Err(BuildError::MissingStartNode(definition.start_node.clone()));
        }

        for config in &definition.nodes {
            for (label, target) in &config.routes {
                if !nodes.contains_key(target) {
                    return Err(BuildError::DanglingRoute {
                        node: config.id.clone(),
                        label: label.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        tracing::debug!(
            nodes = nodes.len(),
            start = %definition.start_node,
            "Workflow graph built"
        );

        Ok(Graph {
            nodes,
            start: definition.start_node.clone(),
        })
    }

    /// A route keyed on a label the node never emits is dead, not an error.
    fn warn_unused_labels(&self, config: &NodeConfig) {
        let Some(factory) = self.registry.get(&config.node_type) else {
            return;
        };
        let emitted = factory.labels();
        for label in config.routes.keys() {
            if !emitted.contains(&label.as_str()) {
                tracing::warn!(
                    node = %config.id,
                    label = %label,
                    node_type = %config.node_type,
                    "Route label is never emitted by this node type"
                );
            }
        }
    }
}
