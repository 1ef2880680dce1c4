//! Workflow definitions.
//!
//! Policies arrive either as criteria lists (`ParsedPolicy`, compiled into
//! a linear chain) or as explicit node graphs (`ParsedWorkflowPolicy`).
//! Graph specifications are validated against an embedded JSON Schema.

mod compiler;
mod definition;
mod schema;

pub use compiler::{compile_policy, criterion_node_id, AGGREGATE_NODE_ID};
pub use definition::{
    DefinitionError, NodeConfig, ParsedPolicy, ParsedWorkflowPolicy, WorkflowDefinition,
};
pub use schema::{validate_workflow_schema, SchemaError};
