//! # policyflow-core
//!
//! Deterministic building blocks for policy evaluation workflows.
//!
//! This crate holds everything that does not talk to a reasoning service:
//! - The data model (criteria, results, reports)
//! - The per-run `SharedStore` with write-once keys
//! - Workflow definitions, schema validation and policy compilation
//! - Confidence classification and report synthesis
//! - Regex pattern sets for deterministic screening
//!
//! ## Example
//!
//! ```rust,ignore
//! use policyflow_core::{compile_policy, ParsedPolicy};
//!
//! let policy = ParsedPolicy::from_yaml_file("policy.yaml")?;
//! let workflow = compile_policy(&policy);
//! assert_eq!(workflow.workflow.nodes.last().unwrap().id, "aggregate");
//! ```

pub mod confidence;
pub mod patterns;
pub mod store;
pub mod synthesizer;
pub mod types;
pub mod workflow;

// Re-export main types at crate root
pub use confidence::{ConfidenceGate, GateError};
pub use patterns::{PatternError, PatternHit, PatternOutcome, PatternSet};
pub use store::{SharedStore, StoreError};
pub use synthesizer::ReportSynthesizer;
pub use types::{
    ConfidenceLevel, Criterion, CriterionResult, EvaluationReport, LogicOperator, PolicyContext,
    SubCriterionResult,
};
pub use workflow::{
    compile_policy, DefinitionError, NodeConfig, ParsedPolicy, ParsedWorkflowPolicy,
    WorkflowDefinition,
};
