//! # policyflow-runtime
//!
//! Async execution of policy evaluation workflows.
//!
//! A workflow is a graph of nodes built from a declarative definition. The
//! engine runs one node at a time over a per-run `SharedStore` and follows
//! the label each node emits. Nodes that need a reasoning call go through
//! one `LlmClient`, which applies, in order:
//! - the response cache (a hit skips everything below)
//! - the global rate limiter
//! - the retry policy around the provider call and verdict parsing
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use policyflow_core::ParsedPolicy;
//! use policyflow_runtime::{PolicyEvaluator, WorkflowConfig};
//!
//! let evaluator = PolicyEvaluator::new(WorkflowConfig::default(), provider)?;
//! let policy = ParsedPolicy::from_yaml_file("policy.yaml")?;
//!
//! let report = evaluator.evaluate_policy(&policy, "Move your pension into Fund X").await?;
//! if report.needs_review {
//!     println!("Low confidence: {:?}", report.low_confidence_criteria);
//! }
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod engine;
pub mod evaluator;
pub mod graph;
pub mod nodes;
pub mod prompts;
pub mod providers;
pub mod resilience;
pub mod throttle;

pub use cache::{CacheKey, ResponseCache};
pub use client::{ClientError, ClientStats, LlmClient, Verdict};
pub use config::{CacheConfig, ConfigError, ModelConfig, ThrottleConfig, WorkflowConfig};
pub use engine::{RunSummary, WorkflowEngine, WorkflowError};
pub use evaluator::{Evaluation, EvaluatorError, PolicyEvaluator};
pub use graph::{BuildError, Graph, GraphBuilder};
pub use nodes::{
    Node, NodeCategory, NodeError, NodeFactory, NodeParameter, NodeRegistry, NodeSchema,
    NodeServices, Step, SubCriterionEvaluator, SubCriterionOutcome, Transition,
};
pub use providers::{
    ApiCredential, ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError,
};
pub use resilience::{FailurePolicy, RetryPolicy};
pub use throttle::RateLimiter;

#[cfg(feature = "anthropic")]
pub use providers::AnthropicProvider;
