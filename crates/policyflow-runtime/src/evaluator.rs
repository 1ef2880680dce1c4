//! Policy evaluation façade.
//!
//! `PolicyEvaluator` owns the long-lived services (response cache, rate
//! limiter, reasoning client, node registry) and runs one workflow per
//! `evaluate` call over a fresh `SharedStore`. One evaluator may serve many
//! concurrent evaluations; they share the cache and limiter and nothing else.
//!
//! ## Usage
//!
//! ```ignore
//! let config = WorkflowConfig::from_yaml_file("config.yaml")?;
//! let evaluator = PolicyEvaluator::new(config, Arc::new(AnthropicProvider::from_env()?))?;
//!
//! let policy = ParsedPolicy::from_yaml_file("policy.yaml")?;
//! let report = evaluator.evaluate_policy(&policy, "Text to check").await?;
//! println!("{}", report.to_yaml()?);
//! ```

use std::sync::Arc;

use policyflow_core::{
    compile_policy, EvaluationReport, LogicOperator, ParsedPolicy, ParsedWorkflowPolicy,
    ReportSynthesizer, SharedStore,
};
use thiserror::Error;

use crate::cache::ResponseCache;
use crate::client::LlmClient;
use crate::config::{ConfigError, WorkflowConfig};
use crate::engine::{RunSummary, WorkflowEngine, WorkflowError};
use crate::graph::{BuildError, GraphBuilder};
use crate::nodes::{NodeFactory, NodeRegistry, NodeServices};
use crate::providers::LlmProvider;
use crate::throttle::RateLimiter;

/// Errors from policy evaluation.
#[derive(Error, Debug)]
pub enum EvaluatorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to build workflow: {0}")]
    Build(#[from] BuildError),

    #[error("Workflow failed: {0}")]
    Workflow(#[from] WorkflowError),
}

/// Report plus a record of the run that produced it.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: EvaluationReport,
    pub summary: RunSummary,
}

/// Evaluates text against policies through the workflow engine.
pub struct PolicyEvaluator {
    config: Arc<WorkflowConfig>,
    services: NodeServices,
    registry: NodeRegistry,
    engine: WorkflowEngine,
}

impl PolicyEvaluator {
    /// Validate `config` and set up the shared services.
    pub fn new(
        config: WorkflowConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Self, EvaluatorError> {
        config.validate()?;

        let cache = Arc::new(ResponseCache::new(
            config.cache.dir.clone(),
            config.cache.effective_ttl(),
            config.cache.memory_capacity,
        ));
        let limiter = Arc::new(RateLimiter::new(config.throttle.capacity()));
        let client = LlmClient::new(provider, cache, limiter, config.retry_policy());

        let engine = WorkflowEngine::new(config.max_steps);
        let config = Arc::new(config);

        tracing::debug!(
            cache_ttl = ?config.cache.effective_ttl(),
            rpm = ?config.throttle.capacity(),
            max_retries = config.max_retries,
            max_steps = config.max_steps,
            "Policy evaluator ready"
        );

        Ok(Self {
            services: NodeServices::new(Arc::new(client), config.clone()),
            config,
            registry: NodeRegistry::with_defaults(),
            engine,
        })
    }

    /// Add or replace a node kind.
    pub fn register(&mut self, factory: Arc<dyn NodeFactory>) {
        self.registry.register(factory);
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn client(&self) -> &LlmClient {
        &self.services.client
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Compile a criteria policy into its linear workflow and evaluate it.
    pub async fn evaluate_policy(
        &self,
        policy: &ParsedPolicy,
        input_text: &str,
    ) -> Result<EvaluationReport, EvaluatorError> {
        self.evaluate(&compile_policy(policy), input_text).await
    }

    /// Evaluate `input_text` against a workflow policy.
    pub async fn evaluate(
        &self,
        policy: &ParsedWorkflowPolicy,
        input_text: &str,
    ) -> Result<EvaluationReport, EvaluatorError> {
        self.run(policy, input_text).await.map(|e| e.report)
    }

    /// Like `evaluate`, also returning the run summary.
    ///
    /// If the workflow records no report (no aggregator ran), one is
    /// synthesized from the recorded criterion results under ALL logic.
    pub async fn run(
        &self,
        policy: &ParsedWorkflowPolicy,
        input_text: &str,
    ) -> Result<Evaluation, EvaluatorError> {
        tracing::info!(
            policy = %policy.title,
            nodes = policy.workflow.nodes.len(),
            "Starting policy evaluation"
        );

        let graph = GraphBuilder::new(&self.registry, self.services.clone())
            .build(&policy.workflow)?;

        let mut store = SharedStore::new(input_text, policy.context());
        let summary = self.engine.run(&graph, &mut store).await?;

        let report = match store.report() {
            Some(report) => report.clone(),
            None => {
                tracing::debug!(
                    policy = %policy.title,
                    "No report recorded, synthesizing from criterion results"
                );
                let results = store.criterion_results().into_iter().cloned().collect();
                ReportSynthesizer::new(self.config.confidence_gate).synthesize(
                    input_text,
                    &policy.title,
                    results,
                    LogicOperator::All,
                )
            }
        };

        let stats = self.services.client.stats();
        tracing::info!(
            policy = %policy.title,
            satisfied = report.policy_satisfied,
            confidence = report.overall_confidence,
            needs_review = report.needs_review,
            steps = summary.steps,
            provider_calls = stats.provider_calls(),
            cache_hits = stats.cache_hits(),
            "Policy evaluation finished"
        );

        Ok(Evaluation { report, summary })
    }
}

impl std::fmt::Debug for PolicyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEvaluator")
            .field("client", &self.services.client)
            .field("registry", &self.registry)
            .field("engine", &self.engine)
            .finish()
    }
}
