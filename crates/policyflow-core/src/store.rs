//! Per-run shared state.
//!
//! Every node in a run reads from and writes to one `SharedStore`. Each key
//! has a single owner: a result for a given criterion id, sub-criterion id
//! or output key is written at most once, and a second write is rejected.
//! Stores are never shared between concurrent runs.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::types::{CriterionResult, EvaluationReport, PolicyContext, SubCriterionResult};

/// Errors from shared-state writes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Result already written for key: {0}")]
    AlreadyWritten(String),

    #[error("Missing value for key: {0}")]
    Missing(String),
}

/// Typed state store for a single workflow run.
#[derive(Debug, Clone, Default)]
pub struct SharedStore {
    input_text: String,
    policy: PolicyContext,

    /// Criterion results, in the order they were recorded
    criterion_order: Vec<String>,
    criterion_results: BTreeMap<String, CriterionResult>,

    /// Sub-criterion results keyed by parent id, kept in evaluation order
    sub_criterion_results: BTreeMap<String, Vec<SubCriterionResult>>,

    /// Named outputs from deterministic nodes
    outputs: BTreeMap<String, JsonValue>,

    report: Option<EvaluationReport>,
}

impl SharedStore {
    /// Create a store for one run.
    pub fn new(input_text: impl Into<String>, policy: PolicyContext) -> Self {
        Self {
            input_text: input_text.into(),
            policy,
            ..Default::default()
        }
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    pub fn policy(&self) -> &PolicyContext {
        &self.policy
    }

    /// Record a criterion result. Fails if the id already has one.
    pub fn record_criterion(&mut self, result: CriterionResult) -> Result<(), StoreError> {
        if self.criterion_results.contains_key(&result.criterion_id) {
            return Err(StoreError::AlreadyWritten(format!(
                "criterion_results.{}",
                result.criterion_id
            )));
        }
        self.criterion_order.push(result.criterion_id.clone());
        self.criterion_results
            .insert(result.criterion_id.clone(), result);
        Ok(())
    }

    /// Record a sub-criterion result under its parent.
    pub fn record_sub_criterion(
        &mut self,
        parent_id: &str,
        result: SubCriterionResult,
    ) -> Result<(), StoreError> {
        let entries = self
            .sub_criterion_results
            .entry(parent_id.to_string())
            .or_default();

        if entries
            .iter()
            .any(|r| r.sub_criterion_id == result.sub_criterion_id)
        {
            return Err(StoreError::AlreadyWritten(format!(
                "sub_criterion_results.{}.{}",
                parent_id, result.sub_criterion_id
            )));
        }

        entries.push(result);
        Ok(())
    }

    /// Record a named output.
    pub fn record_output(
        &mut self,
        key: impl Into<String>,
        value: JsonValue,
    ) -> Result<(), StoreError> {
        let key = key.into();
        if self.outputs.contains_key(&key) {
            return Err(StoreError::AlreadyWritten(format!("outputs.{}", key)));
        }
        self.outputs.insert(key, value);
        Ok(())
    }

    /// Store the final report.
    pub fn record_report(&mut self, report: EvaluationReport) -> Result<(), StoreError> {
        if self.report.is_some() {
            return Err(StoreError::AlreadyWritten("report".to_string()));
        }
        self.report = Some(report);
        Ok(())
    }

    pub fn criterion(&self, id: &str) -> Option<&CriterionResult> {
        self.criterion_results.get(id)
    }

    /// Criterion results in the order they were recorded.
    pub fn criterion_results(&self) -> Vec<&CriterionResult> {
        self.criterion_order
            .iter()
            .filter_map(|id| self.criterion_results.get(id))
            .collect()
    }

    /// Sub-criterion results recorded under `parent_id`, in evaluation order.
    pub fn sub_criterion_results(&self, parent_id: &str) -> &[SubCriterionResult] {
        self.sub_criterion_results
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn output(&self, key: &str) -> Option<&JsonValue> {
        self.outputs.get(key)
    }

    /// Resolve a text input: the run's input text for `"input_text"`, or a
    /// string output recorded under `key`.
    pub fn text(&self, key: &str) -> Result<&str, StoreError> {
        if key == "input_text" {
            return Ok(&self.input_text);
        }
        self.outputs
            .get(key)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| StoreError::Missing(key.to_string()))
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        self.report.as_ref()
    }

    /// Consume the store, returning the final report if one was recorded.
    pub fn into_report(self) -> Option<EvaluationReport> {
        self.report
    }
}
