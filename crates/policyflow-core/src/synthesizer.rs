//! Synthesizer: aggregates criterion results into the final report.
//!
//! Rules:
//! 1. Criterion verdicts combine under the policy's top-level logic
//! 2. Overall confidence is the minimum criterion confidence
//! 3. Any criterion below the low threshold is listed and flags review

use chrono::Utc;

use crate::confidence::ConfidenceGate;
use crate::types::{ConfidenceLevel, CriterionResult, EvaluationReport, LogicOperator};

/// Builds an `EvaluationReport` from recorded criterion results.
#[derive(Debug, Clone, Default)]
pub struct ReportSynthesizer {
    gate: ConfidenceGate,
}

impl ReportSynthesizer {
    pub fn new(gate: ConfidenceGate) -> Self {
        Self { gate }
    }

    pub fn gate(&self) -> &ConfidenceGate {
        &self.gate
    }

    /// Synthesize criterion results into a final report.
    ///
    /// # Arguments
    ///
    /// * `input_text` - The evaluated text
    /// * `policy_title` - Title of the policy
    /// * `results` - Criterion results in evaluation order
    /// * `logic` - How top-level criteria combine
    pub fn synthesize(
        &self,
        input_text: &str,
        policy_title: &str,
        results: Vec<CriterionResult>,
        logic: LogicOperator,
    ) -> EvaluationReport {
        let policy_satisfied = logic.combine(results.iter().map(|r| r.met));
        let overall_confidence = Self::overall_confidence(&results);
        let confidence_level = self.gate.classify(overall_confidence);

        let low_confidence_criteria: Vec<String> = results
            .iter()
            .filter(|r| self.gate.is_low(r.confidence))
            .map(|r| r.criterion_id.clone())
            .collect();

        let needs_review =
            confidence_level == ConfidenceLevel::Low || !low_confidence_criteria.is_empty();

        let overall_reasoning = Self::build_reasoning(&results, logic, policy_satisfied);

        EvaluationReport {
            policy_satisfied,
            input_text: input_text.to_string(),
            policy_title: policy_title.to_string(),
            criterion_results: results,
            overall_reasoning,
            overall_confidence,
            confidence_level,
            needs_review,
            low_confidence_criteria,
            evaluated_at: Utc::now(),
        }
    }

    /// Minimum criterion confidence, clamped to [0, 1]. No results → 0.
    fn overall_confidence(results: &[CriterionResult]) -> f64 {
        if results.is_empty() {
            return 0.0;
        }
        results
            .iter()
            .map(|r| r.confidence)
            .fold(f64::INFINITY, f64::min)
            .clamp(0.0, 1.0)
    }

    fn build_reasoning(
        results: &[CriterionResult],
        logic: LogicOperator,
        satisfied: bool,
    ) -> String {
        let met = results.iter().filter(|r| r.met).count();
        let mut summary = format!(
            "Policy {}: {} of {} criteria met (logic: {}).",
            if satisfied { "satisfied" } else { "not satisfied" },
            met,
            results.len(),
            logic
        );

        let unmet: Vec<String> = results
            .iter()
            .filter(|r| !r.met)
            .map(|r| format!("{} ({})", r.criterion_id, r.criterion_name))
            .collect();
        if !unmet.is_empty() {
            summary.push_str(&format!(" Unmet: {}.", unmet.join(", ")));
        }

        summary
    }
}
