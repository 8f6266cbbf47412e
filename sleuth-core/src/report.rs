//! Evaluation reports for finished explanation runs.
//!
//! A report re-evaluates each explanation from scratch against a separate
//! evaluation set, so the numbers do not depend on the inputs the learner
//! happened to see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::explanation::{Explanation, ExplanationSet};
use crate::fitness::{FitnessStrategy, best_of};
use crate::input::Input;

/// One explanation's scores on the evaluation set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationSummary {
    pub hypothesis: String,
    pub precision: f64,
    pub recall: f64,
    pub specificity: f64,
    pub f1_score: f64,
    pub size: usize,
}

impl From<&Explanation> for ExplanationSummary {
    fn from(e: &Explanation) -> Self {
        Self {
            hypothesis: e.formula().to_string(),
            precision: e.precision(),
            recall: e.recall(),
            specificity: e.specificity(),
            f1_score: e.f1_score(),
            size: e.size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationReport {
    pub run_id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub time_in_seconds: f64,
    pub explanations: Vec<ExplanationSummary>,
    pub best: Vec<ExplanationSummary>,
    /// Precision of the first best explanation; 0 when there is none.
    pub precision: f64,
    pub recall: f64,
}

impl ExplanationReport {
    /// Evaluate `explanations` on `evaluation_inputs` and rank them.
    ///
    /// Explanations that cannot be evaluated on some input are left out.
    pub fn evaluate(
        name: impl Into<String>,
        seed: Option<u64>,
        elapsed: Duration,
        explanations: &ExplanationSet,
        evaluation_inputs: &HashSet<Input>,
        strategy: &dyn FitnessStrategy,
    ) -> Self {
        let mut evaluated = ExplanationSet::new();
        for explanation in explanations {
            let mut fresh = explanation.clone();
            fresh.reset();
            match fresh.evaluate(evaluation_inputs) {
                Ok(()) => {
                    evaluated.append(fresh);
                }
                Err(e) => {
                    warn!(
                        hypothesis = %explanation.formula(),
                        error = %e,
                        "Skipping explanation in report"
                    );
                }
            }
        }
        let best = best_of(&evaluated, strategy);
        let (precision, recall) = best
            .iter()
            .next()
            .map(|e| (e.precision(), e.recall()))
            .unwrap_or((0.0, 0.0));
        Self {
            run_id: Uuid::new_v4(),
            name: name.into(),
            seed,
            created_at: Utc::now(),
            time_in_seconds: elapsed.as_secs_f64(),
            explanations: evaluated.iter().map(ExplanationSummary::from).collect(),
            best: best.iter().map(ExplanationSummary::from).collect(),
            precision,
            recall,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
