//! Scoring policies for ranking explanations.
//!
//! A strategy maps an explanation to a score vector that is compared
//! lexicographically; higher is better.

use std::cmp::Ordering;

use crate::explanation::{Explanation, ExplanationSet};

pub trait FitnessStrategy: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, explanation: &Explanation) -> Vec<f64>;

    fn compare(&self, a: &Explanation, b: &Explanation) -> Ordering {
        let (sa, sb) = (self.score(a), self.score(b));
        for (x, y) in sa.iter().zip(&sb) {
            match x.partial_cmp(y) {
                Some(Ordering::Equal) | None => continue,
                Some(ord) => return ord,
            }
        }
        sa.len().cmp(&sb.len())
    }

    fn is_equal(&self, a: &Explanation, b: &Explanation) -> bool {
        self.compare(a, b) == Ordering::Equal
    }
}

/// Recall first, then precision.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecallPriorityFitness;

impl FitnessStrategy for RecallPriorityFitness {
    fn name(&self) -> &str {
        "recall_priority"
    }

    fn score(&self, e: &Explanation) -> Vec<f64> {
        vec![e.recall(), e.precision()]
    }
}

/// Recall, then precision, then the shorter hypothesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecallPriorityLengthFitness;

impl FitnessStrategy for RecallPriorityLengthFitness {
    fn name(&self) -> &str {
        "recall_priority_length"
    }

    fn score(&self, e: &Explanation) -> Vec<f64> {
        vec![e.recall(), e.precision(), -(e.size() as f64)]
    }
}

/// F1 score, then the shorter hypothesis.
#[derive(Debug, Clone, Copy, Default)]
pub struct F1ScoreFitness;

impl FitnessStrategy for F1ScoreFitness {
    fn name(&self) -> &str {
        "f1_score"
    }

    fn score(&self, e: &Explanation) -> Vec<f64> {
        vec![e.f1_score(), -(e.size() as f64)]
    }
}

/// Every explanation tied with the best score, in input order.
pub fn best_of<'a, I>(explanations: I, strategy: &dyn FitnessStrategy) -> ExplanationSet
where
    I: IntoIterator<Item = &'a Explanation>,
{
    let candidates: Vec<&Explanation> = explanations.into_iter().collect();
    let Some(best) = candidates
        .iter()
        .copied()
        .reduce(|best, e| match strategy.compare(e, best) {
            Ordering::Greater => e,
            _ => best,
        })
    else {
        return ExplanationSet::new();
    };
    candidates
        .into_iter()
        .filter(|e| strategy.is_equal(e, best))
        .cloned()
        .collect()
}
