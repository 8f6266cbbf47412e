//! Exhaustive pattern learner.
//!
//! Instantiates atomic hypotheses from [`AtomicCandidateConstructor`], keeps
//! the ones that hold for (almost) every failing input seen so far, and
//! strengthens them pairwise into conjunctions that separate passing inputs
//! better than either part. State accumulates across calls:
//!
//! - every failing and passing input ever seen;
//! - the accepted explanations;
//! - the hashes of hypotheses already rejected, which are never revisited.

use std::collections::HashSet;

use sleuth_core::error::TrainingError;
use sleuth_core::learner::partition_inputs;
use sleuth_core::{Explanation, ExplanationSet, Grammar, Input, Learner};
use tracing::{debug, info};

use super::candidates::AtomicCandidateConstructor;

pub const DEFAULT_MIN_RECALL: f64 = 0.9;
pub const DEFAULT_MIN_SPECIFICITY: f64 = 0.6;
pub const DEFAULT_MAX_CONJUNCTION_SIZE: usize = 2;

pub struct PatternLearner {
    constructor: AtomicCandidateConstructor,
    min_recall: f64,
    min_specificity: f64,
    max_conjunction_size: usize,
    positive_inputs: HashSet<Input>,
    negative_inputs: HashSet<Input>,
    explanations: ExplanationSet,
    removed: HashSet<u64>,
}

impl PatternLearner {
    pub fn new(grammar: Grammar) -> Self {
        Self::with_constructor(AtomicCandidateConstructor::new(grammar))
    }

    pub fn with_constructor(constructor: AtomicCandidateConstructor) -> Self {
        Self {
            constructor,
            min_recall: DEFAULT_MIN_RECALL,
            min_specificity: DEFAULT_MIN_SPECIFICITY,
            max_conjunction_size: DEFAULT_MAX_CONJUNCTION_SIZE,
            positive_inputs: HashSet::new(),
            negative_inputs: HashSet::new(),
            explanations: ExplanationSet::new(),
            removed: HashSet::new(),
        }
    }

    pub fn with_min_recall(mut self, min_recall: f64) -> Self {
        self.min_recall = min_recall;
        self
    }

    pub fn with_min_specificity(mut self, min_specificity: f64) -> Self {
        self.min_specificity = min_specificity;
        self
    }

    pub fn with_max_conjunction_size(mut self, size: usize) -> Self {
        self.max_conjunction_size = size;
        self
    }

    /// Hashes of hypotheses rejected during this run.
    pub fn removed(&self) -> &HashSet<u64> {
        &self.removed
    }

    pub fn positive_inputs(&self) -> &HashSet<Input> {
        &self.positive_inputs
    }

    pub fn negative_inputs(&self) -> &HashSet<Input> {
        &self.negative_inputs
    }

    /// Re-check accepted explanations against the inputs first seen in
    /// this call; cached verdicts keep older inputs from being re-evaluated.
    fn revalidate(&mut self, fresh_failing: &HashSet<Input>, fresh_passing: &HashSet<Input>) {
        let min_recall = self.min_recall;
        let hashes: Vec<u64> = self
            .explanations
            .iter()
            .map(Explanation::hash_value)
            .collect();
        for hash in hashes {
            let keep = self.explanations.get_mut(hash).is_none_or(|accepted| {
                holds_on(accepted, fresh_failing, fresh_passing, min_recall)
            });
            if !keep {
                if let Some(revoked) = self.explanations.remove_hash(hash) {
                    debug!(hypothesis = %revoked.formula(), "Revoking explanation");
                }
                self.removed.insert(hash);
            }
        }
    }

    fn conjunctions(&self) -> Vec<Explanation> {
        let atoms: Vec<&Explanation> = self
            .explanations
            .iter()
            .filter(|e| !e.formula().is_conjunction())
            .collect();
        let mut out = Vec::new();
        for size in 2..=self.max_conjunction_size {
            for combination in combinations(atoms.len(), size) {
                let members: Vec<&Explanation> = combination.iter().map(|&i| atoms[i]).collect();
                if members.iter().any(|m| m.recall() < self.min_recall) {
                    continue;
                }
                let conjunction = members[1..]
                    .iter()
                    .fold(members[0].clone(), |acc, m| acc.and(m));
                if self.removed.contains(&conjunction.hash_value()) {
                    continue;
                }
                if is_new_conjunction_valid(&conjunction, &members, self.min_specificity) {
                    out.push(conjunction);
                }
            }
        }
        out
    }
}

/// Accept `candidate` if it keeps `min_recall` on `failing`, evaluating it
/// on `passing` as well in that case.
fn holds_on(
    candidate: &mut Explanation,
    failing: &HashSet<Input>,
    passing: &HashSet<Input>,
    min_recall: f64,
) -> bool {
    let outcome = candidate.evaluate(failing).and_then(|()| {
        if candidate.recall() >= min_recall {
            candidate.evaluate(passing).map(|()| true)
        } else {
            Ok(false)
        }
    });
    outcome.unwrap_or_else(|e| {
        debug!(hypothesis = %candidate.formula(), error = %e, "Candidate evaluation failed");
        false
    })
}

/// Split `candidates` into those reaching `min_recall` on `failing` and the
/// rest. Candidates that cannot be evaluated are rejected.
pub fn filter_by_recall(
    candidates: Vec<Explanation>,
    failing: &HashSet<Input>,
    min_recall: f64,
) -> (Vec<Explanation>, Vec<Explanation>) {
    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    for mut candidate in candidates {
        match candidate.evaluate(failing) {
            Ok(()) if candidate.recall() >= min_recall => kept.push(candidate),
            Ok(()) => rejected.push(candidate),
            Err(e) => {
                debug!(
                    hypothesis = %candidate.formula(),
                    error = %e,
                    "Dropping unevaluable candidate"
                );
                rejected.push(candidate);
            }
        }
    }
    (kept, rejected)
}

/// A conjunction is worth keeping when its specificity reaches
/// `min_specificity` and is strictly higher than each member's.
pub fn is_new_conjunction_valid(
    conjunction: &Explanation,
    members: &[&Explanation],
    min_specificity: f64,
) -> bool {
    let specificity = conjunction.specificity();
    specificity >= min_specificity && members.iter().all(|m| specificity > m.specificity())
}

/// All `k`-element index combinations of `0..n`, in lexicographic order.
fn combinations(n: usize, k: usize) -> Vec<Vec<usize>> {
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut out = Vec::new();
    let mut idx: Vec<usize> = (0..k).collect();
    loop {
        out.push(idx.clone());
        let Some(i) = (0..k).rev().find(|&i| idx[i] != i + n - k) else {
            return out;
        };
        idx[i] += 1;
        for j in i + 1..k {
            idx[j] = idx[j - 1] + 1;
        }
    }
}

impl Learner for PatternLearner {
    fn name(&self) -> &str {
        "pattern"
    }

    fn learn_explanation(
        &mut self,
        inputs: &HashSet<Input>,
        exclude_nonterminals: &HashSet<String>,
    ) -> Result<ExplanationSet, TrainingError> {
        let (failing, passing) = partition_inputs(inputs);
        let fresh_failing: HashSet<Input> =
            failing.difference(&self.positive_inputs).cloned().collect();
        let fresh_passing: HashSet<Input> =
            passing.difference(&self.negative_inputs).cloned().collect();
        self.positive_inputs.extend(failing);
        self.negative_inputs.extend(passing);
        if self.positive_inputs.is_empty() {
            return Err(TrainingError::NoLabeledData);
        }

        let atomic: Vec<Explanation> = self
            .constructor
            .construct(&self.positive_inputs, exclude_nonterminals)
            .into_iter()
            .map(Explanation::new)
            .filter(|e| !self.removed.contains(&e.hash_value()) && !self.explanations.contains(e))
            .collect();
        let (kept, rejected) = filter_by_recall(atomic, &self.positive_inputs, self.min_recall);
        debug!(
            kept = kept.len(),
            rejected = rejected.len(),
            "Filtered atomic candidates by recall"
        );
        self.removed.extend(rejected.iter().map(Explanation::hash_value));

        self.revalidate(&fresh_failing, &fresh_passing);
        for mut candidate in kept {
            let (failing, passing) = (&self.positive_inputs, &self.negative_inputs);
            if holds_on(&mut candidate, failing, passing, self.min_recall) {
                self.explanations.append(candidate);
            } else {
                self.removed.insert(candidate.hash_value());
            }
        }

        let conjunctions = self.conjunctions();
        let added = conjunctions
            .into_iter()
            .filter(|c| self.explanations.append(c.clone()))
            .count();
        info!(
            explanations = self.explanations.len(),
            conjunctions = added,
            removed = self.removed.len(),
            "Pattern learner updated"
        );
        Ok(self.explanations.clone())
    }

    fn explanations(&self) -> &ExplanationSet {
        &self.explanations
    }

    fn reset(&mut self) {
        self.positive_inputs.clear();
        self.negative_inputs.clear();
        self.explanations.clear();
        self.removed.clear();
    }
}
