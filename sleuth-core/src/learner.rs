//! Learner capability and helpers shared by the concrete strategies.

use std::collections::HashSet;

use crate::error::TrainingError;
use crate::explanation::{Explanation, ExplanationSet};
use crate::fitness::{FitnessStrategy, best_of};
use crate::input::Input;
use crate::oracle::OracleResult;

/// Turns labeled, featurized inputs into candidate explanations.
///
/// Learners may keep state across calls (accumulated inputs, pruned
/// hypotheses); [`Learner::reset`] returns them to a fresh state.
pub trait Learner: Send {
    fn name(&self) -> &str;

    /// Learn from `inputs`, ignoring hypotheses over any nonterminal in
    /// `exclude_nonterminals`.
    fn learn_explanation(
        &mut self,
        inputs: &HashSet<Input>,
        exclude_nonterminals: &HashSet<String>,
    ) -> Result<ExplanationSet, TrainingError>;

    /// The explanations produced by the last successful call.
    fn explanations(&self) -> &ExplanationSet;

    fn best_explanations(&self, strategy: &dyn FitnessStrategy) -> ExplanationSet {
        best_of(self.explanations(), strategy)
    }

    fn reset(&mut self);
}

/// Picks which nonterminals the learner may ignore.
pub trait RelevanceFilter: Send {
    fn irrelevant_nonterminals(
        &mut self,
        inputs: &HashSet<Input>,
    ) -> Result<HashSet<String>, TrainingError>;
}

/// Derives negated hypotheses from a set of explanations.
pub trait ExplanationNegation {
    fn negate_explanations(&self, explanations: &ExplanationSet) -> ExplanationSet;
}

/// Negates every member.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultExplanationNegation;

impl ExplanationNegation for DefaultExplanationNegation {
    fn negate_explanations(&self, explanations: &ExplanationSet) -> ExplanationSet {
        explanations.iter().map(Explanation::negate).collect()
    }
}

/// Split labeled inputs into `(failing, passing)`; unlabeled and undefined
/// inputs are dropped.
pub fn partition_inputs<'a, I>(inputs: I) -> (HashSet<Input>, HashSet<Input>)
where
    I: IntoIterator<Item = &'a Input>,
{
    let mut failing = HashSet::new();
    let mut passing = HashSet::new();
    for input in inputs {
        match input.oracle() {
            Some(OracleResult::Failing) => {
                failing.insert(input.clone());
            }
            Some(OracleResult::Passing) => {
                passing.insert(input.clone());
            }
            Some(OracleResult::Undefined) | None => {}
        }
    }
    (failing, passing)
}
