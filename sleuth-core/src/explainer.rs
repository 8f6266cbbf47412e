//! # Hypothesis-based explainer
//!
//! The explainer owns the learn / generate / test loop:
//!
//! ```text
//! SEEDED -> FEATURIZED -> LEARNING -> GENERATING -> TESTING -> (LEARNING | TERMINATED)
//! ```
//!
//! Seeds are parsed and labeled by the oracle, featurized, and handed to
//! the learner. The resulting explanations steer the generation engine; new
//! inputs are labeled, featurized and merged into the working set. The loop
//! stops after `max_iterations` rounds, when a round yields no new distinct
//! input, or when the cancellation token fires. Cancellation is checked once
//! per round.
//!
//! Use [`ExplainerBuilder`] to assemble an explainer.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::GenerationEngine;
use crate::error::{ExplainerError, SleuthError};
use crate::explanation::ExplanationSet;
use crate::features::{FeatureCollector, GrammarFeatureCollector};
use crate::fitness::{FitnessStrategy, RecallPriorityLengthFitness, best_of};
use crate::grammar::Grammar;
use crate::input::Input;
use crate::learner::{Learner, RelevanceFilter};
use crate::oracle::Oracle;

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainerState {
    Seeded,
    Featurized,
    Learning,
    Generating,
    Testing,
    Terminated,
}

impl fmt::Display for ExplainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExplainerState::Seeded => "SEEDED",
            ExplainerState::Featurized => "FEATURIZED",
            ExplainerState::Learning => "LEARNING",
            ExplainerState::Generating => "GENERATING",
            ExplainerState::Testing => "TESTING",
            ExplainerState::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    MaxIterations,
    /// A round produced no new distinct input.
    FixedPoint,
    Cancelled,
}

/// Which of the learned explanations steer generation each round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Steering {
    /// Everything the learner returned.
    #[default]
    All,
    /// Only the explanations tied for the best fitness score.
    Best,
}

enum Seed {
    Text(String),
    Input(Input),
}

// ---------------------------------------------------------------------------
// Explainer
// ---------------------------------------------------------------------------

pub struct HypothesisBasedExplainer {
    grammar: Grammar,
    oracle: Arc<dyn Oracle>,
    collector: Arc<dyn FeatureCollector>,
    learner: Box<dyn Learner>,
    engine: Box<dyn GenerationEngine>,
    relevance: Option<Box<dyn RelevanceFilter>>,
    strategy: Box<dyn FitnessStrategy>,
    steering: Steering,
    seeds: Vec<Seed>,
    max_iterations: usize,
    cancel: CancellationToken,
    state: ExplainerState,
    test_inputs: HashSet<Input>,
    iterations: usize,
    termination: Option<TerminationReason>,
}

impl HypothesisBasedExplainer {
    pub fn builder(grammar: Grammar) -> ExplainerBuilder {
        ExplainerBuilder::new(grammar)
    }

    pub fn state(&self) -> ExplainerState {
        self.state
    }

    /// The working set of labeled inputs.
    pub fn test_inputs(&self) -> &HashSet<Input> {
        &self.test_inputs
    }

    /// Everything the learner currently holds, not only the best.
    pub fn explanations(&self) -> &ExplanationSet {
        self.learner.explanations()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn iterations_run(&self) -> usize {
        self.iterations
    }

    pub fn termination_reason(&self) -> Option<TerminationReason> {
        self.termination
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Run the loop and return the best explanations under the configured
    /// fitness strategy.
    ///
    /// Oracle errors abort the run. Learning failures keep the previous
    /// explanations, and generation shortfalls only shorten a round.
    pub fn explain(&mut self) -> Result<ExplanationSet, SleuthError> {
        self.state = ExplainerState::Seeded;
        let seeds = self.prepare_seeds()?;
        info!(seeds = seeds.len(), "Starting explanation loop");
        self.label(&seeds)?;
        self.test_inputs.extend(seeds);

        self.featurize_all();
        self.state = ExplainerState::Featurized;

        let mut dirty = true;
        let mut reason = TerminationReason::MaxIterations;
        for iteration in 0..self.max_iterations {
            if self.cancel.is_cancelled() {
                reason = TerminationReason::Cancelled;
                break;
            }
            info!(iteration, inputs = self.test_inputs.len(), "Starting iteration");

            let learned = self.learn();
            dirty = false;
            let explanations = match self.steering {
                Steering::All => learned,
                Steering::Best => best_of(learned.iter(), self.strategy.as_ref()),
            };
            debug!(steering = explanations.len(), "Selected steering explanations");

            self.state = ExplainerState::Generating;
            let generated = self.engine.generate(&explanations);

            self.state = ExplainerState::Testing;
            let fresh: Vec<Input> = generated
                .into_iter()
                .filter(|i| !self.test_inputs.contains(i))
                .collect();
            self.iterations += 1;
            if fresh.is_empty() {
                info!(iteration, "No new inputs; reached a fixed point");
                reason = TerminationReason::FixedPoint;
                break;
            }
            self.label(&fresh)?;
            for input in &fresh {
                self.collector.featurize(input);
            }
            let failing = fresh.iter().filter(|i| i.is_failing()).count();
            info!(iteration, new = fresh.len(), failing, "Tested generated inputs");
            self.test_inputs.extend(fresh);
            dirty = true;
        }

        if dirty && reason != TerminationReason::Cancelled {
            self.learn();
        }
        self.termination = Some(reason);
        self.state = ExplainerState::Terminated;

        let best = self.learner.best_explanations(self.strategy.as_ref());
        info!(
            ?reason,
            iterations = self.iterations,
            explanations = self.learner.explanations().len(),
            best = best.len(),
            "Explanation loop finished"
        );
        Ok(best)
    }

    fn prepare_seeds(&mut self) -> Result<Vec<Input>, ExplainerError> {
        let mut inputs = Vec::new();
        for seed in self.seeds.drain(..) {
            match seed {
                Seed::Input(input) => inputs.push(input),
                Seed::Text(text) => match Input::from_str(&self.grammar, &text) {
                    Ok(input) => inputs.push(input),
                    Err(e) => warn!(seed = %text, error = %e, "Skipping seed that does not parse"),
                },
            }
        }
        if inputs.is_empty() && self.test_inputs.is_empty() {
            return Err(ExplainerError::NoSeedInputs);
        }
        Ok(inputs)
    }

    /// Ask the oracle about every input that has no label yet.
    fn label(&self, inputs: &[Input]) -> Result<(), SleuthError> {
        for input in inputs.iter().filter(|i| i.oracle().is_none()) {
            let verdict = self.oracle.classify(input.text())?;
            debug!(input = %input, %verdict, "Labeled input");
            input.set_oracle(verdict);
        }
        Ok(())
    }

    fn featurize_all(&self) {
        for input in &self.test_inputs {
            self.collector.featurize(input);
        }
    }

    fn learn(&mut self) -> ExplanationSet {
        self.state = ExplainerState::Learning;
        let exclude = match self.relevance.as_mut() {
            Some(filter) => filter
                .irrelevant_nonterminals(&self.test_inputs)
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Relevance filter failed; excluding nothing");
                    HashSet::new()
                }),
            None => HashSet::new(),
        };
        if !exclude.is_empty() {
            debug!(excluded = ?exclude, "Irrelevant nonterminals");
        }
        match self.learner.learn_explanation(&self.test_inputs, &exclude) {
            Ok(explanations) => {
                info!(
                    learner = self.learner.name(),
                    explanations = explanations.len(),
                    "Learned explanations"
                );
                explanations
            }
            Err(e) => {
                warn!(error = %e, "Learning failed; keeping previous explanations");
                self.learner.explanations().clone()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Fluent construction of a [`HypothesisBasedExplainer`].
///
/// An oracle, a learner and a generation engine are required. The feature
/// collector defaults to [`GrammarFeatureCollector`], the fitness
/// strategy to [`RecallPriorityLengthFitness`] and steering to
/// [`Steering::All`].
pub struct ExplainerBuilder {
    grammar: Grammar,
    oracle: Option<Arc<dyn Oracle>>,
    collector: Option<Arc<dyn FeatureCollector>>,
    learner: Option<Box<dyn Learner>>,
    engine: Option<Box<dyn GenerationEngine>>,
    relevance: Option<Box<dyn RelevanceFilter>>,
    strategy: Option<Box<dyn FitnessStrategy>>,
    steering: Steering,
    seeds: Vec<Seed>,
    max_iterations: usize,
    cancel: Option<CancellationToken>,
}

impl ExplainerBuilder {
    pub fn new(grammar: Grammar) -> Self {
        Self {
            grammar,
            oracle: None,
            collector: None,
            learner: None,
            engine: None,
            relevance: None,
            strategy: None,
            steering: Steering::All,
            seeds: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            cancel: None,
        }
    }

    pub fn oracle(mut self, oracle: impl Oracle + 'static) -> Self {
        self.oracle = Some(Arc::new(oracle));
        self
    }

    pub fn shared_oracle(mut self, oracle: Arc<dyn Oracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn collector(mut self, collector: Arc<dyn FeatureCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn learner(mut self, learner: impl Learner + 'static) -> Self {
        self.learner = Some(Box::new(learner));
        self
    }

    pub fn engine(mut self, engine: impl GenerationEngine + 'static) -> Self {
        self.engine = Some(Box::new(engine));
        self
    }

    pub fn relevance_filter(mut self, filter: impl RelevanceFilter + 'static) -> Self {
        self.relevance = Some(Box::new(filter));
        self
    }

    pub fn fitness(mut self, strategy: impl FitnessStrategy + 'static) -> Self {
        self.strategy = Some(Box::new(strategy));
        self
    }

    pub fn steering(mut self, steering: Steering) -> Self {
        self.steering = steering;
        self
    }

    /// Seed strings, parsed when the loop starts. Unparseable seeds are
    /// skipped with a warning.
    pub fn seeds<I, S>(mut self, seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seeds
            .extend(seeds.into_iter().map(|s| Seed::Text(s.into())));
        self
    }

    /// Ready-made inputs; existing labels are kept.
    pub fn seed_inputs(mut self, inputs: impl IntoIterator<Item = Input>) -> Self {
        self.seeds.extend(inputs.into_iter().map(Seed::Input));
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Result<HypothesisBasedExplainer, ExplainerError> {
        let missing = |component: &str| ExplainerError::MissingComponent {
            component: component.to_string(),
        };
        let oracle = self.oracle.ok_or_else(|| missing("oracle"))?;
        let learner = self.learner.ok_or_else(|| missing("learner"))?;
        let engine = self.engine.ok_or_else(|| missing("generation engine"))?;
        let collector = self
            .collector
            .unwrap_or_else(|| Arc::new(GrammarFeatureCollector::new(&self.grammar)));
        Ok(HypothesisBasedExplainer {
            grammar: self.grammar,
            oracle,
            collector,
            learner,
            engine,
            relevance: self.relevance,
            strategy: self
                .strategy
                .unwrap_or_else(|| Box::new(RecallPriorityLengthFitness)),
            steering: self.steering,
            seeds: self.seeds,
            max_iterations: self.max_iterations,
            cancel: self.cancel.unwrap_or_default(),
            state: ExplainerState::Seeded,
            test_inputs: HashSet::new(),
            iterations: 0,
            termination: None,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
