//! Input generators.
//!
//! A [`Generator`] produces one input per call, optionally steered towards a
//! hypothesis set with [`Generator::configure`]. Returning `None` means
//! "nothing this time" and is never an error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::GenerationError;
use crate::features::FeatureCollector;
use crate::formula::Formula;
use crate::fuzzer::GrammarFuzzer;
use crate::input::Input;

/// Consecutive duplicates tolerated before a batch is given up.
const MAX_CONSECUTIVE_DUPLICATES: usize = 50;

pub trait Generator: Send {
    /// Steer subsequent generation towards `formula`; `None` removes the
    /// steering.
    fn configure(&mut self, formula: Option<&Formula>);

    fn generate(&mut self) -> Option<Input>;

    fn reset(&mut self) {}

    /// Collect up to `num_inputs` distinct inputs within `time_out`.
    fn generate_test_inputs(&mut self, num_inputs: usize, time_out: Duration) -> HashSet<Input> {
        let start = Instant::now();
        let mut inputs = HashSet::new();
        let mut duplicates = 0;
        while inputs.len() < num_inputs && start.elapsed() < time_out {
            let Some(input) = self.generate() else {
                break;
            };
            if inputs.insert(input) {
                duplicates = 0;
            } else {
                duplicates += 1;
                if duplicates >= MAX_CONSECUTIVE_DUPLICATES {
                    debug!(produced = inputs.len(), "Generator keeps repeating itself; stopping");
                    break;
                }
            }
        }
        inputs
    }
}

/// Unsteered random generation.
#[derive(Debug, Clone)]
pub struct FuzzingGenerator {
    fuzzer: GrammarFuzzer,
}

impl FuzzingGenerator {
    pub fn new(fuzzer: GrammarFuzzer) -> Self {
        Self { fuzzer }
    }
}

impl Generator for FuzzingGenerator {
    fn configure(&mut self, _formula: Option<&Formula>) {}

    fn generate(&mut self) -> Option<Input> {
        Some(Input::new(self.fuzzer.fuzz()))
    }
}

/// Rejection sampling: fuzz candidates until one satisfies the configured
/// formula, giving up after `max_attempts`.
pub struct ConstraintGenerator {
    fuzzer: GrammarFuzzer,
    collector: Option<Arc<dyn FeatureCollector>>,
    formula: Option<Formula>,
    max_attempts: usize,
}

impl ConstraintGenerator {
    pub fn new(fuzzer: GrammarFuzzer, max_attempts: usize) -> Self {
        Self {
            fuzzer,
            collector: None,
            formula: None,
            max_attempts,
        }
    }

    /// Needed for formulas over feature vectors.
    pub fn with_collector(mut self, collector: Arc<dyn FeatureCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    fn satisfies(&self, formula: &Formula, candidate: &Input) -> bool {
        if formula.uses_features() {
            if let Some(collector) = &self.collector {
                collector.featurize(candidate);
            }
        }
        match formula.evaluate(candidate) {
            Ok(verdict) => verdict,
            Err(e) => {
                debug!(error = %e, candidate = %candidate, "Rejecting unevaluable candidate");
                false
            }
        }
    }
}

impl Generator for ConstraintGenerator {
    fn configure(&mut self, formula: Option<&Formula>) {
        self.formula = formula.cloned();
    }

    fn generate(&mut self) -> Option<Input> {
        let Some(formula) = self.formula.clone() else {
            return Some(Input::new(self.fuzzer.fuzz()));
        };
        for _ in 0..self.max_attempts {
            let candidate = Input::new(self.fuzzer.fuzz());
            if self.satisfies(&formula, &candidate) {
                return Some(candidate);
            }
        }
        let exhausted = GenerationError::Exhausted {
            attempts: self.max_attempts,
        };
        debug!(formula = %formula, "{exhausted}");
        None
    }

    fn reset(&mut self) {
        self.formula = None;
    }
}
