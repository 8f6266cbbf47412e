//! Generation engines: drive generators over a set of hypotheses.
//!
//! [`SingleEngine`] runs one generator inline. [`ParallelEngine`] pushes the
//! hypotheses onto a shared work queue consumed by worker threads; each
//! worker owns its own generator and sends what it produces back over a
//! channel.

use std::collections::{HashSet, VecDeque};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::explanation::ExplanationSet;
use crate::formula::Formula;
use crate::generator::Generator;
use crate::input::Input;

pub trait GenerationEngine: Send {
    /// Produce new inputs for every explanation; an empty set requests
    /// unsteered generation.
    fn generate(&mut self, explanations: &ExplanationSet) -> HashSet<Input>;
}

fn targets(explanations: &ExplanationSet) -> Vec<Option<Formula>> {
    if explanations.is_empty() {
        vec![None]
    } else {
        explanations
            .iter()
            .map(|e| Some(e.formula().clone()))
            .collect()
    }
}

/// Sequential generation with a single generator.
pub struct SingleEngine {
    generator: Box<dyn Generator>,
    num_inputs: usize,
    time_out: Duration,
}

impl SingleEngine {
    pub fn new(generator: Box<dyn Generator>, num_inputs: usize, time_out: Duration) -> Self {
        Self {
            generator,
            num_inputs,
            time_out,
        }
    }
}

impl GenerationEngine for SingleEngine {
    fn generate(&mut self, explanations: &ExplanationSet) -> HashSet<Input> {
        let mut produced = HashSet::new();
        for target in targets(explanations) {
            self.generator.configure(target.as_ref());
            let batch = self.generator.generate_test_inputs(self.num_inputs, self.time_out);
            let hypothesis = target
                .as_ref()
                .map_or_else(|| "<unsteered>".to_string(), ToString::to_string);
            debug!(
                %hypothesis,
                produced = batch.len(),
                "Generated inputs"
            );
            produced.extend(batch);
        }
        self.generator.reset();
        produced
    }
}

/// Builds a fresh generator for worker `n`.
pub type GeneratorFactory = Arc<dyn Fn(usize) -> Box<dyn Generator> + Send + Sync>;

/// Work-queue generation over several threads.
pub struct ParallelEngine {
    factory: GeneratorFactory,
    workers: usize,
    num_inputs: usize,
    time_out: Duration,
}

impl ParallelEngine {
    pub fn new(
        factory: GeneratorFactory,
        workers: usize,
        num_inputs: usize,
        time_out: Duration,
    ) -> Self {
        Self {
            factory,
            workers: workers.max(1),
            num_inputs,
            time_out,
        }
    }
}

impl GenerationEngine for ParallelEngine {
    fn generate(&mut self, explanations: &ExplanationSet) -> HashSet<Input> {
        let queue: Mutex<VecDeque<Option<Formula>>> = Mutex::new(targets(explanations).into());
        let (tx, rx) = mpsc::channel::<Input>();
        let (num_inputs, time_out) = (self.num_inputs, self.time_out);

        thread::scope(|scope| {
            let handles: Vec<_> = (0..self.workers)
                .map(|worker| {
                    let tx = tx.clone();
                    let queue = &queue;
                    let factory = Arc::clone(&self.factory);
                    scope.spawn(move || {
                        let mut generator = factory(worker);
                        while let Some(target) = next_target(queue) {
                            generator.configure(target.as_ref());
                            for input in generator.generate_test_inputs(num_inputs, time_out) {
                                if tx.send(input).is_err() {
                                    return;
                                }
                            }
                        }
                    })
                })
                .collect();
            for (worker, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    warn!("{}", GenerationError::WorkerFailed { worker });
                }
            }
        });
        drop(tx);
        rx.into_iter().collect()
    }
}

fn next_target(queue: &Mutex<VecDeque<Option<Formula>>>) -> Option<Option<Formula>> {
    queue.lock().ok().and_then(|mut q| q.pop_front())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::explanation::Explanation;
    use crate::formula::Predicate;
    use crate::fuzzer::GrammarFuzzer;
    use crate::generator::{ConstraintGenerator, FuzzingGenerator};
    use crate::grammar::tests::arithmetic_grammar;

    fn function_is(name: &str) -> Explanation {
        Explanation::new(
            Predicate::ExistsEquals {
                nonterminal: "<function>".into(),
                value: name.into(),
            }
            .into(),
        )
    }

    fn constraint_factory() -> GeneratorFactory {
        Arc::new(|worker: usize| {
            let fuzzer = GrammarFuzzer::new(arithmetic_grammar())
                .expect("valid grammar")
                .with_seed(Some(100 + worker as u64));
            Box::new(ConstraintGenerator::new(fuzzer, 5_000)) as Box<dyn Generator>
        })
    }

    #[test]
    fn test_single_engine_unsteered() {
        let fuzzer = GrammarFuzzer::new(arithmetic_grammar())
            .unwrap()
            .with_seed(Some(2));
        let mut engine = SingleEngine::new(
            Box::new(FuzzingGenerator::new(fuzzer)),
            4,
            Duration::from_secs(5),
        );
        assert_eq!(engine.generate(&ExplanationSet::new()).len(), 4);
    }

    #[test]
    fn test_single_engine_steered() {
        let factory = constraint_factory();
        let mut engine = SingleEngine::new(factory(0), 3, Duration::from_secs(5));
        let set: ExplanationSet = [function_is("tan")].into_iter().collect();
        let inputs = engine.generate(&set);
        assert!(!inputs.is_empty());
        assert!(inputs.iter().all(|i| i.text().starts_with("tan(")));
    }

    #[test]
    fn test_parallel_engine_covers_every_hypothesis() {
        let mut engine = ParallelEngine::new(constraint_factory(), 3, 3, Duration::from_secs(5));
        let set: ExplanationSet = ["sqrt", "sin", "cos", "tan"]
            .into_iter()
            .map(function_is)
            .collect();
        let inputs = engine.generate(&set);
        for name in ["sqrt(", "sin(", "cos(", "tan("] {
            assert!(
                inputs.iter().any(|i| i.text().starts_with(name)),
                "no input for {name}"
            );
        }
    }

    #[test]
    fn test_parallel_engine_survives_worker_panic() {
        let factory: GeneratorFactory = Arc::new(|worker: usize| {
            if worker == 0 {
                panic!("worker setup failed");
            }
            let fuzzer = GrammarFuzzer::new(arithmetic_grammar())
                .expect("valid grammar")
                .with_seed(Some(worker as u64));
            Box::new(FuzzingGenerator::new(fuzzer)) as Box<dyn Generator>
        });
        let mut engine = ParallelEngine::new(factory, 2, 2, Duration::from_secs(5));
        let set: ExplanationSet = [function_is("sqrt"), function_is("sin")].into_iter().collect();
        let inputs = engine.generate(&set);
        assert!(!inputs.is_empty());
    }
}
