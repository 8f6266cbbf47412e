//! Ready-made explainer configurations.
//!
//! - [`alhazen`]: decision-tree path learner.
//! - [`avicenna`]: pattern learner with decision-tree relevance exclusion.
//!
//! Both generate through [`ConstraintGenerator`]s, inline for one worker and
//! on a thread pool otherwise. Alhazen steers generation with every learned
//! hypothesis, Avicenna only with the best ones. The returned builder can be customized further
//! before [`ExplainerBuilder::build`].

use std::sync::Arc;

use sleuth_core::config::{GeneratorConfig, LearnerConfig};
use sleuth_core::{
    ConstraintGenerator, ExplainerBuilder, FeatureCollector, Generator, GeneratorFactory, Grammar,
    GrammarFeatureCollector, GrammarFuzzer, Oracle, ParallelEngine, SingleEngine, SleuthConfig,
    SleuthError, Steering,
};
use tracing::debug;

use crate::decision_tree::DecisionTreeConfig;
use crate::learners::{
    AtomicCandidateConstructor, DecisionTreeLearner, DecisionTreeRelevanceLearner, PatternLearner,
};

/// Decision-tree explainer: hypotheses are failing tree paths and their
/// sign-flipped variants.
pub fn alhazen<I, S>(
    grammar: Grammar,
    oracle: impl Oracle + 'static,
    seeds: I,
    config: &SleuthConfig,
) -> Result<ExplainerBuilder, SleuthError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    config.validate()?;
    let collector = Arc::new(GrammarFeatureCollector::new(&grammar));
    let learner = DecisionTreeLearner::from_collector(collector.as_ref())
        .with_config(tree_config(&config.learner));
    let builder = ExplainerBuilder::new(grammar.clone())
        .oracle(oracle)
        .collector(collector.clone())
        .learner(learner)
        .steering(Steering::All)
        .seeds(seeds)
        .max_iterations(config.explainer.max_iterations);
    with_engine(builder, grammar, collector, &config.generator)
}

/// Pattern explainer: atomic structural hypotheses and their pairwise
/// conjunctions, restricted to the nonterminals a relevance tree ranks
/// highest.
pub fn avicenna<I, S>(
    grammar: Grammar,
    oracle: impl Oracle + 'static,
    seeds: I,
    config: &SleuthConfig,
) -> Result<ExplainerBuilder, SleuthError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    config.validate()?;
    let collector = Arc::new(GrammarFeatureCollector::new(&grammar));
    let constructor = AtomicCandidateConstructor::new(grammar.clone())
        .with_max_values(config.learner.max_atomic_values);
    let learner = PatternLearner::with_constructor(constructor)
    .with_min_recall(config.learner.min_recall)
    .with_min_specificity(config.learner.min_specificity)
    .with_max_conjunction_size(config.learner.max_conjunction_size);
    let relevance = DecisionTreeRelevanceLearner::new(&grammar, collector.as_ref())
        .with_top_n(config.explainer.top_n_relevant_features)
        .with_config(tree_config(&config.learner));
    let builder = ExplainerBuilder::new(grammar.clone())
        .oracle(oracle)
        .collector(collector.clone())
        .learner(learner)
        .relevance_filter(relevance)
        .steering(Steering::Best)
        .seeds(seeds)
        .max_iterations(config.explainer.max_iterations);
    with_engine(builder, grammar, collector, &config.generator)
}

fn tree_config(config: &LearnerConfig) -> DecisionTreeConfig {
    DecisionTreeConfig {
        max_depth: config.max_tree_depth,
        min_samples_split: config.min_samples_split,
    }
}

fn with_engine(
    builder: ExplainerBuilder,
    grammar: Grammar,
    collector: Arc<GrammarFeatureCollector>,
    config: &GeneratorConfig,
) -> Result<ExplainerBuilder, SleuthError> {
    let fuzzer = GrammarFuzzer::new(grammar)?
        .with_seed(config.seed)
        .with_max_depth(config.max_depth);
    let collector: Arc<dyn FeatureCollector> = collector;
    let max_attempts = config.max_attempts;

    if config.workers <= 1 {
        debug!("Generating inline");
        let generator = ConstraintGenerator::new(fuzzer, max_attempts).with_collector(collector);
        return Ok(builder.engine(SingleEngine::new(
            Box::new(generator),
            config.num_inputs,
            config.time_out(),
        )));
    }

    debug!(workers = config.workers, "Generating on worker threads");
    let seed = config.seed;
    let factory: GeneratorFactory = Arc::new(move |worker: usize| -> Box<dyn Generator> {
        // Distinct seeds keep workers from producing identical streams.
        let fuzzer = fuzzer
            .clone()
            .with_seed(seed.map(|s| s.wrapping_add(worker as u64)));
        Box::new(ConstraintGenerator::new(fuzzer, max_attempts).with_collector(collector.clone()))
    });
    Ok(builder.engine(ParallelEngine::new(
        factory,
        config.workers,
        config.num_inputs,
        config.time_out(),
    )))
}
