//! # Sleuth Core
//!
//! Core library for Sleuth, a hypothesis-based failure explainer.
//! Provides the input model, grammars and derivation trees, the hypothesis
//! language, explanations and their scoring, the learner and generator
//! capabilities, and the learn/generate/test loop that ties them together.

pub mod config;
pub mod engine;
pub mod error;
pub mod explainer;
pub mod explanation;
pub mod features;
pub mod fitness;
pub mod formula;
pub mod fuzzer;
pub mod generator;
pub mod grammar;
pub mod input;
pub mod learner;
pub mod logging;
pub mod oracle;
pub mod parser;
pub mod report;
pub mod tree;

// Re-export commonly used types at the crate root.
pub use config::{SleuthConfig, load_config};
pub use engine::{GenerationEngine, GeneratorFactory, ParallelEngine, SingleEngine};
pub use error::{Result, SleuthError};
pub use explainer::{
    ExplainerBuilder, ExplainerState, HypothesisBasedExplainer, Steering, TerminationReason,
};
pub use explanation::{Explanation, ExplanationSet};
pub use features::{Feature, FeatureCollector, FeatureKind, FeatureVector, GrammarFeatureCollector};
pub use fitness::{
    F1ScoreFitness, FitnessStrategy, RecallPriorityFitness, RecallPriorityLengthFitness,
};
pub use formula::{Bound, Comparison, Formula, Predicate};
pub use fuzzer::GrammarFuzzer;
pub use generator::{ConstraintGenerator, FuzzingGenerator, Generator};
pub use grammar::{Grammar, START_SYMBOL};
pub use input::Input;
pub use learner::{DefaultExplanationNegation, ExplanationNegation, Learner, RelevanceFilter};
pub use oracle::{Oracle, OracleResult};
pub use parser::Parser;
pub use report::ExplanationReport;
pub use tree::DerivationTree;
