//! Learner strategies.

pub mod candidates;
pub mod pattern;
pub mod relevance;
pub mod tree;

pub use candidates::{AtomicCandidateConstructor, AtomicPattern};
pub use pattern::{PatternLearner, filter_by_recall, is_new_conjunction_valid};
pub use relevance::DecisionTreeRelevanceLearner;
pub use tree::{DecisionTreeLearner, path_hypotheses};
