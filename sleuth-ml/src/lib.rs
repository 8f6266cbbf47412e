//! # sleuth-ml
//!
//! Learning strategies for Sleuth: a CART decision tree with balanced class
//! weights, the decision-boundary learner built on its failing paths, the
//! exhaustive pattern learner, decision-tree relevance ranking, and presets
//! that wire them into a [`sleuth_core::HypothesisBasedExplainer`].

pub mod dataset;
pub mod decision_tree;
pub mod error;
pub mod learners;
pub mod presets;

pub use dataset::TrainingTable;
pub use decision_tree::{DecisionTreeClassifier, DecisionTreeConfig, Node, PathCondition};
pub use error::MlError;
pub use learners::{
    AtomicCandidateConstructor, AtomicPattern, DecisionTreeLearner, DecisionTreeRelevanceLearner,
    PatternLearner,
};
pub use presets::{alhazen, avicenna};
