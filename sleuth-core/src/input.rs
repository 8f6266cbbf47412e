//! Program inputs: a derivation tree plus its oracle label and features.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, OnceLock};

use crate::error::ParseError;
use crate::features::FeatureVector;
use crate::grammar::Grammar;
use crate::oracle::OracleResult;
use crate::parser::Parser;
use crate::tree::DerivationTree;

/// A shared handle to one program input.
///
/// The tree is immutable. The oracle label and feature vector are each
/// written at most once; later writes are ignored. Two inputs are equal when
/// their trees are structurally identical, regardless of labels.
#[derive(Clone)]
pub struct Input {
    inner: Arc<InputInner>,
}

struct InputInner {
    tree: DerivationTree,
    text: String,
    hash: u64,
    oracle: OnceLock<OracleResult>,
    features: OnceLock<FeatureVector>,
}

impl Input {
    pub fn new(tree: DerivationTree) -> Self {
        let text = tree.to_text();
        let hash = tree.structural_hash();
        Self {
            inner: Arc::new(InputInner {
                tree,
                text,
                hash,
                oracle: OnceLock::new(),
                features: OnceLock::new(),
            }),
        }
    }

    /// Parse `text` against `grammar`.
    pub fn from_str(grammar: &Grammar, text: &str) -> Result<Self, ParseError> {
        Parser::new(grammar).parse(text).map(Input::new)
    }

    pub fn with_oracle(self, oracle: OracleResult) -> Self {
        self.set_oracle(oracle);
        self
    }

    pub fn tree(&self) -> &DerivationTree {
        &self.inner.tree
    }

    pub fn text(&self) -> &str {
        &self.inner.text
    }

    pub fn hash_value(&self) -> u64 {
        self.inner.hash
    }

    pub fn oracle(&self) -> Option<OracleResult> {
        self.inner.oracle.get().copied()
    }

    pub fn is_failing(&self) -> bool {
        self.oracle().is_some_and(|o| o.is_failing())
    }

    /// Set the label. Returns `false` if one was already set.
    pub fn set_oracle(&self, oracle: OracleResult) -> bool {
        self.inner.oracle.set(oracle).is_ok()
    }

    pub fn features(&self) -> Option<&FeatureVector> {
        self.inner.features.get()
    }

    /// Attach a feature vector. Returns `false` if one was already set.
    pub fn set_features(&self, features: FeatureVector) -> bool {
        self.inner.features.set(features).is_ok()
    }

    /// Pre-order traversal of the underlying tree.
    pub fn traverse(&self) -> Vec<&DerivationTree> {
        self.inner.tree.traverse()
    }
}

impl PartialEq for Input {
    fn eq(&self, other: &Self) -> bool {
        self.inner.hash == other.inner.hash
    }
}

impl Eq for Input {}

impl Hash for Input {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash.hash(state);
    }
}

impl fmt::Display for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.text)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Input")
            .field("text", &self.inner.text)
            .field("oracle", &self.oracle())
            .field("featurized", &self.features().is_some())
            .finish()
    }
}
