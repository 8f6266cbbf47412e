//! Feature relevance ranking with a decision tree.

use std::collections::HashSet;

use sleuth_core::error::TrainingError;
use sleuth_core::{Feature, FeatureCollector, Grammar, Input, RelevanceFilter};
use tracing::debug;

use crate::dataset::TrainingTable;
use crate::decision_tree::{DecisionTreeClassifier, DecisionTreeConfig};

pub const DEFAULT_TOP_N_RELEVANT_FEATURES: usize = 3;

/// Ranks features by the impurity decrease they earn in a fitted tree.
///
/// The nonterminals behind the top-N features are relevant; every other
/// grammar nonterminal is reported as irrelevant. When no feature carries
/// any importance nothing is excluded.
pub struct DecisionTreeRelevanceLearner {
    nonterminals: Vec<String>,
    features: Vec<Feature>,
    top_n: usize,
    config: DecisionTreeConfig,
}

impl DecisionTreeRelevanceLearner {
    pub fn new(grammar: &Grammar, collector: &dyn FeatureCollector) -> Self {
        Self {
            nonterminals: grammar.nonterminals().map(str::to_string).collect(),
            features: collector.features().to_vec(),
            top_n: DEFAULT_TOP_N_RELEVANT_FEATURES,
            config: DecisionTreeConfig::default(),
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_config(mut self, config: DecisionTreeConfig) -> Self {
        self.config = config;
        self
    }

    /// The `top_n` most important features, most important first. Features
    /// with zero importance never count as relevant.
    pub fn relevant_features(
        &self,
        inputs: &HashSet<Input>,
    ) -> Result<Vec<Feature>, TrainingError> {
        let order: Vec<String> = self.features.iter().map(|f| f.name.clone()).collect();
        let table = TrainingTable::from_inputs(inputs, &order, &HashSet::new())?;
        let mut tree = DecisionTreeClassifier::new(self.config.clone());
        tree.fit(&table)?;

        let mut ranked: Vec<(String, f64)> = tree
            .feature_importances()
            .into_iter()
            .filter(|(_, importance)| *importance > 0.0)
            .collect();
        // Stable sort keeps column order among equal importances.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(self.top_n);
        debug!(relevant = ?ranked, "Ranked features");

        Ok(ranked
            .into_iter()
            .filter_map(|(name, _)| self.features.iter().find(|f| f.name == name).cloned())
            .collect())
    }
}

impl RelevanceFilter for DecisionTreeRelevanceLearner {
    fn irrelevant_nonterminals(
        &mut self,
        inputs: &HashSet<Input>,
    ) -> Result<HashSet<String>, TrainingError> {
        let relevant: HashSet<String> = self
            .relevant_features(inputs)?
            .into_iter()
            .map(|f| f.nonterminal)
            .collect();
        if relevant.is_empty() {
            return Ok(HashSet::new());
        }
        Ok(self
            .nonterminals
            .iter()
            .filter(|nt| !relevant.contains(*nt))
            .cloned()
            .collect())
    }
}
