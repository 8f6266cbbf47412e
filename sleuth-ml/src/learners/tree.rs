//! Decision-boundary learner: hypotheses are the failing paths of a CART tree.

use std::collections::HashSet;

use sleuth_core::error::TrainingError;
use sleuth_core::{
    Explanation, ExplanationSet, Feature, FeatureCollector, Formula, Input, Learner,
    Predicate,
};
use tracing::debug;

use crate::dataset::TrainingTable;
use crate::decision_tree::{DecisionTreeClassifier, DecisionTreeConfig, PathCondition};

/// Fits a tree over all labeled inputs and turns each root-to-failing-leaf
/// path into a conjunction of feature literals.
///
/// Every path also contributes its sign-flipped variants: each non-empty
/// subset of its literals negated, `2^k - 1` per `k`-literal path.
pub struct DecisionTreeLearner {
    features: Vec<Feature>,
    config: DecisionTreeConfig,
    tree: Option<DecisionTreeClassifier>,
    explanations: ExplanationSet,
}

impl DecisionTreeLearner {
    /// `features` fixes the column order and maps columns to nonterminals.
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            features,
            config: DecisionTreeConfig::default(),
            tree: None,
            explanations: ExplanationSet::new(),
        }
    }

    pub fn from_collector(collector: &dyn FeatureCollector) -> Self {
        Self::new(collector.features().to_vec())
    }

    pub fn with_config(mut self, config: DecisionTreeConfig) -> Self {
        self.config = config;
        self
    }

    /// The tree fitted by the last successful call.
    pub fn tree(&self) -> Option<&DecisionTreeClassifier> {
        self.tree.as_ref()
    }

    fn skipped_columns(&self, exclude: &HashSet<String>) -> HashSet<String> {
        self.features
            .iter()
            .filter(|f| exclude.contains(&f.nonterminal))
            .map(|f| f.name.clone())
            .collect()
    }
}

/// The positive conjunction of `path` followed by its flipped variants.
pub fn path_hypotheses(path: &[PathCondition]) -> Vec<Formula> {
    let literal = |c: &PathCondition, flip: bool| -> Formula {
        let comparison = if flip { c.comparison.flip() } else { c.comparison };
        Predicate::feature(c.feature.clone(), comparison, c.threshold).into()
    };
    let k = path.len();
    (0u64..1 << k)
        .map(|mask| {
            Formula::and(
                path.iter()
                    .enumerate()
                    .map(|(i, c)| literal(c, mask & (1 << i) != 0)),
            )
        })
        .collect()
}

impl Learner for DecisionTreeLearner {
    fn name(&self) -> &str {
        "decision_tree"
    }

    fn learn_explanation(
        &mut self,
        inputs: &HashSet<Input>,
        exclude_nonterminals: &HashSet<String>,
    ) -> Result<ExplanationSet, TrainingError> {
        let order: Vec<String> = self.features.iter().map(|f| f.name.clone()).collect();
        let skip = self.skipped_columns(exclude_nonterminals);
        let table = TrainingTable::from_inputs(inputs, &order, &skip)?;

        let mut tree = DecisionTreeClassifier::new(self.config.clone());
        tree.fit(&table)?;
        let paths = tree.failing_paths();
        debug!(
            rows = table.n_rows(),
            columns = table.n_features(),
            depth = tree.depth(),
            paths = paths.len(),
            "Fitted decision tree"
        );

        let mut explanations = ExplanationSet::new();
        for path in &paths {
            for formula in path_hypotheses(path) {
                explanations.append(Explanation::new(formula));
            }
        }
        explanations
            .evaluate(table.inputs())
            .map_err(|e| TrainingError::Model {
                message: e.to_string(),
            })?;

        self.tree = Some(tree);
        self.explanations = explanations.clone();
        Ok(explanations)
    }

    fn explanations(&self) -> &ExplanationSet {
        &self.explanations
    }

    fn reset(&mut self) {
        self.tree = None;
        self.explanations.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{arithmetic_grammar, featurized};
    use sleuth_core::{
        Comparison, GrammarFeatureCollector, OracleResult, RecallPriorityLengthFitness,
    };

    fn learner() -> DecisionTreeLearner {
        DecisionTreeLearner::from_collector(&GrammarFeatureCollector::new(&arithmetic_grammar()))
    }

    fn inputs(cases: &[(&str, OracleResult)]) -> HashSet<Input> {
        let grammar = arithmetic_grammar();
        cases
            .iter()
            .map(|(s, o)| featurized(&grammar, s, *o))
            .collect()
    }

    #[test]
    fn test_path_hypotheses_flip_every_subset() {
        let path = vec![
            PathCondition {
                feature: "a".into(),
                comparison: Comparison::Greater,
                threshold: 0.5,
            },
            PathCondition {
                feature: "b".into(),
                comparison: Comparison::LessEqual,
                threshold: 2.0,
            },
        ];
        let shown: Vec<String> = path_hypotheses(&path).iter().map(|f| f.to_string()).collect();
        assert_eq!(shown.len(), 4);
        assert_eq!(shown[0], "a > 0.5 and b <= 2");
        assert!(shown.contains(&"a <= 0.5 and b > 2".to_string()));
    }

    #[test]
    fn test_learns_sqrt_from_four_seeds() {
        let inputs = inputs(&[
            ("sqrt(-900)", OracleResult::Failing),
            ("sin(-3)", OracleResult::Passing),
            ("cos(10)", OracleResult::Passing),
            ("tan(5)", OracleResult::Passing),
        ]);
        let mut learner = learner();
        let explanations = learner.learn_explanation(&inputs, &HashSet::new()).unwrap();
        assert_eq!(explanations.len(), 2);

        let best = learner.best_explanations(&RecallPriorityLengthFitness);
        let top = best.iter().next().unwrap();
        assert_eq!(top.formula().to_string(), "exists(<function> == sqrt)");
        assert_eq!(top.recall(), 1.0);
        assert_eq!(top.precision(), 1.0);
    }

    #[test]
    fn test_learns_sqrt_and_negative() {
        let inputs = inputs(&[
            ("sqrt(-900)", OracleResult::Failing),
            ("sqrt(-1)", OracleResult::Failing),
            ("sqrt(-42)", OracleResult::Failing),
            ("sqrt(4)", OracleResult::Passing),
            ("sqrt(16)", OracleResult::Passing),
            ("sin(-3)", OracleResult::Passing),
            ("cos(-900)", OracleResult::Passing),
            ("cos(10)", OracleResult::Passing),
            ("tan(5)", OracleResult::Passing),
            ("cos(1)", OracleResult::Undefined),
        ]);
        let mut learner = learner();
        let explanations = learner.learn_explanation(&inputs, &HashSet::new()).unwrap();
        assert_eq!(explanations.len(), 4);

        let positive = explanations.iter().next().unwrap();
        assert_eq!(
            positive.formula().to_string(),
            "exists(<function> == sqrt) and num(<number>) <= 1.5"
        );
        assert_eq!(positive.recall(), 1.0);
        assert_eq!(positive.precision(), 1.0);
        assert_eq!(positive.evaluated_count(), 9);
        assert!(explanations.iter().skip(1).all(|e| e.recall() == 0.0));
    }

    #[test]
    fn test_excluded_nonterminals_drop_columns() {
        let inputs = inputs(&[
            ("sqrt(-900)", OracleResult::Failing),
            ("sin(-3)", OracleResult::Passing),
            ("cos(10)", OracleResult::Passing),
        ]);
        let mut learner = learner();
        let exclude: HashSet<String> = ["<function>".to_string()].into_iter().collect();
        let explanations = learner.learn_explanation(&inputs, &exclude).unwrap();
        assert!(!explanations.is_empty());
        assert!(explanations
            .iter()
            .all(|e| !e.formula().to_string().contains("exists(<function>")));
        let tree = learner.tree().unwrap();
        assert!(tree
            .feature_names()
            .iter()
            .all(|c| !c.starts_with("exists(<function>")));
    }

    #[test]
    fn test_no_labeled_inputs_is_an_error() {
        let inputs = inputs(&[("cos(1)", OracleResult::Undefined)]);
        let mut learner = learner();
        assert!(matches!(
            learner.learn_explanation(&inputs, &HashSet::new()),
            Err(TrainingError::NoLabeledData)
        ));
        assert!(learner.explanations().is_empty());
    }
}
