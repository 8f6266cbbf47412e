//! CART decision trees for binary failing/passing classification.
//!
//! Splits minimize weighted Gini impurity under balanced class weights
//! (`w_c = n / (2 * n_c)`), so a handful of failing rows weighs as much as
//! many passing ones. Candidate thresholds are midpoints between consecutive
//! distinct values. Features are scanned in column order and a later
//! candidate only wins when it is strictly better, which makes ties resolve
//! towards earlier columns.

use serde::{Deserialize, Serialize};
use sleuth_core::Comparison;
use std::fmt::Write as _;

use crate::dataset::TrainingTable;
use crate::error::MlError;

const FAILING: usize = 0;
const PASSING: usize = 1;
const MIN_IMPROVEMENT: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeConfig {
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for DecisionTreeConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

/// A tree node. `weights` are class-weighted sample totals as
/// `[failing, passing]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        weights: [f64; 2],
        samples: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        weights: [f64; 2],
        samples: usize,
    },
}

impl Node {
    pub fn weights(&self) -> [f64; 2] {
        match self {
            Node::Leaf { weights, .. } | Node::Split { weights, .. } => *weights,
        }
    }

    pub fn samples(&self) -> usize {
        match self {
            Node::Leaf { samples, .. } | Node::Split { samples, .. } => *samples,
        }
    }

    /// Majority class under the class weights; ties go to failing.
    pub fn predicts_failing(&self) -> bool {
        let w = self.weights();
        w[FAILING] >= w[PASSING]
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf { .. })
    }
}

/// One literal on a root-to-leaf path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathCondition {
    pub feature: String,
    pub comparison: Comparison,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    config: DecisionTreeConfig,
    features: Vec<String>,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTreeClassifier {
    pub fn new(config: DecisionTreeConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn fit(&mut self, table: &TrainingTable) -> Result<(), MlError> {
        if table.n_rows() == 0 {
            return Err(MlError::NoLabeledData);
        }
        if self.config.min_samples_split < 2 {
            return Err(MlError::invalid_input("min_samples_split must be at least 2"));
        }
        let (n_failing, n_passing) = table.class_counts();
        let n = table.n_rows() as f64;
        let class_weight = |count: usize| if count == 0 { 0.0 } else { n / (2.0 * count as f64) };
        let weights = [class_weight(n_failing), class_weight(n_passing)];

        self.features = table.columns().to_vec();
        self.nodes.clear();
        self.importances = vec![0.0; table.n_features()];

        let indices: Vec<usize> = (0..table.n_rows()).collect();
        self.grow(table, &weights, indices, 0);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.importances {
                *imp /= total;
            }
        }
        Ok(())
    }

    fn grow(
        &mut self,
        table: &TrainingTable,
        class_weights: &[f64; 2],
        indices: Vec<usize>,
        depth: usize,
    ) -> usize {
        let node_weights = totals(table, class_weights, &indices);
        let impurity = gini(node_weights);
        let samples = indices.len();
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf {
            weights: node_weights,
            samples,
        });

        let at_depth_limit = self.config.max_depth.is_some_and(|d| depth >= d);
        if impurity <= 0.0 || samples < self.config.min_samples_split || at_depth_limit {
            return idx;
        }
        let Some(best) = best_split(table, class_weights, &indices) else {
            return idx;
        };
        if impurity - best.impurity <= MIN_IMPROVEMENT {
            return idx;
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&r| table.rows()[r][best.feature] <= best.threshold);
        let left_weights = totals(table, class_weights, &left_rows);
        let right_weights = totals(table, class_weights, &right_rows);
        self.importances[best.feature] += weight_sum(node_weights) * impurity
            - weight_sum(left_weights) * gini(left_weights)
            - weight_sum(right_weights) * gini(right_weights);

        let left = self.grow(table, class_weights, left_rows, depth + 1);
        let right = self.grow(table, class_weights, right_rows, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left,
            right,
            weights: node_weights,
            samples,
        };
        idx
    }

    pub fn is_fitted(&self) -> bool {
        !self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn root(&self) -> Option<&Node> {
        self.nodes.first()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.features
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Normalized impurity-decrease importance per feature, in column order.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.features
            .iter()
            .cloned()
            .zip(self.importances.iter().copied())
            .collect()
    }

    /// Classify one row laid out like the training columns.
    pub fn predict_row(&self, row: &[f64]) -> Result<bool, MlError> {
        if self.nodes.is_empty() {
            return Err(MlError::model("tree is not fitted"));
        }
        if row.len() != self.features.len() {
            return Err(MlError::invalid_input(format!(
                "row has {} values, expected {}",
                row.len(),
                self.features.len()
            )));
        }
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return Ok(self.nodes[idx].predicts_failing()),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => idx = if row[*feature] <= *threshold { *left } else { *right },
            }
        }
    }

    /// Conditions along every root-to-leaf path that ends in a failing
    /// prediction.
    ///
    /// A split whose children are both leaves predicting the same class adds
    /// nothing: traversal stops there, and the path so far is kept if that
    /// class is failing.
    pub fn failing_paths(&self) -> Vec<Vec<PathCondition>> {
        let mut paths = Vec::new();
        if !self.nodes.is_empty() {
            self.collect_paths(0, &mut Vec::new(), &mut paths);
        }
        paths
    }

    fn collect_paths(
        &self,
        idx: usize,
        path: &mut Vec<PathCondition>,
        out: &mut Vec<Vec<PathCondition>>,
    ) {
        match &self.nodes[idx] {
            Node::Leaf { .. } => {
                if self.nodes[idx].predicts_failing() {
                    out.push(path.clone());
                }
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                let (l, r) = (&self.nodes[*left], &self.nodes[*right]);
                if l.is_leaf() && r.is_leaf() && l.predicts_failing() == r.predicts_failing() {
                    if l.predicts_failing() {
                        out.push(path.clone());
                    }
                    return;
                }
                let name = &self.features[*feature];
                let branches = [(*left, Comparison::LessEqual), (*right, Comparison::Greater)];
                for (child, comparison) in branches {
                    path.push(PathCondition {
                        feature: name.clone(),
                        comparison,
                        threshold: *threshold,
                    });
                    self.collect_paths(child, path, out);
                    path.pop();
                }
            }
        }
    }

    /// Human-readable if/else rendering. Existence features split at 0.5
    /// read as `if exists(...):`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.nodes.is_empty() {
            self.render_node(0, 0, &mut out);
        }
        out
    }

    fn render_node(&self, idx: usize, indent: usize, out: &mut String) {
        let pad = "    ".repeat(indent);
        match &self.nodes[idx] {
            Node::Leaf { samples, .. } => {
                let class = if self.nodes[idx].predicts_failing() { "FAILING" } else { "PASSING" };
                let _ = writeln!(out, "{pad}{class}  # samples={samples}");
            }
            Node::Split {
                feature,
                threshold,
                left,
                right,
                ..
            } => {
                let name = &self.features[*feature];
                if name.starts_with("exists(") && (threshold - 0.5).abs() < 1e-9 {
                    let _ = writeln!(out, "{pad}if {name}:");
                    self.render_node(*right, indent + 1, out);
                    let _ = writeln!(out, "{pad}else:");
                    self.render_node(*left, indent + 1, out);
                } else {
                    let _ = writeln!(out, "{pad}if {name} <= {threshold}:");
                    self.render_node(*left, indent + 1, out);
                    let _ = writeln!(out, "{pad}else:");
                    self.render_node(*right, indent + 1, out);
                }
            }
        }
    }
}

fn totals(table: &TrainingTable, class_weights: &[f64; 2], rows: &[usize]) -> [f64; 2] {
    let mut w = [0.0; 2];
    for &r in rows {
        let class = if table.labels()[r] { FAILING } else { PASSING };
        w[class] += class_weights[class];
    }
    w
}

fn weight_sum(w: [f64; 2]) -> f64 {
    w[0] + w[1]
}

fn gini(w: [f64; 2]) -> f64 {
    let total = weight_sum(w);
    if total <= 0.0 {
        return 0.0;
    }
    let (p, q) = (w[0] / total, w[1] / total);
    1.0 - p * p - q * q
}

fn best_split(
    table: &TrainingTable,
    class_weights: &[f64; 2],
    rows: &[usize],
) -> Option<SplitCandidate> {
    let total = weight_sum(totals(table, class_weights, rows));
    let mut best: Option<SplitCandidate> = None;
    for feature in 0..table.n_features() {
        let mut values: Vec<f64> = rows.iter().map(|&r| table.rows()[r][feature]).collect();
        values.sort_by(f64::total_cmp);
        values.dedup();
        for pair in values.windows(2) {
            let threshold = (pair[0] + pair[1]) / 2.0;
            let (mut left, mut right) = ([0.0; 2], [0.0; 2]);
            for &r in rows {
                let class = if table.labels()[r] { FAILING } else { PASSING };
                if table.rows()[r][feature] <= threshold {
                    left[class] += class_weights[class];
                } else {
                    right[class] += class_weights[class];
                }
            }
            let impurity =
                (weight_sum(left) * gini(left) + weight_sum(right) * gini(right)) / total;
            if best
                .as_ref()
                .is_none_or(|b| impurity < b.impurity - MIN_IMPROVEMENT)
            {
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: &[&str], rows: Vec<Vec<f64>>, labels: Vec<bool>) -> TrainingTable {
        let columns = columns.iter().map(|c| c.to_string()).collect();
        TrainingTable::from_rows(columns, rows, labels).unwrap()
    }

    /// Failing iff sqrt and negative; the two columns tie at the root.
    fn sqrt_table() -> TrainingTable {
        table(
            &["exists(<function> == sqrt)", "num(<number>)"],
            vec![
                vec![1.0, -900.0],
                vec![1.0, -1.0],
                vec![1.0, -42.0],
                vec![1.0, 4.0],
                vec![1.0, 16.0],
                vec![0.0, -3.0],
                vec![0.0, -900.0],
                vec![0.0, 10.0],
                vec![0.0, 5.0],
            ],
            vec![true, true, true, false, false, false, false, false, false],
        )
    }

    #[test]
    fn test_fit_sqrt_table() {
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig::default());
        tree.fit(&sqrt_table()).unwrap();
        assert_eq!(tree.depth(), 2);

        let Some(Node::Split { feature, threshold, weights, .. }) = tree.root() else {
            panic!("root should split");
        };
        assert_eq!(*feature, 0);
        assert_eq!(*threshold, 0.5);
        assert_eq!(*weights, [4.5, 4.5]);

        let paths = tree.failing_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0],
            vec![
                PathCondition {
                    feature: "exists(<function> == sqrt)".into(),
                    comparison: Comparison::Greater,
                    threshold: 0.5,
                },
                PathCondition {
                    feature: "num(<number>)".into(),
                    comparison: Comparison::LessEqual,
                    threshold: 1.5,
                },
            ]
        );
    }

    #[test]
    fn test_predict_row() {
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig::default());
        tree.fit(&sqrt_table()).unwrap();
        assert!(tree.predict_row(&[1.0, -7.0]).unwrap());
        assert!(!tree.predict_row(&[1.0, 7.0]).unwrap());
        assert!(!tree.predict_row(&[0.0, -7.0]).unwrap());
        assert!(tree.predict_row(&[1.0]).is_err());
    }

    #[test]
    fn test_importances_normalized() {
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig::default());
        tree.fit(&sqrt_table()).unwrap();
        let importances = tree.feature_importances();
        let total: f64 = importances.iter().map(|(_, v)| v).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(importances.iter().all(|(_, v)| *v > 0.0));
    }

    #[test]
    fn test_depth_limit() {
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig {
            max_depth: Some(1),
            min_samples_split: 2,
        });
        tree.fit(&sqrt_table()).unwrap();
        assert_eq!(tree.depth(), 1);
        // The sqrt side is 3 failing (4.5) vs 2 passing (1.5): a failing leaf.
        assert_eq!(tree.failing_paths().len(), 1);
        assert_eq!(tree.failing_paths()[0].len(), 1);
    }

    #[test]
    fn test_single_class_is_a_leaf() {
        let t = table(&["a"], vec![vec![1.0], vec![2.0]], vec![false, false]);
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig::default());
        tree.fit(&t).unwrap();
        assert_eq!(tree.nodes().len(), 1);
        assert!(tree.failing_paths().is_empty());
        assert!(tree.feature_importances().iter().all(|(_, v)| *v == 0.0));
    }

    #[test]
    fn test_redundant_split_collapses() {
        let mut tree = DecisionTreeClassifier {
            config: DecisionTreeConfig::default(),
            features: vec!["a".into(), "b".into()],
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                    weights: [3.0, 3.0],
                    samples: 6,
                },
                Node::Leaf {
                    weights: [0.0, 2.0],
                    samples: 2,
                },
                Node::Split {
                    feature: 1,
                    threshold: 2.5,
                    left: 3,
                    right: 4,
                    weights: [3.0, 1.0],
                    samples: 4,
                },
                Node::Leaf {
                    weights: [2.0, 0.5],
                    samples: 2,
                },
                Node::Leaf {
                    weights: [1.0, 0.5],
                    samples: 2,
                },
            ],
            importances: vec![0.5, 0.5],
        };
        let paths = tree.failing_paths();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].len(), 1);
        assert_eq!(paths[0][0].feature, "a");
        assert_eq!(paths[0][0].comparison, Comparison::Greater);

        if let Node::Leaf { weights, .. } = &mut tree.nodes[3] {
            *weights = [0.0, 1.0];
        }
        if let Node::Leaf { weights, .. } = &mut tree.nodes[4] {
            *weights = [0.0, 1.0];
        }
        assert!(tree.failing_paths().is_empty());
    }

    #[test]
    fn test_render_existence_and_numeric() {
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig::default());
        tree.fit(&sqrt_table()).unwrap();
        let text = tree.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "if exists(<function> == sqrt):");
        assert_eq!(lines[1], "    if num(<number>) <= 1.5:");
        assert!(lines[2].trim_start().starts_with("FAILING"));
        assert!(text.contains("else:"));
    }

    #[test]
    fn test_fit_rejects_bad_config() {
        let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig {
            max_depth: None,
            min_samples_split: 1,
        });
        assert!(tree.fit(&sqrt_table()).is_err());
    }
}
