//! Property-based tests for the decision tree using proptest.

use proptest::prelude::*;

use sleuth_ml::{DecisionTreeClassifier, DecisionTreeConfig, PathCondition, TrainingTable};

fn table_strategy() -> impl Strategy<Value = (Vec<Vec<f64>>, Vec<bool>)> {
    prop::collection::vec(
        (prop::collection::vec(0u8..5, 3), any::<bool>()),
        1..40,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(values, label)| (values.into_iter().map(f64::from).collect(), label))
            .unzip()
    })
}

fn fit(
    rows: Vec<Vec<f64>>,
    labels: Vec<bool>,
    max_depth: Option<usize>,
) -> (DecisionTreeClassifier, Vec<Vec<f64>>) {
    let columns = vec!["a".to_string(), "b".to_string(), "c".to_string()];
    let table = TrainingTable::from_rows(columns, rows.clone(), labels).unwrap();
    let mut tree = DecisionTreeClassifier::new(DecisionTreeConfig {
        max_depth,
        min_samples_split: 2,
    });
    tree.fit(&table).unwrap();
    (tree, rows)
}

fn satisfies(row: &[f64], path: &[PathCondition], names: &[String]) -> bool {
    path.iter().all(|c| {
        let idx = names.iter().position(|n| *n == c.feature).unwrap();
        c.comparison.holds(row[idx], c.threshold)
    })
}

proptest! {
    /// A row is predicted failing exactly when some failing path covers it.
    #[test]
    fn failing_paths_match_predictions(
        (rows, labels) in table_strategy(),
        max_depth in prop::option::of(1usize..4),
    ) {
        let (tree, rows) = fit(rows, labels, max_depth);
        let paths = tree.failing_paths();
        for row in &rows {
            let covered = paths.iter().any(|p| satisfies(row, p, tree.feature_names()));
            prop_assert_eq!(tree.predict_row(row).unwrap(), covered);
        }
    }

    #[test]
    fn importances_are_normalized((rows, labels) in table_strategy()) {
        let (tree, _) = fit(rows, labels, None);
        let total: f64 = tree.feature_importances().iter().map(|(_, v)| v).sum();
        prop_assert!(total == 0.0 || (total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn depth_respects_limit((rows, labels) in table_strategy(), max_depth in 1usize..4) {
        let (tree, _) = fit(rows, labels, Some(max_depth));
        prop_assert!(tree.depth() <= max_depth);
    }
}
