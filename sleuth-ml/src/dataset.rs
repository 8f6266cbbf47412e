//! Training tables assembled from labeled, featurized inputs.

use std::collections::HashSet;

use sleuth_core::{Input, OracleResult};

use crate::error::MlError;

/// A dense feature matrix with binary labels (`true` = failing).
///
/// Rows are sorted by input text (then structural hash) so that fitting is
/// deterministic regardless of how the inputs were collected.
#[derive(Debug, Clone)]
pub struct TrainingTable {
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
    labels: Vec<bool>,
    inputs: Vec<Input>,
}

impl TrainingTable {
    /// Build a table from labeled inputs.
    ///
    /// Columns follow `feature_order`, followed by any other feature names in
    /// first-seen order; names in `skip_columns` are left out. Missing
    /// values are 0. Unlabeled and undefined inputs are skipped.
    pub fn from_inputs<'a, I>(
        inputs: I,
        feature_order: &[String],
        skip_columns: &HashSet<String>,
    ) -> Result<Self, MlError>
    where
        I: IntoIterator<Item = &'a Input>,
    {
        let mut labeled: Vec<&Input> = inputs
            .into_iter()
            .filter(|i| {
                matches!(
                    i.oracle(),
                    Some(OracleResult::Failing) | Some(OracleResult::Passing)
                )
            })
            .collect();
        if labeled.is_empty() {
            return Err(MlError::NoLabeledData);
        }
        labeled.sort_by(|a, b| {
            a.text()
                .cmp(b.text())
                .then(a.hash_value().cmp(&b.hash_value()))
        });

        let mut columns: Vec<String> = feature_order
            .iter()
            .filter(|c| !skip_columns.contains(*c))
            .cloned()
            .collect();
        let mut known: HashSet<String> = feature_order.iter().cloned().collect();
        for input in &labeled {
            let features = input
                .features()
                .ok_or_else(|| MlError::dataset(format!("input {input} has no features")))?;
            for name in features.names() {
                if known.insert(name.to_string()) && !skip_columns.contains(name) {
                    columns.push(name.to_string());
                }
            }
        }

        let mut rows = Vec::with_capacity(labeled.len());
        let mut labels = Vec::with_capacity(labeled.len());
        for input in &labeled {
            let features = input
                .features()
                .ok_or_else(|| MlError::dataset(format!("input {input} has no features")))?;
            rows.push(
                columns
                    .iter()
                    .map(|c| features.get(c).unwrap_or(0.0))
                    .collect(),
            );
            labels.push(input.is_failing());
        }

        Ok(Self {
            columns,
            rows,
            labels,
            inputs: labeled.into_iter().cloned().collect(),
        })
    }

    /// Build a table directly from values.
    pub fn from_rows(
        columns: Vec<String>,
        rows: Vec<Vec<f64>>,
        labels: Vec<bool>,
    ) -> Result<Self, MlError> {
        if rows.is_empty() {
            return Err(MlError::NoLabeledData);
        }
        if rows.len() != labels.len() {
            return Err(MlError::dataset(format!(
                "{} rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        if let Some(bad) = rows.iter().position(|r| r.len() != columns.len()) {
            return Err(MlError::dataset(format!(
                "row {bad} has {} values, expected {}",
                rows[bad].len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            rows,
            labels,
            inputs: Vec::new(),
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn labels(&self) -> &[bool] {
        &self.labels
    }

    /// The inputs behind each row, when built with [`TrainingTable::from_inputs`].
    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// `(failing, passing)` row counts.
    pub fn class_counts(&self) -> (usize, usize) {
        let failing = self.labels.iter().filter(|&&l| l).count();
        (failing, self.labels.len() - failing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{arithmetic_grammar, featurized};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_table_from_inputs() {
        let grammar = arithmetic_grammar();
        let inputs = vec![
            featurized(&grammar, "sin(-3)", OracleResult::Passing),
            featurized(&grammar, "sqrt(-900)", OracleResult::Failing),
            featurized(&grammar, "cos(10)", OracleResult::Undefined),
        ];
        let order = vec!["num(<number>)".to_string(), "exists(<function> == sqrt)".to_string()];
        let table = TrainingTable::from_inputs(&inputs, &order, &HashSet::new()).unwrap();
        assert_eq!(table.n_rows(), 2);
        assert_eq!(table.columns()[..2], order[..]);
        assert_eq!(table.inputs()[0].text(), "sin(-3)");
        assert_eq!(table.rows()[0][..2], [-3.0, 0.0]);
        assert_eq!(table.rows()[1][..2], [-900.0, 1.0]);
        assert_eq!(table.labels(), &[false, true]);
        assert_eq!(table.class_counts(), (1, 1));
    }

    #[test]
    fn test_missing_values_are_zero_and_skips_apply() {
        let grammar = arithmetic_grammar();
        let inputs = vec![
            featurized(&grammar, "tan(5)", OracleResult::Passing),
            featurized(&grammar, "sqrt(-42)", OracleResult::Failing),
        ];
        let skip: HashSet<String> = ["num(<number>)".to_string()].into_iter().collect();
        let table = TrainingTable::from_inputs(&inputs, &[], &skip).unwrap();
        assert!(!table.columns().contains(&"num(<number>)".to_string()));
        let digits = table
            .columns()
            .iter()
            .position(|c| c == "num(<digits>)")
            .unwrap();
        let tan_row = &table.rows()[1];
        assert_eq!(table.inputs()[1].text(), "tan(5)");
        assert_eq!(tan_row[digits], 0.0);
    }

    #[test]
    fn test_no_labeled_rows() {
        let grammar = arithmetic_grammar();
        let inputs = vec![featurized(&grammar, "cos(1)", OracleResult::Undefined)];
        assert!(matches!(
            TrainingTable::from_inputs(&inputs, &[], &HashSet::new()),
            Err(MlError::NoLabeledData)
        ));
    }

    #[test]
    fn test_from_rows_validates_shape() {
        let columns = vec!["a".to_string()];
        let ragged = TrainingTable::from_rows(columns.clone(), vec![vec![1.0, 2.0]], vec![true]);
        assert!(ragged.is_err());
        assert!(TrainingTable::from_rows(columns.clone(), vec![vec![1.0]], vec![]).is_err());
        assert!(TrainingTable::from_rows(columns, vec![vec![1.0]], vec![true]).is_ok());
    }
}
