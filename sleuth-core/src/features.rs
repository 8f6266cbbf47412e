//! Grammar-derived feature extraction.
//!
//! For every nonterminal `N`, in grammar order, the collector produces:
//!
//! - `exists(N)`: 1.0 when `N` occurs in the derivation tree, else 0.0
//! - `exists(N == alt)`: 1.0 when some occurrence of `N` was expanded with
//!   alternative `alt`, else 0.0
//! - `num(N)`: the largest numeric value among occurrences of `N`, only for
//!   nonterminals that derive numeric text; absent when nothing parses

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::grammar::{Grammar, Symbol, expansion_symbols};
use crate::input::Input;
use crate::tree::DerivationTree;

/// An ordered mapping from feature name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    /// Insert or overwrite a value, keeping first-insertion order.
    pub fn insert(&mut self, name: impl Into<String>, value: f64) {
        let name = name.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, f64)> for FeatureVector {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        let mut fv = FeatureVector::new();
        for (name, value) in iter {
            fv.insert(name, value);
        }
        fv
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    Exists,
    ExistsEquals,
    Numeric,
}

/// Metadata describing one feature column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub nonterminal: String,
    pub kind: FeatureKind,
    /// The alternative tested by an `ExistsEquals` feature.
    pub expansion: Option<String>,
}

impl Feature {
    pub fn exists(nonterminal: &str) -> Self {
        Self {
            name: format!("exists({nonterminal})"),
            nonterminal: nonterminal.to_string(),
            kind: FeatureKind::Exists,
            expansion: None,
        }
    }

    pub fn exists_equals(nonterminal: &str, expansion: &str) -> Self {
        let shown = if expansion.is_empty() { "\"\"" } else { expansion };
        Self {
            name: format!("exists({nonterminal} == {shown})"),
            nonterminal: nonterminal.to_string(),
            kind: FeatureKind::ExistsEquals,
            expansion: Some(expansion.to_string()),
        }
    }

    pub fn numeric(nonterminal: &str) -> Self {
        Self {
            name: format!("num({nonterminal})"),
            nonterminal: nonterminal.to_string(),
            kind: FeatureKind::Numeric,
            expansion: None,
        }
    }

    fn compute(&self, tree: &DerivationTree) -> Option<f64> {
        let occurrences = tree.find_all(&self.nonterminal);
        match self.kind {
            FeatureKind::Exists => Some(indicator(!occurrences.is_empty())),
            FeatureKind::ExistsEquals => {
                let expansion = self.expansion.as_deref().unwrap_or_default();
                Some(indicator(
                    occurrences.iter().any(|n| n.expansion() == expansion),
                ))
            }
            FeatureKind::Numeric => occurrences
                .iter()
                .filter_map(|n| n.to_text().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .reduce(f64::max),
        }
    }
}

fn indicator(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

/// Turns derivation trees into feature vectors.
pub trait FeatureCollector: Send + Sync {
    /// Feature columns in their canonical order.
    fn features(&self) -> &[Feature];

    fn collect(&self, tree: &DerivationTree) -> FeatureVector;

    /// Attach features to `input` unless it already carries some.
    /// Returns whether features were attached.
    fn featurize(&self, input: &Input) -> bool {
        if input.features().is_some() {
            return false;
        }
        input.set_features(self.collect(input.tree()))
    }

    fn feature_names(&self) -> Vec<String> {
        self.features().iter().map(|f| f.name.clone()).collect()
    }
}

/// Collects existence, alternative and numeric features for a grammar.
#[derive(Debug, Clone)]
pub struct GrammarFeatureCollector {
    features: Vec<Feature>,
}

impl GrammarFeatureCollector {
    pub fn new(grammar: &Grammar) -> Self {
        let mut features = Vec::new();
        for rule in grammar.rules() {
            let nt = rule.nonterminal.as_str();
            features.push(Feature::exists(nt));
            for expansion in &rule.expansions {
                features.push(Feature::exists_equals(nt, expansion));
            }
            if derives_numbers(grammar, nt) {
                features.push(Feature::numeric(nt));
            }
        }
        Self { features }
    }

    pub fn feature(&self, name: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.name == name)
    }
}

impl FeatureCollector for GrammarFeatureCollector {
    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn collect(&self, tree: &DerivationTree) -> FeatureVector {
        let mut fv = FeatureVector::new();
        for feature in &self.features {
            if let Some(value) = feature.compute(tree) {
                fv.insert(feature.name.clone(), value);
            }
        }
        fv
    }
}

/// Whether every terminal character derivable from `nonterminal` is numeric
/// and at least one of them is a digit.
fn derives_numbers(grammar: &Grammar, nonterminal: &str) -> bool {
    let mut alphabet = HashSet::new();
    for nt in grammar.reachable_nonterminals(nonterminal) {
        for expansion in grammar.expansions(&nt).unwrap_or_default() {
            for symbol in expansion_symbols(expansion) {
                if let Symbol::Terminal(text) = symbol {
                    alphabet.extend(text.chars());
                }
            }
        }
    }
    alphabet.iter().any(char::is_ascii_digit)
        && alphabet
            .iter()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
}
