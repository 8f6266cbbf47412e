//! Atomic hypothesis instantiation from a fixed pattern library.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};
use sleuth_core::{Bound, Formula, Grammar, Input, Predicate, START_SYMBOL};

/// Structural patterns instantiated per nonterminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AtomicPattern {
    /// `exists <N>`
    Existence,
    /// `exists <N> == "v"` for each value seen in failing inputs.
    StringEquality,
    /// `exists <N>: num <= c`
    NumericUpperBound,
    /// `exists <N>: num >= c`
    NumericLowerBound,
    /// `exists <N>: len <= c`
    LengthUpperBound,
    /// `exists <N>: len >= c`
    LengthLowerBound,
}

impl AtomicPattern {
    pub const ALL: [AtomicPattern; 6] = [
        AtomicPattern::Existence,
        AtomicPattern::StringEquality,
        AtomicPattern::NumericUpperBound,
        AtomicPattern::NumericLowerBound,
        AtomicPattern::LengthUpperBound,
        AtomicPattern::LengthLowerBound,
    ];
}

/// Builds atomic hypotheses over the nonterminals present in failing inputs.
///
/// Constants come from the failing inputs themselves. Bounds are chosen so
/// that every failing input with a matching occurrence satisfies them: the
/// upper bound is the largest per-input minimum, the lower bound the smallest
/// per-input maximum.
#[derive(Debug, Clone)]
pub struct AtomicCandidateConstructor {
    grammar: Grammar,
    patterns: Vec<AtomicPattern>,
    max_values: usize,
}

impl AtomicCandidateConstructor {
    pub const DEFAULT_MAX_VALUES: usize = 16;

    pub fn new(grammar: Grammar) -> Self {
        Self {
            grammar,
            patterns: AtomicPattern::ALL.to_vec(),
            max_values: Self::DEFAULT_MAX_VALUES,
        }
    }

    pub fn with_patterns(mut self, patterns: impl IntoIterator<Item = AtomicPattern>) -> Self {
        self.patterns = patterns.into_iter().collect();
        self
    }

    /// Nonterminals with more distinct failing values than this get no
    /// string-equality candidates.
    pub fn with_max_values(mut self, max_values: usize) -> Self {
        self.max_values = max_values;
        self
    }

    pub fn patterns(&self) -> &[AtomicPattern] {
        &self.patterns
    }

    /// Candidates in grammar order, then pattern order.
    pub fn construct(&self, failing: &HashSet<Input>, exclude: &HashSet<String>) -> Vec<Formula> {
        let reachable = self.grammar.reachable_nonterminals(START_SYMBOL);
        let mut inputs: Vec<&Input> = failing.iter().collect();
        inputs.sort_by(|a, b| a.text().cmp(b.text()));

        let mut candidates = Vec::new();
        for nt in self.grammar.nonterminals() {
            if nt == START_SYMBOL || !reachable.contains(nt) || exclude.contains(nt) {
                continue;
            }
            // Occurrence texts per failing input that contains the nonterminal.
            let per_input: Vec<Vec<String>> = inputs
                .iter()
                .map(|i| i.tree().find_all(nt).iter().map(|n| n.to_text()).collect::<Vec<_>>())
                .filter(|texts| !texts.is_empty())
                .collect();
            if per_input.is_empty() {
                continue;
            }
            for pattern in &self.patterns {
                self.instantiate(nt, *pattern, &per_input, &mut candidates);
            }
        }
        candidates
    }

    fn instantiate(
        &self,
        nt: &str,
        pattern: AtomicPattern,
        per_input: &[Vec<String>],
        out: &mut Vec<Formula>,
    ) {
        let nonterminal = nt.to_string();
        match pattern {
            AtomicPattern::Existence => out.push(Predicate::Exists { nonterminal }.into()),
            AtomicPattern::StringEquality => {
                let values: BTreeSet<&str> =
                    per_input.iter().flatten().map(String::as_str).collect();
                if values.len() <= self.max_values {
                    out.extend(values.into_iter().map(|value| {
                        Formula::from(Predicate::ExistsEquals {
                            nonterminal: nonterminal.clone(),
                            value: value.to_string(),
                        })
                    }));
                }
            }
            AtomicPattern::NumericUpperBound | AtomicPattern::NumericLowerBound => {
                let numbers: Vec<Vec<f64>> = per_input
                    .iter()
                    .map(|texts| {
                        texts
                            .iter()
                            .filter_map(|t| t.parse::<f64>().ok())
                            .filter(|v| v.is_finite())
                            .collect::<Vec<_>>()
                    })
                    .filter(|v| !v.is_empty())
                    .collect();
                if numbers.is_empty() {
                    return;
                }
                let (bound, value) = if pattern == AtomicPattern::NumericUpperBound {
                    (Bound::AtMost, fold(&numbers, f64::min, f64::max))
                } else {
                    (Bound::AtLeast, fold(&numbers, f64::max, f64::min))
                };
                out.push(
                    Predicate::NumericBound {
                        nonterminal,
                        bound,
                        value,
                    }
                    .into(),
                );
            }
            AtomicPattern::LengthUpperBound | AtomicPattern::LengthLowerBound => {
                let lengths: Vec<Vec<usize>> = per_input
                    .iter()
                    .map(|texts| texts.iter().map(|t| t.chars().count()).collect())
                    .collect();
                let (bound, length) = if pattern == AtomicPattern::LengthUpperBound {
                    let per = lengths.iter().filter_map(|l| l.iter().copied().min());
                    (Bound::AtMost, per.max().unwrap_or_default())
                } else {
                    let per = lengths.iter().filter_map(|l| l.iter().copied().max());
                    (Bound::AtLeast, per.min().unwrap_or_default())
                };
                out.push(
                    Predicate::LengthBound {
                        nonterminal,
                        bound,
                        length,
                    }
                    .into(),
                );
            }
        }
    }
}

/// Reduce each input's values with `inner`, then the results with `outer`.
fn fold(values: &[Vec<f64>], inner: fn(f64, f64) -> f64, outer: fn(f64, f64) -> f64) -> f64 {
    values
        .iter()
        .filter_map(|v| v.iter().copied().reduce(inner))
        .reduce(outer)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{arithmetic_grammar, featurized};
    use sleuth_core::OracleResult;

    fn failing(texts: &[&str]) -> HashSet<Input> {
        let grammar = arithmetic_grammar();
        texts
            .iter()
            .map(|t| featurized(&grammar, t, OracleResult::Failing))
            .collect()
    }

    fn shown(formulas: &[Formula]) -> Vec<String> {
        formulas.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_constructs_patterns_from_failing_inputs() {
        let constructor = AtomicCandidateConstructor::new(arithmetic_grammar());
        let candidates = shown(&constructor.construct(
            &failing(&["sqrt(-900)", "sqrt(-1)", "sqrt(-42)"]),
            &HashSet::new(),
        ));
        assert!(candidates.contains(&"exists <function>".to_string()));
        assert!(candidates.contains(&"exists <function> == \"sqrt\"".to_string()));
        assert!(candidates.contains(&"exists <number>: num <= -1".to_string()));
        assert!(candidates.contains(&"exists <number>: num >= -900".to_string()));
        assert!(candidates.contains(&"exists <number>: len <= 4".to_string()));
        assert!(!candidates.iter().any(|c| c.contains("<start>")));
        // Nothing failing derives a fraction.
        assert!(!candidates.iter().any(|c| c.contains("<maybe_frac> == \".")));
    }

    #[test]
    fn test_exclusions_and_value_cap() {
        let constructor = AtomicCandidateConstructor::new(arithmetic_grammar()).with_max_values(1);
        let exclude: HashSet<String> = ["<function>".to_string()].into_iter().collect();
        let inputs = failing(&["sqrt(-1)", "cos(-2)"]);
        let candidates = shown(&constructor.construct(&inputs, &exclude));
        assert!(!candidates.iter().any(|c| c.contains("<function>")));
        // <onenine> derived "1" and "2": too many values under the cap.
        assert!(!candidates.iter().any(|c| c.starts_with("exists <onenine> ==")));
        assert!(candidates.contains(&"exists <maybe_minus> == \"-\"".to_string()));
    }

    #[test]
    fn test_pattern_selection() {
        let constructor = AtomicCandidateConstructor::new(arithmetic_grammar())
            .with_patterns([AtomicPattern::Existence]);
        let candidates = constructor.construct(&failing(&["tan(5)"]), &HashSet::new());
        assert!(candidates
            .iter()
            .all(|f| matches!(f, Formula::Atom(Predicate::Exists { .. }))));
        assert!(!candidates.is_empty());
    }
}
