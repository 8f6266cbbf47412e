//! # Explanations
//!
//! An [`Explanation`] wraps one hypothesis ([`Formula`]) together with the
//! verdicts it has produced so far. Verdicts are memoized per input: an input
//! that has been evaluated once is never evaluated again, and its verdict is
//! tallied exactly once into either the failing or the passing accumulator,
//! depending on the input's oracle label at evaluation time.
//!
//! Precision, recall and specificity are derived from those tallies on
//! demand. Boolean combination (`&`, `|`, `-`) builds new explanations from
//! the memoized verdicts without touching any input again.
//!
//! [`ExplanationSet`] is an insertion-ordered, hash-deduplicated collection.

use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{Add, BitAnd, BitOr, Neg};

use crate::error::EvaluationError;
use crate::fitness::FitnessStrategy;
use crate::formula::Formula;
use crate::input::Input;

// ---------------------------------------------------------------------------
// Explanation
// ---------------------------------------------------------------------------

/// A hypothesis plus its memoized evaluation history.
#[derive(Clone)]
pub struct Explanation {
    formula: Formula,
    hash: u64,
    cache: HashMap<Input, bool>,
    failing_eval_results: Vec<bool>,
    passing_eval_results: Vec<bool>,
}

impl Explanation {
    pub fn new(formula: Formula) -> Self {
        let hash = stable_hash(&formula.canonical());
        Self {
            formula,
            hash,
            cache: HashMap::new(),
            failing_eval_results: Vec::new(),
            passing_eval_results: Vec::new(),
        }
    }

    pub fn formula(&self) -> &Formula {
        &self.formula
    }

    /// Hash of the canonical hypothesis; independent of the cache.
    pub fn hash_value(&self) -> u64 {
        self.hash
    }

    pub fn size(&self) -> usize {
        self.formula.size()
    }

    pub fn failing_eval_results(&self) -> &[bool] {
        &self.failing_eval_results
    }

    pub fn passing_eval_results(&self) -> &[bool] {
        &self.passing_eval_results
    }

    /// The memoized verdict for `input`, if it has been evaluated.
    pub fn verdict(&self, input: &Input) -> Option<bool> {
        self.cache.get(input).copied()
    }

    pub fn evaluated_inputs(&self) -> impl Iterator<Item = &Input> {
        self.cache.keys()
    }

    pub fn evaluated_count(&self) -> usize {
        self.cache.len()
    }

    /// Evaluate every input not yet in the cache.
    ///
    /// On error the inputs evaluated before the failing one stay recorded.
    pub fn evaluate<'a, I>(&mut self, inputs: I) -> Result<(), EvaluationError>
    where
        I: IntoIterator<Item = &'a Input>,
    {
        for input in inputs {
            if self.cache.contains_key(input) {
                continue;
            }
            let verdict = self.formula.evaluate(input)?;
            self.record(input.clone(), verdict);
        }
        Ok(())
    }

    fn record(&mut self, input: Input, verdict: bool) {
        if input.is_failing() {
            self.failing_eval_results.push(verdict);
        } else {
            self.passing_eval_results.push(verdict);
        }
        self.cache.insert(input, verdict);
    }

    /// Forget all verdicts.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.failing_eval_results.clear();
        self.passing_eval_results.clear();
    }

    /// True evaluations among failing inputs over failing inputs evaluated.
    pub fn recall(&self) -> f64 {
        ratio(count(&self.failing_eval_results, true), self.failing_eval_results.len())
    }

    /// True evaluations on failing inputs over all true evaluations.
    pub fn precision(&self) -> f64 {
        let tp = count(&self.failing_eval_results, true);
        let fp = count(&self.passing_eval_results, true);
        ratio(tp, tp + fp)
    }

    /// False evaluations among passing inputs over passing inputs evaluated.
    pub fn specificity(&self) -> f64 {
        ratio(count(&self.passing_eval_results, false), self.passing_eval_results.len())
    }

    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// The logical negation, derived from the cached verdicts.
    pub fn negate(&self) -> Explanation {
        let mut negated = Explanation::new(self.formula.negate());
        negated.cache = self.cache.iter().map(|(i, v)| (i.clone(), !v)).collect();
        negated.failing_eval_results = self.failing_eval_results.iter().map(|v| !v).collect();
        negated.passing_eval_results = self.passing_eval_results.iter().map(|v| !v).collect();
        negated
    }

    /// Conjunction over the inputs both operands have evaluated.
    pub fn and(&self, other: &Explanation) -> Explanation {
        let formula = Formula::and([self.formula.clone(), other.formula.clone()]);
        self.combine(other, formula, |a, b| a && b)
    }

    /// Disjunction over the inputs both operands have evaluated.
    pub fn or(&self, other: &Explanation) -> Explanation {
        let formula = Formula::or([self.formula.clone(), other.formula.clone()]);
        self.combine(other, formula, |a, b| a || b)
    }

    fn combine(
        &self,
        other: &Explanation,
        formula: Formula,
        op: fn(bool, bool) -> bool,
    ) -> Explanation {
        let mut combined = Explanation::new(formula);
        for (input, &a) in &self.cache {
            if let Some(&b) = other.cache.get(input) {
                combined.record(input.clone(), op(a, b));
            }
        }
        combined
    }

    /// Order two explanations with a fitness strategy.
    pub fn cmp_with(&self, other: &Explanation, strategy: &dyn FitnessStrategy) -> Ordering {
        strategy.compare(self, other)
    }
}

fn count(values: &[bool], wanted: bool) -> usize {
    values.iter().filter(|&&v| v == wanted).count()
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn stable_hash(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

impl PartialEq for Explanation {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for Explanation {}

impl Hash for Explanation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl Neg for &Explanation {
    type Output = Explanation;

    fn neg(self) -> Explanation {
        self.negate()
    }
}

impl BitAnd for &Explanation {
    type Output = Explanation;

    fn bitand(self, rhs: &Explanation) -> Explanation {
        self.and(rhs)
    }
}

impl BitOr for &Explanation {
    type Output = Explanation;

    fn bitor(self, rhs: &Explanation) -> Explanation {
        self.or(rhs)
    }
}

impl fmt::Debug for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Explanation")
            .field("formula", &self.formula.to_string())
            .field("hash", &self.hash)
            .field("evaluated", &self.cache.len())
            .finish()
    }
}

impl fmt::Display for Explanation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (precision={:.3}, recall={:.3}, specificity={:.3})",
            self.formula,
            self.precision(),
            self.recall(),
            self.specificity()
        )
    }
}

// ---------------------------------------------------------------------------
// ExplanationSet
// ---------------------------------------------------------------------------

/// Insertion-ordered explanations, unique by hypothesis hash.
#[derive(Debug, Clone, Default)]
pub struct ExplanationSet {
    index: HashMap<u64, usize>,
    explanations: Vec<Explanation>,
}

impl ExplanationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an explanation with the same hash is present.
    /// Returns whether it was inserted.
    pub fn append(&mut self, explanation: Explanation) -> bool {
        if self.index.contains_key(&explanation.hash) {
            return false;
        }
        self.index.insert(explanation.hash, self.explanations.len());
        self.explanations.push(explanation);
        true
    }

    /// Remove the explanation with the same hash, if any.
    pub fn remove(&mut self, explanation: &Explanation) -> Option<Explanation> {
        self.remove_hash(explanation.hash)
    }

    /// Swap-with-last removal by hash.
    pub fn remove_hash(&mut self, hash: u64) -> Option<Explanation> {
        let idx = self.index.remove(&hash)?;
        let removed = self.explanations.swap_remove(idx);
        if let Some(moved) = self.explanations.get(idx) {
            self.index.insert(moved.hash, idx);
        }
        Some(removed)
    }

    pub fn contains(&self, explanation: &Explanation) -> bool {
        self.index.contains_key(&explanation.hash)
    }

    pub fn contains_hash(&self, hash: u64) -> bool {
        self.index.contains_key(&hash)
    }

    pub fn get(&self, hash: u64) -> Option<&Explanation> {
        self.index.get(&hash).map(|&i| &self.explanations[i])
    }

    pub fn get_mut(&mut self, hash: u64) -> Option<&mut Explanation> {
        self.index.get(&hash).map(|&i| &mut self.explanations[i])
    }

    pub fn len(&self) -> usize {
        self.explanations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.explanations.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Explanation> {
        self.explanations.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Explanation> {
        self.explanations.iter_mut()
    }

    pub fn hashes(&self) -> HashSet<u64> {
        self.index.keys().copied().collect()
    }

    /// Evaluate every member; stops at the first evaluation error.
    pub fn evaluate<'a, I>(&mut self, inputs: I) -> Result<(), EvaluationError>
    where
        I: IntoIterator<Item = &'a Input> + Clone,
    {
        for explanation in &mut self.explanations {
            explanation.evaluate(inputs.clone())?;
        }
        Ok(())
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.explanations.clear();
    }
}

impl Add for ExplanationSet {
    type Output = ExplanationSet;

    /// Union; members of `rhs` whose hash is already present are dropped.
    fn add(mut self, rhs: ExplanationSet) -> ExplanationSet {
        self.extend(rhs);
        self
    }
}

impl Extend<Explanation> for ExplanationSet {
    fn extend<T: IntoIterator<Item = Explanation>>(&mut self, iter: T) {
        for explanation in iter {
            self.append(explanation);
        }
    }
}

impl FromIterator<Explanation> for ExplanationSet {
    fn from_iter<T: IntoIterator<Item = Explanation>>(iter: T) -> Self {
        let mut set = ExplanationSet::new();
        set.extend(iter);
        set
    }
}

impl IntoIterator for ExplanationSet {
    type Item = Explanation;
    type IntoIter = std::vec::IntoIter<Explanation>;

    fn into_iter(self) -> Self::IntoIter {
        self.explanations.into_iter()
    }
}

impl<'a> IntoIterator for &'a ExplanationSet {
    type Item = &'a Explanation;
    type IntoIter = std::slice::Iter<'a, Explanation>;

    fn into_iter(self) -> Self::IntoIter {
        self.explanations.iter()
    }
}

impl fmt::Display for ExplanationSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for explanation in &self.explanations {
            writeln!(f, "{explanation}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
