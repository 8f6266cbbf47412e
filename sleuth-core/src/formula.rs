//! The hypothesis language.
//!
//! A [`Formula`] is a boolean combination of atomic [`Predicate`]s. Feature
//! predicates compare one entry of an input's feature vector against a
//! threshold; structural predicates query the derivation tree directly.
//!
//! Structural predicates are existential: `exists <number>: num <= 0`
//! holds when at least one `<number>` occurrence satisfies the bound.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EvaluationError;
use crate::grammar::is_nonterminal;
use crate::input::Input;

const EXISTENCE_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparison {
    LessEqual,
    Greater,
}

impl Comparison {
    pub fn flip(self) -> Self {
        match self {
            Comparison::LessEqual => Comparison::Greater,
            Comparison::Greater => Comparison::LessEqual,
        }
    }

    pub fn holds(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparison::LessEqual => value <= threshold,
            Comparison::Greater => value > threshold,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Comparison::LessEqual => "<=",
            Comparison::Greater => ">",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bound {
    AtMost,
    AtLeast,
}

impl Bound {
    fn holds<T: PartialOrd>(self, value: T, limit: T) -> bool {
        match self {
            Bound::AtMost => value <= limit,
            Bound::AtLeast => value >= limit,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Bound::AtMost => "<=",
            Bound::AtLeast => ">=",
        })
    }
}

/// An atomic hypothesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    /// `name <= threshold` or `name > threshold` over the feature vector.
    /// A missing feature reads as 0.
    Feature {
        name: String,
        comparison: Comparison,
        threshold: f64,
    },
    /// Some occurrence of the nonterminal exists.
    Exists { nonterminal: String },
    /// Some occurrence derives exactly `value`.
    ExistsEquals { nonterminal: String, value: String },
    /// Some occurrence derives a number within the bound.
    NumericBound {
        nonterminal: String,
        bound: Bound,
        value: f64,
    },
    /// Some occurrence derives text whose length is within the bound.
    LengthBound {
        nonterminal: String,
        bound: Bound,
        length: usize,
    },
}

impl Predicate {
    pub fn feature(name: impl Into<String>, comparison: Comparison, threshold: f64) -> Self {
        Predicate::Feature {
            name: name.into(),
            comparison,
            threshold,
        }
    }

    pub fn nonterminal(&self) -> Option<&str> {
        match self {
            Predicate::Feature { .. } => None,
            Predicate::Exists { nonterminal }
            | Predicate::ExistsEquals { nonterminal, .. }
            | Predicate::NumericBound { nonterminal, .. }
            | Predicate::LengthBound { nonterminal, .. } => Some(nonterminal),
        }
    }

    /// Whether this is a 0/1 existence feature split at 0.5.
    pub fn is_existence_literal(&self) -> bool {
        match self {
            Predicate::Feature {
                name, threshold, ..
            } => name.starts_with("exists(") && (threshold - EXISTENCE_THRESHOLD).abs() < 1e-9,
            _ => false,
        }
    }

    pub fn evaluate(&self, input: &Input) -> Result<bool, EvaluationError> {
        if let Some(nt) = self.nonterminal() {
            if !is_nonterminal(nt) {
                return Err(EvaluationError::MalformedQuery {
                    query: self.to_string(),
                    reason: format!("{nt} is not a nonterminal"),
                });
            }
        }
        match self {
            Predicate::Feature {
                name,
                comparison,
                threshold,
            } => {
                let features =
                    input
                        .features()
                        .ok_or_else(|| EvaluationError::MissingFeatures {
                            input: input.to_string(),
                        })?;
                let value = features.get(name).unwrap_or(0.0);
                Ok(comparison.holds(value, *threshold))
            }
            Predicate::Exists { nonterminal } => {
                Ok(input.traverse().iter().any(|n| n.symbol == *nonterminal))
            }
            Predicate::ExistsEquals { nonterminal, value } => Ok(input
                .tree()
                .find_all(nonterminal)
                .iter()
                .any(|n| n.to_text() == *value)),
            Predicate::NumericBound {
                nonterminal,
                bound,
                value,
            } => Ok(input
                .tree()
                .find_all(nonterminal)
                .iter()
                .filter_map(|n| n.to_text().parse::<f64>().ok())
                .any(|v| bound.holds(v, *value))),
            Predicate::LengthBound {
                nonterminal,
                bound,
                length,
            } => Ok(input
                .tree()
                .find_all(nonterminal)
                .iter()
                .any(|n| bound.holds(n.to_text().chars().count(), *length))),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Feature {
                name,
                comparison,
                threshold,
            } => {
                if self.is_existence_literal() {
                    match comparison {
                        Comparison::Greater => write!(f, "{name}"),
                        Comparison::LessEqual => write!(f, "not {name}"),
                    }
                } else {
                    write!(f, "{name} {comparison} {threshold}")
                }
            }
            Predicate::Exists { nonterminal } => write!(f, "exists {nonterminal}"),
            Predicate::ExistsEquals { nonterminal, value } => {
                write!(f, "exists {nonterminal} == {value:?}")
            }
            Predicate::NumericBound {
                nonterminal,
                bound,
                value,
            } => write!(f, "exists {nonterminal}: num {bound} {value}"),
            Predicate::LengthBound {
                nonterminal,
                bound,
                length,
            } => write!(f, "exists {nonterminal}: len {bound} {length}"),
        }
    }
}

/// A boolean combination of predicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Formula {
    Atom(Predicate),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl From<Predicate> for Formula {
    fn from(p: Predicate) -> Self {
        Formula::Atom(p)
    }
}

impl Formula {
    pub fn atom(p: Predicate) -> Self {
        Formula::Atom(p)
    }

    /// Conjunction, flattening nested conjunctions and dropping duplicate
    /// operands. A single operand is returned as is.
    pub fn and(operands: impl IntoIterator<Item = Formula>) -> Self {
        Self::combine(operands, true)
    }

    /// Disjunction, flattened and deduplicated like [`Formula::and`].
    pub fn or(operands: impl IntoIterator<Item = Formula>) -> Self {
        Self::combine(operands, false)
    }

    fn combine(operands: impl IntoIterator<Item = Formula>, conjunction: bool) -> Self {
        let mut flat: Vec<Formula> = Vec::new();
        let mut seen = Vec::new();
        let mut push = |f: Formula, flat: &mut Vec<Formula>| {
            let key = f.canonical();
            if !seen.contains(&key) {
                seen.push(key);
                flat.push(f);
            }
        };
        for operand in operands {
            match (operand, conjunction) {
                (Formula::And(children), true) | (Formula::Or(children), false) => {
                    for child in children {
                        push(child, &mut flat);
                    }
                }
                (other, _) => push(other, &mut flat),
            }
        }
        match flat.len() {
            1 => flat.remove(0),
            _ if conjunction => Formula::And(flat),
            _ => Formula::Or(flat),
        }
    }

    /// Logical negation. Feature literals flip their comparison and double
    /// negation collapses.
    pub fn negate(&self) -> Formula {
        match self {
            Formula::Atom(Predicate::Feature {
                name,
                comparison,
                threshold,
            }) => Formula::Atom(Predicate::Feature {
                name: name.clone(),
                comparison: comparison.flip(),
                threshold: *threshold,
            }),
            Formula::Not(inner) => (**inner).clone(),
            other => Formula::Not(Box::new(other.clone())),
        }
    }

    /// Order-insensitive textual form; commutative variants are equal.
    pub fn canonical(&self) -> String {
        match self {
            Formula::Atom(p) => p.to_string(),
            Formula::Not(inner) => format!("not ({})", inner.canonical()),
            Formula::And(children) => Self::canonical_join(children, " and "),
            Formula::Or(children) => Self::canonical_join(children, " or "),
        }
    }

    fn canonical_join(children: &[Formula], sep: &str) -> String {
        let mut parts: Vec<String> = children.iter().map(Formula::canonical).collect();
        parts.sort();
        format!("({})", parts.join(sep))
    }

    /// Number of atoms.
    pub fn size(&self) -> usize {
        match self {
            Formula::Atom(_) => 1,
            Formula::Not(inner) => inner.size(),
            Formula::And(children) | Formula::Or(children) => {
                children.iter().map(Formula::size).sum()
            }
        }
    }

    pub fn is_conjunction(&self) -> bool {
        matches!(self, Formula::And(_))
    }

    pub fn uses_features(&self) -> bool {
        self.atoms()
            .iter()
            .any(|p| matches!(p, Predicate::Feature { .. }))
    }

    /// All atoms in left-to-right order.
    pub fn atoms(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Formula::Atom(p) => out.push(p),
            Formula::Not(inner) => inner.collect_atoms(out),
            Formula::And(children) | Formula::Or(children) => {
                for child in children {
                    child.collect_atoms(out);
                }
            }
        }
    }

    pub fn evaluate(&self, input: &Input) -> Result<bool, EvaluationError> {
        match self {
            Formula::Atom(p) => p.evaluate(input),
            Formula::Not(inner) => Ok(!inner.evaluate(input)?),
            Formula::And(children) => {
                for child in children {
                    if !child.evaluate(input)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Formula::Or(children) => {
                for child in children {
                    if child.evaluate(input)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::And(_) | Formula::Or(_) => write!(f, "({self})"),
            _ => write!(f, "{self}"),
        }
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::Atom(p) => write!(f, "{p}"),
            Formula::Not(inner) => {
                f.write_str("not ")?;
                inner.fmt_operand(f)
            }
            Formula::And(children) | Formula::Or(children) => {
                let sep = if self.is_conjunction() { " and " } else { " or " };
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    child.fmt_operand(f)?;
                }
                Ok(())
            }
        }
    }
}
