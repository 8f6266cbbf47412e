//! Random derivation of strings from a grammar.
//!
//! Below `max_depth` alternatives are chosen uniformly; at or beyond it the
//! fuzzer switches to the cheapest alternative so every derivation
//! terminates.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use crate::error::GrammarError;
use crate::grammar::{Grammar, START_SYMBOL, Symbol, expansion_symbols};
use crate::tree::DerivationTree;

pub const DEFAULT_MAX_DEPTH: usize = 10;

/// A seeded random grammar fuzzer.
#[derive(Debug, Clone)]
pub struct GrammarFuzzer {
    grammar: Grammar,
    costs: HashMap<String, usize>,
    rng: StdRng,
    max_depth: usize,
}

impl GrammarFuzzer {
    /// Create a fuzzer for a valid grammar whose every nonterminal can
    /// terminate.
    pub fn new(grammar: Grammar) -> Result<Self, GrammarError> {
        grammar.validate()?;
        let costs = grammar.min_expansion_costs();
        if let Some(nt) = grammar.nonterminals().find(|nt| costs[*nt] == usize::MAX) {
            return Err(GrammarError::NonTerminating {
                nonterminal: nt.to_string(),
            });
        }
        Ok(Self {
            grammar,
            costs,
            rng: StdRng::from_entropy(),
            max_depth: DEFAULT_MAX_DEPTH,
        })
    }

    /// Use a fixed seed, or fresh entropy for `None`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Derive one tree from the start symbol.
    pub fn fuzz(&mut self) -> DerivationTree {
        self.expand(START_SYMBOL, 0)
    }

    /// Derive one string from the start symbol.
    pub fn fuzz_text(&mut self) -> String {
        self.fuzz().to_text()
    }

    fn expand(&mut self, nonterminal: &str, depth: usize) -> DerivationTree {
        let alternatives = self
            .grammar
            .expansions(nonterminal)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        if alternatives.is_empty() {
            return DerivationTree::new(nonterminal, Vec::new());
        }

        let chosen = if depth >= self.max_depth {
            self.cheapest(&alternatives)
        } else {
            self.rng.gen_range(0..alternatives.len())
        };

        let children = expansion_symbols(&alternatives[chosen])
            .into_iter()
            .map(|symbol| match symbol {
                Symbol::Terminal(text) => DerivationTree::leaf(text),
                Symbol::Nonterminal(nt) => self.expand(&nt, depth + 1),
            })
            .collect();
        DerivationTree::new(nonterminal, children)
    }

    fn cheapest(&self, alternatives: &[String]) -> usize {
        alternatives
            .iter()
            .enumerate()
            .min_by_key(|(_, alt)| self.grammar.expansion_cost(alt, &self.costs))
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}
