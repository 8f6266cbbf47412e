//! Context-free grammars over bracketed nonterminals.
//!
//! A [`Grammar`] maps nonterminal names such as `<start>` to an ordered list
//! of expansion alternatives. Alternatives are plain strings in which
//! nonterminal references are embedded (`"<function>(<number>)"`). Rule order
//! is preserved because downstream feature columns and candidate
//! construction follow it.
//!
//! [`GrammarGraph`] models the "references" relation between nonterminals
//! with petgraph and answers reachability queries.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Bfs;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use crate::error::GrammarError;

/// The conventional start symbol.
pub const START_SYMBOL: &str = "<start>";

static RE_NONTERMINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(<[^<> ]*>)").expect("nonterminal pattern is valid"));

/// Return every nonterminal referenced in an expansion, in order.
pub fn nonterminals(expansion: &str) -> Vec<&str> {
    RE_NONTERMINAL
        .find_iter(expansion)
        .map(|m| m.as_str())
        .collect()
}

/// Whether `symbol` is exactly one nonterminal reference.
pub fn is_nonterminal(symbol: &str) -> bool {
    RE_NONTERMINAL
        .find(symbol)
        .is_some_and(|m| m.start() == 0 && m.end() == symbol.len())
}

/// One element of a tokenized expansion alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Nonterminal(String),
    Terminal(String),
}

impl Symbol {
    pub fn as_str(&self) -> &str {
        match self {
            Symbol::Nonterminal(s) | Symbol::Terminal(s) => s,
        }
    }
}

/// Split an expansion alternative into nonterminal references and the
/// terminal text between them. An empty alternative yields no symbols.
pub fn expansion_symbols(expansion: &str) -> Vec<Symbol> {
    let mut symbols = Vec::new();
    let mut last = 0;
    for m in RE_NONTERMINAL.find_iter(expansion) {
        if m.start() > last {
            symbols.push(Symbol::Terminal(expansion[last..m.start()].to_string()));
        }
        symbols.push(Symbol::Nonterminal(m.as_str().to_string()));
        last = m.end();
    }
    if last < expansion.len() {
        symbols.push(Symbol::Terminal(expansion[last..].to_string()));
    }
    symbols
}

/// A single production: a nonterminal and its alternatives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub nonterminal: String,
    pub expansions: Vec<String>,
}

/// An insertion-ordered context-free grammar.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Rule>", into = "Vec<Rule>")]
pub struct Grammar {
    rules: Vec<Rule>,
    index: HashMap<String, usize>,
}

impl From<Vec<Rule>> for Grammar {
    fn from(rules: Vec<Rule>) -> Self {
        let mut grammar = Grammar::new();
        for rule in rules {
            grammar.add_rule(rule.nonterminal, rule.expansions);
        }
        grammar
    }
}

impl From<Grammar> for Vec<Rule> {
    fn from(grammar: Grammar) -> Self {
        grammar.rules
    }
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grammar from `(nonterminal, alternatives)` pairs.
    pub fn from_rules<N, E, I>(rules: I) -> Self
    where
        I: IntoIterator<Item = (N, Vec<E>)>,
        N: Into<String>,
        E: Into<String>,
    {
        let mut grammar = Grammar::new();
        for (nonterminal, expansions) in rules {
            grammar.add_rule(nonterminal, expansions.into_iter().map(Into::into).collect());
        }
        grammar
    }

    /// Add a rule, replacing the alternatives of an existing nonterminal
    /// in place.
    pub fn add_rule(&mut self, nonterminal: impl Into<String>, expansions: Vec<String>) {
        let nonterminal = nonterminal.into();
        if let Some(&idx) = self.index.get(&nonterminal) {
            self.rules[idx].expansions = expansions;
            return;
        }
        self.index.insert(nonterminal.clone(), self.rules.len());
        self.rules.push(Rule {
            nonterminal,
            expansions,
        });
    }

    pub fn expansions(&self, nonterminal: &str) -> Option<&[String]> {
        self.index
            .get(nonterminal)
            .map(|&idx| self.rules[idx].expansions.as_slice())
    }

    pub fn contains(&self, nonterminal: &str) -> bool {
        self.index.contains_key(nonterminal)
    }

    /// Nonterminals in definition order.
    pub fn nonterminals(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|r| r.nonterminal.as_str())
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// All nonterminals reachable from `start`, including `start` itself.
    pub fn reachable_nonterminals(&self, start: &str) -> HashSet<String> {
        let mut reachable = HashSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(symbol) = stack.pop() {
            if !reachable.insert(symbol.clone()) {
                continue;
            }
            for expansion in self.expansions(&symbol).unwrap_or_default() {
                for nt in nonterminals(expansion) {
                    if !reachable.contains(nt) {
                        stack.push(nt.to_string());
                    }
                }
            }
        }
        reachable
    }

    /// Check that the grammar is well-formed and reachability-closed from
    /// [`START_SYMBOL`].
    pub fn validate(&self) -> Result<(), GrammarError> {
        if !self.contains(START_SYMBOL) {
            return Err(GrammarError::MissingStartSymbol {
                start: START_SYMBOL.to_string(),
            });
        }
        for rule in &self.rules {
            if !is_nonterminal(&rule.nonterminal) {
                return Err(GrammarError::InvalidNonterminal {
                    name: rule.nonterminal.clone(),
                });
            }
            if rule.expansions.is_empty() {
                return Err(GrammarError::EmptyRule {
                    nonterminal: rule.nonterminal.clone(),
                });
            }
            for expansion in &rule.expansions {
                for nt in nonterminals(expansion) {
                    if !self.contains(nt) {
                        return Err(GrammarError::UndefinedNonterminal {
                            nonterminal: nt.to_string(),
                            referenced_by: rule.nonterminal.clone(),
                        });
                    }
                }
            }
        }
        let reachable = self.reachable_nonterminals(START_SYMBOL);
        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| !reachable.contains(&r.nonterminal))
        {
            return Err(GrammarError::UnreachableNonterminal {
                nonterminal: rule.nonterminal.clone(),
            });
        }
        Ok(())
    }

    /// Minimal number of nonterminal expansions needed to fully derive each
    /// nonterminal. Nonterminals that can never terminate map to `usize::MAX`.
    pub fn min_expansion_costs(&self) -> HashMap<String, usize> {
        let mut costs: HashMap<String, usize> = self
            .nonterminals()
            .map(|nt| (nt.to_string(), usize::MAX))
            .collect();
        loop {
            let mut changed = false;
            for rule in &self.rules {
                let best = rule
                    .expansions
                    .iter()
                    .map(|e| self.expansion_cost(e, &costs))
                    .min()
                    .unwrap_or(usize::MAX);
                if best < costs[&rule.nonterminal] {
                    costs.insert(rule.nonterminal.clone(), best);
                    changed = true;
                }
            }
            if !changed {
                return costs;
            }
        }
    }

    /// Cost of one alternative given per-nonterminal costs.
    pub fn expansion_cost(&self, expansion: &str, costs: &HashMap<String, usize>) -> usize {
        nonterminals(expansion)
            .into_iter()
            .map(|nt| costs.get(nt).copied().unwrap_or(usize::MAX))
            .fold(1usize, |acc, c| acc.saturating_add(c))
    }

    pub fn graph(&self) -> GrammarGraph {
        GrammarGraph::from_grammar(self)
    }
}

/// Directed "expands to" graph over the nonterminals of a grammar.
#[derive(Debug, Clone)]
pub struct GrammarGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl GrammarGraph {
    pub fn from_grammar(grammar: &Grammar) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for nt in grammar.nonterminals() {
            nodes.insert(nt.to_string(), graph.add_node(nt.to_string()));
        }
        for rule in grammar.rules() {
            let from = nodes[&rule.nonterminal];
            let mut seen = HashSet::new();
            for expansion in &rule.expansions {
                for nt in nonterminals(expansion) {
                    if let Some(&to) = nodes.get(nt) {
                        if seen.insert(to) {
                            graph.add_edge(from, to, ());
                        }
                    }
                }
            }
        }
        Self { graph, nodes }
    }

    /// Nonterminals reachable from `start` (inclusive).
    pub fn reachable_from(&self, start: &str) -> HashSet<String> {
        let Some(&root) = self.nodes.get(start) else {
            return HashSet::new();
        };
        let mut bfs = Bfs::new(&self.graph, root);
        let mut reachable = HashSet::new();
        while let Some(node) = bfs.next(&self.graph) {
            reachable.insert(self.graph[node].clone());
        }
        reachable
    }

    /// Whether `to` can occur in a derivation of `from`.
    pub fn reaches(&self, from: &str, to: &str) -> bool {
        self.reachable_from(from).contains(to)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }
}
