//! Backtracking parser that turns strings into derivation trees.
//!
//! The parser explores every alternative exhaustively and memoizes the
//! parses of each `(nonterminal, offset)` pair. Left-recursive grammars are
//! rejected with [`ParseError::LeftRecursion`] instead of looping forever.
//! When several parses consume the whole string, the first one found in
//! alternative order wins.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::ParseError;
use crate::grammar::{Grammar, START_SYMBOL, Symbol, expansion_symbols};
use crate::tree::DerivationTree;

type Parses = Rc<Vec<(usize, DerivationTree)>>;

/// A parser bound to one grammar.
#[derive(Debug, Clone)]
pub struct Parser<'g> {
    grammar: &'g Grammar,
    start: String,
}

impl<'g> Parser<'g> {
    pub fn new(grammar: &'g Grammar) -> Self {
        Self {
            grammar,
            start: START_SYMBOL.to_string(),
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = start.into();
        self
    }

    /// Parse `text` completely from the start symbol.
    pub fn parse(&self, text: &str) -> Result<DerivationTree, ParseError> {
        let mut state = ParseState {
            grammar: self.grammar,
            text,
            memo: HashMap::new(),
            active: HashSet::new(),
        };
        let parses = state.parse_nonterminal(&self.start, 0)?;
        parses
            .iter()
            .find(|(end, _)| *end == text.len())
            .map(|(_, tree)| tree.clone())
            .ok_or_else(|| ParseError::NoParse {
                input: text.to_string(),
            })
    }

    /// Whether `text` is in the language of the grammar.
    pub fn accepts(&self, text: &str) -> bool {
        self.parse(text).is_ok()
    }
}

struct ParseState<'a> {
    grammar: &'a Grammar,
    text: &'a str,
    memo: HashMap<(String, usize), Parses>,
    active: HashSet<(String, usize)>,
}

impl ParseState<'_> {
    fn parse_nonterminal(&mut self, nonterminal: &str, pos: usize) -> Result<Parses, ParseError> {
        let key = (nonterminal.to_string(), pos);
        if let Some(parses) = self.memo.get(&key) {
            return Ok(Rc::clone(parses));
        }
        if self.active.contains(&key) {
            return Err(ParseError::LeftRecursion {
                nonterminal: nonterminal.to_string(),
                offset: pos,
            });
        }
        let alternatives = self
            .grammar
            .expansions(nonterminal)
            .ok_or_else(|| ParseError::UnknownNonterminal {
                nonterminal: nonterminal.to_string(),
            })?
            .to_vec();

        self.active.insert(key.clone());
        let mut results = Vec::new();
        for alternative in &alternatives {
            match self.parse_alternative(alternative, pos) {
                Ok(partials) => {
                    for (end, children) in partials {
                        results.push((end, DerivationTree::new(nonterminal, children)));
                    }
                }
                Err(e) => {
                    self.active.remove(&key);
                    return Err(e);
                }
            }
        }
        self.active.remove(&key);

        let parses = Rc::new(results);
        self.memo.insert(key, Rc::clone(&parses));
        Ok(parses)
    }

    fn parse_alternative(
        &mut self,
        alternative: &str,
        pos: usize,
    ) -> Result<Vec<(usize, Vec<DerivationTree>)>, ParseError> {
        let mut partials: Vec<(usize, Vec<DerivationTree>)> = vec![(pos, Vec::new())];
        for symbol in expansion_symbols(alternative) {
            let mut next = Vec::new();
            for (at, children) in partials {
                match &symbol {
                    Symbol::Terminal(t) => {
                        if self.text[at..].starts_with(t.as_str()) {
                            let mut children = children;
                            children.push(DerivationTree::leaf(t.clone()));
                            next.push((at + t.len(), children));
                        }
                    }
                    Symbol::Nonterminal(nt) => {
                        let sub = self.parse_nonterminal(nt, at)?;
                        for (end, tree) in sub.iter() {
                            let mut extended = children.clone();
                            extended.push(tree.clone());
                            next.push((*end, extended));
                        }
                    }
                }
            }
            partials = next;
            if partials.is_empty() {
                break;
            }
        }
        Ok(partials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::tests::arithmetic_grammar;

    #[test]
    fn test_parse_roundtrips_text() {
        let grammar = arithmetic_grammar();
        let parser = Parser::new(&grammar);
        for text in ["sqrt(-900)", "cos(10)", "tan(5.25)", "sin(-3)"] {
            let tree = parser.parse(text).unwrap();
            assert_eq!(tree.to_string(), text);
            assert_eq!(tree.symbol, START_SYMBOL);
        }
    }

    #[test]
    fn test_parse_structure() {
        let grammar = arithmetic_grammar();
        let tree = Parser::new(&grammar).parse("sqrt(-1)").unwrap();
        let function = tree.find_all("<function>");
        assert_eq!(function.len(), 1);
        assert_eq!(function[0].expansion(), "sqrt");
        let minus = tree.find_all("<maybe_minus>");
        assert_eq!(minus[0].expansion(), "-");
        assert_eq!(tree.find_all("<number>")[0].to_text(), "-1");
    }

    #[test]
    fn test_parse_rejects_invalid() {
        let grammar = arithmetic_grammar();
        let parser = Parser::new(&grammar);
        assert!(matches!(
            parser.parse("sqrt(0)"),
            Err(ParseError::NoParse { .. })
        ));
        assert!(!parser.accepts("log(1)"));
        assert!(!parser.accepts("sqrt(1"));
    }

    #[test]
    fn test_left_recursion_detected() {
        let grammar = Grammar::from_rules([
            ("<start>", vec!["<expr>"]),
            ("<expr>", vec!["<expr>+1", "1"]),
        ]);
        assert!(matches!(
            Parser::new(&grammar).parse("1+1"),
            Err(ParseError::LeftRecursion { .. })
        ));
    }

    #[test]
    fn test_unknown_start() {
        let grammar = arithmetic_grammar();
        let parser = Parser::new(&grammar).with_start("<nope>");
        assert!(matches!(
            parser.parse("x"),
            Err(ParseError::UnknownNonterminal { .. })
        ));
    }

    #[test]
    fn test_empty_alternative() {
        let grammar = Grammar::from_rules([
            ("<start>", vec!["a<opt>b"]),
            ("<opt>", vec!["", "x"]),
        ]);
        let parser = Parser::new(&grammar);
        assert_eq!(parser.parse("ab").unwrap().to_string(), "ab");
        assert_eq!(parser.parse("axb").unwrap().to_string(), "axb");
    }
}
