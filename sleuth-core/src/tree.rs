//! Derivation trees produced by the parser and the grammar fuzzer.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::grammar::is_nonterminal;

/// A node of a derivation tree. Nonterminal nodes carry a nonterminal
/// symbol; terminal leaves carry the literal text they contribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationTree {
    pub symbol: String,
    pub children: Vec<DerivationTree>,
}

impl DerivationTree {
    pub fn new(symbol: impl Into<String>, children: Vec<DerivationTree>) -> Self {
        Self {
            symbol: symbol.into(),
            children,
        }
    }

    pub fn leaf(text: impl Into<String>) -> Self {
        Self::new(text, Vec::new())
    }

    pub fn is_nonterminal(&self) -> bool {
        is_nonterminal(&self.symbol)
    }

    /// The concatenated terminal text of the tree.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) {
        if self.children.is_empty() {
            if !self.is_nonterminal() {
                out.push_str(&self.symbol);
            }
            return;
        }
        for child in &self.children {
            child.write_text(out);
        }
    }

    /// Pre-order traversal over all nodes.
    pub fn traverse(&self) -> Vec<&DerivationTree> {
        let mut nodes = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            nodes.push(node);
            stack.extend(node.children.iter().rev());
        }
        nodes
    }

    /// All subtrees rooted at `nonterminal`, in pre-order.
    pub fn find_all(&self, nonterminal: &str) -> Vec<&DerivationTree> {
        self.traverse()
            .into_iter()
            .filter(|n| n.symbol == nonterminal)
            .collect()
    }

    /// The alternative this node was expanded with, reconstructed from its
    /// children's symbols.
    pub fn expansion(&self) -> String {
        self.children.iter().map(|c| c.symbol.as_str()).collect()
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(DerivationTree::size).sum::<usize>()
    }

    pub fn depth(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(DerivationTree::depth)
            .max()
            .unwrap_or(0)
    }

    /// Stable structural hash, independent of process and platform.
    pub fn structural_hash(&self) -> u64 {
        let mut hasher = Sha256::new();
        for node in self.traverse() {
            hasher.update((node.symbol.len() as u64).to_le_bytes());
            hasher.update(node.symbol.as_bytes());
            hasher.update((node.children.len() as u64).to_le_bytes());
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl fmt::Display for DerivationTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DerivationTree {
        DerivationTree::new(
            "<start>",
            vec![DerivationTree::new(
                "<pair>",
                vec![
                    DerivationTree::new("<a>", vec![DerivationTree::leaf("x")]),
                    DerivationTree::leaf("-"),
                    DerivationTree::new("<a>", vec![DerivationTree::leaf("y")]),
                    DerivationTree::new("<empty>", vec![]),
                ],
            )],
        )
    }

    #[test]
    fn test_display_projects_terminals() {
        assert_eq!(sample().to_string(), "x-y");
    }

    #[test]
    fn test_traverse_preorder() {
        let tree = sample();
        let symbols: Vec<_> = tree.traverse().iter().map(|n| n.symbol.as_str()).collect();
        assert_eq!(
            symbols,
            vec!["<start>", "<pair>", "<a>", "x", "-", "<a>", "y", "<empty>"]
        );
    }

    #[test]
    fn test_find_all() {
        let tree = sample();
        let found = tree.find_all("<a>");
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].to_text(), "y");
    }

    #[test]
    fn test_expansion_reconstruction() {
        let tree = sample();
        assert_eq!(tree.children[0].expansion(), "<a>-<a><empty>");
        assert_eq!(tree.find_all("<empty>")[0].expansion(), "");
    }

    #[test]
    fn test_structural_hash_stable_and_distinct() {
        let a = sample();
        let b = sample();
        assert_eq!(a.structural_hash(), b.structural_hash());

        let mut c = sample();
        c.children[0].children[1] = DerivationTree::leaf("+");
        assert_ne!(a.structural_hash(), c.structural_hash());
    }

    #[test]
    fn test_size_and_depth() {
        let tree = sample();
        assert_eq!(tree.size(), 8);
        assert_eq!(tree.depth(), 4);
    }
}
