//! Token trie for multi-word command matching (spec §4.1): walks the
//! longest matching sequence of literal tokens that ends on a node
//! carrying a command, so `get`, `get user`, and `get role` resolve to
//! three distinct commands from one descent.

use crate::parser::commands::CommandType;
use std::collections::HashMap;

#[derive(Default)]
pub struct TrieNode {
    children: HashMap<String, TrieNode>,
    command: Option<CommandType>,
}

impl TrieNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tokens: &[&str], command: CommandType) {
        let mut node = self;
        for token in tokens {
            node = node.children.entry(token.to_string()).or_default();
        }
        node.command = Some(command);
    }

    /// Returns the command reached by the longest matching prefix of
    /// `tokens`, plus how many tokens it consumed.
    pub fn descend(&self, tokens: &[&str]) -> Option<(CommandType, usize)> {
        if let Some(first) = tokens.first() {
            if let Some(child) = self.children.get(*first) {
                if let Some((cmd, consumed)) = child.descend(&tokens[1..]) {
                    return Some((cmd, consumed + 1));
                }
            }
        }
        self.command.map(|cmd| (cmd, 0))
    }
}
