// SPDX-License-Identifier: AGPL-3.0-only
// SPDX-FileCopyrightText: 2025 Steve Clarke <stephenlclarke@mac.com> - https://xyzzy.tools

use std::collections::HashMap;

/// Insertion-ordered map from strategy name to its argument string.
///
/// Order matters: the flat layout and the "first key" default fallback both
/// follow the order in which arms appeared in the source.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StrategyTable {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl StrategyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a strategy unless the name is already present.  Returns `false`
    /// when the name was taken, leaving the first value in place.
    pub fn insert(&mut self, name: impl Into<String>, args: impl Into<String>) -> bool {
        let name = name.into();
        if self.index.contains_key(&name) {
            return false;
        }
        self.index.insert(name.clone(), self.entries.len());
        self.entries.push((name, args.into()));
        true
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(name)
            .map(|&idx| self.entries[idx].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.entries.first().map(|(name, _)| name.as_str())
    }

    /// Iterate `(name, args)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, args)| (name.as_str(), args.as_str()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}
