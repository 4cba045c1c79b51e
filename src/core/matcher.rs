//! Constraint Matching Module
//!
//! Connectors and parsers are both chosen from an ordered list of
//! `(constraints, kind)` entries. The first entry whose constraints all hold
//! wins, so specific entries must be listed before general ones.

use crate::params::RequestParams;
use crate::utils::glob;

/// A single condition on the request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// Parameter equals the literal, compared case-insensitively after trimming.
    Is(&'static str, &'static str),
    /// Parameter is present, with or without a value.
    Present(&'static str),
    /// Parameter value is a `*`/`?` wildcard pattern.
    Wildcard(&'static str),
}

impl Constraint {
    pub fn holds(&self, params: &RequestParams) -> bool {
        match self {
            Constraint::Is(key, literal) => params
                .text(key)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case(literal)),
            Constraint::Present(key) => params.has(key),
            Constraint::Wildcard(key) => params.text(key).is_some_and(glob::is_pattern),
        }
    }
}

/// Ordered first-match table.
#[derive(Debug, Clone)]
pub struct ConstraintTable<K> {
    entries: Vec<(Vec<Constraint>, K)>,
}

impl<K: Clone> ConstraintTable<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, constraints: Vec<Constraint>, kind: K) -> Self {
        self.entries.push((constraints, kind));
        self
    }

    /// First kind whose every constraint holds.
    pub fn first_match(&self, params: &RequestParams) -> Option<K> {
        self.entries
            .iter()
            .find(|(constraints, _)| constraints.iter().all(|c| c.holds(params)))
            .map(|(_, kind)| kind.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Clone> Default for ConstraintTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests;
