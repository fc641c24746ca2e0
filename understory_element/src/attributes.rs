// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host attribute storage.

/// The string attributes of one element, in insertion order.
///
/// Every effective mutation bumps a counter, which lets a host detect whether
/// an operation touched the attributes at all.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeMap {
    entries: Vec<(String, String)>,
    mutations: u64,
}

/// An effective attribute mutation, carrying the replaced value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct AttributeMutation {
    pub(crate) old: Option<String>,
}

impl AttributeMap {
    /// Creates an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of an attribute.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).map(|idx| self.entries[idx].1.as_str())
    }

    /// Returns `true` if the attribute is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Returns the number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if there are no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Returns the number of effective mutations so far.
    #[must_use]
    pub fn mutations(&self) -> u64 {
        self.mutations
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(existing, _)| existing == name)
    }

    /// Sets an attribute. Setting the current value is not a mutation.
    pub(crate) fn set(&mut self, name: &str, value: String) -> Option<AttributeMutation> {
        let old = match self.position(name) {
            Some(idx) if self.entries[idx].1 == value => return None,
            Some(idx) => Some(core::mem::replace(&mut self.entries[idx].1, value)),
            None => {
                self.entries.push((name.to_owned(), value));
                None
            }
        };
        self.mutations += 1;
        Some(AttributeMutation { old })
    }

    /// Removes an attribute. Removing an absent attribute is not a mutation.
    pub(crate) fn remove(&mut self, name: &str) -> Option<AttributeMutation> {
        let idx = self.position(name)?;
        let (_, old) = self.entries.remove(idx);
        self.mutations += 1;
        Some(AttributeMutation { old: Some(old) })
    }
}
