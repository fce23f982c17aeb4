//! Sparse record of touched paths.
//!
//! A [`Modifications`] tree mirrors the node tree for changed paths only.
//! Entries carry no payload: whether a path was inserted, removed or had its
//! value changed is read back from the tree when notifications are built.

mod journal;

pub use journal::*;

#[cfg(test)]
mod modifications_test;

use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ModificationNode {
    pub(crate) children: BTreeMap<String, ModificationNode>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Modifications {
    root: ModificationNode,
}

impl Modifications {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records `path`.
    ///
    /// A path at or above an existing entry collapses everything recorded
    /// below it; a path below an already recorded leaf is subsumed and
    /// ignored.
    pub(crate) fn add(
        &mut self,
        path: &[String],
    ) {
        let mut node = &mut self.root;
        let mut was_present = false;
        for name in path {
            if !node.children.contains_key(name) {
                if was_present && node.children.is_empty() {
                    return;
                }
                was_present = false;
            } else {
                was_present = true;
            }
            node = node.children.entry(name.clone()).or_default();
        }
        node.children.clear();
    }

    pub(crate) fn root(&self) -> &ModificationNode {
        &self.root
    }

    /// Subtree recorded under `path`, if any.
    pub(crate) fn get(
        &self,
        path: &[String],
    ) -> Option<&ModificationNode> {
        let mut node = &self.root;
        for name in path {
            node = node.children.get(name)?;
        }
        Some(node)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }
}
