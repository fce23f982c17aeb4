//! Merging an update root's overlay into the canonical tree.
//!
//! The overlay is walked depth first. A child is committed before its own
//! entry in the parent is merged, so an inserted element carries its nested
//! edits into the tree. Changes that became invalid since they were made
//! (the target was finalized, made mandatory or removed by a layer) are
//! dropped and reported, never turned into errors.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;

use super::AccessKey;
use super::Binding;
use super::TransactionState;
use crate::modifications::JournalEntry;
use crate::modifications::Modifications;
use crate::path::join_names;
use crate::registry::State;
use crate::Layer;
use crate::Node;

/// Outcome of one commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Journal sequence number assigned to this commit
    pub sequence: u64,
    /// Absolute paths merged into the tree, in journal order
    pub applied: Vec<String>,
    /// Absolute paths of changes that were discarded
    pub dropped: Vec<String>,
}

struct CommitContext {
    sequence: u64,
    journaled: BTreeSet<Vec<String>>,
    applied: Vec<String>,
    dropped: BTreeSet<Vec<String>>,
    global: Modifications,
}

impl State {
    fn record_applied(
        &self,
        ctx: &mut CommitContext,
        path: Vec<String>,
    ) {
        ctx.global.add(&path);
        if ctx.journaled.insert(path.clone()) {
            ctx.applied.push(join_names(&path));
            self.sink.append(JournalEntry {
                sequence: ctx.sequence,
                path,
            });
        }
    }

    /// Whether the root still denotes an existing, non-finalized node.
    fn root_is_committable(
        &self,
        root: AccessKey,
    ) -> bool {
        self.node_of(root).is_some() && !self.is_finalized(root)
    }

    /// Commits the overlay of `root`. Returns the report and the absolute
    /// modifications to broadcast to the other roots.
    pub(crate) fn commit(
        &mut self,
        root: AccessKey,
    ) -> (CommitReport, Modifications) {
        self.sequence += 1;
        let mut ctx = CommitContext {
            sequence: self.sequence,
            journaled: BTreeSet::new(),
            applied: Vec::new(),
            dropped: BTreeSet::new(),
            global: Modifications::new(),
        };
        self.root_info_mut(root).state = TransactionState::Committing;
        let valid = self.root_is_committable(root);
        self.commit_child_changes(root, valid, &mut ctx);
        self.root_info_mut(root).state = TransactionState::Committed;

        let dropped: Vec<String> = ctx.dropped.iter().map(|p| join_names(p)).collect();
        for path in &dropped {
            if self.config.commit.log_dropped_as_warning {
                warn!(path = %path, "dropped invalid change on commit");
            } else {
                debug!(path = %path, "dropped invalid change on commit");
            }
        }
        info!(
            "commit {} of {}: {} applied, {} dropped",
            ctx.sequence,
            self.root_info(root).representation,
            ctx.applied.len(),
            dropped.len()
        );
        let report = CommitReport {
            sequence: ctx.sequence,
            applied: ctx.applied,
            dropped,
        };
        (report, ctx.global)
    }

    fn commit_child_changes(
        &mut self,
        key: AccessKey,
        valid: bool,
        ctx: &mut CommitContext,
    ) {
        loop {
            let Some((name, modified)) = self.arena[key]
                .modified_children
                .first_key_value()
                .map(|(name, modified)| (name.clone(), *modified))
            else {
                break;
            };
            let child = modified.child;
            let present = self.is_present(key, &name, child);
            let mut child_valid = valid;
            if present {
                child_valid = child_valid && !self.is_finalized(child);
                self.commit_child(child, child_valid, ctx);
            }

            let member = self.node_of(key).and_then(|n| n.member(&name).cloned());
            let mut member_path = self.tree_path(key);
            if let Some(path) = member_path.as_mut() {
                path.push(name.clone());
            }
            if present {
                if let Binding::Owned(node) = &self.arena[child].binding {
                    let mut node = node.clone();
                    // an owned child only marked indirectly was displaced by
                    // another commit or a layer
                    child_valid = child_valid && modified.directly_modified;
                    if let Some(existing) = &member {
                        child_valid = child_valid && !existing.is_finalized();
                        if child_valid {
                            Arc::make_mut(&mut node).set_mandatory(existing.mandatory());
                        }
                    }
                    if child_valid {
                        self.replace_member(key, &name, member_path.as_deref(), member.as_ref(), Some(node), child);
                    }
                } else {
                    // an inherited child must still exist in the tree
                    child_valid = child_valid && member.as_ref().is_some_and(|m| !m.is_finalized());
                }
            } else {
                child_valid = child_valid && member.as_ref().is_some_and(|m| !m.is_finalized() && !m.is_mandatory());
                if child_valid {
                    self.replace_member(key, &name, member_path.as_deref(), member.as_ref(), None, child);
                }
            }

            if modified.directly_modified {
                let mut path = self.absolute_path(key);
                path.push(name.clone());
                if child_valid {
                    self.record_applied(ctx, path);
                } else {
                    ctx.dropped.insert(path);
                }
            }
            self.committed(key, &name, child, present, child_valid);
            self.arena[key].modified_children.remove(&name);
        }
    }

    fn commit_child(
        &mut self,
        child: AccessKey,
        valid: bool,
        ctx: &mut CommitContext,
    ) {
        self.commit_child_changes(child, valid, ctx);
        let Some(value) = self.arena[child].changed_value.take() else {
            return;
        };
        let path = self.absolute_path(child);
        if valid && self.with_node_mut(child, |n| n.set_value(Layer::NONE, value)) == Some(true) {
            self.record_applied(ctx, path);
        } else {
            ctx.dropped.insert(path);
        }
    }

    /// Puts `node` (or nothing) in place of the member `name` of `key`.
    fn replace_member(
        &mut self,
        key: AccessKey,
        name: &str,
        member_path: Option<&[String]>,
        old: Option<&Arc<Node>>,
        node: Option<Arc<Node>>,
        except: AccessKey,
    ) {
        if let (Some(path), Some(old)) = (member_path, old) {
            self.detach_displaced(path, old, Some(except));
        }
        self.with_node_mut(key, |parent| {
            if let Some(members) = parent.members_mut() {
                match node {
                    Some(node) => {
                        members.insert(name.to_string(), node);
                    }
                    None => {
                        members.remove(name);
                    }
                }
            }
        });
    }

    fn committed(
        &mut self,
        parent: AccessKey,
        name: &str,
        child: AccessKey,
        present: bool,
        valid: bool,
    ) {
        if !self.arena.contains(child) {
            return;
        }
        let owned = matches!(self.arena[child].binding, Binding::Owned(_));
        if present && owned {
            if valid {
                self.arena[child].binding = Binding::Inherited;
                self.arena[parent].cached_children.insert(name.to_string(), child);
            } else {
                // a dropped insertion leaves the element free again
                self.unbind(child);
            }
        }
        self.arena[child].in_transaction = false;
    }

    /// Gives every other access still bound to the tree member at `path`
    /// a snapshot of the node it saw, before that member is replaced or
    /// removed.
    pub(crate) fn detach_displaced(
        &mut self,
        path: &[String],
        old: &Arc<Node>,
        except: Option<AccessKey>,
    ) {
        for key in self.arena.keys() {
            let entry = &self.arena[key];
            if Some(key) == except || entry.root_info.is_some() || !matches!(entry.binding, Binding::Inherited) {
                continue;
            }
            if self.tree_path(key).as_deref() != Some(path) {
                continue;
            }
            let entry = &mut self.arena[key];
            entry.binding = Binding::Owned(old.clone());
            let name = entry.name.clone();
            if let Some(parent) = entry.parent {
                let cache = &mut self.arena[parent].cached_children;
                if cache.get(&name) == Some(&key) {
                    cache.remove(&name);
                }
            }
            debug!(path = %join_names(path), "detached access from displaced node");
        }
    }

    /// Discards the overlay below `key` without touching the tree.
    pub(crate) fn revert_child_changes(
        &mut self,
        key: AccessKey,
    ) {
        let overlay = std::mem::take(&mut self.arena[key].modified_children);
        for (name, modified) in overlay {
            let child = modified.child;
            if !self.arena.contains(child) {
                continue;
            }
            self.arena[child].changed_value = None;
            if self.is_present(key, &name, child) {
                self.revert_child_changes(child);
                if matches!(self.arena[child].binding, Binding::Owned(_)) {
                    self.unbind(child);
                }
            }
            self.arena[child].in_transaction = false;
        }
    }
}
