//! Storage for access state.
//!
//! Every access (root or child) lives in a slot of the [`Arena`] and is
//! addressed by a generation-checked [`AccessKey`]. Parents refer to their
//! children only through keys: the overlay keeps its children reachable,
//! the identity cache does not. Public handles hold an [`Anchor`]; a slot is
//! live while an anchor points at it, or while it is reachable from a live
//! slot through its parent, its root or its overlay. Everything else is
//! reclaimed by [`Arena::sweep`].

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Index;
use std::ops::IndexMut;
use std::sync::Arc;
use std::sync::Weak;

use parking_lot::Mutex;

use crate::broadcaster::AnyListener;
use crate::broadcaster::ChangesListener;
use crate::broadcaster::ContainerListener;
use crate::broadcaster::DisposeListener;
use crate::broadcaster::ListenerSet;
use crate::broadcaster::PropertiesChangeListener;
use crate::broadcaster::PropertyChangeListener;
use crate::broadcaster::VetoableChangeListener;
use crate::Node;
use crate::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct AccessKey {
    index: u32,
    generation: u32,
}

/// Liveness token shared by all clones of one public handle.
///
/// A child's anchor keeps its parent's anchor alive, so holding a deep
/// handle keeps the identity of every ancestor handle stable.
#[derive(Debug, Default)]
pub(crate) struct Anchor {
    parent: Mutex<Option<Arc<Anchor>>>,
}

impl Anchor {
    pub(crate) fn new(parent: Option<Arc<Anchor>>) -> Self {
        Self {
            parent: Mutex::new(parent),
        }
    }

    pub(crate) fn set_parent(
        &self,
        parent: Option<Arc<Anchor>>,
    ) {
        *self.parent.lock() = parent;
    }
}

/// How an access finds its node.
#[derive(Debug, Clone)]
pub(crate) enum Binding {
    /// Looked up by name under the parent (or, for a root, by path)
    Inherited,
    /// Held directly: inserted, renamed, removed or free elements
    Owned(Arc<Node>),
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ModifiedChild {
    pub(crate) child: AccessKey,
    pub(crate) directly_modified: bool,
}

#[derive(Default)]
pub(crate) struct Listeners {
    pub(crate) dispose: ListenerSet<dyn DisposeListener>,
    pub(crate) container: ListenerSet<dyn ContainerListener>,
    /// Keyed by property name; `""` means every property
    pub(crate) property_change: BTreeMap<String, ListenerSet<dyn PropertyChangeListener>>,
    pub(crate) vetoable: BTreeMap<String, ListenerSet<dyn VetoableChangeListener>>,
    pub(crate) properties_change: ListenerSet<dyn PropertiesChangeListener>,
}

impl Listeners {
    pub(crate) fn property_change_for(
        &self,
        name: &str,
    ) -> Vec<Arc<dyn PropertyChangeListener>> {
        let mut out = Vec::new();
        for key in [name, ""] {
            if let Some(set) = self.property_change.get(key) {
                out.extend(set.iter().cloned());
            }
            if name.is_empty() {
                break;
            }
        }
        out
    }

    pub(crate) fn all(&self) -> Vec<AnyListener> {
        let mut out: Vec<AnyListener> = Vec::new();
        out.extend(self.dispose.iter().cloned().map(AnyListener::Dispose));
        out.extend(self.container.iter().cloned().map(AnyListener::Container));
        for set in self.property_change.values() {
            out.extend(set.iter().cloned().map(AnyListener::PropertyChange));
        }
        for set in self.vetoable.values() {
            out.extend(set.iter().cloned().map(AnyListener::Vetoable));
        }
        out.extend(self.properties_change.iter().cloned().map(AnyListener::PropertiesChange));
        out
    }

    pub(crate) fn clear(&mut self) {
        self.dispose.clear();
        self.container.clear();
        self.property_change.clear();
        self.vetoable.clear();
        self.properties_change.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No pending changes since creation
    Idle,
    /// Pending changes recorded in the overlay
    Dirty,
    /// A commit is being merged
    Committing,
    Committed,
    RolledBack,
}

/// State only root accesses carry.
pub(crate) struct RootInfo {
    /// Member names from the data root
    pub(crate) path: Vec<String>,
    /// Canonical path representation
    pub(crate) representation: String,
    pub(crate) locale: String,
    pub(crate) update: bool,
    pub(crate) disposed: bool,
    pub(crate) state: TransactionState,
    pub(crate) changes_listeners: ListenerSet<dyn ChangesListener>,
}

pub(crate) struct AccessEntry {
    /// `None` until a public handle was first created
    pub(crate) anchor: Option<Weak<Anchor>>,
    pub(crate) parent: Option<AccessKey>,
    pub(crate) root: AccessKey,
    pub(crate) name: String,
    pub(crate) binding: Binding,
    pub(crate) modified_children: BTreeMap<String, ModifiedChild>,
    pub(crate) cached_children: HashMap<String, AccessKey>,
    pub(crate) changed_value: Option<Value>,
    /// Unbound by the transaction of `root` and not committed yet
    pub(crate) in_transaction: bool,
    pub(crate) listeners: Listeners,
    pub(crate) root_info: Option<Box<RootInfo>>,
}

impl AccessEntry {
    pub(crate) fn child(
        parent: AccessKey,
        root: AccessKey,
        name: impl Into<String>,
        binding: Binding,
    ) -> Self {
        Self {
            anchor: None,
            parent: Some(parent),
            root,
            name: name.into(),
            binding,
            modified_children: BTreeMap::new(),
            cached_children: HashMap::new(),
            changed_value: None,
            in_transaction: false,
            listeners: Listeners::default(),
            root_info: None,
        }
    }

    pub(crate) fn free(
        root: AccessKey,
        node: Arc<Node>,
    ) -> Self {
        let mut entry = Self::child(root, root, String::new(), Binding::Owned(node));
        entry.parent = None;
        entry
    }

    pub(crate) fn is_anchored(&self) -> bool {
        self.anchor.as_ref().is_some_and(|a| a.strong_count() > 0)
    }

    /// Whether a handle was once created and has since been dropped.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.anchor.as_ref().is_some_and(|a| a.strong_count() == 0)
    }
}

struct Slot {
    generation: u32,
    entry: Option<AccessEntry>,
}

#[derive(Default)]
pub(crate) struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    allocated_since_sweep: usize,
}

impl Arena {
    /// Stores the entry built by `make`, which receives the new key.
    pub(crate) fn insert_with(
        &mut self,
        make: impl FnOnce(AccessKey) -> AccessEntry,
    ) -> AccessKey {
        self.allocated_since_sweep += 1;
        let key = match self.free.pop() {
            Some(index) => AccessKey {
                index,
                generation: self.slots[index as usize].generation,
            },
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                AccessKey {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.slots[key.index as usize].entry = Some(make(key));
        key
    }

    pub(crate) fn get(
        &self,
        key: AccessKey,
    ) -> Option<&AccessEntry> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn get_mut(
        &mut self,
        key: AccessKey,
    ) -> Option<&mut AccessEntry> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.entry.as_mut())
    }

    pub(crate) fn contains(
        &self,
        key: AccessKey,
    ) -> bool {
        self.get(key).is_some()
    }

    pub(crate) fn keys(&self) -> Vec<AccessKey> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(index, slot)| AccessKey {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.entry.is_some()).count()
    }

    pub(crate) fn allocated_since_sweep(&self) -> usize {
        self.allocated_since_sweep
    }

    /// Frees every slot not reachable from an anchored one. Returns the
    /// number of slots freed.
    pub(crate) fn sweep(&mut self) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut stack: Vec<AccessKey> = self
            .keys()
            .into_iter()
            .filter(|key| self[*key].is_anchored())
            .collect();
        while let Some(key) = stack.pop() {
            let Some(entry) = self.get(key) else {
                continue;
            };
            let index = key.index as usize;
            if marked[index] {
                continue;
            }
            marked[index] = true;
            stack.extend(entry.parent);
            stack.push(entry.root);
            stack.extend(entry.modified_children.values().map(|m| m.child));
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.entry.is_some() && !marked[index] {
                slot.entry = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.allocated_since_sweep = 0;
        freed
    }
}

impl Index<AccessKey> for Arena {
    type Output = AccessEntry;

    fn index(
        &self,
        key: AccessKey,
    ) -> &AccessEntry {
        match self.get(key) {
            Some(entry) => entry,
            None => unreachable!("stale access key {key:?}: live accesses are never swept"),
        }
    }
}

impl IndexMut<AccessKey> for Arena {
    fn index_mut(
        &mut self,
        key: AccessKey,
    ) -> &mut AccessEntry {
        match self.get_mut(key) {
            Some(entry) => entry,
            None => unreachable!("stale access key {key:?}: live accesses are never swept"),
        }
    }
}
