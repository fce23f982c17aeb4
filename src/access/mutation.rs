//! Overlay edits: every change an update access makes before commit.

use std::sync::Arc;
use std::sync::Weak;

use tracing::debug;

use super::AccessEntry;
use super::AccessKey;
use super::Binding;
use super::ModifiedChild;
use super::TransactionState;
use crate::broadcaster::Element;
use crate::modifications::Modifications;
use crate::node::check_value;
use crate::path::is_valid_name;
use crate::registry::Shared;
use crate::registry::State;
use crate::AccessError;
use crate::Error;
use crate::Layer;
use crate::Node;
use crate::NodeKind;
use crate::Result;
use crate::Value;
use crate::ValueType;

fn inappropriate_set_element() -> Error {
    AccessError::illegal("inappropriate set element")
}

fn into_value(element: Element) -> Result<Value> {
    element
        .into_value()
        .ok_or_else(|| AccessError::illegal("inappropriate property value: an access is not a value"))
}

impl State {
    pub(crate) fn check_finalized(
        &self,
        key: AccessKey,
    ) -> Result<()> {
        if self.is_finalized(key) {
            return Err(AccessError::illegal("modification of finalized item"));
        }
        Ok(())
    }

    /// Records `child` as directly modified under `parent`, and every
    /// ancestor as indirectly modified.
    pub(crate) fn mark_child_as_modified(
        &mut self,
        parent: AccessKey,
        child: AccessKey,
    ) {
        let name = self.arena[child].name.clone();
        self.arena[parent].modified_children.insert(
            name,
            ModifiedChild {
                child,
                directly_modified: true,
            },
        );
        let mut current = parent;
        while let Some(up) = self.arena[current].parent {
            let name = self.arena[current].name.clone();
            self.arena[up]
                .modified_children
                .entry(name)
                .or_insert(ModifiedChild {
                    child: current,
                    directly_modified: false,
                });
            current = up;
        }
        if self.arena[current].root_info.is_some() {
            self.root_info_mut(current).state = TransactionState::Dirty;
        }
    }

    /// Detaches `child` from its parent, keeping a snapshot of its node.
    /// The child becomes free and pending in the transaction of its root.
    pub(crate) fn unbind(
        &mut self,
        child: AccessKey,
    ) {
        if matches!(self.arena[child].binding, Binding::Inherited) {
            if let Some(node) = self.node_of(child) {
                self.arena[child].binding = Binding::Owned(node);
            }
        }
        let root = self.root_key(child);
        let entry = &mut self.arena[child];
        let parent = entry.parent.take();
        entry.root = root;
        entry.in_transaction = true;
        if let Some(anchor) = entry.anchor.as_ref().and_then(Weak::upgrade) {
            anchor.set_parent(None);
        }
        let name = entry.name.clone();
        if let Some(parent) = parent {
            let cache = &mut self.arena[parent].cached_children;
            if cache.get(&name) == Some(&child) {
                cache.remove(&name);
            }
        }
    }

    /// Attaches a free `child` under `parent` as `name`.
    pub(crate) fn bind(
        &mut self,
        child: AccessKey,
        parent: AccessKey,
        name: &str,
    ) {
        let root = self.root_key(parent);
        let live = self.arena[child].anchor.as_ref().and_then(Weak::upgrade);
        if let Some(anchor) = live {
            let parent_anchor = self.anchor(parent);
            anchor.set_parent(Some(parent_anchor));
        }
        let entry = &mut self.arena[child];
        entry.parent = Some(parent);
        entry.root = root;
        entry.name = name.to_string();
    }

    /// Pending value if any, else the stored one.
    pub(crate) fn effective_value(
        &self,
        key: AccessKey,
    ) -> Option<Value> {
        let entry = &self.arena[key];
        if let Some(value) = &entry.changed_value {
            return Some(value.clone());
        }
        self.node_of(key).and_then(|n| n.value().cloned())
    }

    /// The element a child access stands for: its value for scalars (and
    /// for localized properties under a specific locale), else a handle.
    pub(crate) fn as_element(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
    ) -> Element {
        if let Some(value) = self.effective_value(key) {
            return Element::Value(value);
        }
        let localized = self
            .node_of(key)
            .is_some_and(|n| n.kind() == NodeKind::LocalizedProperty);
        if localized && !self.is_all_locales(key) {
            let name = format!("*{}", self.locale(key));
            let value = self
                .get_child(key, &name)
                .and_then(|child| self.effective_value(child))
                .unwrap_or_default();
            return Element::Value(value);
        }
        Element::Access(self.handle(shared, key))
    }

    /// Writes a new value to the scalar (or localized property) bound to
    /// `key`. Writing the current effective value changes nothing.
    pub(crate) fn set_property(
        &mut self,
        key: AccessKey,
        value: Value,
        mods: &mut Modifications,
    ) -> Result<()> {
        let node = self.node(key)?;
        let (ty, nillable) = match node.kind() {
            NodeKind::Property => node.static_type().unwrap_or((ValueType::Any, false)),
            NodeKind::LocalizedProperty => {
                if self.is_all_locales(key) {
                    return Err(AccessError::illegal(
                        "inappropriate property value: localized property accessed for all locales",
                    ));
                }
                let locale = self.locale(key).to_string();
                return match self.get_child(key, &format!("*{locale}")) {
                    Some(child) => self.set_property(child, value, mods),
                    None => self.insert_localized_value_child(key, &locale, value, mods),
                };
            }
            NodeKind::LocalizedValue => {
                let parent = self.arena[key].parent.and_then(|p| self.node_of(p));
                parent
                    .and_then(|p| p.static_type())
                    .unwrap_or((ValueType::Any, false))
            }
            _ => return Err(AccessError::illegal("inappropriate property value: not a value")),
        };
        check_value(&value, ty, nillable)?;
        if self.effective_value(key).as_ref() == Some(&value) {
            return Ok(());
        }
        let Some(parent) = self.arena[key].parent else {
            return Err(AccessError::runtime("value access without a parent"));
        };
        self.mark_child_as_modified(parent, key);
        self.arena[key].changed_value = Some(value);
        mods.add(&self.relative_path(key));
        Ok(())
    }

    /// Checks that `value` could be written through `key` without writing
    /// it.
    pub(crate) fn check_settable(
        &self,
        key: AccessKey,
        value: &Value,
    ) -> Result<()> {
        self.check_finalized(key)?;
        let node = self.node(key)?;
        let (ty, nillable) = match node.kind() {
            NodeKind::Property => node.static_type().unwrap_or((ValueType::Any, false)),
            NodeKind::LocalizedProperty if !self.is_all_locales(key) => {
                node.static_type().unwrap_or((ValueType::Any, false))
            }
            NodeKind::LocalizedValue => self.arena[key]
                .parent
                .and_then(|p| self.node_of(p))
                .and_then(|p| p.static_type())
                .unwrap_or((ValueType::Any, false)),
            _ => return Err(AccessError::illegal("inappropriate property value: not a value")),
        };
        check_value(value, ty, nillable)
    }

    pub(crate) fn insert_localized_value_child(
        &mut self,
        key: AccessKey,
        locale: &str,
        value: Value,
        mods: &mut Modifications,
    ) -> Result<()> {
        let node = self.node(key)?;
        let (ty, nillable) = node.static_type().unwrap_or((ValueType::Any, false));
        check_value(&value, ty, nillable)?;
        let root = self.root_key(key);
        let node = Arc::new(Node::localized_value(Layer::NONE, value));
        let child = self
            .arena
            .insert_with(|_| AccessEntry::child(key, root, locale, Binding::Owned(node)));
        self.mark_child_as_modified(key, child);
        mods.add(&self.relative_path(child));
        Ok(())
    }

    /// Sets the child `name` of a group; false if there is no such child.
    pub(crate) fn set_child_property(
        &mut self,
        key: AccessKey,
        name: &str,
        value: Value,
        mods: &mut Modifications,
    ) -> Result<bool> {
        let Some(child) = self.get_child(key, name) else {
            return Ok(false);
        };
        self.check_finalized(child)?;
        self.set_property(child, value, mods)?;
        Ok(true)
    }

    /// Validates a set element handed in by the caller.
    fn get_free_set_member(
        &self,
        shared: &Arc<Shared>,
        key: AccessKey,
        element: &Element,
    ) -> Result<AccessKey> {
        let Element::Access(access) = element else {
            return Err(inappropriate_set_element());
        };
        if !Arc::ptr_eq(&access.shared, shared) {
            return Err(inappropriate_set_element());
        }
        let free = access.key;
        let entry = self.arena.get(free).ok_or_else(inappropriate_set_element)?;
        if entry.parent.is_some() || entry.root_info.is_some() {
            return Err(inappropriate_set_element());
        }
        if entry.in_transaction && entry.root != self.root_key(key) {
            return Err(inappropriate_set_element());
        }
        let node = self.node(free)?;
        let template = node.template_name().unwrap_or_default();
        if !self.node(key)?.is_valid_template(template) {
            return Err(inappropriate_set_element());
        }
        Ok(free)
    }

    pub(crate) fn replace_by_name(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
        name: &str,
        element: Element,
        mods: &mut Modifications,
    ) -> Result<()> {
        let child = self
            .get_child(key, name)
            .ok_or_else(|| AccessError::no_such_element(name))?;
        self.check_finalized(child)?;
        match self.node(key)?.kind() {
            NodeKind::LocalizedProperty | NodeKind::Group => self.set_property(child, into_value(element)?, mods),
            NodeKind::Set => {
                let free = self.get_free_set_member(shared, key, &element)?;
                mods.add(&self.relative_path(child));
                self.unbind(child);
                self.bind(free, key, name);
                self.mark_child_as_modified(key, free);
                Ok(())
            }
            kind => Err(AccessError::invalid_state(format!("cannot replace members of a {kind:?}"))),
        }
    }

    pub(crate) fn replace_by_hierarchical_name(
        &mut self,
        key: AccessKey,
        path: &str,
        element: Element,
        mods: &mut Modifications,
    ) -> Result<()> {
        let child = self
            .get_sub_child(key, path)
            .ok_or_else(|| AccessError::no_such_element(path))?;
        self.check_finalized(child)?;
        let parent = self.arena[child]
            .parent
            .ok_or_else(|| AccessError::no_such_element(path))?;
        match self.node(parent)?.kind() {
            NodeKind::LocalizedProperty | NodeKind::Group => self.set_property(child, into_value(element)?, mods),
            NodeKind::Set => Err(AccessError::illegal(
                "replace_by_hierarchical_name does not currently support set members",
            )),
            NodeKind::Root => Err(AccessError::illegal(format!(
                "replace_by_hierarchical_name does not allow changing component {path}"
            ))),
            kind => Err(AccessError::invalid_state(format!("cannot replace members of a {kind:?}"))),
        }
    }

    pub(crate) fn insert_by_name(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
        name: &str,
        element: Element,
        mods: &mut Modifications,
    ) -> Result<()> {
        self.check_finalized(key)?;
        if self.get_child(key, name).is_some() {
            return Err(AccessError::ElementExists(name.to_string()).into());
        }
        let node = self.node(key)?;
        match node.kind() {
            NodeKind::LocalizedProperty => {
                if !is_valid_name(name, false) {
                    return Err(AccessError::illegal(format!("invalid name {name:?}")));
                }
                self.insert_localized_value_child(key, name, into_value(element)?, mods)
            }
            NodeKind::Group => {
                if !node.is_extensible() {
                    return Err(AccessError::invalid_state("group is not extensible"));
                }
                if !is_valid_name(name, false) {
                    return Err(AccessError::illegal(format!("invalid name {name:?}")));
                }
                let value = into_value(element)?;
                check_value(&value, ValueType::Any, true)?;
                let root = self.root_key(key);
                let node = Arc::new(Node::property(Layer::NONE, ValueType::Any, true, value, true));
                let child = self
                    .arena
                    .insert_with(|_| AccessEntry::child(key, root, name, Binding::Owned(node)));
                self.mark_child_as_modified(key, child);
                mods.add(&self.relative_path(child));
                Ok(())
            }
            NodeKind::Set => {
                if !is_valid_name(name, true) {
                    return Err(AccessError::illegal(format!("invalid name {name:?}")));
                }
                let free = self.get_free_set_member(shared, key, &element)?;
                self.bind(free, key, name);
                self.mark_child_as_modified(key, free);
                mods.add(&self.relative_path(free));
                Ok(())
            }
            kind => Err(AccessError::invalid_state(format!("cannot insert into a {kind:?}"))),
        }
    }

    pub(crate) fn remove_by_name(
        &mut self,
        key: AccessKey,
        name: &str,
        mods: &mut Modifications,
    ) -> Result<()> {
        let not_found = || AccessError::no_such_element(name);
        let child = self.get_child(key, name).ok_or_else(not_found)?;
        let child_node = self.node(child)?;
        if self.is_finalized(child) || child_node.is_mandatory() {
            return Err(not_found());
        }
        if self.node(key)?.kind() == NodeKind::Group && !child_node.is_extension() {
            return Err(not_found());
        }
        mods.add(&self.relative_path(child));
        // unbinding cuts the parent chain the marking walks
        self.mark_child_as_modified(key, child);
        self.unbind(child);
        let withdrawn = matches!(self.arena[child].binding, Binding::Owned(_))
            && self.node_of(key).is_some_and(|n| n.member(name).is_none());
        if withdrawn {
            // removing a pending insertion leaves nothing to commit
            self.arena[key].modified_children.remove(name);
            self.arena[child].in_transaction = false;
        }
        Ok(())
    }

    /// Renames a set member, displacing a non-finalized sibling that holds
    /// the new name.
    pub(crate) fn set_name(
        &mut self,
        key: AccessKey,
        new_name: &str,
        mods: &mut Modifications,
    ) -> Result<()> {
        self.check_finalized(key)?;
        let inappropriate = || AccessError::runtime("set_name inappropriate node");
        let node = self.node(key)?;
        if !matches!(node.kind(), NodeKind::Group | NodeKind::Set) || node.template_name().is_none() {
            return Err(inappropriate());
        }
        let Some(parent) = self.arena[key].parent else {
            return Err(inappropriate());
        };
        let other = self.get_child(parent, new_name);
        if other == Some(key) {
            return Ok(());
        }
        if node.is_mandatory() || other.is_some_and(|o| self.is_finalized(o)) {
            return Err(inappropriate());
        }
        if !is_valid_name(new_name, true) {
            return Err(AccessError::runtime(format!("invalid element name {new_name:?}")));
        }
        let old_name = self.arena[key].name.clone();
        mods.add(&self.relative_path(key));
        self.mark_child_as_modified(parent, key);
        self.unbind(key);
        if let Some(other) = other {
            self.unbind(other);
        }
        self.bind(key, parent, new_name);
        self.mark_child_as_modified(parent, key);
        mods.add(&self.relative_path(key));
        debug!(from = %old_name, to = new_name, "renamed set element");
        Ok(())
    }

    /// A free element instantiated from the default template of the set.
    pub(crate) fn create_instance(
        &mut self,
        key: AccessKey,
    ) -> Result<AccessKey> {
        let node = self.node(key)?;
        let template_name = node.default_template().unwrap_or_default();
        let template = self
            .template(template_name)
            .ok_or_else(|| AccessError::runtime(format!("unknown template {template_name}")))?;
        let mut instance = template.clone_node(true);
        instance.set_layer(Layer::NONE);
        let root = self.root_key(key);
        Ok(self.arena.insert_with(|_| AccessEntry::free(root, Arc::new(instance))))
    }
}
