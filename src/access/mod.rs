//! Access handles: the client-facing view onto the registry tree.
//!
//! An [`Access`] addresses one node through the root it was obtained from.
//! Reads see the canonical tree through the root's pending edits; writes on
//! update roots only touch that overlay until [`Access::commit_changes`].
//! Every call takes the registry lock for its whole duration and delivers
//! the notifications it caused after releasing it.

mod arena;
mod commit;
mod mutation;
mod notify;
mod resolve;

pub(crate) use arena::AccessEntry;
pub(crate) use arena::AccessKey;
pub(crate) use arena::Anchor;
pub(crate) use arena::Arena;
pub(crate) use arena::Binding;
pub(crate) use arena::Listeners;
pub(crate) use arena::ModifiedChild;
pub(crate) use arena::RootInfo;
pub use arena::TransactionState;
pub use commit::CommitReport;


use std::fmt::Debug;
use std::sync::Arc;
use std::sync::Weak;

use tracing::debug;

use crate::broadcaster::AnyListener;
use crate::broadcaster::ChangesListener;
use crate::broadcaster::ContainerListener;
use crate::broadcaster::DisposeListener;
use crate::broadcaster::Element;
use crate::broadcaster::ElementChange;
use crate::broadcaster::EventObject;
use crate::broadcaster::PropertiesChangeListener;
use crate::broadcaster::PropertyChangeEvent;
use crate::broadcaster::PropertyChangeListener;
use crate::broadcaster::VetoableChangeListener;
use crate::modifications::Modifications;
use crate::path::create_segment;
use crate::registry::Shared;
use crate::registry::State;
use crate::AccessError;
use crate::Broadcaster;
use crate::NodeKind;
use crate::Result;
use crate::Value;
use crate::ValueType;

/// Attribute flags of a [`PropertyInfo`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PropertyAttributes {
    pub bound: bool,
    pub constrained: bool,
    /// The value may be nil
    pub maybe_void: bool,
    pub removable: bool,
    pub read_only: bool,
}

/// Description of a child as a property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    /// `None` for containers, which are exposed as accesses
    pub value_type: Option<ValueType>,
    pub attributes: PropertyAttributes,
}

/// Handle to one node of the registry, as seen from one root.
///
/// Clones share identity: while any clone is alive, looking the same child
/// up again yields an equal handle.
#[derive(Clone)]
pub struct Access {
    shared: Arc<Shared>,
    key: AccessKey,
    _anchor: Arc<Anchor>,
}

impl PartialEq for Access {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared) && self.key == other.key
    }
}

impl Eq for Access {}

impl Debug for Access {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Access").field("key", &self.key).finish()
    }
}

impl State {
    /// Liveness token of `key`, creating it (and its ancestors' tokens) if
    /// no handle currently holds one.
    pub(crate) fn anchor(
        &mut self,
        key: AccessKey,
    ) -> Arc<Anchor> {
        if let Some(anchor) = self.arena[key].anchor.as_ref().and_then(Weak::upgrade) {
            return anchor;
        }
        let parent = self.arena[key].parent.map(|p| self.anchor(p));
        let anchor = Arc::new(Anchor::new(parent));
        self.arena[key].anchor = Some(Arc::downgrade(&anchor));
        anchor
    }

    pub(crate) fn handle(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
    ) -> Access {
        Access {
            shared: shared.clone(),
            key,
            _anchor: self.anchor(key),
        }
    }

    fn check_alive(
        &self,
        key: AccessKey,
    ) -> Result<()> {
        if self.is_disposed(key) {
            return Err(AccessError::Disposed.into());
        }
        Ok(())
    }

    fn check_update(
        &self,
        key: AccessKey,
    ) -> Result<()> {
        if !self.is_update(key) {
            return Err(AccessError::runtime("non-update access"));
        }
        Ok(())
    }

    fn check_root(
        &self,
        key: AccessKey,
        operation: &str,
    ) -> Result<()> {
        if !self.is_root(key) {
            return Err(AccessError::runtime(format!("{operation} is only available on root accesses")));
        }
        Ok(())
    }

    /// A localized property is only navigable under an all-locales root.
    fn check_localized_property_access(
        &self,
        key: AccessKey,
    ) -> Result<()> {
        let node = self.node(key)?;
        if node.kind() == NodeKind::LocalizedProperty && !self.is_all_locales(key) {
            return Err(AccessError::runtime("access to a localized property for a specific locale"));
        }
        Ok(())
    }

    fn check_kind(
        &self,
        key: AccessKey,
        allowed: &[NodeKind],
        operation: &str,
    ) -> Result<NodeKind> {
        let kind = self.node(key)?.kind();
        if !allowed.contains(&kind) {
            return Err(AccessError::invalid_state(format!("{operation} not supported on a {kind:?}")));
        }
        Ok(kind)
    }

    fn check_container(
        &self,
        key: AccessKey,
        operation: &str,
    ) -> Result<NodeKind> {
        let kind = self.check_kind(
            key,
            &[NodeKind::Group, NodeKind::Set, NodeKind::LocalizedProperty, NodeKind::Root],
            operation,
        )?;
        self.check_localized_property_access(key)?;
        Ok(kind)
    }

    fn check_group(
        &self,
        key: AccessKey,
        operation: &str,
    ) -> Result<()> {
        self.check_kind(key, &[NodeKind::Group], operation).map(|_| ())
    }

    /// Property names accepted for property-change listeners: `""` or a
    /// scalar child visible under the root's locale.
    fn check_known_property(
        &mut self,
        key: AccessKey,
        name: &str,
    ) -> Result<()> {
        if name.is_empty() {
            return Ok(());
        }
        if let Some(child) = self.get_child(key, name) {
            let all_locales = self.is_all_locales(key);
            let known = match self.node(child)?.kind() {
                NodeKind::Property => true,
                NodeKind::LocalizedProperty => !all_locales,
                NodeKind::LocalizedValue => all_locales,
                _ => false,
            };
            if known {
                return Ok(());
            }
        }
        Err(AccessError::unknown_property(name))
    }

    fn property_info(
        &self,
        key: AccessKey,
    ) -> Result<PropertyInfo> {
        let node = self.node(key)?;
        let parent = self.arena[key].parent.and_then(|p| self.node_of(p));
        let (value_type, nillable, removable) = match node.kind() {
            NodeKind::Property => {
                let (ty, nillable) = node.static_type().unwrap_or((ValueType::Any, false));
                (Some(ty), nillable, node.is_extension())
            }
            NodeKind::LocalizedProperty => {
                let (ty, nillable) = node.static_type().unwrap_or((ValueType::Any, false));
                let ty = (!self.is_all_locales(key)).then_some(ty);
                (ty, nillable, false)
            }
            NodeKind::LocalizedValue => {
                let (ty, nillable) = parent
                    .as_ref()
                    .and_then(|p| p.static_type())
                    .unwrap_or((ValueType::Any, false));
                (Some(ty), nillable, false)
            }
            _ => (None, false, parent.is_some_and(|p| p.kind() == NodeKind::Set)),
        };
        let update = self.is_update(key);
        Ok(PropertyInfo {
            name: self.arena[key].name.clone(),
            value_type,
            attributes: PropertyAttributes {
                bound: true,
                constrained: true,
                maybe_void: nillable,
                removable: update && removable,
                read_only: !update || node.is_finalized(),
            },
        })
    }

    /// Collects the pending changes below `key`, directly modified entries
    /// only.
    fn report_child_changes(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
        changes: &mut Vec<ElementChange>,
    ) {
        let overlay: Vec<(String, ModifiedChild)> = self.arena[key]
            .modified_children
            .iter()
            .map(|(name, modified)| (name.clone(), *modified))
            .collect();
        for (name, modified) in overlay {
            if self.is_present(key, &name, modified.child) {
                self.report_child_changes(shared, modified.child, changes);
                if modified.directly_modified {
                    let element = self.as_element(shared, modified.child);
                    changes.push(ElementChange {
                        accessor: self.relative_path_representation(modified.child),
                        element: Some(element),
                        replaced_element: None,
                    });
                }
            } else if modified.directly_modified {
                let template = self
                    .node_of(key)
                    .filter(|n| n.kind() == NodeKind::Set)
                    .and_then(|n| n.template_name().map(str::to_string))
                    .unwrap_or_default();
                let mut accessor = self.relative_path_representation(key);
                if !accessor.is_empty() {
                    accessor.push('/');
                }
                accessor.push_str(&create_segment(&template, &name));
                changes.push(ElementChange {
                    accessor,
                    element: None,
                    replaced_element: None,
                });
            }
        }
    }

    /// Queues the notifications for local edits recorded in `mods`.
    fn broadcast_local(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
        mods: &Modifications,
        broadcaster: &mut Broadcaster,
    ) {
        if mods.is_empty() {
            return;
        }
        let root = self.notification_root(key);
        self.init_broadcaster(shared, root, mods.root(), broadcaster);
    }
}

impl Access {
    /// Runs `f` under the registry lock after checking the handle is not
    /// disposed.
    fn run<R>(
        &self,
        f: impl FnOnce(&mut State, &mut Broadcaster, AccessKey) -> Result<R>,
    ) -> Result<R> {
        let key = self.key;
        self.shared.run(|state, broadcaster| {
            state.check_alive(key)?;
            f(state, broadcaster, key)
        })
    }

    /// Registers a listener through `register`, or tells it right away that
    /// this access is gone.
    fn add_listener(
        &self,
        listener: AnyListener,
        register: impl FnOnce(&mut State, AccessKey) -> Result<()>,
    ) -> Result<()> {
        let key = self.key;
        self.shared.run(|state, broadcaster| {
            if state.is_disposed(key) {
                let source = self.clone();
                broadcaster.add_dispose_notification(listener, EventObject { source });
                return Ok(());
            }
            register(state, key)
        })
    }

    // -
    // Element access

    /// The child `name`: its value for scalars, else a handle.
    pub fn get_by_name(
        &self,
        name: &str,
    ) -> Result<Element> {
        self.run(|state, _, key| {
            state.check_container(key, "get_by_name")?;
            let child = state
                .get_child(key, name)
                .ok_or_else(|| AccessError::no_such_element(name))?;
            Ok(state.as_element(&self.shared, child))
        })
    }

    /// Canonical members not shadowed by pending edits, then the pending
    /// insertions.
    pub fn get_element_names(&self) -> Result<Vec<String>> {
        self.run(|state, _, key| {
            state.check_container(key, "get_element_names")?;
            Ok(state.child_names(key))
        })
    }

    pub fn has_by_name(
        &self,
        name: &str,
    ) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_container(key, "has_by_name")?;
            Ok(state.get_child(key, name).is_some())
        })
    }

    pub fn has_elements(&self) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_container(key, "has_elements")?;
            Ok(!state.child_names(key).is_empty())
        })
    }

    /// Type of the values of a localized property; `None` for groups and
    /// sets.
    pub fn element_type(&self) -> Result<Option<ValueType>> {
        self.run(|state, _, key| {
            state.check_container(key, "element_type")?;
            let node = state.node(key)?;
            Ok(match node.kind() {
                NodeKind::LocalizedProperty => node.static_type().map(|(ty, _)| ty),
                _ => None,
            })
        })
    }

    /// Names are matched exactly, so this returns its input.
    pub fn get_exact_name(
        &self,
        name: &str,
    ) -> Result<String> {
        self.run(|state, _, key| {
            state.check_container(key, "get_exact_name")?;
            Ok(name.to_string())
        })
    }

    pub fn get_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<Element> {
        self.run(|state, _, key| {
            state.check_container(key, "get_by_hierarchical_name")?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::no_such_element(path))?;
            Ok(state.as_element(&self.shared, child))
        })
    }

    pub fn has_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_container(key, "has_by_hierarchical_name")?;
            Ok(state.get_sub_child(key, path).is_some())
        })
    }

    pub fn get_description_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<Option<String>> {
        self.run(|state, _, key| {
            state.check_container(key, "get_description_by_hierarchical_name")?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::no_such_element(path))?;
            Ok(state.node(child)?.description().map(str::to_string))
        })
    }

    /// Static type of a property or localized property.
    pub fn get_type_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<ValueType> {
        self.run(|state, _, key| {
            state.check_container(key, "get_type_by_hierarchical_name")?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::no_such_element(path))?;
            let node = state.node(child)?;
            match node.kind() {
                NodeKind::Property | NodeKind::LocalizedProperty => {
                    Ok(node.static_type().map(|(ty, _)| ty).unwrap_or(ValueType::Any))
                }
                kind => Err(AccessError::invalid_state(format!("{path} is a {kind:?}, not a property"))),
            }
        })
    }

    /// Whether a committed user-level value was ever written to the
    /// property or localized value at `path`.
    pub fn get_modified_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_container(key, "get_modified_by_hierarchical_name")?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::no_such_element(path))?;
            let node = state.node(child)?;
            node.is_modified()
                .ok_or_else(|| AccessError::invalid_state(format!("{path} is a {:?}, not a value", node.kind())))
        })
    }

    // -
    // Names

    pub fn get_name(&self) -> Result<String> {
        self.run(|state, _, key| Ok(state.arena[key].name.clone()))
    }

    /// Absolute path representation of this access.
    pub fn get_hierarchical_name(&self) -> Result<String> {
        self.run(|state, _, key| Ok(state.absolute_path_representation(key)))
    }

    /// Appends `relative` to the path of this access relative to its root.
    pub fn compose_hierarchical_name(
        &self,
        relative: &str,
    ) -> Result<String> {
        self.run(|state, _, key| {
            if relative.is_empty() || relative.starts_with('/') {
                return Err(AccessError::illegal(format!("inappropriate relative name {relative:?}")));
            }
            let mut path = state.relative_path_representation(key);
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(relative);
            Ok(path)
        })
    }

    // -
    // Group properties

    pub fn get_property_value(
        &self,
        name: &str,
    ) -> Result<Element> {
        self.run(|state, _, key| {
            state.check_group(key, "get_property_value")?;
            let child = state
                .get_child(key, name)
                .ok_or_else(|| AccessError::unknown_property(name))?;
            Ok(state.as_element(&self.shared, child))
        })
    }

    pub fn set_property_value(
        &self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        self.run(|state, broadcaster, key| {
            state.check_group(key, "set_property_value")?;
            state.check_update(key)?;
            let mut mods = Modifications::new();
            if !state.set_child_property(key, name, value, &mut mods)? {
                return Err(AccessError::unknown_property(name));
            }
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    pub fn get_property_values(
        &self,
        names: &[&str],
    ) -> Result<Vec<Element>> {
        self.run(|state, _, key| {
            state.check_group(key, "get_property_values")?;
            let mut out = Vec::with_capacity(names.len());
            for name in names {
                let child = state
                    .get_child(key, name)
                    .ok_or_else(|| AccessError::runtime(format!("inappropriate property name {name}")))?;
                out.push(state.as_element(&self.shared, child));
            }
            Ok(out)
        })
    }

    /// Sets several properties at once. Every name and value is checked
    /// before anything is written.
    pub fn set_property_values(
        &self,
        names: &[&str],
        values: Vec<Value>,
    ) -> Result<()> {
        self.run(|state, broadcaster, key| {
            state.check_group(key, "set_property_values")?;
            state.check_update(key)?;
            if names.len() != values.len() {
                return Err(AccessError::illegal("property names and values differ in length"));
            }
            let mut children = Vec::with_capacity(names.len());
            for (name, value) in names.iter().zip(&values) {
                let child = state
                    .get_child(key, name)
                    .ok_or_else(|| AccessError::illegal(format!("inappropriate property name {name}")))?;
                state.check_settable(child, value)?;
                children.push(child);
            }
            let mut mods = Modifications::new();
            for (child, value) in children.into_iter().zip(values) {
                state.set_property(child, value, &mut mods)?;
            }
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    pub fn get_hierarchical_property_value(
        &self,
        path: &str,
    ) -> Result<Element> {
        self.run(|state, _, key| {
            state.check_group(key, "get_hierarchical_property_value")?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::unknown_property(path))?;
            Ok(state.as_element(&self.shared, child))
        })
    }

    pub fn set_hierarchical_property_value(
        &self,
        path: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        self.run(|state, broadcaster, key| {
            state.check_group(key, "set_hierarchical_property_value")?;
            state.check_update(key)?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::unknown_property(path))?;
            state.check_finalized(child)?;
            let mut mods = Modifications::new();
            state.set_property(child, value, &mut mods)?;
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    pub fn get_hierarchical_property_values(
        &self,
        paths: &[&str],
    ) -> Result<Vec<Element>> {
        self.run(|state, _, key| {
            state.check_group(key, "get_hierarchical_property_values")?;
            let mut out = Vec::with_capacity(paths.len());
            for path in paths {
                let child = state
                    .get_sub_child(key, path)
                    .ok_or_else(|| AccessError::illegal(format!("inappropriate hierarchical property name {path}")))?;
                out.push(state.as_element(&self.shared, child));
            }
            Ok(out)
        })
    }

    pub fn set_hierarchical_property_values(
        &self,
        paths: &[&str],
        values: Vec<Value>,
    ) -> Result<()> {
        self.run(|state, broadcaster, key| {
            state.check_group(key, "set_hierarchical_property_values")?;
            state.check_update(key)?;
            if paths.len() != values.len() {
                return Err(AccessError::illegal("property names and values differ in length"));
            }
            let mut children = Vec::with_capacity(paths.len());
            for (path, value) in paths.iter().zip(&values) {
                let child = state
                    .get_sub_child(key, path)
                    .ok_or_else(|| AccessError::illegal(format!("inappropriate hierarchical property name {path}")))?;
                state.check_settable(child, value)?;
                children.push(child);
            }
            let mut mods = Modifications::new();
            for (child, value) in children.into_iter().zip(values) {
                state.set_property(child, value, &mut mods)?;
            }
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    /// Every child of this group, described as a property.
    pub fn get_properties(&self) -> Result<Vec<PropertyInfo>> {
        self.run(|state, _, key| {
            state.check_group(key, "get_properties")?;
            let mut out = Vec::new();
            for name in state.child_names(key) {
                if let Some(child) = state.get_child(key, &name) {
                    out.push(state.property_info(child)?);
                }
            }
            Ok(out)
        })
    }

    pub fn get_property_by_name(
        &self,
        name: &str,
    ) -> Result<PropertyInfo> {
        self.run(|state, _, key| {
            state.check_group(key, "get_property_by_name")?;
            let child = state
                .get_child(key, name)
                .ok_or_else(|| AccessError::unknown_property(name))?;
            state.property_info(child)
        })
    }

    pub fn has_property_by_name(
        &self,
        name: &str,
    ) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_group(key, "has_property_by_name")?;
            Ok(state.get_child(key, name).is_some())
        })
    }

    pub fn get_property_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<PropertyInfo> {
        self.run(|state, _, key| {
            state.check_group(key, "get_property_by_hierarchical_name")?;
            let child = state
                .get_sub_child(key, path)
                .ok_or_else(|| AccessError::unknown_property(path))?;
            state.property_info(child)
        })
    }

    pub fn has_property_by_hierarchical_name(
        &self,
        path: &str,
    ) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_group(key, "has_property_by_hierarchical_name")?;
            Ok(state.get_sub_child(key, path).is_some())
        })
    }

    /// This access described as a property of its parent.
    pub fn as_property(&self) -> Result<PropertyInfo> {
        self.run(|state, _, key| state.property_info(key))
    }

    /// Hands `listener` one batched event naming `names`, right away.
    pub fn fire_properties_change_event(
        &self,
        names: &[&str],
        listener: Arc<dyn PropertiesChangeListener>,
    ) -> Result<()> {
        self.run(|state, broadcaster, key| {
            state.check_group(key, "fire_properties_change_event")?;
            let events = names
                .iter()
                .map(|name| PropertyChangeEvent {
                    source: self.clone(),
                    property_name: name.to_string(),
                    new_value: None,
                })
                .collect();
            broadcaster.add_properties_change_notification(listener, events);
            Ok(())
        })
    }

    // -
    // Structural edits

    /// Replaces the value of a group member or localized value, or puts the
    /// free element `element` in place of a set member.
    pub fn replace_by_name(
        &self,
        name: &str,
        element: impl Into<Element>,
    ) -> Result<()> {
        let element = element.into();
        self.run(|state, broadcaster, key| {
            state.check_kind(
                key,
                &[NodeKind::Group, NodeKind::Set, NodeKind::LocalizedProperty],
                "replace_by_name",
            )?;
            state.check_localized_property_access(key)?;
            state.check_update(key)?;
            let mut mods = Modifications::new();
            state.replace_by_name(&self.shared, key, name, element, &mut mods)?;
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    /// Replaces the value at `path`. Set members and components cannot be
    /// replaced this way.
    pub fn replace_by_hierarchical_name(
        &self,
        path: &str,
        element: impl Into<Element>,
    ) -> Result<()> {
        let element = element.into();
        self.run(|state, broadcaster, key| {
            state.check_container(key, "replace_by_hierarchical_name")?;
            state.check_update(key)?;
            let mut mods = Modifications::new();
            state.replace_by_hierarchical_name(key, path, element, &mut mods)?;
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    /// Inserts a value into an extensible group or a localized property, or
    /// a free element into a set.
    pub fn insert_by_name(
        &self,
        name: &str,
        element: impl Into<Element>,
    ) -> Result<()> {
        let element = element.into();
        self.run(|state, broadcaster, key| {
            state.check_kind(
                key,
                &[NodeKind::Group, NodeKind::Set, NodeKind::LocalizedProperty],
                "insert_by_name",
            )?;
            state.check_localized_property_access(key)?;
            state.check_update(key)?;
            let mut mods = Modifications::new();
            state.insert_by_name(&self.shared, key, name, element, &mut mods)?;
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    pub fn remove_by_name(
        &self,
        name: &str,
    ) -> Result<()> {
        self.run(|state, broadcaster, key| {
            state.check_kind(
                key,
                &[NodeKind::Group, NodeKind::Set, NodeKind::LocalizedProperty],
                "remove_by_name",
            )?;
            state.check_localized_property_access(key)?;
            state.check_update(key)?;
            let mut mods = Modifications::new();
            state.remove_by_name(key, name, &mut mods)?;
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    /// A new free element built from the default template of this set.
    pub fn create_instance(&self) -> Result<Access> {
        self.run(|state, _, key| {
            state.check_kind(key, &[NodeKind::Set], "create_instance")?;
            state.check_update(key)?;
            let free = state.create_instance(key)?;
            Ok(state.handle(&self.shared, free))
        })
    }

    /// Same as [`Access::create_instance`]; no arguments are supported.
    pub fn create_instance_with_arguments(
        &self,
        arguments: &[Value],
    ) -> Result<Access> {
        if !arguments.is_empty() {
            return Err(AccessError::illegal("create_instance_with_arguments does not support arguments"));
        }
        self.create_instance()
    }

    /// Renames this set member.
    pub fn set_name(
        &self,
        name: &str,
    ) -> Result<()> {
        self.run(|state, broadcaster, key| {
            state.check_localized_property_access(key)?;
            state.check_update(key)?;
            let mut mods = Modifications::new();
            state.set_name(key, name, &mut mods)?;
            state.broadcast_local(&self.shared, key, &mods, broadcaster);
            Ok(())
        })
    }

    // -
    // Listeners

    pub fn add_dispose_listener(
        &self,
        listener: Arc<dyn DisposeListener>,
    ) -> Result<()> {
        self.add_listener(AnyListener::Dispose(listener.clone()), |state, key| {
            state.arena[key].listeners.dispose.insert(listener);
            Ok(())
        })
    }

    pub fn remove_dispose_listener(
        &self,
        listener: &Arc<dyn DisposeListener>,
    ) -> Result<()> {
        self.shared.run(|state, _| {
            state.arena[self.key].listeners.dispose.remove(listener);
            Ok(())
        })
    }

    pub fn add_container_listener(
        &self,
        listener: Arc<dyn ContainerListener>,
    ) -> Result<()> {
        self.add_listener(AnyListener::Container(listener.clone()), |state, key| {
            state.check_container(key, "add_container_listener")?;
            state.arena[key].listeners.container.insert(listener);
            Ok(())
        })
    }

    pub fn remove_container_listener(
        &self,
        listener: &Arc<dyn ContainerListener>,
    ) -> Result<()> {
        self.shared.run(|state, _| {
            state.arena[self.key].listeners.container.remove(listener);
            Ok(())
        })
    }

    /// Listens for changes of the property `name`, or of every property
    /// when `name` is empty.
    pub fn add_property_change_listener(
        &self,
        name: &str,
        listener: Arc<dyn PropertyChangeListener>,
    ) -> Result<()> {
        let key = self.key;
        self.shared.run(|state, broadcaster| {
            state.check_known_property(key, name)?;
            if state.is_disposed(key) {
                let event = EventObject { source: self.clone() };
                broadcaster.add_dispose_notification(AnyListener::PropertyChange(listener), event);
                return Ok(());
            }
            state.arena[key]
                .listeners
                .property_change
                .entry(name.to_string())
                .or_default()
                .insert(listener);
            Ok(())
        })
    }

    pub fn remove_property_change_listener(
        &self,
        name: &str,
        listener: &Arc<dyn PropertyChangeListener>,
    ) -> Result<()> {
        let key = self.key;
        self.shared.run(|state, _| {
            state.check_known_property(key, name)?;
            let listeners = &mut state.arena[key].listeners.property_change;
            if let Some(set) = listeners.get_mut(name) {
                set.remove(listener);
                if set.is_empty() {
                    listeners.remove(name);
                }
            }
            Ok(())
        })
    }

    /// Vetoable listeners are kept and disposed but never consulted.
    pub fn add_vetoable_change_listener(
        &self,
        name: &str,
        listener: Arc<dyn VetoableChangeListener>,
    ) -> Result<()> {
        let key = self.key;
        self.shared.run(|state, broadcaster| {
            state.check_known_property(key, name)?;
            if state.is_disposed(key) {
                let event = EventObject { source: self.clone() };
                broadcaster.add_dispose_notification(AnyListener::Vetoable(listener), event);
                return Ok(());
            }
            state.arena[key]
                .listeners
                .vetoable
                .entry(name.to_string())
                .or_default()
                .insert(listener);
            Ok(())
        })
    }

    pub fn remove_vetoable_change_listener(
        &self,
        name: &str,
        listener: &Arc<dyn VetoableChangeListener>,
    ) -> Result<()> {
        let key = self.key;
        self.shared.run(|state, _| {
            state.check_known_property(key, name)?;
            let listeners = &mut state.arena[key].listeners.vetoable;
            if let Some(set) = listeners.get_mut(name) {
                set.remove(listener);
                if set.is_empty() {
                    listeners.remove(name);
                }
            }
            Ok(())
        })
    }

    pub fn add_properties_change_listener(
        &self,
        listener: Arc<dyn PropertiesChangeListener>,
    ) -> Result<()> {
        self.add_listener(AnyListener::PropertiesChange(listener.clone()), |state, key| {
            state.arena[key].listeners.properties_change.insert(listener);
            Ok(())
        })
    }

    pub fn remove_properties_change_listener(
        &self,
        listener: &Arc<dyn PropertiesChangeListener>,
    ) -> Result<()> {
        self.shared.run(|state, _| {
            state.arena[self.key].listeners.properties_change.remove(listener);
            Ok(())
        })
    }

    /// Listens for batches of changes below this root.
    pub fn add_changes_listener(
        &self,
        listener: Arc<dyn ChangesListener>,
    ) -> Result<()> {
        self.add_listener(AnyListener::Changes(listener.clone()), |state, key| {
            state.check_root(key, "add_changes_listener")?;
            state.root_info_mut(key).changes_listeners.insert(listener);
            Ok(())
        })
    }

    pub fn remove_changes_listener(
        &self,
        listener: &Arc<dyn ChangesListener>,
    ) -> Result<()> {
        self.shared.run(|state, _| {
            state.check_root(self.key, "remove_changes_listener")?;
            state.root_info_mut(self.key).changes_listeners.remove(listener);
            Ok(())
        })
    }

    // -
    // Roots

    /// Disposes this root: every listener registered below it is told so
    /// and dropped. Later calls are no-ops.
    pub fn dispose(&self) -> Result<()> {
        let key = self.key;
        self.shared.run(|state, broadcaster| {
            state.check_root(key, "dispose")?;
            if state.is_disposed(key) {
                return Ok(());
            }
            state.init_dispose_broadcaster(&self.shared, key, broadcaster);
            state.root_info_mut(key).disposed = true;
            debug!(path = %state.root_info(key).representation, "disposed root access");
            Ok(())
        })
    }

    /// Merges the pending edits of this update root into the tree and
    /// notifies every other root that can see them.
    pub fn commit_changes(&self) -> Result<CommitReport> {
        self.run(|state, broadcaster, key| {
            state.check_root(key, "commit_changes")?;
            state.check_update(key)?;
            state.check_localized_property_access(key)?;
            let (report, mods) = state.commit(key);
            state.init_global_broadcaster(&self.shared, &mods, Some(key), broadcaster);
            Ok(report)
        })
    }

    pub fn has_pending_changes(&self) -> Result<bool> {
        self.run(|state, _, key| {
            state.check_root(key, "has_pending_changes")?;
            Ok(!state.arena[key].modified_children.is_empty())
        })
    }

    pub fn get_pending_changes(&self) -> Result<Vec<ElementChange>> {
        self.run(|state, _, key| {
            state.check_root(key, "get_pending_changes")?;
            let mut changes = Vec::new();
            state.report_child_changes(&self.shared, key, &mut changes);
            Ok(changes)
        })
    }

    /// Drops every pending edit of this root without notifying anyone.
    pub fn revert_changes(&self) -> Result<()> {
        self.run(|state, _, key| {
            state.check_root(key, "revert_changes")?;
            state.check_update(key)?;
            state.revert_child_changes(key);
            state.root_info_mut(key).state = TransactionState::RolledBack;
            Ok(())
        })
    }

    pub fn transaction_state(&self) -> Result<TransactionState> {
        self.run(|state, _, key| {
            state.check_root(key, "transaction_state")?;
            Ok(state.root_info(key).state)
        })
    }

    /// Locale of the root this access belongs to.
    pub fn locale(&self) -> Result<String> {
        self.run(|state, _, key| Ok(state.locale(key).to_string()))
    }

    pub fn is_update(&self) -> Result<bool> {
        self.run(|state, _, key| Ok(state.is_update(key)))
    }

    pub fn is_root(&self) -> bool {
        self.shared.state.lock().is_root(self.key)
    }
}
