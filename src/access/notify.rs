//! Turning modification trees into queued notifications.

use std::sync::Arc;

use super::AccessKey;
use crate::broadcaster::AnyListener;
use crate::broadcaster::ChangesEvent;
use crate::broadcaster::ContainerEvent;
use crate::broadcaster::Element;
use crate::broadcaster::ElementChange;
use crate::broadcaster::EventObject;
use crate::broadcaster::PropertyChangeEvent;
use crate::modifications::ModificationNode;
use crate::modifications::Modifications;
use crate::path::create_segment;
use crate::registry::Shared;
use crate::registry::State;
use crate::Access;
use crate::Broadcaster;
use crate::NodeKind;
use crate::Value;

impl State {
    fn child_change_path(
        &self,
        key: AccessKey,
        segment: &str,
    ) -> String {
        let mut path = self.relative_path_representation(key);
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(segment);
        path
    }

    /// Queues property-change notifications for `name` on `key`, plus a
    /// batched event if anyone listens for those.
    fn add_property_changes(
        &self,
        source: &Access,
        key: AccessKey,
        name: &str,
        new_value: Option<Value>,
        batch: &mut Vec<PropertyChangeEvent>,
        broadcaster: &mut Broadcaster,
    ) {
        let listeners = &self.arena[key].listeners;
        let event = PropertyChangeEvent {
            source: source.clone(),
            property_name: name.to_string(),
            new_value,
        };
        for listener in listeners.property_change_for(name) {
            broadcaster.add_property_change_notification(listener, event.clone());
        }
        if !listeners.properties_change.is_empty() {
            batch.push(event);
        }
    }

    fn add_container_event(
        &self,
        source: &Access,
        key: AccessKey,
        name: &str,
        element: Option<Element>,
        kind: ContainerChange,
        broadcaster: &mut Broadcaster,
    ) {
        for listener in self.arena[key].listeners.container.iter() {
            let event = ContainerEvent {
                source: source.clone(),
                accessor: name.to_string(),
                element: element.clone(),
                replaced_element: None,
            };
            match kind {
                ContainerChange::Inserted => {
                    broadcaster.add_container_element_inserted_notification(listener.clone(), event)
                }
                ContainerChange::Removed => {
                    broadcaster.add_container_element_removed_notification(listener.clone(), event)
                }
                ContainerChange::Replaced => {
                    broadcaster.add_container_element_replaced_notification(listener.clone(), event)
                }
            }
        }
    }

    /// Walks `mods` below `key`, queueing notifications for the listeners
    /// found on the way and collecting element changes for changes
    /// listeners when `all_changes` is given.
    pub(crate) fn init_broadcaster_and_changes(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
        mods: &ModificationNode,
        broadcaster: &mut Broadcaster,
        mut all_changes: Option<&mut Vec<ElementChange>>,
    ) {
        let source = self.handle(shared, key);
        let mut batch = Vec::new();
        for (name, nested) in &mods.children {
            match self.get_child(key, name) {
                Some(child) => {
                    let Some(child_node) = self.node_of(child) else {
                        continue;
                    };
                    match child_node.kind() {
                        NodeKind::LocalizedProperty => {
                            if nested.children.is_empty() {
                                // not a change of its own
                                continue;
                            }
                            if self.is_all_locales(key) {
                                self.init_broadcaster_and_changes(
                                    shared,
                                    child,
                                    nested,
                                    broadcaster,
                                    all_changes.as_deref_mut(),
                                );
                            } else {
                                let element = self.as_element(shared, child);
                                self.add_container_event(
                                    &source,
                                    key,
                                    name,
                                    Some(element.clone()),
                                    ContainerChange::Replaced,
                                    broadcaster,
                                );
                                self.add_property_changes(
                                    &source,
                                    key,
                                    name,
                                    element.into_value(),
                                    &mut batch,
                                    broadcaster,
                                );
                                if let Some(changes) = all_changes.as_deref_mut() {
                                    changes.push(ElementChange {
                                        accessor: self.relative_path_representation(child),
                                        element: None,
                                        replaced_element: None,
                                    });
                                }
                            }
                        }
                        NodeKind::LocalizedValue | NodeKind::Property => {
                            let value = self.effective_value(child);
                            let element = value.clone().map(Element::Value);
                            self.add_container_event(
                                &source,
                                key,
                                name,
                                element.clone(),
                                ContainerChange::Replaced,
                                broadcaster,
                            );
                            if child_node.kind() == NodeKind::Property {
                                self.add_property_changes(&source, key, name, value, &mut batch, broadcaster);
                            }
                            if let Some(changes) = all_changes.as_deref_mut() {
                                changes.push(ElementChange {
                                    accessor: self.relative_path_representation(child),
                                    element,
                                    replaced_element: None,
                                });
                            }
                        }
                        NodeKind::Group | NodeKind::Set => {
                            if !nested.children.is_empty() {
                                self.init_broadcaster_and_changes(
                                    shared,
                                    child,
                                    nested,
                                    broadcaster,
                                    all_changes.as_deref_mut(),
                                );
                            } else if child_node.template_name().is_some() {
                                let element = self.as_element(shared, child);
                                self.add_container_event(
                                    &source,
                                    key,
                                    name,
                                    Some(element),
                                    ContainerChange::Inserted,
                                    broadcaster,
                                );
                                if let Some(changes) = all_changes.as_deref_mut() {
                                    changes.push(ElementChange {
                                        accessor: self.relative_path_representation(child),
                                        element: None,
                                        replaced_element: None,
                                    });
                                }
                            }
                        }
                        NodeKind::Root => unreachable!("root node below an access"),
                    }
                }
                None => {
                    let Some(node) = self.node_of(key) else {
                        continue;
                    };
                    match node.kind() {
                        NodeKind::LocalizedProperty => {
                            self.add_container_event(
                                &source,
                                key,
                                name,
                                None,
                                ContainerChange::Removed,
                                broadcaster,
                            );
                            if let Some(changes) = all_changes.as_deref_mut() {
                                changes.push(ElementChange {
                                    accessor: self.child_change_path(key, &create_segment("*", name)),
                                    element: None,
                                    replaced_element: None,
                                });
                            }
                        }
                        NodeKind::Group => {
                            self.add_container_event(
                                &source,
                                key,
                                name,
                                None,
                                ContainerChange::Removed,
                                broadcaster,
                            );
                            self.add_property_changes(&source, key, name, None, &mut batch, broadcaster);
                            if let Some(changes) = all_changes.as_deref_mut() {
                                changes.push(ElementChange {
                                    accessor: self.child_change_path(key, name),
                                    element: None,
                                    replaced_element: None,
                                });
                            }
                        }
                        NodeKind::Set => {
                            if !nested.children.is_empty() {
                                // not a removal of its own
                                continue;
                            }
                            self.add_container_event(
                                &source,
                                key,
                                name,
                                None,
                                ContainerChange::Removed,
                                broadcaster,
                            );
                            if let Some(changes) = all_changes.as_deref_mut() {
                                let template = node.template_name().unwrap_or_default();
                                changes.push(ElementChange {
                                    accessor: self.child_change_path(key, &create_segment(template, name)),
                                    element: None,
                                    replaced_element: None,
                                });
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        if !batch.is_empty() {
            for listener in self.arena[key].listeners.properties_change.iter() {
                broadcaster.add_properties_change_notification(listener.clone(), batch.clone());
            }
        }
    }

    /// Queues notifications for `key`; a root also reports the collected
    /// element changes to its changes listeners.
    pub(crate) fn init_broadcaster(
        &mut self,
        shared: &Arc<Shared>,
        key: AccessKey,
        mods: &ModificationNode,
        broadcaster: &mut Broadcaster,
    ) {
        let wants_changes = self.arena[key]
            .root_info
            .as_ref()
            .is_some_and(|info| !info.changes_listeners.is_empty());
        if !wants_changes {
            self.init_broadcaster_and_changes(shared, key, mods, broadcaster, None);
            return;
        }
        let mut changes = Vec::new();
        self.init_broadcaster_and_changes(shared, key, mods, broadcaster, Some(&mut changes));
        if changes.is_empty() {
            return;
        }
        let source = self.handle(shared, key);
        let event = ChangesEvent {
            source,
            base: self.absolute_path_representation(key),
            changes,
        };
        let info = self.root_info(key);
        for listener in info.changes_listeners.iter() {
            broadcaster.add_changes_notification(listener.clone(), event.clone());
        }
    }

    /// Queues notifications for every live root other than `exclude` whose
    /// path lies inside `mods`, which is keyed by absolute member names.
    pub(crate) fn init_global_broadcaster(
        &mut self,
        shared: &Arc<Shared>,
        mods: &Modifications,
        exclude: Option<AccessKey>,
        broadcaster: &mut Broadcaster,
    ) {
        for root in self.roots.clone() {
            if Some(root) == exclude || !self.arena.contains(root) || !self.arena[root].is_anchored() {
                continue;
            }
            if self.is_disposed(root) {
                continue;
            }
            let path = self.root_info(root).path.clone();
            if let Some(subtree) = mods.get(&path) {
                let subtree = subtree.clone();
                self.init_broadcaster(shared, root, &subtree, broadcaster);
            }
        }
    }

    /// Queues a dispose notification for every listener registered on
    /// accesses belonging to `root`, then drops the registrations.
    pub(crate) fn init_dispose_broadcaster(
        &mut self,
        shared: &Arc<Shared>,
        root: AccessKey,
        broadcaster: &mut Broadcaster,
    ) {
        let source = self.handle(shared, root);
        let changes: Vec<_> = self.root_info(root).changes_listeners.iter().cloned().collect();
        for listener in changes {
            broadcaster.add_dispose_notification(
                AnyListener::Changes(listener),
                EventObject { source: source.clone() },
            );
        }
        self.root_info_mut(root).changes_listeners.clear();

        for key in self.arena.keys() {
            if self.root_key(key) != root || self.arena[key].listeners.all().is_empty() {
                continue;
            }
            let source = self.handle(shared, key);
            for listener in self.arena[key].listeners.all() {
                broadcaster.add_dispose_notification(listener, EventObject { source: source.clone() });
            }
            self.arena[key].listeners.clear();
        }
    }
}

#[derive(Clone, Copy)]
enum ContainerChange {
    Inserted,
    Removed,
    Replaced,
}
