//! Deferred listener delivery.
//!
//! Notifications are collected into a [`Broadcaster`] while the registry
//! lock is held and delivered by [`Broadcaster::send`] after it has been
//! released, so a listener may call back into the registry. Delivery order
//! is fixed: dispose, container (inserted, removed, replaced), property
//! change, batched properties change, changes.

mod listener;

pub use listener::*;


use std::sync::Arc;

use tracing::trace;
use tracing::warn;

#[derive(Default)]
pub struct Broadcaster {
    dispose: Vec<(AnyListener, EventObject)>,
    inserted: Vec<(Arc<dyn ContainerListener>, ContainerEvent)>,
    removed: Vec<(Arc<dyn ContainerListener>, ContainerEvent)>,
    replaced: Vec<(Arc<dyn ContainerListener>, ContainerEvent)>,
    property: Vec<(Arc<dyn PropertyChangeListener>, PropertyChangeEvent)>,
    properties: Vec<(Arc<dyn PropertiesChangeListener>, Vec<PropertyChangeEvent>)>,
    changes: Vec<(Arc<dyn ChangesListener>, ChangesEvent)>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_dispose_notification(
        &mut self,
        listener: AnyListener,
        event: EventObject,
    ) {
        self.dispose.push((listener, event));
    }

    pub(crate) fn add_container_element_inserted_notification(
        &mut self,
        listener: Arc<dyn ContainerListener>,
        event: ContainerEvent,
    ) {
        self.inserted.push((listener, event));
    }

    pub(crate) fn add_container_element_removed_notification(
        &mut self,
        listener: Arc<dyn ContainerListener>,
        event: ContainerEvent,
    ) {
        self.removed.push((listener, event));
    }

    pub(crate) fn add_container_element_replaced_notification(
        &mut self,
        listener: Arc<dyn ContainerListener>,
        event: ContainerEvent,
    ) {
        self.replaced.push((listener, event));
    }

    pub(crate) fn add_property_change_notification(
        &mut self,
        listener: Arc<dyn PropertyChangeListener>,
        event: PropertyChangeEvent,
    ) {
        self.property.push((listener, event));
    }

    pub(crate) fn add_properties_change_notification(
        &mut self,
        listener: Arc<dyn PropertiesChangeListener>,
        events: Vec<PropertyChangeEvent>,
    ) {
        self.properties.push((listener, events));
    }

    pub(crate) fn add_changes_notification(
        &mut self,
        listener: Arc<dyn ChangesListener>,
        event: ChangesEvent,
    ) {
        self.changes.push((listener, event));
    }

    /// Number of pending notifications.
    pub fn len(&self) -> usize {
        self.dispose.len()
            + self.inserted.len()
            + self.removed.len()
            + self.replaced.len()
            + self.property.len()
            + self.properties.len()
            + self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Delivers everything collected. Must be called without the registry
    /// lock held.
    pub fn send(self) {
        if self.is_empty() {
            return;
        }
        trace!("delivering {} notifications", self.len());
        for (listener, event) in &self.dispose {
            report("disposing", listener.disposing(event));
        }
        for (listener, event) in &self.inserted {
            report("element_inserted", listener.element_inserted(event));
        }
        for (listener, event) in &self.removed {
            report("element_removed", listener.element_removed(event));
        }
        for (listener, event) in &self.replaced {
            report("element_replaced", listener.element_replaced(event));
        }
        for (listener, event) in &self.property {
            report("property_change", listener.property_change(event));
        }
        for (listener, events) in &self.properties {
            report("properties_change", listener.properties_change(events));
        }
        for (listener, event) in &self.changes {
            report("changes_occurred", listener.changes_occurred(event));
        }
    }
}

fn report(
    callback: &'static str,
    result: ListenerResult,
) {
    match result {
        Ok(()) | Err(ListenerError::Disposed) => {}
        Err(ListenerError::Failed(reason)) => {
            warn!(callback, "listener failed: {reason}");
        }
    }
}
