use parking_lot::Mutex;

use crate::ChangesEvent;
use crate::ChangesListener;
use crate::ContainerEvent;
use crate::ContainerListener;
use crate::DisposeListener;
use crate::EventObject;
use crate::ListenerError;
use crate::ListenerResult;
use crate::PropertiesChangeListener;
use crate::PropertyChangeEvent;
use crate::PropertyChangeListener;
use crate::VetoableChangeListener;

/// Listener of every kind that records what it was told, as short strings
/// such as `replaced:Count` or `changes:/org.app/Settings[Count]`.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that records, then reports failure from every callback.
    pub fn failing() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn count(
        &self,
        prefix: &str,
    ) -> usize {
        self.events.lock().iter().filter(|e| e.starts_with(prefix)).count()
    }

    fn record(
        &self,
        event: String,
    ) -> ListenerResult {
        self.events.lock().push(event);
        if self.fail {
            return Err(ListenerError::Failed("recording listener told to fail".into()));
        }
        Ok(())
    }
}

impl DisposeListener for RecordingListener {
    fn disposing(
        &self,
        _event: &EventObject,
    ) -> ListenerResult {
        self.record("disposing".into())
    }
}

impl ContainerListener for RecordingListener {
    fn element_inserted(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult {
        self.record(format!("inserted:{}", event.accessor))
    }

    fn element_removed(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult {
        self.record(format!("removed:{}", event.accessor))
    }

    fn element_replaced(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult {
        self.record(format!("replaced:{}", event.accessor))
    }
}

impl PropertyChangeListener for RecordingListener {
    fn property_change(
        &self,
        event: &PropertyChangeEvent,
    ) -> ListenerResult {
        self.record(format!("property:{}", event.property_name))
    }
}

impl VetoableChangeListener for RecordingListener {
    fn vetoable_change(
        &self,
        event: &PropertyChangeEvent,
    ) -> ListenerResult {
        self.record(format!("vetoable:{}", event.property_name))
    }
}

impl PropertiesChangeListener for RecordingListener {
    fn properties_change(
        &self,
        events: &[PropertyChangeEvent],
    ) -> ListenerResult {
        let names: Vec<&str> = events.iter().map(|e| e.property_name.as_str()).collect();
        self.record(format!("properties:{}", names.join(",")))
    }
}

impl ChangesListener for RecordingListener {
    fn changes_occurred(
        &self,
        event: &ChangesEvent,
    ) -> ListenerResult {
        let accessors: Vec<&str> = event.changes.iter().map(|c| c.accessor.as_str()).collect();
        self.record(format!("changes:{}[{}]", event.base, accessors.join(",")))
    }
}
