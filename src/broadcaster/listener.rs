use std::sync::Arc;

use crate::Access;
use crate::Value;

/// Either a scalar value or a handle to a container child.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Value(Value),
    Access(Access),
}

impl Element {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Element::Value(v) => Some(v),
            Element::Access(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Element::Value(v) => Some(v),
            Element::Access(_) => None,
        }
    }

    pub fn into_access(self) -> Option<Access> {
        match self {
            Element::Access(a) => Some(a),
            Element::Value(_) => None,
        }
    }
}

impl From<Value> for Element {
    fn from(v: Value) -> Self {
        Element::Value(v)
    }
}

impl From<Access> for Element {
    fn from(a: Access) -> Self {
        Element::Access(a)
    }
}

#[derive(Debug, Clone)]
pub struct EventObject {
    pub source: Access,
}

#[derive(Debug, Clone)]
pub struct ContainerEvent {
    pub source: Access,
    /// Name of the affected member
    pub accessor: String,
    pub element: Option<Element>,
    pub replaced_element: Option<Element>,
}

#[derive(Debug, Clone)]
pub struct PropertyChangeEvent {
    pub source: Access,
    pub property_name: String,
    pub new_value: Option<Value>,
}

/// One change inside a batch, addressed relative to the batch base.
#[derive(Debug, Clone)]
pub struct ElementChange {
    pub accessor: String,
    pub element: Option<Element>,
    pub replaced_element: Option<Element>,
}

#[derive(Debug, Clone)]
pub struct ChangesEvent {
    pub source: Access,
    /// Absolute path of the root the changes are relative to
    pub base: String,
    pub changes: Vec<ElementChange>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ListenerError {
    /// The listener is gone; delivery failures of this kind are ignored
    #[error("listener disposed")]
    Disposed,

    #[error("listener failed: {0}")]
    Failed(String),
}

pub type ListenerResult = std::result::Result<(), ListenerError>;

/// Base of every listener: told when its access goes away.
pub trait DisposeListener: Send + Sync {
    fn disposing(
        &self,
        event: &EventObject,
    ) -> ListenerResult;
}

pub trait ContainerListener: DisposeListener {
    fn element_inserted(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult;

    fn element_removed(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult;

    fn element_replaced(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult;
}

pub trait PropertyChangeListener: DisposeListener {
    fn property_change(
        &self,
        event: &PropertyChangeEvent,
    ) -> ListenerResult;
}

/// Registered and disposed like other listeners but never consulted.
pub trait VetoableChangeListener: DisposeListener {
    fn vetoable_change(
        &self,
        event: &PropertyChangeEvent,
    ) -> ListenerResult;
}

pub trait PropertiesChangeListener: DisposeListener {
    fn properties_change(
        &self,
        events: &[PropertyChangeEvent],
    ) -> ListenerResult;
}

pub trait ChangesListener: DisposeListener {
    fn changes_occurred(
        &self,
        event: &ChangesEvent,
    ) -> ListenerResult;
}

/// A registered listener of any kind, for dispose delivery.
#[derive(Clone)]
pub(crate) enum AnyListener {
    Dispose(Arc<dyn DisposeListener>),
    Container(Arc<dyn ContainerListener>),
    PropertyChange(Arc<dyn PropertyChangeListener>),
    Vetoable(Arc<dyn VetoableChangeListener>),
    PropertiesChange(Arc<dyn PropertiesChangeListener>),
    Changes(Arc<dyn ChangesListener>),
}

impl AnyListener {
    pub(crate) fn disposing(
        &self,
        event: &EventObject,
    ) -> ListenerResult {
        match self {
            AnyListener::Dispose(l) => l.disposing(event),
            AnyListener::Container(l) => l.disposing(event),
            AnyListener::PropertyChange(l) => l.disposing(event),
            AnyListener::Vetoable(l) => l.disposing(event),
            AnyListener::PropertiesChange(l) => l.disposing(event),
            AnyListener::Changes(l) => l.disposing(event),
        }
    }
}

/// Identity of a listener: the address of its shared allocation.
fn identity<T: ?Sized>(listener: &Arc<T>) -> *const () {
    Arc::as_ptr(listener) as *const ()
}

/// Unordered set of listeners, keyed by `Arc` identity.
pub(crate) struct ListenerSet<T: ?Sized> {
    entries: Vec<Arc<T>>,
}

impl<T: ?Sized> Default for ListenerSet<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: ?Sized> ListenerSet<T> {
    pub(crate) fn insert(
        &mut self,
        listener: Arc<T>,
    ) {
        let id = identity(&listener);
        if !self.entries.iter().any(|l| identity(l) == id) {
            self.entries.push(listener);
        }
    }

    pub(crate) fn remove(
        &mut self,
        listener: &Arc<T>,
    ) {
        let id = identity(listener);
        self.entries.retain(|l| identity(l) != id);
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.entries.iter()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
