//! Listeners may call back into the registry.
//!
//! Notifications are delivered after the registry lock is released, so a
//! listener is free to read the tree and even commit edits of its own,
//! which are then delivered in a second round.

use std::sync::Arc;

use layertree::DisposeListener;
use layertree::EventObject;
use layertree::ListenerResult;
use layertree::PropertyChangeEvent;
use layertree::PropertyChangeListener;
use layertree::Registry;
use layertree::Value;
use parking_lot::Mutex;

use crate::common::setup;
use crate::common::value_of;
use crate::common::Recorder;

/// Mirrors every committed `Count` into `Name`.
struct Mirror {
    registry: Registry,
    seen: Mutex<Vec<Value>>,
}

impl DisposeListener for Mirror {
    fn disposing(
        &self,
        _event: &EventObject,
    ) -> ListenerResult {
        Ok(())
    }
}

impl PropertyChangeListener for Mirror {
    fn property_change(
        &self,
        event: &PropertyChangeEvent,
    ) -> ListenerResult {
        let reader = self
            .registry
            .create_read_access("/org.app/Settings")
            .expect("read access");
        let current = value_of(reader.get_property_value("Count").expect("Count"));
        self.seen.lock().push(current.clone());

        let writer = self
            .registry
            .create_update_access("/org.app/Settings")
            .expect("update access");
        let mirrored = format!("count={:?}", event.new_value);
        writer.set_property_value("Name", mirrored).expect("set Name");
        writer.commit_changes().expect("commit Name");
        Ok(())
    }
}

#[test]
fn test_listener_commits_from_callback() {
    let ctx = setup();
    let watcher = ctx.registry.create_read_access("/org.app/Settings").unwrap();
    let mirror = Arc::new(Mirror {
        registry: ctx.registry.clone(),
        seen: Mutex::new(Vec::new()),
    });
    let recorder = Recorder::new();
    watcher.add_property_change_listener("Count", mirror.clone()).unwrap();
    watcher.add_property_change_listener("Name", recorder.clone()).unwrap();

    let settings = ctx.registry.create_update_access("/org.app/Settings").unwrap();
    settings.set_property_value("Count", 9).unwrap();
    settings.commit_changes().unwrap();

    assert_eq!(*mirror.seen.lock(), vec![Value::Int(9)]);
    let expected = format!("count={:?}", Some(Value::Int(9)));
    assert_eq!(
        recorder.events(),
        vec![format!("property:Name={:?}", Value::from(expected.clone()))]
    );
    assert_eq!(value_of(watcher.get_property_value("Name").unwrap()), Value::from(expected));
    assert_eq!(ctx.journal.len(), 2);
}
