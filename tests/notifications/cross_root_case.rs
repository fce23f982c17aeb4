//! Commits reach every other root that can see the changed nodes.
//!
//! Scenario:
//!
//! 1. Readers watch `/org.app`, `/org.app/Settings` and `/org.app/Users`.
//! 2. A writer on `/org.app/Settings` changes `Count` and commits.
//! 3. The settings reader gets the property change and a changes batch,
//!    the application reader only the batch, the users reader nothing.
//! 4. A disposed reader hears nothing more.

use crate::common::setup;
use crate::common::Recorder;

#[test]
fn test_commit_fans_out_to_overlapping_roots() {
    let ctx = setup();
    let app = ctx.registry.create_read_access("/org.app").unwrap();
    let settings = ctx.registry.create_read_access("/org.app/Settings").unwrap();
    let users = ctx.registry.create_read_access("/org.app/Users").unwrap();
    let (app_events, settings_events, users_events) = (Recorder::new(), Recorder::new(), Recorder::new());
    app.add_changes_listener(app_events.clone()).unwrap();
    settings.add_property_change_listener("Count", settings_events.clone()).unwrap();
    settings.add_changes_listener(settings_events.clone()).unwrap();
    users.add_changes_listener(users_events.clone()).unwrap();
    users.add_container_listener(users_events.clone()).unwrap();

    let writer = ctx.registry.create_update_access("/org.app/Settings").unwrap();
    writer.set_property_value("Count", 4).unwrap();
    assert!(settings_events.events().is_empty());
    writer.commit_changes().unwrap();

    assert_eq!(app_events.events(), vec!["changes:/org.app[Settings/Count]"]);
    assert_eq!(
        settings_events.events(),
        vec!["property:Count=Int(4)", "changes:/org.app/Settings[Count]"]
    );
    assert!(users_events.events().is_empty());

    app.dispose().unwrap();
    assert_eq!(app_events.events().last().map(String::as_str), Some("disposing"));
    writer.set_property_value("Count", 5).unwrap();
    writer.commit_changes().unwrap();
    assert_eq!(app_events.events().len(), 2);
}

#[test]
fn test_set_commit_reports_container_events() {
    let ctx = setup();
    let watcher = ctx.registry.create_read_access("/org.app/Users").unwrap();
    let events = Recorder::new();
    watcher.add_container_listener(events.clone()).unwrap();
    watcher.add_changes_listener(events.clone()).unwrap();

    let writer = ctx.registry.create_update_access("/org.app/Users").unwrap();
    writer.remove_by_name("alice").unwrap();
    writer.commit_changes().unwrap();

    assert_eq!(
        events.events(),
        vec!["removed:alice", "changes:/org.app/Users[org.app:User['alice']]"]
    );
}
