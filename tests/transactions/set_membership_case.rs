//! Inserting and removing set elements through an update root.
//!
//! Scenario:
//!
//! 1. A new `bob` is instantiated from the set template, filled in and
//!    inserted; a second insert under the same name is refused.
//! 2. The commit publishes `bob` with his nested edit in one journal entry
//!    sequence.
//! 3. `bob` is removed again; the mandatory `admin` cannot be.

use layertree::AccessError;
use layertree::Value;

use crate::common::setup;
use crate::common::value_of;

#[test]
fn test_insert_then_remove_set_element() {
    let ctx = setup();
    let users = ctx.registry.create_update_access("/org.app/Users").unwrap();

    let bob = users.create_instance().unwrap();
    bob.set_property_value("FullName", "Bob").unwrap();
    users.insert_by_name("bob", bob).unwrap();

    let again = users.create_instance().unwrap();
    let err = users.insert_by_name("bob", again).unwrap_err();
    assert!(matches!(err.as_access(), Some(AccessError::ElementExists(name)) if name == "bob"));

    let report = users.commit_changes().unwrap();
    assert_eq!(report.applied.last().map(String::as_str), Some("/org.app/Users/bob"));
    let journal: Vec<_> = ctx.journal.drain().iter().map(|e| (e.sequence, e.path_string())).collect();
    assert!(journal.contains(&(1, "/org.app/Users/bob".to_string())));

    let reader = ctx.registry.create_read_access("/org.app/Users").unwrap();
    assert_eq!(reader.get_element_names().unwrap(), vec!["admin", "alice", "bob"]);
    assert_eq!(
        value_of(reader.get_by_hierarchical_name("bob/FullName").unwrap()),
        Value::from("Bob")
    );

    users.remove_by_name("bob").unwrap();
    let err = users.remove_by_name("admin").unwrap_err();
    assert!(matches!(err.as_access(), Some(AccessError::NoSuchElement(_))));
    let report = users.commit_changes().unwrap();

    assert_eq!(report.sequence, 2);
    assert_eq!(report.applied, vec!["/org.app/Users/bob"]);
    assert_eq!(reader.get_element_names().unwrap(), vec!["admin", "alice"]);
}
