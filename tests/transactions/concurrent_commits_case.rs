//! Several threads edit and commit through their own update roots.
//!
//! Every commit gets its own sequence number, the journal records each of
//! them once, and the surviving value is the one written by the last
//! commit.

use std::thread;

use layertree::Value;

use crate::common::setup;
use crate::common::value_of;

const WRITERS: i32 = 8;

#[test]
fn test_parallel_commits_are_serialized() {
    let ctx = setup();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let registry = ctx.registry.clone();
            thread::spawn(move || {
                let settings = registry.create_update_access("/org.app/Settings").unwrap();
                settings.set_property_value("Count", 100 + i).unwrap();
                settings.commit_changes().unwrap().sequence
            })
        })
        .collect();
    let mut sequences: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=WRITERS as u64).collect::<Vec<_>>());
    let journal = ctx.journal.entries();
    assert_eq!(journal.len(), WRITERS as usize);
    let last = journal.iter().max_by_key(|e| e.sequence).unwrap();
    assert_eq!(last.path_string(), "/org.app/Settings/Count");

    let reader = ctx.registry.create_read_access("/org.app/Settings").unwrap();
    let Value::Int(count) = value_of(reader.get_property_value("Count").unwrap()) else {
        panic!("Count should hold an integer");
    };
    assert!((100..100 + WRITERS).contains(&count));
    assert_eq!(ctx.registry.root_count(), 1);
}
