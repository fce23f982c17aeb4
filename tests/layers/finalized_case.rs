//! A lower layer finalizes part of the tree.
//!
//! Scenario:
//!
//! 1. `Locked` is finalized by the defaults; writing it fails at once.
//! 2. A client edits `Count`, then layer 1 finalizes `Count`.
//! 3. The pending edit is dropped on commit and the layer value stays.
//! 4. A later layer may no longer write below the finalized node.

use layertree::AccessError;
use layertree::Layer;
use layertree::LayerPatch;
use layertree::Value;

use crate::common::setup;
use crate::common::value_of;

#[test]
fn test_finalized_value_rejects_writes() {
    let ctx = setup();
    let settings = ctx.registry.create_update_access("/org.app/Settings").unwrap();

    let err = settings.set_property_value("Locked", 5).unwrap_err();

    assert!(matches!(err.as_access(), Some(AccessError::IllegalArgument(_))));
    assert!(!settings.has_pending_changes().unwrap());
}

#[test]
fn test_layer_finalization_drops_pending_edit() {
    let ctx = setup();
    let settings = ctx.registry.create_update_access("/org.app/Settings").unwrap();
    settings.set_property_value("Count", 7).unwrap();

    let report = ctx
        .registry
        .apply_layer(
            &LayerPatch::new(Layer(1))
                .set_value("/org.app/Settings/Count", 10)
                .finalize("/org.app/Settings/Count"),
        )
        .unwrap();
    assert!(report.skipped.is_empty());

    let commit = settings.commit_changes().unwrap();
    assert!(commit.applied.is_empty());
    assert_eq!(commit.dropped, vec!["/org.app/Settings/Count"]);
    assert!(ctx.journal.is_empty());

    let reader = ctx.registry.create_read_access("/org.app/Settings").unwrap();
    assert_eq!(value_of(reader.get_property_value("Count").unwrap()), Value::Int(10));

    let later = ctx
        .registry
        .apply_layer(&LayerPatch::new(Layer(2)).set_value("/org.app/Settings/Count", 11))
        .unwrap();
    assert_eq!(later.skipped.len(), 1);
    assert_eq!(value_of(reader.get_property_value("Count").unwrap()), Value::Int(10));
}
