//! Committed user edits outrank every layer.
//!
//! Scenario:
//!
//! 1. A client sets `Count` to 7 and commits.
//! 2. Layer 1 tries to set `Count` to 9 and to finalize it.
//! 3. Both operations are skipped and readers still see 7, while an
//!    untouched value of the same layer is applied.

use layertree::Layer;
use layertree::LayerPatch;
use layertree::Value;

use crate::common::setup;
use crate::common::value_of;

#[test]
fn test_layer_does_not_overwrite_committed_value() {
    let ctx = setup();
    let settings = ctx.registry.create_update_access("/org.app/Settings").unwrap();
    settings.set_property_value("Count", 7).unwrap();
    settings.commit_changes().unwrap();

    let report = ctx
        .registry
        .apply_layer(
            &LayerPatch::new(Layer(1))
                .set_value("/org.app/Settings/Count", 9)
                .finalize("/org.app/Settings/Count")
                .set_localized_value("/org.app/Settings/Title", "it", "Ciao"),
        )
        .unwrap();

    let reasons: Vec<_> = report.skipped.iter().map(|s| (s.path.as_str(), s.reason)).collect();
    assert_eq!(
        reasons,
        vec![
            ("/org.app/Settings/Count", "written by a higher layer"),
            ("/org.app/Settings/Count", "written by a higher layer"),
        ]
    );
    assert_eq!(report.applied.len(), 1);

    let reader = ctx.registry.create_read_access("/org.app/Settings").unwrap();
    assert_eq!(value_of(reader.get_property_value("Count").unwrap()), Value::Int(7));
    settings.set_property_value("Count", 8).unwrap();
    assert!(settings.commit_changes().unwrap().dropped.is_empty());
}
