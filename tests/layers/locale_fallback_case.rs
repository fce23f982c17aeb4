//! Localized values resolve against the locale of each root.
//!
//! Scenario:
//!
//! 1. `Title` starts with `en-US`, `de` and `fr-FR` values.
//! 2. Roots for several locales read it and fall back as far as needed.
//! 3. Layer 1 adds a `de-CH` value; the Swiss root is notified and now
//!    reads it, while an Austrian root keeps the plain German value.

use layertree::Layer;
use layertree::LayerPatch;
use layertree::Value;

use crate::common::setup;
use crate::common::value_of;
use crate::common::Recorder;

#[test]
fn test_locale_fallback_chain() {
    let ctx = setup();
    let title_for = |locale: &str| {
        let settings = ctx
            .registry
            .create_root_access("/org.app/Settings", Some(locale), false)
            .unwrap();
        value_of(settings.get_property_value("Title").unwrap())
    };

    assert_eq!(title_for("de"), Value::from("Hallo"));
    assert_eq!(title_for("de-AT"), Value::from("Hallo"));
    assert_eq!(title_for("fr"), Value::from("Bonjour"));
    assert_eq!(title_for("pt-BR"), Value::from("Hello"));
}

#[test]
fn test_layer_adds_regional_value() {
    let ctx = setup();
    let swiss = ctx
        .registry
        .create_root_access("/org.app/Settings", Some("de-CH"), false)
        .unwrap();
    let austrian = ctx
        .registry
        .create_root_access("/org.app/Settings", Some("de-AT"), false)
        .unwrap();
    let recorder = Recorder::new();
    swiss.add_property_change_listener("Title", recorder.clone()).unwrap();
    assert_eq!(value_of(swiss.get_property_value("Title").unwrap()), Value::from("Hallo"));

    ctx.registry
        .apply_layer(&LayerPatch::new(Layer(1)).set_localized_value("/org.app/Settings/Title", "de-CH", "Grüezi"))
        .unwrap();

    assert_eq!(
        recorder.events(),
        vec![format!("property:Title={:?}", Value::from("Grüezi"))]
    );
    assert_eq!(value_of(swiss.get_property_value("Title").unwrap()), Value::from("Grüezi"));
    assert_eq!(value_of(austrian.get_property_value("Title").unwrap()), Value::from("Hallo"));
}
