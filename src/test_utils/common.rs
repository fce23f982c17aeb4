use tracing_subscriber::EnvFilter;

use crate::Element;
use crate::Value;

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for unit test.");
}

/// The scalar behind an element, panicking on handles.
pub fn value_of(element: Element) -> Value {
    match element {
        Element::Value(v) => v,
        Element::Access(a) => panic!("expected a value, got {a:?}"),
    }
}
