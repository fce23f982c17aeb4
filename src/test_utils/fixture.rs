use std::sync::Arc;

use crate::Layer;
use crate::ModificationSink;
use crate::Node;
use crate::Registry;
use crate::RegistryBuilder;
use crate::RegistryConfig;
use crate::Value;
use crate::ValueType;

pub const USER_TEMPLATE: &str = "org.app:User";

/// Lowest layer used by fixtures.
pub const DEFAULTS: Layer = Layer(0);

pub fn user_template() -> Node {
    Node::group(DEFAULTS, false, None)
        .with_member(
            "FullName",
            Node::property(DEFAULTS, ValueType::String, true, Value::Nil, false),
        )
        .with_member("Age", Node::property(DEFAULTS, ValueType::Int, true, Value::Nil, false))
}

pub fn user(full_name: &str) -> Node {
    Node::group(DEFAULTS, false, Some(USER_TEMPLATE.to_string()))
        .with_member(
            "FullName",
            Node::property(DEFAULTS, ValueType::String, true, full_name.into(), false),
        )
        .with_member("Age", Node::property(DEFAULTS, ValueType::Int, true, Value::Nil, false))
}

/// `org.app`:
///
/// ```text
/// Settings                  group
///   Count      Int          3
///   Locked     Int          1, finalized
///   Name       String?      "app"
///   Title      localized    en-US "Hello", de "Hallo", fr-FR "Bonjour"
///   Extra      group, extensible
///     Note     String?      "x", extension
/// Users                     set of org.app:User
///   alice                   "Alice"
///   admin                   "Admin", mandatory
/// ```
pub fn app_tree() -> Node {
    let title = Node::localized_property(DEFAULTS, ValueType::String, false)
        .with_member("en-US", Node::localized_value(DEFAULTS, "Hello".into()))
        .with_member("de", Node::localized_value(DEFAULTS, "Hallo".into()))
        .with_member("fr-FR", Node::localized_value(DEFAULTS, "Bonjour".into()));
    let extra = Node::group(DEFAULTS, true, None).with_member(
        "Note",
        Node::property(DEFAULTS, ValueType::String, true, "x".into(), true),
    );
    let settings = Node::group(DEFAULTS, false, None)
        .with_description("Application settings")
        .with_member("Count", Node::property(DEFAULTS, ValueType::Int, false, 3.into(), false))
        .with_member(
            "Locked",
            Node::property(DEFAULTS, ValueType::Int, false, 1.into(), false).with_finalized(DEFAULTS),
        )
        .with_member("Name", Node::property(DEFAULTS, ValueType::String, true, "app".into(), false))
        .with_member("Title", title)
        .with_member("Extra", extra);
    let users = Node::set(DEFAULTS, USER_TEMPLATE, Vec::new(), None)
        .with_member("alice", user("Alice"))
        .with_member("admin", user("Admin").with_mandatory(DEFAULTS));
    Node::group(DEFAULTS, false, None)
        .with_member("Settings", settings)
        .with_member("Users", users)
}

pub fn registry_builder(config: RegistryConfig) -> RegistryBuilder {
    RegistryBuilder::new(config)
        .component("org.app", app_tree())
        .template(USER_TEMPLATE, user_template())
}

pub fn test_registry() -> Registry {
    registry_builder(RegistryConfig::default())
        .build()
        .expect("fixture registry should build")
}

pub fn test_registry_with_sink(sink: Arc<dyn ModificationSink>) -> Registry {
    registry_builder(RegistryConfig::default())
        .sink(sink)
        .build()
        .expect("fixture registry should build")
}
