use std::sync::Arc;

use layertree::ChangesEvent;
use layertree::ChangesListener;
use layertree::ContainerEvent;
use layertree::ContainerListener;
use layertree::DisposeListener;
use layertree::Element;
use layertree::EventObject;
use layertree::Layer;
use layertree::ListenerResult;
use layertree::ModificationLog;
use layertree::Node;
use layertree::PropertyChangeEvent;
use layertree::PropertyChangeListener;
use layertree::Registry;
use layertree::RegistryBuilder;
use layertree::RegistryConfig;
use layertree::Value;
use layertree::ValueType;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

pub const USER_TEMPLATE: &str = "org.app:User";
pub const DEFAULTS: Layer = Layer(0);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

pub fn user_template() -> Node {
    Node::group(DEFAULTS, false, None)
        .with_member(
            "FullName",
            Node::property(DEFAULTS, ValueType::String, true, Value::Nil, false),
        )
        .with_member("Age", Node::property(DEFAULTS, ValueType::Int, true, Value::Nil, false))
}

/// Settings (Count, Locked finalized, localized Title) and a Users set
/// holding a plain `alice` and a mandatory `admin`.
pub fn app_tree() -> Node {
    let user = |full_name: &str| {
        Node::group(DEFAULTS, false, Some(USER_TEMPLATE.to_string()))
            .with_member(
                "FullName",
                Node::property(DEFAULTS, ValueType::String, true, full_name.into(), false),
            )
            .with_member("Age", Node::property(DEFAULTS, ValueType::Int, true, Value::Nil, false))
    };
    let title = Node::localized_property(DEFAULTS, ValueType::String, false)
        .with_member("en-US", Node::localized_value(DEFAULTS, "Hello".into()))
        .with_member("de", Node::localized_value(DEFAULTS, "Hallo".into()))
        .with_member("fr-FR", Node::localized_value(DEFAULTS, "Bonjour".into()));
    let settings = Node::group(DEFAULTS, false, None)
        .with_member("Count", Node::property(DEFAULTS, ValueType::Int, false, 3.into(), false))
        .with_member(
            "Locked",
            Node::property(DEFAULTS, ValueType::Int, false, 1.into(), false).with_finalized(DEFAULTS),
        )
        .with_member("Title", title);
    let users = Node::set(DEFAULTS, USER_TEMPLATE, Vec::new(), None)
        .with_member("alice", user("Alice"))
        .with_member("admin", user("Admin").with_mandatory(DEFAULTS));
    Node::group(DEFAULTS, false, None)
        .with_member("Settings", settings)
        .with_member("Users", users)
}

pub struct TestContext {
    pub registry: Registry,
    pub journal: Arc<ModificationLog>,
}

pub fn setup() -> TestContext {
    enable_logger();
    let journal = Arc::new(ModificationLog::new(0));
    let registry = RegistryBuilder::new(RegistryConfig::default())
        .component("org.app", app_tree())
        .template(USER_TEMPLATE, user_template())
        .sink(journal.clone())
        .build()
        .expect("registry should build");
    TestContext { registry, journal }
}

pub fn value_of(element: Element) -> Value {
    match element {
        Element::Value(v) => v,
        Element::Access(a) => panic!("expected a value, got {a:?}"),
    }
}

/// Records property, container and changes events as short strings.
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    fn push(
        &self,
        event: String,
    ) -> ListenerResult {
        self.events.lock().push(event);
        Ok(())
    }
}

impl DisposeListener for Recorder {
    fn disposing(
        &self,
        _event: &EventObject,
    ) -> ListenerResult {
        self.push("disposing".into())
    }
}

impl PropertyChangeListener for Recorder {
    fn property_change(
        &self,
        event: &PropertyChangeEvent,
    ) -> ListenerResult {
        let value = event.new_value.clone().unwrap_or(Value::Nil);
        self.push(format!("property:{}={value:?}", event.property_name))
    }
}

impl ContainerListener for Recorder {
    fn element_inserted(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult {
        self.push(format!("inserted:{}", event.accessor))
    }

    fn element_removed(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult {
        self.push(format!("removed:{}", event.accessor))
    }

    fn element_replaced(
        &self,
        event: &ContainerEvent,
    ) -> ListenerResult {
        self.push(format!("replaced:{}", event.accessor))
    }
}

impl ChangesListener for Recorder {
    fn changes_occurred(
        &self,
        event: &ChangesEvent,
    ) -> ListenerResult {
        let accessors: Vec<&str> = event.changes.iter().map(|c| c.accessor.as_str()).collect();
        self.push(format!("changes:{}[{}]", event.base, accessors.join(",")))
    }
}
