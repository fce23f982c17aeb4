//! A builder for assembling a [`Registry`] from already-parsed layer data.
//!
//! The [`RegistryBuilder`] collects the merged component trees, the set
//! element templates and an optional modification sink, then validates them
//! against the configuration in [`RegistryBuilder::build`].
//!
//! ## Example
//! ```ignore
//! let registry = RegistryBuilder::new(RegistryConfig::new()?.validate()?)
//!     .component("org.app", app_tree)
//!     .template("org.app:User", user_template)
//!     .build()?;
//! let settings = registry.create_update_access("/org.app/Settings")?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::Registry;
use super::Shared;
use super::State;
use crate::access::Arena;
use crate::path::is_valid_name;
use crate::AccessError;
use crate::ModificationLog;
use crate::ModificationSink;
use crate::Node;
use crate::NodeKind;
use crate::RegistryConfig;
use crate::Result;

pub struct RegistryBuilder {
    config: RegistryConfig,
    data: Node,
    templates: BTreeMap<String, Arc<Node>>,
    sink: Option<Arc<dyn ModificationSink>>,
}

impl RegistryBuilder {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            data: Node::root(),
            templates: BTreeMap::new(),
            sink: None,
        }
    }

    /// Adds a top-level component.
    pub fn component(
        mut self,
        name: impl Into<String>,
        node: Node,
    ) -> Self {
        self.data = self.data.with_member(name, node);
        self
    }

    /// Registers a set element template under its qualified name. The
    /// template name is stamped onto the node.
    pub fn template(
        mut self,
        name: impl Into<String>,
        mut node: Node,
    ) -> Self {
        let name = name.into();
        node.set_template_name(Some(name.clone()));
        self.templates.insert(name, Arc::new(node));
        self
    }

    /// Sets a custom sink for committed modifications. Defaults to an
    /// in-memory [`ModificationLog`].
    pub fn sink(
        mut self,
        sink: Arc<dyn ModificationSink>,
    ) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> Result<Registry> {
        let config = self.config.validate()?;
        for (name, component) in self.data.members() {
            if !is_valid_name(name, false) {
                return Err(AccessError::illegal(format!("invalid component name {name:?}")));
            }
            if !component.kind().is_container() || component.kind() == NodeKind::Root {
                return Err(AccessError::illegal(format!("component {name} must be a group or set")));
            }
        }
        for (name, template) in &self.templates {
            if !matches!(template.kind(), NodeKind::Group | NodeKind::Set) {
                return Err(AccessError::illegal(format!("template {name} must be a group or set")));
            }
        }

        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(ModificationLog::new(config.journal.capacity)));
        info!(
            "Initializing registry: {} components, {} templates",
            self.data.members().len(),
            self.templates.len()
        );
        let state = State {
            data: Arc::new(self.data),
            templates: self.templates,
            arena: Arena::default(),
            roots: Vec::new(),
            sink,
            config,
            sequence: 0,
            last_layer: None,
        };
        Ok(Registry {
            shared: Arc::new(Shared::new(state)),
        })
    }
}
