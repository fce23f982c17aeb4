//! The node tree.
//!
//! Nodes form a single-rooted hierarchy assembled from ordered layers. Each
//! node is immutable once shared: members are held as `Arc<Node>` and
//! writers go through [`Arc::make_mut`], so handles that captured a subtree
//! keep seeing the version they captured.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use super::Value;
use super::ValueType;

/// Ordered member map of a container node.
pub type Members = BTreeMap<String, Arc<Node>>;

static NO_MEMBERS: Members = BTreeMap::new();

/// Identifier of a configuration layer. Lower layers are applied first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Layer(pub u32);

impl Layer {
    /// Sentinel for "no layer": user-level writes and unset flags.
    pub const NONE: Layer = Layer(u32::MAX);

    pub fn is_none(self) -> bool {
        self == Layer::NONE
    }
}

impl fmt::Display for Layer {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Property,
    LocalizedProperty,
    LocalizedValue,
    Group,
    Set,
    Root,
}

impl NodeKind {
    /// Whether nodes of this kind carry members.
    pub fn is_container(self) -> bool {
        !matches!(self, NodeKind::Property | NodeKind::LocalizedValue)
    }
}

#[derive(Debug, Clone)]
pub struct PropertyData {
    pub static_type: ValueType,
    pub nillable: bool,
    pub value: Value,
    /// Extension properties are the only removable group members
    pub extension: bool,
    pub modified: bool,
}

#[derive(Debug, Clone)]
pub struct LocalizedPropertyData {
    pub static_type: ValueType,
    pub nillable: bool,
    pub members: Members,
}

#[derive(Debug, Clone)]
pub struct LocalizedValueData {
    pub value: Value,
    pub modified: bool,
}

#[derive(Debug, Clone)]
pub struct GroupData {
    pub extensible: bool,
    pub template_name: Option<String>,
    pub members: Members,
}

#[derive(Debug, Clone)]
pub struct SetData {
    pub default_template: String,
    pub additional_templates: Vec<String>,
    pub template_name: Option<String>,
    pub members: Members,
}

/// Kind-specific payload of a [`Node`].
#[derive(Debug, Clone)]
pub enum NodeData {
    Property(PropertyData),
    LocalizedProperty(LocalizedPropertyData),
    LocalizedValue(LocalizedValueData),
    Group(GroupData),
    Set(SetData),
    Root(Members),
}

#[derive(Debug, Clone)]
pub struct Node {
    layer: Layer,
    finalized: Layer,
    mandatory: Layer,
    description: Option<String>,
    data: NodeData,
}

impl Node {
    fn with_data(
        layer: Layer,
        data: NodeData,
    ) -> Self {
        Self {
            layer,
            finalized: Layer::NONE,
            mandatory: Layer::NONE,
            description: None,
            data,
        }
    }

    pub fn property(
        layer: Layer,
        static_type: ValueType,
        nillable: bool,
        value: Value,
        extension: bool,
    ) -> Self {
        Self::with_data(
            layer,
            NodeData::Property(PropertyData {
                static_type,
                nillable,
                value,
                extension,
                modified: false,
            }),
        )
    }

    pub fn localized_property(
        layer: Layer,
        static_type: ValueType,
        nillable: bool,
    ) -> Self {
        Self::with_data(
            layer,
            NodeData::LocalizedProperty(LocalizedPropertyData {
                static_type,
                nillable,
                members: Members::new(),
            }),
        )
    }

    pub fn localized_value(
        layer: Layer,
        value: Value,
    ) -> Self {
        Self::with_data(layer, NodeData::LocalizedValue(LocalizedValueData { value, modified: false }))
    }

    pub fn group(
        layer: Layer,
        extensible: bool,
        template_name: Option<String>,
    ) -> Self {
        Self::with_data(
            layer,
            NodeData::Group(GroupData {
                extensible,
                template_name,
                members: Members::new(),
            }),
        )
    }

    pub fn set(
        layer: Layer,
        default_template: impl Into<String>,
        additional_templates: Vec<String>,
        template_name: Option<String>,
    ) -> Self {
        Self::with_data(
            layer,
            NodeData::Set(SetData {
                default_template: default_template.into(),
                additional_templates,
                template_name,
                members: Members::new(),
            }),
        )
    }

    pub fn root() -> Self {
        Self::with_data(Layer::NONE, NodeData::Root(Members::new()))
    }

    /// Adds (or replaces) a member; ignored on scalar kinds.
    pub fn with_member(
        mut self,
        name: impl Into<String>,
        member: Node,
    ) -> Self {
        if let Some(members) = self.members_mut() {
            members.insert(name.into(), Arc::new(member));
        }
        self
    }

    pub fn with_finalized(
        mut self,
        layer: Layer,
    ) -> Self {
        self.finalized = layer;
        self
    }

    pub fn with_mandatory(
        mut self,
        layer: Layer,
    ) -> Self {
        self.mandatory = layer;
        self
    }

    pub fn with_description(
        mut self,
        description: impl Into<String>,
    ) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> NodeKind {
        match &self.data {
            NodeData::Property(_) => NodeKind::Property,
            NodeData::LocalizedProperty(_) => NodeKind::LocalizedProperty,
            NodeData::LocalizedValue(_) => NodeKind::LocalizedValue,
            NodeData::Group(_) => NodeKind::Group,
            NodeData::Set(_) => NodeKind::Set,
            NodeData::Root(_) => NodeKind::Root,
        }
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut NodeData {
        &mut self.data
    }

    /// Members of a container; empty for scalar kinds.
    pub fn members(&self) -> &Members {
        match &self.data {
            NodeData::LocalizedProperty(d) => &d.members,
            NodeData::Group(d) => &d.members,
            NodeData::Set(d) => &d.members,
            NodeData::Root(members) => members,
            NodeData::Property(_) | NodeData::LocalizedValue(_) => &NO_MEMBERS,
        }
    }

    pub fn members_mut(&mut self) -> Option<&mut Members> {
        match &mut self.data {
            NodeData::LocalizedProperty(d) => Some(&mut d.members),
            NodeData::Group(d) => Some(&mut d.members),
            NodeData::Set(d) => Some(&mut d.members),
            NodeData::Root(members) => Some(members),
            NodeData::Property(_) | NodeData::LocalizedValue(_) => None,
        }
    }

    pub fn member(
        &self,
        name: &str,
    ) -> Option<&Arc<Node>> {
        self.members().get(name)
    }

    /// Independent copy of this node for use as a new set element.
    ///
    /// The copy is unlayered; its template name survives only when
    /// `keep_template_name` is set. Members are shared until written.
    pub fn clone_node(
        &self,
        keep_template_name: bool,
    ) -> Node {
        let mut node = self.clone();
        node.layer = Layer::NONE;
        if !keep_template_name {
            node.set_template_name(None);
        }
        node
    }

    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn set_layer(
        &mut self,
        layer: Layer,
    ) {
        self.layer = layer;
    }

    pub fn finalized(&self) -> Layer {
        self.finalized
    }

    pub fn set_finalized(
        &mut self,
        layer: Layer,
    ) {
        self.finalized = layer;
    }

    pub fn is_finalized(&self) -> bool {
        !self.finalized.is_none()
    }

    pub fn mandatory(&self) -> Layer {
        self.mandatory
    }

    pub fn set_mandatory(
        &mut self,
        layer: Layer,
    ) {
        self.mandatory = layer;
    }

    pub fn is_mandatory(&self) -> bool {
        !self.mandatory.is_none()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(
        &mut self,
        description: Option<String>,
    ) {
        self.description = description;
    }

    /// Template this node was instantiated from, if it is a set element.
    pub fn template_name(&self) -> Option<&str> {
        match &self.data {
            NodeData::Group(d) => d.template_name.as_deref(),
            NodeData::Set(d) => d.template_name.as_deref(),
            _ => None,
        }
    }

    pub fn set_template_name(
        &mut self,
        name: Option<String>,
    ) {
        match &mut self.data {
            NodeData::Group(d) => d.template_name = name,
            NodeData::Set(d) => d.template_name = name,
            _ => {}
        }
    }

    /// Scalar value of a Property or LocalizedValue.
    pub fn value(&self) -> Option<&Value> {
        match &self.data {
            NodeData::Property(d) => Some(&d.value),
            NodeData::LocalizedValue(d) => Some(&d.value),
            _ => None,
        }
    }

    /// Overwrites the scalar value, stamping `layer`. Returns false on
    /// non-scalar kinds.
    pub fn set_value(
        &mut self,
        layer: Layer,
        value: Value,
    ) -> bool {
        let modified = layer.is_none();
        match &mut self.data {
            NodeData::Property(d) => {
                d.value = value;
                d.modified |= modified;
            }
            NodeData::LocalizedValue(d) => {
                d.value = value;
                d.modified |= modified;
            }
            _ => return false,
        }
        self.layer = layer;
        true
    }

    /// Whether a user-level value was ever written to this scalar.
    pub fn is_modified(&self) -> Option<bool> {
        match &self.data {
            NodeData::Property(d) => Some(d.modified),
            NodeData::LocalizedValue(d) => Some(d.modified),
            _ => None,
        }
    }

    /// Static type and nillability of a Property or LocalizedProperty.
    pub fn static_type(&self) -> Option<(ValueType, bool)> {
        match &self.data {
            NodeData::Property(d) => Some((d.static_type, d.nillable)),
            NodeData::LocalizedProperty(d) => Some((d.static_type, d.nillable)),
            _ => None,
        }
    }

    pub fn is_nillable(&self) -> bool {
        self.static_type().map(|(_, nillable)| nillable).unwrap_or(false)
    }

    pub fn is_extension(&self) -> bool {
        matches!(&self.data, NodeData::Property(d) if d.extension)
    }

    pub fn is_extensible(&self) -> bool {
        matches!(&self.data, NodeData::Group(d) if d.extensible)
    }

    /// Default template of a set.
    pub fn default_template(&self) -> Option<&str> {
        match &self.data {
            NodeData::Set(d) => Some(&d.default_template),
            _ => None,
        }
    }

    /// Whether a set accepts elements of the given template.
    pub fn is_valid_template(
        &self,
        template: &str,
    ) -> bool {
        match &self.data {
            NodeData::Set(d) => {
                crate::path::equal_template_names(template, &d.default_template)
                    || d
                        .additional_templates
                        .iter()
                        .any(|t| crate::path::equal_template_names(template, t))
            }
            _ => false,
        }
    }
}
