//! Merging pre-parsed layers into the node tree.
//!
//! Layer sources are parsed elsewhere; the registry consumes them as
//! [`LayerPatch`]es. A patch for layer `L` cannot write below a node that a
//! lower layer finalized, cannot remove an element a lower layer made
//! mandatory, and cannot overwrite a node last written by a higher layer or
//! by a user commit. Such operations are skipped, not failed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::check_value;
use super::Layer;
use super::Node;
use super::NodeData;
use super::NodeKind;
use super::Value;
use crate::path::equal_template_names;
use crate::path::is_valid_name;
use crate::path::parse_path;

#[derive(Debug, Clone)]
pub enum LayerOp {
    SetValue {
        path: String,
        value: Value,
    },
    SetLocalizedValue {
        path: String,
        locale: String,
        value: Value,
    },
    Finalize {
        path: String,
    },
    Mandatory {
        path: String,
    },
    InsertElement {
        set_path: String,
        name: String,
        template: String,
    },
    RemoveElement {
        set_path: String,
        name: String,
    },
}

impl LayerOp {
    fn path(&self) -> &str {
        match self {
            LayerOp::SetValue { path, .. }
            | LayerOp::SetLocalizedValue { path, .. }
            | LayerOp::Finalize { path }
            | LayerOp::Mandatory { path } => path,
            LayerOp::InsertElement { set_path, .. } | LayerOp::RemoveElement { set_path, .. } => set_path,
        }
    }
}

/// Ordered operations contributed by one layer.
#[derive(Debug, Clone)]
pub struct LayerPatch {
    pub layer: Layer,
    pub ops: Vec<LayerOp>,
}

impl LayerPatch {
    pub fn new(layer: Layer) -> Self {
        Self { layer, ops: Vec::new() }
    }

    pub fn set_value(
        mut self,
        path: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.ops.push(LayerOp::SetValue {
            path: path.into(),
            value: value.into(),
        });
        self
    }

    pub fn set_localized_value(
        mut self,
        path: impl Into<String>,
        locale: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.ops.push(LayerOp::SetLocalizedValue {
            path: path.into(),
            locale: locale.into(),
            value: value.into(),
        });
        self
    }

    pub fn finalize(
        mut self,
        path: impl Into<String>,
    ) -> Self {
        self.ops.push(LayerOp::Finalize { path: path.into() });
        self
    }

    pub fn mandatory(
        mut self,
        path: impl Into<String>,
    ) -> Self {
        self.ops.push(LayerOp::Mandatory { path: path.into() });
        self
    }

    pub fn insert_element(
        mut self,
        set_path: impl Into<String>,
        name: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.ops.push(LayerOp::InsertElement {
            set_path: set_path.into(),
            name: name.into(),
            template: template.into(),
        });
        self
    }

    pub fn remove_element(
        mut self,
        set_path: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        self.ops.push(LayerOp::RemoveElement {
            set_path: set_path.into(),
            name: name.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedOp {
    pub path: String,
    pub reason: &'static str,
}

/// Outcome of merging one patch.
#[derive(Debug, Clone, Default)]
pub struct LayerReport {
    /// Member-name paths written by the patch
    pub applied: Vec<Vec<String>>,
    pub skipped: Vec<SkippedOp>,
    /// Subtrees that were replaced or removed, with their previous content
    pub(crate) displaced: Vec<(Vec<String>, Arc<Node>)>,
}

type OpResult = std::result::Result<Vec<String>, &'static str>;

fn blocks(
    node: &Node,
    layer: Layer,
) -> bool {
    node.finalized() < layer
}

/// Whether a layer above `layer` (or the user) last wrote `node`.
fn overridden(
    node: &Node,
    layer: Layer,
) -> bool {
    node.layer() > layer
}

const OVERRIDDEN: &str = "written by a higher layer";

/// Descends to `names`, refusing to pass a node finalized below `layer`.
fn target_mut<'a>(
    root: &'a mut Arc<Node>,
    names: &[String],
    layer: Layer,
) -> std::result::Result<&'a mut Node, &'static str> {
    let mut node = root;
    for name in names {
        if blocks(node, layer) {
            return Err("finalized by a lower layer");
        }
        node = Arc::make_mut(node)
            .members_mut()
            .ok_or("not a container")?
            .get_mut(name)
            .ok_or("no such node")?;
    }
    if blocks(node, layer) {
        return Err("finalized by a lower layer");
    }
    Ok(Arc::make_mut(node))
}

fn find_template<'a>(
    templates: &'a BTreeMap<String, Arc<Node>>,
    name: &str,
) -> Option<&'a Arc<Node>> {
    templates
        .get(name)
        .or_else(|| templates.iter().find(|(long, _)| equal_template_names(name, long)).map(|(_, t)| t))
}

/// Merges `patch` into the tree rooted at `root`.
pub(crate) fn apply_patch(
    root: &mut Arc<Node>,
    templates: &BTreeMap<String, Arc<Node>>,
    patch: &LayerPatch,
) -> LayerReport {
    let layer = patch.layer;
    let mut report = LayerReport::default();
    for op in &patch.ops {
        let names = match parse_path(op.path()) {
            Ok(segments) => segments.into_iter().map(|s| s.name).collect::<Vec<_>>(),
            Err(_) => {
                warn!(path = op.path(), "layer {layer}: malformed path");
                report.skipped.push(SkippedOp {
                    path: op.path().to_string(),
                    reason: "malformed path",
                });
                continue;
            }
        };
        match apply_op(root, templates, layer, op, names, &mut report.displaced) {
            Ok(path) => report.applied.push(path),
            Err(reason) => {
                debug!(path = op.path(), reason, "layer {layer}: operation skipped");
                report.skipped.push(SkippedOp {
                    path: op.path().to_string(),
                    reason,
                });
            }
        }
    }
    report
}

fn apply_op(
    root: &mut Arc<Node>,
    templates: &BTreeMap<String, Arc<Node>>,
    layer: Layer,
    op: &LayerOp,
    mut names: Vec<String>,
    displaced: &mut Vec<(Vec<String>, Arc<Node>)>,
) -> OpResult {
    match op {
        LayerOp::SetValue { value, .. } => {
            let node = target_mut(root, &names, layer)?;
            if overridden(node, layer) {
                return Err(OVERRIDDEN);
            }
            match node.data() {
                NodeData::Property(d) => {
                    check_value(value, d.static_type, d.nillable).map_err(|_| "inappropriate value")?;
                }
                NodeData::LocalizedValue(_) => {}
                _ => return Err("not a value"),
            }
            node.set_value(layer, value.clone());
            Ok(names)
        }
        LayerOp::SetLocalizedValue { locale, value, .. } => {
            let node = target_mut(root, &names, layer)?;
            let (ty, nillable) = match node.data() {
                NodeData::LocalizedProperty(d) => (d.static_type, d.nillable),
                _ => return Err("not a localized property"),
            };
            check_value(value, ty, nillable).map_err(|_| "inappropriate value")?;
            let members = node.members_mut().ok_or("not a container")?;
            match members.get_mut(locale) {
                Some(existing) if existing.finalized() < layer => return Err("finalized by a lower layer"),
                Some(existing) if overridden(existing, layer) => return Err(OVERRIDDEN),
                Some(existing) => {
                    Arc::make_mut(existing).set_value(layer, value.clone());
                }
                None => {
                    members.insert(locale.clone(), Arc::new(Node::localized_value(layer, value.clone())));
                }
            }
            names.push(locale.clone());
            Ok(names)
        }
        LayerOp::Finalize { .. } => {
            let node = target_mut(root, &names, layer)?;
            if overridden(node, layer) {
                return Err(OVERRIDDEN);
            }
            if !node.is_finalized() {
                node.set_finalized(layer);
            }
            Ok(names)
        }
        LayerOp::Mandatory { .. } => {
            let node = target_mut(root, &names, layer)?;
            if !node.is_mandatory() {
                node.set_mandatory(layer);
            }
            Ok(names)
        }
        LayerOp::InsertElement { name, template, .. } => {
            if !is_valid_name(name, true) {
                return Err("invalid element name");
            }
            let set = target_mut(root, &names, layer)?;
            if set.kind() != NodeKind::Set {
                return Err("not a set");
            }
            if !set.is_valid_template(template) {
                return Err("template not accepted by set");
            }
            let tmpl = find_template(templates, template).ok_or("unknown template")?;
            let mut element = tmpl.clone_node(true);
            element.set_layer(layer);
            let members = set.members_mut().ok_or("not a container")?;
            if let Some(existing) = members.get(name) {
                if blocks(existing, layer) {
                    return Err("finalized by a lower layer");
                }
                if overridden(existing, layer) {
                    return Err(OVERRIDDEN);
                }
                element.set_mandatory(existing.mandatory());
            }
            names.push(name.clone());
            if let Some(old) = members.insert(name.clone(), Arc::new(element)) {
                displaced.push((names.clone(), old));
            }
            Ok(names)
        }
        LayerOp::RemoveElement { name, .. } => {
            let set = target_mut(root, &names, layer)?;
            if set.kind() != NodeKind::Set {
                return Err("not a set");
            }
            let members = set.members_mut().ok_or("not a container")?;
            let existing = members.get(name).ok_or("no such element")?;
            if blocks(existing, layer) {
                return Err("finalized by a lower layer");
            }
            if existing.mandatory() < layer {
                return Err("mandatory in a lower layer");
            }
            if overridden(existing, layer) {
                return Err(OVERRIDDEN);
            }
            names.push(name.clone());
            if let Some(old) = members.remove(name) {
                displaced.push((names.clone(), old));
            }
            Ok(names)
        }
    }
}
