//! The registry: shared state behind every access handle.
//!
//! All roots created from one [`Registry`] share a single lock. Every public
//! operation runs to completion under it and queues its notifications in a
//! [`Broadcaster`], which is delivered after the lock is released.

mod builder;

pub use builder::*;


use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;
use tracing::info;

use crate::access::AccessEntry;
use crate::access::AccessKey;
use crate::access::Arena;
use crate::access::Binding;
use crate::access::Listeners;
use crate::access::RootInfo;
use crate::access::TransactionState;
use crate::constants::ALL_LOCALES;
use crate::modifications::Modifications;
use crate::node::apply_patch;
use crate::path::create_segment;
use crate::path::parse_segment;
use crate::Access;
use crate::AccessError;
use crate::Broadcaster;
use crate::LayerPatch;
use crate::LayerReport;
use crate::Layer;
use crate::ModificationSink;
use crate::Node;
use crate::NodeKind;
use crate::RegistryConfig;
use crate::Result;

pub(crate) struct State {
    /// Root node whose members are the components
    pub(crate) data: Arc<Node>,
    pub(crate) templates: BTreeMap<String, Arc<Node>>,
    pub(crate) arena: Arena,
    pub(crate) roots: Vec<AccessKey>,
    pub(crate) sink: Arc<dyn ModificationSink>,
    pub(crate) config: RegistryConfig,
    pub(crate) sequence: u64,
    pub(crate) last_layer: Option<Layer>,
}

impl State {
    /// Reclaims unreachable access slots once enough have been allocated.
    /// Only called at operation boundaries, when no keys are held locally.
    fn maybe_sweep(&mut self) {
        if self.arena.allocated_since_sweep() >= self.config.access.sweep_threshold {
            self.sweep();
        }
    }

    pub(crate) fn sweep(&mut self) -> usize {
        let freed = self.arena.sweep();
        let arena = &self.arena;
        self.roots.retain(|key| arena.contains(*key));
        if freed > 0 {
            debug!("swept {freed} unreachable accesses, {} live", self.arena.len());
        }
        freed
    }

    pub(crate) fn template(
        &self,
        name: &str,
    ) -> Option<&Arc<Node>> {
        self.templates.get(name).or_else(|| {
            self.templates
                .iter()
                .find(|(long, _)| crate::path::equal_template_names(name, long))
                .map(|(_, t)| t)
        })
    }

    /// Resolves an absolute path representation to member names, its
    /// canonical spelling, and the node it denotes.
    fn resolve_path_representation(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, String, Arc<Node>)> {
        let bad_path = || AccessError::runtime(format!("bad path {path}"));
        if !path.starts_with('/') {
            return Err(bad_path());
        }
        if path == "/" {
            return Ok((Vec::new(), "/".to_string(), self.data.clone()));
        }
        let mut names = Vec::new();
        let mut canonical = String::new();
        let mut node = self.data.clone();
        let mut i = 1;
        loop {
            let (segment, end) = parse_segment(path, i).ok_or_else(bad_path)?;
            if segment.name.is_empty() || (names.is_empty() && segment.set_element) {
                return Err(bad_path());
            }
            if segment.set_element {
                match node.kind() {
                    NodeKind::LocalizedProperty if segment.template_name.is_empty() => {}
                    NodeKind::Set
                        if segment.template_name.is_empty() || node.is_valid_template(&segment.template_name) => {}
                    _ => return Err(bad_path()),
                }
            }
            let child = node
                .member(&segment.name)
                .cloned()
                .ok_or_else(|| AccessError::no_such_element(format!("cannot find {path}")))?;
            if segment.set_element && !segment.template_name.is_empty() {
                let matches = child
                    .template_name()
                    .is_some_and(|t| crate::path::equal_template_names(&segment.template_name, t));
                if !matches {
                    return Err(bad_path());
                }
            }
            let template = match node.kind() {
                NodeKind::Set => child.template_name().unwrap_or_default(),
                _ => "",
            };
            canonical.push('/');
            canonical.push_str(&create_segment(template, &segment.name));
            names.push(segment.name);
            node = child;

            if end < path.len() && path.as_bytes()[end] != b'/' {
                return Err(bad_path());
            }
            // a single trailing slash is ignored
            if end + 1 >= path.len() {
                break;
            }
            i = end + 1;
        }
        Ok((names, canonical, node))
    }

    fn create_root(
        &mut self,
        path: &str,
        locale: &str,
        update: bool,
    ) -> Result<AccessKey> {
        let (names, representation, node) = self.resolve_path_representation(path)?;
        match node.kind() {
            NodeKind::Property | NodeKind::LocalizedValue => {
                return Err(AccessError::illegal(format!("{path} does not denote a container")));
            }
            NodeKind::LocalizedProperty if locale != ALL_LOCALES => {
                return Err(AccessError::illegal(format!(
                    "{path} denotes a localized property; use locale {ALL_LOCALES}"
                )));
            }
            _ => {}
        }
        let name = names.last().cloned().unwrap_or_default();
        let key = self.arena.insert_with(|key| AccessEntry {
            anchor: None,
            parent: None,
            root: key,
            name,
            binding: Binding::Inherited,
            modified_children: BTreeMap::new(),
            cached_children: Default::default(),
            changed_value: None,
            in_transaction: false,
            listeners: Listeners::default(),
            root_info: Some(Box::new(RootInfo {
                path: names,
                representation,
                locale: locale.to_string(),
                update,
                disposed: false,
                state: TransactionState::Idle,
                changes_listeners: Default::default(),
            })),
        });
        self.roots.push(key);
        debug!(path, locale, update, "created root access");
        Ok(key)
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
}

impl Shared {
    fn new(state: State) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    /// Runs `f` under the registry lock, then delivers whatever it queued.
    /// Nothing is delivered when `f` fails.
    pub(crate) fn run<R>(
        self: &Arc<Self>,
        f: impl FnOnce(&mut State, &mut Broadcaster) -> Result<R>,
    ) -> Result<R> {
        let mut broadcaster = Broadcaster::new();
        let result = {
            let mut state = self.state.lock();
            state.maybe_sweep();
            f(&mut state, &mut broadcaster)
        };
        if result.is_ok() {
            broadcaster.send();
        }
        result
    }
}

/// A hierarchical configuration registry.
///
/// Cloning is cheap; clones share the same tree and lock.
#[derive(Clone)]
pub struct Registry {
    shared: Arc<Shared>,
}

impl Registry {
    /// Creates a root access for the node at the absolute `path`.
    ///
    /// `locale` defaults to the configured default locale; `"*"` exposes
    /// every localized value. Update accesses may be modified and committed.
    pub fn create_root_access(
        &self,
        path: &str,
        locale: Option<&str>,
        update: bool,
    ) -> Result<Access> {
        self.shared.run(|state, _| {
            let locale = locale.map(str::to_string).unwrap_or_else(|| state.config.locale.default.clone());
            let key = state.create_root(path, &locale, update)?;
            Ok(state.handle(&self.shared, key))
        })
    }

    pub fn create_read_access(
        &self,
        path: &str,
    ) -> Result<Access> {
        self.create_root_access(path, None, false)
    }

    pub fn create_update_access(
        &self,
        path: &str,
    ) -> Result<Access> {
        self.create_root_access(path, None, true)
    }

    /// Merges a layer into the tree and notifies every live root whose
    /// subtree it touched.
    ///
    /// Layers must arrive in ascending order; re-applying the most recent
    /// layer is allowed.
    pub fn apply_layer(
        &self,
        patch: &LayerPatch,
    ) -> Result<LayerReport> {
        self.shared.run(|state, broadcaster| {
            if let Some(last) = state.last_layer {
                if patch.layer < last {
                    return Err(AccessError::illegal(format!(
                        "layer {} applied after layer {last}",
                        patch.layer
                    )));
                }
            }
            let report = apply_patch(&mut state.data, &state.templates, patch);
            for (path, old) in &report.displaced {
                state.detach_displaced(path, old, None);
            }
            state.last_layer = Some(patch.layer);

            let mut mods = Modifications::new();
            for path in &report.applied {
                mods.add(path);
            }
            state.init_global_broadcaster(&self.shared, &mods, None, broadcaster);
            info!(
                "applied layer {}: {} operations, {} skipped",
                patch.layer,
                report.applied.len(),
                report.skipped.len()
            );
            Ok(report)
        })
    }

    /// Number of access slots still in use after reclaiming unreachable
    /// ones.
    pub fn live_access_count(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.sweep();
        state.arena.len()
    }

    /// Number of live root accesses.
    pub fn root_count(&self) -> usize {
        let mut state = self.shared.state.lock();
        state.sweep();
        state.roots.len()
    }

    pub fn config(&self) -> RegistryConfig {
        self.shared.state.lock().config.clone()
    }
}
