//! Navigation: from accesses to nodes, and from names and paths to child
//! accesses.

use std::sync::Arc;

use tracing::debug;
use tracing::warn;

use super::AccessEntry;
use super::AccessKey;
use super::Binding;
use super::RootInfo;
use crate::constants::ALL_LOCALES;
use crate::constants::DEFAULT_LOCALES;
use crate::constants::LOCALE_CHILD_PREFIX;
use crate::path::canonicalize;
use crate::path::create_segment;
use crate::path::equal_template_names;
use crate::path::fallback_strings;
use crate::path::parse_segment;
use crate::path::primary_subtag;
use crate::registry::State;
use crate::AccessError;
use crate::Node;
use crate::NodeKind;
use crate::Result;

/// Where a node lookup starts.
enum Base {
    /// The entry's own snapshot
    Owned(AccessKey),
    /// The data tree, at these member names
    Data(Vec<String>),
}

impl State {
    /// The root an access currently belongs to. Bound entries follow their
    /// parent chain; free entries report the root that created them.
    pub(crate) fn root_key(
        &self,
        key: AccessKey,
    ) -> AccessKey {
        let mut current = key;
        loop {
            let entry = &self.arena[current];
            if entry.root_info.is_some() {
                return current;
            }
            match entry.parent {
                Some(parent) => current = parent,
                None => return entry.root,
            }
        }
    }

    pub(crate) fn root_info(
        &self,
        key: AccessKey,
    ) -> &RootInfo {
        let root = self.root_key(key);
        match self.arena[root].root_info.as_deref() {
            Some(info) => info,
            None => unreachable!("root key {root:?} without root info"),
        }
    }

    pub(crate) fn root_info_mut(
        &mut self,
        key: AccessKey,
    ) -> &mut RootInfo {
        let root = self.root_key(key);
        match self.arena[root].root_info.as_deref_mut() {
            Some(info) => info,
            None => unreachable!("root key {root:?} without root info"),
        }
    }

    pub(crate) fn is_root(
        &self,
        key: AccessKey,
    ) -> bool {
        self.arena[key].root_info.is_some()
    }

    pub(crate) fn locale(
        &self,
        key: AccessKey,
    ) -> &str {
        &self.root_info(key).locale
    }

    pub(crate) fn is_all_locales(
        &self,
        key: AccessKey,
    ) -> bool {
        self.locale(key) == ALL_LOCALES
    }

    pub(crate) fn is_update(
        &self,
        key: AccessKey,
    ) -> bool {
        self.root_info(key).update
    }

    pub(crate) fn is_disposed(
        &self,
        key: AccessKey,
    ) -> bool {
        self.root_info(key).disposed
    }

    /// Collects the names from `key` up to its lookup base, innermost first.
    fn locate(
        &self,
        key: AccessKey,
    ) -> Option<(Base, Vec<String>)> {
        let mut names = Vec::new();
        let mut current = key;
        loop {
            let entry = &self.arena[current];
            match &entry.binding {
                Binding::Owned(_) => return Some((Base::Owned(current), names)),
                Binding::Inherited => {
                    if let Some(info) = &entry.root_info {
                        return Some((Base::Data(info.path.clone()), names));
                    }
                    names.push(entry.name.clone());
                    current = entry.parent?;
                }
            }
        }
    }

    /// The node an access is bound to, or `None` if it no longer exists.
    pub(crate) fn node_of(
        &self,
        key: AccessKey,
    ) -> Option<Arc<Node>> {
        let (base, names) = self.locate(key)?;
        let mut node = match base {
            Base::Owned(owner) => match &self.arena[owner].binding {
                Binding::Owned(node) => node.clone(),
                Binding::Inherited => unreachable!("owned base without a node"),
            },
            Base::Data(path) => {
                let mut node = self.data.clone();
                for name in &path {
                    node = node.member(name)?.clone();
                }
                node
            }
        };
        for name in names.iter().rev() {
            node = node.member(name)?.clone();
        }
        Some(node)
    }

    pub(crate) fn node(
        &self,
        key: AccessKey,
    ) -> Result<Arc<Node>> {
        self.node_of(key)
            .ok_or_else(|| AccessError::runtime("access to a node that no longer exists"))
    }

    /// Applies `f` to a writable version of the node bound to `key`,
    /// copying shared ancestors on the way down.
    pub(crate) fn with_node_mut<R>(
        &mut self,
        key: AccessKey,
        f: impl FnOnce(&mut Node) -> R,
    ) -> Option<R> {
        let (base, names) = self.locate(key)?;
        let mut node: &mut Arc<Node> = match base {
            Base::Owned(owner) => match &mut self.arena[owner].binding {
                Binding::Owned(node) => node,
                Binding::Inherited => unreachable!("owned base without a node"),
            },
            Base::Data(path) => {
                let mut node = &mut self.data;
                for name in &path {
                    node = Arc::make_mut(node).members_mut()?.get_mut(name)?;
                }
                node
            }
        };
        for name in names.iter().rev() {
            node = Arc::make_mut(node).members_mut()?.get_mut(name)?;
        }
        Some(f(Arc::make_mut(node)))
    }

    /// Member-name path from the data root, if `key` is bound into the tree
    /// through inherited bindings only.
    pub(crate) fn tree_path(
        &self,
        key: AccessKey,
    ) -> Option<Vec<String>> {
        match self.locate(key)? {
            (Base::Data(mut path), names) => {
                path.extend(names.into_iter().rev());
                Some(path)
            }
            (Base::Owned(_), _) => None,
        }
    }

    /// Member-name path from the data root.
    pub(crate) fn absolute_path(
        &self,
        key: AccessKey,
    ) -> Vec<String> {
        let entry = &self.arena[key];
        if let Some(info) = &entry.root_info {
            return info.path.clone();
        }
        let mut path = entry.parent.map(|p| self.absolute_path(p)).unwrap_or_default();
        path.push(entry.name.clone());
        path
    }

    /// Member names from the notification root (the owning root, or the
    /// free element at the top of the chain) down to `key`.
    pub(crate) fn relative_path(
        &self,
        key: AccessKey,
    ) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = key;
        while let Some(entry) = self.arena.get(current) {
            let Some(parent) = entry.parent else {
                break;
            };
            path.push(entry.name.clone());
            current = parent;
        }
        path.reverse();
        path
    }

    /// Topmost access of the parent chain: the root for bound accesses.
    pub(crate) fn notification_root(
        &self,
        key: AccessKey,
    ) -> AccessKey {
        let mut current = key;
        while let Some(parent) = self.arena[current].parent {
            current = parent;
        }
        current
    }

    fn segment_of(
        &self,
        key: AccessKey,
    ) -> String {
        let template = self
            .node_of(key)
            .and_then(|n| n.template_name().map(str::to_string))
            .unwrap_or_default();
        create_segment(&template, &self.arena[key].name)
    }

    /// Path representation relative to the owning root.
    pub(crate) fn relative_path_representation(
        &self,
        key: AccessKey,
    ) -> String {
        let entry = &self.arena[key];
        if entry.root_info.is_some() {
            return String::new();
        }
        let mut out = entry
            .parent
            .map(|p| self.relative_path_representation(p))
            .unwrap_or_default();
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(&self.segment_of(key));
        out
    }

    pub(crate) fn absolute_path_representation(
        &self,
        key: AccessKey,
    ) -> String {
        let entry = &self.arena[key];
        if let Some(info) = &entry.root_info {
            return info.representation.clone();
        }
        let segment = self.segment_of(key);
        match entry.parent {
            Some(parent) => {
                let base = self.absolute_path_representation(parent);
                if base == "/" {
                    format!("/{segment}")
                } else {
                    format!("{base}/{segment}")
                }
            }
            None => segment,
        }
    }

    /// Whether the bound node or any ancestor is finalized.
    pub(crate) fn is_finalized(
        &self,
        key: AccessKey,
    ) -> bool {
        let entry = &self.arena[key];
        if let Some(info) = &entry.root_info {
            let mut node = self.data.clone();
            if node.is_finalized() {
                return true;
            }
            for name in &info.path {
                match node.member(name) {
                    Some(child) => node = child.clone(),
                    None => return false,
                }
                if node.is_finalized() {
                    return true;
                }
            }
            return false;
        }
        self.node_of(key).is_some_and(|n| n.is_finalized()) || entry.parent.is_some_and(|p| self.is_finalized(p))
    }

    /// Whether an overlay entry still denotes a present child, as opposed
    /// to a removal.
    pub(crate) fn is_present(
        &self,
        parent: AccessKey,
        name: &str,
        child: AccessKey,
    ) -> bool {
        self.arena
            .get(child)
            .is_some_and(|e| e.parent == Some(parent) && e.name == name)
    }

    fn unmodified_child(
        &mut self,
        key: AccessKey,
        node: &Node,
        name: &str,
    ) -> Option<AccessKey> {
        node.member(name)?;
        if let Some(&cached) = self.arena[key].cached_children.get(name) {
            let reusable = self.arena.get(cached).is_some_and(|e| {
                e.parent == Some(key) && e.name == name && matches!(e.binding, Binding::Inherited) && !e.is_abandoned()
            });
            if reusable {
                return Some(cached);
            }
        }
        let root = self.root_key(key);
        let child = self
            .arena
            .insert_with(|_| AccessEntry::child(key, root, name, Binding::Inherited));
        self.arena[key].cached_children.insert(name.to_string(), child);
        Some(child)
    }

    /// Resolves a direct child by name, consulting the overlay first.
    ///
    /// Under a localized property, `"*" + locale` selects the best-matching
    /// localized value.
    pub(crate) fn get_child(
        &mut self,
        key: AccessKey,
        name: &str,
    ) -> Option<AccessKey> {
        let node = self.node_of(key)?;
        if node.kind() == NodeKind::LocalizedProperty {
            if let Some(locale) = name.strip_prefix(LOCALE_CHILD_PREFIX) {
                if locale.starts_with(LOCALE_CHILD_PREFIX) {
                    warn!(name, "best-matching localized value requested recursively");
                    return self.get_child(key, locale);
                }
                if !locale.is_empty() {
                    return self.best_localized_child(key, &node, locale);
                }
            }
        }
        if let Some(modified) = self.arena[key].modified_children.get(name).copied() {
            return self.is_present(key, name, modified.child).then_some(modified.child);
        }
        self.unmodified_child(key, &node, name)
    }

    fn best_localized_child(
        &mut self,
        key: AccessKey,
        node: &Node,
        locale: &str,
    ) -> Option<AccessKey> {
        if let Some(child) = self.get_child(key, locale) {
            return Some(child);
        }
        let canonical = canonicalize(locale);
        if canonical != locale {
            if let Some(child) = self.get_child(key, &canonical) {
                return Some(child);
            }
        }
        for fallback in fallback_strings(locale) {
            if let Some(child) = self.get_child(key, &fallback) {
                return Some(child);
            }
        }
        let primary = primary_subtag(locale);
        for name in self.child_names(key) {
            let shares_primary = name
                .strip_prefix(primary)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with(['-', '_']));
            if shares_primary {
                debug!(locale, matched = %name, "localized value matched by primary subtag");
                return self.get_child(key, &name);
            }
        }
        for default in DEFAULT_LOCALES {
            if let Some(child) = self.get_child(key, default) {
                return Some(child);
            }
        }
        if !node.is_nillable() {
            let first = self.child_names(key).into_iter().next()?;
            return self.get_child(key, &first);
        }
        None
    }

    /// Names of all current children: canonical members not shadowed by the
    /// overlay, then present overlay entries.
    pub(crate) fn child_names(
        &self,
        key: AccessKey,
    ) -> Vec<String> {
        let Some(node) = self.node_of(key) else {
            return Vec::new();
        };
        let entry = &self.arena[key];
        let mut names: Vec<String> = node
            .members()
            .keys()
            .filter(|name| !entry.modified_children.contains_key(*name))
            .cloned()
            .collect();
        for (name, modified) in &entry.modified_children {
            if self.is_present(key, name, modified.child) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Resolves a relative or absolute hierarchical path.
    pub(crate) fn get_sub_child(
        &mut self,
        key: AccessKey,
        path: &str,
    ) -> Option<AccessKey> {
        let mut i = 0;
        if path.starts_with('/') {
            i = self.skip_absolute_prefix(key, path)?;
        }
        let mut parent = key;
        loop {
            let (segment, end) = parse_segment(path, i)?;
            if end != path.len() && path.as_bytes()[end] != b'/' {
                return None;
            }
            let child = self.get_child(parent, &segment.name)?;
            if segment.set_element {
                let parent_node = self.node_of(parent)?;
                match parent_node.kind() {
                    NodeKind::LocalizedProperty => {
                        if !self.is_all_locales(parent) || !segment.template_name.is_empty() {
                            return None;
                        }
                    }
                    NodeKind::Set => {
                        if !segment.template_name.is_empty() && !parent_node.is_valid_template(&segment.template_name) {
                            return None;
                        }
                    }
                    _ => return None,
                }
            }
            let is_value = self
                .node_of(child)
                .is_some_and(|n| matches!(n.kind(), NodeKind::Property | NodeKind::LocalizedValue));
            if is_value {
                return (end == path.len()).then_some(child);
            }
            // a final slash after a non-value node is ignored
            if end + 1 >= path.len() {
                return Some(child);
            }
            i = end + 1;
            parent = child;
        }
    }

    /// Matches the leading segments of an absolute path against the
    /// position of `key`; returns the offset of the first relative segment.
    fn skip_absolute_prefix(
        &self,
        key: AccessKey,
        path: &str,
    ) -> Option<usize> {
        let mut levels = Vec::new();
        let mut node = self.data.clone();
        for name in self.absolute_path(key) {
            let child = node.member(&name)?.clone();
            levels.push((name, node.kind() == NodeKind::Set, child.template_name().map(str::to_string)));
            node = child;
        }
        let mut i = 1;
        for (name, set_member, template) in levels {
            let (segment, end) = parse_segment(path, i)?;
            if end != path.len() && path.as_bytes()[end] != b'/' {
                return None;
            }
            if segment.name != name || (segment.set_element && !set_member) {
                return None;
            }
            if segment.set_element && !segment.template_name.is_empty() {
                let long = template.unwrap_or_default();
                if !equal_template_names(&segment.template_name, &long) {
                    return None;
                }
            }
            i = if end == path.len() { end } else { end + 1 };
        }
        Some(i)
    }
}
