//! The property tree arena.

use crate::event::{ChangeKind, PropertyEvent};
use crate::path::PropertyPath;
use canopy_core::{Error, Namespace, Result};

/// Index of a node inside its owning [`PropertyTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the tree.
#[derive(Debug, Clone)]
struct PropertyNode {
    name: String,
    namespace: Namespace,
    value: Option<String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    dirty: bool,
    mutable: bool,
    origin_module: Option<String>,
}

/// A hierarchical property tree.
///
/// All nodes live in one growable table owned by the tree; relations are
/// indices. Detached nodes keep their slot but become unreachable, which is
/// fine for trees that live for the process lifetime.
#[derive(Debug, Clone)]
pub struct PropertyTree {
    nodes: Vec<PropertyNode>,
    root: NodeId,
    events: Vec<PropertyEvent>,
}

impl PropertyTree {
    /// Create a tree with a single root node.
    pub fn new(root_name: impl Into<String>, namespace: Namespace) -> Self {
        let root = PropertyNode {
            name: root_name.into(),
            namespace,
            value: None,
            parent: None,
            children: Vec::new(),
            dirty: false,
            mutable: true,
            origin_module: None,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            events: Vec::new(),
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    fn node(&self, id: NodeId) -> &PropertyNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut PropertyNode {
        &mut self.nodes[id.index()]
    }

    /// Name of a node.
    pub fn name(&self, id: NodeId) -> &str {
        &self.node(id).name
    }

    /// Namespace of a node.
    pub fn namespace(&self, id: NodeId) -> &Namespace {
        &self.node(id).namespace
    }

    /// Scalar value of a node, if any.
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.node(id).value.as_deref()
    }

    /// Value parsed as a boolean (`true`/`false`, case-insensitive).
    pub fn bool_value(&self, id: NodeId) -> Option<bool> {
        match self.value(id)?.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        }
    }

    /// Value parsed as a signed integer.
    pub fn i64_value(&self, id: NodeId) -> Option<i64> {
        self.value(id)?.trim().parse().ok()
    }

    /// Value parsed as a float.
    pub fn f64_value(&self, id: NodeId) -> Option<f64> {
        self.value(id)?.trim().parse().ok()
    }

    /// Parent of a node; `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of a node, in document order. Duplicate names are permitted.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Children of a node with the given name, in document order.
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.node(id)
            .children
            .iter()
            .copied()
            .filter(move |&c| self.node(c).name == name)
    }

    /// The `index`-th child with the given name.
    pub fn child_by_name(&self, id: NodeId, name: &str, index: usize) -> Option<NodeId> {
        self.children_named(id, name).nth(index)
    }

    /// Module that actually contributed this node, when it differs from the
    /// owning root's module.
    pub fn origin_module(&self, id: NodeId) -> Option<&str> {
        self.node(id).origin_module.as_deref()
    }

    /// Set provenance on a node. Provenance is bookkeeping, not a tree
    /// mutation: no event is recorded and the node is not dirtied.
    pub fn set_origin_module(&mut self, id: NodeId, module: Option<&str>) {
        self.node_mut(id).origin_module = module.map(str::to_string);
    }

    /// Whether the node itself is marked mutable.
    pub fn is_mutable(&self, id: NodeId) -> bool {
        self.node(id).mutable
    }

    /// Mark a node (im)mutable. Applied at load time; not itself a mutation.
    pub fn set_mutable(&mut self, id: NodeId, mutable: bool) {
        self.node_mut(id).mutable = mutable;
    }

    /// Whether a node or any descendant has changed since the last save.
    pub fn is_dirty(&self, id: NodeId, recursive: bool) -> bool {
        if self.node(id).dirty {
            return true;
        }
        recursive
            && self
                .node(id)
                .children
                .iter()
                .any(|&c| self.is_dirty(c, true))
    }

    /// Clear dirty flags on a node and its descendants.
    pub fn mark_clean(&mut self, id: NodeId) {
        self.node_mut(id).dirty = false;
        let children = self.node(id).children.clone();
        for child in children {
            self.mark_clean(child);
        }
    }

    /// Display path of a node: root name plus dot-separated descent.
    pub fn path_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            segments.push(self.node(node).name.clone());
            cursor = self.node(node).parent;
        }
        segments.reverse();
        segments.join(".")
    }

    /// Rejects when `id` or any ancestor is immutable.
    fn check_mutable(&self, id: NodeId) -> Result<()> {
        let mut cursor = Some(id);
        while let Some(node) = cursor {
            if !self.node(node).mutable {
                return Err(Error::Immutable {
                    path: self.path_of(id),
                });
            }
            cursor = self.node(node).parent;
        }
        Ok(())
    }

    /// Insert a node without checks, events, or dirtying. Load-time only.
    pub(crate) fn insert_raw(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: Option<&str>,
    ) -> NodeId {
        let namespace = self.node(parent).namespace.clone();
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(PropertyNode {
            name: name.into(),
            namespace,
            value: value.map(str::to_string),
            parent: Some(parent),
            children: Vec::new(),
            dirty: false,
            mutable: true,
            origin_module: None,
        });
        self.node_mut(parent).children.push(id);
        id
    }

    /// Set a value without checks, events, or dirtying. Load-time only.
    pub(crate) fn set_value_raw(&mut self, id: NodeId, value: Option<String>) {
        self.node_mut(id).value = value;
    }

    /// Detach a node without checks, events, or dirtying. Load-time only.
    pub(crate) fn detach_raw(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.node_mut(parent).children.retain(|&c| c != id);
            self.node_mut(id).parent = None;
        }
    }

    /// Add a child inheriting the parent's namespace.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: &str,
        value: Option<&str>,
    ) -> Result<NodeId> {
        let namespace = self.node(parent).namespace.clone();
        self.add_child_ns(parent, name, value, namespace)
    }

    /// Add a child with an explicit namespace, rejecting a namespace that
    /// disagrees with the parent's.
    pub fn add_child_ns(
        &mut self,
        parent: NodeId,
        name: &str,
        value: Option<&str>,
        namespace: Namespace,
    ) -> Result<NodeId> {
        if namespace != *self.namespace(parent) {
            return Err(Error::namespace(format!(
                "child '{name}' in namespace '{namespace}' cannot be added under '{}' in namespace '{}'",
                self.path_of(parent),
                self.namespace(parent),
            )));
        }
        self.check_mutable(parent)?;

        let id = self.insert_raw(parent, name, value);
        self.node_mut(parent).dirty = true;
        self.node_mut(id).dirty = true;
        self.record(id, ChangeKind::ChildAdded, value.map(str::to_string));
        Ok(id)
    }

    /// Set or clear a node's scalar value.
    pub fn set_value(&mut self, id: NodeId, value: Option<&str>) -> Result<()> {
        self.check_mutable(id)?;
        self.node_mut(id).value = value.map(str::to_string);
        self.node_mut(id).dirty = true;
        self.record(id, ChangeKind::ValueSet, value.map(str::to_string));
        Ok(())
    }

    /// Change the namespace of a node and its whole subtree.
    ///
    /// Applying the change to the subtree keeps the child-namespace
    /// invariant intact. Only valid from the root of a namespace region,
    /// i.e. when the node's parent (if any) already carries the new
    /// namespace or the node is the tree root.
    pub fn set_namespace(&mut self, id: NodeId, namespace: Namespace) -> Result<()> {
        self.check_mutable(id)?;
        if let Some(parent) = self.node(id).parent {
            if *self.namespace(parent) != namespace {
                return Err(Error::namespace(format!(
                    "cannot move '{}' into namespace '{namespace}' under a parent in namespace '{}'",
                    self.path_of(id),
                    self.namespace(parent),
                )));
            }
        }
        self.rename_subtree(id, &namespace);
        self.record(id, ChangeKind::NamespaceSet, Some(namespace.to_string()));
        Ok(())
    }

    fn rename_subtree(&mut self, id: NodeId, namespace: &Namespace) {
        self.node_mut(id).namespace = namespace.clone();
        self.node_mut(id).dirty = true;
        let children = self.node(id).children.clone();
        for child in children {
            self.rename_subtree(child, namespace);
        }
    }

    /// Detach a node from its parent. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let Some(parent) = self.node(id).parent else {
            return Err(Error::namespace("the root property cannot be removed"));
        };
        self.check_mutable(id)?;

        let path = self.path_of(id);
        self.node_mut(parent).children.retain(|&c| c != id);
        self.node_mut(id).parent = None;
        self.node_mut(parent).dirty = true;
        self.events.push(PropertyEvent {
            namespace: self.node(parent).namespace.clone(),
            path,
            kind: ChangeKind::ChildRemoved,
            value: None,
        });
        Ok(())
    }

    /// All nodes matching an ordered dot-path descent below `base`.
    ///
    /// Duplicate names fan out at every level; matches come back in
    /// document order. An empty path yields `base` itself.
    pub fn find_all(&self, base: NodeId, path: &PropertyPath) -> Vec<NodeId> {
        let mut frontier = vec![base];
        for segment in path.segments() {
            let mut next = Vec::new();
            for id in frontier {
                next.extend(self.children_named(id, segment));
            }
            if next.is_empty() {
                return next;
            }
            frontier = next;
        }
        frontier
    }

    /// First match for a dot-path descent below `base`.
    pub fn find(&self, base: NodeId, path: &PropertyPath) -> Option<NodeId> {
        self.find_all(base, path).into_iter().next()
    }

    /// Content equality: name, trimmed value, and child structure in order.
    /// Namespace, mutability, and provenance never participate.
    pub fn content_eq(&self, id: NodeId, other: &PropertyTree, other_id: NodeId) -> bool {
        let a = self.node(id);
        let b = other.node(other_id);
        if a.name != b.name {
            return false;
        }
        let value_a = a.value.as_deref().map(str::trim);
        let value_b = b.value.as_deref().map(str::trim);
        if value_a != value_b {
            return false;
        }
        if a.children.len() != b.children.len() {
            return false;
        }
        a.children
            .iter()
            .zip(b.children.iter())
            .all(|(&ca, &cb)| self.content_eq(ca, other, cb))
    }

    /// Deep-copy a subtree from another tree under `parent`.
    ///
    /// Grafted nodes adopt the destination namespace. Provenance carried by
    /// the source wins; nodes without it get `default_origin`. The copy is a
    /// mutation: nodes arrive dirty and a [`ChangeKind::ChildAdded`] event
    /// is recorded for the subtree root.
    pub fn graft(
        &mut self,
        parent: NodeId,
        source: &PropertyTree,
        source_id: NodeId,
        default_origin: Option<&str>,
    ) -> Result<NodeId> {
        self.check_mutable(parent)?;
        let id = self.graft_inner(parent, source, source_id, default_origin);
        self.node_mut(parent).dirty = true;
        let value = self.node(id).value.clone();
        self.record(id, ChangeKind::ChildAdded, value);
        Ok(id)
    }

    fn graft_inner(
        &mut self,
        parent: NodeId,
        source: &PropertyTree,
        source_id: NodeId,
        default_origin: Option<&str>,
    ) -> NodeId {
        let src = source.node(source_id);
        let id = self.insert_raw(parent, src.name.clone(), src.value.as_deref());
        self.node_mut(id).mutable = src.mutable;
        self.node_mut(id).origin_module = src
            .origin_module
            .clone()
            .or_else(|| default_origin.map(str::to_string));
        self.node_mut(id).dirty = true;
        for &child in &src.children {
            self.graft_inner(id, source, child, default_origin);
        }
        id
    }

    fn record(&mut self, id: NodeId, kind: ChangeKind, value: Option<String>) {
        self.events.push(PropertyEvent {
            namespace: self.node(id).namespace.clone(),
            path: self.path_of(id),
            kind,
            value,
        });
    }

    /// Drain the recorded mutation events.
    pub fn take_events(&mut self) -> Vec<PropertyEvent> {
        std::mem::take(&mut self.events)
    }

    /// Whether any events are waiting to be drained.
    pub fn has_events(&self) -> bool {
        !self.events.is_empty()
    }
}
