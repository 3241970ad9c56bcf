//! # Node Tree
//!
//! The canonical in-memory page: a root node plus an id → node map linked
//! through `parent_id` / `child_ids`.
//!
//! ## Operation Semantics
//!
//! Every operation validates before it touches the map, so a failed
//! operation leaves the tree exactly as it was. A successful operation
//! returns an [`Edit`] carrying the [`Change`] it made: before/after
//! snapshots of only the nodes it touched.
//!
//! ### Create
//! - Parent must exist, be a canvas, and have a registered type
//! - Index is clamped to the parent's child count
//!
//! ### Move
//! - Target must not be the node itself or one of its descendants
//! - Target must be a canvas with a registered type
//! - Index is relative to the target's children *after* the node has been
//!   taken out of its old parent
//!
//! ### Delete
//! - Removes the node and all descendants
//! - The root cannot be deleted

use std::collections::BTreeMap;

use crate::error::{StructuralError, TreeError, TreeResult, ValidationWarning};
use crate::id_generator::IdGenerator;
use crate::node::{Breakpoint, Node, NodeId, Props};
use crate::registry::{accepts_children, ComponentRegistry};
use crate::serializer;
use crate::validate::{self, Violation};

/// Copies of a set of nodes; `None` marks a node that does not exist
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    nodes: BTreeMap<NodeId, Option<Node>>,
}

impl Snapshot {
    fn capture<'a>(tree: &NodeTree, ids: impl IntoIterator<Item = &'a str>) -> Self {
        let nodes = ids
            .into_iter()
            .map(|id| (id.to_string(), tree.nodes.get(id).cloned()))
            .collect();
        Self { nodes }
    }

    /// `Some(None)` when the snapshot records the node as absent
    pub fn get(&self, id: &str) -> Option<Option<&Node>> {
        self.nodes.get(id).map(Option::as_ref)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// State of the touched nodes before and after one mutation
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    pub before: Snapshot,
    pub after: Snapshot,
}

impl Change {
    /// True when the mutation left every touched node as it was
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }

    /// Fold a later change into this one.
    ///
    /// The result keeps the earliest `before` and the latest `after` of
    /// every node either change touched.
    pub fn merge(mut self, next: Change) -> Change {
        for (id, node) in next.before.nodes {
            self.before.nodes.entry(id).or_insert(node);
        }
        for (id, node) in next.after.nodes {
            self.after.nodes.insert(id, node);
        }
        self
    }
}

/// Result of a successful tree operation
#[derive(Debug, Clone, PartialEq)]
pub struct Edit<T = ()> {
    pub value: T,
    pub change: Change,
    pub warnings: Vec<ValidationWarning>,
}

/// Page tree
#[derive(Debug, Clone)]
pub struct NodeTree {
    root_id: NodeId,
    nodes: BTreeMap<NodeId, Node>,
    ids: IdGenerator,
}

impl PartialEq for NodeTree {
    fn eq(&self, other: &Self) -> bool {
        self.root_id == other.root_id && self.nodes == other.nodes
    }
}

impl NodeTree {
    /// Create a tree holding a single root of `component`
    pub fn new(registry: &ComponentRegistry, component: &str, props: &Props) -> TreeResult<Self> {
        Self::with_id_generator(registry, component, props, IdGenerator::default())
    }

    pub fn with_id_generator(
        registry: &ComponentRegistry,
        component: &str,
        props: &Props,
        mut ids: IdGenerator,
    ) -> TreeResult<Self> {
        let definition = registry.resolve_type(component)?;
        let root_id = ids.next_id();

        let mut root = Node::new(root_id.clone(), component, definition.canvas);
        root.base_props = definition.default_props.clone();
        let warnings =
            definition.merge_patch(&root_id, Breakpoint::Desktop, &mut root.base_props, props);
        for warning in warnings {
            tracing::warn!(%warning, "root props");
        }

        let mut nodes = BTreeMap::new();
        nodes.insert(root_id.clone(), root);

        Ok(Self { root_id, nodes, ids })
    }

    /// Assemble a tree from already-validated parts
    pub(crate) fn from_parts(root_id: NodeId, nodes: BTreeMap<NodeId, Node>) -> Self {
        Self {
            root_id,
            nodes,
            ids: IdGenerator::default(),
        }
    }

    pub fn set_id_generator(&mut self, ids: IdGenerator) {
        self.ids = ids;
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root(&self) -> &Node {
        &self.nodes[&self.root_id]
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: a tree has at least its root
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, ordered by id
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Children of `id` in render order (empty if `id` is unknown)
    pub fn children(&self, id: &str) -> &[NodeId] {
        self.nodes
            .get(id)
            .map(|n| n.child_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn parent_of(&self, id: &str) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.parent_id.as_deref())
    }

    /// Position of `id` within its parent's children
    pub fn index_in_parent(&self, id: &str) -> Option<usize> {
        let parent = self.parent_of(id)?;
        self.children(parent).iter().position(|c| c == id)
    }

    /// Ancestors of `id`, nearest first
    pub fn ancestors(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent_of(id);
        while let Some(parent) = current {
            if out.len() > self.nodes.len() {
                break;
            }
            out.push(parent.to_string());
            current = self.parent_of(parent);
        }
        out
    }

    /// True if `node` is `ancestor` or lies somewhere beneath it
    pub fn is_ancestor_or_self(&self, ancestor: &str, node: &str) -> bool {
        if ancestor == node {
            return true;
        }
        self.ancestors(node).iter().any(|a| a == ancestor)
    }

    /// `id` and all its descendants in pre-order
    pub fn descendants(&self, id: &str) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(id) {
            return out;
        }

        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            for child in self.children(&current).iter().rev() {
                stack.push(child.clone());
            }
            out.push(current);
        }
        out
    }

    /// Insert a new `component` node under `parent_id` at `index`
    pub fn create_node(
        &mut self,
        registry: &ComponentRegistry,
        component: &str,
        props: &Props,
        parent_id: &str,
        index: usize,
    ) -> TreeResult<Edit<NodeId>> {
        let parent = self
            .nodes
            .get(parent_id)
            .ok_or_else(|| TreeError::InvalidParent(parent_id.to_string()))?;
        if !accepts_children(registry, parent.canvas, &parent.component) {
            return Err(TreeError::InvalidParent(parent_id.to_string()));
        }
        let definition = registry.resolve_type(component)?;

        let id = self.ids.next_unused(|id| self.nodes.contains_key(id));
        let mut node = Node::new(id.clone(), component, definition.canvas);
        node.parent_id = Some(parent_id.to_string());
        node.base_props = definition.default_props.clone();
        let warnings =
            definition.merge_patch(&id, Breakpoint::Desktop, &mut node.base_props, props);

        let before = Snapshot::capture(self, [parent_id, id.as_str()]);
        self.nodes.insert(id.clone(), node);
        if let Some(parent) = self.nodes.get_mut(parent_id) {
            let at = index.min(parent.child_ids.len());
            parent.child_ids.insert(at, id.clone());
        }
        let after = Snapshot::capture(self, [parent_id, id.as_str()]);

        Ok(Edit {
            value: id,
            change: Change { before, after },
            warnings,
        })
    }

    /// Reparent `node_id` under `new_parent_id` at `index`
    pub fn move_node(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        new_parent_id: &str,
        index: usize,
    ) -> TreeResult<Edit> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        if registry.is_placeholder(&node.component) {
            return Err(TreeError::PlaceholderReadOnly(node_id.to_string()));
        }

        let target = self
            .nodes
            .get(new_parent_id)
            .ok_or_else(|| StructuralError::MissingTarget(new_parent_id.to_string()))?;

        let cycle = || StructuralError::Cycle {
            node_id: node_id.to_string(),
            target_id: new_parent_id.to_string(),
        };
        if self.is_ancestor_or_self(node_id, new_parent_id) {
            return Err(cycle().into());
        }
        if !accepts_children(registry, target.canvas, &target.component) {
            return Err(StructuralError::NotCanvas(new_parent_id.to_string()).into());
        }
        // Only the root lacks a parent, and the root is an ancestor of every
        // possible target.
        let old_parent_id = node.parent_id.clone().ok_or_else(cycle)?;

        let touched = [node_id, old_parent_id.as_str(), new_parent_id];
        let before = Snapshot::capture(self, touched);

        if let Some(old_parent) = self.nodes.get_mut(&old_parent_id) {
            old_parent.child_ids.retain(|c| c != node_id);
        }
        if let Some(new_parent) = self.nodes.get_mut(new_parent_id) {
            let at = index.min(new_parent.child_ids.len());
            new_parent.child_ids.insert(at, node_id.to_string());
        }
        if let Some(node) = self.nodes.get_mut(node_id) {
            node.parent_id = Some(new_parent_id.to_string());
        }

        let after = Snapshot::capture(self, touched);
        Ok(Edit {
            value: (),
            change: Change { before, after },
            warnings: Vec::new(),
        })
    }

    /// Remove `node_id` and its whole subtree; returns the removed ids
    pub fn delete_node(&mut self, node_id: &str) -> TreeResult<Edit<Vec<NodeId>>> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| TreeError::NotFound(node_id.to_string()))?;
        let parent_id = node.parent_id.clone().ok_or(TreeError::RootProtected)?;

        let removed = self.descendants(node_id);
        let touched = || removed.iter().map(String::as_str).chain([parent_id.as_str()]);
        let before = Snapshot::capture(self, touched());

        if let Some(parent) = self.nodes.get_mut(&parent_id) {
            parent.child_ids.retain(|c| c != node_id);
        }
        for id in &removed {
            self.nodes.remove(id);
        }

        let after = Snapshot::capture(self, touched());
        Ok(Edit {
            value: removed,
            change: Change { before, after },
            warnings: Vec::new(),
        })
    }

    /// Shallow-merge `patch` into the node's props at `breakpoint`.
    ///
    /// Desktop edits `base_props`; tablet and mobile edit their override
    /// bucket, creating it if needed.
    pub fn update_props(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        breakpoint: Breakpoint,
        patch: &Props,
    ) -> TreeResult<Edit> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| TreeError::UnknownNode(node_id.to_string()))?;
        let definition = registry
            .resolve_type(&node.component)
            .map_err(|_| TreeError::PlaceholderReadOnly(node_id.to_string()))?;

        let before = Snapshot::capture(self, [node_id]);
        let mut warnings = Vec::new();
        if let Some(node) = self.nodes.get_mut(node_id) {
            warnings =
                definition.merge_patch(node_id, breakpoint, node.layer_mut(breakpoint), patch);
        }
        let after = Snapshot::capture(self, [node_id]);

        Ok(Edit {
            value: (),
            change: Change { before, after },
            warnings,
        })
    }

    pub fn set_locked(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        locked: bool,
    ) -> TreeResult<Edit> {
        self.set_flag(registry, node_id, |node| node.locked = locked)
    }

    pub fn set_hidden(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        hidden: bool,
    ) -> TreeResult<Edit> {
        self.set_flag(registry, node_id, |node| node.hidden = hidden)
    }

    fn set_flag(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        apply: impl FnOnce(&mut Node),
    ) -> TreeResult<Edit> {
        let node = self
            .nodes
            .get(node_id)
            .ok_or_else(|| TreeError::UnknownNode(node_id.to_string()))?;
        if registry.is_placeholder(&node.component) {
            return Err(TreeError::PlaceholderReadOnly(node_id.to_string()));
        }

        let before = Snapshot::capture(self, [node_id]);
        if let Some(node) = self.nodes.get_mut(node_id) {
            apply(node);
        }
        let after = Snapshot::capture(self, [node_id]);

        Ok(Edit {
            value: (),
            change: Change { before, after },
            warnings: Vec::new(),
        })
    }

    /// Restore the nodes recorded in `snapshot` (undo/redo)
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        for (id, node) in &snapshot.nodes {
            match node {
                Some(node) => {
                    self.nodes.insert(id.clone(), node.clone());
                }
                None => {
                    self.nodes.remove(id);
                }
            }
        }
    }

    /// Invariant violations in the current tree (empty when healthy)
    pub fn check(&self) -> Vec<Violation> {
        validate::check(&self.root_id, &serializer::node_records(self))
    }
}
