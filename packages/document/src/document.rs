//! # Document
//!
//! The page aggregate: a [`NodeTree`], its published version, and the
//! session state (selection, active breakpoint) that is never persisted.
//!
//! All tree mutations go through the document so that session state stays
//! consistent with the tree: deleting a subtree that holds the selection
//! clears it.

use crate::error::{TreeError, TreeResult};
use crate::id_generator::IdGenerator;
use crate::node::{Breakpoint, NodeId, Props};
use crate::registry::ComponentRegistry;
use crate::responsive;
use crate::tree::{Edit, NodeTree, Snapshot};

#[derive(Debug, Clone)]
pub struct Document {
    tree: NodeTree,

    /// Last published version; only publish moves it
    version: u64,

    pub selected_node_id: Option<NodeId>,
    pub active_breakpoint: Breakpoint,
}

/// Documents compare by content; session state is ignored
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version && self.tree == other.tree
    }
}

impl Document {
    /// Unpublished document with a single root
    pub fn new(
        registry: &ComponentRegistry,
        root_component: &str,
        props: &Props,
    ) -> TreeResult<Self> {
        Ok(Self::with_version(NodeTree::new(registry, root_component, props)?, 0))
    }

    pub fn with_version(tree: NodeTree, version: u64) -> Self {
        Self {
            tree,
            version,
            selected_node_id: None,
            active_breakpoint: Breakpoint::Desktop,
        }
    }

    pub fn tree(&self) -> &NodeTree {
        &self.tree
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Record a successful publish
    pub fn mark_published(&mut self, version: u64) {
        self.version = version;
    }

    pub fn set_id_generator(&mut self, ids: IdGenerator) {
        self.tree.set_id_generator(ids);
    }

    pub fn select(&mut self, node_id: &str) -> TreeResult<()> {
        if !self.tree.contains(node_id) {
            return Err(TreeError::UnknownNode(node_id.to_string()));
        }
        self.selected_node_id = Some(node_id.to_string());
        Ok(())
    }

    pub fn clear_selection(&mut self) {
        self.selected_node_id = None;
    }

    pub fn set_active_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.active_breakpoint = breakpoint;
    }

    /// Effective props of a node at `breakpoint`
    pub fn effective_props(&self, node_id: &str, breakpoint: Breakpoint) -> TreeResult<Props> {
        self.tree
            .get(node_id)
            .map(|node| responsive::effective_props(node, breakpoint))
            .ok_or_else(|| TreeError::UnknownNode(node_id.to_string()))
    }

    pub fn create_node(
        &mut self,
        registry: &ComponentRegistry,
        component: &str,
        props: &Props,
        parent_id: &str,
        index: usize,
    ) -> TreeResult<Edit<NodeId>> {
        self.tree.create_node(registry, component, props, parent_id, index)
    }

    pub fn move_node(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        new_parent_id: &str,
        index: usize,
    ) -> TreeResult<Edit> {
        self.tree.move_node(registry, node_id, new_parent_id, index)
    }

    pub fn delete_node(&mut self, node_id: &str) -> TreeResult<Edit<Vec<NodeId>>> {
        let edit = self.tree.delete_node(node_id)?;
        if let Some(selected) = &self.selected_node_id {
            if edit.value.contains(selected) {
                self.selected_node_id = None;
            }
        }
        Ok(edit)
    }

    pub fn update_props(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        breakpoint: Breakpoint,
        patch: &Props,
    ) -> TreeResult<Edit> {
        self.tree.update_props(registry, node_id, breakpoint, patch)
    }

    pub fn set_locked(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        locked: bool,
    ) -> TreeResult<Edit> {
        self.tree.set_locked(registry, node_id, locked)
    }

    pub fn set_hidden(
        &mut self,
        registry: &ComponentRegistry,
        node_id: &str,
        hidden: bool,
    ) -> TreeResult<Edit> {
        self.tree.set_hidden(registry, node_id, hidden)
    }

    /// Restore a history snapshot, dropping a selection it removes
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.tree.apply_snapshot(snapshot);
        if let Some(selected) = &self.selected_node_id {
            if !self.tree.contains(selected) {
                self.selected_node_id = None;
            }
        }
    }
}
