//! # Page Mutations
//!
//! The editing vocabulary: every user action that changes the page is one
//! of these. Mutations are plain data so that they can be logged, replayed,
//! and sent over the wire; applying one delegates to the document's tree
//! operations, which validate before they touch anything.
//!
//! ## Mutation Semantics
//!
//! ### CreateNode
//! - Parent must be a registered canvas
//! - Props are type defaults merged with the given props
//!
//! ### MoveNode
//! - Fails on cycles and non-canvas targets
//! - Overrides travel with the node
//!
//! ### DeleteNode
//! - Removes node and all descendants
//! - Clears the selection if it pointed into the subtree
//!
//! ### UpdateProps
//! - Desktop patches base props, narrower breakpoints patch their override
//! - Unknown keys are kept with a warning

use pagecraft_document::{
    Breakpoint, Change, ComponentRegistry, Document, Edit, NodeId, Props, TreeResult,
    ValidationWarning,
};
use serde::{Deserialize, Serialize};

/// Semantic page mutations
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Mutation {
    /// Insert a new node of `component` under `parent_id`
    CreateNode {
        component: String,
        #[serde(default)]
        props: Props,
        parent_id: NodeId,
        index: usize,
    },

    /// Move a node to a new parent at index
    MoveNode {
        node_id: NodeId,
        new_parent_id: NodeId,
        index: usize,
    },

    /// Remove a node and its subtree
    DeleteNode { node_id: NodeId },

    /// Shallow-merge a patch at one breakpoint
    UpdateProps {
        node_id: NodeId,
        breakpoint: Breakpoint,
        patch: Props,
    },

    SetLocked { node_id: NodeId, locked: bool },

    SetHidden { node_id: NodeId, hidden: bool },
}

/// What a successful mutation did
#[derive(Debug, Clone, PartialEq)]
pub struct MutationResult {
    pub change: Change,

    /// Id of the node a `CreateNode` inserted
    pub created: Option<NodeId>,

    /// Ids a `DeleteNode` removed, pre-order
    pub removed: Vec<NodeId>,

    pub warnings: Vec<ValidationWarning>,
}

impl MutationResult {
    fn from_edit(edit: Edit) -> Self {
        Self {
            change: edit.change,
            created: None,
            removed: Vec::new(),
            warnings: edit.warnings,
        }
    }
}

impl Mutation {
    /// Apply to the document. On error the document is unchanged.
    pub fn apply(
        &self,
        doc: &mut Document,
        registry: &ComponentRegistry,
    ) -> TreeResult<MutationResult> {
        match self {
            Mutation::CreateNode { component, props, parent_id, index } => {
                let edit = doc.create_node(registry, component, props, parent_id, *index)?;
                Ok(MutationResult {
                    change: edit.change,
                    created: Some(edit.value),
                    removed: Vec::new(),
                    warnings: edit.warnings,
                })
            }

            Mutation::MoveNode { node_id, new_parent_id, index } => doc
                .move_node(registry, node_id, new_parent_id, *index)
                .map(MutationResult::from_edit),

            Mutation::DeleteNode { node_id } => {
                let edit = doc.delete_node(node_id)?;
                Ok(MutationResult {
                    change: edit.change,
                    created: None,
                    removed: edit.value,
                    warnings: edit.warnings,
                })
            }

            Mutation::UpdateProps { node_id, breakpoint, patch } => doc
                .update_props(registry, node_id, *breakpoint, patch)
                .map(MutationResult::from_edit),

            Mutation::SetLocked { node_id, locked } => doc
                .set_locked(registry, node_id, *locked)
                .map(MutationResult::from_edit),

            Mutation::SetHidden { node_id, hidden } => doc
                .set_hidden(registry, node_id, *hidden)
                .map(MutationResult::from_edit),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mutation::CreateNode { .. } => "create_node",
            Mutation::MoveNode { .. } => "move_node",
            Mutation::DeleteNode { .. } => "delete_node",
            Mutation::UpdateProps { .. } => "update_props",
            Mutation::SetLocked { .. } => "set_locked",
            Mutation::SetHidden { .. } => "set_hidden",
        }
    }

    /// Human-readable label for history entries
    pub fn describe(&self) -> String {
        match self {
            Mutation::CreateNode { component, .. } => format!("Add {component}"),
            Mutation::MoveNode { .. } => "Move element".to_string(),
            Mutation::DeleteNode { .. } => "Delete element".to_string(),
            Mutation::UpdateProps { breakpoint, patch, .. } => {
                let keys: Vec<&str> = patch.keys().map(String::as_str).collect();
                format!("Edit {} ({breakpoint})", keys.join(", "))
            }
            Mutation::SetLocked { locked: true, .. } => "Lock element".to_string(),
            Mutation::SetLocked { locked: false, .. } => "Unlock element".to_string(),
            Mutation::SetHidden { hidden: true, .. } => "Hide element".to_string(),
            Mutation::SetHidden { hidden: false, .. } => "Show element".to_string(),
        }
    }

    /// Node the mutation targets (the parent for `CreateNode`)
    pub fn target(&self) -> &str {
        match self {
            Mutation::CreateNode { parent_id, .. } => parent_id,
            Mutation::MoveNode { node_id, .. }
            | Mutation::DeleteNode { node_id }
            | Mutation::UpdateProps { node_id, .. }
            | Mutation::SetLocked { node_id, .. }
            | Mutation::SetHidden { node_id, .. } => node_id,
        }
    }
}
