//! # Drag Manager
//!
//! Turns pointer gestures into validated tree mutations.
//!
//! ```text
//!          start_drag            hover
//!   Idle ────────────→ Dragging ──────→ Hovering
//!    ↑                   │  ↑  leave      │
//!    │      cancel       │  └─────────────┤
//!    ├───────────────────┘                │ commit
//!    └────────────────────────────────────┘
//! ```
//!
//! Nothing touches the tree until `commit`. Hover targets are resolved
//! against the current tree on every update:
//!
//! - `Inside` a node that cannot hold children becomes `After` it
//! - `Before`/`After` the root becomes `Inside` the root
//! - siblings are placed in the nearest ancestor that accepts children
//! - a tree source can never land in its own subtree
//!
//! The drop index is the position in the parent's child list after the
//! source has been removed from it, which is what `MoveNode` expects.

use pagecraft_document::{
    ComponentRegistry, Node, NodeId, NodeTree, Props, StructuralError, TreeError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::mutations::Mutation;
use crate::session::EditSession;

/// What is being dragged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DragSource {
    /// An existing node
    Tree { node_id: NodeId },

    /// A new node from the component palette
    Palette {
        component: String,
        #[serde(default)]
        props: Props,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    Before,
    After,
    Inside,
}

/// A resolved drop location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropTarget {
    /// Node under the pointer
    pub hovered: NodeId,

    /// Position as requested by the pointer
    pub position: DropPosition,

    pub parent_id: NodeId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { source: DragSource },
    Hovering { source: DragSource, target: DropTarget },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DragRejection {
    #[error("No drag in progress")]
    NotDragging,

    #[error("Node {0} is locked")]
    Locked(NodeId),

    #[error("The root node cannot be dragged")]
    Root,

    #[error("Node {0} has an unregistered type")]
    Placeholder(NodeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown component type: {0}")]
    UnknownComponent(String),

    #[error("Invalid drop target: {0}")]
    Structural(#[from] StructuralError),

    #[error("Drop failed: {0}")]
    Tree(TreeError),
}

impl From<TreeError> for DragRejection {
    fn from(error: TreeError) -> Self {
        match error {
            TreeError::Structural(e) => DragRejection::Structural(e),
            other => DragRejection::Tree(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragOutcome {
    Moved {
        node_id: NodeId,
        parent_id: NodeId,
        index: usize,
    },
    Created {
        node_id: NodeId,
    },

    /// Released outside any valid target
    Cancelled,
}

#[derive(Debug, Default)]
pub struct DragManager {
    state: DragState,

    /// Most recent rejection, cleared when a new drag starts
    last_rejection: Option<DragRejection>,
}

impl DragManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, DragState::Idle)
    }

    pub fn source(&self) -> Option<&DragSource> {
        match &self.state {
            DragState::Idle => None,
            DragState::Dragging { source } | DragState::Hovering { source, .. } => Some(source),
        }
    }

    pub fn target(&self) -> Option<&DropTarget> {
        match &self.state {
            DragState::Hovering { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn last_rejection(&self) -> Option<&DragRejection> {
        self.last_rejection.as_ref()
    }

    /// Begin dragging `source`. An earlier drag still in progress is cancelled.
    pub fn start_drag(
        &mut self,
        session: &EditSession,
        source: DragSource,
    ) -> Result<(), DragRejection> {
        if self.is_active() {
            self.cancel();
        }
        self.last_rejection = None;

        let checked = check_source(session.document().tree(), session.registry(), &source);
        if let Err(rejection) = checked {
            return Err(self.reject(rejection));
        }

        debug!(session = %session.id, ?source, "drag started");
        self.state = DragState::Dragging { source };
        Ok(())
    }

    /// Update the pointer position. An invalid target leaves the drag in
    /// `Dragging` so the pointer can move on.
    pub fn hover(
        &mut self,
        session: &EditSession,
        hovered: &str,
        position: DropPosition,
    ) -> Result<&DropTarget, DragRejection> {
        let source = match std::mem::take(&mut self.state) {
            DragState::Idle => return Err(self.reject(DragRejection::NotDragging)),
            DragState::Dragging { source } | DragState::Hovering { source, .. } => source,
        };

        let resolved = resolve_target(
            session.document().tree(),
            session.registry(),
            &source,
            hovered,
            position,
        );
        match resolved {
            Ok(target) => {
                debug!(
                    session = %session.id,
                    hovered,
                    ?position,
                    parent = %target.parent_id,
                    index = target.index,
                    "drag hover"
                );
                self.state = DragState::Hovering { source, target };
                match &self.state {
                    DragState::Hovering { target, .. } => Ok(target),
                    _ => Err(DragRejection::NotDragging),
                }
            }
            Err(rejection) => {
                debug!(session = %session.id, hovered, error = %rejection, "drag hover rejected");
                self.state = DragState::Dragging { source };
                Err(self.reject(rejection))
            }
        }
    }

    /// Pointer left the current target
    pub fn leave(&mut self) {
        self.state = match std::mem::take(&mut self.state) {
            DragState::Hovering { source, .. } => DragState::Dragging { source },
            other => other,
        };
    }

    /// Release the pointer and commit the move or insert.
    ///
    /// The target is resolved again against the current tree. Whatever the
    /// result, the manager returns to `Idle`; a rejection leaves the tree
    /// untouched.
    pub fn commit(&mut self, session: &mut EditSession) -> Result<DragOutcome, DragRejection> {
        let (source, target) = match std::mem::take(&mut self.state) {
            DragState::Idle => return Err(self.reject(DragRejection::NotDragging)),
            DragState::Dragging { .. } => {
                debug!(session = %session.id, "drag released outside a target");
                return Ok(DragOutcome::Cancelled);
            }
            DragState::Hovering { source, target } => (source, target),
        };

        let tree = session.document().tree();
        let resolved = check_source(tree, session.registry(), &source).and_then(|_| {
            resolve_target(tree, session.registry(), &source, &target.hovered, target.position)
        });
        let target = match resolved {
            Ok(target) => target,
            Err(rejection) => return Err(self.reject(rejection)),
        };

        let mutation = match &source {
            DragSource::Tree { node_id } => Mutation::MoveNode {
                node_id: node_id.clone(),
                new_parent_id: target.parent_id.clone(),
                index: target.index,
            },
            DragSource::Palette { component, props } => Mutation::CreateNode {
                component: component.clone(),
                props: props.clone(),
                parent_id: target.parent_id.clone(),
                index: target.index,
            },
        };

        let result = match session.apply(mutation) {
            Ok(result) => result,
            Err(e) => return Err(self.reject(e.into())),
        };

        let outcome = match (source, result.created) {
            (_, Some(node_id)) => DragOutcome::Created { node_id },
            (DragSource::Tree { node_id }, None) => DragOutcome::Moved {
                node_id,
                parent_id: target.parent_id,
                index: target.index,
            },
            (DragSource::Palette { component, .. }, None) => {
                return Err(self.reject(DragRejection::UnknownComponent(component)))
            }
        };
        debug!(session = %session.id, ?outcome, "drag committed");
        Ok(outcome)
    }

    /// Discard the drag. Returns whether one was in progress.
    pub fn cancel(&mut self) -> bool {
        let was_active = self.is_active();
        if was_active {
            debug!("drag cancelled");
        }
        self.state = DragState::Idle;
        was_active
    }

    fn reject(&mut self, rejection: DragRejection) -> DragRejection {
        self.last_rejection = Some(rejection.clone());
        rejection
    }
}

fn accepts_children(registry: &ComponentRegistry, node: &Node) -> bool {
    node.canvas && registry.contains(&node.component)
}

fn check_source(
    tree: &NodeTree,
    registry: &ComponentRegistry,
    source: &DragSource,
) -> Result<(), DragRejection> {
    match source {
        DragSource::Tree { node_id } => {
            let node = tree
                .get(node_id)
                .ok_or_else(|| DragRejection::UnknownNode(node_id.clone()))?;
            if node.is_root() {
                return Err(DragRejection::Root);
            }
            if node.locked {
                return Err(DragRejection::Locked(node_id.clone()));
            }
            if registry.is_placeholder(&node.component) {
                return Err(DragRejection::Placeholder(node_id.clone()));
            }
            Ok(())
        }
        DragSource::Palette { component, .. } => {
            if registry.contains(component) {
                Ok(())
            } else {
                Err(DragRejection::UnknownComponent(component.clone()))
            }
        }
    }
}

fn resolve_target(
    tree: &NodeTree,
    registry: &ComponentRegistry,
    source: &DragSource,
    hovered: &str,
    position: DropPosition,
) -> Result<DropTarget, DragRejection> {
    let node = tree
        .get(hovered)
        .ok_or_else(|| DragRejection::UnknownNode(hovered.to_string()))?;

    let effective = if node.is_root() {
        if !accepts_children(registry, node) {
            return Err(StructuralError::NotCanvas(hovered.to_string()).into());
        }
        DropPosition::Inside
    } else if position == DropPosition::Inside && !accepts_children(registry, node) {
        DropPosition::After
    } else {
        position
    };

    let (parent_id, mut index) = match effective {
        DropPosition::Inside => (hovered.to_string(), tree.children(hovered).len()),
        DropPosition::Before | DropPosition::After => {
            let (parent_id, anchor_index) = nearest_canvas_slot(tree, registry, hovered)?;
            let offset = usize::from(effective == DropPosition::After);
            (parent_id, anchor_index + offset)
        }
    };

    if let DragSource::Tree { node_id } = source {
        if tree.is_ancestor_or_self(node_id, &parent_id) {
            return Err(StructuralError::Cycle {
                node_id: node_id.clone(),
                target_id: parent_id,
            }
            .into());
        }
        if tree.parent_of(node_id) == Some(parent_id.as_str()) {
            if let Some(current) = tree.index_in_parent(node_id) {
                if current < index {
                    index -= 1;
                }
            }
        }
    }

    Ok(DropTarget {
        hovered: hovered.to_string(),
        position,
        parent_id,
        index,
    })
}

/// Parent that accepts children and the index of the branch holding `id`
fn nearest_canvas_slot(
    tree: &NodeTree,
    registry: &ComponentRegistry,
    id: &str,
) -> Result<(NodeId, usize), DragRejection> {
    let mut anchor = id;
    while let Some(parent_id) = tree.parent_of(anchor) {
        let accepts = tree
            .get(parent_id)
            .is_some_and(|parent| accepts_children(registry, parent));
        if accepts {
            let index = tree.index_in_parent(anchor).unwrap_or(0);
            return Ok((parent_id.to_string(), index));
        }
        anchor = parent_id;
    }
    Err(StructuralError::NotCanvas(id.to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecraft_document::Document;
    use std::sync::Arc;

    /// root ─┬─ a (Text)
    ///       ├─ box (Container) ── inner (Text)
    ///       └─ b (Button)
    fn fixture() -> (EditSession, [String; 4]) {
        let registry = Arc::new(ComponentRegistry::builtin());
        let document = Document::new(&registry, "Container", &Props::new()).unwrap();
        let mut session = EditSession::new("drag", document, registry);
        let root = session.document().tree().root_id().to_string();

        let mut create = |component: &str, parent: &str| {
            session
                .apply(Mutation::CreateNode {
                    component: component.into(),
                    props: Props::new(),
                    parent_id: parent.to_string(),
                    index: usize::MAX,
                })
                .unwrap()
                .created
                .unwrap()
        };
        let a = create("Text", &root);
        let container = create("Container", &root);
        let inner = create("Text", &container);
        let b = create("Button", &root);
        (session, [a, container, inner, b])
    }

    fn tree_source(id: &str) -> DragSource {
        DragSource::Tree { node_id: id.to_string() }
    }

    #[test]
    fn test_start_drag_does_not_mutate() {
        let (session, [a, ..]) = fixture();
        let before = session.snapshot();
        let mut drag = DragManager::new();

        drag.start_drag(&session, tree_source(&a)).unwrap();
        assert!(drag.is_active());
        assert_eq!(session.snapshot(), before);
        assert_eq!(session.history().undo_levels(), 4);
    }

    #[test]
    fn test_inside_leaf_becomes_after() {
        let (session, [a, container, inner, b]) = fixture();
        let mut drag = DragManager::new();
        drag.start_drag(&session, tree_source(&b)).unwrap();

        let target = drag.hover(&session, &inner, DropPosition::Inside).unwrap();
        assert_eq!(target.parent_id, container);
        assert_eq!(target.index, 1);

        let target = drag.hover(&session, &a, DropPosition::Inside).unwrap().clone();
        let root = session.document().tree().root_id().to_string();
        assert_eq!(target.parent_id, root);
        assert_eq!(target.index, 1);
    }

    #[test]
    fn test_root_edges_become_inside() {
        let (session, [a, ..]) = fixture();
        let root = session.document().tree().root_id().to_string();
        let mut drag = DragManager::new();
        drag.start_drag(&session, tree_source(&a)).unwrap();

        let target = drag.hover(&session, &root, DropPosition::Before).unwrap();
        assert_eq!(target.parent_id, root);
        // Appended after removal of `a`: [box, b, a]
        assert_eq!(target.index, 2);
    }

    #[test]
    fn test_same_parent_index_adjusts_for_removal() {
        let (mut session, [a, container, _, b]) = fixture();
        let mut drag = DragManager::new();
        drag.start_drag(&session, tree_source(&a)).unwrap();
        drag.hover(&session, &b, DropPosition::Before).unwrap();

        let outcome = drag.commit(&mut session).unwrap();
        let root = session.document().tree().root_id().to_string();
        assert_eq!(
            outcome,
            DragOutcome::Moved { node_id: a.clone(), parent_id: root.clone(), index: 1 }
        );
        assert_eq!(session.document().tree().children(&root), &[container, a, b]);
        assert!(!drag.is_active());
    }

    #[test]
    fn test_hover_own_subtree_is_rejected() {
        let (session, [_, container, inner, _]) = fixture();
        let mut drag = DragManager::new();
        drag.start_drag(&session, tree_source(&container)).unwrap();

        let err = drag.hover(&session, &inner, DropPosition::Before).unwrap_err();
        assert!(matches!(err, DragRejection::Structural(StructuralError::Cycle { .. })));
        assert!(matches!(drag.state(), DragState::Dragging { .. }));
        assert_eq!(drag.last_rejection(), Some(&err));
    }

    #[test]
    fn test_locked_and_root_sources_rejected() {
        let (mut session, [a, ..]) = fixture();
        let root = session.document().tree().root_id().to_string();
        session
            .apply(Mutation::SetLocked { node_id: a.clone(), locked: true })
            .unwrap();
        let mut drag = DragManager::new();

        assert_eq!(drag.start_drag(&session, tree_source(&a)), Err(DragRejection::Locked(a)));
        assert_eq!(drag.start_drag(&session, tree_source(&root)), Err(DragRejection::Root));
        assert!(!drag.is_active());
    }

    #[test]
    fn test_palette_drop_creates_node() {
        let (mut session, [_, container, ..]) = fixture();
        let mut drag = DragManager::new();
        drag.start_drag(
            &session,
            DragSource::Palette { component: "Button".into(), props: Props::new() },
        )
        .unwrap();
        drag.hover(&session, &container, DropPosition::Inside).unwrap();

        let DragOutcome::Created { node_id } = drag.commit(&mut session).unwrap() else {
            panic!("expected a created node");
        };
        assert_eq!(session.document().tree().parent_of(&node_id), Some(container.as_str()));
        assert_eq!(session.history().undo_description(), Some("Add Button"));
    }

    #[test]
    fn test_unknown_palette_type_rejected() {
        let (session, _) = fixture();
        let mut drag = DragManager::new();
        let err = drag
            .start_drag(
                &session,
                DragSource::Palette { component: "Carousel".into(), props: Props::new() },
            )
            .unwrap_err();
        assert_eq!(err, DragRejection::UnknownComponent("Carousel".into()));
    }

    #[test]
    fn test_release_without_target_cancels() {
        let (mut session, [a, ..]) = fixture();
        let before = session.snapshot();
        let mut drag = DragManager::new();
        drag.start_drag(&session, tree_source(&a)).unwrap();
        drag.leave();

        assert_eq!(drag.commit(&mut session).unwrap(), DragOutcome::Cancelled);
        assert_eq!(session.snapshot(), before);
    }

    #[test]
    fn test_cancel_discards_hover() {
        let (session, [a, _, _, b]) = fixture();
        let mut drag = DragManager::new();
        drag.start_drag(&session, tree_source(&a)).unwrap();
        drag.hover(&session, &b, DropPosition::After).unwrap();

        assert!(drag.cancel());
        assert!(drag.target().is_none());
        assert!(!drag.cancel());
    }

    #[test]
    fn test_drop_when_idle_is_rejected() {
        let (mut session, _) = fixture();
        let mut drag = DragManager::new();
        assert_eq!(drag.commit(&mut session), Err(DragRejection::NotDragging));
    }
}
