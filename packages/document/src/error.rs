//! Error types for the page document

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::node::{Breakpoint, NodeId};
use crate::validate::Violation;

/// Errors raised by tree operations.
///
/// Every operation validates before it mutates, so an `Err` always means
/// the tree is untouched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TreeError {
    #[error("Invalid parent: {0} does not exist or cannot contain children")]
    InvalidParent(NodeId),

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Node not found: {0}")]
    NotFound(NodeId),

    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("The root node cannot be deleted")]
    RootProtected,

    #[error("Unknown component type: {0}")]
    UnknownComponent(String),

    #[error("Node {0} has an unregistered type and can only be deleted")]
    PlaceholderReadOnly(NodeId),
}

/// Moves that would break the tree shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuralError {
    #[error("moving {node_id} under {target_id} would create a cycle")]
    Cycle { node_id: NodeId, target_id: NodeId },

    #[error("target {0} cannot contain children")]
    NotCanvas(NodeId),

    #[error("target {0} does not exist")]
    MissingTarget(NodeId),
}

pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown breakpoint: {0} (expected desktop, tablet, or mobile)")]
pub struct ParseBreakpointError(pub String);

/// Invariant violations found while loading a persisted document
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{}", describe_corruption(.violations, .reason))]
pub struct CorruptDocument {
    pub violations: Vec<Violation>,

    /// Set when repair was attempted but could not complete
    pub reason: Option<String>,
}

impl CorruptDocument {
    /// Every node id named by a violation, sorted and deduplicated
    pub fn node_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .violations
            .iter()
            .flat_map(|v| v.node_ids())
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

fn describe_corruption(violations: &[Violation], reason: &Option<String>) -> String {
    let mut ids: Vec<&str> = violations.iter().flat_map(|v| v.node_ids()).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut out = format!(
        "corrupt document: {} violation(s) involving nodes [{}]",
        violations.len(),
        ids.join(", ")
    );
    if let Some(reason) = reason {
        out.push_str("; repair failed: ");
        out.push_str(reason);
    }
    out
}

/// Errors converting between JSON and documents
#[derive(Error, Debug)]
pub enum SerializeError {
    #[error("Invalid document JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Corrupt(#[from] CorruptDocument),
}

/// Non-fatal property problems surfaced by `update_props` and `create_node`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ValidationWarning {
    /// Key is not part of the component's schema; the value was kept
    UnknownProp {
        node_id: NodeId,
        component: String,
        prop: String,
    },

    /// Value violated the schema; the prop was reset
    InvalidValue {
        node_id: NodeId,
        prop: String,
        expected: String,
        breakpoint: Breakpoint,
    },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationWarning::UnknownProp { node_id, component, prop } => {
                write!(f, "{node_id}: '{prop}' is not a {component} property")
            }
            ValidationWarning::InvalidValue { node_id, prop, expected, breakpoint } => write!(
                f,
                "{node_id}: '{prop}' at {breakpoint} must be {expected}; reset to default"
            ),
        }
    }
}
