//! # Serializer
//!
//! Converts between a [`Document`] and its persisted shape:
//!
//! ```json
//! {
//!   "version": 4,
//!   "root": "node-1",
//!   "nodes": {
//!     "node-1": {
//!       "type": "Container", "parentId": null, "childIds": ["node-2"],
//!       "canvas": true, "locked": false, "hidden": false,
//!       "baseProps": { "padding": "p-4" }, "overrides": { "mobile": { "padding": "p-2" } }
//!     }
//!   }
//! }
//! ```
//!
//! Loading always validates. [`RepairMode::Strict`] rejects any violation;
//! [`RepairMode::Repair`] rewrites the records and reports every change.
//! Session state (selection, active breakpoint) is never written.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::Document;
use crate::error::{CorruptDocument, SerializeError};
use crate::id_generator::crc32_hex;
use crate::node::{Node, NodeId, Overrides, Props};
use crate::registry::ComponentRegistry;
use crate::tree::NodeTree;
use crate::validate::{self, Repair};

/// Persisted form of a single node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    #[serde(rename = "type")]
    pub component: String,

    pub parent_id: Option<NodeId>,

    #[serde(default)]
    pub child_ids: Vec<NodeId>,

    #[serde(default)]
    pub canvas: bool,

    #[serde(default)]
    pub locked: bool,

    #[serde(default)]
    pub hidden: bool,

    #[serde(default)]
    pub base_props: Props,

    /// Keyed by breakpoint name; only `tablet` and `mobile` are valid
    #[serde(default)]
    pub overrides: BTreeMap<String, Props>,
}

/// Persisted form of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedDocument {
    pub version: u64,
    pub root: NodeId,
    pub nodes: BTreeMap<NodeId, NodeRecord>,
}

/// How to treat invariant violations on load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairMode {
    #[default]
    Strict,
    Repair,
}

/// A node whose type is not in the registry (loaded as a placeholder)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnknownComponent {
    pub node_id: NodeId,
    pub component: String,
}

/// Result of a successful load
#[derive(Debug, Clone)]
pub struct Loaded {
    pub document: Document,
    pub repairs: Vec<Repair>,
    pub unknown_components: Vec<UnknownComponent>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let mut overrides = BTreeMap::new();
        if let Some(tablet) = &node.overrides.tablet {
            overrides.insert("tablet".to_string(), tablet.clone());
        }
        if let Some(mobile) = &node.overrides.mobile {
            overrides.insert("mobile".to_string(), mobile.clone());
        }

        Self {
            component: node.component.clone(),
            parent_id: node.parent_id.clone(),
            child_ids: node.child_ids.clone(),
            canvas: node.canvas,
            locked: node.locked,
            hidden: node.hidden,
            base_props: node.base_props.clone(),
            overrides,
        }
    }
}

impl NodeRecord {
    fn into_node(mut self, id: NodeId) -> Node {
        let overrides = Overrides {
            tablet: self.overrides.remove("tablet"),
            mobile: self.overrides.remove("mobile"),
        };
        Node {
            id,
            component: self.component,
            parent_id: self.parent_id,
            child_ids: self.child_ids,
            canvas: self.canvas,
            base_props: self.base_props,
            overrides,
            locked: self.locked,
            hidden: self.hidden,
        }
    }
}

/// Records for every node of `tree`
pub fn node_records(tree: &NodeTree) -> BTreeMap<NodeId, NodeRecord> {
    tree.nodes()
        .map(|node| (node.id.clone(), NodeRecord::from(node)))
        .collect()
}

pub fn serialize(document: &Document) -> SerializedDocument {
    SerializedDocument {
        version: document.version(),
        root: document.tree().root_id().to_string(),
        nodes: node_records(document.tree()),
    }
}

pub fn to_json(document: &Document) -> Result<String, SerializeError> {
    Ok(serde_json::to_string_pretty(&serialize(document))?)
}

/// Rebuild a document, validating (and optionally repairing) the tree
pub fn deserialize(
    payload: SerializedDocument,
    registry: &ComponentRegistry,
    mode: RepairMode,
) -> Result<Loaded, CorruptDocument> {
    let SerializedDocument { version, root, nodes } = payload;

    let (records, repairs) = match mode {
        RepairMode::Strict => {
            let violations = validate::check(&root, &nodes);
            if !violations.is_empty() {
                return Err(CorruptDocument {
                    violations,
                    reason: None,
                });
            }
            (nodes, Vec::new())
        }
        RepairMode::Repair => validate::repair(&root, nodes)?,
    };

    let unknown_components: Vec<UnknownComponent> = records
        .iter()
        .filter(|(_, record)| registry.is_placeholder(&record.component))
        .map(|(id, record)| UnknownComponent {
            node_id: id.clone(),
            component: record.component.clone(),
        })
        .collect();
    for unknown in &unknown_components {
        tracing::warn!(
            node_id = %unknown.node_id,
            component = %unknown.component,
            "unregistered component loaded as placeholder"
        );
    }

    let nodes = records
        .into_iter()
        .map(|(id, record)| (id.clone(), record.into_node(id)))
        .collect();
    let tree = NodeTree::from_parts(root, nodes);

    Ok(Loaded {
        document: Document::with_version(tree, version),
        repairs,
        unknown_components,
    })
}

pub fn from_json(
    json: &str,
    registry: &ComponentRegistry,
    mode: RepairMode,
) -> Result<Loaded, SerializeError> {
    let payload: SerializedDocument = serde_json::from_str(json)?;
    Ok(deserialize(payload, registry, mode)?)
}

/// Content hash of a payload, used to key cache invalidation
pub fn etag(payload: &SerializedDocument) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_string(payload)?;
    Ok(crc32_hex(&bytes))
}
