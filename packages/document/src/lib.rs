//! # Pagecraft Document
//!
//! The page model behind the storefront page builder.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ registry: type name → defaults, schema,     │
//! │           canvas flag                       │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ tree / document: nodes + invariant-keeping  │
//! │  - create / move / delete / update props    │
//! │  - before/after snapshots for history       │
//! │  - selection + active breakpoint            │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌──────────────────────┐ ┌────────────────────┐
//! │ responsive + render: │ │ serializer +       │
//! │ effective props,     │ │ validate: JSON,    │
//! │ instruction list     │ │ check, repair      │
//! └──────────────────────┘ └────────────────────┘
//! ```
//!
//! ## Tree Invariants
//!
//! 1. One root with no parent; every other node has a parent
//! 2. `parent_id` and `child_ids` agree, each child listed exactly once
//! 3. No cycles
//! 4. Non-canvas nodes have no children
//! 5. Overrides exist only for tablet and mobile
//!
//! Every operation either keeps all five or fails without touching the tree.
//!
//! ## Usage
//!
//! ```rust
//! use pagecraft_document::{Breakpoint, ComponentRegistry, Document, Props};
//! use serde_json::json;
//!
//! let registry = ComponentRegistry::builtin();
//! let mut doc = Document::new(&registry, "Container", &Props::new()).unwrap();
//! let root = doc.tree().root_id().to_string();
//!
//! let text = doc
//!     .create_node(&registry, "Text", &Props::new(), &root, 0)
//!     .unwrap()
//!     .value;
//! let patch: Props = [("color".to_string(), json!("red"))].into_iter().collect();
//! doc.update_props(&registry, &text, Breakpoint::Tablet, &patch).unwrap();
//!
//! let mobile = doc.effective_props(&text, Breakpoint::Mobile).unwrap();
//! assert_eq!(mobile["color"], json!("red"));
//! ```

mod document;
mod error;
mod id_generator;
mod node;
mod registry;
mod render;
mod responsive;
mod serializer;
mod tree;
mod validate;

pub use document::Document;
pub use error::{
    CorruptDocument, ParseBreakpointError, SerializeError, StructuralError, TreeError, TreeResult,
    ValidationWarning,
};
pub use id_generator::{crc32_hex, IdGenerator};
pub use node::{Breakpoint, Node, NodeId, Overrides, Props, Viewport};
pub use registry::{ComponentDefinition, ComponentRegistry, PropKind};
pub use render::{render, RenderInstruction, RenderKind, RenderOptions};
pub use responsive::{effective_props, effective_value, value_source};
pub use serializer::{
    deserialize, etag, from_json, node_records, serialize, to_json, Loaded, NodeRecord, RepairMode,
    SerializedDocument, UnknownComponent,
};
pub use tree::{Change, Edit, NodeTree, Snapshot};
pub use validate::{check, repair, Repair, Violation, OVERRIDE_BUCKETS};
