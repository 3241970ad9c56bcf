//! # Pagecraft Editor
//!
//! Editing engine for storefront pages.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ document: NodeTree, registry, serializer    │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ editor: one EditSession per user            │
//! │  - Mutations with validation                │
//! │  - Undo/redo history                        │
//! │  - Drag and drop state machine              │
//! └─────────────────────────────────────────────┘
//!                     ↓
//! ┌─────────────────────────────────────────────┐
//! │ persistence (async)                         │
//! │  - Debounced draft autosave                 │
//! │  - Publish with optimistic concurrency      │
//! │  - Cache invalidation signals               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **Edits are synchronous**: every mutation validates, then applies
//!    atomically, or leaves the document untouched
//! 2. **Persistence lags behind**: autosave and publish never block editing
//! 3. **Sessions do not merge**: the publish version check is the only
//!    guard between sessions, and the loser reloads
//!
//! ## Usage
//!
//! ```rust
//! use pagecraft_document::{ComponentRegistry, Document, Props};
//! use pagecraft_editor::{DragManager, DragSource, DropPosition, EditSession};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ComponentRegistry::builtin());
//! let document = Document::new(&registry, "Container", &Props::new()).unwrap();
//! let root = document.tree().root_id().to_string();
//! let mut session = EditSession::new("client-1", document, registry);
//!
//! let mut drag = DragManager::new();
//! drag.start_drag(&session, DragSource::Palette {
//!     component: "Text".into(),
//!     props: Props::new(),
//! }).unwrap();
//! drag.hover(&session, &root, DropPosition::Inside).unwrap();
//! drag.commit(&mut session).unwrap();
//!
//! assert_eq!(session.document().tree().children(&root).len(), 1);
//! assert!(session.undo());
//! assert!(session.document().tree().children(&root).is_empty());
//! ```

mod autosave;
mod config;
mod drag;
mod errors;
mod invalidation;
mod mutations;
mod publish;
mod session;
mod storage;
mod undo_stack;

pub use autosave::{AutosaveHandle, AutosaveStatus, Autosaver};
pub use config::{AutosaveConfig, EditorConfig, InvalidationConfig, PublishConfig, RetryPolicy};
pub use drag::{
    DragManager, DragOutcome, DragRejection, DragSource, DragState, DropPosition, DropTarget,
};
pub use errors::{EditorError, EditorResult};
pub use invalidation::{
    spawn_retry, CacheInvalidator, ChannelInvalidator, InvalidationError, InvalidationSignal,
    LogInvalidator,
};
pub use mutations::{Mutation, MutationResult};
pub use publish::{
    InvalidationStatus, PublishError, PublishPipeline, PublishProblem, PublishReceipt,
};
pub use session::EditSession;
pub use storage::{
    DocumentStore, FileStore, MemoryStore, PageKey, StoreError, StoredDocument, StoredDraft,
};
pub use undo_stack::{HistoryEntry, UndoStack};
