//! # Edit Session Management
//!
//! An EditSession is one user's editing context: the document, the shared
//! component registry, and the undo history. Every user action goes through
//! the session, so a committed mutation is always recorded in history.
//!
//! There is no ambient editor state. Anything that needs the document gets
//! the session (or the document) by reference.

use pagecraft_document::{
    render, serialize, Breakpoint, ComponentRegistry, Document, IdGenerator, Props,
    RenderInstruction, RenderOptions, SerializedDocument, TreeResult,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EditorConfig;
use crate::mutations::{Mutation, MutationResult};
use crate::publish::{PublishError, PublishPipeline, PublishReceipt};
use crate::storage::PageKey;
use crate::undo_stack::UndoStack;

pub struct EditSession {
    /// Unique session identifier
    pub id: String,

    document: Document,
    registry: Arc<ComponentRegistry>,
    history: UndoStack,

    /// Bumped on every change to the tree, including undo and redo
    revision: u64,
    saved_revision: u64,
}

impl EditSession {
    pub fn new(
        id: impl Into<String>,
        document: Document,
        registry: Arc<ComponentRegistry>,
    ) -> Self {
        Self::with_history(id, document, registry, UndoStack::new())
    }

    pub fn with_config(
        id: impl Into<String>,
        document: Document,
        registry: Arc<ComponentRegistry>,
        config: &EditorConfig,
    ) -> Self {
        Self::with_history(id, document, registry, UndoStack::with_max_levels(config.history_limit))
    }

    fn with_history(
        id: impl Into<String>,
        document: Document,
        registry: Arc<ComponentRegistry>,
        history: UndoStack,
    ) -> Self {
        Self {
            id: id.into(),
            document,
            registry,
            history,
            revision: 0,
            saved_revision: 0,
        }
    }

    /// Seed new node ids from the page key
    pub fn for_page(mut self, page: &PageKey) -> Self {
        self.document.set_id_generator(IdGenerator::new(&page.to_string()));
        self
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn history(&self) -> &UndoStack {
        &self.history
    }

    /// Apply a mutation and record it for undo
    pub fn apply(&mut self, mutation: Mutation) -> TreeResult<MutationResult> {
        let result = match mutation.apply(&mut self.document, &self.registry) {
            Ok(result) => result,
            Err(e) => {
                debug!(
                    session = %self.id,
                    mutation = mutation.name(),
                    error = %e,
                    "mutation rejected"
                );
                return Err(e);
            }
        };

        for warning in &result.warnings {
            warn!(session = %self.id, %warning, "property warning");
        }

        if !result.change.is_noop() {
            self.history.record(result.change.clone(), Some(mutation.describe()));
            self.revision += 1;
        }
        debug!(
            session = %self.id,
            mutation = mutation.name(),
            target = mutation.target(),
            revision = self.revision,
            "mutation applied"
        );

        Ok(result)
    }

    /// Group the following mutations into one undo step
    pub fn begin_batch(&mut self, description: Option<String>) {
        self.history.begin_batch();
        if let Some(description) = description {
            self.history.set_batch_description(description);
        }
    }

    pub fn end_batch(&mut self) {
        self.history.end_batch();
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.history.undo(&mut self.document);
        if undone {
            self.revision += 1;
        }
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.history.redo(&mut self.document);
        if redone {
            self.revision += 1;
        }
        redone
    }

    pub fn select(&mut self, node_id: &str) -> TreeResult<()> {
        self.document.select(node_id)
    }

    pub fn clear_selection(&mut self) {
        self.document.clear_selection();
    }

    pub fn selected(&self) -> Option<&str> {
        self.document.selected_node_id.as_deref()
    }

    pub fn set_breakpoint(&mut self, breakpoint: Breakpoint) {
        self.document.set_active_breakpoint(breakpoint);
    }

    pub fn breakpoint(&self) -> Breakpoint {
        self.document.active_breakpoint
    }

    /// Effective props at the active breakpoint
    pub fn effective_props(&self, node_id: &str) -> TreeResult<Props> {
        self.document.effective_props(node_id, self.breakpoint())
    }

    /// Render instructions at the active breakpoint
    pub fn render(&self, options: RenderOptions) -> Vec<RenderInstruction> {
        render(self.document.tree(), &self.registry, self.breakpoint(), options)
    }

    pub fn snapshot(&self) -> SerializedDocument {
        serialize(&self.document)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Changes exist that were not yet marked saved
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn mark_saved(&mut self) {
        self.saved_revision = self.revision;
    }

    /// Publish against the version this session loaded.
    ///
    /// On `Conflict` the local document is kept so edits can be reapplied
    /// after a reload.
    pub async fn publish(
        &mut self,
        pipeline: &PublishPipeline,
        page: &PageKey,
    ) -> Result<PublishReceipt, PublishError> {
        let receipt = pipeline
            .publish(page, &self.document, self.document.version())
            .await?;

        self.document.mark_published(receipt.version);
        self.mark_saved();
        info!(session = %self.id, %page, version = receipt.version, "session published");
        Ok(receipt)
    }

    /// Swap in a freshly loaded document, dropping history.
    ///
    /// Returns the replaced document.
    pub fn reload(&mut self, document: Document) -> Document {
        self.history.clear();
        self.revision += 1;
        self.saved_revision = self.revision;
        std::mem::replace(&mut self.document, document)
    }
}
