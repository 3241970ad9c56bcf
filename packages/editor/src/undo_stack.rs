//! # History
//!
//! Bounded page-edit history with undo and redo.
//!
//! ## Design
//!
//! - Each committed mutation is recorded as a [`Change`]: before/after
//!   snapshots of only the nodes it touched
//! - Undo restores `before` and moves the entry to the redo stack
//! - Redo restores `after`
//! - Recording a fresh change discards the redo tail
//! - A batch folds several changes into one step
//! - Bounded: the oldest entry is dropped once `max_levels` is exceeded
//!
//! ## Example
//!
//! ```rust
//! use pagecraft_document::{ComponentRegistry, Document, Props};
//! use pagecraft_editor::UndoStack;
//!
//! let registry = ComponentRegistry::builtin();
//! let mut doc = Document::new(&registry, "Container", &Props::new()).unwrap();
//! let root = doc.tree().root_id().to_string();
//! let mut stack = UndoStack::new();
//!
//! let edit = doc.create_node(&registry, "Text", &Props::new(), &root, 0).unwrap();
//! stack.record(edit.change, Some("Add Text".into()));
//!
//! assert!(stack.undo(&mut doc));
//! assert!(doc.tree().children(&root).is_empty());
//! assert!(stack.redo(&mut doc));
//! assert_eq!(doc.tree().children(&root).len(), 1);
//! ```

use pagecraft_document::{Change, Document};

/// One undo step
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub change: Change,

    /// Optional description of this step
    pub description: Option<String>,
}

/// Undo/redo stack for page editing
#[derive(Debug)]
pub struct UndoStack {
    /// Stack of applied changes (most recent last)
    undo_stack: Vec<HistoryEntry>,

    /// Stack of undone changes (most recent last)
    redo_stack: Vec<HistoryEntry>,

    /// Step limit; 0 keeps everything
    max_levels: usize,

    /// Open batch, if any
    current_batch: Option<Batch>,
}

#[derive(Debug, Default)]
struct Batch {
    change: Option<Change>,
    description: Option<String>,
}

impl UndoStack {
    /// History capped at 100 steps
    pub fn new() -> Self {
        Self::with_max_levels(100)
    }

    /// History capped at `max_levels` steps
    pub fn with_max_levels(max_levels: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_levels,
            current_batch: None,
        }
    }

    /// Record a committed change
    pub fn record(&mut self, change: Change, description: Option<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.change = Some(match batch.change.take() {
                Some(earlier) => earlier.merge(change),
                None => change,
            });
            if batch.description.is_none() {
                batch.description = description;
            }
            return;
        }

        self.push_entry(HistoryEntry { change, description });
    }

    /// Start a batch of changes (will be undone/redone together).
    ///
    /// An open batch is closed first.
    pub fn begin_batch(&mut self) {
        self.end_batch();
        self.current_batch = Some(Batch::default());
    }

    /// End the current batch and push it to the undo stack
    pub fn end_batch(&mut self) {
        if let Some(batch) = self.current_batch.take() {
            if let Some(change) = batch.change {
                if !change.is_noop() {
                    self.push_entry(HistoryEntry {
                        change,
                        description: batch.description,
                    });
                }
            }
        }
    }

    /// Label the open batch; ignored outside a batch
    pub fn set_batch_description(&mut self, description: impl Into<String>) {
        if let Some(batch) = &mut self.current_batch {
            batch.description = Some(description.into());
        }
    }

    pub fn is_batching(&self) -> bool {
        self.current_batch.is_some()
    }

    fn push_entry(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);

        // Over the cap: drop the oldest step
        if self.max_levels > 0 && self.undo_stack.len() > self.max_levels {
            self.undo_stack.remove(0);
        }

        // New action invalidates the redo tail
        self.redo_stack.clear();
    }

    /// Undo the most recent step; `false` when there is nothing to undo
    pub fn undo(&mut self, doc: &mut Document) -> bool {
        self.end_batch();

        let Some(entry) = self.undo_stack.pop() else {
            return false;
        };
        doc.apply_snapshot(&entry.change.before);
        self.redo_stack.push(entry);
        true
    }

    /// Redo the most recently undone step; `false` when there is nothing to redo
    pub fn redo(&mut self, doc: &mut Document) -> bool {
        self.end_batch();

        let Some(entry) = self.redo_stack.pop() else {
            return false;
        };
        doc.apply_snapshot(&entry.change.after);
        self.undo_stack.push(entry);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn max_levels(&self) -> usize {
        self.max_levels
    }

    /// Forget both stacks
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.current_batch = None;
    }

    /// Label of the step `undo` would revert
    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }

    /// Label of the step `redo` would reapply
    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack
            .last()
            .and_then(|entry| entry.description.as_deref())
    }
}

impl Default for UndoStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecraft_document::{Breakpoint, ComponentRegistry, Props};
    use serde_json::json;

    fn setup() -> (ComponentRegistry, Document, String) {
        let registry = ComponentRegistry::builtin();
        let doc = Document::new(&registry, "Container", &Props::new()).unwrap();
        let root = doc.tree().root_id().to_string();
        (registry, doc, root)
    }

    fn text_patch(text: &str) -> Props {
        [("text".to_string(), json!(text))].into_iter().collect()
    }

    #[test]
    fn test_undo_stack_creation() {
        let stack = UndoStack::new();
        assert_eq!(stack.undo_levels(), 0);
        assert_eq!(stack.redo_levels(), 0);
        assert!(!stack.can_undo());
        assert!(!stack.can_redo());
        assert_eq!(stack.max_levels(), 100);
    }

    #[test]
    fn test_undo_redo_on_empty_stack_is_noop() {
        let (_, mut doc, _) = setup();
        let before = doc.clone();
        let mut stack = UndoStack::new();

        assert!(!stack.undo(&mut doc));
        assert!(!stack.redo(&mut doc));
        assert_eq!(doc, before);
    }

    #[test]
    fn test_record_and_undo() {
        let (registry, mut doc, root) = setup();
        let mut stack = UndoStack::new();
        let original = doc.clone();

        let edit = doc.create_node(&registry, "Text", &Props::new(), &root, 0).unwrap();
        stack.record(edit.change, None);
        let created = doc.clone();

        assert!(stack.undo(&mut doc));
        assert_eq!(doc, original);
        assert_eq!(stack.redo_levels(), 1);

        assert!(stack.redo(&mut doc));
        assert_eq!(doc, created);
        assert_eq!(stack.undo_levels(), 1);
    }

    #[test]
    fn test_batched_changes() {
        let (registry, mut doc, root) = setup();
        let mut stack = UndoStack::new();
        let original = doc.clone();

        stack.begin_batch();
        stack.set_batch_description("Add greeting");

        let text = doc.create_node(&registry, "Text", &Props::new(), &root, 0).unwrap();
        stack.record(text.change, None);
        let edit = doc
            .update_props(&registry, &text.value, Breakpoint::Desktop, &text_patch("Hello"))
            .unwrap();
        stack.record(edit.change, None);

        stack.end_batch();

        assert_eq!(stack.undo_levels(), 1);
        assert_eq!(stack.undo_description(), Some("Add greeting"));

        stack.undo(&mut doc);
        assert_eq!(doc, original);
    }

    #[test]
    fn test_new_change_clears_redo() {
        let (registry, mut doc, root) = setup();
        let mut stack = UndoStack::new();
        let text = doc.create_node(&registry, "Text", &Props::new(), &root, 0).unwrap();
        stack.record(text.change, None);

        let edit = doc
            .update_props(&registry, &text.value, Breakpoint::Desktop, &text_patch("World"))
            .unwrap();
        stack.record(edit.change, None);
        stack.undo(&mut doc);
        assert_eq!(stack.redo_levels(), 1);

        let edit = doc
            .update_props(&registry, &text.value, Breakpoint::Desktop, &text_patch("Everyone"))
            .unwrap();
        stack.record(edit.change, None);

        assert_eq!(stack.redo_levels(), 0);
        assert!(!stack.redo(&mut doc));
    }

    #[test]
    fn test_max_levels_enforced() {
        let (registry, mut doc, root) = setup();
        let mut stack = UndoStack::with_max_levels(2);
        let text = doc.create_node(&registry, "Text", &Props::new(), &root, 0).unwrap().value;

        for i in 0..3 {
            let edit = doc
                .update_props(
                    &registry,
                    &text,
                    Breakpoint::Desktop,
                    &text_patch(&format!("Text {i}")),
                )
                .unwrap();
            stack.record(edit.change, Some(format!("edit {i}")));
        }

        assert_eq!(stack.undo_levels(), 2);
        stack.undo(&mut doc);
        stack.undo(&mut doc);
        assert!(!stack.can_undo());
        assert_eq!(doc.tree().get(&text).unwrap().base_props["text"], json!("Text 0"));
    }
}
