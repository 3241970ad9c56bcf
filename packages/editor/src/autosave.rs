//! Debounced draft autosave.
//!
//! A background worker owns the pending draft. Edits schedule the latest
//! serialized document without blocking; the worker writes it once edits
//! have been quiet for the debounce period. Failed writes are retried with
//! backoff, and a newer payload always replaces an older one.
//!
//! Drafts carry no version. Publishing is the only way to create one.

use pagecraft_document::SerializedDocument;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn, Instrument};

use crate::config::{AutosaveConfig, RetryPolicy};
use crate::errors::{EditorError, EditorResult};
use crate::storage::{DocumentStore, PageKey, StoreError};

/// Snapshot of the worker's progress
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutosaveStatus {
    /// Successful draft writes
    pub saves: u64,

    /// Failed write attempts, including ones later retried
    pub failures: u64,

    pub last_error: Option<String>,

    /// A payload is waiting to be written
    pub pending: bool,
}

enum Command {
    Schedule(SerializedDocument),
    Flush(oneshot::Sender<Result<(), StoreError>>),
    Shutdown(oneshot::Sender<Result<(), StoreError>>),
}

pub struct Autosaver;

impl Autosaver {
    /// Start the worker for `page` on the current tokio runtime
    pub fn spawn(
        store: Arc<dyn DocumentStore>,
        page: PageKey,
        config: AutosaveConfig,
    ) -> AutosaveHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(AutosaveStatus::default());

        info!(
            %page,
            debounce_ms = config.debounce_ms,
            retries = config.retries,
            retry_base_ms = config.retry_base_ms,
            "autosave worker configured"
        );

        let worker = Worker {
            store,
            page,
            debounce: config.debounce(),
            retry: config.retry(),
            status: status_tx,
            pending: None,
            deadline: None,
            attempt: 0,
        };
        // Worker logs stay inside the caller's span.
        let task = tokio::spawn(worker.run(rx).in_current_span());

        AutosaveHandle {
            tx,
            status: status_rx,
            task,
        }
    }
}

pub struct AutosaveHandle {
    tx: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<AutosaveStatus>,
    task: JoinHandle<()>,
}

impl AutosaveHandle {
    /// Queue `payload` as the latest draft. Never blocks.
    pub fn schedule(&self, payload: SerializedDocument) -> EditorResult<()> {
        self.tx
            .send(Command::Schedule(payload))
            .map_err(|_| EditorError::AutosaveStopped)
    }

    /// Write the pending draft now
    pub async fn flush(&self) -> EditorResult<()> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Flush(reply))
            .map_err(|_| EditorError::AutosaveStopped)?;
        done.await.map_err(|_| EditorError::AutosaveStopped)??;
        Ok(())
    }

    /// Flush, stop the worker, and return its final status
    pub async fn shutdown(self) -> EditorResult<AutosaveStatus> {
        let (reply, done) = oneshot::channel();
        self.tx
            .send(Command::Shutdown(reply))
            .map_err(|_| EditorError::AutosaveStopped)?;
        let flushed = done.await.map_err(|_| EditorError::AutosaveStopped)?;
        if self.task.await.is_err() {
            return Err(EditorError::AutosaveStopped);
        }
        flushed?;
        Ok(self.status.borrow().clone())
    }

    pub fn status(&self) -> AutosaveStatus {
        self.status.borrow().clone()
    }

    /// Wait until the status changes
    pub async fn changed(&mut self) -> EditorResult<AutosaveStatus> {
        self.status
            .changed()
            .await
            .map_err(|_| EditorError::AutosaveStopped)?;
        Ok(self.status.borrow_and_update().clone())
    }
}

struct Worker {
    store: Arc<dyn DocumentStore>,
    page: PageKey,
    debounce: Duration,
    retry: RetryPolicy,
    status: watch::Sender<AutosaveStatus>,

    pending: Option<SerializedDocument>,

    /// When the pending payload is due; `None` means wait for a command
    deadline: Option<Instant>,

    /// Retries spent on the current payload
    attempt: u32,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::Schedule(payload)) => self.schedule(payload),
                    Some(Command::Flush(reply)) => {
                        let result = self.flush().await;
                        let _ = reply.send(result);
                    }
                    Some(Command::Shutdown(reply)) => {
                        let result = self.flush().await;
                        let _ = reply.send(result);
                        break;
                    }
                    None => {
                        // Every handle is gone; last chance to save.
                        if let Err(e) = self.flush().await {
                            warn!(
                                error = %e,
                                page = %self.page,
                                "final autosave failed; draft dropped"
                            );
                        }
                        break;
                    }
                },
                _ = wait(self.deadline) => self.write_due().await,
            }
        }
        debug!(page = %self.page, "autosave worker stopped");
    }

    fn schedule(&mut self, payload: SerializedDocument) {
        if self.pending.is_some() {
            debug!(page = %self.page, "autosave payload superseded");
        }
        self.pending = Some(payload);
        self.attempt = 0;
        self.deadline = Some(Instant::now() + self.debounce);
        self.status.send_modify(|s| s.pending = true);
    }

    async fn write_due(&mut self) {
        self.deadline = None;
        let Err(e) = self.write().await else {
            return;
        };

        if e.is_retryable() && self.attempt < self.retry.retries {
            self.attempt += 1;
            let delay = self.retry.delay(self.attempt);
            warn!(
                error = %e,
                page = %self.page,
                attempt = self.attempt,
                total = self.retry.retries,
                delay_ms = delay.as_millis() as u64,
                "autosave failed; retrying"
            );
            self.deadline = Some(Instant::now() + delay);
        } else {
            // Kept pending: the next schedule or flush tries again.
            error!(
                error = %e,
                page = %self.page,
                attempts = self.attempt + 1,
                "autosave failed after retries"
            );
        }
    }

    async fn flush(&mut self) -> Result<(), StoreError> {
        self.deadline = None;
        self.write().await
    }

    async fn write(&mut self) -> Result<(), StoreError> {
        let Some(payload) = self.pending.clone() else {
            return Ok(());
        };

        match self.store.save_draft(&self.page, payload).await {
            Ok(()) => {
                self.pending = None;
                self.attempt = 0;
                self.status.send_modify(|s| {
                    s.saves += 1;
                    s.pending = false;
                    s.last_error = None;
                });
                info!(page = %self.page, "draft saved");
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                self.status.send_modify(|s| {
                    s.failures += 1;
                    s.last_error = Some(message);
                });
                Err(e)
            }
        }
    }
}

async fn wait(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pagecraft_document::{serialize, ComponentRegistry, Document, Props};
    use tracing_test::traced_test;

    fn payload(text: &str) -> SerializedDocument {
        let registry = ComponentRegistry::builtin();
        let mut doc = Document::new(&registry, "Container", &Props::new()).unwrap();
        let root = doc.tree().root_id().to_string();
        let props: Props = [("text".to_string(), serde_json::json!(text))].into_iter().collect();
        doc.create_node(&registry, "Text", &props, &root, 0).unwrap();
        serialize(&doc)
    }

    fn config() -> AutosaveConfig {
        AutosaveConfig {
            debounce_ms: 1000,
            retries: 2,
            retry_base_ms: 100,
            retry_max_ms: 1000,
        }
    }

    fn page() -> PageKey {
        PageKey::home("shop-1").unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_write() {
        let store = Arc::new(MemoryStore::new());
        let handle = Autosaver::spawn(store.clone(), page(), config());

        for text in ["a", "b", "c"] {
            handle.schedule(payload(text)).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(store.draft_count(), 0);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(store.draft_count(), 1);

        let draft = store.load_draft(&page()).await.unwrap().unwrap();
        assert_eq!(draft.document, payload("c"));
        assert!(!handle.status().pending);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_retry_with_backoff() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_drafts(2).await;
        let handle = Autosaver::spawn(store.clone(), page(), config());

        handle.schedule(payload("a")).unwrap();
        // debounce 1000, then retries after 100 and 200
        tokio::time::sleep(Duration::from_millis(1350)).await;

        let status = handle.status();
        assert_eq!(store.draft_count(), 1);
        assert_eq!(status.failures, 2);
        assert_eq!(status.saves, 1);
        assert_eq!(status.last_error, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_but_keeps_payload() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_drafts(3).await;
        let handle = Autosaver::spawn(store.clone(), page(), config());

        handle.schedule(payload("a")).unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let status = handle.status();
        assert_eq!(status.failures, 3);
        assert!(status.pending);
        assert!(status.last_error.is_some());

        handle.flush().await.unwrap();
        assert_eq!(store.draft_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let store = Arc::new(MemoryStore::new());
        let handle = Autosaver::spawn(store.clone(), page(), config());

        handle.schedule(payload("a")).unwrap();
        handle.flush().await.unwrap();
        assert_eq!(store.draft_count(), 1);

        // Nothing pending: the debounce timer no longer fires a write.
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.draft_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_saves_pending_draft() {
        let store = Arc::new(MemoryStore::new());
        let handle = Autosaver::spawn(store.clone(), page(), config());
        handle.schedule(payload("a")).unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(store.draft_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_dropped_handle_logs_failed_final_save() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next_drafts(1).await;
        let handle = Autosaver::spawn(store.clone(), page(), config());
        handle.schedule(payload("a")).unwrap();
        drop(handle);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.draft_count(), 0);
        assert!(logs_contain("final autosave failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending() {
        let store = Arc::new(MemoryStore::new());
        let handle = Autosaver::spawn(store.clone(), page(), config());

        handle.schedule(payload("last")).unwrap();
        let status = handle.shutdown().await.unwrap();

        assert_eq!(status.saves, 1);
        assert_eq!(store.draft_count(), 1);
    }
}
