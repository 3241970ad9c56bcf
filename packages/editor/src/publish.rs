//! # Publish Pipeline
//!
//! ```text
//! prepare ──→ version check ──→ put_if_version ──→ invalidate
//!   │              │                  │                 │
//!   ▼              ▼                  ▼                 ▼
//! Validation    Conflict        Persistence       reported, retried
//! (fix)         (reload)        (after retries)   in the background
//! ```
//!
//! Validation is synchronous and runs before anything is sent. The stored
//! version must match the caller's expected version; otherwise nothing is
//! written. A successful write is final: invalidation failures are reported
//! on the receipt and retried without touching the stored document.

use pagecraft_document::{
    etag, serialize, ComponentRegistry, Document, SerializedDocument, UnknownComponent, Violation,
};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{EditorConfig, InvalidationConfig, PublishConfig, RetryPolicy};
use crate::invalidation::{spawn_retry, CacheInvalidator, InvalidationError, InvalidationSignal};
use crate::storage::{DocumentStore, PageKey, StoreError};

/// Reason a document cannot be published as is
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PublishProblem {
    Structure { violation: Violation },
    UnknownComponent { unknown: UnknownComponent },
}

impl fmt::Display for PublishProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishProblem::Structure { violation } => write!(f, "{violation}"),
            PublishProblem::UnknownComponent { unknown } => write!(
                f,
                "{} uses unregistered component {}",
                unknown.node_id, unknown.component
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Document failed validation with {} problem(s)", .problems.len())]
    Validation { problems: Vec<PublishProblem> },

    #[error("Version conflict: expected {expected}, stored {actual}; reload before publishing")]
    Conflict { expected: u64, actual: u64 },

    #[error("Persistence failed after {attempts} attempt(s): {source}")]
    Persistence {
        attempts: u32,
        #[source]
        source: StoreError,
    },

    #[error("Serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PublishError {
    /// Another session published first; reload the latest version
    pub fn requires_reload(&self) -> bool {
        matches!(self, PublishError::Conflict { .. })
    }

    /// The document itself must be fixed before retrying
    pub fn requires_fix(&self) -> bool {
        matches!(self, PublishError::Validation { .. })
    }
}

#[derive(Debug)]
pub enum InvalidationStatus {
    Delivered,

    /// First signal failed; `retry` resolves once the background retries end
    Failed {
        error: InvalidationError,
        retry: JoinHandle<Result<u32, InvalidationError>>,
    },
}

impl InvalidationStatus {
    pub fn is_delivered(&self) -> bool {
        matches!(self, InvalidationStatus::Delivered)
    }
}

#[derive(Debug)]
pub struct PublishReceipt {
    pub page: PageKey,
    pub version: u64,
    pub etag: String,
    pub invalidation: InvalidationStatus,
}

pub struct PublishPipeline {
    store: Arc<dyn DocumentStore>,
    invalidator: Arc<dyn CacheInvalidator>,
    registry: Arc<ComponentRegistry>,
    publish_retry: RetryPolicy,
    invalidation_retry: RetryPolicy,
}

impl PublishPipeline {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        invalidator: Arc<dyn CacheInvalidator>,
        registry: Arc<ComponentRegistry>,
    ) -> Self {
        Self {
            store,
            invalidator,
            registry,
            publish_retry: PublishConfig::default().retry(),
            invalidation_retry: InvalidationConfig::default().retry(),
        }
    }

    pub fn with_config(mut self, config: &EditorConfig) -> Self {
        self.publish_retry = config.publish.retry();
        self.invalidation_retry = config.invalidation.retry();
        self
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Validate the whole tree and produce the payload to persist
    pub fn prepare(&self, document: &Document) -> Result<SerializedDocument, PublishError> {
        let tree = document.tree();
        let mut problems: Vec<PublishProblem> = tree
            .check()
            .into_iter()
            .map(|violation| PublishProblem::Structure { violation })
            .collect();
        problems.extend(
            tree.nodes()
                .filter(|node| self.registry.is_placeholder(&node.component))
                .map(|node| PublishProblem::UnknownComponent {
                    unknown: UnknownComponent {
                        node_id: node.id.clone(),
                        component: node.component.clone(),
                    },
                }),
        );

        if !problems.is_empty() {
            return Err(PublishError::Validation { problems });
        }
        Ok(serialize(document))
    }

    /// Validate, persist as `expected_version + 1`, then signal invalidation
    pub async fn publish(
        &self,
        page: &PageKey,
        document: &Document,
        expected_version: u64,
    ) -> Result<PublishReceipt, PublishError> {
        let payload = self.prepare(document)?;
        self.submit(page, payload, expected_version).await
    }

    /// Persist an already prepared payload
    pub async fn submit(
        &self,
        page: &PageKey,
        payload: SerializedDocument,
        expected_version: u64,
    ) -> Result<PublishReceipt, PublishError> {
        let actual = self
            .with_retry(page, "version check", || self.store.current_version(page))
            .await?;
        if actual != expected_version {
            warn!(%page, expected = expected_version, actual, "publish rejected: stale version");
            return Err(PublishError::Conflict {
                expected: expected_version,
                actual,
            });
        }

        // Nothing after the write may fail except invalidation.
        let mut stamped = payload;
        stamped.version = expected_version + 1;
        let tag = etag(&stamped)?;

        let stored = self
            .with_retry(page, "publish write", || {
                self.store.put_if_version(page, expected_version, stamped.clone())
            })
            .await?;
        info!(%page, version = stored.version, etag = %tag, "published");

        let signal = InvalidationSignal::new(page.clone(), stored.version, tag.clone());
        let invalidation = match self.invalidator.invalidate(&signal).await {
            Ok(()) => InvalidationStatus::Delivered,
            Err(error) => {
                warn!(%page, error = %error, "cache invalidation failed; retrying in background");
                let retry = spawn_retry(self.invalidator.clone(), signal, self.invalidation_retry);
                InvalidationStatus::Failed { error, retry }
            }
        };

        Ok(PublishReceipt {
            page: page.clone(),
            version: stored.version,
            etag: tag,
            invalidation,
        })
    }

    async fn with_retry<T, F, Fut>(
        &self,
        page: &PageKey,
        what: &str,
        mut call: F,
    ) -> Result<T, PublishError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let policy = self.publish_retry;
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(StoreError::VersionMismatch { expected, actual }) => {
                    // Lost a race with another publisher between check and write.
                    return Err(PublishError::Conflict { expected, actual });
                }
                Err(e) if e.is_retryable() && attempt < policy.retries => {
                    attempt += 1;
                    warn!(
                        error = %e,
                        %page,
                        attempt,
                        total = policy.retries,
                        "{what} failed; retrying"
                    );
                    tokio::time::sleep(policy.delay(attempt)).await;
                }
                Err(source) => {
                    return Err(PublishError::Persistence {
                        attempts: attempt + 1,
                        source,
                    })
                }
            }
        }
    }
}
