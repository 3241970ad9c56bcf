//! Cache invalidation signals sent to the delivery layer after publish.
//!
//! The published write is the source of truth. A failed signal never rolls
//! it back; it is retried in the background with backoff instead.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::RetryPolicy;
use crate::storage::PageKey;

/// "Page `page` now renders version `version`"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationSignal {
    pub page: PageKey,
    pub version: u64,

    /// Content hash of the published payload
    pub etag: String,

    pub issued_at: DateTime<Utc>,
}

impl InvalidationSignal {
    pub fn new(page: PageKey, version: u64, etag: impl Into<String>) -> Self {
        Self {
            page,
            version,
            etag: etag.into(),
            issued_at: Utc::now(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum InvalidationError {
    #[error("Invalidation endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("No subscribers for {0}")]
    NoSubscribers(String),

    #[error("Gave up invalidating {page} after {attempts} retries")]
    RetriesExhausted { page: String, attempts: u32 },
}

#[async_trait]
pub trait CacheInvalidator: Send + Sync {
    async fn invalidate(&self, signal: &InvalidationSignal) -> Result<(), InvalidationError>;
}

/// Records signals in the log only
#[derive(Debug, Default, Clone, Copy)]
pub struct LogInvalidator;

#[async_trait]
impl CacheInvalidator for LogInvalidator {
    async fn invalidate(&self, signal: &InvalidationSignal) -> Result<(), InvalidationError> {
        info!(
            page = %signal.page,
            version = signal.version,
            etag = %signal.etag,
            "cache invalidation"
        );
        Ok(())
    }
}

/// Broadcasts signals to in-process subscribers
pub struct ChannelInvalidator {
    tx: broadcast::Sender<InvalidationSignal>,
}

impl ChannelInvalidator {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationSignal> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl CacheInvalidator for ChannelInvalidator {
    async fn invalidate(&self, signal: &InvalidationSignal) -> Result<(), InvalidationError> {
        self.tx
            .send(signal.clone())
            .map(|_| ())
            .map_err(|_| InvalidationError::NoSubscribers(signal.page.to_string()))
    }
}

/// Retry a failed signal in the background.
///
/// Resolves to the number of retries it took, or `RetriesExhausted`.
pub fn spawn_retry(
    invalidator: Arc<dyn CacheInvalidator>,
    signal: InvalidationSignal,
    policy: RetryPolicy,
) -> JoinHandle<Result<u32, InvalidationError>> {
    tokio::spawn(async move {
        for attempt in 1..=policy.retries {
            tokio::time::sleep(policy.delay(attempt)).await;
            match invalidator.invalidate(&signal).await {
                Ok(()) => {
                    info!(
                        page = %signal.page,
                        version = signal.version,
                        attempt,
                        "cache invalidation delivered on retry"
                    );
                    return Ok(attempt);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        page = %signal.page,
                        attempt,
                        total = policy.retries,
                        "cache invalidation failed; retrying"
                    );
                }
            }
        }

        error!(
            page = %signal.page,
            version = signal.version,
            "cache invalidation failed after retries"
        );
        Err(InvalidationError::RetriesExhausted {
            page: signal.page.to_string(),
            attempts: policy.retries,
        })
    })
}
