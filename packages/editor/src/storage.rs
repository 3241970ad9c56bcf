//! # Document Storage
//!
//! Durable storage is an external collaborator reached through the
//! [`DocumentStore`] trait. A store keeps, per page, one published document
//! with its version, and one unversioned draft written by autosave.
//!
//! `put_if_version` is the only cross-session guard: it writes only when the
//! stored version still equals the caller's expected version, and stores the
//! document under `expected + 1`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pagecraft_document::SerializedDocument;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;

const DRAFTS_DIR: &str = "drafts";

fn default_slug() -> String {
    "home".to_string()
}

/// Identity of a page: the owning store plus a slug
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawPageKey")]
pub struct PageKey {
    pub store_id: String,
    pub slug: String,
}

/// Wire form of [`PageKey`], checked on the way in
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPageKey {
    store_id: String,
    #[serde(default = "default_slug")]
    slug: String,
}

impl TryFrom<RawPageKey> for PageKey {
    type Error = StoreError;

    fn try_from(raw: RawPageKey) -> Result<Self, Self::Error> {
        Self::new(raw.store_id, raw.slug)
    }
}

impl PageKey {
    pub fn new(store_id: impl Into<String>, slug: impl Into<String>) -> Result<Self, StoreError> {
        let key = Self {
            store_id: store_id.into(),
            slug: slug.into(),
        };
        for segment in [&key.store_id, &key.slug] {
            if !is_safe_segment(segment) {
                return Err(StoreError::InvalidKey(segment.clone()));
            }
        }
        Ok(key)
    }

    /// The store's home page
    pub fn home(store_id: impl Into<String>) -> Result<Self, StoreError> {
        Self::new(store_id, default_slug())
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.store_id, self.slug)
    }
}

fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(&['/', '\\'][..])
        && !segment.chars().any(char::is_control)
}

/// Published document as held by a store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub version: u64,
    pub saved_at: DateTime<Utc>,
    pub document: SerializedDocument,
}

/// Autosaved draft; never version-bearing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDraft {
    pub saved_at: DateTime<Utc>,
    pub document: SerializedDocument,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Version mismatch: expected {expected}, stored {actual}")]
    VersionMismatch { expected: u64, actual: u64 },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid page key segment: {0:?}")]
    InvalidKey(String),

    #[error("Stored document for {page} is unreadable: {reason}")]
    Corrupt { page: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Transient failures worth retrying with backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Published document, `None` if the page was never published
    async fn load(&self, page: &PageKey) -> Result<Option<StoredDocument>, StoreError>;

    /// Atomically store `document` as version `expected + 1` if the stored
    /// version (0 when absent) equals `expected`
    async fn put_if_version(
        &self,
        page: &PageKey,
        expected: u64,
        document: SerializedDocument,
    ) -> Result<StoredDocument, StoreError>;

    async fn save_draft(
        &self,
        page: &PageKey,
        document: SerializedDocument,
    ) -> Result<(), StoreError>;

    async fn load_draft(&self, page: &PageKey) -> Result<Option<StoredDraft>, StoreError>;

    async fn current_version(&self, page: &PageKey) -> Result<u64, StoreError> {
        Ok(self.load(page).await?.map(|stored| stored.version).unwrap_or(0))
    }
}

fn stamp(mut document: SerializedDocument, version: u64) -> StoredDocument {
    document.version = version;
    StoredDocument {
        version,
        saved_at: Utc::now(),
        document,
    }
}

// =============================================================================
// MEMORY STORE
// =============================================================================

#[derive(Default)]
struct MemoryInner {
    published: HashMap<PageKey, StoredDocument>,
    drafts: HashMap<PageKey, StoredDraft>,
    fail_puts: usize,
    fail_drafts: usize,
}

/// In-process store with failure injection
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    puts: AtomicUsize,
    draft_writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place a published document directly, bypassing the version check
    pub async fn seed(&self, page: &PageKey, version: u64, document: SerializedDocument) {
        let mut inner = self.inner.lock().await;
        inner.published.insert(page.clone(), stamp(document, version));
    }

    /// Make the next `count` publishes fail as unavailable
    pub async fn fail_next_puts(&self, count: usize) {
        self.inner.lock().await.fail_puts = count;
    }

    /// Make the next `count` draft writes fail as unavailable
    pub async fn fail_next_drafts(&self, count: usize) {
        self.inner.lock().await.fail_drafts = count;
    }

    /// Successful published writes so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// Successful draft writes so far
    pub fn draft_count(&self) -> usize {
        self.draft_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load(&self, page: &PageKey) -> Result<Option<StoredDocument>, StoreError> {
        Ok(self.inner.lock().await.published.get(page).cloned())
    }

    async fn put_if_version(
        &self,
        page: &PageKey,
        expected: u64,
        document: SerializedDocument,
    ) -> Result<StoredDocument, StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_puts > 0 {
            inner.fail_puts -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }

        let actual = inner.published.get(page).map(|d| d.version).unwrap_or(0);
        if actual != expected {
            return Err(StoreError::VersionMismatch { expected, actual });
        }

        let stored = stamp(document, expected + 1);
        inner.published.insert(page.clone(), stored.clone());
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(stored)
    }

    async fn save_draft(
        &self,
        page: &PageKey,
        document: SerializedDocument,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_drafts > 0 {
            inner.fail_drafts -= 1;
            return Err(StoreError::Unavailable("injected failure".into()));
        }

        inner.drafts.insert(
            page.clone(),
            StoredDraft {
                saved_at: Utc::now(),
                document,
            },
        );
        self.draft_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_draft(&self, page: &PageKey) -> Result<Option<StoredDraft>, StoreError> {
        Ok(self.inner.lock().await.drafts.get(page).cloned())
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

/// JSON files under `<root>/<store_id>/<slug>.json`, drafts under
/// `<root>/<store_id>/drafts/<slug>.json`
pub struct FileStore {
    root: PathBuf,

    /// Serializes writes within this process
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn published_path(&self, page: &PageKey) -> PathBuf {
        self.root.join(&page.store_id).join(format!("{}.json", page.slug))
    }

    fn draft_path(&self, page: &PageKey) -> PathBuf {
        self.root
            .join(&page.store_id)
            .join(DRAFTS_DIR)
            .join(format!("{}.json", page.slug))
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        page: &PageKey,
        path: &Path,
    ) -> Result<Option<T>, StoreError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                page: page.to_string(),
                reason: e.to_string(),
            })
    }

    /// Write through a temp file so readers never see a partial document
    async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let json = serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load(&self, page: &PageKey) -> Result<Option<StoredDocument>, StoreError> {
        Self::read_json(page, &self.published_path(page)).await
    }

    async fn put_if_version(
        &self,
        page: &PageKey,
        expected: u64,
        document: SerializedDocument,
    ) -> Result<StoredDocument, StoreError> {
        let _guard = self.write_lock.lock().await;
        let path = self.published_path(page);

        let current: Option<StoredDocument> = Self::read_json(page, &path).await?;
        let actual = current.map(|d| d.version).unwrap_or(0);
        if actual != expected {
            return Err(StoreError::VersionMismatch { expected, actual });
        }

        let stored = stamp(document, expected + 1);
        Self::write_json(&path, &stored).await?;
        Ok(stored)
    }

    async fn save_draft(
        &self,
        page: &PageKey,
        document: SerializedDocument,
    ) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let draft = StoredDraft {
            saved_at: Utc::now(),
            document,
        };
        Self::write_json(&self.draft_path(page), &draft).await
    }

    async fn load_draft(&self, page: &PageKey) -> Result<Option<StoredDraft>, StoreError> {
        Self::read_json(page, &self.draft_path(page)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagecraft_document::{serialize, ComponentRegistry, Document, Props};
    use std::sync::Arc;

    fn payload() -> SerializedDocument {
        let registry = ComponentRegistry::builtin();
        serialize(&Document::new(&registry, "Container", &Props::new()).unwrap())
    }

    #[test]
    fn test_page_key_rejects_traversal() {
        assert!(PageKey::new("shop-1", "home").is_ok());
        for bad in ["..", "a/b", "a\\b", "", "."] {
            assert!(matches!(PageKey::new("shop-1", bad), Err(StoreError::InvalidKey(_))));
            assert!(matches!(PageKey::new(bad, "home"), Err(StoreError::InvalidKey(_))));
        }
        assert_eq!(PageKey::home("shop-1").unwrap().to_string(), "shop-1/home");
    }

    #[tokio::test]
    async fn test_memory_store_compare_and_put() {
        let store = MemoryStore::new();
        let page = PageKey::home("shop-1").unwrap();

        let stored = store.put_if_version(&page, 0, payload()).await.unwrap();
        assert_eq!(stored.version, 1);
        assert_eq!(stored.document.version, 1);

        let err = store.put_if_version(&page, 0, payload()).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { expected: 0, actual: 1 }));
        assert_eq!(store.put_count(), 1);
        assert_eq!(store.current_version(&page).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        let page = PageKey::home("shop-1").unwrap();
        store.fail_next_drafts(1).await;

        let err = store.save_draft(&page, payload()).await.unwrap_err();
        assert!(err.is_retryable());
        store.save_draft(&page, payload()).await.unwrap();
        assert_eq!(store.draft_count(), 1);
        assert!(store.load_draft(&page).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let page = PageKey::new("shop-1", "about").unwrap();

        assert!(store.load(&page).await.unwrap().is_none());
        store.put_if_version(&page, 0, payload()).await.unwrap();
        store.put_if_version(&page, 1, payload()).await.unwrap();

        let loaded = store.load(&page).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        assert!(dir.path().join("shop-1").join("about.json").exists());

        let err = store.put_if_version(&page, 1, payload()).await.unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { expected: 1, actual: 2 }));

        store.save_draft(&page, payload()).await.unwrap();
        assert!(dir.path().join("shop-1").join("drafts").join("about.json").exists());
        assert_eq!(store.current_version(&page).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_file_store_drafts_never_shadow_published_pages() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let home = PageKey::home("shop-1").unwrap();
        let home_draft = PageKey::new("shop-1", "home.draft").unwrap();
        let drafts = PageKey::new("shop-1", "drafts").unwrap();

        store.save_draft(&home, payload()).await.unwrap();

        assert!(store.load(&home_draft).await.unwrap().is_none());
        assert_eq!(store.put_if_version(&home_draft, 0, payload()).await.unwrap().version, 1);
        assert_eq!(store.put_if_version(&drafts, 0, payload()).await.unwrap().version, 1);

        store.save_draft(&home_draft, payload()).await.unwrap();
        assert_eq!(store.load(&home_draft).await.unwrap().unwrap().version, 1);
        assert!(store.load_draft(&home).await.unwrap().is_some());
        assert!(store.load(&home).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_draft_saves_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FileStore::new(dir.path()));
        let page = PageKey::home("shop-1").unwrap();

        let writes = (0..8).map(|_| {
            let store = store.clone();
            let page = page.clone();
            tokio::spawn(async move { store.save_draft(&page, payload()).await })
        });
        for write in writes.collect::<Vec<_>>() {
            write.await.unwrap().unwrap();
        }

        assert!(store.load_draft(&page).await.unwrap().is_some());
    }

    #[test]
    fn test_page_key_deserialize_is_checked() {
        let key: PageKey = serde_json::from_str(r#"{ "storeId": "shop-1" }"#).unwrap();
        assert_eq!(key, PageKey::home("shop-1").unwrap());

        let bad_keys = [
            r#"{ "storeId": "..", "slug": "home" }"#,
            r#"{ "storeId": "shop-1", "slug": "a/b" }"#,
        ];
        for bad in bad_keys {
            let err = serde_json::from_str::<PageKey>(bad).unwrap_err();
            assert!(err.to_string().contains("Invalid page key segment"));
        }
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let page = PageKey::home("shop-1").unwrap();

        std::fs::create_dir_all(dir.path().join("shop-1")).unwrap();
        std::fs::write(dir.path().join("shop-1").join("home.json"), "{ nope").unwrap();

        let err = store.load(&page).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
        assert!(!err.is_retryable());
    }
}
