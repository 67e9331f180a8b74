//! Database handle.
//!
//! A database owns one JSON file and the collection handles it has vended.
//! Opening is cheap; the file is checked, created or loaded on the first
//! call that needs it (or an explicit [`Database::ready`]).

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::error::{JseError, Result};
use crate::record::{self, CollectionRecord, DatabaseFile};
use crate::storage::{FileStore, FsStore};

/// State shared between a database and its collections.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: DatabaseConfig,
    pub(crate) name: String,
    pub(crate) file_path: PathBuf,
    store: Arc<dyn FileStore>,
    /// Single-writer queue, present when `serialize_writes` is set
    gate: Option<tokio::sync::Mutex<()>>,
    closed: AtomicBool,
}

impl Shared {
    pub(crate) fn new(config: DatabaseConfig, store: Arc<dyn FileStore>) -> Self {
        let gate = config.serialize_writes.then(|| tokio::sync::Mutex::new(()));
        Shared {
            name: config.normalized_name(),
            file_path: config.file_path(),
            config,
            store,
            gate,
            closed: AtomicBool::new(false),
        }
    }

    pub(crate) async fn gate(&self) -> Option<tokio::sync::MutexGuard<'_, ()>> {
        match &self.gate {
            Some(gate) => Some(gate.lock().await),
            None => None,
        }
    }

    /// Read and decode the whole file.
    pub(crate) async fn read_file(&self) -> Result<DatabaseFile> {
        let bytes = self
            .store
            .read(&self.file_path)
            .await
            .map_err(|e| JseError::storage(&self.file_path, e))?;
        debug!("Pulled {} bytes from {}", bytes.len(), self.file_path.display());
        record::decode(&self.file_path, &bytes)
    }

    pub(crate) fn encode(&self, records: &[CollectionRecord]) -> Result<Vec<u8>> {
        record::encode(&self.file_path, records)
    }

    /// Replace the whole file.
    pub(crate) async fn write_file(&self, bytes: Vec<u8>) -> Result<()> {
        self.store
            .write(&self.file_path, &bytes)
            .await
            .map_err(|e| JseError::storage(&self.file_path, e))?;
        debug!("Flushed {} bytes to {}", bytes.len(), self.file_path.display());
        Ok(())
    }

    /// Run the shutdown policy. Runs at most once and never fails.
    async fn cleanup(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.config.persistent {
            debug!("Closed persistent database {}", self.name);
            return;
        }

        if self.config.print_on_exit {
            match self.store.read(&self.file_path).await {
                Ok(bytes) => {
                    println!("[JSE] Printing database file...");
                    println!("{}", String::from_utf8_lossy(&bytes));
                }
                Err(e) => warn!("Could not print {}: {}", self.file_path.display(), e),
            }
        }

        match self.store.delete(&self.file_path).await {
            Ok(()) => info!("Removed non-persistent database file {}", self.file_path.display()),
            Err(e) => warn!("Could not remove {}: {}", self.file_path.display(), e),
        }
    }
}

/// An embedded JSON database backed by a single file
#[derive(Debug)]
pub struct Database {
    shared: Arc<Shared>,
    collections: Mutex<IndexMap<String, Arc<Collection>>>,
    initialized: OnceCell<()>,
}

impl Database {
    /// Open a database on the local filesystem.
    pub fn open(config: DatabaseConfig) -> Self {
        Self::with_store(config, Arc::new(FsStore::new()))
    }

    /// Open a database on a custom store.
    pub fn with_store(config: DatabaseConfig, store: Arc<dyn FileStore>) -> Self {
        Database {
            shared: Arc::new(Shared::new(config, store)),
            collections: Mutex::new(IndexMap::new()),
            initialized: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn file_path(&self) -> &Path {
        &self.shared.file_path
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.shared.config
    }

    pub fn is_ready(&self) -> bool {
        self.initialized.initialized()
    }

    /// Wait until the backing file exists and its collections are tracked.
    ///
    /// Initialization runs once; a failed attempt is retried by the next call.
    pub async fn ready(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| self.initialize())
            .await
            .map(|_| ())
    }

    async fn initialize(&self) -> Result<()> {
        let path = &self.shared.file_path;
        let exists = self
            .shared
            .store
            .exists(path)
            .await
            .map_err(|e| JseError::storage(path, e))?;

        let records = if exists {
            self.shared.read_file().await?
        } else {
            Vec::new()
        };

        if records.is_empty() {
            // Missing and blank files both start out as `[]`
            self.shared.write_file(self.shared.encode(&records)?).await?;
            info!("Initialized database file {}", path.display());
            return Ok(());
        }

        if records.iter().any(|r| r.name.is_empty()) {
            return Err(JseError::corruption(path, "collection record without a name"));
        }

        let mut collections = self.collections.lock();
        for record in &records {
            let collection = Collection::new(Arc::clone(&self.shared), &record.name)?;
            collections.insert(record.name.clone(), Arc::new(collection));
        }

        info!("Loaded {} collections from {}", collections.len(), path.display());
        Ok(())
    }

    /// Create a collection, or return the tracked one with the same name.
    pub async fn create_collection(&self, name: &str) -> Result<Arc<Collection>> {
        self.ready().await?;
        let name = name.to_lowercase();

        let (collection, fresh) = {
            let mut collections = self.collections.lock();
            match collections.get(&name) {
                Some(collection) => (Arc::clone(collection), false),
                None => {
                    let collection = Arc::new(Collection::new(Arc::clone(&self.shared), &name)?);
                    collections.insert(name.clone(), Arc::clone(&collection));
                    (collection, true)
                }
            }
        };

        if let Err(e) = collection.init().await {
            if fresh {
                self.collections.lock().shift_remove(&name);
            }
            return Err(e);
        }

        Ok(collection)
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        Ok(self.get_collection(name).await?.is_some())
    }

    /// Get a tracked collection. Never creates one.
    pub async fn get_collection(&self, name: &str) -> Result<Option<Arc<Collection>>> {
        self.ready().await?;
        Ok(self.collections.lock().get(&name.to_lowercase()).cloned())
    }

    /// Remove a collection's record from the file and stop tracking it.
    ///
    /// Returns `false` when no such collection is tracked.
    pub async fn drop_collection(&self, name: &str) -> Result<bool> {
        self.ready().await?;

        let name = name.to_lowercase();
        let collection = self.collections.lock().get(&name).cloned();
        let Some(collection) = collection else {
            return Ok(false);
        };

        // Stays tracked unless the record is gone from the file
        match collection.self_destruct().await {
            Ok(()) => {
                self.collections.lock().shift_remove(&name);
                Ok(true)
            }
            Err(e @ JseError::CollectionNotFound { .. }) => {
                self.collections.lock().shift_remove(&name);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Visit every tracked collection in tracking order.
    pub fn for_each_collection<F>(&self, mut visitor: F)
    where
        F: FnMut(&Arc<Collection>),
    {
        let collections: Vec<Arc<Collection>> = self.collections.lock().values().cloned().collect();
        for collection in &collections {
            visitor(collection);
        }
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.collections.lock().keys().cloned().collect()
    }

    /// Read the whole file fresh from the store.
    pub async fn export(&self) -> Result<DatabaseFile> {
        self.ready().await?;
        self.shared.read_file().await
    }

    /// Run the shutdown policy: a non-persistent database deletes its file,
    /// printing it first when `print_on_exit` is set.
    ///
    /// Safe to call more than once and before initialization; failures are
    /// logged and swallowed.
    pub async fn close(&self) {
        self.shared.cleanup().await;
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.shared.config.persistent || self.shared.closed.load(Ordering::SeqCst) {
            return;
        }

        // Best effort only: the runtime may shut down before this runs
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let shared = Arc::clone(&self.shared);
                handle.spawn(async move { shared.cleanup().await });
            }
            Err(_) => warn!(
                "Database {} dropped without close(); {} was left behind",
                self.shared.name,
                self.shared.file_path.display()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io;
    use tempfile::TempDir;

    fn open_in(dir: &TempDir, name: &str) -> Database {
        Database::open(DatabaseConfig::new(name, dir.path()))
    }

    fn count_named(records: &[CollectionRecord], name: &str) -> usize {
        records.iter().filter(|r| r.name == name).count()
    }

    #[tokio::test]
    async fn test_ready_creates_empty_file() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "App");

        assert!(!db.is_ready());
        db.ready().await.unwrap();
        assert!(db.is_ready());
        assert_eq!(db.name(), "app");
        assert_eq!(db.file_path(), dir.path().join("jse-app.json"));
        assert_eq!(std::fs::read_to_string(db.file_path()).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_blank_file_is_reset() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("jse-app.json"), "").unwrap();

        let db = open_in(&dir, "app");
        db.ready().await.unwrap();
        assert_eq!(std::fs::read_to_string(db.file_path()).unwrap(), "[]");
        assert!(db.collection_names().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("jse-app.json"), "{\"not\": \"an array\"}").unwrap();

        let db = open_in(&dir, "app");
        let err = db.ready().await.unwrap_err();
        assert!(matches!(err, JseError::Corruption { .. }));
        assert!(!db.is_ready());
        assert!(db.create_collection("users").await.is_err());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");
        let users = db.create_collection("users").await.unwrap();

        let values = [
            json!(null),
            json!(42),
            json!("text"),
            json!([1, "two", {"three": 3}]),
            json!({"nested": {"deep": [true, false]}}),
        ];
        for (i, value) in values.iter().enumerate() {
            let key = format!("k{}", i);
            users.set(&key, value.clone()).await.unwrap();
            assert_eq!(users.get(&key).await.unwrap().as_ref(), Some(value));
        }
    }

    #[tokio::test]
    async fn test_idempotent_create_and_case_folding() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");

        let first = db.create_collection("Users").await.unwrap();
        first.set("alice", json!(1)).await.unwrap();
        let second = db.create_collection("USERS").await.unwrap();
        assert_eq!(second.name(), "users");
        assert_eq!(second.get("alice").await.unwrap(), Some(json!(1)));

        let fetched = db.get_collection("users").await.unwrap().unwrap();
        assert_eq!(fetched.get("alice").await.unwrap(), Some(json!(1)));
        assert!(db.has_collection("uSeRs").await.unwrap());

        let records = db.export().await.unwrap();
        assert_eq!(count_named(&records, "users"), 1);
    }

    #[tokio::test]
    async fn test_get_collection_never_creates() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");

        assert!(db.get_collection("ghost").await.unwrap().is_none());
        assert!(!db.has_collection("ghost").await.unwrap());
        assert!(db.export().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_collection_empty_name() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");

        let err = db.create_collection("").await.unwrap_err();
        assert!(matches!(err, JseError::InvalidArgument(_)));
        assert!(db.collection_names().is_empty());
    }

    #[tokio::test]
    async fn test_drop_removes_record() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");
        let users = db.create_collection("users").await.unwrap();
        db.create_collection("logs").await.unwrap();
        users.set("a", json!(1)).await.unwrap();

        assert!(db.drop_collection("Users").await.unwrap());
        assert!(!db.has_collection("users").await.unwrap());
        assert!(!db.drop_collection("users").await.unwrap());

        let records = db.export().await.unwrap();
        assert_eq!(count_named(&records, "users"), 0);
        assert_eq!(count_named(&records, "logs"), 1);

        let err = users.get("a").await.unwrap_err();
        assert!(matches!(err, JseError::CollectionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_drop_before_ready_waits() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("jse-app.json"),
            r#"[{"name":"users","index":0,"keys":{"a":1}}]"#,
        )
        .unwrap();

        let db = open_in(&dir, "app");
        assert!(db.drop_collection("users").await.unwrap());
        assert!(db.export().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_for_each_collection_in_tracking_order() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");
        for name in ["b", "a", "c"] {
            db.create_collection(name).await.unwrap();
        }

        let mut seen = Vec::new();
        db.for_each_collection(|c| seen.push(c.name().to_string()));
        assert_eq!(seen, vec!["b", "a", "c"]);
        assert_eq!(db.collection_names(), seen);
    }

    #[tokio::test]
    async fn test_persistent_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let db = open_in(&dir, "app");
            let users = db.create_collection("users").await.unwrap();
            users.set("alice", json!({"age": 30})).await.unwrap();
            db.create_collection("empty").await.unwrap();
            db.close().await;
        }
        assert!(dir.path().join("jse-app.json").exists());

        let db = open_in(&dir, "APP");
        db.ready().await.unwrap();
        assert_eq!(db.collection_names(), vec!["users", "empty"]);

        let users = db.get_collection("users").await.unwrap().unwrap();
        assert_eq!(users.get("alice").await.unwrap(), Some(json!({"age": 30})));
        assert!(users.has("alice").await.unwrap());
    }

    #[tokio::test]
    async fn test_non_persistent_cleanup() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(DatabaseConfig::new("tmp", dir.path()).persistent(false));
        let users = db.create_collection("users").await.unwrap();
        users.set("a", json!(1)).await.unwrap();
        assert!(db.file_path().exists());

        db.close().await;
        assert!(!db.file_path().exists());

        // Second run is a no-op
        db.close().await;
    }

    #[tokio::test]
    async fn test_cleanup_before_ready_is_safe() {
        let dir = TempDir::new().unwrap();
        let db = Database::open(
            DatabaseConfig::new("never", dir.path())
                .persistent(false)
                .print_on_exit(true),
        );
        db.close().await;
        assert!(!db.file_path().exists());
    }

    #[tokio::test]
    async fn test_print_on_exit_deletes_file() {
        let store = Arc::new(MemoryStore::new());
        let db = Database::with_store(
            DatabaseConfig::new("tmp", "/mem")
                .persistent(false)
                .print_on_exit(true),
            store.clone(),
        );
        db.create_collection("users").await.unwrap();
        assert_eq!(store.len(), 1);

        db.close().await;
        assert!(store.is_empty());
    }

    #[derive(Debug)]
    struct BrokenStore;

    #[async_trait]
    impl FileStore for BrokenStore {
        async fn read(&self, _path: &Path) -> io::Result<Vec<u8>> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        async fn write(&self, _path: &Path, _contents: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }

        async fn exists(&self, _path: &Path) -> io::Result<bool> {
            Ok(false)
        }

        async fn delete(&self, _path: &Path) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"))
        }
    }

    #[tokio::test]
    async fn test_storage_errors_surface() {
        let db = Database::with_store(
            DatabaseConfig::new("app", "/nowhere").persistent(false),
            Arc::new(BrokenStore),
        );
        let err = db.ready().await.unwrap_err();
        assert!(matches!(err, JseError::StorageIo { .. }));

        // Cleanup swallows the failing delete
        db.close().await;
    }

    /// Memory store whose writes can be switched off.
    #[derive(Debug, Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_writes: AtomicBool,
    }

    #[async_trait]
    impl FileStore for FlakyStore {
        async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            self.inner.read(path).await
        }

        async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
            }
            self.inner.write(path, contents).await
        }

        async fn exists(&self, path: &Path) -> io::Result<bool> {
            self.inner.exists(path).await
        }

        async fn delete(&self, path: &Path) -> io::Result<()> {
            self.inner.delete(path).await
        }
    }

    #[tokio::test]
    async fn test_failed_drop_keeps_collection() {
        let store = Arc::new(FlakyStore::default());
        let db = Database::with_store(DatabaseConfig::new("app", "/mem"), store.clone());
        let users = db.create_collection("users").await.unwrap();
        users.set("a", json!(1)).await.unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        let err = db.drop_collection("users").await.unwrap_err();
        assert!(matches!(err, JseError::StorageIo { .. }));
        assert!(db.has_collection("users").await.unwrap());
        assert_eq!(count_named(&db.export().await.unwrap(), "users"), 1);

        // The handle still knows its record, so a retry succeeds
        store.fail_writes.store(false, Ordering::SeqCst);
        assert!(db.drop_collection("users").await.unwrap());
        assert!(!db.has_collection("users").await.unwrap());
        assert_eq!(count_named(&db.export().await.unwrap(), "users"), 0);
    }

    #[tokio::test]
    async fn test_drop_vanished_collection_untracks() {
        let dir = TempDir::new().unwrap();
        let db = open_in(&dir, "app");
        db.create_collection("users").await.unwrap();
        std::fs::write(db.file_path(), "[]").unwrap();

        // Force the cached snapshot to notice the record is gone
        let users = db.get_collection("users").await.unwrap().unwrap();
        assert!(users.has("a").await.is_err());

        let err = db.drop_collection("users").await.unwrap_err();
        assert!(matches!(err, JseError::CollectionNotFound { .. }));
        assert!(!db.has_collection("users").await.unwrap());
    }

    /// Suspends once around every read and write so concurrent operations interleave.
    #[derive(Debug, Default)]
    struct YieldingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl FileStore for YieldingStore {
        async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
            let bytes = self.inner.read(path).await?;
            tokio::task::yield_now().await;
            Ok(bytes)
        }

        async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
            tokio::task::yield_now().await;
            self.inner.write(path, contents).await
        }

        async fn exists(&self, path: &Path) -> io::Result<bool> {
            self.inner.exists(path).await
        }

        async fn delete(&self, path: &Path) -> io::Result<()> {
            self.inner.delete(path).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_sets_last_writer_wins() {
        let db = Database::with_store(
            DatabaseConfig::new("race", "/mem"),
            Arc::new(YieldingStore::default()),
        );
        let users = db.create_collection("users").await.unwrap();

        let (a, b) = tokio::join!(users.set("a", json!(1)), users.set("b", json!(2)));
        a.unwrap();
        b.unwrap();

        let keys = users.keys().await.unwrap();
        assert_eq!(keys.len(), 1);
    }

    #[tokio::test]
    async fn test_serialized_writes_keep_both() {
        let db = Database::with_store(
            DatabaseConfig::new("race", "/mem").serialize_writes(true),
            Arc::new(YieldingStore::default()),
        );
        let users = db.create_collection("users").await.unwrap();

        let (a, b) = tokio::join!(users.set("a", json!(1)), users.set("b", json!(2)));
        a.unwrap();
        b.unwrap();

        assert_eq!(users.keys().await.unwrap(), vec!["a", "b"]);
    }
}
