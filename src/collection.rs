//! Collection handles.
//!
//! A collection is one record inside the shared database file. Its handle
//! keeps a snapshot of the whole file and re-reads it before every operation,
//! then writes the whole file back after mutating. Nothing is serialized
//! between handles unless the database was opened with `serialize_writes`:
//! two concurrent writers each pull the same snapshot and the later write
//! wins for the whole file.

use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::Shared;
use crate::error::{JseError, Result};
use crate::record::{self, CollectionRecord, DatabaseFile};

/// Last pulled copy of the database file.
#[derive(Debug, Default)]
struct Snapshot {
    contents: DatabaseFile,
    /// Position of this collection's record in `contents`
    self_index: Option<usize>,
    loaded: bool,
}

impl Snapshot {
    fn entry(&self) -> Option<&CollectionRecord> {
        self.self_index.and_then(|i| self.contents.get(i))
    }

    fn entry_mut(&mut self) -> Option<&mut CollectionRecord> {
        self.self_index.and_then(move |i| self.contents.get_mut(i))
    }
}

/// Handle to a named collection
#[derive(Debug)]
pub struct Collection {
    shared: Arc<Shared>,
    name: String,
    cache: Mutex<Snapshot>,
}

impl Collection {
    pub(crate) fn new(shared: Arc<Shared>, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(JseError::InvalidArgument(
                "a collection needs a non-empty name".to_string(),
            ));
        }

        Ok(Collection {
            shared,
            name: name.to_string(),
            cache: Mutex::new(Snapshot::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn not_found(&self) -> JseError {
        JseError::CollectionNotFound {
            database: self.shared.name.clone(),
            collection: self.name.clone(),
        }
    }

    /// Ensure this collection has a record in the file, appending one if needed.
    pub(crate) async fn init(&self) -> Result<()> {
        let _gate = self.shared.gate().await;
        let mut contents = self.shared.read_file().await?;

        let index = match record::position(&contents, &self.name) {
            Some(index) => index,
            None => {
                let index = contents.len();
                contents.push(CollectionRecord::new(self.name.clone(), index as u64));
                let bytes = self.shared.encode(&contents)?;
                self.shared.write_file(bytes).await?;
                info!("Created collection {}.{}", self.shared.name, self.name);
                index
            }
        };

        let mut cache = self.cache.lock();
        cache.contents = contents;
        cache.self_index = Some(index);
        cache.loaded = true;
        Ok(())
    }

    /// Refresh the snapshot from the backing file.
    async fn pull(&self) -> Result<()> {
        let contents = self.shared.read_file().await?;
        let self_index = record::position(&contents, &self.name);

        let mut cache = self.cache.lock();
        cache.contents = contents;
        cache.self_index = self_index;
        cache.loaded = true;
        Ok(())
    }

    /// Run `f` against this collection's freshly pulled record.
    async fn read_entry<R>(&self, f: impl FnOnce(&CollectionRecord) -> R) -> Result<R> {
        let _gate = self.shared.gate().await;
        self.pull().await?;

        let cache = self.cache.lock();
        let entry = cache.entry().ok_or_else(|| self.not_found())?;
        Ok(f(entry))
    }

    /// Get the value stored under `key`
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.read_entry(|entry| entry.keys.get(key).cloned()).await
    }

    /// Check whether `key` exists
    pub async fn has(&self, key: &str) -> Result<bool> {
        self.read_entry(|entry| entry.keys.contains_key(key)).await
    }

    /// All keys, in sorted order
    pub async fn keys(&self) -> Result<Vec<String>> {
        self.read_entry(|entry| entry.keys.keys().cloned().collect())
            .await
    }

    /// Every key/value pair of the collection
    pub async fn entries(&self) -> Result<Map<String, Value>> {
        self.read_entry(|entry| entry.keys.clone()).await
    }

    /// Store `value` under `key` and return it.
    ///
    /// In polite mode an existing key is never overwritten and the call fails
    /// with [`JseError::PoliteMode`].
    pub async fn set(&self, key: &str, value: Value) -> Result<Value> {
        let _gate = self.shared.gate().await;
        self.pull().await?;

        let bytes = {
            let mut cache = self.cache.lock();
            let entry = cache.entry_mut().ok_or_else(|| self.not_found())?;

            if self.shared.config.polite && entry.keys.contains_key(key) {
                return Err(JseError::PoliteMode {
                    database: self.shared.name.clone(),
                    collection: self.name.clone(),
                    key: key.to_string(),
                });
            }

            entry.keys.insert(key.to_string(), value.clone());
            self.shared.encode(&cache.contents)?
        };

        self.shared.write_file(bytes).await?;
        debug!("Set {}.{}[{}]", self.shared.name, self.name, key);
        Ok(value)
    }

    /// Remove `key`, returning its value in a one-element vector.
    ///
    /// An absent key yields an empty vector and leaves the file untouched.
    pub async fn delete_one(&self, key: &str) -> Result<Vec<Value>> {
        let _gate = self.shared.gate().await;
        self.pull().await?;

        let (removed, bytes) = {
            let mut cache = self.cache.lock();
            let entry = cache.entry_mut().ok_or_else(|| self.not_found())?;

            match entry.keys.remove(key) {
                Some(value) => (value, self.shared.encode(&cache.contents)?),
                None => return Ok(Vec::new()),
            }
        };

        self.shared.write_file(bytes).await?;
        Ok(vec![removed])
    }

    /// Remove every key in `keys` and return the values that were present,
    /// in input order. The file is rewritten once.
    pub async fn delete_many<I, K>(&self, keys: I) -> Result<Vec<Value>>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let _gate = self.shared.gate().await;
        self.pull().await?;

        let (removed, bytes) = {
            let mut cache = self.cache.lock();
            let entry = cache.entry_mut().ok_or_else(|| self.not_found())?;

            let removed: Vec<Value> = keys
                .into_iter()
                .filter_map(|key| entry.keys.remove(key.as_ref()))
                .collect();
            (removed, self.shared.encode(&cache.contents)?)
        };

        self.shared.write_file(bytes).await?;
        Ok(removed)
    }

    /// Remove this collection's record and write the cached snapshot back.
    ///
    /// Unlike every other operation this does not pull first, so changes made
    /// by other handles since this handle's last pull are overwritten. A
    /// handle that has never pulled loads the file once.
    pub(crate) async fn self_destruct(&self) -> Result<()> {
        let _gate = self.shared.gate().await;

        let loaded = self.cache.lock().loaded;
        if !loaded {
            self.pull().await?;
        }

        let (index, bytes) = {
            let cache = self.cache.lock();
            let index = match cache.self_index {
                Some(index) if index < cache.contents.len() => index,
                _ => return Err(self.not_found()),
            };

            let mut remaining = cache.contents.clone();
            remaining.remove(index);
            (index, self.shared.encode(&remaining)?)
        };

        self.shared.write_file(bytes).await?;

        // The snapshot only drops the record after a successful write
        {
            let mut cache = self.cache.lock();
            if cache.self_index == Some(index) {
                cache.contents.remove(index);
                cache.self_index = None;
            }
        }
        info!("Dropped collection {}.{}", self.shared.name, self.name);
        Ok(())
    }
}
