//! In-memory artifact entry store implementation

use crate::criteria::{Predicate, Selector};
use crate::entry::{ArtifactEntry, ArtifactEntryKey};
use crate::store::{ArtifactEntryStore, EntryLock};
use async_trait::async_trait;
use dashmap::DashMap;
use depot_core::{Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;
use uuid::Uuid;

/// In-memory entry store.
///
/// Entries are not persisted across restarts. Each key gets its own async mutex,
/// so operations on different artifacts never contend.
#[derive(Clone)]
pub struct InMemoryArtifactEntryStore {
    entries: Arc<RwLock<BTreeMap<ArtifactEntryKey, ArtifactEntry>>>,
    locks: Arc<DashMap<ArtifactEntryKey, Arc<Mutex<()>>>>,
}

impl InMemoryArtifactEntryStore {
    /// Create a new in-memory entry store
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            locks: Arc::new(DashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<ArtifactEntryKey, ArtifactEntry>>> {
        self.entries
            .read()
            .map_err(|_| Error::Metadata("entry table lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<ArtifactEntryKey, ArtifactEntry>>> {
        self.entries
            .write()
            .map_err(|_| Error::Metadata("entry table lock poisoned".to_string()))
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of keys with a live lock
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

impl Default for InMemoryArtifactEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArtifactEntryStore for InMemoryArtifactEntryStore {
    async fn find_one(&self, key: &ArtifactEntryKey) -> Result<Option<ArtifactEntry>> {
        Ok(self.read()?.get(key).cloned())
    }

    async fn lock_one(&self, key: &ArtifactEntryKey) -> Result<EntryLock> {
        let mutex = self
            .locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = mutex.lock_owned().await;
        let locks = self.locks.clone();
        let released = key.clone();
        Ok(EntryLock::new(key.clone(), guard).with_release(move || {
            // waiters hold their own clone, so only an idle mutex is pruned
            locks.remove_if(&released, |_, mutex| Arc::strong_count(mutex) == 1);
        }))
    }

    async fn save(&self, mut entry: ArtifactEntry) -> Result<ArtifactEntry> {
        let mut entries = self.write()?;

        match (entry.uuid, entries.get(&entry.key)) {
            (None, Some(existing)) => {
                return Err(Error::Metadata(format!(
                    "entry [{}] already exists as {:?}",
                    entry.key, existing.uuid
                )));
            }
            (None, None) => {
                entry.uuid = Some(Uuid::new_v4());
            }
            (Some(uuid), Some(existing)) if existing.uuid != Some(uuid) => {
                return Err(Error::Metadata(format!(
                    "entry [{}] identity mismatch: {} != {:?}",
                    entry.key, uuid, existing.uuid
                )));
            }
            _ => {}
        }

        tracing::trace!(entry = %entry.key, "Saving artifact entry");
        entries.insert(entry.key.clone(), entry.clone());
        Ok(entry)
    }

    async fn search(&self, selector: &Selector) -> Result<Vec<ArtifactEntry>> {
        let matching: Vec<ArtifactEntry> = self
            .read()?
            .values()
            .filter(|entry| selector.predicate.matches(entry))
            .cloned()
            .collect();

        Ok(selector.paginator.apply(matching))
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64> {
        Ok(self
            .read()?
            .values()
            .filter(|entry| predicate.matches(entry))
            .count() as u64)
    }

    async fn add_tag(&self, key: &ArtifactEntryKey, tag: &str) -> Result<()> {
        let _lock = self.lock_one(key).await?;
        let mut entries = self.write()?;
        if let Some(entry) = entries.get_mut(key) {
            entry.tags.insert(tag.to_string());
        }
        Ok(())
    }
}
