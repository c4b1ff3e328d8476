//! Artifact entry store trait definition

use crate::criteria::{Predicate, Selector};
use crate::entry::{ArtifactEntry, ArtifactEntryKey};
use async_trait::async_trait;
use depot_core::Result;
use tokio::sync::OwnedMutexGuard;

/// Exclusive hold on one entry's metadata.
///
/// Mutations of the entry's persisted fields happen while this is held; dropping it
/// releases the entry to the next writer or reader.
#[must_use = "the entry is unlocked as soon as the lock is dropped"]
pub struct EntryLock {
    key: ArtifactEntryKey,
    guard: Option<OwnedMutexGuard<()>>,
    on_release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl EntryLock {
    pub fn new(key: ArtifactEntryKey, guard: OwnedMutexGuard<()>) -> Self {
        Self {
            key,
            guard: Some(guard),
            on_release: None,
        }
    }

    /// Run `release` right after the guard is dropped, e.g. to prune a lock table.
    pub fn with_release(mut self, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        self.on_release = Some(Box::new(release));
        self
    }

    pub fn key(&self) -> &ArtifactEntryKey {
        &self.key
    }
}

impl Drop for EntryLock {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Some(release) = self.on_release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for EntryLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntryLock").field("key", &self.key).finish()
    }
}

/// The metadata store shared by every provider.
///
/// Searches and counts read without taking entry locks and may observe an entry
/// before or after an in-flight update.
#[async_trait]
pub trait ArtifactEntryStore: Send + Sync {
    /// Look up the entry for a path.
    async fn find_one(&self, key: &ArtifactEntryKey) -> Result<Option<ArtifactEntry>>;

    /// Take the exclusive lock for a path; waits while another holder is active.
    async fn lock_one(&self, key: &ArtifactEntryKey) -> Result<EntryLock>;

    /// Persist an entry. A transient entry gets its identity assigned here.
    ///
    /// Returns the entry as stored.
    async fn save(&self, entry: ArtifactEntry) -> Result<ArtifactEntry>;

    /// Entries matching the selector, sorted and paginated.
    async fn search(&self, selector: &Selector) -> Result<Vec<ArtifactEntry>>;

    async fn count(&self, predicate: &Predicate) -> Result<u64>;

    /// Attach a tag to an existing entry. Tagging a missing entry is not an error.
    async fn add_tag(&self, key: &ArtifactEntryKey, tag: &str) -> Result<()>;
}
