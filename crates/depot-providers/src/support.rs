//! Behaviour shared by every storage-backed provider
//!
//! [`ProviderSupport`] owns the entry store and the layout registry. It keeps
//! artifact entries consistent with stream activity by implementing
//! [`RepositoryStreamCallback`], wraps raw streams, and runs repository-scoped
//! searches.

use crate::io::{
    ByteSink, ByteStream, RepositoryInputStream, RepositoryOutputStream, RepositoryStreamCallback,
    RepositoryStreamContext,
};
use async_trait::async_trait;
use chrono::Utc;
use depot_core::{Error, RepositoryPath, Result};
use depot_layout::{ArtifactCoordinates, LayoutProviderRegistry};
use depot_metadata::{
    ArtifactEntry, ArtifactEntryKey, ArtifactEntryStore, EntryKind, EntryLock, Expression, Field,
    Paginator, Predicate, Selector,
};
use std::sync::Arc;

/// Entry key for a repository path
pub fn entry_key(path: &RepositoryPath) -> ArtifactEntryKey {
    ArtifactEntryKey::new(path.storage_id(), path.repository_id(), path.relative())
}

/// `storageId = s AND repositoryId = r`
pub fn repository_scope(storage_id: &str, repository_id: &str) -> Predicate {
    Predicate::of(Expression::eq(Field::StorageId, storage_id))
        .and(Predicate::of(Expression::eq(Field::RepositoryId, repository_id)))
}

pub struct ProviderSupport {
    store: Arc<dyn ArtifactEntryStore>,
    layouts: Arc<LayoutProviderRegistry>,
}

impl ProviderSupport {
    pub fn new(store: Arc<dyn ArtifactEntryStore>, layouts: Arc<LayoutProviderRegistry>) -> Self {
        Self { store, layouts }
    }

    pub fn store(&self) -> &Arc<dyn ArtifactEntryStore> {
        &self.store
    }

    pub fn layouts(&self) -> &Arc<LayoutProviderRegistry> {
        &self.layouts
    }

    /// Lock the path's entry and return it, building a transient one if absent.
    ///
    /// The entry variant always follows the repository kind. An existing entry of
    /// the other variant is replaced by a fresh one carrying the same identity.
    pub async fn provide_entry(&self, path: &RepositoryPath) -> Result<(EntryLock, ArtifactEntry)> {
        let key = entry_key(path);
        let lock = self.store.lock_one(&key).await?;
        let kind = EntryKind::for_repository(path.repository());

        let entry = match self.store.find_one(&key).await? {
            Some(mut existing) if existing.kind.is_remote() == kind.is_remote() => {
                existing.kind = kind;
                existing
            }
            Some(existing) => {
                tracing::warn!(
                    path = %path,
                    existing = ?existing.kind,
                    expected = ?kind,
                    "Entry variant does not match repository; substituting"
                );
                let mut fresh = ArtifactEntry::new(key, kind);
                fresh.uuid = existing.uuid;
                fresh
            }
            None => ArtifactEntry::new(key, kind),
        };

        Ok((lock, entry))
    }

    /// Coordinates for the path, or `None` when the layout does not treat it as an artifact
    pub fn coordinates(&self, path: &RepositoryPath) -> Result<Option<Arc<dyn ArtifactCoordinates>>> {
        let layout = self.layouts.get(&path.repository().layout);
        if !layout.is_artifact(path.relative()) {
            return Ok(None);
        }
        layout.coordinates(path.relative()).map(Some)
    }

    pub fn decorate_input(self: &Arc<Self>, path: &RepositoryPath, inner: ByteStream) -> RepositoryInputStream {
        RepositoryInputStream::new(path.clone(), inner, self.clone())
    }

    /// Wrap a sink opened for `path`. `coordinates` must come from
    /// [`ProviderSupport::coordinates`], resolved before the sink was opened.
    pub fn decorate_output(
        self: &Arc<Self>,
        path: &RepositoryPath,
        coordinates: Option<Arc<dyn ArtifactCoordinates>>,
        inner: ByteSink,
    ) -> RepositoryOutputStream {
        RepositoryOutputStream::new(path.clone(), coordinates, inner, self.clone())
    }

    /// Mark the path's remote entry as not cached and forget its size.
    ///
    /// Used when a download was abandoned after the close hook recorded it.
    pub async fn mark_uncached(&self, path: &RepositoryPath) -> Result<()> {
        let key = entry_key(path);
        let _lock = self.store.lock_one(&key).await?;
        let Some(mut entry) = self.store.find_one(&key).await? else {
            return Ok(());
        };
        if !entry.kind.is_remote() {
            return Ok(());
        }

        entry.kind = EntryKind::Remote { is_cached: false };
        entry.size_in_bytes = None;
        self.store.save(entry).await?;
        tracing::debug!(path = %path, "Marked artifact entry as not cached");
        Ok(())
    }

    /// Logical paths of entries matching `predicate` within any of the given repositories.
    pub async fn search_paths(
        &self,
        storage_id: &str,
        repository_ids: &[&str],
        predicate: &Predicate,
        paginator: &Paginator,
    ) -> Result<Vec<String>> {
        let selector = Selector::new(scoped(storage_id, repository_ids, predicate))
            .with_paginator(paginator.clone());

        let mut paths: Vec<String> = Vec::new();
        for entry in self.store.search(&selector).await? {
            if !paths.iter().any(|p| p == entry.artifact_path()) {
                paths.push(entry.key.artifact_path);
            }
        }
        Ok(paths)
    }

    pub async fn count_entries(
        &self,
        storage_id: &str,
        repository_ids: &[&str],
        predicate: &Predicate,
    ) -> Result<u64> {
        self.store
            .count(&scoped(storage_id, repository_ids, predicate))
            .await
    }
}

fn scoped(storage_id: &str, repository_ids: &[&str], predicate: &Predicate) -> Predicate {
    let scope = match repository_ids {
        [single] => repository_scope(storage_id, single),
        many => {
            let members = many
                .iter()
                .map(|id| Predicate::of(Expression::eq(Field::RepositoryId, *id)))
                .collect();
            Predicate::of(Expression::eq(Field::StorageId, storage_id)).and(Predicate::Or(members))
        }
    };
    scope.and(predicate.clone())
}

#[async_trait]
impl RepositoryStreamCallback for ProviderSupport {
    async fn on_before_write(&self, ctx: &RepositoryStreamContext) -> Result<()> {
        let path = ctx.path();
        tracing::debug!(path = %path, "Writing artifact");

        let (_lock, mut entry) = self.provide_entry(path).await?;
        if let Some(coordinates) = ctx.coordinates() {
            entry.coordinates = coordinates.coordinates();
        }
        let now = Utc::now();
        entry.last_updated = Some(now);
        entry.last_used = Some(now);

        self.store.save(entry).await?;
        Ok(())
    }

    async fn on_after_close(&self, ctx: &RepositoryStreamContext) -> Result<()> {
        let path = ctx.path();
        tracing::debug!(path = %path, bytes = ctx.bytes_written(), "Closing artifact");

        let (_lock, mut entry) = self.provide_entry(path).await?;
        if !entry.is_persisted() {
            tracing::error!(path = %path, "Artifact entry missing after write");
            return Err(Error::inconsistent_entry(
                path.to_string(),
                "entry should have been created when the stream was opened",
            ));
        }
        entry.size_in_bytes = Some(ctx.bytes_written());

        self.store.save(entry).await?;
        Ok(())
    }

    async fn on_before_read(&self, ctx: &RepositoryStreamContext) -> Result<()> {
        let path = ctx.path();
        tracing::debug!(path = %path, "Reading artifact");

        let (_lock, mut entry) = self.provide_entry(path).await?;
        entry.last_used = Some(Utc::now());
        entry.download_count += 1;

        self.store.save(entry).await?;
        Ok(())
    }
}
