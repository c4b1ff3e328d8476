//! Hosted repository provider backed by the local filesystem

use crate::io::{RepositoryInputStream, RepositoryOutputStream};
use crate::provider::RepositoryProvider;
use crate::support::ProviderSupport;
use async_trait::async_trait;
use depot_core::{RepositoryPath, RepositoryType, Result};
use depot_metadata::{Paginator, Predicate};
use std::io::ErrorKind;
use std::sync::Arc;

/// Serves artifacts stored under the repository's base directory.
///
/// Also acts as the local side of proxy repositories, which share its storage
/// and differ only in how misses are handled.
pub struct HostedRepositoryProvider {
    support: Arc<ProviderSupport>,
}

impl HostedRepositoryProvider {
    pub fn new(support: Arc<ProviderSupport>) -> Self {
        Self { support }
    }

    pub fn support(&self) -> &Arc<ProviderSupport> {
        &self.support
    }
}

#[async_trait]
impl RepositoryProvider for HostedRepositoryProvider {
    fn alias(&self) -> RepositoryType {
        RepositoryType::Hosted
    }

    async fn get_input_stream(&self, path: &RepositoryPath) -> Result<Option<RepositoryInputStream>> {
        if !path.is_file().await {
            return Ok(None);
        }

        let file = match tokio::fs::File::open(path.fs_path()).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(self.support.decorate_input(path, Box::new(file))))
    }

    async fn get_output_stream(
        &self,
        path: &RepositoryPath,
    ) -> Result<Option<RepositoryOutputStream>> {
        // nothing touches the filesystem until the path is known to be valid
        let coordinates = self.support.coordinates(path)?;

        let target = path.fs_path();
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = tokio::fs::File::create(&target).await?;
        tracing::trace!(path = %path, target = %target.display(), "Opened artifact for writing");
        Ok(Some(
            self.support
                .decorate_output(path, coordinates, Box::new(file)),
        ))
    }

    async fn fetch_path(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>> {
        if path.exists().await {
            Ok(Some(path.clone()))
        } else {
            Ok(None)
        }
    }

    async fn search_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
        paginator: &Paginator,
    ) -> Result<Vec<String>> {
        self.support
            .search_paths(storage_id, &[repository_id], predicate, paginator)
            .await
    }

    async fn count_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> Result<u64> {
        self.support
            .count_entries(storage_id, &[repository_id], predicate)
            .await
    }
}
