//! Group repository provider
//!
//! A group has no storage of its own. Reads and fetches walk the member
//! repositories in declaration order and stop at the first hit; searches cover
//! all members at once.

use crate::io::{RepositoryInputStream, RepositoryOutputStream};
use crate::provider::RepositoryProvider;
use crate::support::ProviderSupport;
use async_trait::async_trait;
use depot_core::{Configuration, RepositoryPath, RepositoryType, Result};
use depot_metadata::{Paginator, Predicate};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct GroupRepositoryProvider {
    configuration: Arc<Configuration>,
    support: Arc<ProviderSupport>,
    members: BTreeMap<RepositoryType, Arc<dyn RepositoryProvider>>,
}

impl GroupRepositoryProvider {
    /// `members` serves the member repositories by kind; nested groups are not followed.
    pub fn new(
        configuration: Arc<Configuration>,
        support: Arc<ProviderSupport>,
        members: Vec<Arc<dyn RepositoryProvider>>,
    ) -> Self {
        let members = members
            .into_iter()
            .filter(|provider| provider.alias() != RepositoryType::Group)
            .map(|provider| (provider.alias(), provider))
            .collect();

        Self {
            configuration,
            support,
            members,
        }
    }

    /// Member paths paired with their providers, in declaration order
    fn member_paths(&self, path: &RepositoryPath) -> Result<Vec<(RepositoryPath, Arc<dyn RepositoryProvider>)>> {
        let mut resolved = Vec::new();
        for member_id in &path.repository().members {
            let member = self.configuration.repository(path.storage_id(), member_id)?;
            match self.members.get(&member.repo_type) {
                Some(provider) => resolved.push((path.with_repository(member), provider.clone())),
                None => tracing::warn!(
                    group = %path.repository_id(),
                    member = %member_id,
                    kind = %member.repo_type,
                    "Skipping group member without a provider"
                ),
            }
        }
        Ok(resolved)
    }

    fn member_ids(&self, storage_id: &str, repository_id: &str) -> Result<Vec<String>> {
        Ok(self
            .configuration
            .repository(storage_id, repository_id)?
            .members
            .clone())
    }
}

#[async_trait]
impl RepositoryProvider for GroupRepositoryProvider {
    fn alias(&self) -> RepositoryType {
        RepositoryType::Group
    }

    async fn get_input_stream(&self, path: &RepositoryPath) -> Result<Option<RepositoryInputStream>> {
        for (member_path, provider) in self.member_paths(path)? {
            let resolved = match provider.fetch_path(&member_path).await {
                Ok(Some(resolved)) => resolved,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(path = %member_path, error = %e, "Group member failed to resolve path");
                    continue;
                }
            };
            if let Some(stream) = provider.get_input_stream(&resolved).await? {
                tracing::debug!(path = %path, member = %resolved, "Serving from group member");
                return Ok(Some(stream));
            }
        }
        Ok(None)
    }

    async fn get_output_stream(
        &self,
        path: &RepositoryPath,
    ) -> Result<Option<RepositoryOutputStream>> {
        tracing::debug!(path = %path, "Group repositories do not accept writes");
        Ok(None)
    }

    async fn fetch_path(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>> {
        for (member_path, provider) in self.member_paths(path)? {
            match provider.fetch_path(&member_path).await {
                Ok(Some(resolved)) => return Ok(Some(resolved)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %member_path, error = %e, "Group member failed to resolve path")
                }
            }
        }
        Ok(None)
    }

    async fn search_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
        paginator: &Paginator,
    ) -> Result<Vec<String>> {
        let members = self.member_ids(storage_id, repository_id)?;
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let members: Vec<&str> = members.iter().map(String::as_str).collect();
        self.support
            .search_paths(storage_id, &members, predicate, paginator)
            .await
    }

    async fn count_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> Result<u64> {
        let members = self.member_ids(storage_id, repository_id)?;
        if members.is_empty() {
            return Ok(0);
        }
        let members: Vec<&str> = members.iter().map(String::as_str).collect();
        self.support
            .count_entries(storage_id, &members, predicate)
            .await
    }
}
