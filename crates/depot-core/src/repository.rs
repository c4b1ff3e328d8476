//! Storage and repository topology
//!
//! Storages and repositories are built once from [`DepotConfig`](crate::DepotConfig)
//! and shared as immutable `Arc` values for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Repository kind, used to select a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    Hosted,
    Proxy,
    Group,
}

impl RepositoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hosted => "hosted",
            Self::Proxy => "proxy",
            Self::Group => "group",
        }
    }
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote side of a proxy repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRepository {
    pub url: String,
}

/// A named, typed collection of artifacts owned by a [`Storage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub storage_id: String,
    pub repo_type: RepositoryType,
    pub layout: String,
    pub basedir: PathBuf,
    pub remote: Option<RemoteRepository>,
    /// Member repository ids, in resolution order (group repositories only).
    pub members: Vec<String>,
    pub in_service: bool,
    pub allows_deployment: bool,
}

impl Repository {
    /// Create a hosted repository rooted at `basedir`.
    pub fn hosted(
        storage_id: impl Into<String>,
        id: impl Into<String>,
        layout: impl Into<String>,
        basedir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            storage_id: storage_id.into(),
            repo_type: RepositoryType::Hosted,
            layout: layout.into(),
            basedir: basedir.into(),
            remote: None,
            members: Vec::new(),
            in_service: true,
            allows_deployment: true,
        }
    }

    /// Create a proxy repository caching `url` into `basedir`.
    pub fn proxy(
        storage_id: impl Into<String>,
        id: impl Into<String>,
        layout: impl Into<String>,
        basedir: impl Into<PathBuf>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            repo_type: RepositoryType::Proxy,
            remote: Some(RemoteRepository { url: url.into() }),
            allows_deployment: false,
            ..Self::hosted(storage_id, id, layout, basedir)
        }
    }

    /// Create a group repository over `members` of the same storage.
    pub fn group(
        storage_id: impl Into<String>,
        id: impl Into<String>,
        layout: impl Into<String>,
        basedir: impl Into<PathBuf>,
        members: Vec<String>,
    ) -> Self {
        Self {
            repo_type: RepositoryType::Group,
            members,
            allows_deployment: false,
            ..Self::hosted(storage_id, id, layout, basedir)
        }
    }

    pub fn is_proxy(&self) -> bool {
        self.repo_type == RepositoryType::Proxy
    }

    pub fn root(&self) -> &Path {
        &self.basedir
    }
}

/// A logical grouping of repositories.
#[derive(Debug, Clone)]
pub struct Storage {
    pub id: String,
    pub basedir: PathBuf,
    repositories: BTreeMap<String, Arc<Repository>>,
}

impl Storage {
    pub fn new(id: impl Into<String>, basedir: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            basedir: basedir.into(),
            repositories: BTreeMap::new(),
        }
    }

    pub fn add_repository(&mut self, repository: Repository) {
        self.repositories
            .insert(repository.id.clone(), Arc::new(repository));
    }

    pub fn repository(&self, repository_id: &str) -> Option<Arc<Repository>> {
        self.repositories.get(repository_id).cloned()
    }

    pub fn repositories(&self) -> impl Iterator<Item = &Arc<Repository>> {
        self.repositories.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_defaults() {
        let repo = Repository::proxy("storage0", "npmjs", "npm", "/tmp/npmjs", "https://registry.npmjs.org");
        assert!(repo.is_proxy());
        assert!(!repo.allows_deployment);
        assert_eq!(repo.remote.unwrap().url, "https://registry.npmjs.org");
    }

    #[test]
    fn test_storage_lookup() {
        let mut storage = Storage::new("storage0", "/tmp/storage0");
        storage.add_repository(Repository::hosted("storage0", "releases", "raw", "/tmp/storage0/releases"));

        assert!(storage.repository("releases").is_some());
        assert!(storage.repository("snapshots").is_none());
    }

    #[test]
    fn test_repository_type_serde() {
        let ty: RepositoryType = serde_json::from_str("\"proxy\"").unwrap();
        assert_eq!(ty, RepositoryType::Proxy);
        assert_eq!(ty.to_string(), "proxy");
    }
}
