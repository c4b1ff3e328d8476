//! Repository-scoped artifact paths

use crate::config::Configuration;
use crate::repository::Repository;
use crate::Result;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// A path value scoped to one repository.
///
/// The relative part always uses `/` separators and never crosses into another
/// repository; it resolves back to its owning repository and storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryPath {
    repository: Arc<Repository>,
    path: String,
}

impl RepositoryPath {
    pub fn new(repository: Arc<Repository>, path: impl Into<String>) -> Self {
        Self {
            repository,
            path: path.into(),
        }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repository
    }

    pub fn storage_id(&self) -> &str {
        &self.repository.storage_id
    }

    pub fn repository_id(&self) -> &str {
        &self.repository.id
    }

    /// The logical path relative to the repository root
    pub fn relative(&self) -> &str {
        &self.path
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit('/').find(|segment| !segment.is_empty())
    }

    /// The same logical path inside another repository
    pub fn with_repository(&self, repository: Arc<Repository>) -> Self {
        Self::new(repository, self.path.clone())
    }

    /// Whether the path is absolute or walks out of the repository root.
    pub fn escapes_root(&self) -> bool {
        if self.path.starts_with('/') || self.path.starts_with('\\') {
            return true;
        }

        let mut depth: i64 = 0;
        for component in Path::new(&self.path).components() {
            match component {
                Component::Normal(_) => depth += 1,
                Component::CurDir => {}
                Component::ParentDir => {
                    depth -= 1;
                    if depth < 0 {
                        return true;
                    }
                }
                Component::RootDir | Component::Prefix(_) => return true,
            }
        }

        false
    }

    /// Concrete location under the repository basedir.
    ///
    /// `..` never climbs above the basedir, so the result stays inside the root.
    pub fn fs_path(&self) -> PathBuf {
        let mut segments = Vec::new();
        for component in Path::new(&self.path).components() {
            match component {
                Component::Normal(segment) => segments.push(segment),
                Component::ParentDir => {
                    segments.pop();
                }
                _ => {}
            }
        }
        segments
            .into_iter()
            .fold(self.repository.basedir.clone(), |target, segment| target.join(segment))
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(self.fs_path()).await.is_ok()
    }

    pub async fn is_dir(&self) -> bool {
        fs::metadata(self.fs_path())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    pub async fn is_file(&self) -> bool {
        fs::metadata(self.fs_path())
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }
}

impl fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.repository.storage_id, self.repository.id, self.path
        )
    }
}

/// Maps (storageId, repositoryId, relative path) to a [`RepositoryPath`].
#[derive(Debug, Clone)]
pub struct RepositoryPathResolver {
    configuration: Arc<Configuration>,
}

impl RepositoryPathResolver {
    pub fn new(configuration: Arc<Configuration>) -> Self {
        Self { configuration }
    }

    pub fn resolve(
        &self,
        storage_id: &str,
        repository_id: &str,
        path: &str,
    ) -> Result<RepositoryPath> {
        let repository = self.configuration.repository(storage_id, repository_id)?;
        Ok(RepositoryPath::new(repository, path))
    }
}
