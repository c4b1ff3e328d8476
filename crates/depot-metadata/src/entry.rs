//! Artifact metadata entries

use chrono::{DateTime, Utc};
use depot_core::Repository;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use uuid::Uuid;

/// Composite key of an entry: one entry per (storage, repository, path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntryKey {
    pub storage_id: String,
    pub repository_id: String,
    pub artifact_path: String,
}

impl ArtifactEntryKey {
    pub fn new(
        storage_id: impl Into<String>,
        repository_id: impl Into<String>,
        artifact_path: impl Into<String>,
    ) -> Self {
        Self {
            storage_id: storage_id.into(),
            repository_id: repository_id.into(),
            artifact_path: artifact_path.into(),
        }
    }
}

impl fmt::Display for ArtifactEntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.storage_id, self.repository_id, self.artifact_path
        )
    }
}

/// Entry variant, chosen from the owning repository's kind when the entry is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EntryKind {
    Hosted,
    #[serde(rename_all = "camelCase")]
    Remote { is_cached: bool },
}

impl EntryKind {
    /// Proxy repositories produce cached remote entries; everything else is hosted.
    pub fn for_repository(repository: &Repository) -> Self {
        if repository.is_proxy() {
            EntryKind::Remote { is_cached: true }
        } else {
            EntryKind::Hosted
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, EntryKind::Remote { .. })
    }
}

/// Persisted metadata for one artifact path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactEntry {
    /// Persisted identity; `None` until the entry is first saved
    pub uuid: Option<Uuid>,

    #[serde(flatten)]
    pub key: ArtifactEntryKey,

    #[serde(default)]
    pub coordinates: BTreeMap<String, String>,

    pub size_in_bytes: Option<u64>,

    pub last_updated: Option<DateTime<Utc>>,

    pub last_used: Option<DateTime<Utc>>,

    #[serde(default)]
    pub download_count: u64,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(flatten)]
    pub kind: EntryKind,
}

impl ArtifactEntry {
    /// A fresh, not yet persisted entry
    pub fn new(key: ArtifactEntryKey, kind: EntryKind) -> Self {
        Self {
            uuid: None,
            key,
            coordinates: BTreeMap::new(),
            size_in_bytes: None,
            last_updated: None,
            last_used: None,
            download_count: 0,
            tags: BTreeSet::new(),
            kind,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.uuid.is_some()
    }

    pub fn storage_id(&self) -> &str {
        &self.key.storage_id
    }

    pub fn repository_id(&self) -> &str {
        &self.key.repository_id
    }

    pub fn artifact_path(&self) -> &str {
        &self.key.artifact_path
    }

    /// `Some(is_cached)` for remote entries, `None` for hosted ones
    pub fn is_cached(&self) -> Option<bool> {
        match self.kind {
            EntryKind::Remote { is_cached } => Some(is_cached),
            EntryKind::Hosted => None,
        }
    }
}
