//! Repository provider trait definition

use crate::io::{RepositoryInputStream, RepositoryOutputStream};
use async_trait::async_trait;
use depot_core::{RepositoryPath, RepositoryType, Result};
use depot_metadata::{Expression, Field, Paginator, Predicate};
use std::collections::{BTreeMap, BTreeSet};

/// Coordinate and tag based search within one repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySearchRequest {
    pub storage_id: String,
    pub repository_id: String,
    pub coordinates: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
    /// Exact coordinate matches when set, substring matches otherwise
    pub strict: bool,
}

impl RepositorySearchRequest {
    pub fn new(storage_id: impl Into<String>, repository_id: impl Into<String>) -> Self {
        Self {
            storage_id: storage_id.into(),
            repository_id: repository_id.into(),
            ..Self::default()
        }
    }

    pub fn with_coordinate(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.coordinates.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Conjunction of one expression per coordinate and per tag.
    ///
    /// Blank coordinate values are skipped. The repository scope is not part of
    /// the result; providers add it when they run the query.
    pub fn to_predicate(&self) -> Predicate {
        let coordinates = self
            .coordinates
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| {
                let field = Field::coordinate(key.as_str());
                if self.strict {
                    Expression::eq(field, value.as_str())
                } else {
                    Expression::substring(field, value.as_str())
                }
            });
        let tags = self
            .tags
            .iter()
            .map(|tag| Expression::contains(Field::TagName, tag.as_str()));

        coordinates
            .chain(tags)
            .fold(Predicate::empty(), |acc, e| acc.and(Predicate::of(e)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryPageRequest {
    pub skip: usize,
    /// `None` means unbounded
    pub limit: Option<usize>,
}

impl RepositoryPageRequest {
    pub fn new(skip: usize, limit: Option<usize>) -> Self {
        Self { skip, limit }
    }

    pub fn paginator(&self) -> Paginator {
        Paginator::new(self.skip, self.limit)
    }
}

/// Storage backend for one repository kind.
///
/// Providers are stateless with respect to callers: every operation receives the
/// repository path (or storage and repository ids) it acts upon.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Repository kind this provider serves
    fn alias(&self) -> RepositoryType;

    /// A stream over the stored bytes, or `None` when nothing is stored at the path.
    async fn get_input_stream(&self, path: &RepositoryPath) -> Result<Option<RepositoryInputStream>>;

    /// A stream that stores bytes at the path, or `None` when the repository
    /// cannot hold artifacts itself.
    async fn get_output_stream(&self, path: &RepositoryPath)
    -> Result<Option<RepositoryOutputStream>>;

    /// Materialize the path locally and return where it lives, or `None`.
    async fn fetch_path(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>>;

    /// Logical paths of entries matching `predicate`, always restricted to the given repository.
    async fn search_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
        paginator: &Paginator,
    ) -> Result<Vec<String>>;

    async fn count_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> Result<u64>;

    async fn search(
        &self,
        request: &RepositorySearchRequest,
        page: &RepositoryPageRequest,
    ) -> Result<Vec<String>> {
        self.search_by_predicate(
            &request.storage_id,
            &request.repository_id,
            &request.to_predicate(),
            &page.paginator(),
        )
        .await
    }

    async fn count(&self, request: &RepositorySearchRequest) -> Result<u64> {
        self.count_by_predicate(
            &request.storage_id,
            &request.repository_id,
            &request.to_predicate(),
        )
        .await
    }
}
