//! Artifact resolution façade

use crate::validator::ArtifactOperationsValidator;
use depot_core::{
    Configuration, Error, Repository, RepositoryPath, RepositoryPathResolver, Result,
};
use depot_layout::LayoutProviderRegistry;
use depot_providers::{
    RepositoryInputStream, RepositoryOutputStream, RepositoryPageRequest, RepositoryProvider,
    RepositoryProviderRegistry, RepositorySearchRequest,
};
use depot_telemetry::{ArtifactOperation, ArtifactSpanAttributes, trace_artifact_operation};
use std::sync::Arc;
use url::Url;

/// Entry point for every external caller.
///
/// Validates the request against repository policy, dispatches to the provider
/// registered for the repository's type and turns "nothing there" into the
/// matching error kind.
pub struct ArtifactResolutionService {
    configuration: Arc<Configuration>,
    providers: Arc<RepositoryProviderRegistry>,
    layouts: Arc<LayoutProviderRegistry>,
    path_resolver: RepositoryPathResolver,
    validator: ArtifactOperationsValidator,
}

impl ArtifactResolutionService {
    pub fn new(
        configuration: Arc<Configuration>,
        providers: Arc<RepositoryProviderRegistry>,
        layouts: Arc<LayoutProviderRegistry>,
    ) -> Self {
        Self {
            path_resolver: RepositoryPathResolver::new(configuration.clone()),
            configuration,
            providers,
            layouts,
            validator: ArtifactOperationsValidator::new(),
        }
    }

    pub fn configuration(&self) -> &Arc<Configuration> {
        &self.configuration
    }

    fn provider_for(&self, path: &RepositoryPath) -> Result<Arc<dyn RepositoryProvider>> {
        self.providers.get(path.repository().repo_type)
    }

    /// Open the stored artifact for reading.
    ///
    /// Fails with [`Error::ArtifactResolution`] when the provider has nothing at the path.
    pub async fn get_input_stream(&self, path: &RepositoryPath) -> Result<RepositoryInputStream> {
        let result = async {
            self.validator.validate(path)?;
            self.provider_for(path)?
                .get_input_stream(path)
                .await?
                .ok_or_else(|| Error::not_found(path.to_string()))
        }
        .await;

        record(ArtifactOperation::Read, path, outcome(&result));
        result
    }

    /// Open the artifact for writing.
    ///
    /// Fails with [`Error::ArtifactStorage`] when the repository refuses the write.
    pub async fn get_output_stream(&self, path: &RepositoryPath) -> Result<RepositoryOutputStream> {
        let result = async {
            self.validator.validate_deployment(path)?;
            self.provider_for(path)?
                .get_output_stream(path)
                .await?
                .ok_or_else(|| Error::storage(path.to_string(), "no output stream"))
        }
        .await;

        record(ArtifactOperation::Write, path, outcome(&result));
        result
    }

    pub async fn fetch_path(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>> {
        let result = async {
            self.validator.validate(path)?;
            self.provider_for(path)?.fetch_path(path).await
        }
        .await;

        let fetched = match &result {
            Ok(None) => "not_found",
            other => outcome(other),
        };
        record(ArtifactOperation::Fetch, path, fetched);
        result
    }

    /// Resolve a storage/repository/path triple and materialize it.
    ///
    /// For proxy repositories this is what populates the local cache.
    pub async fn resolve_path(
        &self,
        storage_id: &str,
        repository_id: &str,
        artifact_path: &str,
    ) -> Result<Option<RepositoryPath>> {
        let path = self
            .path_resolver
            .resolve(storage_id, repository_id, artifact_path)?;
        self.fetch_path(&path).await
    }

    /// Externally addressable URL of the artifact.
    ///
    /// `<base_uri>/storages/<storage>/<repository>/<layout resource>`; pure computation.
    /// Resource segments are percent-encoded; `?`, `#` and `/` never leave the path.
    pub fn resolve_resource(&self, path: &RepositoryPath) -> Result<Url> {
        self.validator.validate(path)?;

        let layout = self.layouts.get(&path.repository().layout);
        let resource = layout.resource(path.relative());

        let base = &self.configuration.base_uri;
        let mut url = base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::config_error(format!("base URI [{}] cannot carry a path", base)))?
            .pop_if_empty()
            .extend(["storages", path.storage_id(), path.repository_id()])
            .extend(resource.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    pub async fn search(
        &self,
        request: &RepositorySearchRequest,
        page: &RepositoryPageRequest,
    ) -> Result<Vec<String>> {
        let repository = self
            .configuration
            .repository(&request.storage_id, &request.repository_id)?;
        let result = async {
            self.providers
                .get(repository.repo_type)?
                .search(request, page)
                .await
        }
        .await;

        record_search(
            ArtifactOperation::Search,
            request,
            &repository,
            &result.as_ref().map(|paths| paths.len() as u64),
        );
        result
    }

    pub async fn count(&self, request: &RepositorySearchRequest) -> Result<u64> {
        let repository = self
            .configuration
            .repository(&request.storage_id, &request.repository_id)?;
        let result = async {
            self.providers
                .get(repository.repo_type)?
                .count(request)
                .await
        }
        .await;

        record_search(ArtifactOperation::Count, request, &repository, &result.as_ref().copied());
        result
    }
}

fn outcome<T, E: std::borrow::Borrow<Error>>(result: &std::result::Result<T, E>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(e) if e.borrow().is_not_found() => "not_found",
        Err(_) => "error",
    }
}

fn record(operation: ArtifactOperation, path: &RepositoryPath, outcome: &str) {
    tracing::debug!(path = %path, operation = %operation, outcome, "Artifact operation");

    trace_artifact_operation(ArtifactSpanAttributes {
        operation,
        storage_id: path.storage_id().to_string(),
        repository_id: path.repository_id().to_string(),
        repository_type: path.repository().repo_type.to_string(),
        path: Some(path.relative().to_string()),
        outcome: outcome.to_string(),
        results: None,
    });
}

fn record_search(
    operation: ArtifactOperation,
    request: &RepositorySearchRequest,
    repository: &Repository,
    result: &std::result::Result<u64, &Error>,
) {
    tracing::debug!(
        storage = %request.storage_id,
        repository = %request.repository_id,
        operation = %operation,
        results = result.as_ref().ok(),
        "Artifact query"
    );

    trace_artifact_operation(ArtifactSpanAttributes {
        operation,
        storage_id: request.storage_id.clone(),
        repository_id: request.repository_id.clone(),
        repository_type: repository.repo_type.to_string(),
        path: None,
        outcome: outcome(result).to_string(),
        results: result.as_ref().ok().copied(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use depot_core::{DepotConfig, RemoteRepository};
    use depot_metadata::InMemoryArtifactEntryStore;
    use depot_providers::{BroadcastEventChannel, ByteStream, RemoteTransport};
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct NoRemote;

    #[async_trait]
    impl RemoteTransport for NoRemote {
        async fn fetch(&self, _remote: &RemoteRepository, _path: &str) -> Result<Option<ByteStream>> {
            Ok(None)
        }
    }

    fn service(dir: &TempDir) -> ArtifactResolutionService {
        let configuration = Arc::new(DepotConfig::test_defaults(dir.path()).build().unwrap());
        let layouts = Arc::new(LayoutProviderRegistry::with_defaults());
        let providers = Arc::new(RepositoryProviderRegistry::standard(
            configuration.clone(),
            Arc::new(InMemoryArtifactEntryStore::new()),
            layouts.clone(),
            Arc::new(NoRemote),
            Arc::new(BroadcastEventChannel::default()),
        ));
        ArtifactResolutionService::new(configuration, providers, layouts)
    }

    fn path(service: &ArtifactResolutionService, repository_id: &str, artifact: &str) -> RepositoryPath {
        RepositoryPath::new(
            service.configuration().repository("storage0", repository_id).unwrap(),
            artifact,
        )
    }

    #[tokio::test]
    async fn test_missing_artifact_is_a_resolution_failure() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let err = service
            .get_input_stream(&path(&service, "releases", "react/react/1.0.0/react-1.0.0.tgz"))
            .await
            .err()
            .unwrap();
        assert!(err.is_not_found());
        assert_eq!(
            err.to_string(),
            "Artifact [storage0:releases/react/react/1.0.0/react-1.0.0.tgz] not found."
        );
    }

    #[tokio::test]
    async fn test_refused_write_is_a_storage_failure() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        for repository_id in ["npmjs", "public"] {
            let err = service
                .get_output_stream(&path(&service, repository_id, "react/react/1.0.0/react-1.0.0.tgz"))
                .await
                .err()
                .unwrap();
            assert!(matches!(err, Error::ArtifactStorage { .. }), "{repository_id}");
        }
    }

    #[tokio::test]
    async fn test_write_read_through_facade() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let target = path(&service, "releases", "@types/node/8.0.51/node-8.0.51.tgz");

        let mut os = service.get_output_stream(&target).await.unwrap();
        assert_eq!(os.coordinates().map(|c| c.id()), Some("@types/node".to_string()));
        os.write_all(b"types").await.unwrap();
        os.shutdown().await.unwrap();

        let mut is = service.get_input_stream(&target).await.unwrap();
        let mut buf = String::new();
        is.read_to_string(&mut buf).await.unwrap();
        assert_eq!(buf, "types");

        let resolved = service
            .resolve_path("storage0", "releases", "@types/node/8.0.51/node-8.0.51.tgz")
            .await
            .unwrap();
        assert_eq!(resolved, Some(target));
    }

    #[tokio::test]
    async fn test_invalid_path_is_rejected_before_dispatch() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let err = service
            .fetch_path(&path(&service, "releases", "../npmjs/secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = service
            .resolve_path("storage0", "missing", "a")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RepositoryNotFound { .. }));
    }

    #[test]
    fn test_resolve_resource() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let url = service
            .resolve_resource(&path(&service, "releases", "@types/node/8.0.51/node-8.0.51.tgz"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:48080/storages/storage0/releases/@types/node/-/node-8.0.51.tgz"
        );

        let url = service
            .resolve_resource(&path(&service, "releases", "react/react/18.2.0/react-18.2.0.tgz"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:48080/storages/storage0/releases/react/-/react-18.2.0.tgz"
        );
    }

    #[test]
    fn test_resolve_resource_escapes_path_segments() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);

        let url = service
            .resolve_resource(&path(&service, "releases", "evil:payload"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:48080/storages/storage0/releases/evil:payload"
        );

        let url = service
            .resolve_resource(&path(&service, "releases", "a/b?x=1#frag"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:48080/storages/storage0/releases/a/b%3Fx=1%23frag"
        );
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);

        let err = service
            .resolve_resource(&path(&service, "releases", "../npmjs/secret"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_search_and_count_through_facade() {
        let dir = TempDir::new().unwrap();
        let service = service(&dir);
        let target = path(&service, "releases", "react/react/18.2.0/react-18.2.0.tgz");

        let mut os = service.get_output_stream(&target).await.unwrap();
        os.write_all(b"react").await.unwrap();
        os.shutdown().await.unwrap();

        let request = RepositorySearchRequest::new("storage0", "releases").with_coordinate("name", "react");
        let found = service
            .search(&request, &RepositoryPageRequest::default())
            .await
            .unwrap();
        assert_eq!(found, vec!["react/react/18.2.0/react-18.2.0.tgz"]);
        assert_eq!(service.count(&request).await.unwrap(), 1);

        let unknown = RepositorySearchRequest::new("storage0", "missing");
        assert!(service.count(&unknown).await.is_err());
    }
}
