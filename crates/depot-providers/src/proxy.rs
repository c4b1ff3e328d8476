//! Proxy repository provider
//!
//! Makes a remote repository look local by caching artifacts on first access.
//! Reads, writes and searches are answered from local storage; only a local
//! miss in [`fetch_path`](RepositoryProvider::fetch_path) reaches the remote.

use crate::event::{EventDispatcher, RepositoryEvent};
use crate::hosted::HostedRepositoryProvider;
use crate::io::{RepositoryInputStream, RepositoryOutputStream};
use crate::provider::RepositoryProvider;
use crate::remote::ProxyRepositoryArtifactResolver;
use async_trait::async_trait;
use dashmap::DashMap;
use depot_core::{RepositoryPath, RepositoryType, Result};
use depot_metadata::{Paginator, Predicate};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct ProxyRepositoryProvider {
    local: Arc<HostedRepositoryProvider>,
    resolver: Arc<dyn ProxyRepositoryArtifactResolver>,
    events: Arc<dyn EventDispatcher>,
    /// Per-path fetch locks, present only while a fetch for the path is in flight
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl ProxyRepositoryProvider {
    pub fn new(
        local: Arc<HostedRepositoryProvider>,
        resolver: Arc<dyn ProxyRepositoryArtifactResolver>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        Self {
            local,
            resolver,
            events,
            in_flight: DashMap::new(),
        }
    }

    /// Download the path into local storage, one remote request per path at a time.
    async fn force_fetch(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>> {
        let flight_key = path.to_string();
        let flight = self
            .in_flight
            .entry(flight_key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let result = {
            let _guard = flight.lock().await;
            self.fetch_once(path).await
        };

        drop(flight);
        self.in_flight
            .remove_if(&flight_key, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    async fn fetch_once(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>> {
        // a concurrent caller may have cached it while we waited
        if let Some(cached) = self.local.fetch_path(path).await? {
            tracing::debug!(path = %path, "Artifact cached by a concurrent fetch");
            return Ok(Some(cached));
        }

        tracing::debug!(path = %path, "Fetching proxied artifact");
        match self.resolver.get_input_stream(path).await {
            Ok(Some(stream)) => {
                drop(stream);
                self.events
                    .dispatch_event(RepositoryEvent::ArtifactFetchedFromRemote {
                        storage_id: path.storage_id().to_string(),
                        repository_id: path.repository_id().to_string(),
                        path: path.relative().to_string(),
                    });
                Ok(Some(path.clone()))
            }
            Ok(None) => {
                tracing::debug!(path = %path, "Proxied artifact not found remotely");
                Ok(None)
            }
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to resolve proxied artifact");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl RepositoryProvider for ProxyRepositoryProvider {
    fn alias(&self) -> RepositoryType {
        RepositoryType::Proxy
    }

    async fn get_input_stream(&self, path: &RepositoryPath) -> Result<Option<RepositoryInputStream>> {
        self.local.get_input_stream(path).await
    }

    async fn get_output_stream(
        &self,
        path: &RepositoryPath,
    ) -> Result<Option<RepositoryOutputStream>> {
        self.local.get_output_stream(path).await
    }

    async fn fetch_path(&self, path: &RepositoryPath) -> Result<Option<RepositoryPath>> {
        // directories and cached files are always served locally
        if let Some(local) = self.local.fetch_path(path).await? {
            return Ok(Some(local));
        }

        self.force_fetch(path).await
    }

    async fn search_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
        paginator: &Paginator,
    ) -> Result<Vec<String>> {
        self.events
            .dispatch_event(RepositoryEvent::RemoteRepositorySearch {
                storage_id: storage_id.to_string(),
                repository_id: repository_id.to_string(),
                predicate: predicate.clone(),
                paginator: Some(paginator.clone()),
            });

        self.local
            .search_by_predicate(storage_id, repository_id, predicate, paginator)
            .await
    }

    async fn count_by_predicate(
        &self,
        storage_id: &str,
        repository_id: &str,
        predicate: &Predicate,
    ) -> Result<u64> {
        self.events
            .dispatch_event(RepositoryEvent::RemoteRepositorySearch {
                storage_id: storage_id.to_string(),
                repository_id: repository_id.to_string(),
                predicate: predicate.clone(),
                paginator: None,
            });

        self.local
            .count_by_predicate(storage_id, repository_id, predicate)
            .await
    }
}
