//! Provider registry for dispatch by repository type

use crate::event::EventDispatcher;
use crate::group::GroupRepositoryProvider;
use crate::hosted::HostedRepositoryProvider;
use crate::provider::RepositoryProvider;
use crate::proxy::ProxyRepositoryProvider;
use crate::remote::{LocalStorageProxyArtifactResolver, RemoteTransport};
use crate::support::ProviderSupport;
use dashmap::DashMap;
use depot_core::{Configuration, Error, RepositoryType, Result};
use depot_layout::LayoutProviderRegistry;
use depot_metadata::ArtifactEntryStore;
use std::sync::Arc;

/// Registry of repository providers, one per repository type
pub struct RepositoryProviderRegistry {
    providers: DashMap<RepositoryType, Arc<dyn RepositoryProvider>>,
}

impl RepositoryProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
        }
    }

    /// Hosted, proxy and group providers sharing one entry store.
    pub fn standard(
        configuration: Arc<Configuration>,
        store: Arc<dyn ArtifactEntryStore>,
        layouts: Arc<LayoutProviderRegistry>,
        transport: Arc<dyn RemoteTransport>,
        events: Arc<dyn EventDispatcher>,
    ) -> Self {
        let support = Arc::new(ProviderSupport::new(store, layouts));
        let hosted = Arc::new(HostedRepositoryProvider::new(support.clone()));
        let resolver = Arc::new(LocalStorageProxyArtifactResolver::new(
            transport,
            hosted.clone(),
        ));
        let proxy = Arc::new(ProxyRepositoryProvider::new(hosted.clone(), resolver, events));
        let group = Arc::new(GroupRepositoryProvider::new(
            configuration,
            support,
            vec![
                hosted.clone() as Arc<dyn RepositoryProvider>,
                proxy.clone() as Arc<dyn RepositoryProvider>,
            ],
        ));

        let registry = Self::new();
        registry.register(hosted);
        registry.register(proxy);
        registry.register(group);
        registry
    }

    /// Register a provider under its own alias, replacing any previous one
    pub fn register(&self, provider: Arc<dyn RepositoryProvider>) {
        let alias = provider.alias();
        if self.providers.insert(alias, provider).is_some() {
            tracing::debug!(repository_type = %alias, "Replaced repository provider");
        }
    }

    pub fn get(&self, repo_type: RepositoryType) -> Result<Arc<dyn RepositoryProvider>> {
        self.providers
            .get(&repo_type)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ProviderNotFound(repo_type.to_string()))
    }

    pub fn types(&self) -> Vec<RepositoryType> {
        let mut types: Vec<_> = self.providers.iter().map(|entry| *entry.key()).collect();
        types.sort();
        types
    }
}

impl Default for RepositoryProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
