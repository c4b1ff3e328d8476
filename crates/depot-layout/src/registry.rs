//! Layout providers and their registry
//!
//! A repository names its layout by alias; the registry maps the alias to the
//! provider that knows how to decode paths of that layout.

use crate::coordinates::ArtifactCoordinates;
use crate::npm::{NPM_LAYOUT, NpmArtifactCoordinates};
use crate::raw::{RAW_LAYOUT, RawArtifactCoordinates};
use dashmap::DashMap;
use depot_core::Result;
use std::sync::Arc;

/// Layout-specific path handling
pub trait LayoutProvider: Send + Sync {
    fn alias(&self) -> &str;

    /// Whether the path names an artifact (as opposed to a directory or index file)
    fn is_artifact(&self, path: &str) -> bool;

    /// Decode the path into coordinates, failing with a format error
    fn coordinates(&self, path: &str) -> Result<Arc<dyn ArtifactCoordinates>>;

    /// Relative path under which the artifact is published
    fn resource(&self, path: &str) -> String {
        if self.is_artifact(path)
            && let Ok(coordinates) = self.coordinates(path)
        {
            return coordinates.to_resource();
        }
        path.to_string()
    }
}

/// npm layout
pub struct NpmLayoutProvider;

impl LayoutProvider for NpmLayoutProvider {
    fn alias(&self) -> &str {
        NPM_LAYOUT
    }

    fn is_artifact(&self, path: &str) -> bool {
        path.ends_with(".tgz") || path.ends_with("/package.json")
    }

    fn coordinates(&self, path: &str) -> Result<Arc<dyn ArtifactCoordinates>> {
        Ok(Arc::new(NpmArtifactCoordinates::parse(path)?))
    }
}

/// Layout without a naming scheme; every file is an artifact
pub struct RawLayoutProvider;

impl LayoutProvider for RawLayoutProvider {
    fn alias(&self) -> &str {
        RAW_LAYOUT
    }

    fn is_artifact(&self, path: &str) -> bool {
        !path.trim_matches('/').is_empty() && !path.ends_with('/')
    }

    fn coordinates(&self, path: &str) -> Result<Arc<dyn ArtifactCoordinates>> {
        Ok(Arc::new(RawArtifactCoordinates::parse(path)?))
    }
}

/// Layout registry for lookup by alias
pub struct LayoutProviderRegistry {
    providers: DashMap<String, Arc<dyn LayoutProvider>>,
    fallback: Arc<dyn LayoutProvider>,
}

impl LayoutProviderRegistry {
    /// Create a registry that only knows the raw layout
    pub fn new() -> Self {
        Self {
            providers: DashMap::new(),
            fallback: Arc::new(RawLayoutProvider),
        }
    }

    /// Create a registry with every built-in layout registered
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(Arc::new(NpmLayoutProvider));
        registry.register(Arc::new(RawLayoutProvider));
        registry
    }

    pub fn register(&self, provider: Arc<dyn LayoutProvider>) {
        self.providers.insert(provider.alias().to_string(), provider);
    }

    /// Get the provider for a layout alias, falling back to the raw layout
    pub fn get(&self, alias: &str) -> Arc<dyn LayoutProvider> {
        match self.providers.get(alias) {
            Some(provider) => provider.value().clone(),
            None => {
                tracing::debug!(layout = %alias, "Unknown layout, using raw");
                self.fallback.clone()
            }
        }
    }

    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.providers.iter().map(|e| e.key().clone()).collect();
        aliases.sort();
        aliases
    }
}

impl Default for LayoutProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
