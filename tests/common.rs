//! Common test utilities and helpers
#![allow(dead_code)]

use async_trait::async_trait;
use depot_core::{Configuration, DepotConfig, RemoteRepository, RepositoryPath};
use depot_layout::LayoutProviderRegistry;
use depot_metadata::{ArtifactEntry, ArtifactEntryStore, InMemoryArtifactEntryStore};
use depot_providers::{
    BroadcastEventChannel, ByteStream, RemoteTransport, RepositoryProviderRegistry, entry_key,
};
use depot_resolution::ArtifactResolutionService;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// In-memory stand-in for a remote registry keyed by resource path; counts every fetch.
#[derive(Default)]
pub struct MockRemote {
    artifacts: Mutex<HashMap<String, Vec<u8>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockRemote {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn publish(&self, path: &str, bytes: &[u8]) {
        self.artifacts
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteTransport for MockRemote {
    async fn fetch(
        &self,
        _remote: &RemoteRepository,
        path: &str,
    ) -> depot_core::Result<Option<ByteStream>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let body = self.artifacts.lock().unwrap().get(path).cloned();
        Ok(body.map(|bytes| Box::new(std::io::Cursor::new(bytes)) as ByteStream))
    }
}

/// A fully wired depot over a temporary directory.
///
/// Storage `storage0` holds `releases` (hosted), `npmjs` (proxy) and
/// `public` (group of both).
pub struct TestDepot {
    _dir: TempDir,
    pub configuration: Arc<Configuration>,
    pub store: Arc<InMemoryArtifactEntryStore>,
    pub remote: Arc<MockRemote>,
    pub events: BroadcastEventChannel,
    pub service: ArtifactResolutionService,
}

impl TestDepot {
    pub fn new() -> Self {
        Self::with_remote(MockRemote::default())
    }

    pub fn with_remote(remote: MockRemote) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let configuration = Arc::new(
            DepotConfig::test_defaults(dir.path())
                .build()
                .expect("Failed to build test configuration"),
        );
        let store = Arc::new(InMemoryArtifactEntryStore::new());
        let remote = Arc::new(remote);
        let events = BroadcastEventChannel::new(64);
        let layouts = Arc::new(LayoutProviderRegistry::with_defaults());

        let providers = Arc::new(RepositoryProviderRegistry::standard(
            configuration.clone(),
            store.clone(),
            layouts.clone(),
            remote.clone(),
            Arc::new(events.clone()),
        ));
        let service = ArtifactResolutionService::new(configuration.clone(), providers, layouts);

        Self {
            _dir: dir,
            configuration,
            store,
            remote,
            events,
            service,
        }
    }

    pub fn path(&self, repository_id: &str, artifact_path: &str) -> RepositoryPath {
        let repository = self
            .configuration
            .repository("storage0", repository_id)
            .expect("Unknown test repository");
        RepositoryPath::new(repository, artifact_path)
    }

    pub async fn write(&self, path: &RepositoryPath, bytes: &[u8]) -> anyhow::Result<()> {
        let mut os = self.service.get_output_stream(path).await?;
        os.write_all(bytes).await?;
        os.shutdown().await?;
        Ok(())
    }

    pub async fn read(&self, path: &RepositoryPath) -> anyhow::Result<Vec<u8>> {
        let mut is = self.service.get_input_stream(path).await?;
        let mut buf = Vec::new();
        is.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    pub async fn entry(&self, path: &RepositoryPath) -> Option<ArtifactEntry> {
        self.store
            .find_one(&entry_key(path))
            .await
            .expect("Metadata store failed")
    }
}
