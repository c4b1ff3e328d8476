//! Remote side of proxy repositories
//!
//! A [`RemoteTransport`] moves bytes from the remote repository; a
//! [`ProxyRepositoryArtifactResolver`] decides what to do with them. The default
//! resolver caches everything it downloads into local storage.

use crate::hosted::HostedRepositoryProvider;
use crate::io::{ByteStream, RepositoryInputStream};
use crate::provider::RepositoryProvider;
use async_trait::async_trait;
use depot_core::{Error, RemoteRepository, RepositoryPath, Result};
use futures::TryStreamExt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::io::StreamReader;

#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Open the remote artifact published at `path`; `Ok(None)` when the remote has no such artifact.
    async fn fetch(&self, remote: &RemoteRepository, path: &str) -> Result<Option<ByteStream>>;
}

/// HTTP transport using `reqwest`.
pub struct HttpRemoteTransport {
    client: reqwest::Client,
}

impl HttpRemoteTransport {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::config_error(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn url(remote: &RemoteRepository, path: &str) -> String {
        format!(
            "{}/{}",
            remote.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl RemoteTransport for HttpRemoteTransport {
    async fn fetch(&self, remote: &RemoteRepository, path: &str) -> Result<Option<ByteStream>> {
        let url = Self::url(remote, path);
        tracing::debug!(url = %url, "Fetching remote artifact");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::RemoteFetch {
                path: path.to_string(),
                source: io::Error::other(e),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(url = %url, "Remote artifact not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::RemoteFetch {
                path: path.to_string(),
                source: io::Error::other(format!("remote responded with HTTP {status}")),
            });
        }

        let body = response.bytes_stream().map_err(io::Error::other);
        Ok(Some(Box::new(StreamReader::new(Box::pin(body)))))
    }
}

/// Produces the bytes of a proxied artifact, with whatever side effects the
/// resolver needs to cache them.
#[async_trait]
pub trait ProxyRepositoryArtifactResolver: Send + Sync {
    async fn get_input_stream(&self, path: &RepositoryPath) -> Result<Option<RepositoryInputStream>>;
}

/// Resolver that stores remote artifacts in the proxy repository's local storage.
///
/// The download goes through a regular decorated output stream, so the cached
/// entry is created and sized by the same hooks as any other write.
pub struct LocalStorageProxyArtifactResolver {
    transport: Arc<dyn RemoteTransport>,
    local: Arc<HostedRepositoryProvider>,
}

impl LocalStorageProxyArtifactResolver {
    pub fn new(transport: Arc<dyn RemoteTransport>, local: Arc<HostedRepositoryProvider>) -> Self {
        Self { transport, local }
    }

    async fn download(&self, path: &RepositoryPath, mut remote: ByteStream) -> Result<()> {
        let mut os = match self.local.get_output_stream(path).await {
            Ok(Some(os)) => os,
            Ok(None) => return Err(Error::storage(path.to_string(), "no local output stream")),
            Err(e) => {
                self.discard(path).await;
                return Err(e);
            }
        };

        let copied = tokio::io::copy(&mut remote, &mut os).await;
        let closed = os.shutdown().await;

        match (copied, closed) {
            (Ok(bytes), Ok(())) => {
                tracing::info!(path = %path, bytes, "Cached remote artifact");
                Ok(())
            }
            (Err(e), _) | (Ok(_), Err(e)) => {
                tracing::error!(path = %path, error = %e, "Remote artifact download failed");
                self.discard(path).await;
                Err(match Error::from_io(e) {
                    Error::IoError(source) => Error::RemoteFetch {
                        path: path.to_string(),
                        source,
                    },
                    domain => domain,
                })
            }
        }
    }

    /// Remove a partial download and stop its entry from claiming the bytes.
    async fn discard(&self, path: &RepositoryPath) {
        match tokio::fs::remove_file(path.fs_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path, error = %e, "Failed to remove partial download"),
        }
        if let Err(e) = self.local.support().mark_uncached(path).await {
            tracing::warn!(path = %path, error = %e, "Failed to reset entry of partial download");
        }
    }
}

#[async_trait]
impl ProxyRepositoryArtifactResolver for LocalStorageProxyArtifactResolver {
    async fn get_input_stream(&self, path: &RepositoryPath) -> Result<Option<RepositoryInputStream>> {
        if let Some(cached) = self.local.get_input_stream(path).await? {
            return Ok(Some(cached));
        }

        let remote = path
            .repository()
            .remote
            .as_ref()
            .ok_or_else(|| Error::config_error(format!("repository {} has no remote", path.repository_id())))?;

        // a path the layout rejects is never worth a round trip
        self.local.support().coordinates(path)?;

        // remotes publish under the layout's resource path, not the storage path
        let resource = self
            .local
            .support()
            .layouts()
            .get(&path.repository().layout)
            .resource(path.relative());
        let Some(stream) = self.transport.fetch(remote, &resource).await? else {
            return Ok(None);
        };
        self.download(path, stream).await?;

        self.local.get_input_stream(path).await
    }
}
