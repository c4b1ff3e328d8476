//! # Depot Providers
//!
//! Repository providers: one storage backend per repository kind behind the
//! [`RepositoryProvider`] trait.
//!
//! - [`HostedRepositoryProvider`] stores artifacts on the local filesystem
//! - [`ProxyRepositoryProvider`] caches a remote repository on first access
//! - [`GroupRepositoryProvider`] aggregates member repositories
//!
//! Every stream a provider hands out is decorated so the artifact entry in the
//! metadata store tracks the bytes actually read and written.
//!
//! ## Example
//!
//! ```rust,no_run
//! use depot_core::{DepotConfig, RepositoryPath, RepositoryType};
//! use depot_layout::LayoutProviderRegistry;
//! use depot_metadata::InMemoryArtifactEntryStore;
//! use depot_providers::{BroadcastEventChannel, HttpRemoteTransport, RepositoryProviderRegistry};
//! use std::sync::Arc;
//!
//! # async fn example() -> depot_core::Result<()> {
//! let configuration = Arc::new(DepotConfig::load()?.build()?);
//! let registry = RepositoryProviderRegistry::standard(
//!     configuration.clone(),
//!     Arc::new(InMemoryArtifactEntryStore::new()),
//!     Arc::new(LayoutProviderRegistry::with_defaults()),
//!     Arc::new(HttpRemoteTransport::new()?),
//!     Arc::new(BroadcastEventChannel::default()),
//! );
//!
//! let repository = configuration.repository("storage0", "npmjs")?;
//! let path = RepositoryPath::new(repository, "react/react/18.2.0/react-18.2.0.tgz");
//! let cached = registry.get(RepositoryType::Proxy)?.fetch_path(&path).await?;
//! # Ok(())
//! # }
//! ```

mod event;
mod group;
mod hosted;
mod io;
mod provider;
mod proxy;
mod registry;
mod remote;
mod support;

pub use event::{BroadcastEventChannel, EventDispatcher, RepositoryEvent};
pub use group::GroupRepositoryProvider;
pub use hosted::HostedRepositoryProvider;
pub use io::{
    ByteSink, ByteStream, RepositoryInputStream, RepositoryOutputStream, RepositoryStreamCallback,
    RepositoryStreamContext,
};
pub use provider::{RepositoryPageRequest, RepositoryProvider, RepositorySearchRequest};
pub use proxy::ProxyRepositoryProvider;
pub use registry::RepositoryProviderRegistry;
pub use remote::{
    HttpRemoteTransport, LocalStorageProxyArtifactResolver, ProxyRepositoryArtifactResolver,
    RemoteTransport,
};
pub use support::{ProviderSupport, entry_key, repository_scope};
