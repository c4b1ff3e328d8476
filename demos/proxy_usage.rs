//! Example demonstrating proxy resolution against the public npm registry
//!
//! Run with `RUST_LOG=debug` to see the provider and metadata activity.

use depot_core::DepotConfig;
use depot_layout::LayoutProviderRegistry;
use depot_metadata::InMemoryArtifactEntryStore;
use depot_providers::{
    BroadcastEventChannel, HttpRemoteTransport, RepositoryPageRequest, RepositoryProviderRegistry,
    RepositorySearchRequest,
};
use depot_resolution::ArtifactResolutionService;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    depot_telemetry::init_telemetry();
    println!("=== Depot Proxy Example ===\n");

    let temp_dir = tempfile::tempdir()?;
    let configuration = Arc::new(DepotConfig::test_defaults(temp_dir.path()).build()?);
    let layouts = Arc::new(LayoutProviderRegistry::with_defaults());
    let events = BroadcastEventChannel::default();
    let mut notifications = events.subscribe();

    let providers = Arc::new(RepositoryProviderRegistry::standard(
        configuration.clone(),
        Arc::new(InMemoryArtifactEntryStore::new()),
        layouts.clone(),
        Arc::new(HttpRemoteTransport::new()?),
        Arc::new(events),
    ));
    let service = ArtifactResolutionService::new(configuration.clone(), providers, layouts);

    // 1. Fetch through the proxy; the first call downloads into the local cache
    println!("1. Resolving through the npmjs proxy:");
    let artifact = "left-pad/left-pad/1.3.0/left-pad-1.3.0.tgz";
    match service.resolve_path("storage0", "npmjs", artifact).await? {
        Some(path) => {
            let mut is = service.get_input_stream(&path).await?;
            let mut bytes = Vec::new();
            is.read_to_end(&mut bytes).await?;
            println!("  Cached {} ({} bytes)", path, bytes.len());
            println!("  Published at {}", service.resolve_resource(&path)?);
        }
        None => println!("  {} is not on the remote", artifact),
    }
    while let Ok(event) = notifications.try_recv() {
        println!("  Event: {:?}", event);
    }

    // 2. Deploy to the hosted repository
    println!("\n2. Deploying to the hosted repository:");
    let hosted = configuration.repository("storage0", "releases")?;
    let path = depot_core::RepositoryPath::new(hosted, "@acme/tool/1.0.0/tool-1.0.0.tgz");
    let mut os = service.get_output_stream(&path).await?;
    os.write_all(b"not really a tarball").await?;
    os.shutdown().await?;
    println!("  Stored {} ({} bytes)", path, os.bytes_written());

    // 3. Search what is known locally
    println!("\n3. Searching:");
    for repository_id in ["releases", "npmjs", "public"] {
        let request = RepositorySearchRequest::new("storage0", repository_id);
        let found = service
            .search(&request, &RepositoryPageRequest::new(0, Some(10)))
            .await?;
        println!("  {}: {:?}", repository_id, found);
    }

    Ok(())
}
