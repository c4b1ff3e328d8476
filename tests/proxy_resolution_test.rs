// Proxy resolution tests
// Fetch-on-miss through the resolution service, end to end over a temp directory

mod common;

use common::{MockRemote, TestDepot};
use depot_core::Error;
use depot_providers::{RepositoryEvent, RepositoryPageRequest, RepositorySearchRequest};
use std::sync::Arc;
use std::time::Duration;

const TARBALL: &str = "@types/node/8.0.51/node-8.0.51.tgz";
const RESOURCE: &str = "@types/node/-/node-8.0.51.tgz";

#[tokio::test]
async fn test_fetch_on_miss_materializes_once() -> anyhow::Result<()> {
    let depot = TestDepot::new();
    depot.remote.publish(RESOURCE, b"node types");

    let resolved = depot
        .service
        .resolve_path("storage0", "npmjs", TARBALL)
        .await?
        .expect("artifact fetched from remote");
    assert_eq!(resolved.repository_id(), "npmjs");
    assert!(resolved.is_file().await);
    assert_eq!(depot.remote.calls(), 1);

    let entry = depot.entry(&resolved).await.expect("cached entry");
    assert_eq!(entry.is_cached(), Some(true));
    assert_eq!(entry.size_in_bytes, Some(10));
    assert_eq!(entry.coordinates.get("scope").map(String::as_str), Some("@types"));

    // served from the local cache from now on
    depot.service.resolve_path("storage0", "npmjs", TARBALL).await?;
    assert_eq!(depot.read(&resolved).await?, b"node types");
    assert_eq!(depot.remote.calls(), 1);
    assert_eq!(depot.entry(&resolved).await.unwrap().download_count, 1);
    Ok(())
}

#[tokio::test]
async fn test_proxy_read_never_reaches_remote() {
    let depot = TestDepot::new();
    depot.remote.publish(RESOURCE, b"node types");

    let err = depot
        .service
        .get_input_stream(&depot.path("npmjs", TARBALL))
        .await
        .err()
        .unwrap();
    assert!(err.is_not_found());
    assert_eq!(depot.remote.calls(), 0);
}

#[tokio::test]
async fn test_local_directory_short_circuits() -> anyhow::Result<()> {
    let depot = TestDepot::new();
    let directory = depot.path("npmjs", "@types/node");
    tokio::fs::create_dir_all(directory.fs_path()).await?;

    let resolved = depot
        .service
        .resolve_path("storage0", "npmjs", "@types/node")
        .await?;
    assert_eq!(resolved, Some(directory));
    assert_eq!(depot.remote.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_remote_miss_is_not_found() -> anyhow::Result<()> {
    let depot = TestDepot::new();

    let resolved = depot
        .service
        .resolve_path("storage0", "npmjs", TARBALL)
        .await?;
    assert!(resolved.is_none());
    assert_eq!(depot.remote.calls(), 1);
    assert!(depot.entry(&depot.path("npmjs", TARBALL)).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_malformed_proxy_path_is_never_cached() {
    let depot = TestDepot::new();
    let bad = "@Types/node/8.0.51/node-8.0.51.tgz";
    depot.remote.publish("@Types/node/-/node-8.0.51.tgz", b"node types");

    for _ in 0..2 {
        let err = depot
            .service
            .resolve_path("storage0", "npmjs", bad)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinates { .. }));
    }
    assert!(!depot.path("npmjs", bad).exists().await);
    assert!(depot.store.is_empty());
    assert_eq!(depot.remote.calls(), 0);
}

#[tokio::test]
async fn test_concurrent_cold_fetches_share_one_download() -> anyhow::Result<()> {
    let depot = Arc::new(TestDepot::with_remote(MockRemote::with_delay(
        Duration::from_millis(50),
    )));
    depot.remote.publish(RESOURCE, b"node types");

    let fetches: Vec<_> = (0..10)
        .map(|_| {
            let depot = depot.clone();
            tokio::spawn(async move {
                depot
                    .service
                    .resolve_path("storage0", "npmjs", TARBALL)
                    .await
            })
        })
        .collect();
    for fetch in fetches {
        assert!(fetch.await??.is_some());
    }

    assert_eq!(depot.remote.calls(), 1);
    Ok(())
}

#[tokio::test]
async fn test_proxy_events() -> anyhow::Result<()> {
    let depot = TestDepot::new();
    depot.remote.publish(RESOURCE, b"node types");
    let mut events = depot.events.subscribe();

    depot.service.resolve_path("storage0", "npmjs", TARBALL).await?;
    match events.recv().await? {
        RepositoryEvent::ArtifactFetchedFromRemote {
            repository_id,
            path,
            ..
        } => {
            assert_eq!(repository_id, "npmjs");
            assert_eq!(path, TARBALL);
        }
        other => panic!("unexpected event {other:?}"),
    }

    let request = RepositorySearchRequest::new("storage0", "npmjs").with_coordinate("name", "node");
    let found = depot
        .service
        .search(&request, &RepositoryPageRequest::default())
        .await?;
    assert_eq!(found, vec![TARBALL]);
    assert!(matches!(
        events.recv().await?,
        RepositoryEvent::RemoteRepositorySearch { .. }
    ));
    Ok(())
}

#[tokio::test]
async fn test_group_resolves_through_proxy_member() -> anyhow::Result<()> {
    let depot = TestDepot::new();
    depot.remote.publish(RESOURCE, b"node types");

    let group_path = depot.path("public", TARBALL);
    assert_eq!(depot.read(&group_path).await?, b"node types");
    assert_eq!(depot.remote.calls(), 1);

    let cached = depot.path("npmjs", TARBALL);
    assert_eq!(depot.entry(&cached).await.unwrap().download_count, 1);
    assert!(depot.entry(&group_path).await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_resource_url_uses_registry_layout() -> anyhow::Result<()> {
    let depot = TestDepot::new();

    let url = depot
        .service
        .resolve_resource(&depot.path("npmjs", TARBALL))?;
    assert_eq!(
        url.as_str(),
        "http://localhost:48080/storages/storage0/npmjs/@types/node/-/node-8.0.51.tgz"
    );
    assert_eq!(depot.remote.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_writes_to_proxy_are_refused() {
    let depot = TestDepot::new();

    let err = depot.write(&depot.path("npmjs", TARBALL), b"x").await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::ArtifactStorage { .. })
    ));
}
