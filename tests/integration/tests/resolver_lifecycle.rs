//! Resolver lifecycle integration tests.
//!
//! Tests for initialization, background refresh, failure policy, shutdown
//! and snapshot consistency under concurrent queries.

use std::sync::Arc;
use std::time::Duration;

use kc_saml_metadata::{
    MetadataError, MetadataResolver, RefreshPolicy, ResolverConfig, ResolverCriteria,
    ResolverState, RoleKind,
};

use crate::common::{init_tracing, wait_for_fetches, wait_for_state, FlakySource, FEDERATION_XML};

const TIMEOUT: Duration = Duration::from_secs(5);

fn pair_document(prefix: &str) -> String {
    format!(
        r#"<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" Name="{prefix}">
  <md:EntityDescriptor entityID="https://{prefix}-1.example.org">
    <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"/>
  </md:EntityDescriptor>
  <md:EntityDescriptor entityID="https://{prefix}-2.example.org">
    <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"/>
  </md:EntityDescriptor>
</md:EntitiesDescriptor>"#
    )
}

async fn start(source: &FlakySource, config: ResolverConfig) -> anyhow::Result<MetadataResolver> {
    init_tracing();
    let resolver = MetadataResolver::builder()
        .with_config(config)
        .with_source(Arc::new(source.clone()))
        .build()?;
    resolver.initialize().await?;
    Ok(resolver)
}

fn refreshing_every(millis: u64) -> ResolverConfig {
    ResolverConfig::default()
        .with_id("lifecycle")
        .with_refresh(RefreshPolicy::every(Duration::from_millis(millis)))
}

fn is_resolvable(resolver: &MetadataResolver, entity_id: &str) -> bool {
    resolver
        .resolve(&ResolverCriteria::entity_id(entity_id))
        .map(|found| !found.is_empty())
        .unwrap_or(false)
}

/// A fresh resolver reports its state and serves the document.
#[tokio::test]
async fn test_initialize_reports_status() -> anyhow::Result<()> {
    let source = FlakySource::new(FEDERATION_XML);
    let resolver = start(&source, ResolverConfig::default().with_id("federation")).await?;

    let status = resolver.status();
    assert_eq!(status.id, "federation");
    assert_eq!(status.state, ResolverState::Ready);
    assert_eq!(status.entity_count, 4);
    assert_eq!(status.consecutive_failures, 0);
    assert!(status.last_success.is_some());
    assert!(status.last_error.is_none());

    let json = serde_json::to_value(&status)?;
    assert_eq!(json["state"], "READY");
    Ok(())
}

/// A failing first fetch is fatal and leaves nothing to serve.
#[tokio::test]
async fn test_failed_initialization_is_fatal() -> anyhow::Result<()> {
    init_tracing();
    let source = FlakySource::new(FEDERATION_XML);
    source.set_failing(true);
    let resolver = MetadataResolver::builder()
        .with_config(refreshing_every(20))
        .with_source(Arc::new(source.clone()))
        .build()?;

    let result = resolver.initialize().await;
    assert!(matches!(result, Err(MetadataError::Source(_))));
    assert_eq!(resolver.state(), ResolverState::Failed);

    // No background refresh was started.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(source.fetches(), 1);

    source.set_failing(false);
    assert!(matches!(resolver.refresh().await, Err(MetadataError::Resolver(_))));
    assert_eq!(resolver.state(), ResolverState::Failed);
    assert_eq!(source.fetches(), 1);
    Ok(())
}

/// Background refresh publishes a changed document.
#[tokio::test]
async fn test_background_refresh_publishes_changes() -> anyhow::Result<()> {
    let source = FlakySource::new(pair_document("old"));
    let resolver = start(&source, refreshing_every(25)).await?;
    assert!(is_resolvable(&resolver, "https://old-1.example.org"));

    source.replace(pair_document("new"));
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while !is_resolvable(&resolver, "https://new-1.example.org") {
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "refresh never published");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!is_resolvable(&resolver, "https://old-1.example.org"));

    resolver.shutdown().await;
    Ok(())
}

/// Failed refreshes keep serving the last good snapshot.
#[tokio::test]
async fn test_failed_refresh_keeps_stale_snapshot() -> anyhow::Result<()> {
    let source = FlakySource::new(FEDERATION_XML);
    let resolver = start(&source, refreshing_every(20)).await?;

    source.set_failing(true);
    let seen = source.fetches();
    wait_for_fetches(&source, seen + 3, TIMEOUT).await?;

    assert!(resolver.state().is_serving());
    assert!(is_resolvable(&resolver, "https://idp.example.org"));
    let status = resolver.status();
    assert!(status.consecutive_failures >= 1);
    assert!(status.last_error.is_some());

    source.set_failing(false);
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while resolver.status().consecutive_failures != 0 {
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "resolver never recovered");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    resolver.shutdown().await;
    Ok(())
}

/// Without keep-stale a failed refresh withdraws the snapshot.
#[tokio::test]
async fn test_failed_refresh_without_keep_stale_fails() -> anyhow::Result<()> {
    let source = FlakySource::new(FEDERATION_XML);
    let config = ResolverConfig::default()
        .with_refresh(RefreshPolicy::every(Duration::from_millis(20)).with_keep_stale(false));
    let resolver = start(&source, config).await?;

    source.set_failing(true);
    wait_for_state(&resolver, ResolverState::Failed, TIMEOUT).await?;
    let result = resolver.resolve(&ResolverCriteria::entity_id("https://idp.example.org"));
    assert!(matches!(result, Err(MetadataError::Unavailable(_))));

    source.set_failing(false);
    wait_for_state(&resolver, ResolverState::Ready, TIMEOUT).await?;
    assert!(is_resolvable(&resolver, "https://idp.example.org"));

    resolver.shutdown().await;
    Ok(())
}

/// A snapshot older than the staleness limit stops being served.
#[tokio::test]
async fn test_max_staleness_fails_resolver() -> anyhow::Result<()> {
    let source = FlakySource::new(FEDERATION_XML);
    let config = ResolverConfig::default().with_refresh(
        RefreshPolicy::every(Duration::from_millis(20)).with_max_staleness(Duration::from_millis(150)),
    );
    let resolver = start(&source, config).await?;

    source.set_failing(true);
    wait_for_state(&resolver, ResolverState::Failed, TIMEOUT).await?;
    assert!(resolver.snapshot().is_none());

    resolver.shutdown().await;
    Ok(())
}

/// Shutdown stops refreshing and withdraws the snapshot.
#[tokio::test]
async fn test_shutdown_stops_refresh() -> anyhow::Result<()> {
    let source = FlakySource::new(FEDERATION_XML);
    let resolver = start(&source, refreshing_every(10)).await?;
    wait_for_fetches(&source, 3, TIMEOUT).await?;

    resolver.shutdown().await;
    let after_shutdown = source.fetches();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(source.fetches(), after_shutdown);
    assert_eq!(resolver.state(), ResolverState::ShutDown);
    let result = resolver.resolve(&ResolverCriteria::role(RoleKind::IdpSso));
    assert!(matches!(result, Err(MetadataError::Unavailable(_))));
    Ok(())
}

/// Queries racing refreshes always see one complete snapshot.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_queries_see_whole_snapshots_during_refresh() -> anyhow::Result<()> {
    let source = FlakySource::new(pair_document("a"));
    let resolver = start(&source, ResolverConfig::default()).await?;

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let resolver = resolver.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    let found = resolver.resolve(&ResolverCriteria::role(RoleKind::SpSso))?;
                    let ids: Vec<&str> = found.iter().map(|e| e.entity_id()).collect();
                    let consistent = ids == ["https://a-1.example.org", "https://a-2.example.org"]
                        || ids == ["https://b-1.example.org", "https://b-2.example.org"];
                    anyhow::ensure!(consistent, "mixed snapshot: {ids:?}");
                    tokio::task::yield_now().await;
                }
                Ok(())
            })
        })
        .collect();

    for round in 0..20 {
        source.replace(pair_document(if round % 2 == 0 { "b" } else { "a" }));
        resolver.refresh().await?;
    }

    for reader in readers {
        reader.await??;
    }
    Ok(())
}
