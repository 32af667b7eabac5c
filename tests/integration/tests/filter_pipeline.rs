//! Filter pipeline integration tests.
//!
//! Tests for role, predicate, node processing and validity filters, both on
//! their own and composed through the resolver.

use std::sync::Arc;

use kc_saml_metadata::{
    EntitiesDescriptorNameProcessor, EntityIdPredicate, EntityRoleFilter, FilesystemSource,
    GroupNamePredicate, InMemorySource, MetadataError, MetadataFilter, MetadataFilterChain,
    MetadataResolver, NodeProcessingFilter, PredicateFilter, RequiredValidUntilFilter,
    ResolverCriteria, RoleKind,
};

use crate::common::{init_tracing, parse, FEDERATION_XML};

const ALL_ENTITIES: [&str; 4] = [
    "https://idp.example.org",
    "https://sp1.example.org",
    "https://sp2.example.org",
    "https://aa.example.org",
];

async fn resolver_with(filters: Vec<Arc<dyn MetadataFilter>>) -> anyhow::Result<MetadataResolver> {
    init_tracing();
    let builder = filters.into_iter().fold(
        MetadataResolver::builder().with_source(Arc::new(InMemorySource::from_bytes(FEDERATION_XML))),
        |builder, filter| builder.with_filter(filter),
    );
    let resolver = builder.build()?;
    resolver.initialize().await?;
    Ok(resolver)
}

fn entity_ids(resolver: &MetadataResolver, criteria: &ResolverCriteria) -> anyhow::Result<Vec<String>> {
    Ok(resolver
        .resolve(criteria)?
        .iter()
        .map(|e| e.entity_id().to_string())
        .collect())
}

fn resolvable(resolver: &MetadataResolver) -> anyhow::Result<Vec<String>> {
    let mut found = Vec::new();
    for id in ALL_ENTITIES {
        found.extend(entity_ids(resolver, &ResolverCriteria::entity_id(id))?);
    }
    Ok(found)
}

/// Filters that reject nothing leave the tree exactly as parsed.
#[test]
fn test_non_rejecting_filters_are_identity() -> anyhow::Result<()> {
    let tree = parse(FEDERATION_XML)?;
    let expected = tree.detached_copy();

    let chain = MetadataFilterChain::new()
        .with(Arc::new(EntityRoleFilter::new(RoleKind::ALL)))
        .with(Arc::new(PredicateFilter::exclude(EntityIdPredicate::new(["https://unknown.example.org"]))))
        .with(Arc::new(PredicateFilter::include(GroupNamePredicate::new(["Top"]))));

    let filtered = chain.filter(tree)?;
    assert_eq!(filtered, Some(expected));
    Ok(())
}

/// Keeping only SPSSO strips other roles but keeps every entity.
#[tokio::test]
async fn test_role_filter_keeps_only_sp_roles() -> anyhow::Result<()> {
    let resolver = resolver_with(vec![Arc::new(EntityRoleFilter::new([RoleKind::SpSso]))]).await?;

    let sps = entity_ids(&resolver, &ResolverCriteria::role(RoleKind::SpSso))?;
    assert_eq!(sps, vec!["https://sp1.example.org", "https://sp2.example.org"]);

    assert!(resolver.resolve(&ResolverCriteria::role(RoleKind::IdpSso))?.is_empty());
    assert!(resolver.resolve(&ResolverCriteria::role(RoleKind::AttributeAuthority))?.is_empty());

    let sp2 = resolver
        .resolve_single(&ResolverCriteria::entity_id("https://sp2.example.org"))?
        .ok_or_else(|| anyhow::anyhow!("sp2 missing"))?;
    assert_eq!(sp2.descriptor().roles.len(), 1);

    assert_eq!(resolvable(&resolver)?.len(), ALL_ENTITIES.len());
    Ok(())
}

/// An empty allow-list strips every role; entities remain resolvable by ID.
#[tokio::test]
async fn test_empty_role_allow_list_strips_all_roles() -> anyhow::Result<()> {
    let resolver = resolver_with(vec![Arc::new(EntityRoleFilter::new(std::iter::empty::<RoleKind>()))]).await?;

    for kind in RoleKind::ALL {
        assert!(resolver.resolve(&ResolverCriteria::role(kind))?.is_empty());
    }
    let entities = resolvable(&resolver)?;
    assert_eq!(entities.len(), ALL_ENTITIES.len());
    for id in ALL_ENTITIES {
        let entity = resolver
            .resolve_single(&ResolverCriteria::entity_id(id))?
            .ok_or_else(|| anyhow::anyhow!("{id} missing"))?;
        assert!(entity.descriptor().roles.is_empty());
    }
    Ok(())
}

/// INCLUDE and EXCLUDE with the same predicate partition the entities.
#[tokio::test]
async fn test_predicate_include_exclude_partition() -> anyhow::Result<()> {
    let chosen = ["https://sp1.example.org", "https://aa.example.org"];

    let included =
        resolver_with(vec![Arc::new(PredicateFilter::include(EntityIdPredicate::new(chosen)))]).await?;
    let excluded =
        resolver_with(vec![Arc::new(PredicateFilter::exclude(EntityIdPredicate::new(chosen)))]).await?;

    let kept = resolvable(&included)?;
    let dropped = resolvable(&excluded)?;
    assert_eq!(kept, chosen);
    assert_eq!(dropped, vec!["https://idp.example.org", "https://sp2.example.org"]);

    let mut union: Vec<String> = kept.into_iter().chain(dropped).collect();
    union.sort();
    let mut all: Vec<String> = ALL_ENTITIES.iter().map(ToString::to_string).collect();
    all.sort();
    assert_eq!(union, all);
    Ok(())
}

/// Groups emptied by a predicate are pruned up to, but not including, the root.
#[test]
fn test_predicate_prunes_emptied_groups() -> anyhow::Result<()> {
    let tree = parse(FEDERATION_XML)?;
    let filter = PredicateFilter::exclude(EntityIdPredicate::new([
        "https://sp2.example.org",
        "https://aa.example.org",
    ]));

    let filtered = filter
        .filter(tree)?
        .ok_or_else(|| anyhow::anyhow!("root must survive"))?;

    let groups: Vec<&str> = filtered
        .preorder()
        .into_iter()
        .filter_map(|id| filtered.node(id).as_entities())
        .filter_map(|group| group.name.as_deref())
        .collect();
    assert_eq!(groups, vec!["Top", "Sub1"]);
    Ok(())
}

/// Excluding a single-entity document rejects it.
#[test]
fn test_excluded_root_entity_rejects_document() -> anyhow::Result<()> {
    let tree = parse(&crate::common::single_entity_xml("https://lonely.example.org"))?;
    let filter = PredicateFilter::exclude(EntityIdPredicate::new(["https://lonely.example.org"]));
    assert!(filter.filter(tree)?.is_none());
    Ok(())
}

/// The group tracker records enclosing group names, outermost first.
#[tokio::test]
async fn test_group_tracker_records_enclosing_names() -> anyhow::Result<()> {
    let processing = NodeProcessingFilter::new().with(Arc::new(EntitiesDescriptorNameProcessor));
    let resolver = resolver_with(vec![Arc::new(processing)]).await?;

    let sp2 = resolver
        .resolve_single(&ResolverCriteria::entity_id("https://sp2.example.org"))?
        .ok_or_else(|| anyhow::anyhow!("sp2 missing"))?;
    assert_eq!(sp2.group_names(), vec!["Top", "Sub2", "Sub2A"]);

    let idp = resolver
        .resolve_single(&ResolverCriteria::entity_id("https://idp.example.org"))?
        .ok_or_else(|| anyhow::anyhow!("idp missing"))?;
    assert_eq!(idp.group_names(), vec!["Top"]);
    Ok(())
}

/// Annotations do not accumulate across refresh cycles.
#[tokio::test]
async fn test_group_names_fresh_after_refresh() -> anyhow::Result<()> {
    let processing = NodeProcessingFilter::new().with(Arc::new(EntitiesDescriptorNameProcessor));
    let resolver = resolver_with(vec![Arc::new(processing)]).await?;
    resolver.refresh().await?;
    resolver.refresh().await?;

    let sp1 = resolver
        .resolve_single(&ResolverCriteria::entity_id("https://sp1.example.org"))?
        .ok_or_else(|| anyhow::anyhow!("sp1 missing"))?;
    assert_eq!(sp1.group_names(), vec!["Top", "Sub1"]);
    Ok(())
}

/// Two parses of identical bytes yield identical filtered trees.
#[test]
fn test_parsing_and_filtering_are_deterministic() -> anyhow::Result<()> {
    let chain = MetadataFilterChain::new()
        .with(Arc::new(EntityRoleFilter::new([RoleKind::SpSso, RoleKind::IdpSso])))
        .with(Arc::new(PredicateFilter::exclude(EntityIdPredicate::new(["https://aa.example.org"]))));

    let first = chain.filter(parse(FEDERATION_XML)?)?;
    let second = chain.filter(parse(FEDERATION_XML)?)?;
    assert!(first.is_some());
    assert_eq!(first, second);
    Ok(())
}

/// Protocol criteria combine with role criteria.
#[tokio::test]
async fn test_protocol_and_role_conjunction() -> anyhow::Result<()> {
    let resolver = resolver_with(Vec::new()).await?;

    let criteria = ResolverCriteria::role(RoleKind::AttributeAuthority)
        .with_protocol("urn:oasis:names:tc:SAML:2.0:protocol");
    let found = entity_ids(&resolver, &criteria)?;
    assert_eq!(found, vec!["https://sp2.example.org", "https://aa.example.org"]);

    let nothing = ResolverCriteria::role(RoleKind::IdpSso).with_protocol("urn:oasis:names:tc:SAML:1.1:protocol");
    assert!(resolver.resolve(&nothing)?.is_empty());
    Ok(())
}

/// A validity window longer than allowed fails initialization.
#[tokio::test]
async fn test_valid_until_beyond_limit_fails_initialization() -> anyhow::Result<()> {
    init_tracing();
    let resolver = MetadataResolver::builder()
        .with_source(Arc::new(InMemorySource::from_bytes(FEDERATION_XML)))
        .with_filter(Arc::new(
            RequiredValidUntilFilter::new().with_max_validity_interval(chrono::Duration::days(30)),
        ))
        .build()?;

    let result = resolver.initialize().await;
    assert!(matches!(result, Err(MetadataError::Filter(_))));
    Ok(())
}

/// Documents are read from disk through the filesystem source.
#[tokio::test]
async fn test_filesystem_source_end_to_end() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("federation.xml");
    std::fs::write(&path, FEDERATION_XML)?;

    let resolver = MetadataResolver::builder()
        .with_source(Arc::new(FilesystemSource::new(&path)))
        .with_filter(Arc::new(EntityRoleFilter::new([RoleKind::IdpSso])))
        .build()?;
    resolver.initialize().await?;

    let idps = entity_ids(&resolver, &ResolverCriteria::role(RoleKind::IdpSso))?;
    assert_eq!(idps, vec!["https://idp.example.org"]);

    std::fs::write(&path, crate::common::single_entity_xml("https://new.example.org"))?;
    resolver.refresh().await?;
    assert!(resolver.resolve(&ResolverCriteria::role(RoleKind::IdpSso))?.is_empty());
    assert_eq!(resolver.status().entity_count, 1);
    Ok(())
}
