//! Signature validation integration tests.
//!
//! Tests for trust evaluation of signed metadata through the resolver,
//! covering valid, tampered, blacklisted and untrusted signatures.

use std::sync::Arc;

use kc_saml_metadata::{
    Credential, ExplicitKeyTrustEngine, InMemorySource, MetadataError, MetadataNode,
    MetadataResolver, MetadataTree, ResolverConfig, ResolverCriteria, ResolverState, RoleKind,
    StaticCredentialResolver, TrustEngine, ValidationCriteria,
};
use kc_crypto::SigningKey;

use crate::common::{
    init_tracing, parse, sign_document, sign_node, signing_key, single_entity_xml,
    trust_engine_for, FEDERATION_XML,
};

fn resolver_for_tree(
    tree: MetadataTree,
    key: &SigningKey,
    config: ResolverConfig,
) -> anyhow::Result<MetadataResolver> {
    init_tracing();
    Ok(MetadataResolver::builder()
        .with_config(config)
        .with_source(Arc::new(InMemorySource::from_tree(tree)))
        .with_trust_engine(trust_engine_for(key))
        .build()?)
}

fn required() -> ResolverConfig {
    ResolverConfig::default().with_signature_required(true)
}

/// A correctly signed document read from disk is served unchanged.
#[tokio::test]
async fn test_signed_document_is_trusted() -> anyhow::Result<()> {
    init_tracing();
    let key = signing_key()?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("signed.xml");
    std::fs::write(&path, sign_document(FEDERATION_XML, &key)?)?;

    let resolver = MetadataResolver::builder()
        .with_config(required())
        .with_source(Arc::new(kc_saml_metadata::FilesystemSource::new(&path)))
        .with_trust_engine(trust_engine_for(&key))
        .build()?;
    resolver.initialize().await?;

    assert_eq!(resolver.filter_names(), vec!["signature-validation"]);
    assert_eq!(resolver.status().entity_count, 4);
    let sps = resolver.resolve(&ResolverCriteria::role(RoleKind::SpSso))?;
    assert_eq!(sps.len(), 2);
    Ok(())
}

/// Changing signed content after signing breaks trust.
#[tokio::test]
async fn test_tampered_document_is_rejected() -> anyhow::Result<()> {
    init_tracing();
    let key = signing_key()?;
    let tampered = sign_document(FEDERATION_XML, &key)?
        .replace("https://sp1.example.org/acs", "https://attacker.example.net/acs");

    let resolver = MetadataResolver::builder()
        .with_source(Arc::new(InMemorySource::from_bytes(tampered)))
        .with_trust_engine(trust_engine_for(&key))
        .build()?;

    let result = resolver.initialize().await;
    assert!(matches!(result, Err(MetadataError::Filter(_))));
    assert_eq!(resolver.state(), ResolverState::Failed);
    assert!(resolver
        .resolve(&ResolverCriteria::entity_id("https://sp1.example.org"))
        .is_err());
    Ok(())
}

/// One flipped bit in the signature value rejects the document.
#[tokio::test]
async fn test_flipped_signature_byte_is_rejected() -> anyhow::Result<()> {
    let key = signing_key()?;
    let mut tree = parse(FEDERATION_XML)?;
    let root = tree.root();
    sign_node(&mut tree, root, &key)?;
    if let MetadataNode::Entities(group) = tree.node_mut(root) {
        if let Some(signature) = group.signature.as_mut() {
            let last = signature.value.len() - 1;
            signature.value[last] ^= 0x80;
        }
    }

    let resolver = resolver_for_tree(tree, &key, ResolverConfig::default())?;
    assert!(resolver.initialize().await.is_err());
    assert_eq!(resolver.state(), ResolverState::Failed);
    Ok(())
}

/// A blacklisted algorithm is refused even when the signature is valid.
#[tokio::test]
async fn test_blacklisted_algorithm_is_rejected() -> anyhow::Result<()> {
    init_tracing();
    let key = signing_key()?;
    let mut tree = parse(FEDERATION_XML)?;
    let root = tree.root();
    sign_node(&mut tree, root, &key)?;

    let resolver = MetadataResolver::builder()
        .with_source(Arc::new(InMemorySource::from_tree(tree)))
        .with_trust_engine(trust_engine_for(&key))
        .with_validation_criteria(
            ValidationCriteria::secure_defaults().exclude_algorithm(key.algorithm().uri()),
        )
        .build()?;

    assert!(matches!(resolver.initialize().await, Err(MetadataError::Filter(_))));
    Ok(())
}

/// A signature by an unknown key is not trusted.
#[tokio::test]
async fn test_signature_from_unknown_key_is_rejected() -> anyhow::Result<()> {
    let trusted = signing_key()?;
    let rogue = signing_key()?;
    let mut tree = parse(FEDERATION_XML)?;
    let root = tree.root();
    sign_node(&mut tree, root, &rogue)?;

    let resolver = resolver_for_tree(tree, &trusted, ResolverConfig::default())?;
    assert!(resolver.initialize().await.is_err());
    Ok(())
}

/// An untrusted entity signature removes that entity and nothing else.
#[tokio::test]
async fn test_untrusted_entity_removes_only_its_subtree() -> anyhow::Result<()> {
    let trusted = signing_key()?;
    let rogue = signing_key()?;
    let mut tree = parse(FEDERATION_XML)?;
    let sp1 = tree
        .find_entity("https://sp1.example.org")
        .ok_or_else(|| anyhow::anyhow!("sp1 missing"))?;
    sign_node(&mut tree, sp1, &rogue)?;
    let root = tree.root();
    sign_node(&mut tree, root, &trusted)?;

    let resolver = resolver_for_tree(tree, &trusted, required())?;
    resolver.initialize().await?;

    assert!(resolver
        .resolve(&ResolverCriteria::entity_id("https://sp1.example.org"))?
        .is_empty());
    let sps = resolver.resolve(&ResolverCriteria::role(RoleKind::SpSso))?;
    assert_eq!(sps.len(), 1);
    assert_eq!(sps[0].entity_id(), "https://sp2.example.org");
    assert_eq!(resolver.status().entity_count, 3);
    Ok(())
}

/// Unsigned content is refused when signatures are required.
#[tokio::test]
async fn test_unsigned_document_rejected_when_required() -> anyhow::Result<()> {
    let key = signing_key()?;
    let resolver = resolver_for_tree(parse(FEDERATION_XML)?, &key, required())?;
    assert!(resolver.initialize().await.is_err());

    let lenient = resolver_for_tree(parse(FEDERATION_XML)?, &key, ResolverConfig::default())?;
    lenient.initialize().await?;
    assert_eq!(lenient.status().entity_count, 4);
    Ok(())
}

/// A signed entity does not cover its unsigned enclosing group.
#[tokio::test]
async fn test_signed_entity_in_unsigned_group() -> anyhow::Result<()> {
    let key = signing_key()?;
    let mut tree = parse(FEDERATION_XML)?;
    let idp = tree
        .find_entity("https://idp.example.org")
        .ok_or_else(|| anyhow::anyhow!("idp missing"))?;
    sign_node(&mut tree, idp, &key)?;

    let strict = resolver_for_tree(tree.detached_copy(), &key, required())?;
    assert!(strict.initialize().await.is_err());

    let lenient = resolver_for_tree(tree, &key, ResolverConfig::default())?;
    lenient.initialize().await?;
    assert_eq!(lenient.status().entity_count, 4);
    Ok(())
}

fn federation_and_partner(federation: &SigningKey, partner: &SigningKey) -> Arc<dyn TrustEngine> {
    let credential = |key: &SigningKey| Credential::from_public_key(key.algorithm().key_type(), key.public_key());
    Arc::new(ExplicitKeyTrustEngine::new(Arc::new(StaticCredentialResolver::new(vec![
        credential(federation),
        credential(partner).with_entity_id("https://partner.example.org"),
    ]))))
}

/// A key scoped to one entity cannot vouch for a group of other entities.
#[tokio::test]
async fn test_entity_scoped_key_cannot_sign_group() -> anyhow::Result<()> {
    init_tracing();
    let federation = signing_key()?;
    let partner = signing_key()?;

    let forged = r#"<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" Name="Evil">
  <md:EntityDescriptor entityID="https://victim.example.org">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol"/>
  </md:EntityDescriptor>
</md:EntitiesDescriptor>"#;
    let mut tree = parse(forged)?;
    let root = tree.root();
    sign_node(&mut tree, root, &partner)?;

    let resolver = MetadataResolver::builder()
        .with_config(required())
        .with_source(Arc::new(InMemorySource::from_tree(tree)))
        .with_trust_engine(federation_and_partner(&federation, &partner))
        .build()?;
    assert!(matches!(resolver.initialize().await, Err(MetadataError::Filter(_))));
    assert!(resolver
        .resolve(&ResolverCriteria::entity_id("https://victim.example.org"))
        .is_err());
    Ok(())
}

/// A key scoped to an entity still verifies that entity's own signature.
#[tokio::test]
async fn test_entity_scoped_key_signs_its_own_entity() -> anyhow::Result<()> {
    init_tracing();
    let federation = signing_key()?;
    let partner = signing_key()?;

    let mut tree = parse(&single_entity_xml("https://partner.example.org"))?;
    let root = tree.root();
    sign_node(&mut tree, root, &partner)?;

    let resolver = MetadataResolver::builder()
        .with_config(required())
        .with_source(Arc::new(InMemorySource::from_tree(tree)))
        .with_trust_engine(federation_and_partner(&federation, &partner))
        .build()?;
    resolver.initialize().await?;
    assert_eq!(resolver.status().entity_count, 1);
    Ok(())
}
