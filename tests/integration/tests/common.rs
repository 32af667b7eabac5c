//! Common test utilities and fixtures.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use kc_crypto::{SignatureAlgorithm, SigningKey};
use kc_saml_metadata::{
    Canonicalizer, Credential, ExplicitKeyTrustEngine, InMemorySource, MetadataError,
    MetadataNode, MetadataParser, MetadataResolver, MetadataResult, MetadataSource, MetadataTree,
    NodeId, ResolverState, Signature, SourceDocument, StaticCredentialResolver,
    StructuralCanonicalizer, TrustEngine, XmlMetadataParser,
};

/// A federation aggregate with nested groups.
///
/// ```text
/// Top
/// ├── https://idp.example.org        (IdP)
/// ├── Sub1
/// │   └── https://sp1.example.org    (SP)
/// └── Sub2
///     └── Sub2A
///         ├── https://sp2.example.org (SP + AttributeAuthority)
///         └── https://aa.example.org  (AttributeAuthority)
/// ```
pub const FEDERATION_XML: &str = r#"<md:EntitiesDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" Name="Top" validUntil="2099-01-01T00:00:00Z">
  <md:EntityDescriptor entityID="https://idp.example.org">
    <md:IDPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
      <md:SingleSignOnService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" Location="https://idp.example.org/sso"/>
    </md:IDPSSODescriptor>
    <md:Organization>
      <md:OrganizationName xml:lang="en">Example IdP</md:OrganizationName>
      <md:OrganizationDisplayName xml:lang="en">Example Identity Provider</md:OrganizationDisplayName>
      <md:OrganizationURL xml:lang="en">https://idp.example.org</md:OrganizationURL>
    </md:Organization>
  </md:EntityDescriptor>
  <md:EntitiesDescriptor Name="Sub1">
    <md:EntityDescriptor entityID="https://sp1.example.org">
      <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
        <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://sp1.example.org/acs" index="0" isDefault="true"/>
      </md:SPSSODescriptor>
    </md:EntityDescriptor>
  </md:EntitiesDescriptor>
  <md:EntitiesDescriptor Name="Sub2">
    <md:EntitiesDescriptor Name="Sub2A">
      <md:EntityDescriptor entityID="https://sp2.example.org">
        <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
          <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="https://sp2.example.org/acs" index="1"/>
        </md:SPSSODescriptor>
        <md:AttributeAuthorityDescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
          <md:AttributeService Binding="urn:oasis:names:tc:SAML:2.0:bindings:SOAP" Location="https://sp2.example.org/aa"/>
        </md:AttributeAuthorityDescriptor>
      </md:EntityDescriptor>
      <md:EntityDescriptor entityID="https://aa.example.org">
        <md:AttributeAuthorityDescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
          <md:AttributeService Binding="urn:oasis:names:tc:SAML:2.0:bindings:SOAP" Location="https://aa.example.org/aa"/>
        </md:AttributeAuthorityDescriptor>
      </md:EntityDescriptor>
    </md:EntitiesDescriptor>
  </md:EntitiesDescriptor>
</md:EntitiesDescriptor>"#;

/// A single-entity document.
pub fn single_entity_xml(entity_id: &str) -> String {
    format!(
        r#"<md:EntityDescriptor xmlns:md="urn:oasis:names:tc:SAML:2.0:metadata" entityID="{entity_id}">
  <md:SPSSODescriptor protocolSupportEnumeration="urn:oasis:names:tc:SAML:2.0:protocol">
    <md:AssertionConsumerService Binding="urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" Location="{entity_id}/acs" index="0"/>
  </md:SPSSODescriptor>
</md:EntityDescriptor>"#
    )
}

/// Installs a test subscriber once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("kc_saml_metadata=debug")
        .with_test_writer()
        .try_init();
}

/// Parses a fixture.
pub fn parse(xml: &str) -> anyhow::Result<MetadataTree> {
    Ok(XmlMetadataParser.parse(xml.as_bytes())?)
}

/// Generates a fresh P-256 signing key.
pub fn signing_key() -> anyhow::Result<SigningKey> {
    Ok(SigningKey::generate(SignatureAlgorithm::EcdsaSha256)?)
}

/// Builds an explicit-key trust engine trusting exactly `key`.
pub fn trust_engine_for(key: &SigningKey) -> Arc<dyn TrustEngine> {
    let credential = Credential::from_public_key(key.algorithm().key_type(), key.public_key());
    Arc::new(ExplicitKeyTrustEngine::new(Arc::new(
        StaticCredentialResolver::single(credential),
    )))
}

/// Computes the signature `key` makes over node `id`.
pub fn signature_over(tree: &MetadataTree, id: NodeId, key: &SigningKey) -> anyhow::Result<Signature> {
    let content = StructuralCanonicalizer.canonicalize(tree, id)?;
    Ok(Signature::new(key.algorithm().uri(), key.sign(&content)?))
}

/// Signs node `id` in place.
pub fn sign_node(tree: &mut MetadataTree, id: NodeId, key: &SigningKey) -> anyhow::Result<()> {
    let signature = signature_over(tree, id, key)?;
    match tree.node_mut(id) {
        MetadataNode::Entities(group) => group.signature = Some(signature),
        MetadataNode::Entity(entity) => entity.signature = Some(signature),
    }
    Ok(())
}

/// Returns `xml` with an enveloped `ds:Signature` over its root element.
///
/// The fixture's root start tag must be the first tag in the document.
pub fn sign_document(xml: &str, key: &SigningKey) -> anyhow::Result<String> {
    let tree = parse(xml)?;
    let signature = signature_over(&tree, tree.root(), key)?;
    let value = base64::engine::general_purpose::STANDARD.encode(&signature.value);

    let element = format!(
        r##"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/><ds:SignatureMethod Algorithm="{}"/><ds:Reference URI=""/></ds:SignedInfo><ds:SignatureValue>{value}</ds:SignatureValue></ds:Signature>"##,
        signature.algorithm
    );
    let end_of_root_tag = xml
        .find('>')
        .ok_or_else(|| anyhow::anyhow!("fixture has no start tag"))?;
    Ok(format!(
        "{}{element}{}",
        &xml[..=end_of_root_tag],
        &xml[end_of_root_tag + 1..]
    ))
}

/// A source that can be told to fail.
#[derive(Debug, Clone)]
pub struct FlakySource {
    inner: InMemorySource,
    failing: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
}

impl FlakySource {
    /// Creates a healthy source serving `xml`.
    pub fn new(xml: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: InMemorySource::from_bytes(xml),
            failing: Arc::new(AtomicBool::new(false)),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes subsequent fetches fail or succeed.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Replaces the served document.
    pub fn replace(&self, xml: impl Into<Vec<u8>>) {
        self.inner.replace_bytes(xml);
    }

    /// Returns how many fetches were attempted.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSource for FlakySource {
    async fn fetch(&self) -> MetadataResult<SourceDocument> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MetadataError::source("simulated outage"));
        }
        self.inner.fetch().await
    }

    fn id(&self) -> String {
        "flaky".to_string()
    }
}

/// Polls until the resolver reaches `state`.
pub async fn wait_for_state(
    resolver: &MetadataResolver,
    state: ResolverState,
    timeout: Duration,
) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while resolver.state() != state {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!(
                "resolver stayed in {:?}, expected {:?}",
                resolver.state(),
                state
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}

/// Polls until `source` has been fetched at least `count` times.
pub async fn wait_for_fetches(source: &FlakySource, count: usize, timeout: Duration) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    while source.fetches() < count {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("only {} fetches, expected {count}", source.fetches());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    Ok(())
}
