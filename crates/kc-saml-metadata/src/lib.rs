//! SAML 2.0 federation metadata for Keycloak Rust.
//!
//! Turns a raw federation metadata document into a filtered, trust-checked,
//! queryable snapshot:
//!
//! - **Parsing** - SAML metadata XML into an arena tree of groups and entities
//! - **Filtering** - an ordered chain of filters that prune, reject or annotate
//! - **Trust** - XML-DSig signature validation against configured credentials
//! - **Resolution** - indexed queries over an atomically refreshed snapshot
//!
//! # Architecture
//!
//! - [`model`] - metadata tree, descriptors and node handles
//! - [`store`] - per-node typed annotations
//! - [`parser`] - SAML metadata XML parser
//! - [`filter`] - metadata filters and the filter chain
//! - [`criteria`] - validation criteria for signature evaluation
//! - [`credential`] - credentials and credential resolvers
//! - [`canonical`] - canonical byte form of signed subtrees
//! - [`trust`] - trust engines and signature verification
//! - [`resolver`] - sources, snapshots and the metadata resolver
//! - [`config`] - resolver configuration
//! - [`error`] - error types
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kc_saml_metadata::{
//!     EntityRoleFilter, FilesystemSource, MetadataResolver, ResolverConfig, ResolverCriteria,
//!     RoleKind,
//! };
//!
//! let resolver = MetadataResolver::builder()
//!     .with_config(ResolverConfig::from_env())
//!     .with_source(Arc::new(FilesystemSource::new("/etc/keycloak/federation.xml")))
//!     .with_filter(Arc::new(EntityRoleFilter::new([RoleKind::IdpSso])))
//!     .build()?;
//! resolver.initialize().await?;
//!
//! let idp = resolver.resolve_single(&ResolverCriteria::entity_id("https://idp.example.org"))?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod canonical;
pub mod config;
pub mod constants;
pub mod credential;
pub mod criteria;
pub mod error;
pub mod filter;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod store;
pub mod trust;

pub use canonical::{Canonicalizer, StructuralCanonicalizer};
pub use config::{RefreshPolicy, ResolverConfig};
pub use credential::{
    ChainingCredentialResolver, Credential, CredentialResolver, EmbeddedKeyCredentialResolver,
    StaticCredentialResolver,
};
pub use criteria::{NodeCriteriaResolver, ValidationCriteria};
pub use error::{MetadataError, MetadataResult};
pub use filter::{
    EntitiesDescriptorNameProcessor, EntityIdPredicate, EntityPredicate, EntityRoleFilter,
    FilterDirection, GroupNamePredicate, MetadataFilter, MetadataFilterChain,
    MetadataNodeProcessor, NodeProcessingFilter, PredicateFilter, RequiredValidUntilFilter,
    RoleKindPredicate, SignatureValidationFilter,
};
pub use model::{
    EntitiesDescriptor, EntityDescriptor, KeyUsage, MetadataNode, MetadataTree, NodeId, NodeRef,
    RoleDescriptor, RoleKind, Signature,
};
pub use parser::{MetadataParser, XmlMetadataParser};
pub use resolver::{
    FilesystemSource, InMemorySource, MetadataResolver, MetadataResolverBuilder, MetadataSnapshot,
    MetadataSource, ResolvedEntity, ResolverCriteria, ResolverState, ResolverStatus,
    SourceDocument,
};
pub use store::{EntityGroupName, ObjectMetadataStore};
pub use trust::{AwsLcSignatureVerifier, ExplicitKeyTrustEngine, SignatureVerifier, TrustEngine};
