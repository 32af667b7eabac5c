//! Command implementations.

pub mod config;
pub mod inspect;
pub mod resolve;
pub mod watch;

pub use config::run_config;
pub use inspect::run_inspect;
pub use resolve::run_resolve;
pub use watch::run_watch;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use kc_saml_metadata::{
    ChainingCredentialResolver, Credential, EmbeddedKeyCredentialResolver, EntitiesDescriptorNameProcessor,
    EntityIdPredicate, EntityRoleFilter, ExplicitKeyTrustEngine, FilesystemSource, MetadataResolver,
    NodeProcessingFilter, PredicateFilter, RefreshPolicy, RequiredValidUntilFilter, ResolvedEntity,
    RoleKind, StaticCredentialResolver, ValidationCriteria,
};
use serde::Serialize;
use tabled::Tabled;

use crate::cli::PipelineArgs;
use crate::config::CliConfig;

/// Builds a resolver for `source` from the config file merged with CLI flags.
///
/// `refresh` overrides the configured refresh interval.
pub fn build_resolver(
    config: &CliConfig,
    source: &Path,
    args: &PipelineArgs,
    refresh: Option<Duration>,
) -> crate::CliResult<MetadataResolver> {
    let mut resolver_config = config.resolver.clone();
    if args.require_signature {
        resolver_config.signature_required = true;
    }
    if args.allow_expired {
        resolver_config.require_valid_metadata = false;
    }
    if let Some(interval) = refresh {
        let policy = &resolver_config.refresh;
        let mut updated = RefreshPolicy::every(interval).with_keep_stale(policy.on_error_keep_stale);
        updated.max_staleness_ms = policy.max_staleness_ms;
        resolver_config.refresh = updated;
    }

    let mut builder = MetadataResolver::builder()
        .with_config(resolver_config)
        .with_source(Arc::new(FilesystemSource::new(source)));

    let certificates: Vec<&PathBuf> = config.trust.certificates.iter().chain(&args.certificates).collect();
    let allow_embedded_keys = config.trust.allow_embedded_keys || args.allow_embedded_keys;
    if !certificates.is_empty() || allow_embedded_keys {
        let mut credentials = Vec::with_capacity(certificates.len());
        for path in certificates {
            let pem = std::fs::read_to_string(path)?;
            credentials.push(Credential::from_certificate_pem(&pem)?);
        }
        tracing::debug!(
            certificates = credentials.len(),
            allow_embedded_keys,
            "Configuring signature trust"
        );

        let credential_resolver = ChainingCredentialResolver::new()
            .with(Arc::new(StaticCredentialResolver::new(credentials)))
            .with(Arc::new(EmbeddedKeyCredentialResolver::new(allow_embedded_keys)));

        let criteria = config
            .trust
            .blacklisted_algorithms
            .iter()
            .fold(ValidationCriteria::secure_defaults(), |criteria, uri| {
                criteria.exclude_algorithm(uri.clone())
            });

        builder = builder
            .with_trust_engine(Arc::new(ExplicitKeyTrustEngine::new(Arc::new(credential_resolver))))
            .with_validation_criteria(criteria);
    }

    let filters = &config.filters;
    if let Some(days) = args.max_validity_days.or(filters.max_validity_days) {
        let interval = chrono::Duration::try_days(days)
            .filter(|d| *d > chrono::Duration::zero())
            .ok_or_else(|| {
                crate::CliError::InvalidArgument(format!("invalid max validity days: {days}"))
            })?;
        builder = builder.with_filter(Arc::new(
            RequiredValidUntilFilter::new().with_max_validity_interval(interval),
        ));
    }

    let roles: Vec<_> = filters.roles.iter().chain(&args.keep_roles).copied().collect();
    if !roles.is_empty() {
        builder = builder.with_filter(Arc::new(EntityRoleFilter::new(roles)));
    }

    let include: Vec<&String> = filters.include_entities.iter().chain(&args.include_entities).collect();
    if !include.is_empty() {
        builder = builder.with_filter(Arc::new(PredicateFilter::include(EntityIdPredicate::new(include))));
    }

    let exclude: Vec<&String> = filters.exclude_entities.iter().chain(&args.exclude_entities).collect();
    if !exclude.is_empty() {
        builder = builder.with_filter(Arc::new(PredicateFilter::exclude(EntityIdPredicate::new(exclude))));
    }

    if filters.record_group_names || args.group_names {
        builder = builder.with_filter(Arc::new(
            NodeProcessingFilter::new().with(Arc::new(EntitiesDescriptorNameProcessor)),
        ));
    }

    Ok(builder.build()?)
}

/// One resolved entity as a table row.
#[derive(Debug, Tabled, Serialize)]
pub struct EntityRow {
    /// entityID.
    #[tabled(rename = "Entity ID")]
    pub entity_id: String,
    /// Role short names.
    #[tabled(rename = "Roles")]
    pub roles: String,
    /// Supported protocols.
    #[tabled(rename = "Protocols")]
    pub protocols: String,
    /// Enclosing group names.
    #[tabled(rename = "Groups")]
    pub groups: String,
    /// `validUntil`, if any.
    #[tabled(rename = "Valid Until")]
    pub valid_until: String,
}

impl From<&ResolvedEntity> for EntityRow {
    fn from(entity: &ResolvedEntity) -> Self {
        let descriptor = entity.descriptor();

        let roles: Vec<&str> = descriptor
            .roles
            .iter()
            .map(|r| r.kind)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(RoleKind::name)
            .collect();

        let mut protocols: Vec<&str> = descriptor
            .roles
            .iter()
            .flat_map(|r| r.protocols.iter().map(String::as_str))
            .collect();
        protocols.sort_unstable();
        protocols.dedup();

        Self {
            entity_id: descriptor.entity_id.clone(),
            roles: roles.join(", "),
            protocols: protocols.join(", "),
            groups: entity.group_names().join(" / "),
            valid_until: descriptor
                .valid_until
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}
