//! Credentials and credential resolvers.
//!
//! A credential resolver produces the candidate verification keys a trust
//! engine tries, in order, against a signature.

use std::sync::Arc;

use kc_crypto::{pem_to_der, public_key_from_certificate, KeyType, SignatureAlgorithm};

use crate::criteria::ValidationCriteria;
use crate::error::{MetadataError, MetadataResult};
use crate::model::{KeyUsage, Signature};

// ============================================================================
// Credential
// ============================================================================

/// A verification key with optional certificate and scoping information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Key family.
    pub key_type: KeyType,
    /// Raw public key bytes.
    pub public_key: Vec<u8>,
    /// Certificate the key was taken from.
    pub certificate_der: Option<Vec<u8>>,
    /// Intended usage.
    pub usage: KeyUsage,
    /// Entity the credential belongs to; `None` applies to every node.
    pub entity_id: Option<String>,
}

impl Credential {
    /// Creates a credential from raw public key bytes.
    #[must_use]
    pub fn from_public_key(key_type: KeyType, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            key_type,
            public_key: public_key.into(),
            certificate_der: None,
            usage: KeyUsage::Unspecified,
            entity_id: None,
        }
    }

    /// Creates a credential from a DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the certificate cannot be parsed.
    pub fn from_certificate_der(cert_der: &[u8]) -> MetadataResult<Self> {
        let key = public_key_from_certificate(cert_der)
            .map_err(|e| MetadataError::config(format!("unusable certificate: {e}")))?;
        Ok(Self {
            key_type: key.key_type,
            public_key: key.public_key,
            certificate_der: Some(cert_der.to_vec()),
            usage: KeyUsage::Unspecified,
            entity_id: None,
        })
    }

    /// Creates a credential from a PEM-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the PEM or certificate is invalid.
    pub fn from_certificate_pem(pem: &str) -> MetadataResult<Self> {
        let der = pem_to_der(pem, "CERTIFICATE")
            .ok_or_else(|| MetadataError::config("invalid PEM certificate"))?;
        Self::from_certificate_der(&der)
    }

    /// Sets the usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: KeyUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Scopes the credential to an entity.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Checks if this key can verify signatures made with `algorithm_uri`.
    #[must_use]
    pub fn supports_algorithm(&self, algorithm_uri: &str) -> bool {
        SignatureAlgorithm::from_uri(algorithm_uri).is_some_and(|alg| alg.key_type() == self.key_type)
    }

    /// Checks usage and entity scoping against criteria.
    ///
    /// A credential scoped to an entity only applies to signatures on that
    /// entity; it never vouches for a group.
    #[must_use]
    pub fn applies_to(&self, criteria: &ValidationCriteria) -> bool {
        let usage_ok = criteria.usage.map_or(true, |wanted| self.usage.satisfies(wanted));
        let entity_ok = match (&self.entity_id, &criteria.entity_id) {
            (Some(own), Some(wanted)) => own == wanted,
            (Some(_), None) => false,
            (None, _) => true,
        };
        usage_ok && entity_ok
    }
}

// ============================================================================
// Credential Resolvers
// ============================================================================

/// Produces candidate credentials for a signature.
///
/// Implementations shared between resolvers must be reentrant.
pub trait CredentialResolver: Send + Sync {
    /// Returns candidates in the order they should be tried.
    ///
    /// # Errors
    ///
    /// Returns a security error only if the key source itself failed; finding
    /// no candidates is `Ok(vec![])`.
    fn resolve(
        &self,
        signature: &Signature,
        criteria: &ValidationCriteria,
    ) -> MetadataResult<Vec<Credential>>;
}

/// Resolver over a fixed, explicitly configured set of credentials.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    credentials: Vec<Credential>,
}

impl StaticCredentialResolver {
    /// Creates a resolver over the given credentials.
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    /// Creates a resolver over a single credential.
    #[must_use]
    pub fn single(credential: Credential) -> Self {
        Self::new(vec![credential])
    }

    /// Returns the configured credentials.
    #[must_use]
    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(
        &self,
        _signature: &Signature,
        criteria: &ValidationCriteria,
    ) -> MetadataResult<Vec<Credential>> {
        Ok(self
            .credentials
            .iter()
            .filter(|c| c.applies_to(criteria))
            .cloned()
            .collect())
    }
}

/// Resolver yielding the certificates embedded in the signature itself.
///
/// Trusting a key because the signed document carries it proves nothing on
/// its own, so the resolver yields no candidates unless explicitly allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedKeyCredentialResolver {
    allow_embedded_keys: bool,
}

impl EmbeddedKeyCredentialResolver {
    /// Creates a resolver; `allow_embedded_keys = false` fails closed.
    #[must_use]
    pub const fn new(allow_embedded_keys: bool) -> Self {
        Self { allow_embedded_keys }
    }

    /// Returns whether embedded keys are used.
    #[must_use]
    pub const fn allows_embedded_keys(&self) -> bool {
        self.allow_embedded_keys
    }
}

impl CredentialResolver for EmbeddedKeyCredentialResolver {
    fn resolve(
        &self,
        signature: &Signature,
        criteria: &ValidationCriteria,
    ) -> MetadataResult<Vec<Credential>> {
        if !self.allow_embedded_keys {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for cert in signature.embedded_certificates() {
            match Credential::from_certificate_der(cert) {
                Ok(credential) => {
                    let credential = match &criteria.entity_id {
                        Some(entity_id) => credential.with_entity_id(entity_id.clone()),
                        None => credential,
                    };
                    candidates.push(credential);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "Skipping unusable embedded certificate");
                }
            }
        }
        Ok(candidates)
    }
}

/// Resolver concatenating the candidates of several resolvers in order.
#[derive(Clone, Default)]
pub struct ChainingCredentialResolver {
    resolvers: Vec<Arc<dyn CredentialResolver>>,
}

impl ChainingCredentialResolver {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a resolver.
    #[must_use]
    pub fn with(mut self, resolver: Arc<dyn CredentialResolver>) -> Self {
        self.resolvers.push(resolver);
        self
    }

    /// Returns the number of chained resolvers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Returns true if no resolvers are chained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl std::fmt::Debug for ChainingCredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainingCredentialResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl CredentialResolver for ChainingCredentialResolver {
    fn resolve(
        &self,
        signature: &Signature,
        criteria: &ValidationCriteria,
    ) -> MetadataResult<Vec<Credential>> {
        let mut candidates = Vec::new();
        for resolver in &self.resolvers {
            candidates.extend(resolver.resolve(signature, criteria)?);
        }
        Ok(candidates)
    }
}
