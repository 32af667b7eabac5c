//! Signature trust evaluation.
//!
//! A [`TrustEngine`] answers whether a signature should be trusted. Failing
//! to establish trust is `Ok(false)`; errors are reserved for infrastructure
//! failures such as an unreachable credential source.

use std::sync::Arc;

use crate::credential::CredentialResolver;
use crate::criteria::ValidationCriteria;
use crate::error::MetadataResult;
use crate::model::Signature;

// ============================================================================
// Verification Primitive
// ============================================================================

/// Raw asymmetric signature verification.
pub trait SignatureVerifier: Send + Sync {
    /// Checks `signature_value` over `content`.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed key material.
    fn verify(
        &self,
        public_key: &[u8],
        algorithm_uri: &str,
        content: &[u8],
        signature_value: &[u8],
    ) -> MetadataResult<bool>;
}

/// Verifier backed by aws-lc-rs through `kc-crypto`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AwsLcSignatureVerifier;

impl SignatureVerifier for AwsLcSignatureVerifier {
    fn verify(
        &self,
        public_key: &[u8],
        algorithm_uri: &str,
        content: &[u8],
        signature_value: &[u8],
    ) -> MetadataResult<bool> {
        Ok(kc_crypto::verify_signature(
            public_key,
            algorithm_uri,
            content,
            signature_value,
        )?)
    }
}

// ============================================================================
// Trust Engines
// ============================================================================

/// Decides whether a signature should be trusted.
pub trait TrustEngine: Send + Sync {
    /// Evaluates `signature` over the canonical `content` of the signed node.
    ///
    /// # Errors
    ///
    /// Returns a security error if trust could not be evaluated at all.
    fn evaluate(
        &self,
        signature: &Signature,
        content: &[u8],
        criteria: &ValidationCriteria,
    ) -> MetadataResult<bool>;
}

/// Trust engine that accepts a signature if any explicitly resolved
/// credential verifies it.
#[derive(Clone)]
pub struct ExplicitKeyTrustEngine {
    resolver: Arc<dyn CredentialResolver>,
    verifier: Arc<dyn SignatureVerifier>,
}

impl ExplicitKeyTrustEngine {
    /// Creates an engine using the aws-lc-rs verifier.
    #[must_use]
    pub fn new(resolver: Arc<dyn CredentialResolver>) -> Self {
        Self {
            resolver,
            verifier: Arc::new(AwsLcSignatureVerifier),
        }
    }

    /// Replaces the verification primitive.
    #[must_use]
    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }
}

impl std::fmt::Debug for ExplicitKeyTrustEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExplicitKeyTrustEngine").finish_non_exhaustive()
    }
}

impl TrustEngine for ExplicitKeyTrustEngine {
    fn evaluate(
        &self,
        signature: &Signature,
        content: &[u8],
        criteria: &ValidationCriteria,
    ) -> MetadataResult<bool> {
        let candidates = self.resolver.resolve(signature, criteria)?;
        if candidates.is_empty() {
            tracing::debug!(
                entity_id = ?criteria.entity_id,
                "No candidate credentials for signature"
            );
            return Ok(false);
        }

        for (index, credential) in candidates.iter().enumerate() {
            if !criteria.permits_algorithm(&signature.algorithm) {
                tracing::debug!(
                    candidate = index,
                    algorithm = %signature.algorithm,
                    "Skipping candidate: algorithm not permitted"
                );
                continue;
            }
            if !credential.supports_algorithm(&signature.algorithm) {
                tracing::debug!(
                    candidate = index,
                    key_type = credential.key_type.name(),
                    algorithm = %signature.algorithm,
                    "Skipping candidate: key type cannot verify algorithm"
                );
                continue;
            }

            if self.verifier.verify(
                &credential.public_key,
                &signature.algorithm,
                content,
                &signature.value,
            )? {
                tracing::debug!(candidate = index, "Signature verified");
                return Ok(true);
            }
        }

        Ok(false)
    }
}
