//! Signature verification primitive.
//!
//! Verification never explains why a signature failed: a bad signature and a
//! key/algorithm mismatch both yield `Ok(false)`. Errors are reserved for
//! malformed inputs the caller should never have produced.

use aws_lc_rs::signature::{
    self, UnparsedPublicKey, ECDSA_P256_SHA256_FIXED, ECDSA_P384_SHA384_FIXED,
    ECDSA_P521_SHA512_FIXED, ED25519, RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
    RSA_PKCS1_2048_8192_SHA256, RSA_PKCS1_2048_8192_SHA384, RSA_PKCS1_2048_8192_SHA512,
};
use thiserror::Error;

use crate::algorithm::SignatureAlgorithm;

/// Error type for signature operations.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// Key generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Signing failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Invalid key format.
    #[error("invalid key format: {0}")]
    InvalidKey(String),

    /// Invalid certificate.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Algorithm not supported.
    #[error("algorithm not supported: {0}")]
    UnsupportedAlgorithm(String),
}

/// Verifies `signature_value` over `data` with the given public key.
///
/// # Arguments
///
/// * `public_key` - Raw public key bytes (PKCS#1 for RSA, SEC1 point for EC,
///   32 bytes for Ed25519)
/// * `algorithm_uri` - XML-DSig signature method URI
/// * `data` - The canonical bytes that were signed
/// * `signature_value` - The decoded signature value
///
/// Unknown algorithms and failed checks return `Ok(false)`.
///
/// # Errors
///
/// Returns an error if the public key is empty.
pub fn verify_signature(
    public_key: &[u8],
    algorithm_uri: &str,
    data: &[u8],
    signature_value: &[u8],
) -> Result<bool, SignatureError> {
    if public_key.is_empty() {
        return Err(SignatureError::InvalidKey("empty public key".to_string()));
    }

    let Some(algorithm) = SignatureAlgorithm::from_uri(algorithm_uri) else {
        return Ok(false);
    };

    let verification_alg: &'static dyn signature::VerificationAlgorithm = match algorithm {
        SignatureAlgorithm::RsaSha1 => &RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        SignatureAlgorithm::RsaSha256 => &RSA_PKCS1_2048_8192_SHA256,
        SignatureAlgorithm::RsaSha384 => &RSA_PKCS1_2048_8192_SHA384,
        SignatureAlgorithm::RsaSha512 => &RSA_PKCS1_2048_8192_SHA512,
        SignatureAlgorithm::EcdsaSha256 => &ECDSA_P256_SHA256_FIXED,
        SignatureAlgorithm::EcdsaSha384 => &ECDSA_P384_SHA384_FIXED,
        SignatureAlgorithm::EcdsaSha512 => &ECDSA_P521_SHA512_FIXED,
        SignatureAlgorithm::Ed25519 => &ED25519,
    };

    let key = UnparsedPublicKey::new(verification_alg, public_key);
    Ok(key.verify(data, signature_value).is_ok())
}
