//! Signing keys for producing XML-DSig signature values.
//!
//! ECDSA signatures are produced in the fixed-length `r || s` form that
//! XML-DSig mandates, not ASN.1 DER.
//!
//! ## Supported Algorithms
//!
//! - ECDSA P-256/SHA-256, P-384/SHA-384, P-521/SHA-512
//! - Ed25519

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        EcdsaKeyPair, EcdsaSigningAlgorithm, Ed25519KeyPair, KeyPair,
        ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
        ECDSA_P521_SHA512_FIXED_SIGNING,
    },
};

use crate::algorithm::SignatureAlgorithm;
use crate::signature::SignatureError;

enum KeyMaterial {
    Ecdsa(EcdsaKeyPair),
    Ed25519(Ed25519KeyPair),
}

/// A private key able to sign canonical metadata bytes.
pub struct SigningKey {
    material: KeyMaterial,
    algorithm: SignatureAlgorithm,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl SigningKey {
    /// Generates a fresh key pair for the given algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error for RSA algorithms (keys must be imported) or if the
    /// underlying generator fails.
    pub fn generate(algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        let rng = SystemRandom::new();
        let pkcs8 = match algorithm {
            SignatureAlgorithm::Ed25519 => Ed25519KeyPair::generate_pkcs8(&rng)
                .map_err(|e| SignatureError::KeyGeneration(format!("Ed25519: {e}")))?,
            _ => {
                let signing_alg = ecdsa_signing_algorithm(algorithm)?;
                EcdsaKeyPair::generate_pkcs8(signing_alg, &rng)
                    .map_err(|e| SignatureError::KeyGeneration(format!("ECDSA: {e}")))?
            }
        };
        Self::from_pkcs8(pkcs8.as_ref(), algorithm)
    }

    /// Creates a signing key from a PKCS#8 DER-encoded private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or does not match the algorithm.
    pub fn from_pkcs8(pkcs8_der: &[u8], algorithm: SignatureAlgorithm) -> Result<Self, SignatureError> {
        let material = match algorithm {
            SignatureAlgorithm::Ed25519 => KeyMaterial::Ed25519(
                Ed25519KeyPair::from_pkcs8(pkcs8_der)
                    .map_err(|e| SignatureError::InvalidKey(format!("Invalid Ed25519 PKCS#8 key: {e}")))?,
            ),
            _ => {
                let signing_alg = ecdsa_signing_algorithm(algorithm)?;
                KeyMaterial::Ecdsa(
                    EcdsaKeyPair::from_pkcs8(signing_alg, pkcs8_der)
                        .map_err(|e| SignatureError::InvalidKey(format!("Invalid ECDSA PKCS#8 key: {e}")))?,
                )
            }
        };

        Ok(Self { material, algorithm })
    }

    /// Returns the signature algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    /// Returns the raw public key bytes in the form [`crate::verify_signature`] expects.
    #[must_use]
    pub fn public_key(&self) -> &[u8] {
        match &self.material {
            KeyMaterial::Ecdsa(kp) => kp.public_key().as_ref(),
            KeyMaterial::Ed25519(kp) => kp.public_key().as_ref(),
        }
    }

    /// Signs the given data.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn sign(&self, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        match &self.material {
            KeyMaterial::Ecdsa(kp) => {
                let rng = SystemRandom::new();
                let sig = kp
                    .sign(&rng, data)
                    .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}")))?;
                Ok(sig.as_ref().to_vec())
            }
            KeyMaterial::Ed25519(kp) => Ok(kp.sign(data).as_ref().to_vec()),
        }
    }
}

fn ecdsa_signing_algorithm(
    algorithm: SignatureAlgorithm,
) -> Result<&'static EcdsaSigningAlgorithm, SignatureError> {
    match algorithm {
        SignatureAlgorithm::EcdsaSha256 => Ok(&ECDSA_P256_SHA256_FIXED_SIGNING),
        SignatureAlgorithm::EcdsaSha384 => Ok(&ECDSA_P384_SHA384_FIXED_SIGNING),
        SignatureAlgorithm::EcdsaSha512 => Ok(&ECDSA_P521_SHA512_FIXED_SIGNING),
        other => Err(SignatureError::UnsupportedAlgorithm(format!(
            "{other:?} keys cannot be generated here"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecdsa_public_key_is_uncompressed_point() {
        let key = SigningKey::generate(SignatureAlgorithm::EcdsaSha256).unwrap();
        assert_eq!(key.public_key().len(), 65);
        assert_eq!(key.public_key()[0], 0x04);
    }

    #[test]
    fn ed25519_public_key_length() {
        let key = SigningKey::generate(SignatureAlgorithm::Ed25519).unwrap();
        assert_eq!(key.public_key().len(), 32);
    }

    #[test]
    fn rsa_generation_is_rejected() {
        let result = SigningKey::generate(SignatureAlgorithm::RsaSha256);
        assert!(matches!(result, Err(SignatureError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn ecdsa_signature_is_fixed_length() {
        let key = SigningKey::generate(SignatureAlgorithm::EcdsaSha384).unwrap();
        let sig = key.sign(b"data").unwrap();
        assert_eq!(sig.len(), 96);
    }
}
