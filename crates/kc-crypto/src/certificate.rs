//! X.509 certificate handling for verification keys.

use base64::Engine;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::algorithm::KeyType;
use crate::signature::SignatureError;

/// Ed25519 algorithm identifier (RFC 8410).
const ED25519_OID: &str = "1.3.101.112";

/// Public key material extracted from a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateKey {
    /// The key family.
    pub key_type: KeyType,
    /// Raw public key bytes as carried in the certificate's BIT STRING.
    pub public_key: Vec<u8>,
}

/// Extracts DER data from a PEM string.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let end_pos = pem.find(&end)?;
    if end_pos < start {
        return None;
    }

    let b64_data: String = pem[start..end_pos]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD.decode(&b64_data).ok()
}

/// Extracts the public key from a DER-encoded X.509 certificate.
///
/// # Errors
///
/// Returns an error if the certificate cannot be parsed or carries a key type
/// that cannot verify XML signatures.
pub fn public_key_from_certificate(cert_der: &[u8]) -> Result<CertificateKey, SignatureError> {
    let (_, cert) = X509Certificate::from_der(cert_der)
        .map_err(|e| SignatureError::InvalidCertificate(format!("Failed to parse certificate: {e}")))?;

    let spki = cert.public_key();
    let key_type = match spki.parsed() {
        Ok(PublicKey::RSA(_)) => KeyType::Rsa,
        Ok(PublicKey::EC(_)) => KeyType::Ec,
        _ if spki.algorithm.algorithm.to_id_string() == ED25519_OID => KeyType::Ed25519,
        _ => {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "certificate key algorithm {}",
                spki.algorithm.algorithm.to_id_string()
            )));
        }
    };

    Ok(CertificateKey {
        key_type,
        public_key: spki.subject_public_key.data.to_vec(),
    })
}
