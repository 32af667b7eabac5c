//! # kc-crypto
//!
//! Signature primitives used when deciding whether federation metadata can be
//! trusted. Backed by aws-lc-rs.
//!
//! The metadata layer treats this crate as its trusted verification primitive:
//! given a public key, an XML-DSig algorithm URI, the canonical bytes and the
//! signature value, [`verify_signature`] answers whether the signature holds.
//!
//! ## Modules
//!
//! - [`algorithm`] - XML-DSig signature algorithm URIs and key types
//! - [`certificate`] - X.509 / PEM handling for verification keys
//! - [`keys`] - signing keys for producing XML-DSig signature values
//! - [`signature`] - the verification primitive and its error type

#![forbid(unsafe_code)]
#![deny(warnings)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod certificate;
pub mod keys;
pub mod signature;

pub use algorithm::{KeyType, SignatureAlgorithm};
pub use certificate::{pem_to_der, public_key_from_certificate, CertificateKey};
pub use keys::SigningKey;
pub use signature::{verify_signature, SignatureError};
