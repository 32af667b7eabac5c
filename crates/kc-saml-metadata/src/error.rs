//! Metadata error types.
//!
//! Untrusted signatures and entities excluded by a filter are ordinary
//! filtering outcomes and never surface as errors. The variants here are for
//! malformed input, trust infrastructure failures and caller misuse.

use thiserror::Error;

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Errors that can occur while resolving or filtering metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A filter could not evaluate its input (malformed criteria, missing
    /// required attributes).
    #[error("filter error: {0}")]
    Filter(String),

    /// Trust infrastructure failed (credential resolution, canonicalization).
    #[error("security error: {0}")]
    Security(String),

    /// Source bytes could not be parsed into a metadata tree.
    #[error("parse error: {0}")]
    Parse(String),

    /// Source bytes could not be fetched.
    #[error("source error: {0}")]
    Source(String),

    /// The resolver was queried incorrectly.
    #[error("resolver error: {0}")]
    Resolver(String),

    /// No servable snapshot is available.
    #[error("metadata unavailable: {0}")]
    Unavailable(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl MetadataError {
    /// Creates a filter error.
    #[must_use]
    pub fn filter(msg: impl Into<String>) -> Self {
        Self::Filter(msg.into())
    }

    /// Creates a security error.
    #[must_use]
    pub fn security(msg: impl Into<String>) -> Self {
        Self::Security(msg.into())
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a source error.
    #[must_use]
    pub fn source(msg: impl Into<String>) -> Self {
        Self::Source(msg.into())
    }

    /// Creates a resolver error.
    #[must_use]
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Checks if this error came out of the filter pipeline.
    #[must_use]
    pub const fn is_pipeline_error(&self) -> bool {
        matches!(self, Self::Filter(_) | Self::Security(_))
    }

    /// Checks if this error means no snapshot can be served.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Checks if this error was caused by the caller rather than the metadata.
    #[must_use]
    pub const fn is_caller_error(&self) -> bool {
        matches!(self, Self::Resolver(_) | Self::Configuration(_))
    }
}

impl From<roxmltree::Error> for MetadataError {
    fn from(err: roxmltree::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<base64::DecodeError> for MetadataError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Parse(format!("base64: {err}"))
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        Self::Source(err.to_string())
    }
}

impl From<kc_crypto::SignatureError> for MetadataError {
    fn from(err: kc_crypto::SignatureError) -> Self {
        Self::Security(err.to_string())
    }
}
