//! Validation criteria for signature trust evaluation.
//!
//! Criteria narrow which credentials may be used and which signature
//! algorithms are acceptable. The signature filter merges three layers: facts
//! derived from the node (its entityID), the filter's defaults, and optional
//! per-node overrides.

use std::collections::BTreeSet;

use kc_crypto::SignatureAlgorithm;
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MetadataResult};
use crate::model::{KeyUsage, NodeRef, RoleKind};

/// Criteria passed to a trust engine and its credential resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationCriteria {
    /// Entity whose keys should be considered.
    pub entity_id: Option<String>,
    /// Role whose keys should be considered.
    pub role: Option<RoleKind>,
    /// Required key usage.
    pub usage: Option<KeyUsage>,
    /// If non-empty, only these algorithm URIs are permitted.
    pub included_algorithms: BTreeSet<String>,
    /// Algorithm URIs that are never permitted.
    pub excluded_algorithms: BTreeSet<String>,
}

impl ValidationCriteria {
    /// Creates empty criteria that permit every algorithm.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates criteria excluding MD5 and SHA-1 based algorithms.
    #[must_use]
    pub fn secure_defaults() -> Self {
        Self {
            usage: Some(KeyUsage::Signing),
            excluded_algorithms: SignatureAlgorithm::insecure_uris()
                .iter()
                .map(|uri| (*uri).to_string())
                .collect(),
            ..Self::default()
        }
    }

    /// Sets the entityID.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Sets the role.
    #[must_use]
    pub const fn with_role(mut self, role: RoleKind) -> Self {
        self.role = Some(role);
        self
    }

    /// Sets the key usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: KeyUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    /// Adds an algorithm to the allow-list.
    #[must_use]
    pub fn include_algorithm(mut self, uri: impl Into<String>) -> Self {
        self.included_algorithms.insert(uri.into());
        self
    }

    /// Adds an algorithm to the blacklist.
    #[must_use]
    pub fn exclude_algorithm(mut self, uri: impl Into<String>) -> Self {
        self.excluded_algorithms.insert(uri.into());
        self
    }

    /// Layers `overrides` on top of `self`.
    ///
    /// Scalar fields set in `overrides` win. A non-empty allow-list in
    /// `overrides` replaces this one; blacklists are unioned so an override
    /// can never re-enable an excluded algorithm.
    #[must_use]
    pub fn merge(&self, overrides: &Self) -> Self {
        Self {
            entity_id: overrides.entity_id.clone().or_else(|| self.entity_id.clone()),
            role: overrides.role.or(self.role),
            usage: overrides.usage.or(self.usage),
            included_algorithms: if overrides.included_algorithms.is_empty() {
                self.included_algorithms.clone()
            } else {
                overrides.included_algorithms.clone()
            },
            excluded_algorithms: self
                .excluded_algorithms
                .union(&overrides.excluded_algorithms)
                .cloned()
                .collect(),
        }
    }

    /// Checks if an algorithm is on the blacklist.
    #[must_use]
    pub fn is_blacklisted(&self, uri: &str) -> bool {
        self.excluded_algorithms.contains(uri)
    }

    /// Checks if an algorithm is permitted by both lists.
    #[must_use]
    pub fn permits_algorithm(&self, uri: &str) -> bool {
        !self.is_blacklisted(uri)
            && (self.included_algorithms.is_empty() || self.included_algorithms.contains(uri))
    }

    /// Checks the criteria for contradictions.
    ///
    /// # Errors
    ///
    /// Returns a filter error if an algorithm URI is empty or appears in both
    /// the allow-list and the blacklist.
    pub fn validate(&self) -> MetadataResult<()> {
        if let Some(uri) = self
            .included_algorithms
            .iter()
            .chain(&self.excluded_algorithms)
            .find(|uri| uri.trim().is_empty())
        {
            return Err(MetadataError::filter(format!(
                "empty algorithm URI in validation criteria: {uri:?}"
            )));
        }

        if let Some(uri) = self
            .included_algorithms
            .intersection(&self.excluded_algorithms)
            .next()
        {
            return Err(MetadataError::filter(format!(
                "algorithm {uri} is both included and excluded"
            )));
        }

        if self.entity_id.as_deref().is_some_and(str::is_empty) {
            return Err(MetadataError::filter("empty entityID in validation criteria"));
        }

        Ok(())
    }
}

/// Supplies per-node criteria overrides to the signature filter.
pub trait NodeCriteriaResolver: Send + Sync {
    /// Returns the overrides for `node`, or `None` to use the defaults.
    ///
    /// # Errors
    ///
    /// An error aborts the filter.
    fn resolve(&self, node: NodeRef<'_>) -> MetadataResult<Option<ValidationCriteria>>;
}

impl<F> NodeCriteriaResolver for F
where
    F: Fn(NodeRef<'_>) -> MetadataResult<Option<ValidationCriteria>> + Send + Sync,
{
    fn resolve(&self, node: NodeRef<'_>) -> MetadataResult<Option<ValidationCriteria>> {
        self(node)
    }
}
