//! Signature validation filter.
//!
//! Walks the tree depth-first from the root, so an untrusted group removes its
//! members before any of them are evaluated. Each signed node is checked on
//! its own; a trusted parent does not vouch for a child's signature.
//!
//! ## Decision per node
//!
//! 1. No signature: accepted, unless signatures are required and no ancestor
//!    carries a trusted signature.
//! 2. Signature: criteria are merged (node entityID, then defaults, then
//!    per-node overrides) and validated. A blacklisted algorithm is rejected
//!    before any cryptography runs; otherwise the trust engine decides.
//! 3. Rejected nodes are removed with their subtree. Rejecting the root
//!    rejects the document.

use std::collections::HashSet;
use std::sync::Arc;

use super::MetadataFilter;
use crate::canonical::{Canonicalizer, StructuralCanonicalizer};
use crate::criteria::{NodeCriteriaResolver, ValidationCriteria};
use crate::error::MetadataResult;
use crate::model::{MetadataTree, NodeId, Signature};
use crate::trust::TrustEngine;

/// Removes content whose signature cannot be trusted.
#[derive(Clone)]
pub struct SignatureValidationFilter {
    engine: Arc<dyn TrustEngine>,
    canonicalizer: Arc<dyn Canonicalizer>,
    default_criteria: ValidationCriteria,
    node_criteria: Option<Arc<dyn NodeCriteriaResolver>>,
    require_signature: bool,
}

impl SignatureValidationFilter {
    /// Creates a filter with secure default criteria that accepts unsigned
    /// content.
    #[must_use]
    pub fn new(engine: Arc<dyn TrustEngine>) -> Self {
        Self {
            engine,
            canonicalizer: Arc::new(StructuralCanonicalizer),
            default_criteria: ValidationCriteria::secure_defaults(),
            node_criteria: None,
            require_signature: false,
        }
    }

    /// Replaces the canonicalizer.
    #[must_use]
    pub fn with_canonicalizer(mut self, canonicalizer: Arc<dyn Canonicalizer>) -> Self {
        self.canonicalizer = canonicalizer;
        self
    }

    /// Replaces the default criteria.
    #[must_use]
    pub fn with_default_criteria(mut self, criteria: ValidationCriteria) -> Self {
        self.default_criteria = criteria;
        self
    }

    /// Adds per-node criteria overrides.
    #[must_use]
    pub fn with_node_criteria(mut self, resolver: Arc<dyn NodeCriteriaResolver>) -> Self {
        self.node_criteria = Some(resolver);
        self
    }

    /// Requires every node to be covered by a trusted signature.
    #[must_use]
    pub const fn with_signature_required(mut self, required: bool) -> Self {
        self.require_signature = required;
        self
    }

    /// Returns whether signatures are required.
    #[must_use]
    pub const fn signature_required(&self) -> bool {
        self.require_signature
    }

    fn criteria_for(&self, tree: &MetadataTree, id: NodeId) -> MetadataResult<ValidationCriteria> {
        let node = tree.at(id);
        let mut derived = ValidationCriteria::new();
        if let Some(entity) = node.entity() {
            derived.entity_id = Some(entity.entity_id.clone());
        }

        let mut merged = derived.merge(&self.default_criteria);
        if let Some(resolver) = &self.node_criteria {
            if let Some(overrides) = resolver.resolve(node)? {
                merged = merged.merge(&overrides);
            }
        }
        merged.validate()?;
        Ok(merged)
    }

    fn is_trusted(&self, tree: &MetadataTree, id: NodeId, signature: &Signature) -> MetadataResult<bool> {
        let criteria = self.criteria_for(tree, id)?;
        let label = tree.node(id).label();

        if criteria.is_blacklisted(&signature.algorithm) {
            tracing::warn!(
                node = label,
                algorithm = %signature.algorithm,
                "Signature uses a blacklisted algorithm"
            );
            return Ok(false);
        }

        let content = self.canonicalizer.canonicalize(tree, id)?;
        let trusted = self.engine.evaluate(signature, &content, &criteria)?;
        if !trusted {
            tracing::warn!(node = label, algorithm = %signature.algorithm, "Untrusted signature");
        }
        Ok(trusted)
    }
}

impl std::fmt::Debug for SignatureValidationFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidationFilter")
            .field("default_criteria", &self.default_criteria)
            .field("require_signature", &self.require_signature)
            .finish_non_exhaustive()
    }
}

impl MetadataFilter for SignatureValidationFilter {
    fn filter(&self, tree: MetadataTree) -> MetadataResult<Option<MetadataTree>> {
        let root = tree.root();
        let mut removed = HashSet::new();
        let mut trusted = HashSet::new();
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            let accepted = match tree.node(id).signature() {
                Some(signature) => {
                    let ok = self.is_trusted(&tree, id, signature)?;
                    if ok {
                        trusted.insert(id);
                    }
                    ok
                }
                None if self.require_signature => {
                    let covered = tree.ancestors(id).any(|a| trusted.contains(&a));
                    if !covered {
                        tracing::warn!(node = tree.node(id).label(), "Required signature missing");
                    }
                    covered
                }
                None => true,
            };

            if !accepted {
                if id == root {
                    return Ok(None);
                }
                removed.insert(id);
                continue;
            }
            stack.extend(tree.children(id).iter().rev().copied());
        }

        if !removed.is_empty() {
            tracing::info!(removed = removed.len(), "Dropped subtrees with untrusted signatures");
        }
        Ok(tree.prune(&removed))
    }

    fn name(&self) -> &'static str {
        "signature-validation"
    }
}
