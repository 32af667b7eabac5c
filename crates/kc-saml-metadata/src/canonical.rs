//! Canonical byte form of a signed subtree.
//!
//! [`StructuralCanonicalizer`] serializes the node payloads of a subtree with
//! serde_json in document order. The signed node's own signature is left out
//! (enveloped signature); signatures on descendants are part of the content.
//! Annotation stores are never included.

use serde::Serialize;

use crate::error::{MetadataError, MetadataResult};
use crate::model::{MetadataNode, MetadataTree, NodeId, Signature};

/// Produces the bytes a signature over a node covers.
pub trait Canonicalizer: Send + Sync {
    /// Canonicalizes the subtree rooted at `node`.
    ///
    /// # Errors
    ///
    /// Returns a security error if the subtree cannot be serialized.
    fn canonicalize(&self, tree: &MetadataTree, node: NodeId) -> MetadataResult<Vec<u8>>;
}

/// Default canonicalizer over the structural model.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralCanonicalizer;

#[derive(Serialize)]
struct CanonicalNode<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    signature: Option<&'a Signature>,
    node: &'a MetadataNode,
    children: Vec<CanonicalNode<'a>>,
}

fn view(tree: &MetadataTree, id: NodeId, include_signature: bool) -> CanonicalNode<'_> {
    let node = tree.node(id);
    CanonicalNode {
        signature: if include_signature { node.signature() } else { None },
        node,
        children: tree
            .children(id)
            .iter()
            .map(|&child| view(tree, child, true))
            .collect(),
    }
}

impl Canonicalizer for StructuralCanonicalizer {
    fn canonicalize(&self, tree: &MetadataTree, node: NodeId) -> MetadataResult<Vec<u8>> {
        if tree.get(node).is_none() {
            return Err(MetadataError::security(format!(
                "cannot canonicalize unknown node {node:?}"
            )));
        }
        serde_json::to_vec(&view(tree, node, false))
            .map_err(|e| MetadataError::security(format!("canonicalization failed: {e}")))
    }
}
