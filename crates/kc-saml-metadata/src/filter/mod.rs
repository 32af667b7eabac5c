//! Metadata filters.
//!
//! A filter consumes a tree and returns the tree to keep, or `None` to reject
//! the whole document. Filters never restructure a tree they do not own: a
//! filter that fails part way drops its input and the resolver's published
//! snapshot is untouched.
//!
//! ## Provided filters
//!
//! - [`EntityRoleFilter`] - removes roles outside an allow-list
//! - [`PredicateFilter`] - keeps or drops entities by predicate
//! - [`SignatureValidationFilter`] - drops subtrees with untrusted signatures
//! - [`NodeProcessingFilter`] - runs annotation processors over every node
//! - [`RequiredValidUntilFilter`] - bounds the validity window of a document
//! - [`MetadataFilterChain`] - ordered composition of the above

mod chain;
mod node_processing;
mod predicate;
mod role;
mod signature;
mod valid_until;

pub use chain::MetadataFilterChain;
pub use node_processing::{EntitiesDescriptorNameProcessor, MetadataNodeProcessor, NodeProcessingFilter};
pub use predicate::{
    EntityIdPredicate, EntityPredicate, FilterDirection, GroupNamePredicate, PredicateFilter,
    RoleKindPredicate,
};
pub use role::EntityRoleFilter;
pub use signature::SignatureValidationFilter;
pub use valid_until::RequiredValidUntilFilter;

use crate::error::MetadataResult;
use crate::model::MetadataTree;

/// A stage of the metadata pipeline.
pub trait MetadataFilter: Send + Sync {
    /// Filters a tree.
    ///
    /// Returns `Ok(None)` when the whole document is rejected. Excluding
    /// content is never an error.
    ///
    /// # Errors
    ///
    /// Returns a filter error for malformed input or criteria, or a security
    /// error if trust could not be evaluated.
    fn filter(&self, tree: MetadataTree) -> MetadataResult<Option<MetadataTree>>;

    /// Returns a short name for logging.
    fn name(&self) -> &'static str;
}
