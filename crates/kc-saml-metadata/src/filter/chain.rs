//! Ordered composition of filters.

use std::sync::Arc;

use super::MetadataFilter;
use crate::error::MetadataResult;
use crate::model::MetadataTree;

/// Applies filters in order, stopping at the first rejection.
///
/// Each filter sees only its predecessor's output. There is no rollback: a
/// chain that errors or rejects simply drops the tree.
#[derive(Clone, Default)]
pub struct MetadataFilterChain {
    filters: Vec<Arc<dyn MetadataFilter>>,
}

impl MetadataFilterChain {
    /// Creates an empty chain, which passes trees through unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a chain over the given filters.
    #[must_use]
    pub fn from_filters(filters: Vec<Arc<dyn MetadataFilter>>) -> Self {
        Self { filters }
    }

    /// Appends a filter.
    #[must_use]
    pub fn with(mut self, filter: Arc<dyn MetadataFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    /// Inserts a filter before all others.
    #[must_use]
    pub fn with_first(mut self, filter: Arc<dyn MetadataFilter>) -> Self {
        self.filters.insert(0, filter);
        self
    }

    /// Returns the filter names in order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.filters.iter().map(|f| f.name()).collect()
    }

    /// Returns the number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if the chain has no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl std::fmt::Debug for MetadataFilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl MetadataFilter for MetadataFilterChain {
    fn filter(&self, tree: MetadataTree) -> MetadataResult<Option<MetadataTree>> {
        let mut current = tree;
        for filter in &self.filters {
            let before = current.len();
            match filter.filter(current)? {
                Some(next) => {
                    tracing::debug!(
                        filter = filter.name(),
                        nodes_before = before,
                        nodes_after = next.len(),
                        "Filter applied"
                    );
                    current = next;
                }
                None => {
                    tracing::info!(filter = filter.name(), "Metadata document rejected");
                    return Ok(None);
                }
            }
        }
        Ok(Some(current))
    }

    fn name(&self) -> &'static str {
        "filter-chain"
    }
}
