//! Node processing filter and processors.

use std::sync::Arc;

use super::MetadataFilter;
use crate::error::MetadataResult;
use crate::model::{MetadataTree, NodeMut};
use crate::store::EntityGroupName;

/// Annotates one node.
///
/// Processors receive a [`NodeMut`] handle: they may read the whole tree and
/// write into the node's store, but cannot change structure or payloads.
pub trait MetadataNodeProcessor: Send + Sync {
    /// Processes a node.
    ///
    /// # Errors
    ///
    /// An error aborts the filter.
    fn process(&self, node: NodeMut<'_>) -> MetadataResult<()>;

    /// Returns a short name for logging.
    fn name(&self) -> &'static str;
}

/// Runs every processor, in order, on every node in one pre-order walk.
#[derive(Clone, Default)]
pub struct NodeProcessingFilter {
    processors: Vec<Arc<dyn MetadataNodeProcessor>>,
}

impl NodeProcessingFilter {
    /// Creates a filter with no processors.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a processor.
    #[must_use]
    pub fn with(mut self, processor: Arc<dyn MetadataNodeProcessor>) -> Self {
        self.processors.push(processor);
        self
    }
}

impl std::fmt::Debug for NodeProcessingFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|p| p.name()))
            .finish()
    }
}

impl MetadataFilter for NodeProcessingFilter {
    fn filter(&self, mut tree: MetadataTree) -> MetadataResult<Option<MetadataTree>> {
        for id in tree.preorder() {
            for processor in &self.processors {
                processor.process(tree.at_mut(id))?;
            }
        }
        Ok(Some(tree))
    }

    fn name(&self) -> &'static str {
        "node-processing"
    }
}

/// Records the names of enclosing groups on every entity.
///
/// Each `EntityDescriptor` receives one [`EntityGroupName`] per named
/// `EntitiesDescriptor` ancestor, outermost first.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntitiesDescriptorNameProcessor;

impl MetadataNodeProcessor for EntitiesDescriptorNameProcessor {
    fn process(&self, mut node: NodeMut<'_>) -> MetadataResult<()> {
        if !node.node().is_entity() {
            return Ok(());
        }

        let mut names: Vec<String> = node
            .view()
            .ancestors()
            .filter_map(|ancestor| ancestor.node().as_entities())
            .filter_map(|group| group.name.clone())
            .collect();
        names.reverse();

        let store = node.store_mut();
        for name in names {
            store.put(EntityGroupName(name));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "entities-descriptor-name"
    }
}
