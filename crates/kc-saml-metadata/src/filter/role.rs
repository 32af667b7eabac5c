//! Entity role filter.

use std::collections::HashSet;

use super::MetadataFilter;
use crate::error::MetadataResult;
use crate::model::{MetadataNode, MetadataTree, RoleKind};

/// Removes every role whose kind is not on the allow-list.
///
/// Entities and groups are kept even when they end up with no roles. An empty
/// allow-list strips all roles.
#[derive(Debug, Clone, Default)]
pub struct EntityRoleFilter {
    allowed: HashSet<RoleKind>,
}

impl EntityRoleFilter {
    /// Creates a filter keeping only the given role kinds.
    #[must_use]
    pub fn new(allowed: impl IntoIterator<Item = RoleKind>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    /// Returns the allow-list.
    #[must_use]
    pub const fn allowed(&self) -> &HashSet<RoleKind> {
        &self.allowed
    }
}

impl MetadataFilter for EntityRoleFilter {
    fn filter(&self, mut tree: MetadataTree) -> MetadataResult<Option<MetadataTree>> {
        let mut removed = 0usize;
        for id in tree.entities() {
            if let MetadataNode::Entity(entity) = tree.node_mut(id) {
                let before = entity.roles.len();
                entity.roles.retain(|role| self.allowed.contains(&role.kind));
                removed += before - entity.roles.len();
            }
        }
        tracing::debug!(removed, "Role filter removed roles");
        Ok(Some(tree))
    }

    fn name(&self) -> &'static str {
        "entity-role"
    }
}
