//! Predicate filter.
//!
//! Keeps or drops `EntityDescriptor`s according to a predicate. Groups that
//! lose all their members are pruned as well, recursively up to (but not
//! including) the root group.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::MetadataFilter;
use crate::error::MetadataResult;
use crate::model::{MetadataTree, NodeRef, RoleKind};

/// Whether matching entities are kept or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterDirection {
    /// Keep only entities the predicate matches.
    Include,
    /// Keep only entities the predicate does not match.
    Exclude,
}

/// A test over an entity node.
///
/// The node is always an `EntityDescriptor`; ancestors are reachable through
/// the handle.
pub trait EntityPredicate: Send + Sync {
    /// Evaluates the predicate.
    fn test(&self, entity: NodeRef<'_>) -> bool;
}

impl<F> EntityPredicate for F
where
    F: Fn(NodeRef<'_>) -> bool + Send + Sync,
{
    fn test(&self, entity: NodeRef<'_>) -> bool {
        self(entity)
    }
}

/// Matches entities by entityID.
#[derive(Debug, Clone, Default)]
pub struct EntityIdPredicate {
    entity_ids: HashSet<String>,
}

impl EntityIdPredicate {
    /// Creates a predicate over a set of entityIDs.
    #[must_use]
    pub fn new<I, S>(entity_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entity_ids: entity_ids.into_iter().map(Into::into).collect(),
        }
    }
}

impl EntityPredicate for EntityIdPredicate {
    fn test(&self, entity: NodeRef<'_>) -> bool {
        entity
            .entity()
            .is_some_and(|e| self.entity_ids.contains(&e.entity_id))
    }
}

/// Matches entities enclosed (at any depth) by a named group.
#[derive(Debug, Clone, Default)]
pub struct GroupNamePredicate {
    names: HashSet<String>,
}

impl GroupNamePredicate {
    /// Creates a predicate over a set of group names.
    #[must_use]
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl EntityPredicate for GroupNamePredicate {
    fn test(&self, entity: NodeRef<'_>) -> bool {
        entity.ancestors().any(|ancestor| {
            ancestor
                .node()
                .as_entities()
                .and_then(|group| group.name.as_ref())
                .is_some_and(|name| self.names.contains(name))
        })
    }
}

/// Matches entities playing a given role.
#[derive(Debug, Clone, Copy)]
pub struct RoleKindPredicate(pub RoleKind);

impl EntityPredicate for RoleKindPredicate {
    fn test(&self, entity: NodeRef<'_>) -> bool {
        entity.entity().is_some_and(|e| e.has_role(self.0))
    }
}

/// Filters entities with a predicate.
#[derive(Clone)]
pub struct PredicateFilter {
    direction: FilterDirection,
    predicate: Arc<dyn EntityPredicate>,
}

impl PredicateFilter {
    /// Creates a filter.
    #[must_use]
    pub fn new(direction: FilterDirection, predicate: Arc<dyn EntityPredicate>) -> Self {
        Self {
            direction,
            predicate,
        }
    }

    /// Keeps only matching entities.
    #[must_use]
    pub fn include(predicate: impl EntityPredicate + 'static) -> Self {
        Self::new(FilterDirection::Include, Arc::new(predicate))
    }

    /// Drops matching entities.
    #[must_use]
    pub fn exclude(predicate: impl EntityPredicate + 'static) -> Self {
        Self::new(FilterDirection::Exclude, Arc::new(predicate))
    }

    /// Returns the direction.
    #[must_use]
    pub const fn direction(&self) -> FilterDirection {
        self.direction
    }

    fn keeps(&self, entity: NodeRef<'_>) -> bool {
        let matched = self.predicate.test(entity);
        match self.direction {
            FilterDirection::Include => matched,
            FilterDirection::Exclude => !matched,
        }
    }
}

impl std::fmt::Debug for PredicateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredicateFilter")
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl MetadataFilter for PredicateFilter {
    fn filter(&self, tree: MetadataTree) -> MetadataResult<Option<MetadataTree>> {
        let root = tree.root();
        let mut removed = HashSet::new();

        // Children before parents, so emptied groups cascade upwards.
        for id in tree.preorder().into_iter().rev() {
            let node = tree.at(id);
            if node.node().is_entity() {
                if !self.keeps(node) {
                    tracing::debug!(entity_id = node.node().label(), "Entity filtered out");
                    removed.insert(id);
                }
            } else if id != root {
                let children = tree.children(id);
                if !children.is_empty() && children.iter().all(|c| removed.contains(c)) {
                    tracing::debug!(group = node.node().label(), "Pruning emptied group");
                    removed.insert(id);
                }
            }
        }

        Ok(tree.prune(&removed))
    }

    fn name(&self) -> &'static str {
        "predicate"
    }
}
