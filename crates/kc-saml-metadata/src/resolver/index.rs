//! Query index over a filtered tree.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MetadataResult};
use crate::model::{EntityDescriptor, MetadataTree, NodeId, RoleKind};
use crate::store::ObjectMetadataStore;

/// An immutable, indexed, published tree.
///
/// Built wholesale after every successful filter pass and never patched.
#[derive(Debug)]
pub struct MetadataSnapshot {
    tree: MetadataTree,
    by_entity_id: HashMap<String, NodeId>,
    by_role: BTreeMap<RoleKind, Vec<NodeId>>,
    entities: Vec<NodeId>,
    created_at: DateTime<Utc>,
}

impl MetadataSnapshot {
    /// Indexes a filtered tree.
    ///
    /// A repeated entityID keeps its first occurrence in document order; later
    /// duplicates are logged and left out of every index.
    #[must_use]
    pub fn build(tree: MetadataTree) -> Self {
        let mut by_entity_id = HashMap::new();
        let mut by_role: BTreeMap<RoleKind, Vec<NodeId>> = BTreeMap::new();
        let mut entities = Vec::new();

        for id in tree.entities() {
            let Some(entity) = tree.node(id).as_entity() else {
                continue;
            };
            if by_entity_id.contains_key(&entity.entity_id) {
                tracing::warn!(entity_id = %entity.entity_id, "Duplicate entityID ignored");
                continue;
            }
            by_entity_id.insert(entity.entity_id.clone(), id);
            entities.push(id);

            let mut seen = Vec::new();
            for role in &entity.roles {
                if !seen.contains(&role.kind) {
                    seen.push(role.kind);
                    by_role.entry(role.kind).or_default().push(id);
                }
            }
        }

        Self {
            tree,
            by_entity_id,
            by_role,
            entities,
            created_at: Utc::now(),
        }
    }

    /// Returns the underlying tree.
    #[must_use]
    pub const fn tree(&self) -> &MetadataTree {
        &self.tree
    }

    /// Returns when the snapshot was built.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the number of indexed entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Looks up an entity by entityID.
    #[must_use]
    pub fn entity(&self, entity_id: &str) -> Option<NodeId> {
        self.by_entity_id.get(entity_id).copied()
    }

    /// Returns entities playing a role, in document order.
    #[must_use]
    pub fn with_role(&self, role: RoleKind) -> &[NodeId] {
        self.by_role.get(&role).map(Vec::as_slice).unwrap_or_default()
    }

    /// Returns all indexed entities in document order.
    #[must_use]
    pub fn entities(&self) -> &[NodeId] {
        &self.entities
    }

    /// Checks that neither the entity nor any ancestor has expired.
    #[must_use]
    pub fn is_valid_at(&self, id: NodeId, now: DateTime<Utc>) -> bool {
        std::iter::once(id)
            .chain(self.tree.ancestors(id))
            .all(|n| self.tree.node(n).valid_until().map_or(true, |until| until > now))
    }
}

/// An entity handed to a caller, keeping its snapshot alive.
#[derive(Debug, Clone)]
pub struct ResolvedEntity {
    snapshot: Arc<MetadataSnapshot>,
    node: NodeId,
}

impl ResolvedEntity {
    pub(crate) fn new(snapshot: Arc<MetadataSnapshot>, node: NodeId) -> MetadataResult<Self> {
        if snapshot.tree().get(node).and_then(|n| n.as_entity()).is_none() {
            return Err(MetadataError::resolver(format!("{node:?} is not an entity")));
        }
        Ok(Self { snapshot, node })
    }

    /// Returns the entity descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &EntityDescriptor {
        match self.snapshot.tree().node(self.node).as_entity() {
            Some(entity) => entity,
            None => unreachable!("ResolvedEntity always points at an EntityDescriptor"),
        }
    }

    /// Returns the entityID.
    #[must_use]
    pub fn entity_id(&self) -> &str {
        &self.descriptor().entity_id
    }

    /// Returns the entity's annotations.
    #[must_use]
    pub fn store(&self) -> &ObjectMetadataStore {
        self.snapshot.tree().store(self.node)
    }

    /// Returns the recorded enclosing group names, outermost first.
    #[must_use]
    pub fn group_names(&self) -> Vec<&str> {
        self.snapshot.tree().at(self.node).group_names()
    }

    /// Returns the snapshot this entity was resolved from.
    #[must_use]
    pub fn snapshot(&self) -> &Arc<MetadataSnapshot> {
        &self.snapshot
    }
}

/// Query criteria: a conjunction of the fields that are set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverCriteria {
    /// Exact entityID.
    pub entity_id: Option<String>,
    /// Role the entity must play.
    pub role: Option<RoleKind>,
    /// Protocol a role must support; combined with `role` when both are set.
    pub protocol: Option<String>,
}

impl ResolverCriteria {
    /// Criteria matching one entityID.
    #[must_use]
    pub fn entity_id(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            ..Self::default()
        }
    }

    /// Criteria matching a role.
    #[must_use]
    pub fn role(role: RoleKind) -> Self {
        Self {
            role: Some(role),
            ..Self::default()
        }
    }

    /// Adds a role constraint.
    #[must_use]
    pub const fn with_role(mut self, role: RoleKind) -> Self {
        self.role = Some(role);
        self
    }

    /// Adds a protocol constraint.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = Some(protocol.into());
        self
    }

    /// Returns true if no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entity_id.is_none() && self.role.is_none() && self.protocol.is_none()
    }

    /// Checks an entity against the role and protocol constraints.
    #[must_use]
    pub fn matches(&self, entity: &EntityDescriptor) -> bool {
        if self.entity_id.as_ref().is_some_and(|id| *id != entity.entity_id) {
            return false;
        }
        match (self.role, self.protocol.as_deref()) {
            (None, None) => true,
            (Some(role), None) => entity.has_role(role),
            (Some(role), Some(protocol)) => entity
                .roles_of(role)
                .any(|r| r.supports_protocol(protocol)),
            (None, Some(protocol)) => entity.roles.iter().any(|r| r.supports_protocol(protocol)),
        }
    }
}
