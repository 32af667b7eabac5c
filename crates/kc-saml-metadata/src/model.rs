//! Metadata document model.
//!
//! A parsed metadata document is a [`MetadataTree`]: an arena of slots
//! addressed by [`NodeId`]. Each slot owns its node payload, the ids of its
//! children in document order, a parent id used only for upward lookups, and
//! the node's [`ObjectMetadataStore`].
//!
//! Schema families are closed sum types: a node is either an
//! [`EntitiesDescriptor`] group or an [`EntityDescriptor`] leaf, a role is
//! tagged by [`RoleKind`], an endpoint by [`EndpointKind`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MetadataError, MetadataResult};
use crate::store::{EntityGroupName, ObjectMetadataStore};

// ============================================================================
// Signature
// ============================================================================

/// An enveloped XML signature attached to the node it signs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    /// Signature method algorithm URI.
    pub algorithm: String,
    /// Decoded signature value.
    pub value: Vec<u8>,
    /// Reference URI (usually `#<ID>` of the signed node).
    pub reference: Option<String>,
    /// Key material embedded in the signature.
    pub key_info: Option<KeyInfo>,
}

impl Signature {
    /// Creates a signature without reference or key info.
    #[must_use]
    pub fn new(algorithm: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            algorithm: algorithm.into(),
            value,
            reference: None,
            key_info: None,
        }
    }

    /// Sets the reference URI.
    #[must_use]
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    /// Embeds an X.509 certificate in the key info.
    #[must_use]
    pub fn with_certificate(mut self, cert_der: Vec<u8>) -> Self {
        self.key_info
            .get_or_insert_with(KeyInfo::default)
            .certificates
            .push(cert_der);
        self
    }

    /// Returns the embedded certificates, if any.
    #[must_use]
    pub fn embedded_certificates(&self) -> &[Vec<u8>] {
        self.key_info
            .as_ref()
            .map(|info| info.certificates.as_slice())
            .unwrap_or_default()
    }
}

/// Key material carried inside a signature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    /// DER-encoded X.509 certificates.
    pub certificates: Vec<Vec<u8>>,
}

// ============================================================================
// Role Descriptors
// ============================================================================

/// The role an entity plays in the federation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoleKind {
    /// Identity provider (`IDPSSODescriptor`).
    IdpSso,
    /// Service provider (`SPSSODescriptor`).
    SpSso,
    /// Attribute authority (`AttributeAuthorityDescriptor`).
    AttributeAuthority,
    /// Authentication authority (`AuthnAuthorityDescriptor`).
    AuthnAuthority,
    /// Policy decision point (`PDPDescriptor`).
    Pdp,
}

impl RoleKind {
    /// All role kinds in schema order.
    pub const ALL: [Self; 5] = [
        Self::IdpSso,
        Self::SpSso,
        Self::AttributeAuthority,
        Self::AuthnAuthority,
        Self::Pdp,
    ];

    /// Returns the metadata element name for this role.
    #[must_use]
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::IdpSso => "IDPSSODescriptor",
            Self::SpSso => "SPSSODescriptor",
            Self::AttributeAuthority => "AttributeAuthorityDescriptor",
            Self::AuthnAuthority => "AuthnAuthorityDescriptor",
            Self::Pdp => "PDPDescriptor",
        }
    }

    /// Parses a role kind from its metadata element name.
    #[must_use]
    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.element_name() == name)
    }

    /// Returns the short name used in configuration and CLI flags.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::IdpSso => "idp-sso",
            Self::SpSso => "sp-sso",
            Self::AttributeAuthority => "attribute-authority",
            Self::AuthnAuthority => "authn-authority",
            Self::Pdp => "pdp",
        }
    }
}

impl std::fmt::Display for RoleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for RoleKind {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s) || kind.element_name() == s)
            .ok_or_else(|| MetadataError::config(format!("unknown role kind: {s}")))
    }
}

/// Endpoint element families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointKind {
    /// `SingleSignOnService`.
    SingleSignOn,
    /// `SingleLogoutService`.
    SingleLogout,
    /// `ArtifactResolutionService`.
    ArtifactResolution,
    /// `ManageNameIDService`.
    ManageNameId,
    /// `NameIDMappingService`.
    NameIdMapping,
    /// `AssertionIDRequestService`.
    AssertionIdRequest,
    /// `AssertionConsumerService`.
    AssertionConsumer,
    /// `AttributeService`.
    Attribute,
    /// `AuthnQueryService`.
    AuthnQuery,
    /// `AuthzService`.
    Authz,
}

impl EndpointKind {
    const ALL: [Self; 10] = [
        Self::SingleSignOn,
        Self::SingleLogout,
        Self::ArtifactResolution,
        Self::ManageNameId,
        Self::NameIdMapping,
        Self::AssertionIdRequest,
        Self::AssertionConsumer,
        Self::Attribute,
        Self::AuthnQuery,
        Self::Authz,
    ];

    /// Returns the metadata element name for this endpoint.
    #[must_use]
    pub const fn element_name(self) -> &'static str {
        match self {
            Self::SingleSignOn => "SingleSignOnService",
            Self::SingleLogout => "SingleLogoutService",
            Self::ArtifactResolution => "ArtifactResolutionService",
            Self::ManageNameId => "ManageNameIDService",
            Self::NameIdMapping => "NameIDMappingService",
            Self::AssertionIdRequest => "AssertionIDRequestService",
            Self::AssertionConsumer => "AssertionConsumerService",
            Self::Attribute => "AttributeService",
            Self::AuthnQuery => "AuthnQueryService",
            Self::Authz => "AuthzService",
        }
    }

    /// Parses an endpoint kind from its metadata element name.
    #[must_use]
    pub fn from_element_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.element_name() == name)
    }

    /// Returns true for indexed endpoint families.
    #[must_use]
    pub const fn is_indexed(self) -> bool {
        matches!(self, Self::ArtifactResolution | Self::AssertionConsumer)
    }
}

/// A protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    /// Endpoint family.
    pub kind: EndpointKind,
    /// Binding URI.
    pub binding: String,
    /// Endpoint location.
    pub location: String,
    /// Optional response location.
    pub response_location: Option<String>,
    /// Index for indexed endpoints.
    pub index: Option<u16>,
    /// `isDefault` for indexed endpoints.
    pub is_default: Option<bool>,
}

impl Endpoint {
    /// Creates an endpoint.
    #[must_use]
    pub fn new(kind: EndpointKind, binding: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            kind,
            binding: binding.into(),
            location: location.into(),
            response_location: None,
            index: None,
            is_default: None,
        }
    }

    /// Sets the response location.
    #[must_use]
    pub fn with_response_location(mut self, location: impl Into<String>) -> Self {
        self.response_location = Some(location.into());
        self
    }

    /// Sets the endpoint index.
    #[must_use]
    pub const fn with_index(mut self, index: u16, is_default: bool) -> Self {
        self.index = Some(index);
        self.is_default = Some(is_default);
        self
    }
}

/// Intended use of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUsage {
    /// Signing key.
    Signing,
    /// Encryption key.
    Encryption,
    /// No usage attribute: the key may be used for either.
    #[default]
    Unspecified,
}

impl KeyUsage {
    /// Returns true if a key with this usage satisfies a request for `wanted`.
    #[must_use]
    pub const fn satisfies(self, wanted: Self) -> bool {
        matches!(
            (self, wanted),
            (Self::Unspecified, _)
                | (_, Self::Unspecified)
                | (Self::Signing, Self::Signing)
                | (Self::Encryption, Self::Encryption)
        )
    }
}

/// A key published for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyDescriptor {
    /// Key usage.
    pub usage: KeyUsage,
    /// DER-encoded X.509 certificates.
    pub certificates: Vec<Vec<u8>>,
}

/// A role played by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDescriptor {
    /// Role kind.
    pub kind: RoleKind,
    /// `protocolSupportEnumeration` entries.
    pub protocols: Vec<String>,
    /// Endpoints in document order.
    pub endpoints: Vec<Endpoint>,
    /// Key descriptors in document order.
    pub keys: Vec<KeyDescriptor>,
    /// Supported NameID formats.
    pub name_id_formats: Vec<String>,
}

impl RoleDescriptor {
    /// Creates a role with no protocols, endpoints or keys.
    #[must_use]
    pub const fn new(kind: RoleKind) -> Self {
        Self {
            kind,
            protocols: Vec::new(),
            endpoints: Vec::new(),
            keys: Vec::new(),
            name_id_formats: Vec::new(),
        }
    }

    /// Adds a supported protocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocols.push(protocol.into());
        self
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Adds a key descriptor.
    #[must_use]
    pub fn with_key(mut self, usage: KeyUsage, cert_der: Vec<u8>) -> Self {
        self.keys.push(KeyDescriptor {
            usage,
            certificates: vec![cert_der],
        });
        self
    }

    /// Checks whether the role advertises support for a protocol.
    #[must_use]
    pub fn supports_protocol(&self, protocol: &str) -> bool {
        self.protocols.iter().any(|p| p == protocol)
    }

    /// Returns endpoints of one family.
    pub fn endpoints_of(&self, kind: EndpointKind) -> impl Iterator<Item = &Endpoint> + '_ {
        self.endpoints.iter().filter(move |e| e.kind == kind)
    }

    /// Returns certificates whose usage satisfies `usage`.
    pub fn certificates_for(&self, usage: KeyUsage) -> impl Iterator<Item = &[u8]> + '_ {
        self.keys
            .iter()
            .filter(move |k| k.usage.satisfies(usage))
            .flat_map(|k| k.certificates.iter().map(Vec::as_slice))
    }
}

// ============================================================================
// Descriptors
// ============================================================================

/// Organization responsible for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Organization {
    /// `OrganizationName`.
    pub name: Option<String>,
    /// `OrganizationDisplayName`.
    pub display_name: Option<String>,
    /// `OrganizationURL`.
    pub url: Option<String>,
}

/// A contact for an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactPerson {
    /// `contactType` attribute.
    pub contact_type: String,
    /// `GivenName`.
    pub given_name: Option<String>,
    /// `SurName`.
    pub surname: Option<String>,
    /// `EmailAddress` entries.
    pub emails: Vec<String>,
}

/// A group of descriptors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntitiesDescriptor {
    /// `Name` attribute.
    pub name: Option<String>,
    /// `ID` attribute.
    pub id: Option<String>,
    /// `validUntil` attribute.
    pub valid_until: Option<DateTime<Utc>>,
    /// Enveloped signature.
    #[serde(skip)]
    pub signature: Option<Signature>,
}

impl EntitiesDescriptor {
    /// Creates a group with the given name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// One federation participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityDescriptor {
    /// `entityID` attribute.
    pub entity_id: String,
    /// `ID` attribute.
    pub id: Option<String>,
    /// `validUntil` attribute.
    pub valid_until: Option<DateTime<Utc>>,
    /// Roles in document order.
    pub roles: Vec<RoleDescriptor>,
    /// Organization.
    pub organization: Option<Organization>,
    /// Contacts.
    pub contacts: Vec<ContactPerson>,
    /// Enveloped signature.
    #[serde(skip)]
    pub signature: Option<Signature>,
}

impl EntityDescriptor {
    /// Creates an entity with no roles.
    #[must_use]
    pub fn new(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            id: None,
            valid_until: None,
            roles: Vec::new(),
            organization: None,
            contacts: Vec::new(),
            signature: None,
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: RoleDescriptor) -> Self {
        self.roles.push(role);
        self
    }

    /// Returns the roles of one kind.
    pub fn roles_of(&self, kind: RoleKind) -> impl Iterator<Item = &RoleDescriptor> + '_ {
        self.roles.iter().filter(move |r| r.kind == kind)
    }

    /// Checks whether the entity plays a role.
    #[must_use]
    pub fn has_role(&self, kind: RoleKind) -> bool {
        self.roles.iter().any(|r| r.kind == kind)
    }
}

/// A metadata tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetadataNode {
    /// `EntitiesDescriptor` group.
    Entities(EntitiesDescriptor),
    /// `EntityDescriptor` leaf.
    Entity(EntityDescriptor),
}

impl MetadataNode {
    /// Returns the signature attached to this node.
    #[must_use]
    pub const fn signature(&self) -> Option<&Signature> {
        match self {
            Self::Entities(group) => group.signature.as_ref(),
            Self::Entity(entity) => entity.signature.as_ref(),
        }
    }

    /// Returns the `validUntil` attribute.
    #[must_use]
    pub const fn valid_until(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Entities(group) => group.valid_until,
            Self::Entity(entity) => entity.valid_until,
        }
    }

    /// Returns the `ID` attribute.
    #[must_use]
    pub fn id_attribute(&self) -> Option<&str> {
        match self {
            Self::Entities(group) => group.id.as_deref(),
            Self::Entity(entity) => entity.id.as_deref(),
        }
    }

    /// Returns the group name or the entityID.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Entities(group) => group.name.as_deref().unwrap_or("<unnamed group>"),
            Self::Entity(entity) => &entity.entity_id,
        }
    }

    /// Returns the entity payload.
    #[must_use]
    pub const fn as_entity(&self) -> Option<&EntityDescriptor> {
        match self {
            Self::Entity(entity) => Some(entity),
            Self::Entities(_) => None,
        }
    }

    /// Returns the group payload.
    #[must_use]
    pub const fn as_entities(&self) -> Option<&EntitiesDescriptor> {
        match self {
            Self::Entities(group) => Some(group),
            Self::Entity(_) => None,
        }
    }

    /// Returns true for `EntityDescriptor` nodes.
    #[must_use]
    pub const fn is_entity(&self) -> bool {
        matches!(self, Self::Entity(_))
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Index of a node inside one [`MetadataTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct Slot {
    node: MetadataNode,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    store: ObjectMetadataStore,
}

impl Slot {
    fn new(node: MetadataNode, parent: Option<NodeId>) -> Self {
        Self {
            node,
            parent,
            children: Vec::new(),
            store: ObjectMetadataStore::new(),
        }
    }
}

/// An owned metadata document.
///
/// Ids are only meaningful for the tree that issued them. Accessors index
/// the arena directly and panic on a foreign id.
#[derive(Debug)]
pub struct MetadataTree {
    slots: Vec<Slot>,
    root: NodeId,
}

impl MetadataTree {
    /// Creates a tree holding only a root node.
    #[must_use]
    pub fn new(root: MetadataNode) -> Self {
        Self {
            slots: vec![Slot::new(root, None)],
            root: NodeId(0),
        }
    }

    /// Appends a child under `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` is not an `EntitiesDescriptor` of this tree.
    pub fn add_child(&mut self, parent: NodeId, node: MetadataNode) -> MetadataResult<NodeId> {
        match self.get(parent) {
            Some(MetadataNode::Entities(_)) => {}
            Some(MetadataNode::Entity(entity)) => {
                return Err(MetadataError::parse(format!(
                    "EntityDescriptor '{}' cannot contain descriptors",
                    entity.entity_id
                )));
            }
            None => return Err(MetadataError::parse(format!("unknown parent node {parent:?}"))),
        }

        let id = NodeId(self.slots.len());
        self.slots.push(Slot::new(node, Some(parent)));
        self.slots[parent.0].children.push(id);
        Ok(id)
    }

    /// Returns the root id.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always false: a tree holds at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns a node payload, or `None` for a foreign id.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&MetadataNode> {
        self.slots.get(id.0).map(|slot| &slot.node)
    }

    /// Returns a node payload.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &MetadataNode {
        &self.slots[id.0].node
    }

    /// Returns a node payload for in-place edits of its own fields.
    pub fn node_mut(&mut self, id: NodeId) -> &mut MetadataNode {
        &mut self.slots[id.0].node
    }

    /// Returns the children of a node in document order.
    #[must_use]
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.slots[id.0].children
    }

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots[id.0].parent
    }

    /// Iterates from the parent of `id` up to the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&current| self.parent(current))
    }

    /// Returns a node's annotation store.
    #[must_use]
    pub fn store(&self, id: NodeId) -> &ObjectMetadataStore {
        &self.slots[id.0].store
    }

    /// Returns a node's annotation store for writing.
    pub fn store_mut(&mut self, id: NodeId) -> &mut ObjectMetadataStore {
        &mut self.slots[id.0].store
    }

    /// Returns a read-only handle on a node.
    #[must_use]
    pub const fn at(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef { tree: self, id }
    }

    /// Returns a handle that may annotate a node but not restructure the tree.
    pub fn at_mut(&mut self, id: NodeId) -> NodeMut<'_> {
        NodeMut { tree: self, id }
    }

    /// Returns all node ids in depth-first pre-order.
    #[must_use]
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.slots.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        order
    }

    /// Returns the `EntityDescriptor` node ids in document order.
    #[must_use]
    pub fn entities(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.node(id).is_entity())
            .collect()
    }

    /// Finds the first entity with the given entityID.
    #[must_use]
    pub fn find_entity(&self, entity_id: &str) -> Option<NodeId> {
        self.entities().into_iter().find(|&id| {
            self.node(id)
                .as_entity()
                .is_some_and(|e| e.entity_id == entity_id)
        })
    }

    /// Builds a new tree without the given nodes and their subtrees.
    ///
    /// Returns `None` when the root is removed. Surviving nodes keep their
    /// payloads and stores; ids are reassigned.
    #[must_use]
    pub fn prune(self, removed: &HashSet<NodeId>) -> Option<Self> {
        if removed.contains(&self.root) {
            return None;
        }
        if removed.is_empty() {
            return Some(self);
        }

        let root = self.root;
        let mut old: Vec<Option<Slot>> = self.slots.into_iter().map(Some).collect();
        let mut slots: Vec<Slot> = Vec::with_capacity(old.len());
        let mut stack: Vec<(NodeId, Option<NodeId>)> = vec![(root, None)];

        while let Some((old_id, new_parent)) = stack.pop() {
            let Some(Slot { node, children, store, .. }) = old[old_id.0].take() else {
                continue;
            };
            let new_id = NodeId(slots.len());
            if let Some(parent) = new_parent {
                slots[parent.0].children.push(new_id);
            }
            stack.extend(
                children
                    .iter()
                    .rev()
                    .filter(|&&child| !removed.contains(&child))
                    .map(|&child| (child, Some(new_id))),
            );
            slots.push(Slot {
                node,
                parent: new_parent,
                children: Vec::new(),
                store,
            });
        }

        Some(Self {
            slots,
            root: NodeId(0),
        })
    }

    /// Copies structure and payloads into a new tree with empty stores.
    #[must_use]
    pub fn detached_copy(&self) -> Self {
        Self {
            slots: self
                .slots
                .iter()
                .map(|slot| Slot {
                    node: slot.node.clone(),
                    parent: slot.parent,
                    children: slot.children.clone(),
                    store: ObjectMetadataStore::new(),
                })
                .collect(),
            root: self.root,
        }
    }
}

/// Structural equality: same payloads in the same shape. Ids and stores are
/// not compared.
impl PartialEq for MetadataTree {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self.root, other.root)];
        while let Some((a, b)) = stack.pop() {
            if self.node(a) != other.node(b) {
                return false;
            }
            let (left, right) = (self.children(a), other.children(b));
            if left.len() != right.len() {
                return false;
            }
            stack.extend(left.iter().copied().zip(right.iter().copied()));
        }
        true
    }
}

impl Eq for MetadataTree {}

// ============================================================================
// Handles
// ============================================================================

/// Read-only view of one node and its surroundings.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a MetadataTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    /// Returns the node id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns the owning tree.
    #[must_use]
    pub const fn tree(&self) -> &'a MetadataTree {
        self.tree
    }

    /// Returns the node payload.
    #[must_use]
    pub fn node(&self) -> &'a MetadataNode {
        self.tree.node(self.id)
    }

    /// Returns the entity payload, if this is an entity.
    #[must_use]
    pub fn entity(&self) -> Option<&'a EntityDescriptor> {
        self.node().as_entity()
    }

    /// Returns the parent node.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.tree.parent(self.id).map(|id| self.tree.at(id))
    }

    /// Iterates over ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.ancestors(self.id).map(move |id| tree.at(id))
    }

    /// Iterates over children in document order.
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        tree.children(self.id).iter().map(move |&id| tree.at(id))
    }

    /// Returns the node's annotation store.
    #[must_use]
    pub fn store(&self) -> &'a ObjectMetadataStore {
        self.tree.store(self.id)
    }

    /// Returns the recorded enclosing group names, outermost first.
    #[must_use]
    pub fn group_names(&self) -> Vec<&'a str> {
        self.store()
            .get::<EntityGroupName>()
            .map(EntityGroupName::as_str)
            .collect()
    }
}

/// Annotating handle on one node.
///
/// Exposes the node's store for writing and the rest of the tree for
/// reading; structure and payloads cannot be changed through it.
#[derive(Debug)]
pub struct NodeMut<'a> {
    tree: &'a mut MetadataTree,
    id: NodeId,
}

impl NodeMut<'_> {
    /// Returns the node id.
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Returns a read-only view of the node.
    #[must_use]
    pub fn view(&self) -> NodeRef<'_> {
        self.tree.at(self.id)
    }

    /// Returns the node payload.
    #[must_use]
    pub fn node(&self) -> &MetadataNode {
        self.tree.node(self.id)
    }

    /// Returns the node's store for writing.
    pub fn store_mut(&mut self) -> &mut ObjectMetadataStore {
        self.tree.store_mut(self.id)
    }
}
