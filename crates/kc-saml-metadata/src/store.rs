//! Per-node annotation side-table.
//!
//! Every node of a [`MetadataTree`](crate::model::MetadataTree) owns one
//! [`ObjectMetadataStore`]. Node processors write typed annotations into it;
//! later consumers read them back by type. Independent producers append to
//! the list for their own annotation type and never clobber each other.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Clone)]
struct AnnotationList {
    type_name: &'static str,
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

/// Map from annotation type to an ordered list of instances.
#[derive(Clone, Default)]
pub struct ObjectMetadataStore {
    entries: HashMap<TypeId, AnnotationList>,
}

impl ObjectMetadataStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an annotation after any existing ones of the same type.
    pub fn put<T: Any + Send + Sync>(&mut self, value: T) {
        self.entries
            .entry(TypeId::of::<T>())
            .or_insert_with(|| AnnotationList {
                type_name: std::any::type_name::<T>(),
                values: Vec::new(),
            })
            .values
            .push(Arc::new(value));
    }

    /// Iterates over all annotations of type `T` in insertion order.
    pub fn get<T: Any + Send + Sync>(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries
            .get(&TypeId::of::<T>())
            .into_iter()
            .flat_map(|list| list.values.iter())
            .filter_map(|v| (**v).downcast_ref::<T>())
    }

    /// Returns the first annotation of type `T`.
    #[must_use]
    pub fn first<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.get::<T>().next()
    }

    /// Checks whether any annotation of type `T` is present.
    #[must_use]
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    /// Returns the number of annotations of type `T`.
    #[must_use]
    pub fn count<T: Any + Send + Sync>(&self) -> usize {
        self.entries
            .get(&TypeId::of::<T>())
            .map_or(0, |list| list.values.len())
    }

    /// Removes every annotation of type `T`, returning how many were dropped.
    pub fn remove<T: Any + Send + Sync>(&mut self) -> usize {
        self.entries
            .remove(&TypeId::of::<T>())
            .map_or(0, |list| list.values.len())
    }

    /// Returns the total number of annotations across all types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(|list| list.values.len()).sum()
    }

    /// Returns true if the store holds no annotations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the type names of the annotation kinds present.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.entries.values().map(|list| list.type_name).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for ObjectMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.values().map(|list| (list.type_name, list.values.len())))
            .finish()
    }
}

// ============================================================================
// Annotations
// ============================================================================

/// Name of an `EntitiesDescriptor` enclosing an entity.
///
/// Written by [`EntitiesDescriptorNameProcessor`](crate::filter::EntitiesDescriptorNameProcessor),
/// one per named ancestor group, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityGroupName(pub String);

impl EntityGroupName {
    /// Returns the group name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}
