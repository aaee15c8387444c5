//! # Entity Store
//!
//! The flat mapping from entity identifier to entity record.
//!
//! This module implements the `EntityStore` trait for the in-memory
//! backend. It has no knowledge of selections; traversal lives in the
//! writer and reader. All data structures use `BTreeMap` for deterministic
//! ordering.

use crate::{CacheError, EntityId, Record};
use std::collections::BTreeMap;

// =============================================================================
// ENTITYSTORE TRAIT
// =============================================================================

/// The EntityStore trait defines the core store operations.
///
/// Absence is a valid "unknown entity" state, never a fault. All operations
/// return `Result<T, CacheError>` so that in-memory and persistent backends
/// share one interface; the in-memory backend never fails.
pub trait EntityStore {
    /// Fetch the record stored under `id`.
    fn get(&self, id: &EntityId) -> Result<Option<Record>, CacheError>;

    /// Merge `record` into the record stored under `id`.
    ///
    /// New keys are added, existing keys replaced, keys not mentioned are
    /// left untouched. Creates the record if it does not exist.
    fn set(&mut self, id: EntityId, record: Record) -> Result<(), CacheError>;

    /// Merge many records at once.
    ///
    /// Backends with transactions apply the whole batch atomically.
    fn set_many(&mut self, records: Vec<(EntityId, Record)>) -> Result<(), CacheError> {
        for (id, record) in records {
            self.set(id, record)?;
        }
        Ok(())
    }

    /// Remove a record entirely. Only external eviction policies call this.
    fn remove(&mut self, id: &EntityId) -> Result<Option<Record>, CacheError>;

    /// Check if a record exists for `id`.
    fn contains(&self, id: &EntityId) -> Result<bool, CacheError> {
        Ok(self.get(id)?.is_some())
    }

    /// All stored ids in ascending order.
    fn ids(&self) -> Result<Vec<EntityId>, CacheError>;

    /// Number of stored records.
    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.ids()?.len())
    }

    /// Check if the store holds no records.
    fn is_empty(&self) -> Result<bool, CacheError> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// The in-memory entity store.
///
/// Uses `BTreeMap` exclusively for deterministic ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    records: BTreeMap<EntityId, Record>,
}

impl MemoryStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Borrow a record without cloning it.
    #[must_use]
    pub fn record(&self, id: &EntityId) -> Option<&Record> {
        self.records.get(id)
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        Ok(self.records.get(id).cloned())
    }

    fn set(&mut self, id: EntityId, record: Record) -> Result<(), CacheError> {
        self.records.entry(id).or_default().merge(record);
        Ok(())
    }

    fn remove(&mut self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        Ok(self.records.remove(id))
    }

    fn contains(&self, id: &EntityId) -> Result<bool, CacheError> {
        Ok(self.records.contains_key(id))
    }

    fn ids(&self) -> Result<Vec<EntityId>, CacheError> {
        Ok(self.records.keys().cloned().collect())
    }

    fn len(&self) -> Result<usize, CacheError> {
        Ok(self.records.len())
    }
}

impl FromIterator<(EntityId, Record)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (EntityId, Record)>>(iter: I) -> Self {
        let mut store = Self::new();
        for (id, record) in iter {
            store.records.entry(id).or_default().merge(record);
        }
        store
    }
}

// =============================================================================
// TESTS
// =============================================================================
