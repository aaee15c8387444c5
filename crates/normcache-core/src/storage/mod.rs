//! # Storage Backends
//!
//! - `MemoryStore` (in `crate::store`): fast, volatile unless extracted
//! - `RedbStore`: disk-backed, ACID, one transaction per write batch
//!
//! `StorageBackend` picks one of the two at runtime while keeping a single
//! `EntityStore` type for the cache.

mod redb_store;

pub use redb_store::RedbStore;

use crate::store::{EntityStore, MemoryStore};
use crate::{CacheError, EntityId, Record};
use std::path::Path;

/// Storage backend chosen at runtime.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory store (fast, volatile).
    InMemory(MemoryStore),
    /// Disk-backed store using redb (ACID, persistent).
    Persistent(RedbStore),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryStore::new())
    }
}

impl StorageBackend {
    /// Open or create a redb-backed store.
    pub fn redb(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Ok(Self::Persistent(RedbStore::open(path)?))
    }

    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Persistent(_))
    }
}

impl EntityStore for StorageBackend {
    fn get(&self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        match self {
            Self::InMemory(store) => store.get(id),
            Self::Persistent(store) => store.get(id),
        }
    }

    fn set(&mut self, id: EntityId, record: Record) -> Result<(), CacheError> {
        match self {
            Self::InMemory(store) => store.set(id, record),
            Self::Persistent(store) => store.set(id, record),
        }
    }

    fn set_many(&mut self, records: Vec<(EntityId, Record)>) -> Result<(), CacheError> {
        match self {
            Self::InMemory(store) => store.set_many(records),
            Self::Persistent(store) => store.set_many(records),
        }
    }

    fn remove(&mut self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        match self {
            Self::InMemory(store) => store.remove(id),
            Self::Persistent(store) => store.remove(id),
        }
    }

    fn contains(&self, id: &EntityId) -> Result<bool, CacheError> {
        match self {
            Self::InMemory(store) => store.contains(id),
            Self::Persistent(store) => store.contains(id),
        }
    }

    fn ids(&self) -> Result<Vec<EntityId>, CacheError> {
        match self {
            Self::InMemory(store) => store.ids(),
            Self::Persistent(store) => store.ids(),
        }
    }

    fn len(&self) -> Result<usize, CacheError> {
        match self {
            Self::InMemory(store) => store.len(),
            Self::Persistent(store) => store.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn exercise(backend: &mut StorageBackend) {
        let id = EntityId::new("Person:1");
        let mut record = Record::new();
        record.set_scalar("name", json!("Luke"));
        backend.set(id.clone(), record).expect("set");

        assert!(backend.contains(&id).expect("contains"));
        assert_eq!(backend.len().expect("len"), 1);
        assert_eq!(
            backend
                .get(&id)
                .expect("get")
                .and_then(|r| r.scalar("name").cloned()),
            Some(json!("Luke"))
        );
        assert!(backend.remove(&id).expect("remove").is_some());
        assert!(backend.is_empty().expect("empty"));
    }

    #[test]
    fn both_backends_behave_alike() {
        let mut memory = StorageBackend::default();
        assert!(!memory.is_persistent());
        exercise(&mut memory);

        let temp = tempdir().expect("temp dir");
        let mut persistent = StorageBackend::redb(temp.path().join("cache.redb")).expect("open");
        assert!(persistent.is_persistent());
        exercise(&mut persistent);
    }
}
