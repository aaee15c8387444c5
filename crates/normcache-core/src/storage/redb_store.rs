//! # redb-backed Entity Store
//!
//! A disk-backed entity store using the redb embedded database. One table
//! maps entity id to the postcard encoding of its canonical record. Scalars
//! keep the JSON key order they were written with.
//!
//! Every `set_many` runs in a single write transaction: a crash mid-batch
//! leaves the previous state intact.

use crate::formats::canonical::CanonicalRecord;
use crate::store::EntityStore;
use crate::{CacheError, EntityId, Record};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::path::Path;

/// Table for records: entity id -> postcard `CanonicalRecord`.
const RECORDS: TableDefinition<&str, &[u8]> = TableDefinition::new("records");

fn io_error(e: impl std::fmt::Display) -> CacheError {
    CacheError::IoError(e.to_string())
}

fn encode(id: &EntityId, record: &Record) -> Result<Vec<u8>, CacheError> {
    let canonical = CanonicalRecord::from_record(id, record)?;
    postcard::to_allocvec(&canonical).map_err(|e| CacheError::SerializationError(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<Record, CacheError> {
    let canonical: CanonicalRecord = postcard::from_bytes(bytes)
        .map_err(|e| CacheError::DeserializationError(e.to_string()))?;
    Ok(canonical.into_record()?.1)
}

/// A disk-backed entity store.
pub struct RedbStore {
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        // Create the table up front so read transactions never miss it.
        let write_txn = db.begin_write().map_err(io_error)?;
        {
            let _ = write_txn.open_table(RECORDS).map_err(io_error)?;
        }
        write_txn.commit().map_err(io_error)?;

        tracing::debug!(path = %path.as_ref().display(), "opened redb store");
        Ok(Self { db })
    }

    /// Compact the database file.
    pub fn compact(&mut self) -> Result<bool, CacheError> {
        self.db.compact().map_err(io_error)
    }
}

impl EntityStore for RedbStore {
    fn get(&self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(RECORDS).map_err(io_error)?;
        let record = table
            .get(id.as_str())
            .map_err(io_error)?
            .map(|guard| decode(guard.value()))
            .transpose()?;
        Ok(record)
    }

    fn set(&mut self, id: EntityId, record: Record) -> Result<(), CacheError> {
        self.set_many(vec![(id, record)])
    }

    fn set_many(&mut self, records: Vec<(EntityId, Record)>) -> Result<(), CacheError> {
        let count = records.len();
        let write_txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut table = write_txn.open_table(RECORDS).map_err(io_error)?;
            for (id, patch) in records {
                let mut merged = table
                    .get(id.as_str())
                    .map_err(io_error)?
                    .map(|guard| decode(guard.value()))
                    .transpose()?
                    .unwrap_or_default();
                merged.merge(patch);
                let bytes = encode(&id, &merged)?;
                table
                    .insert(id.as_str(), bytes.as_slice())
                    .map_err(io_error)?;
            }
        }
        write_txn.commit().map_err(io_error)?;
        tracing::trace!(records = count, "committed redb batch");
        Ok(())
    }

    fn remove(&mut self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        let write_txn = self.db.begin_write().map_err(io_error)?;
        let removed = {
            let mut table = write_txn.open_table(RECORDS).map_err(io_error)?;
            let guard = table.remove(id.as_str()).map_err(io_error)?;
            guard.map(|g| decode(g.value())).transpose()?
        };
        write_txn.commit().map_err(io_error)?;
        Ok(removed)
    }

    fn contains(&self, id: &EntityId) -> Result<bool, CacheError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(RECORDS).map_err(io_error)?;
        Ok(table.get(id.as_str()).map_err(io_error)?.is_some())
    }

    fn ids(&self) -> Result<Vec<EntityId>, CacheError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(RECORDS).map_err(io_error)?;
        let mut ids = Vec::new();
        for entry in table.iter().map_err(io_error)? {
            let (key, _) = entry.map_err(io_error)?;
            ids.push(EntityId::new(key.value()));
        }
        Ok(ids)
    }

    fn len(&self) -> Result<usize, CacheError> {
        let read_txn = self.db.begin_read().map_err(io_error)?;
        let table = read_txn.open_table(RECORDS).map_err(io_error)?;
        Ok(table.len().map_err(io_error)? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reference;
    use serde_json::json;
    use tempfile::tempdir;

    fn person(name: &str) -> Record {
        let mut record = Record::new();
        record.set_scalar("__typename", json!("Person"));
        record.set_scalar("name", json!(name));
        record
    }

    #[test]
    fn basic_operations() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");

        assert!(store.get(&EntityId::new("Person:1")).expect("get").is_none());
        store
            .set(EntityId::new("Person:1"), person("Luke"))
            .expect("set");

        let record = store
            .get(&EntityId::new("Person:1"))
            .expect("get")
            .expect("present");
        assert_eq!(record.scalar("name"), Some(&json!("Luke")));
        assert_eq!(store.len().expect("len"), 1);
    }

    #[test]
    fn set_merges_at_field_level() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let id = EntityId::new("Person:1");

        store.set(id.clone(), person("Luke")).expect("set");
        let mut patch = Record::new();
        patch.set_reference("homeworld", Reference::Id(EntityId::new("Planet:1")));
        store.set(id.clone(), patch).expect("set");

        let record = store.get(&id).expect("get").expect("present");
        assert_eq!(record.scalar("name"), Some(&json!("Luke")));
        assert_eq!(
            record.reference("homeworld"),
            Some(&Reference::Id(EntityId::new("Planet:1")))
        );
    }

    #[test]
    fn recovery_persistence_after_reopen() {
        let temp = tempdir().expect("temp dir");
        let path = temp.path().join("test.redb");
        {
            let mut store = RedbStore::open(&path).expect("open db");
            store
                .set_many(vec![
                    (EntityId::new("Person:1"), person("Luke")),
                    (EntityId::new("Person:2"), person("Leia")),
                ])
                .expect("set many");
        }

        let store = RedbStore::open(&path).expect("reopen db");
        assert_eq!(
            store.ids().expect("ids"),
            vec![EntityId::new("Person:1"), EntityId::new("Person:2")]
        );
        let leia = store
            .get(&EntityId::new("Person:2"))
            .expect("get")
            .expect("present");
        assert_eq!(leia.scalar("name"), Some(&json!("Leia")));
    }

    #[test]
    fn remove_returns_record() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let id = EntityId::new("Person:1");
        store.set(id.clone(), person("Luke")).expect("set");

        let removed = store.remove(&id).expect("remove").expect("was present");
        assert_eq!(removed.scalar("name"), Some(&json!("Luke")));
        assert!(!store.contains(&id).expect("contains"));
        assert!(store.remove(&id).expect("remove").is_none());
    }

    #[test]
    fn nested_scalar_values_survive_encoding() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let id = EntityId::new("ROOT_QUERY");
        let mut record = Record::new();
        record.set_scalar("config", json!({ "nested": [1, 2.5, "x", null, { "k": false }] }));
        store.set(id.clone(), record.clone()).expect("set");

        assert_eq!(store.get(&id).expect("get"), Some(record));
    }

    #[test]
    fn object_scalars_keep_key_order() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        let id = EntityId::new("ROOT_QUERY");
        let written: serde_json::Value = serde_json::from_str(r#"{"b":1,"a":{"d":2,"c":3}}"#)
            .expect("parse");
        let mut record = Record::new();
        record.set_scalar("settings", written);
        store.set(id.clone(), record).expect("set");

        let read = store.get(&id).expect("get").expect("present");
        let text = serde_json::to_string(read.scalar("settings").expect("settings"))
            .expect("json");
        assert_eq!(text, r#"{"b":1,"a":{"d":2,"c":3}}"#);
    }

    #[test]
    fn compact_after_writes() {
        let temp = tempdir().expect("temp dir");
        let mut store = RedbStore::open(temp.path().join("test.redb")).expect("open db");
        store
            .set(EntityId::new("Person:1"), person("Luke"))
            .expect("set");
        store.compact().expect("compact");
        assert_eq!(store.len().expect("len"), 1);
    }
}
