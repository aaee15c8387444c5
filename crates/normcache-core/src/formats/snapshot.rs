//! # Store Snapshots
//!
//! The JSON hydration format: a flat map of entity id to
//! `{ "scalars": {...}, "references": {...} }`. This is the only state a
//! cache needs to carry across a process boundary (e.g. server-rendered
//! state handed to a client).

use crate::store::EntityStore;
use crate::{CacheError, EntityId, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Full content of an entity store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreSnapshot {
    pub records: BTreeMap<EntityId, Record>,
}

impl StoreSnapshot {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Copy every record out of `store`.
pub fn extract<S: EntityStore + ?Sized>(store: &S) -> Result<StoreSnapshot, CacheError> {
    let mut records = BTreeMap::new();
    for id in store.ids()? {
        if let Some(record) = store.get(&id)? {
            records.insert(id, record);
        }
    }
    Ok(StoreSnapshot { records })
}

/// Merge a snapshot into `store`, field by field.
pub fn hydrate<S: EntityStore + ?Sized>(
    store: &mut S,
    snapshot: StoreSnapshot,
) -> Result<(), CacheError> {
    tracing::debug!(entities = snapshot.len(), "hydrating store");
    store.set_many(snapshot.records.into_iter().collect())
}

/// Serialize a snapshot as pretty-printed JSON.
pub fn snapshot_to_json(snapshot: &StoreSnapshot) -> Result<String, CacheError> {
    serde_json::to_string_pretty(snapshot).map_err(|e| {
        CacheError::SerializationError(format!("Failed to serialize snapshot: {}", e))
    })
}

/// Parse a snapshot from JSON.
pub fn snapshot_from_json(json: &str) -> Result<StoreSnapshot, CacheError> {
    serde_json::from_str(json).map_err(|e| {
        CacheError::DeserializationError(format!("Failed to deserialize snapshot: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Reference;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn sample_store() -> MemoryStore {
        let mut store = MemoryStore::new();
        let mut root = Record::new();
        root.set_reference("hero", Reference::Id(EntityId::new("Droid:2001")));
        root.set_reference(
            "friends",
            Reference::List(vec![
                Reference::Id(EntityId::new("Human:1000")),
                Reference::Null,
            ]),
        );
        root.set_scalar("count({\"since\":3})", json!(9));
        store.set(EntityId::new("ROOT_QUERY"), root).expect("set");

        let mut droid = Record::new();
        droid.set_scalar("name", json!("R2-D2"));
        droid.set_scalar("meta", json!({ "b": [1, 2], "a": null }));
        store.set(EntityId::new("Droid:2001"), droid).expect("set");
        store
    }

    #[test]
    fn json_shape_is_flat_map() {
        let snapshot = extract(&sample_store()).expect("extract");
        let value = serde_json::to_value(&snapshot).expect("to value");

        assert_eq!(value["ROOT_QUERY"]["references"]["hero"], json!("Droid:2001"));
        assert_eq!(
            value["ROOT_QUERY"]["references"]["friends"],
            json!(["Human:1000", null])
        );
        assert_eq!(value["Droid:2001"]["scalars"]["name"], json!("R2-D2"));
    }

    #[test]
    fn extract_hydrate_roundtrip_is_lossless() {
        let original = sample_store();
        let json = snapshot_to_json(&extract(&original).expect("extract")).expect("to json");

        let mut restored = MemoryStore::new();
        hydrate(&mut restored, snapshot_from_json(&json).expect("from json")).expect("hydrate");

        assert_eq!(restored, original);
    }

    #[test]
    fn malformed_json_is_deserialization_error() {
        let err = snapshot_from_json("{ not json").expect_err("malformed");
        assert!(matches!(err, CacheError::DeserializationError(_)));
    }
}
