//! # Store Metrics
//!
//! Size and health figures for an entity store, computed in one pass.

use crate::store::EntityStore;
use crate::{CacheError, EntityId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Summary figures for a store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreMetrics {
    /// Number of records.
    pub entity_count: usize,
    /// Scalar fields across all records.
    pub scalar_field_count: usize,
    /// Reference fields across all records.
    pub reference_field_count: usize,
    /// Distinct referenced ids with no record of their own.
    pub dangling_reference_count: usize,
}

impl StoreMetrics {
    /// Compute metrics from a store.
    pub fn from_store<S: EntityStore + ?Sized>(store: &S) -> Result<Self, CacheError> {
        let ids = store.ids()?;
        let known: BTreeSet<&EntityId> = ids.iter().collect();

        let mut metrics = Self {
            entity_count: ids.len(),
            ..Self::default()
        };
        let mut dangling = BTreeSet::new();

        for id in &ids {
            let Some(record) = store.get(id)? else {
                continue;
            };
            metrics.scalar_field_count += record.scalars.len();
            metrics.reference_field_count += record.references.len();
            for reference in record.references.values() {
                reference.for_each_id(&mut |target| {
                    if !known.contains(target) {
                        dangling.insert(target.clone());
                    }
                });
            }
        }

        metrics.dangling_reference_count = dangling.len();
        Ok(metrics)
    }
}
