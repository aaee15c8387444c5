//! # Normalized Cache
//!
//! The facade most callers use: one store plus the identity policy and the
//! fragment matcher that every write and read against it must share.
//!
//! The cache owns no scheduling. Writers call `write_*`, readers call
//! `read_*`/`diff_query`; when a read reports missing data the caller
//! fetches, writes and reads again.

use crate::formats::snapshot::{self, StoreSnapshot};
use crate::identity::{FragmentMatcher, HeuristicMatcher, IdentifyObject, NoIdentity};
use crate::metrics::StoreMetrics;
use crate::primitives::ROOT_QUERY;
use crate::reader::{DiffResult, ReadOptions, ReadResult, diff_against_store, read_from_store};
use crate::result::ResultObject;
use crate::selection::{Document, FragmentSpread, SelectionSet, Variables};
use crate::store::{EntityStore, MemoryStore};
use crate::writer::{WriteOptions, WriteSummary, write_to_store};
use crate::{CacheError, EntityId, Record};
use serde_json::Value;
use std::sync::Arc;

/// A normalized cache over an entity store.
pub struct NormalizedCache<S: EntityStore = MemoryStore> {
    store: S,
    identify: Box<dyn IdentifyObject>,
    matcher: Box<dyn FragmentMatcher>,
}

impl<S: EntityStore + std::fmt::Debug> std::fmt::Debug for NormalizedCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizedCache")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl Default for NormalizedCache<MemoryStore> {
    fn default() -> Self {
        Self::with_store(MemoryStore::new())
    }
}

impl NormalizedCache<MemoryStore> {
    /// An empty in-memory cache with generated ids only.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: EntityStore> NormalizedCache<S> {
    /// Wrap an existing store.
    #[must_use]
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            identify: Box::new(NoIdentity),
            matcher: Box::new(HeuristicMatcher),
        }
    }

    /// Use `identify` to derive user ids for nested objects.
    #[must_use]
    pub fn with_identify(mut self, identify: impl IdentifyObject + 'static) -> Self {
        self.identify = Box::new(identify);
        self
    }

    /// Use `matcher` to evaluate fragment type conditions.
    #[must_use]
    pub fn with_matcher(mut self, matcher: impl FragmentMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Write a query result under `ROOT_QUERY`.
    pub fn write_query(
        &mut self,
        document: &Document,
        variables: &Variables,
        data: &Value,
    ) -> Result<WriteSummary, CacheError> {
        self.write_result(&EntityId::new(ROOT_QUERY), document, variables, data)
    }

    /// Write an operation result under an arbitrary root id.
    pub fn write_result(
        &mut self,
        root_id: &EntityId,
        document: &Document,
        variables: &Variables,
        data: &Value,
    ) -> Result<WriteSummary, CacheError> {
        let selection = document.operation_selection()?;
        self.write_selection(root_id, document, selection, variables, data)
    }

    /// Write `data` into the entity `id` through one of `document`'s
    /// fragments.
    pub fn write_fragment(
        &mut self,
        id: &EntityId,
        document: &Document,
        fragment_name: Option<&str>,
        data: &Value,
        variables: &Variables,
    ) -> Result<WriteSummary, CacheError> {
        let selection = fragment_selection(document, fragment_name)?;
        self.write_selection(id, document, &selection, variables, data)
    }

    fn write_selection(
        &mut self,
        root_id: &EntityId,
        document: &Document,
        selection: &SelectionSet,
        variables: &Variables,
        data: &Value,
    ) -> Result<WriteSummary, CacheError> {
        let fragments = document.fragment_map();
        let options = WriteOptions {
            variables,
            fragments: &fragments,
            identify: self.identify.as_ref(),
            matcher: self.matcher.as_ref(),
        };
        write_to_store(&mut self.store, &options, root_id, selection, data)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Read the document's operation from `ROOT_QUERY`.
    pub fn read_query(
        &self,
        document: &Document,
        variables: &Variables,
        previous: Option<&Arc<ResultObject>>,
    ) -> Result<ReadResult, CacheError> {
        self.read(&EntityId::new(ROOT_QUERY), document, variables, previous)
    }

    /// Read the document's operation from an arbitrary root id.
    pub fn read(
        &self,
        root_id: &EntityId,
        document: &Document,
        variables: &Variables,
        previous: Option<&Arc<ResultObject>>,
    ) -> Result<ReadResult, CacheError> {
        let selection = document.operation_selection()?;
        let fragments = document.fragment_map();
        let options = self.read_options(variables, &fragments);
        read_from_store(&self.store, &options, root_id, selection, previous)
    }

    /// Read the document's operation from `ROOT_QUERY`, reporting missing
    /// data instead of failing on it.
    pub fn diff_query(
        &self,
        document: &Document,
        variables: &Variables,
        previous: Option<&Arc<ResultObject>>,
    ) -> Result<DiffResult, CacheError> {
        let selection = document.operation_selection()?;
        let fragments = document.fragment_map();
        let options = self.read_options(variables, &fragments);
        diff_against_store(
            &self.store,
            &options,
            &EntityId::new(ROOT_QUERY),
            selection,
            previous,
        )
    }

    /// Read the entity `id` through one of `document`'s fragments.
    pub fn read_fragment(
        &self,
        id: &EntityId,
        document: &Document,
        fragment_name: Option<&str>,
        variables: &Variables,
        previous: Option<&Arc<ResultObject>>,
    ) -> Result<ReadResult, CacheError> {
        let selection = fragment_selection(document, fragment_name)?;
        let fragments = document.fragment_map();
        let options = self.read_options(variables, &fragments);
        read_from_store(&self.store, &options, id, &selection, previous)
    }

    fn read_options<'a>(
        &'a self,
        variables: &'a Variables,
        fragments: &'a crate::selection::FragmentMap,
    ) -> ReadOptions<'a> {
        ReadOptions {
            variables,
            fragments,
            matcher: self.matcher.as_ref(),
        }
    }

    // =========================================================================
    // STORE MAINTENANCE
    // =========================================================================

    /// Drop one entity. References to it become dangling and read as
    /// missing data until it is written again.
    pub fn evict(&mut self, id: &EntityId) -> Result<Option<Record>, CacheError> {
        let removed = self.store.remove(id)?;
        tracing::debug!(%id, removed = removed.is_some(), "evict");
        Ok(removed)
    }

    /// Copy the whole store out as a snapshot.
    pub fn extract(&self) -> Result<StoreSnapshot, CacheError> {
        snapshot::extract(&self.store)
    }

    /// Merge a snapshot into the store.
    pub fn restore(&mut self, snapshot: StoreSnapshot) -> Result<(), CacheError> {
        snapshot::hydrate(&mut self.store, snapshot)
    }

    pub fn metrics(&self) -> Result<StoreMetrics, CacheError> {
        StoreMetrics::from_store(&self.store)
    }
}

/// A one-spread selection `{ ...Name }` for a fragment of `document`.
fn fragment_selection(
    document: &Document,
    fragment_name: Option<&str>,
) -> Result<SelectionSet, CacheError> {
    let definition = document.single_fragment(fragment_name)?;
    Ok(SelectionSet::new(vec![
        FragmentSpread::new(definition.name.clone()).into(),
    ]))
}

// =============================================================================
// TESTS
// =============================================================================
