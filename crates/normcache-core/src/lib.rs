//! # normcache-core
//!
//! The normalized cache engine for normcache.
//!
//! Tree-shaped query results are flattened into a store of entity records
//! linked by identifier, and tree-shaped results are reconstructed from that
//! store for any selection. Every object is stored once, so an update
//! written by one query is visible to every other query that reaches the
//! same entity.
//!
//! ## Components
//!
//! - `store`: the flat id -> record map (`MemoryStore`, and `RedbStore` in
//!   `storage`)
//! - `writer`: result tree + selection -> record patches
//! - `reader`: selection + store -> result tree, reusing unchanged subtrees
//!   of a previous result
//! - `selection` / `identity`: field collection, storage keys, identifiers
//!   and fragment matching shared by writer and reader
//! - `formats`: JSON snapshots and the canonical binary export
//!
//! ## Architectural Constraints
//!
//! - Pure Rust: no async, no network dependencies
//! - Synchronous: a write or read completes or fails, never suspends
//! - Deterministic: `BTreeMap` everywhere, identical input gives identical
//!   stores and identical exports
//! - Explicit state: the store is always passed in, never global

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod formats;
pub mod identity;
pub mod metrics;
pub mod primitives;
pub mod reader;
pub mod result;
pub mod selection;
pub mod storage;
pub mod store;
pub mod types;
pub mod writer;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CacheError, EntityId, Record, Reference, TYPENAME_FIELD};

// =============================================================================
// RE-EXPORTS: Cache Engine
// =============================================================================

pub use cache::NormalizedCache;
pub use identity::{
    FieldIdentity, FragmentMatch, FragmentMatcher, HeuristicMatcher, IdentifyObject, NoIdentity,
    PossibleTypesMatcher, generated_id,
};
pub use metrics::StoreMetrics;
pub use primitives::{ROOT_MUTATION, ROOT_QUERY};
pub use reader::{DiffResult, ReadOptions, ReadResult, diff_against_store, read_from_store};
pub use result::{ResultObject, ResultValue};
pub use selection::{
    ArgValue, Document, Field, FragmentDefinition, FragmentMap, FragmentSpread, InlineFragment,
    Selection, SelectionSet, Variables, storage_key,
};
pub use storage::{RedbStore, StorageBackend};
pub use store::{EntityStore, MemoryStore};
pub use writer::{WriteBatch, WriteOptions, WriteSummary, build_batch, write_to_store};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    StoreSnapshot, canonical_checksum, export_canonical, import_canonical, verify_canonical,
};
#[cfg(feature = "crypto-hash")]
pub use formats::{canonical_crypto_hash, verify_crypto_hash};
