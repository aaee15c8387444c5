//! # Persistence Formats
//!
//! - `snapshot`: the JSON hydration format (`id -> { scalars, references }`)
//! - `canonical`: the bit-exact binary export with header and checksum

pub mod canonical;
pub mod snapshot;

pub use canonical::{
    CanonicalHeader, CanonicalRecord, CanonicalReference, CanonicalSnapshot, canonical_checksum,
    export_canonical, import_canonical, verify_canonical,
};
#[cfg(feature = "crypto-hash")]
pub use canonical::{canonical_crypto_hash, verify_crypto_hash};
pub use snapshot::{StoreSnapshot, extract, hydrate, snapshot_from_json, snapshot_to_json};
