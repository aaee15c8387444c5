//! # Canonical Snapshot Export
//!
//! `redb` files are not bit-identical across runs. This module provides the
//! bit-exact form of a store: records sorted by id, fields sorted by storage
//! key, scalar values rendered as JSON text, encoded with `postcard`.
//!
//! Scalar text keeps the key order the value was written with. The checksum
//! and the BLAKE3 hash are taken over a digest form whose object keys are
//! sorted, so stores that differ only in nested key order hash the same.
//!
//! Layout: `[u32 LE header length][postcard header][postcard body]`.

use crate::formats::snapshot::StoreSnapshot;
use crate::primitives::{FORMAT_VERSION, MAGIC_BYTES, MAX_IMPORT_ENTITY_COUNT};
use crate::selection::canonical_json;
use crate::store::EntityStore;
use crate::{CacheError, EntityId, Record, Reference};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// HEADER
// =============================================================================

/// Header of a canonical snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    pub magic: [u8; 4],
    pub version: u8,
    /// Number of records in the body.
    pub entity_count: u64,
    /// FNV-1a checksum of the body's digest form.
    pub checksum: u64,
}

impl CanonicalHeader {
    #[must_use]
    pub fn new(entity_count: u64, checksum: u64) -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
            entity_count,
            checksum,
        }
    }

    /// Reject foreign or future files.
    ///
    /// Messages stay generic; they are shown to whoever fed the file in.
    pub fn validate(&self) -> Result<(), CacheError> {
        if &self.magic != MAGIC_BYTES {
            return Err(CacheError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != FORMAT_VERSION {
            return Err(CacheError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        if self.entity_count > MAX_IMPORT_ENTITY_COUNT {
            return Err(CacheError::SerializationError(
                "Entity count exceeds import limit".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// CANONICAL RECORDS
// =============================================================================

/// Reference field in canonical form.
///
/// Externally tagged: `postcard` cannot decode the untagged JSON shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum CanonicalReference {
    Null,
    Id(String),
    List(Vec<CanonicalReference>),
}

impl From<&Reference> for CanonicalReference {
    fn from(reference: &Reference) -> Self {
        match reference {
            Reference::Null => Self::Null,
            Reference::Id(id) => Self::Id(id.0.clone()),
            Reference::List(items) => Self::List(items.iter().map(Self::from).collect()),
        }
    }
}

impl From<CanonicalReference> for Reference {
    fn from(reference: CanonicalReference) -> Self {
        match reference {
            CanonicalReference::Null => Self::Null,
            CanonicalReference::Id(id) => Self::Id(EntityId(id)),
            CanonicalReference::List(items) => {
                Self::List(items.into_iter().map(Self::from).collect())
            }
        }
    }
}

/// One entity record, fields sorted by key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub id: String,
    /// `(storage key, JSON text)`.
    pub scalars: Vec<(String, String)>,
    pub references: Vec<(String, CanonicalReference)>,
}

impl CanonicalRecord {
    pub(crate) fn from_record(id: &EntityId, record: &Record) -> Result<Self, CacheError> {
        let scalars = record
            .scalars
            .iter()
            .map(|(key, value)| {
                let text = serde_json::to_string(value).map_err(|e| {
                    CacheError::SerializationError(format!("Scalar {}: {}", key, e))
                })?;
                Ok((key.clone(), text))
            })
            .collect::<Result<Vec<_>, CacheError>>()?;
        Ok(Self {
            id: id.0.clone(),
            scalars,
            references: record
                .references
                .iter()
                .map(|(key, reference)| (key.clone(), CanonicalReference::from(reference)))
                .collect(),
        })
    }

    pub(crate) fn into_record(self) -> Result<(EntityId, Record), CacheError> {
        let mut record = Record::new();
        for (key, text) in self.scalars {
            let value = serde_json::from_str(&text).map_err(|e| {
                CacheError::DeserializationError(format!("Scalar {}: {}", key, e))
            })?;
            record.set_scalar(key, value);
        }
        for (key, reference) in self.references {
            record.set_reference(key, Reference::from(reference));
        }
        Ok((EntityId(self.id), record))
    }
}

/// A whole store in canonical order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalSnapshot {
    pub records: Vec<CanonicalRecord>,
}

impl CanonicalSnapshot {
    /// Capture `store`, sorted by entity id.
    pub fn from_store<S: EntityStore + ?Sized>(store: &S) -> Result<Self, CacheError> {
        let mut ids = store.ids()?;
        ids.sort();
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = store.get(&id)? {
                records.push(CanonicalRecord::from_record(&id, &record)?);
            }
        }
        Ok(Self { records })
    }

    /// Decode back into a hydratable snapshot.
    pub fn into_snapshot(self) -> Result<StoreSnapshot, CacheError> {
        let mut records = BTreeMap::new();
        for canonical in self.records {
            let (id, record) = canonical.into_record()?;
            records.insert(id, record);
        }
        Ok(StoreSnapshot { records })
    }

    fn encode(&self) -> Result<Vec<u8>, CacheError> {
        postcard::to_allocvec(self)
            .map_err(|e| CacheError::SerializationError(format!("Body: {}", e)))
    }

    /// Encoding with every scalar rewritten as key-sorted JSON.
    fn digest_bytes(&self) -> Result<Vec<u8>, CacheError> {
        let mut sorted = self.clone();
        for record in &mut sorted.records {
            for (key, text) in &mut record.scalars {
                let value: serde_json::Value = serde_json::from_str(text).map_err(|e| {
                    CacheError::DeserializationError(format!("Scalar {}: {}", key, e))
                })?;
                *text = canonical_json(&value)?;
            }
        }
        sorted.encode()
    }

    fn checksum(&self) -> Result<u64, CacheError> {
        Ok(fnv1a(&self.digest_bytes()?))
    }
}

/// 64-bit FNV-1a over `bytes`.
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    bytes.iter().fold(OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(PRIME)
    })
}

// =============================================================================
// EXPORT / IMPORT
// =============================================================================

/// Export `store` to the canonical binary form.
///
/// Two stores with the same records, written with the same JSON key order,
/// always export to the same bytes.
pub fn export_canonical<S: EntityStore + ?Sized>(store: &S) -> Result<Vec<u8>, CacheError> {
    let snapshot = CanonicalSnapshot::from_store(store)?;
    let body = snapshot.encode()?;
    let header = CanonicalHeader::new(snapshot.records.len() as u64, snapshot.checksum()?);
    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| CacheError::SerializationError(format!("Header: {}", e)))?;

    let header_len = u32::try_from(header_bytes.len())
        .map_err(|_| CacheError::SerializationError("Header too large".to_string()))?;

    let mut out = Vec::with_capacity(4 + header_bytes.len() + body.len());
    out.extend_from_slice(&header_len.to_le_bytes());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&body);

    tracing::debug!(
        entities = snapshot.records.len(),
        bytes = out.len(),
        "canonical export"
    );
    Ok(out)
}

/// Import a canonical export, validating header, limits and checksum.
pub fn import_canonical(data: &[u8]) -> Result<StoreSnapshot, CacheError> {
    let len_bytes: [u8; 4] = data
        .get(..4)
        .and_then(|slice| slice.try_into().ok())
        .ok_or_else(|| CacheError::DeserializationError("Data too short".to_string()))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;

    let header_end = 4usize
        .checked_add(header_len)
        .filter(|end| *end <= data.len())
        .ok_or_else(|| CacheError::DeserializationError("Header length out of range".to_string()))?;

    let header: CanonicalHeader = postcard::from_bytes(&data[4..header_end])
        .map_err(|e| CacheError::DeserializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let snapshot: CanonicalSnapshot = postcard::from_bytes(&data[header_end..])
        .map_err(|e| CacheError::DeserializationError(format!("Body: {}", e)))?;
    if snapshot.checksum()? != header.checksum {
        return Err(CacheError::DeserializationError(
            "Checksum mismatch".to_string(),
        ));
    }
    if snapshot.records.len() as u64 != header.entity_count {
        return Err(CacheError::DeserializationError(
            "Entity count mismatch".to_string(),
        ));
    }

    snapshot.into_snapshot()
}

/// Whether `canonical_data` is exactly the export of `store`.
pub fn verify_canonical<S: EntityStore + ?Sized>(
    store: &S,
    canonical_data: &[u8],
) -> Result<bool, CacheError> {
    Ok(export_canonical(store)? == canonical_data)
}

/// FNV-1a checksum of the digest form of `store`.
///
/// Cheap integrity check, not collision resistant. Use
/// `canonical_crypto_hash` when that matters.
pub fn canonical_checksum<S: EntityStore + ?Sized>(store: &S) -> Result<u64, CacheError> {
    CanonicalSnapshot::from_store(store)?.checksum()
}

/// BLAKE3 hash of the digest form of `store`, as 64 hex characters.
///
/// Only available with the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash<S: EntityStore + ?Sized>(store: &S) -> Result<String, CacheError> {
    let digest = CanonicalSnapshot::from_store(store)?.digest_bytes()?;
    Ok(blake3::hash(&digest).to_hex().to_string())
}

/// Compare `store` against a BLAKE3 hash produced by `canonical_crypto_hash`.
#[cfg(feature = "crypto-hash")]
pub fn verify_crypto_hash<S: EntityStore + ?Sized>(
    store: &S,
    expected_hash: &str,
) -> Result<bool, CacheError> {
    Ok(canonical_crypto_hash(store)? == expected_hash)
}

// =============================================================================
// TESTS
// =============================================================================
