//! # Core Type Definitions
//!
//! This module contains the core types of the normalized object graph:
//! - Entity identifiers (`EntityId`)
//! - Stored field values (`Reference`, scalar `serde_json::Value`s)
//! - Entity records (`Record`)
//! - Error types (`CacheError`)
//!
//! ## Determinism Guarantees
//!
//! Records keep their fields in `BTreeMap`s, so iteration order (and
//! therefore every serialized form) depends only on the stored content.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// ENTITY IDENTIFIER
// =============================================================================

/// Opaque key of an entity record in the store.
///
/// Either a user identifier (derived from the object's own fields) or a
/// generated identifier (derived from the root id plus the path at which the
/// object was found).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create a new entity identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// REFERENCE
// =============================================================================

/// Value of a reference field: a link to another entity, `null`, or a list
/// mirroring the nesting shape of the original field value.
///
/// Serialized untagged: `null`, `"id"`, or a (nested) array of those.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference {
    /// Explicit null at this position.
    Null,
    /// A link to a single entity.
    Id(EntityId),
    /// A list of references, possibly nested.
    List(Vec<Reference>),
}

impl Reference {
    /// Visit every entity id in this reference, depth-first.
    pub fn for_each_id<F: FnMut(&EntityId)>(&self, f: &mut F) {
        match self {
            Self::Null => {}
            Self::Id(id) => f(id),
            Self::List(items) => {
                for item in items {
                    item.for_each_id(f);
                }
            }
        }
    }
}

impl From<EntityId> for Reference {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

// =============================================================================
// RECORD
// =============================================================================

/// Name of the scalar field carrying an entity's type discriminator.
pub const TYPENAME_FIELD: &str = "__typename";

/// An entity record: terminal values in `scalars`, links in `references`.
///
/// A storage field key lives in at most one of the two maps. The setters
/// enforce this; deserialized records are normalized by [`Record::merge`]
/// when they enter a store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Record {
    /// Storage field key -> terminal value.
    #[serde(default)]
    pub scalars: BTreeMap<String, Value>,
    /// Storage field key -> reference value.
    #[serde(default)]
    pub references: BTreeMap<String, Reference>,
}

impl Record {
    /// Create an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a terminal value, dropping any reference under the same key.
    pub fn set_scalar(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        self.references.remove(&key);
        self.scalars.insert(key, value);
    }

    /// Store a reference, dropping any scalar under the same key.
    pub fn set_reference(&mut self, key: impl Into<String>, reference: Reference) {
        let key = key.into();
        self.scalars.remove(&key);
        self.references.insert(key, reference);
    }

    /// Look up a terminal value.
    #[must_use]
    pub fn scalar(&self, key: &str) -> Option<&Value> {
        self.scalars.get(key)
    }

    /// Look up a reference value.
    #[must_use]
    pub fn reference(&self, key: &str) -> Option<&Reference> {
        self.references.get(key)
    }

    /// Overwrite this record with the fields of `patch`.
    ///
    /// Keys present in the patch replace existing keys (moving between
    /// `scalars` and `references` if the field changed kind); keys the
    /// patch does not mention are left untouched.
    pub fn merge(&mut self, patch: Record) {
        for (key, value) in patch.scalars {
            self.set_scalar(key, value);
        }
        for (key, reference) in patch.references {
            self.set_reference(key, reference);
        }
    }

    /// The entity's type discriminator, if one was stored.
    #[must_use]
    pub fn typename(&self) -> Option<&str> {
        self.scalars.get(TYPENAME_FIELD).and_then(Value::as_str)
    }

    /// Total number of stored fields.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.scalars.len() + self.references.len()
    }

    /// Check if the record holds no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.references.is_empty()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the normalized cache.
///
/// Partial-read variants ([`CacheError::is_partial_read`]) mean the store
/// does not (yet) hold enough data; callers usually treat them as "still
/// loading". Every other variant indicates a caller bug or an I/O failure.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A root or referenced entity has no record in the store.
    #[error("No store item for id {id}")]
    MissingEntity { id: EntityId },

    /// A required scalar field is absent from its record.
    #[error("No scalar value found for field {field} on {id}")]
    MissingScalar { field: String, id: EntityId },

    /// A required reference field is absent from its record.
    #[error("No reference value found for field {field} on {id}")]
    MissingReference { field: String, id: EntityId },

    /// A fragment spread names a fragment that was never defined.
    #[error("No fragment named {0}")]
    UndefinedFragment(String),

    /// An argument refers to a variable that was not supplied.
    #[error("Undefined variable ${0}")]
    UndefinedVariable(String),

    /// The selection has a shape the operation cannot work with.
    #[error("Malformed selection: {0}")]
    MalformedSelection(String),

    /// A result tree handed to the writer lacks a required field.
    #[error("Missing field {field} in result for {id}")]
    MissingResultField { field: String, id: EntityId },

    /// A result value does not have the shape its selection describes.
    #[error("Result value for field {field} must be {expected}")]
    ShapeMismatch { field: String, expected: &'static str },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl CacheError {
    /// Whether this error only reports data missing from the store.
    #[must_use]
    pub fn is_partial_read(&self) -> bool {
        matches!(
            self,
            Self::MissingEntity { .. } | Self::MissingScalar { .. } | Self::MissingReference { .. }
        )
    }

    /// Name of the missing field for field-level partial reads.
    #[must_use]
    pub fn missing_field(&self) -> Option<&str> {
        match self {
            Self::MissingScalar { field, .. } | Self::MissingReference { field, .. } => {
                Some(field)
            }
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalar_and_reference_keys_are_exclusive() {
        let mut record = Record::new();
        record.set_scalar("friend", json!("nobody"));
        record.set_reference("friend", Reference::Id(EntityId::new("Person:1")));

        assert!(record.scalar("friend").is_none());
        assert_eq!(
            record.reference("friend"),
            Some(&Reference::Id(EntityId::new("Person:1")))
        );

        record.set_scalar("friend", Value::Null);
        assert!(record.reference("friend").is_none());
        assert_eq!(record.field_count(), 1);
    }

    #[test]
    fn merge_overwrites_only_mentioned_keys() {
        let mut record = Record::new();
        record.set_scalar("name", json!("Luke"));
        record.set_scalar("height", json!(172));

        let mut patch = Record::new();
        patch.set_scalar("name", json!("Luke Skywalker"));
        patch.set_reference("height", Reference::Null);
        record.merge(patch);

        assert_eq!(record.scalar("name"), Some(&json!("Luke Skywalker")));
        assert!(record.scalar("height").is_none());
        assert_eq!(record.reference("height"), Some(&Reference::Null));
    }

    #[test]
    fn reference_serializes_untagged() {
        let reference = Reference::List(vec![
            Reference::Id(EntityId::new("a")),
            Reference::Null,
            Reference::List(vec![Reference::Id(EntityId::new("b"))]),
        ]);
        let json = serde_json::to_value(&reference).expect("serialize");
        assert_eq!(json, json!(["a", null, ["b"]]));

        let back: Reference = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, reference);
    }

    #[test]
    fn partial_read_marker() {
        let missing = CacheError::MissingScalar {
            field: "c".to_string(),
            id: EntityId::new("ROOT_QUERY"),
        };
        assert!(missing.is_partial_read());
        assert_eq!(missing.missing_field(), Some("c"));
        assert!(missing.to_string().contains("field c"));

        let fatal = CacheError::UndefinedFragment("PersonDetails".to_string());
        assert!(!fatal.is_partial_read());
    }

    #[test]
    fn typename_reads_string_scalar() {
        let mut record = Record::new();
        assert_eq!(record.typename(), None);
        record.set_scalar(TYPENAME_FIELD, json!("Droid"));
        assert_eq!(record.typename(), Some("Droid"));
    }
}
