//! # Result Trees
//!
//! Trees produced by the reader. Objects and lists sit behind `Arc` so a
//! read can hand back a previous result's subtree instead of allocating an
//! equal one; "same subtree" means `Arc::ptr_eq`.
//!
//! Every object read from the store carries the entity id it came from.
//! The id is out-of-band: it never appears in [`ResultValue::to_json`].

use crate::EntityId;
use serde_json::{Map, Value};
use std::sync::Arc;

/// One slot of a result tree.
#[derive(Debug, Clone)]
pub enum ResultValue {
    /// A null object or list slot.
    Null,
    /// A terminal value, stored verbatim.
    Scalar(Value),
    Object(Arc<ResultObject>),
    List(Arc<Vec<ResultValue>>),
}

impl ResultValue {
    /// Build an untagged tree from plain JSON.
    ///
    /// Used for previous data that did not come from a read, so it can still
    /// serve as a fallback even though no subtree of it can be reused.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Array(items) => Self::List(Arc::new(items.iter().map(Self::from_json).collect())),
            Value::Object(map) => Self::Object(Arc::new(ResultObject::from_json_map(map))),
            scalar => Self::Scalar(scalar.clone()),
        }
    }

    /// Render the visible tree.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Scalar(value) => value.clone(),
            Self::Object(object) => object.to_json(),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    #[must_use]
    pub fn as_object(&self) -> Option<&Arc<ResultObject>> {
        match self {
            Self::Object(object) => Some(object),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&Arc<Vec<ResultValue>>> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Whether `other` can stand in for `self` without any observable change
    /// and without a new allocation: equal leaves, or the very same object
    /// or list.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Null, Self::Scalar(Value::Null)) | (Self::Scalar(Value::Null), Self::Null) => {
                true
            }
            (Self::Scalar(a), Self::Scalar(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Deep equality of the visible tree; entity id tags are ignored.
impl PartialEq for ResultValue {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
    }
}

/// An object of a result tree: fields in selection order plus its id tag.
#[derive(Debug, Clone, Default)]
pub struct ResultObject {
    id: Option<EntityId>,
    fields: Vec<(String, ResultValue)>,
}

impl ResultObject {
    #[must_use]
    pub fn new(id: Option<EntityId>, fields: Vec<(String, ResultValue)>) -> Self {
        Self { id, fields }
    }

    fn from_json_map(map: &Map<String, Value>) -> Self {
        Self {
            id: None,
            fields: map
                .iter()
                .map(|(key, value)| (key.clone(), ResultValue::from_json(value)))
                .collect(),
        }
    }

    /// Build an untagged root object from plain JSON; non-objects yield an
    /// empty object.
    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        value.as_object().map(Self::from_json_map).unwrap_or_default()
    }

    /// The entity this object was read from.
    #[must_use]
    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&ResultValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &ResultValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, value)| (name.clone(), value.to_json()))
                .collect(),
        )
    }
}

impl PartialEq for ResultObject {
    fn eq(&self, other: &Self) -> bool {
        self.to_json() == other.to_json()
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
    fn json_roundtrip_hides_ids() {
        let value = json!({ "a": [1, { "b": null }], "c": "x" });
        let tree = ResultValue::from_json(&value);
        assert_eq!(tree.to_json(), value);

        let tagged = ResultObject::new(
            Some(EntityId::new("Person:1")),
            vec![("name".to_string(), ResultValue::Scalar(json!("Luke")))],
        );
        assert_eq!(tagged.to_json(), json!({ "name": "Luke" }));
        assert_eq!(tagged.id(), Some(&EntityId::new("Person:1")));
    }

    #[test]
    fn same_is_reference_equality_for_containers() {
        let object = Arc::new(ResultObject::from_json(&json!({ "a": 1 })));
        let a = ResultValue::Object(Arc::clone(&object));
        let b = ResultValue::Object(Arc::clone(&object));
        let c = ResultValue::Object(Arc::new(ResultObject::from_json(&json!({ "a": 1 }))));

        assert!(a.same(&b));
        assert!(!a.same(&c));
        assert_eq!(a, c);
        assert!(ResultValue::Scalar(json!(2)).same(&ResultValue::Scalar(json!(2))));
        assert!(ResultValue::Null.same(&ResultValue::Scalar(Value::Null)));
    }

    #[test]
    fn get_finds_fields_by_key() {
        let object = ResultObject::from_json(&json!({ "a": 1, "b": 2 }));
        assert_eq!(object.get("b"), Some(&ResultValue::Scalar(json!(2))));
        assert!(object.get("z").is_none());
        assert_eq!(object.len(), 2);
    }
}
