//! # Graph Reader
//!
//! Reconstructs a result tree from the entity store given a root id and a
//! selection.
//!
//! ## Missing data
//!
//! A field absent from its record, or a reference to an id with no record,
//! is a partial read. The slot where the miss happens takes the value at
//! the same path in the caller's previous result (marking the read stale)
//! and fails with a partial-read error otherwise. A miss never falls back
//! to an ancestor's previous value. Fields reached only through
//! permissively applied fragments are omitted when their key is absent.
//!
//! ## Identity preservation
//!
//! Each produced object and list is compared with its counterpart in the
//! previous result. When nothing visible changed the previous `Arc` is
//! returned instead, so unchanged subtrees keep their identity; changed
//! parents still reuse unchanged children.

use crate::identity::{FragmentMatcher, HeuristicMatcher};
use crate::result::{ResultObject, ResultValue};
use crate::selection::{
    CollectContext, CollectedField, FragmentMap, SelectionSet, Variables, collect_fields,
    storage_key,
};
use crate::store::EntityStore;
use crate::{CacheError, EntityId, Record, Reference};
use std::collections::BTreeMap;
use std::sync::Arc;

static NO_VARIABLES: Variables = BTreeMap::new();
static NO_FRAGMENTS: FragmentMap = FragmentMap::new();

// =============================================================================
// OPTIONS & RESULTS
// =============================================================================

/// Inputs shared by every entity of one read.
#[derive(Clone, Copy)]
pub struct ReadOptions<'a> {
    pub variables: &'a Variables,
    pub fragments: &'a FragmentMap,
    pub matcher: &'a dyn FragmentMatcher,
}

impl Default for ReadOptions<'static> {
    fn default() -> Self {
        Self {
            variables: &NO_VARIABLES,
            fragments: &NO_FRAGMENTS,
            matcher: &HeuristicMatcher,
        }
    }
}

impl<'a> ReadOptions<'a> {
    #[must_use]
    pub fn with_variables(mut self, variables: &'a Variables) -> Self {
        self.variables = variables;
        self
    }

    #[must_use]
    pub fn with_fragments(mut self, fragments: &'a FragmentMap) -> Self {
        self.fragments = fragments;
        self
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: &'a dyn FragmentMatcher) -> Self {
        self.matcher = matcher;
        self
    }
}

/// A successful read.
#[derive(Debug, Clone)]
pub struct ReadResult {
    pub data: Arc<ResultObject>,
    /// At least one slot was filled from the previous result.
    pub stale: bool,
}

/// A read that reports missing data instead of failing on it.
#[derive(Debug)]
pub struct DiffResult {
    pub result: Option<ReadResult>,
    /// The partial read that prevented a result, if any.
    pub missing: Option<CacheError>,
}

impl DiffResult {
    /// Whether the store satisfied the whole selection.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_none()
    }
}

// =============================================================================
// READER
// =============================================================================

/// Read `selection` rooted at `root_id` from `store`.
///
/// `previous` is an earlier result of the same selection; matching subtrees
/// are returned by reference and its values back missing fields.
///
/// # Errors
///
/// - Partial reads (`MissingEntity`, `MissingScalar`, `MissingReference`)
///   when required data is absent and `previous` has nothing at that path
/// - Selection errors (`UndefinedFragment`, `UndefinedVariable`, ...)
pub fn read_from_store<S: EntityStore + ?Sized>(
    store: &S,
    options: &ReadOptions<'_>,
    root_id: &EntityId,
    selection: &SelectionSet,
    previous: Option<&Arc<ResultObject>>,
) -> Result<ReadResult, CacheError> {
    let span = tracing::debug_span!("read_from_store", root = %root_id);
    let _enter = span.enter();

    let mut reader = Reader {
        store,
        options,
        stale: false,
    };
    let data = match store.get(root_id)? {
        Some(record) => reader.read_record(root_id, &record, &[selection], previous)?,
        None => {
            let error = CacheError::MissingEntity {
                id: root_id.clone(),
            };
            let Some(previous) = previous else {
                return Err(error);
            };
            tracing::warn!(%error, "root unreadable, serving previous result");
            reader.stale = true;
            Arc::clone(previous)
        }
    };

    tracing::debug!(stale = reader.stale, "read complete");
    Ok(ReadResult {
        data,
        stale: reader.stale,
    })
}

/// Like [`read_from_store`], but a partial read is reported in the result.
pub fn diff_against_store<S: EntityStore + ?Sized>(
    store: &S,
    options: &ReadOptions<'_>,
    root_id: &EntityId,
    selection: &SelectionSet,
    previous: Option<&Arc<ResultObject>>,
) -> Result<DiffResult, CacheError> {
    match read_from_store(store, options, root_id, selection, previous) {
        Ok(result) => Ok(DiffResult {
            result: Some(result),
            missing: None,
        }),
        Err(error) if error.is_partial_read() => Ok(DiffResult {
            result: None,
            missing: Some(error),
        }),
        Err(error) => Err(error),
    }
}

struct Reader<'s, 'o, 'a, S: ?Sized> {
    store: &'s S,
    options: &'o ReadOptions<'a>,
    stale: bool,
}

impl<S: EntityStore + ?Sized> Reader<'_, '_, '_, S> {
    /// Read the entity `id` into the slot whose previous value is
    /// `previous`. A missing entity takes that value instead.
    fn read_entity(
        &mut self,
        id: &EntityId,
        children: &[&SelectionSet],
        previous: Option<&ResultValue>,
    ) -> Result<ResultValue, CacheError> {
        match self.store.get(id)? {
            Some(record) => {
                let previous = previous.and_then(ResultValue::as_object);
                self.read_record(id, &record, children, previous)
                    .map(ResultValue::Object)
            }
            None => self.fall_back(CacheError::MissingEntity { id: id.clone() }, previous),
        }
    }

    fn read_record(
        &mut self,
        id: &EntityId,
        record: &Record,
        sets: &[&SelectionSet],
        previous: Option<&Arc<ResultObject>>,
    ) -> Result<Arc<ResultObject>, CacheError> {
        let ctx = CollectContext {
            fragments: self.options.fragments,
            matcher: self.options.matcher,
        };
        let collected = collect_fields(sets, ctx, record.typename())?;

        let mut fields = Vec::with_capacity(collected.len());
        for field in &collected {
            let response_key = field.response_key();
            let previous_value = previous.and_then(|p| p.get(response_key));

            let key = storage_key(field.field, self.options.variables)?;

            // Errors from below this field propagate as they are; only a
            // key missing from this record can be backed by the previous value.
            let value = match self.read_field(record, field, &key, previous_value)? {
                Some(value) => value,
                None if !field.required => continue,
                None => {
                    let error = if field.has_selection {
                        CacheError::MissingReference {
                            field: key,
                            id: id.clone(),
                        }
                    } else {
                        CacheError::MissingScalar {
                            field: key,
                            id: id.clone(),
                        }
                    };
                    self.fall_back(error, previous_value)?
                }
            };
            fields.push((response_key.to_string(), value));
        }

        if let Some(previous) = previous {
            if Self::unchanged(previous, id, &fields) {
                return Ok(Arc::clone(previous));
            }
        }
        Ok(Arc::new(ResultObject::new(Some(id.clone()), fields)))
    }

    /// The value stored under `key`, or `None` when `record` lacks it.
    fn read_field(
        &mut self,
        record: &Record,
        field: &CollectedField<'_>,
        key: &str,
        previous: Option<&ResultValue>,
    ) -> Result<Option<ResultValue>, CacheError> {
        if !field.has_selection {
            return Ok(record
                .scalar(key)
                .map(|value| ResultValue::Scalar(value.clone())));
        }
        record
            .reference(key)
            .map(|reference| self.read_reference(reference, &field.children, previous))
            .transpose()
    }

    fn fall_back(
        &mut self,
        error: CacheError,
        previous: Option<&ResultValue>,
    ) -> Result<ResultValue, CacheError> {
        let Some(fallback) = previous else {
            return Err(error);
        };
        tracing::warn!(%error, "using previous value");
        self.stale = true;
        Ok(fallback.clone())
    }

    fn read_reference(
        &mut self,
        reference: &Reference,
        children: &[&SelectionSet],
        previous: Option<&ResultValue>,
    ) -> Result<ResultValue, CacheError> {
        match reference {
            Reference::Null => Ok(ResultValue::Null),
            Reference::Id(id) => self.read_entity(id, children, previous),
            Reference::List(items) => {
                let previous = previous.and_then(ResultValue::as_list);
                let by_id: BTreeMap<&EntityId, &ResultValue> = previous
                    .map(|list| {
                        list.iter()
                            .filter_map(|item| {
                                let id = item.as_object()?.id()?;
                                Some((id, item))
                            })
                            .collect()
                    })
                    .unwrap_or_default();

                let mut values = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    let previous_item = match item {
                        Reference::Id(id) => by_id.get(id).copied(),
                        _ => previous.and_then(|list| list.get(index)),
                    };
                    values.push(self.read_reference(item, children, previous_item)?);
                }

                if let Some(previous) = previous {
                    let reusable = previous.len() == values.len()
                        && previous.iter().zip(&values).all(|(old, new)| old.same(new));
                    if reusable {
                        return Ok(ResultValue::List(Arc::clone(previous)));
                    }
                }
                Ok(ResultValue::List(Arc::new(values)))
            }
        }
    }

    /// Whether `previous` is visibly identical to the freshly read fields.
    fn unchanged(
        previous: &ResultObject,
        id: &EntityId,
        fields: &[(String, ResultValue)],
    ) -> bool {
        previous.id() == Some(id)
            && previous.len() == fields.len()
            && fields.iter().all(|(key, value)| {
                previous
                    .get(key)
                    .is_some_and(|old| old.same(value))
            })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selection::Field;
    use crate::store::MemoryStore;
    use crate::writer::{WriteOptions, write_to_store};
    use serde_json::json;

    fn root() -> EntityId {
        EntityId::new("ROOT_QUERY")
    }

    fn store_with(selection: &SelectionSet, data: &serde_json::Value) -> MemoryStore {
        let mut store = MemoryStore::new();
        write_to_store(&mut store, &WriteOptions::default(), &root(), selection, data)
            .expect("write");
        store
    }

    #[test]
    fn reads_back_written_scalars() {
        let selection = SelectionSet::new(vec![
            Field::new("people_one")
                .arg("id", "1")
                .select(SelectionSet::leaves(&["name"]))
                .into(),
        ]);
        let data = json!({ "people_one": { "name": "Luke Skywalker" } });
        let store = store_with(&selection, &data);

        let result = read_from_store(&store, &ReadOptions::default(), &root(), &selection, None)
            .expect("read");

        assert_eq!(result.data.to_json(), data);
        assert!(!result.stale);
        assert_eq!(result.data.id(), Some(&root()));
    }

    #[test]
    fn missing_root_is_partial_read() {
        let err = read_from_store(
            &MemoryStore::new(),
            &ReadOptions::default(),
            &root(),
            &SelectionSet::leaves(&["a"]),
            None,
        )
        .expect_err("empty store");
        assert!(err.is_partial_read());
        assert_eq!(err.to_string(), "No store item for id ROOT_QUERY");
    }

    #[test]
    fn missing_root_serves_previous_result() {
        let previous = Arc::new(ResultObject::from_json(&json!({ "a": 1 })));
        let result = read_from_store(
            &MemoryStore::new(),
            &ReadOptions::default(),
            &root(),
            &SelectionSet::leaves(&["a"]),
            Some(&previous),
        )
        .expect("previous result");
        assert!(result.stale);
        assert!(Arc::ptr_eq(&result.data, &previous));
    }

    #[test]
    fn nested_miss_does_not_reach_parent_fallback() {
        let selection = SelectionSet::new(vec![
            Field::new("nested")
                .select(SelectionSet::leaves(&["b", "c"]))
                .into(),
        ]);
        let store = store_with(
            &SelectionSet::new(vec![
                Field::new("nested")
                    .select(SelectionSet::leaves(&["b"]))
                    .into(),
            ]),
            &json!({ "nested": { "b": 2 } }),
        );
        // The previous result has `nested` but nothing at `nested.c`.
        let previous = Arc::new(ResultObject::from_json(&json!({ "nested": { "b": 2 } })));

        let options = ReadOptions::default();
        let err = read_from_store(&store, &options, &root(), &selection, Some(&previous))
            .expect_err("nested.c has no previous value");
        assert_eq!(err.missing_field(), Some("c"));
    }

    #[test]
    fn unchanged_read_returns_previous_root() {
        let selection = SelectionSet::new(vec![
            Field::new("a").into(),
            Field::new("nested")
                .select(SelectionSet::leaves(&["b"]))
                .into(),
        ]);
        let store = store_with(&selection, &json!({ "a": 1, "nested": { "b": 2 } }));
        let options = ReadOptions::default();

        let first = read_from_store(&store, &options, &root(), &selection, None).expect("first");
        let second = read_from_store(&store, &options, &root(), &selection, Some(&first.data))
            .expect("second");

        assert!(Arc::ptr_eq(&first.data, &second.data));
        assert!(!second.stale);
    }

    #[test]
    fn changed_parent_keeps_unchanged_child() {
        let selection = SelectionSet::new(vec![
            Field::new("a").into(),
            Field::new("nested")
                .select(SelectionSet::leaves(&["b"]))
                .into(),
        ]);
        let mut store = store_with(&selection, &json!({ "a": 1, "nested": { "b": 2 } }));
        let options = ReadOptions::default();
        let first = read_from_store(&store, &options, &root(), &selection, None).expect("first");

        write_to_store(
            &mut store,
            &WriteOptions::default(),
            &root(),
            &SelectionSet::leaves(&["a"]),
            &json!({ "a": 5 }),
        )
        .expect("update");
        let second = read_from_store(&store, &options, &root(), &selection, Some(&first.data))
            .expect("second");

        assert!(!Arc::ptr_eq(&first.data, &second.data));
        let old_nested = first.data.get("nested").expect("nested");
        let new_nested = second.data.get("nested").expect("nested");
        assert!(old_nested.same(new_nested));
        assert_eq!(second.data.to_json(), json!({ "a": 5, "nested": { "b": 2 } }));
    }
}
