//! # Graph Writer
//!
//! Merges a result tree into the entity store.
//!
//! - Descends the selection and the result tree in lock-step
//! - Names every reachable object (user id, else generated from the path)
//! - Stores scalar leaves in `scalars`, links in `references`
//!
//! Writing is two-phase: the traversal only accumulates record patches in a
//! [`WriteBatch`]. The batch reaches the store after the whole tree was
//! accepted, so a result that violates the selection leaves the store as it
//! was.

use crate::identity::{FragmentMatcher, HeuristicMatcher, IdentifyObject, NoIdentity, generated_id};
use crate::selection::{
    CollectContext, FragmentMap, SelectionSet, Variables, collect_fields, storage_key,
};
use crate::store::EntityStore;
use crate::types::TYPENAME_FIELD;
use crate::{CacheError, EntityId, Record, Reference};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

static NO_VARIABLES: Variables = BTreeMap::new();
static NO_FRAGMENTS: FragmentMap = FragmentMap::new();

// =============================================================================
// OPTIONS
// =============================================================================

/// Inputs shared by every object of one write.
#[derive(Clone, Copy)]
pub struct WriteOptions<'a> {
    pub variables: &'a Variables,
    pub fragments: &'a FragmentMap,
    pub identify: &'a dyn IdentifyObject,
    pub matcher: &'a dyn FragmentMatcher,
}

impl Default for WriteOptions<'static> {
    fn default() -> Self {
        Self {
            variables: &NO_VARIABLES,
            fragments: &NO_FRAGMENTS,
            identify: &NoIdentity,
            matcher: &HeuristicMatcher,
        }
    }
}

impl<'a> WriteOptions<'a> {
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
    pub fn with_identify(mut self, identify: &'a dyn IdentifyObject) -> Self {
        self.identify = identify;
        self
    }

    #[must_use]
    pub fn with_matcher(mut self, matcher: &'a dyn FragmentMatcher) -> Self {
        self.matcher = matcher;
        self
    }
}

// =============================================================================
// WRITE BATCH
// =============================================================================

/// Record patches accumulated during one write, keyed by entity.
///
/// The same entity reached twice (e.g. a user id appearing at two paths)
/// merges into one patch, later fields winning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    patches: BTreeMap<EntityId, Record>,
}

impl WriteBatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a patch for `id`.
    pub fn add(&mut self, id: EntityId, patch: Record) {
        self.patches.entry(id).or_default().merge(patch);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Apply every patch to the store.
    pub fn commit<S: EntityStore + ?Sized>(self, store: &mut S) -> Result<(), CacheError> {
        store.set_many(self.patches.into_iter().collect())
    }
}

/// What a write touched, for logging and callers that care.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSummary {
    /// Records created or updated, the root included.
    pub entities_written: usize,
    /// Distinct objects named by the identity policy.
    pub user_ids: usize,
    /// Distinct objects named by their path.
    pub generated_ids: usize,
}

// =============================================================================
// WRITER
// =============================================================================

/// Write `data` into `store` under `root_id` as described by `selection`.
///
/// # Errors
///
/// Contract violations are fatal and leave the store untouched:
/// - `MissingResultField` when a required field is absent from `data`
/// - `ShapeMismatch` when a value cannot have the selected shape
/// - selection errors (`UndefinedFragment`, `UndefinedVariable`, ...)
pub fn write_to_store<S: EntityStore + ?Sized>(
    store: &mut S,
    options: &WriteOptions<'_>,
    root_id: &EntityId,
    selection: &SelectionSet,
    data: &Value,
) -> Result<WriteSummary, CacheError> {
    let span = tracing::debug_span!("write_to_store", root = %root_id);
    let _enter = span.enter();

    let (batch, summary) = build_batch(options, root_id, selection, data)?;
    batch.commit(store)?;

    tracing::debug!(
        entities = summary.entities_written,
        user_ids = summary.user_ids,
        generated_ids = summary.generated_ids,
        "write committed"
    );
    Ok(summary)
}

/// Run the traversal without touching a store.
pub fn build_batch(
    options: &WriteOptions<'_>,
    root_id: &EntityId,
    selection: &SelectionSet,
    data: &Value,
) -> Result<(WriteBatch, WriteSummary), CacheError> {
    let object = data.as_object().ok_or_else(|| CacheError::ShapeMismatch {
        field: root_id.to_string(),
        expected: "an object",
    })?;

    let mut writer = Writer {
        options,
        batch: WriteBatch::new(),
        user_ids: BTreeSet::new(),
        generated_ids: BTreeSet::new(),
    };
    writer.write_object(root_id, &[selection], object)?;

    let summary = WriteSummary {
        entities_written: writer.batch.len(),
        user_ids: writer.user_ids.len(),
        generated_ids: writer.generated_ids.len(),
    };
    Ok((writer.batch, summary))
}

struct Writer<'o, 'a> {
    options: &'o WriteOptions<'a>,
    batch: WriteBatch,
    user_ids: BTreeSet<EntityId>,
    generated_ids: BTreeSet<EntityId>,
}

impl Writer<'_, '_> {
    fn write_object(
        &mut self,
        id: &EntityId,
        sets: &[&SelectionSet],
        object: &Map<String, Value>,
    ) -> Result<(), CacheError> {
        let ctx = CollectContext {
            fragments: self.options.fragments,
            matcher: self.options.matcher,
        };
        let typename = object.get(TYPENAME_FIELD).and_then(Value::as_str);
        let fields = collect_fields(sets, ctx, typename)?;

        let mut patch = Record::new();
        for collected in &fields {
            let response_key = collected.response_key();
            let Some(value) = object.get(response_key) else {
                if collected.required {
                    return Err(CacheError::MissingResultField {
                        field: response_key.to_string(),
                        id: id.clone(),
                    });
                }
                continue;
            };

            let key = storage_key(collected.field, self.options.variables)?;
            if collected.has_selection {
                let mut indexes = Vec::new();
                let reference =
                    self.write_reference(id, &key, &collected.children, value, &mut indexes)?;
                patch.set_reference(key, reference);
            } else {
                patch.set_scalar(key, value.clone());
            }
        }

        self.batch.add(id.clone(), patch);
        Ok(())
    }

    /// Write an object-typed field value, mirroring list nesting.
    fn write_reference(
        &mut self,
        parent: &EntityId,
        key: &str,
        children: &[&SelectionSet],
        value: &Value,
        indexes: &mut Vec<usize>,
    ) -> Result<Reference, CacheError> {
        match value {
            Value::Null => Ok(Reference::Null),
            Value::Array(items) => {
                let mut references = Vec::with_capacity(items.len());
                for (index, item) in items.iter().enumerate() {
                    indexes.push(index);
                    let reference = self.write_reference(parent, key, children, item, indexes);
                    indexes.pop();
                    references.push(reference?);
                }
                Ok(Reference::List(references))
            }
            Value::Object(object) => {
                let id = match self.options.identify.identify(object) {
                    Some(user_id) => {
                        let id = EntityId(user_id);
                        self.user_ids.insert(id.clone());
                        id
                    }
                    None => {
                        let id = generated_id(parent, key, indexes);
                        tracing::trace!(id = %id, "generated id");
                        self.generated_ids.insert(id.clone());
                        id
                    }
                };
                self.write_object(&id, children, object)?;
                Ok(Reference::Id(id))
            }
            _ => Err(CacheError::ShapeMismatch {
                field: key.to_string(),
                expected: "an object, a list or null",
            }),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::FieldIdentity;
    use crate::selection::{ArgValue, Field, FragmentDefinition, FragmentSpread, InlineFragment};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn root() -> EntityId {
        EntityId::new("ROOT_QUERY")
    }

    #[test]
    fn writes_scalars_with_argument_keys() {
        let selection = SelectionSet::new(vec![
            Field::new("people_one")
                .arg("id", "1")
                .select(SelectionSet::leaves(&["name"]))
                .into(),
        ]);
        let data = json!({ "people_one": { "name": "Luke Skywalker" } });
        let mut store = MemoryStore::new();

        write_to_store(&mut store, &WriteOptions::default(), &root(), &selection, &data)
            .expect("write");

        let root_record = store.record(&root()).expect("root");
        let child = EntityId::new("ROOT_QUERY.people_one({\"id\":\"1\"})");
        assert_eq!(
            root_record.reference("people_one({\"id\":\"1\"})"),
            Some(&Reference::Id(child.clone()))
        );
        assert_eq!(
            store.record(&child).expect("child").scalar("name"),
            Some(&json!("Luke Skywalker"))
        );
    }

    #[test]
    fn nested_lists_get_indexed_ids() {
        let selection = SelectionSet::new(vec![
            Field::new("grid")
                .select(SelectionSet::leaves(&["v"]))
                .into(),
        ]);
        let data = json!({ "grid": [[{ "v": 1 }, null], [{ "v": 2 }]] });
        let mut store = MemoryStore::new();

        write_to_store(&mut store, &WriteOptions::default(), &root(), &selection, &data)
            .expect("write");

        let id = |s: &str| Reference::Id(EntityId::new(s));
        assert_eq!(
            store.record(&root()).expect("root").reference("grid"),
            Some(&Reference::List(vec![
                Reference::List(vec![id("ROOT_QUERY.grid.0.0"), Reference::Null]),
                Reference::List(vec![id("ROOT_QUERY.grid.1.0")]),
            ]))
        );
        assert_eq!(
            store
                .record(&EntityId::new("ROOT_QUERY.grid.1.0"))
                .expect("cell")
                .scalar("v"),
            Some(&json!(2))
        );
    }

    #[test]
    fn user_ids_are_stable_across_paths() {
        let person = SelectionSet::leaves(&["__typename", "id", "name"]);
        let selection = SelectionSet::new(vec![
            Field::new("hero").select(person.clone()).into(),
            Field::new("leader").select(person).into(),
        ]);
        let data = json!({
            "hero": { "__typename": "Person", "id": "1", "name": "Luke" },
            "leader": { "__typename": "Person", "id": "1", "name": "Luke" },
        });
        let identify = FieldIdentity::default();
        let options = WriteOptions::default().with_identify(&identify);
        let mut store = MemoryStore::new();

        let summary =
            write_to_store(&mut store, &options, &root(), &selection, &data).expect("write");

        assert_eq!(summary.user_ids, 1);
        assert_eq!(summary.generated_ids, 0);
        assert_eq!(summary.entities_written, 2);
        assert!(store.record(&EntityId::new("Person:1")).is_some());
    }

    #[test]
    fn null_object_field_is_null_reference() {
        let selection = SelectionSet::new(vec![
            Field::new("hero")
                .select(SelectionSet::leaves(&["name"]))
                .into(),
        ]);
        let mut store = MemoryStore::new();
        write_to_store(
            &mut store,
            &WriteOptions::default(),
            &root(),
            &selection,
            &json!({ "hero": null }),
        )
        .expect("write");

        assert_eq!(
            store.record(&root()).expect("root").reference("hero"),
            Some(&Reference::Null)
        );
        assert_eq!(store.len().expect("len"), 1);
    }

    #[test]
    fn missing_required_field_fails_without_writing() {
        let selection = SelectionSet::new(vec![
            Field::new("a").into(),
            Field::new("hero")
                .select(SelectionSet::leaves(&["name", "height"]))
                .into(),
        ]);
        let data = json!({ "a": 1, "hero": { "name": "Luke" } });
        let mut store = MemoryStore::new();

        let err = write_to_store(&mut store, &WriteOptions::default(), &root(), &selection, &data)
            .expect_err("missing height");

        assert!(matches!(err, CacheError::MissingResultField { ref field, .. } if field == "height"));
        assert!(!err.is_partial_read());
        assert!(store.is_empty().expect("empty"));
    }

    #[test]
    fn scalar_for_object_selection_is_shape_mismatch() {
        let selection = SelectionSet::new(vec![
            Field::new("hero")
                .select(SelectionSet::leaves(&["name"]))
                .into(),
        ]);
        let err = write_to_store(
            &mut MemoryStore::new(),
            &WriteOptions::default(),
            &root(),
            &selection,
            &json!({ "hero": "Luke" }),
        )
        .expect_err("shape");
        assert!(matches!(err, CacheError::ShapeMismatch { .. }));
    }

    #[test]
    fn fragments_write_into_the_enclosing_record() {
        let fragments: FragmentMap = [FragmentDefinition::new(
            "DroidFields",
            "Droid",
            SelectionSet::leaves(&["primaryFunction"]),
        )]
        .into_iter()
        .collect();
        let selection = SelectionSet::new(vec![
            Field::new("hero")
                .select(
                    SelectionSet::leaves(&["__typename", "name"])
                        .with(FragmentSpread::new("DroidFields"))
                        .with(InlineFragment::new(
                            Some("Human"),
                            SelectionSet::leaves(&["height"]),
                        )),
                )
                .into(),
        ]);
        let data = json!({
            "hero": { "__typename": "Droid", "name": "R2-D2", "primaryFunction": "Astromech" }
        });
        let options = WriteOptions::default().with_fragments(&fragments);
        let mut store = MemoryStore::new();

        write_to_store(&mut store, &options, &root(), &selection, &data).expect("write");

        let hero = store
            .record(&EntityId::new("ROOT_QUERY.hero"))
            .expect("hero");
        assert_eq!(hero.scalar("primaryFunction"), Some(&json!("Astromech")));
        assert!(hero.scalar("height").is_none());
        assert_eq!(store.len().expect("len"), 2);
    }

    #[test]
    fn variables_feed_storage_keys() {
        let selection = SelectionSet::new(vec![
            Field::new("count")
                .arg("since", ArgValue::variable("since"))
                .into(),
        ]);
        let mut variables = Variables::new();
        variables.insert("since".to_string(), json!(3));
        let options = WriteOptions::default().with_variables(&variables);
        let mut store = MemoryStore::new();

        write_to_store(&mut store, &options, &root(), &selection, &json!({ "count": 9 }))
            .expect("write");

        assert_eq!(
            store
                .record(&root())
                .expect("root")
                .scalar("count({\"since\":3})"),
            Some(&json!(9))
        );

        let err = write_to_store(
            &mut store,
            &WriteOptions::default(),
            &root(),
            &selection,
            &json!({ "count": 9 }),
        )
        .expect_err("undefined variable");
        assert!(matches!(err, CacheError::UndefinedVariable(ref name) if name == "since"));
    }
}
