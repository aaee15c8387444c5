//! # Selection Descriptions
//!
//! The already-resolved selection tree consumed by the writer and reader,
//! plus the utilities both sides share:
//!
//! - storage field keys (field name + canonical JSON of its arguments)
//! - fragment flattening with type-condition evaluation
//! - merging of selection nodes that share a response key
//!
//! Writer and reader must compute storage keys identically, otherwise reads
//! silently miss writes. Both go through [`storage_key`].

use crate::CacheError;
use crate::identity::{FragmentMatch, FragmentMatcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Variable values supplied alongside a selection.
pub type Variables = BTreeMap<String, Value>;

// =============================================================================
// SELECTION TREE
// =============================================================================

/// An ordered list of selections. Serializes as a bare JSON array.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionSet {
    pub selections: Vec<Selection>,
}

impl SelectionSet {
    /// Create a selection set from its selections.
    #[must_use]
    pub fn new(selections: Vec<Selection>) -> Self {
        Self { selections }
    }

    /// Shorthand for a set of argument-less leaf fields.
    #[must_use]
    pub fn leaves(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .map(|name| Selection::Field(Field::new(*name)))
                .collect(),
        )
    }

    /// Append a selection.
    #[must_use]
    pub fn with(mut self, selection: impl Into<Selection>) -> Self {
        self.selections.push(selection.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }
}

/// One node of a selection set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Field(Field),
    InlineFragment(InlineFragment),
    FragmentSpread(FragmentSpread),
}

impl From<Field> for Selection {
    fn from(field: Field) -> Self {
        Self::Field(field)
    }
}

impl From<InlineFragment> for Selection {
    fn from(fragment: InlineFragment) -> Self {
        Self::InlineFragment(fragment)
    }
}

impl From<FragmentSpread> for Selection {
    fn from(spread: FragmentSpread) -> Self {
        Self::FragmentSpread(spread)
    }
}

/// A field selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub arguments: BTreeMap<String, ArgValue>,
    /// Child selection for object-valued fields; `None` for scalar leaves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            arguments: BTreeMap::new(),
            selection_set: None,
        }
    }

    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn select(mut self, selection_set: SelectionSet) -> Self {
        self.selection_set = Some(selection_set);
        self
    }

    /// The key this field is emitted under in result trees.
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

/// An inline fragment, optionally conditioned on a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineFragment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_condition: Option<String>,
    pub selection_set: SelectionSet,
}

impl InlineFragment {
    #[must_use]
    pub fn new(type_condition: Option<&str>, selection_set: SelectionSet) -> Self {
        Self {
            type_condition: type_condition.map(str::to_string),
            selection_set,
        }
    }
}

/// A reference to a named fragment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpread {
    pub name: String,
}

impl FragmentSpread {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Argument value: a literal, a variable reference, or a composite of those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Variable {
        #[serde(rename = "$variable")]
        variable: String,
    },
    List(Vec<ArgValue>),
    Object(BTreeMap<String, ArgValue>),
    Literal(Value),
}

impl ArgValue {
    /// Reference a variable by name.
    #[must_use]
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable {
            variable: name.into(),
        }
    }

    /// Substitute variables, producing a plain JSON value.
    pub fn resolve(&self, variables: &Variables) -> Result<Value, CacheError> {
        match self {
            Self::Variable { variable } => variables
                .get(variable)
                .cloned()
                .ok_or_else(|| CacheError::UndefinedVariable(variable.clone())),
            Self::List(items) => items
                .iter()
                .map(|item| item.resolve(variables))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Self::Object(fields) => {
                let mut map = serde_json::Map::new();
                for (key, value) in fields {
                    map.insert(key.clone(), value.resolve(variables)?);
                }
                Ok(Value::Object(map))
            }
            Self::Literal(value) => Ok(value.clone()),
        }
    }
}

impl From<Value> for ArgValue {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Literal(Value::from(value))
    }
}

// =============================================================================
// DOCUMENTS & FRAGMENTS
// =============================================================================

/// A named fragment definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentDefinition {
    pub name: String,
    pub type_condition: String,
    pub selection_set: SelectionSet,
}

impl FragmentDefinition {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        type_condition: impl Into<String>,
        selection_set: SelectionSet,
    ) -> Self {
        Self {
            name: name.into(),
            type_condition: type_condition.into(),
            selection_set,
        }
    }
}

/// Fragment definitions by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FragmentMap {
    definitions: BTreeMap<String, FragmentDefinition>,
}

impl FragmentMap {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            definitions: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, definition: FragmentDefinition) {
        self.definitions.insert(definition.name.clone(), definition);
    }

    /// Look up a definition; an unknown name is a fatal selection error.
    pub fn get(&self, name: &str) -> Result<&FragmentDefinition, CacheError> {
        self.definitions
            .get(name)
            .ok_or_else(|| CacheError::UndefinedFragment(name.to_string()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl FromIterator<FragmentDefinition> for FragmentMap {
    fn from_iter<I: IntoIterator<Item = FragmentDefinition>>(iter: I) -> Self {
        let mut map = Self::new();
        for definition in iter {
            map.insert(definition);
        }
        map
    }
}

/// A selection document: an optional operation plus fragment definitions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<SelectionSet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fragments: Vec<FragmentDefinition>,
}

impl Document {
    /// A document holding only an operation.
    #[must_use]
    pub fn operation(selection_set: SelectionSet) -> Self {
        Self {
            operation: Some(selection_set),
            fragments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_fragment(mut self, definition: FragmentDefinition) -> Self {
        self.fragments.push(definition);
        self
    }

    #[must_use]
    pub fn fragment_map(&self) -> FragmentMap {
        self.fragments.iter().cloned().collect()
    }

    /// The operation's selection set.
    pub fn operation_selection(&self) -> Result<&SelectionSet, CacheError> {
        self.operation.as_ref().ok_or_else(|| {
            CacheError::MalformedSelection("document contains no operation".to_string())
        })
    }

    /// The single fragment a fragment read/write should use.
    ///
    /// Documents used as fragments may not carry an operation. Without a
    /// name the document must define exactly one fragment.
    pub fn single_fragment(&self, name: Option<&str>) -> Result<&FragmentDefinition, CacheError> {
        if self.operation.is_some() {
            return Err(CacheError::MalformedSelection(
                "found an operation in a document used as a fragment".to_string(),
            ));
        }
        match name {
            Some(name) => self
                .fragments
                .iter()
                .find(|definition| definition.name == name)
                .ok_or_else(|| CacheError::UndefinedFragment(name.to_string())),
            None => match self.fragments.as_slice() {
                [only] => Ok(only),
                other => Err(CacheError::MalformedSelection(format!(
                    "found {} fragments; a fragment name must be provided when the document does not contain exactly one",
                    other.len()
                ))),
            },
        }
    }
}

// =============================================================================
// STORAGE FIELD KEYS
// =============================================================================

/// Compute the key a field's value is stored under.
///
/// `name` for argument-less fields, otherwise `name(<canonical JSON>)` where
/// object keys are sorted at every level.
pub fn storage_key(field: &Field, variables: &Variables) -> Result<String, CacheError> {
    if field.arguments.is_empty() {
        return Ok(field.name.clone());
    }
    let mut args = serde_json::Map::new();
    for (name, value) in &field.arguments {
        args.insert(name.clone(), value.resolve(variables)?);
    }
    let encoded = canonical_json(&Value::Object(args))?;
    Ok(format!("{}({})", field.name, encoded))
}

/// Serialize a JSON value with object keys sorted recursively.
pub fn canonical_json(value: &Value) -> Result<String, CacheError> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<(), CacheError> {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            out.push('{');
            for (i, (key, inner)) in sorted.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&encode(&Value::String(key.clone()))?);
                out.push(':');
                write_canonical(inner, out)?;
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        scalar => out.push_str(&encode(scalar)?),
    }
    Ok(())
}

fn encode(value: &Value) -> Result<String, CacheError> {
    serde_json::to_string(value).map_err(|e| CacheError::SerializationError(e.to_string()))
}

// =============================================================================
// FIELD COLLECTION
// =============================================================================

/// A result key with all selection nodes that request it merged together.
#[derive(Debug, Clone)]
pub struct CollectedField<'a> {
    /// The first node naming this key; supplies name and arguments.
    pub field: &'a Field,
    /// Child selections of every merged node, concatenated in order.
    pub children: Vec<&'a SelectionSet>,
    /// Whether any merged node is an object selection.
    pub has_selection: bool,
    /// Whether missing data for this key is a partial read.
    pub required: bool,
}

impl CollectedField<'_> {
    #[must_use]
    pub fn response_key(&self) -> &str {
        self.field.response_key()
    }
}

/// Shared inputs for flattening selections against one entity.
#[derive(Clone, Copy)]
pub struct CollectContext<'a> {
    pub fragments: &'a FragmentMap,
    pub matcher: &'a dyn FragmentMatcher,
}

/// Flatten `sets` into merged fields for an entity of type `typename`.
///
/// Fragments whose condition definitely fails contribute nothing. Fields
/// reached only through fragments that match permissively (no condition, or
/// a condition the matcher cannot decide) are collected as not required.
pub fn collect_fields<'a>(
    sets: &[&'a SelectionSet],
    ctx: CollectContext<'a>,
    typename: Option<&str>,
) -> Result<Vec<CollectedField<'a>>, CacheError> {
    let mut collector = Collector {
        ctx,
        typename,
        fields: Vec::new(),
        index: BTreeMap::new(),
        active_spreads: BTreeSet::new(),
    };
    for set in sets {
        collector.visit(set, true)?;
    }
    Ok(collector.fields)
}

struct Collector<'a, 't> {
    ctx: CollectContext<'a>,
    typename: Option<&'t str>,
    fields: Vec<CollectedField<'a>>,
    index: BTreeMap<&'a str, usize>,
    active_spreads: BTreeSet<&'a str>,
}

impl<'a> Collector<'a, '_> {
    fn visit(&mut self, set: &'a SelectionSet, required: bool) -> Result<(), CacheError> {
        for selection in &set.selections {
            match selection {
                Selection::Field(field) => self.add(field, required),
                Selection::InlineFragment(fragment) => {
                    let matched = match fragment.type_condition.as_deref() {
                        Some(condition) => self.ctx.matcher.match_fragment(self.typename, condition),
                        None => FragmentMatch::Unknown,
                    };
                    self.visit_fragment(&fragment.selection_set, matched, required)?;
                }
                Selection::FragmentSpread(spread) => {
                    let definition = self.ctx.fragments.get(&spread.name)?;
                    if !self.active_spreads.insert(&definition.name) {
                        return Err(CacheError::MalformedSelection(format!(
                            "fragment {} spreads itself",
                            spread.name
                        )));
                    }
                    let matched = self
                        .ctx
                        .matcher
                        .match_fragment(self.typename, &definition.type_condition);
                    self.visit_fragment(&definition.selection_set, matched, required)?;
                    self.active_spreads.remove(definition.name.as_str());
                }
            }
        }
        Ok(())
    }

    fn visit_fragment(
        &mut self,
        set: &'a SelectionSet,
        matched: FragmentMatch,
        required: bool,
    ) -> Result<(), CacheError> {
        match matched {
            FragmentMatch::NoMatch => Ok(()),
            FragmentMatch::Match => self.visit(set, required),
            FragmentMatch::Unknown => self.visit(set, false),
        }
    }

    fn add(&mut self, field: &'a Field, required: bool) {
        let key = field.response_key();
        match self.index.get(key) {
            Some(&slot) => {
                let merged = &mut self.fields[slot];
                if let Some(children) = &field.selection_set {
                    merged.children.push(children);
                    merged.has_selection = true;
                }
                merged.required |= required;
            }
            None => {
                self.index.insert(key, self.fields.len());
                self.fields.push(CollectedField {
                    field,
                    children: field.selection_set.iter().collect(),
                    has_selection: field.selection_set.is_some(),
                    required,
                });
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{HeuristicMatcher, PossibleTypesMatcher};
    use serde_json::json;

    static NO_FRAGMENTS: FragmentMap = FragmentMap::new();

    fn ctx<'a>(fragments: &'a FragmentMap, matcher: &'a dyn FragmentMatcher) -> CollectContext<'a> {
        CollectContext { fragments, matcher }
    }

    fn keys(fields: &[CollectedField<'_>]) -> Vec<(String, bool)> {
        fields
            .iter()
            .map(|f| (f.response_key().to_string(), f.required))
            .collect()
    }

    #[test]
    fn storage_key_without_arguments_is_name() {
        let key = storage_key(&Field::new("name"), &Variables::new()).expect("key");
        assert_eq!(key, "name");
    }

    #[test]
    fn storage_key_is_independent_of_argument_order() {
        let variables: Variables = [("x".to_string(), json!({ "b": 2, "a": 1 }))]
            .into_iter()
            .collect();
        let a = Field::new("search")
            .arg("filter", json!({ "a": 1, "b": 2 }))
            .arg("limit", 10_i64);
        let b = Field::new("search")
            .arg("limit", 10_i64)
            .arg("filter", ArgValue::variable("x"));

        let key_a = storage_key(&a, &variables).expect("key");
        let key_b = storage_key(&b, &variables).expect("key");
        assert_eq!(key_a, key_b);
        assert_eq!(key_a, "search({\"filter\":{\"a\":1,\"b\":2},\"limit\":10})");
    }

    #[test]
    fn storage_key_resolves_nested_variables() {
        let variables: Variables = [("id".to_string(), json!("1000"))].into_iter().collect();
        let field = Field::new("human").arg(
            "where",
            ArgValue::Object(
                [("ids".to_string(), ArgValue::List(vec![ArgValue::variable("id")]))]
                    .into_iter()
                    .collect(),
            ),
        );
        let key = storage_key(&field, &variables).expect("key");
        assert_eq!(key, "human({\"where\":{\"ids\":[\"1000\"]}})");
    }

    #[test]
    fn storage_key_undefined_variable_is_fatal() {
        let field = Field::new("human").arg("id", ArgValue::variable("missing"));
        let err = storage_key(&field, &Variables::new()).expect_err("undefined");
        assert!(matches!(err, CacheError::UndefinedVariable(name) if name == "missing"));
    }

    #[test]
    fn merges_fields_with_same_response_key() {
        let set = SelectionSet::new(vec![
            Field::new("bar").select(SelectionSet::leaves(&["a"])).into(),
            Field::new("baz").into(),
            Field::new("bar").select(SelectionSet::leaves(&["b"])).into(),
        ]);
        let fields = collect_fields(&[&set], ctx(&NO_FRAGMENTS, &HeuristicMatcher), None)
            .expect("collect");

        assert_eq!(
            keys(&fields),
            vec![("bar".to_string(), true), ("baz".to_string(), true)]
        );
        assert_eq!(fields[0].children.len(), 2);
        assert!(fields[0].has_selection);
    }

    #[test]
    fn aliases_are_distinct_keys() {
        let set = SelectionSet::new(vec![
            Field::new("hero").alias("left").into(),
            Field::new("hero").alias("right").into(),
        ]);
        let fields = collect_fields(&[&set], ctx(&NO_FRAGMENTS, &HeuristicMatcher), None)
            .expect("collect");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].response_key(), "right");
    }

    #[test]
    fn fragment_conditions_control_requiredness() {
        let set = SelectionSet::new(vec![
            Field::new("name").into(),
            InlineFragment::new(Some("Droid"), SelectionSet::leaves(&["primaryFunction"])).into(),
            InlineFragment::new(Some("Human"), SelectionSet::leaves(&["height"])).into(),
            InlineFragment::new(None, SelectionSet::leaves(&["nickname"])).into(),
        ]);

        let known = collect_fields(&[&set], ctx(&NO_FRAGMENTS, &HeuristicMatcher), Some("Droid"))
            .expect("collect");
        assert_eq!(
            keys(&known),
            vec![
                ("name".to_string(), true),
                ("primaryFunction".to_string(), true),
                ("nickname".to_string(), false),
            ]
        );

        let unknown = collect_fields(&[&set], ctx(&NO_FRAGMENTS, &HeuristicMatcher), None)
            .expect("collect");
        assert_eq!(
            keys(&unknown),
            vec![
                ("name".to_string(), true),
                ("primaryFunction".to_string(), false),
                ("height".to_string(), false),
                ("nickname".to_string(), false),
            ]
        );
    }

    #[test]
    fn field_required_if_any_node_is_required() {
        let set = SelectionSet::new(vec![
            InlineFragment::new(Some("Character"), SelectionSet::leaves(&["name"])).into(),
            Field::new("name").into(),
        ]);
        let fields = collect_fields(&[&set], ctx(&NO_FRAGMENTS, &HeuristicMatcher), None)
            .expect("collect");
        assert_eq!(keys(&fields), vec![("name".to_string(), true)]);
    }

    #[test]
    fn possible_types_matches_abstract_conditions() {
        let matcher = PossibleTypesMatcher::new().with_possible_types("Character", ["Droid", "Human"]);
        let fragments: FragmentMap = [FragmentDefinition::new(
            "CharacterName",
            "Character",
            SelectionSet::leaves(&["name"]),
        )]
        .into_iter()
        .collect();
        let set = SelectionSet::new(vec![FragmentSpread::new("CharacterName").into()]);

        let fields = collect_fields(&[&set], ctx(&fragments, &matcher), Some("Droid"))
            .expect("collect");
        assert_eq!(keys(&fields), vec![("name".to_string(), true)]);

        let fields = collect_fields(&[&set], ctx(&fragments, &matcher), Some("Planet"))
            .expect("collect");
        assert!(fields.is_empty());
    }

    #[test]
    fn undefined_fragment_is_fatal() {
        let set = SelectionSet::new(vec![FragmentSpread::new("Nope").into()]);
        let err = collect_fields(&[&set], ctx(&NO_FRAGMENTS, &HeuristicMatcher), None)
            .expect_err("undefined");
        assert!(matches!(err, CacheError::UndefinedFragment(name) if name == "Nope"));
    }

    #[test]
    fn spread_cycle_is_malformed() {
        let fragments: FragmentMap = [
            FragmentDefinition::new(
                "A",
                "Node",
                SelectionSet::leaves(&["a"]).with(FragmentSpread::new("B")),
            ),
            FragmentDefinition::new(
                "B",
                "Node",
                SelectionSet::leaves(&["b"]).with(FragmentSpread::new("A")),
            ),
        ]
        .into_iter()
        .collect();
        let set = SelectionSet::new(vec![FragmentSpread::new("A").into()]);
        let err = collect_fields(&[&set], ctx(&fragments, &HeuristicMatcher), Some("Node"))
            .expect_err("cycle");
        assert!(matches!(err, CacheError::MalformedSelection(_)));
    }

    #[test]
    fn same_fragment_spread_twice_is_not_a_cycle() {
        let fragments: FragmentMap =
            [FragmentDefinition::new("F", "Node", SelectionSet::leaves(&["a"]))]
                .into_iter()
                .collect();
        let set = SelectionSet::new(vec![
            FragmentSpread::new("F").into(),
            FragmentSpread::new("F").into(),
        ]);
        let fields = collect_fields(&[&set], ctx(&fragments, &HeuristicMatcher), Some("Node"))
            .expect("collect");
        assert_eq!(keys(&fields), vec![("a".to_string(), true)]);
    }

    #[test]
    fn single_fragment_selection_rules() {
        let one = Document::default().with_fragment(FragmentDefinition::new(
            "A",
            "Node",
            SelectionSet::leaves(&["a"]),
        ));
        assert_eq!(one.single_fragment(None).expect("only one").name, "A");

        let two = one
            .clone()
            .with_fragment(FragmentDefinition::new("B", "Node", SelectionSet::leaves(&["b"])));
        assert!(matches!(
            two.single_fragment(None),
            Err(CacheError::MalformedSelection(_))
        ));
        assert_eq!(two.single_fragment(Some("B")).expect("named").name, "B");
        assert!(matches!(
            two.single_fragment(Some("C")),
            Err(CacheError::UndefinedFragment(_))
        ));

        let with_operation = Document::operation(SelectionSet::leaves(&["a"]))
            .with_fragment(FragmentDefinition::new("A", "Node", SelectionSet::leaves(&["a"])));
        assert!(matches!(
            with_operation.single_fragment(Some("A")),
            Err(CacheError::MalformedSelection(_))
        ));
    }

    #[test]
    fn selection_json_shape() {
        let json = json!([
            { "kind": "field", "name": "hero", "arguments": { "episode": { "$variable": "ep" } },
              "selection_set": [
                { "kind": "field", "name": "name" },
                { "kind": "inline_fragment", "type_condition": "Droid",
                  "selection_set": [{ "kind": "field", "name": "primaryFunction" }] },
                { "kind": "fragment_spread", "name": "HeroDetails" }
              ] }
        ]);
        let set: SelectionSet = serde_json::from_value(json).expect("parse");
        let Selection::Field(hero) = &set.selections[0] else {
            unreachable!("first selection is a field")
        };
        assert_eq!(hero.arguments.get("episode"), Some(&ArgValue::variable("ep")));
        assert_eq!(hero.selection_set.as_ref().map(|s| s.selections.len()), Some(3));
    }
}
