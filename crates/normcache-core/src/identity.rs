//! # Identity Policy
//!
//! How objects are named and how type conditions are evaluated. The writer
//! and the reader share these so that both agree on which record a nested
//! object lives in and which fragments apply to it.

use crate::EntityId;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// USER IDENTIFIERS
// =============================================================================

/// Derives a stable identifier from an object's own fields.
///
/// Returning `None` makes the writer fall back to a generated identifier.
pub trait IdentifyObject {
    fn identify(&self, object: &Map<String, Value>) -> Option<String>;
}

impl<F> IdentifyObject for F
where
    F: Fn(&Map<String, Value>) -> Option<String>,
{
    fn identify(&self, object: &Map<String, Value>) -> Option<String> {
        self(object)
    }
}

/// Never derives an identifier: every nested object gets a generated one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

impl IdentifyObject for NoIdentity {
    fn identify(&self, _object: &Map<String, Value>) -> Option<String> {
        None
    }
}

/// Combines a type discriminator and an id field into `"<Type>:<id>"`.
///
/// Objects lacking either field are left to the generated-id fallback.
/// String and integer ids are accepted; other id shapes are not stable keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIdentity {
    pub typename_field: String,
    pub id_field: String,
}

impl Default for FieldIdentity {
    fn default() -> Self {
        Self {
            typename_field: crate::types::TYPENAME_FIELD.to_string(),
            id_field: "id".to_string(),
        }
    }
}

impl IdentifyObject for FieldIdentity {
    fn identify(&self, object: &Map<String, Value>) -> Option<String> {
        let typename = object.get(&self.typename_field)?.as_str()?;
        let id = match object.get(&self.id_field)? {
            Value::String(s) => s.clone(),
            Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
            _ => return None,
        };
        Some(format!("{typename}:{id}"))
    }
}

// =============================================================================
// GENERATED IDENTIFIERS
// =============================================================================

/// Identifier for an object without a user identifier.
///
/// `<parent>.<storage_key>` followed by `.<index>` for each list level the
/// object sits in. Stable only while the object keeps its path.
#[must_use]
pub fn generated_id(parent: &EntityId, storage_key: &str, indexes: &[usize]) -> EntityId {
    let mut id = format!("{}.{}", parent.as_str(), storage_key);
    for index in indexes {
        id.push('.');
        id.push_str(&index.to_string());
    }
    EntityId(id)
}

// =============================================================================
// FRAGMENT MATCHING
// =============================================================================

/// Outcome of evaluating a type condition against an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentMatch {
    /// The condition holds; the fragment's fields are required.
    Match,
    /// The condition definitely fails; the fragment contributes nothing.
    NoMatch,
    /// The condition cannot be evaluated; the fragment applies permissively.
    Unknown,
}

/// Evaluates fragment type conditions.
///
/// One matcher is used for every entity of a write or read so that entities
/// of the same store are treated consistently.
pub trait FragmentMatcher {
    fn match_fragment(&self, typename: Option<&str>, type_condition: &str) -> FragmentMatch;
}

/// Decides by discriminator equality alone.
///
/// A known typename that differs from the condition is a mismatch; an
/// unknown typename leaves the condition undecided.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMatcher;

impl FragmentMatcher for HeuristicMatcher {
    fn match_fragment(&self, typename: Option<&str>, type_condition: &str) -> FragmentMatch {
        match typename {
            None => FragmentMatch::Unknown,
            Some(typename) if typename == type_condition => FragmentMatch::Match,
            Some(_) => FragmentMatch::NoMatch,
        }
    }
}

/// Decides with schema knowledge: abstract type -> concrete member types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PossibleTypesMatcher {
    possible_types: BTreeMap<String, BTreeSet<String>>,
}

impl PossibleTypesMatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the concrete types an abstract type may resolve to.
    #[must_use]
    pub fn with_possible_types<I, S>(mut self, abstract_type: impl Into<String>, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.possible_types
            .entry(abstract_type.into())
            .or_default()
            .extend(members.into_iter().map(Into::into));
        self
    }
}

impl FromIterator<(String, Vec<String>)> for PossibleTypesMatcher {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |matcher, (abstract_type, members)| {
                matcher.with_possible_types(abstract_type, members)
            })
    }
}

impl FragmentMatcher for PossibleTypesMatcher {
    fn match_fragment(&self, typename: Option<&str>, type_condition: &str) -> FragmentMatch {
        let Some(typename) = typename else {
            return FragmentMatch::Unknown;
        };
        if typename == type_condition {
            return FragmentMatch::Match;
        }
        match self.possible_types.get(type_condition) {
            Some(members) if members.contains(typename) => FragmentMatch::Match,
            _ => FragmentMatch::NoMatch,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
