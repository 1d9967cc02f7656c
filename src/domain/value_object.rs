//! Value-object capability shared by every versioned entity type.
//!
//! A value object is an immutable attribute bag with structural equality.
//! Validation that depends on facts held by the store (uniqueness among
//! siblings) goes through lookup callbacks handed in by the caller; value
//! objects never talk to a store themselves.

use std::collections::HashMap;
use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Uniqueness oracle: `(property, value) -> uid of the entity holding it`.
pub type UidLookup<'a> = dyn Fn(&str, &str) -> Option<String> + 'a;

/// Lookup that never finds anything.
pub fn no_conflicts(_property: &str, _value: &str) -> Option<String> {
    None
}

/// Implemented by the value object of every versioned entity type.
pub trait LibraryItemValue:
    Clone + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Storage discriminator, e.g. `compound`.
    const ENTITY_TYPE: &'static str;
    /// Uid prefix, e.g. `Compound` for `Compound_000001`.
    const UID_PREFIX: &'static str;
    /// Human readable entity name used in messages.
    const DISPLAY_NAME: &'static str;

    fn name(&self) -> &str;

    /// Properties that must be unique among items of this type.
    ///
    /// Absent optional values are left out.
    fn unique_properties(&self) -> Vec<(&'static str, String)>;

    /// Attribute-level validation for the item identified by `uid`.
    fn validate(&self, uid: &str, lookup: &UidLookup<'_>) -> Result<()>;

    /// Whether items of this type stay editable in a non-editable library.
    fn edit_allowed_in_non_editable_library() -> bool {
        false
    }
}

/// Partial update merged onto the current value before comparison.
pub trait ValuePatch<V> {
    fn merge(self, current: &V) -> V;
}

/// Fail with `AlreadyExists` when another entity holds `value` for `property`.
pub fn validate_uniqueness(
    lookup: &UidLookup<'_>,
    uid: &str,
    entity: &str,
    property: &str,
    value: &str,
) -> Result<()> {
    match lookup(property, value) {
        Some(existing) if existing != uid => Err(Error::already_exists(entity, property, value)),
        _ => Ok(()),
    }
}

/// Fail with `Validation` unless `sentence_case` equals `name` ignoring case.
pub fn validate_sentence_case(field: &str, name: &str, sentence_case: &str) -> Result<()> {
    if name.to_lowercase() != sentence_case.to_lowercase() {
        return Err(Error::validation(
            field,
            format!("{sentence_case} isn't an independent case version of {name}"),
        ));
    }
    Ok(())
}

/// Pre-resolved answers of the uniqueness oracle for one candidate value.
///
/// The store is asynchronous while value-object validation is a plain
/// synchronous callback, so the repository resolves every unique property
/// up front and validation reads from this table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyLookup {
    entries: HashMap<(String, String), String>,
}

impl PropertyLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        property: impl Into<String>,
        value: impl Into<String>,
        uid: impl Into<String>,
    ) {
        self.entries
            .insert((property.into(), value.into()), uid.into());
    }

    pub fn uid_by_property(&self, property: &str, value: &str) -> Option<String> {
        self.entries
            .get(&(property.to_string(), value.to_string()))
            .cloned()
    }

    /// Borrow as the callback shape value objects validate against.
    pub fn as_callback(&self) -> impl Fn(&str, &str) -> Option<String> + '_ {
        move |property, value| self.uid_by_property(property, value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
