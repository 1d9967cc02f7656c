//! Aggregate root lifecycle state machine.
//!
//! Which operations are legal is decided by a single table,
//! [`possible_actions`], computed from the library's editability, the
//! current status and the major version. Every transition checks the table
//! first and fails with `BusinessLogic` when the action is not offered.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::enums::{LibraryItemStatus, ObjectAction};
use super::item_metadata::LibraryItemMetadataVO;
use super::library::LibraryVO;
use super::value_object::{LibraryItemValue, UidLookup};
use crate::error::{require, Error, Result};

/// Actions offered for `(is_editable, status, major_version)`.
///
/// `edit_override` is set for entity types that remain editable in a
/// non-editable library.
pub fn possible_actions(
    is_editable: bool,
    edit_override: bool,
    status: LibraryItemStatus,
    major_version: u32,
) -> BTreeSet<ObjectAction> {
    use ObjectAction::*;

    if !is_editable && !edit_override {
        return BTreeSet::new();
    }
    match status {
        LibraryItemStatus::Draft if major_version == 0 => [Approve, Edit, Delete].into(),
        LibraryItemStatus::Draft => [Approve, Edit].into(),
        LibraryItemStatus::Final => [NewVersion, Inactivate].into(),
        LibraryItemStatus::Retired => [Reactivate].into(),
    }
}

fn library_refusal(library: &LibraryVO, action: ObjectAction) -> String {
    let what = match action {
        ObjectAction::Approve => "approval of objects",
        ObjectAction::Delete => "deletion of objects",
        ObjectAction::Edit => "editing of objects",
        ObjectAction::Inactivate => "inactivation of objects",
        ObjectAction::NewVersion => "creation of new versions",
        ObjectAction::Reactivate => "reactivation of objects",
    };
    format!("Library with Name '{}' doesn't allow {}.", library.name, what)
}

fn status_refusal(action: ObjectAction) -> &'static str {
    match action {
        ObjectAction::Approve | ObjectAction::Edit => "The object isn't in draft status.",
        ObjectAction::Delete => "Object has been accepted. Only never approved drafts can be deleted.",
        ObjectAction::Inactivate => "Only FINAL versions can be retired.",
        ObjectAction::NewVersion => "New draft version can be created only for FINAL versions.",
        ObjectAction::Reactivate => "Only RETIRED version can be reactivated.",
    }
}

/// A versioned library item: identity, current value, library and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItemAggregateRoot<V> {
    uid: String,
    value: V,
    library: LibraryVO,
    item_metadata: LibraryItemMetadataVO,
}

impl<V: LibraryItemValue> LibraryItemAggregateRoot<V> {
    /// Rehydrate from trusted persisted state. Performs no validation.
    pub fn from_repository_values(
        uid: impl Into<String>,
        value: V,
        library: LibraryVO,
        item_metadata: LibraryItemMetadataVO,
    ) -> Self {
        Self {
            uid: uid.into(),
            value,
            library,
            item_metadata,
        }
    }

    /// Create a new item at DRAFT 0.1.
    ///
    /// Fails when the library does not accept new items or the value does
    /// not validate against `lookup`.
    pub fn from_input_values(
        author_id: &str,
        value: V,
        library: LibraryVO,
        start_date: Option<DateTime<Utc>>,
        generate_uid: impl FnOnce() -> String,
        lookup: &UidLookup<'_>,
    ) -> Result<Self> {
        require(
            library.is_editable,
            format!(
                "Library with Name '{}' doesn't allow creation of objects.",
                library.name
            ),
        )?;
        let uid = generate_uid();
        value.validate(&uid, lookup)?;

        Ok(Self {
            uid,
            value,
            library,
            item_metadata: LibraryItemMetadataVO::initial(author_id, start_date),
        })
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn name(&self) -> &str {
        self.value.name()
    }

    pub fn library(&self) -> &LibraryVO {
        &self.library
    }

    pub fn item_metadata(&self) -> &LibraryItemMetadataVO {
        &self.item_metadata
    }

    pub fn status(&self) -> LibraryItemStatus {
        self.item_metadata.status
    }

    pub fn version(&self) -> String {
        self.item_metadata.version()
    }

    pub fn possible_actions(&self) -> BTreeSet<ObjectAction> {
        possible_actions(
            self.library.is_editable,
            V::edit_allowed_in_non_editable_library(),
            self.item_metadata.status,
            self.item_metadata.major_version,
        )
    }

    fn ensure_allowed(&self, action: ObjectAction) -> Result<()> {
        if self.possible_actions().contains(&action) {
            return Ok(());
        }
        if !self.library.is_editable && !V::edit_allowed_in_non_editable_library() {
            return Err(Error::BusinessLogic(library_refusal(&self.library, action)));
        }
        Err(Error::business_logic(status_refusal(action)))
    }

    /// Replace the value of a draft.
    ///
    /// Returns `false` without touching anything when `value` equals the
    /// current value.
    pub fn edit_draft(
        &mut self,
        author_id: &str,
        change_description: &str,
        value: V,
        lookup: &UidLookup<'_>,
    ) -> Result<bool> {
        self.ensure_allowed(ObjectAction::Edit)?;
        value.validate(&self.uid, lookup)?;
        if self.value == value {
            return Ok(false);
        }
        self.item_metadata =
            self.item_metadata
                .next_draft(author_id, change_description, Utc::now());
        self.value = value;
        Ok(true)
    }

    pub fn approve(&mut self, author_id: &str) -> Result<()> {
        self.ensure_allowed(ObjectAction::Approve)?;
        self.item_metadata = self.item_metadata.approved(author_id, Utc::now());
        Ok(())
    }

    /// Open a DRAFT `n.1` on top of FINAL `n.0`.
    pub fn create_new_version(&mut self, author_id: &str) -> Result<()> {
        self.ensure_allowed(ObjectAction::NewVersion)?;
        self.item_metadata = self.item_metadata.new_version(author_id, Utc::now());
        Ok(())
    }

    pub fn inactivate(&mut self, author_id: &str) -> Result<()> {
        self.ensure_allowed(ObjectAction::Inactivate)?;
        self.item_metadata = self.item_metadata.retired(author_id, Utc::now());
        Ok(())
    }

    pub fn reactivate(&mut self, author_id: &str) -> Result<()> {
        self.ensure_allowed(ObjectAction::Reactivate)?;
        self.item_metadata = self.item_metadata.reactivated(author_id, Utc::now());
        Ok(())
    }

    /// Fail unless the item may be removed (never approved draft).
    pub fn ensure_deletable(&self) -> Result<()> {
        self.ensure_allowed(ObjectAction::Delete)
    }
}
