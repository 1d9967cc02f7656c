//! Versioned library items: value objects, metadata and the aggregate root.
//!
//! Everything in this module is synchronous and storage-agnostic. Facts
//! that live in the store reach it only through injected callbacks.

pub mod aggregate;
pub mod compound;
pub mod ct_term_attributes;
pub mod ct_term_name;
pub mod enums;
pub mod item_metadata;
pub mod library;
pub mod value_object;

pub use aggregate::{possible_actions, LibraryItemAggregateRoot};
pub use compound::{CompoundPatch, CompoundVO};
pub use ct_term_attributes::CTTermAttributesVO;
pub use ct_term_name::{CTTermNamePatch, CTTermNameVO};
pub use enums::{LibraryItemStatus, ObjectAction};
pub use item_metadata::LibraryItemMetadataVO;
pub use library::LibraryVO;
pub use value_object::{
    no_conflicts, validate_sentence_case, validate_uniqueness, LibraryItemValue, PropertyLookup,
    UidLookup, ValuePatch,
};
