//! Read-model projection of library items.
//!
//! The metadata block is the same for every entity type; the value's own
//! fields are flattened next to it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    LibraryItemAggregateRoot, LibraryItemMetadataVO, LibraryItemStatus, LibraryItemValue,
    ObjectAction,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadataView {
    pub status: LibraryItemStatus,
    pub version: String,
    pub possible_actions: Vec<ObjectAction>,
    pub change_description: String,
    pub author_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl ItemMetadataView {
    pub fn new(metadata: &LibraryItemMetadataVO, possible_actions: Vec<ObjectAction>) -> Self {
        Self {
            status: metadata.status,
            version: metadata.version(),
            possible_actions,
            change_description: metadata.change_description.clone(),
            author_id: metadata.author_id.clone(),
            start_date: metadata.start_date,
            end_date: metadata.end_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryItemView<V> {
    pub uid: String,
    pub library_name: String,
    #[serde(flatten)]
    pub value: V,
    #[serde(flatten)]
    pub metadata: ItemMetadataView,
}

impl<V: LibraryItemValue> LibraryItemView<V> {
    pub fn from_aggregate(ar: &LibraryItemAggregateRoot<V>) -> Self {
        // BTreeSet iteration is already sorted.
        let actions = ar.possible_actions().into_iter().collect();
        Self {
            uid: ar.uid().to_string(),
            library_name: ar.library().name.clone(),
            value: ar.value().clone(),
            metadata: ItemMetadataView::new(ar.item_metadata(), actions),
        }
    }
}

impl<V: LibraryItemValue> From<&LibraryItemAggregateRoot<V>> for LibraryItemView<V> {
    fn from(ar: &LibraryItemAggregateRoot<V>) -> Self {
        Self::from_aggregate(ar)
    }
}
