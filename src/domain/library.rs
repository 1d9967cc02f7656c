//! Libraries: named collections gating creation and editing of items.

use serde::{Deserialize, Serialize};

/// A named library. Read by the versioning core, never mutated by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LibraryVO {
    pub name: String,
    pub is_editable: bool,
}

impl LibraryVO {
    pub fn from_repository_values(name: impl Into<String>, is_editable: bool) -> Self {
        Self {
            name: name.into(),
            is_editable,
        }
    }

    /// Resolve a library by name through an injected lookup.
    pub fn from_input_values(
        name: &str,
        library_lookup: impl FnOnce(&str) -> Option<LibraryVO>,
    ) -> crate::Result<Self> {
        library_lookup(name).ok_or_else(|| crate::Error::not_found("Library", name))
    }
}
