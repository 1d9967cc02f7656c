//! Controlled-terminology term names.

use serde::{Deserialize, Serialize};

use super::value_object::{
    validate_sentence_case, validate_uniqueness, LibraryItemValue, UidLookup, ValuePatch,
};
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CTTermNameVO {
    pub name: String,
    pub name_sentence_case: String,
    #[serde(default)]
    pub catalogue_names: Vec<String>,
}

impl CTTermNameVO {
    pub fn from_repository_values(
        name: impl Into<String>,
        name_sentence_case: impl Into<String>,
        catalogue_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            name_sentence_case: name_sentence_case.into(),
            catalogue_names,
        }
    }

    pub fn from_input_values(
        name: impl Into<String>,
        name_sentence_case: impl Into<String>,
        catalogue_names: Vec<String>,
        uid: &str,
        lookup: &UidLookup<'_>,
    ) -> Result<Self> {
        let vo = Self::from_repository_values(name, name_sentence_case, catalogue_names);
        vo.validate(uid, lookup)?;
        Ok(vo)
    }
}

impl LibraryItemValue for CTTermNameVO {
    const ENTITY_TYPE: &'static str = "ct_term_name";
    const UID_PREFIX: &'static str = "CTTerm";
    const DISPLAY_NAME: &'static str = "CT Term Name";

    fn name(&self) -> &str {
        &self.name
    }

    fn unique_properties(&self) -> Vec<(&'static str, String)> {
        vec![("name", self.name.clone())]
    }

    fn validate(&self, uid: &str, lookup: &UidLookup<'_>) -> Result<()> {
        validate_uniqueness(lookup, uid, Self::DISPLAY_NAME, "name", &self.name)?;
        validate_sentence_case("name_sentence_case", &self.name, &self.name_sentence_case)
    }

    // Sponsor-maintained names are kept on terms of read-only CDISC libraries.
    fn edit_allowed_in_non_editable_library() -> bool {
        true
    }
}

/// Partial update of a term name; absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CTTermNamePatch {
    pub name: Option<String>,
    pub name_sentence_case: Option<String>,
    pub catalogue_names: Option<Vec<String>>,
}

impl ValuePatch<CTTermNameVO> for CTTermNamePatch {
    fn merge(self, current: &CTTermNameVO) -> CTTermNameVO {
        CTTermNameVO {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            name_sentence_case: self
                .name_sentence_case
                .unwrap_or_else(|| current.name_sentence_case.clone()),
            catalogue_names: self
                .catalogue_names
                .unwrap_or_else(|| current.catalogue_names.clone()),
        }
    }
}
