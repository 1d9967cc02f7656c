//! Controlled-terminology term attributes.

use serde::{Deserialize, Serialize};

use super::value_object::{validate_uniqueness, LibraryItemValue, UidLookup};
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CTTermAttributesVO {
    #[serde(default)]
    pub catalogue_names: Vec<String>,
    pub concept_id: Option<String>,
    pub preferred_term: Option<String>,
    pub definition: String,
}

impl CTTermAttributesVO {
    pub fn from_repository_values(
        catalogue_names: Vec<String>,
        concept_id: Option<String>,
        preferred_term: Option<String>,
        definition: impl Into<String>,
    ) -> Self {
        Self {
            catalogue_names,
            concept_id,
            preferred_term,
            definition: definition.into(),
        }
    }

    /// Build from untrusted input. Every catalogue must exist.
    pub fn from_input_values(
        catalogue_names: Vec<String>,
        concept_id: Option<String>,
        preferred_term: Option<String>,
        definition: impl Into<String>,
        catalogue_exists: impl Fn(&str) -> bool,
        uid: &str,
        lookup: &UidLookup<'_>,
    ) -> Result<Self> {
        if let Some(missing) = catalogue_names.iter().find(|c| !catalogue_exists(c.as_str())) {
            return Err(Error::not_found("Catalogue", missing.as_str()));
        }
        let vo = Self::from_repository_values(catalogue_names, concept_id, preferred_term, definition);
        vo.validate(uid, lookup)?;
        Ok(vo)
    }
}

impl LibraryItemValue for CTTermAttributesVO {
    const ENTITY_TYPE: &'static str = "ct_term_attributes";
    const UID_PREFIX: &'static str = "CTTerm";
    const DISPLAY_NAME: &'static str = "CT Term Attributes";

    fn name(&self) -> &str {
        self.preferred_term.as_deref().unwrap_or_default()
    }

    fn unique_properties(&self) -> Vec<(&'static str, String)> {
        self.concept_id
            .iter()
            .map(|id| ("concept_id", id.clone()))
            .collect()
    }

    fn validate(&self, uid: &str, lookup: &UidLookup<'_>) -> Result<()> {
        match &self.concept_id {
            Some(concept_id) => {
                validate_uniqueness(lookup, uid, Self::DISPLAY_NAME, "concept_id", concept_id)
            }
            None => Ok(()),
        }
    }
}
