//! Compounds.

use serde::{Deserialize, Serialize};

use super::value_object::{
    validate_sentence_case, validate_uniqueness, LibraryItemValue, UidLookup, ValuePatch,
};
use crate::error::Result;

fn default_sponsor_compound() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompoundVO {
    pub name: String,
    #[serde(default)]
    pub name_sentence_case: Option<String>,
    #[serde(default)]
    pub definition: Option<String>,
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default = "default_sponsor_compound")]
    pub is_sponsor_compound: bool,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl CompoundVO {
    pub fn from_repository_values(
        name: impl Into<String>,
        name_sentence_case: Option<String>,
        definition: Option<String>,
        abbreviation: Option<String>,
        is_sponsor_compound: bool,
        external_id: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            name_sentence_case,
            definition,
            abbreviation,
            is_sponsor_compound,
            external_id,
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_input_values(
        name: impl Into<String>,
        name_sentence_case: Option<String>,
        definition: Option<String>,
        abbreviation: Option<String>,
        is_sponsor_compound: bool,
        external_id: Option<String>,
        uid: &str,
        lookup: &UidLookup<'_>,
    ) -> Result<Self> {
        let vo = Self::from_repository_values(
            name,
            name_sentence_case,
            definition,
            abbreviation,
            is_sponsor_compound,
            external_id,
        );
        vo.validate(uid, lookup)?;
        Ok(vo)
    }

    /// Shorthand for a sponsor compound with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self::from_repository_values(name, None, None, None, true, None)
    }
}

impl LibraryItemValue for CompoundVO {
    const ENTITY_TYPE: &'static str = "compound";
    const UID_PREFIX: &'static str = "Compound";
    const DISPLAY_NAME: &'static str = "Compound";

    fn name(&self) -> &str {
        &self.name
    }

    fn unique_properties(&self) -> Vec<(&'static str, String)> {
        let mut props = vec![("name", self.name.clone())];
        if let Some(sentence_case) = &self.name_sentence_case {
            props.push(("name_sentence_case", sentence_case.clone()));
        }
        if let Some(external_id) = &self.external_id {
            props.push(("external_id", external_id.clone()));
        }
        props
    }

    fn validate(&self, uid: &str, lookup: &UidLookup<'_>) -> Result<()> {
        for (property, value) in self.unique_properties() {
            validate_uniqueness(lookup, uid, Self::DISPLAY_NAME, property, &value)?;
        }
        if let Some(sentence_case) = &self.name_sentence_case {
            validate_sentence_case("name_sentence_case", &self.name, sentence_case)?;
        }
        Ok(())
    }
}

/// Partial update of a compound.
///
/// `Some(None)` clears an optional field, `None` keeps it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompoundPatch {
    pub name: Option<String>,
    pub name_sentence_case: Option<Option<String>>,
    pub definition: Option<Option<String>>,
    pub abbreviation: Option<Option<String>>,
    pub is_sponsor_compound: Option<bool>,
    pub external_id: Option<Option<String>>,
}

impl ValuePatch<CompoundVO> for CompoundPatch {
    fn merge(self, current: &CompoundVO) -> CompoundVO {
        CompoundVO {
            name: self.name.unwrap_or_else(|| current.name.clone()),
            name_sentence_case: self
                .name_sentence_case
                .unwrap_or_else(|| current.name_sentence_case.clone()),
            definition: self
                .definition
                .unwrap_or_else(|| current.definition.clone()),
            abbreviation: self
                .abbreviation
                .unwrap_or_else(|| current.abbreviation.clone()),
            is_sponsor_compound: self
                .is_sponsor_compound
                .unwrap_or(current.is_sponsor_compound),
            external_id: self
                .external_id
                .unwrap_or_else(|| current.external_id.clone()),
        }
    }
}
