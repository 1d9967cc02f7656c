//! Lifecycle status and action enumerations.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle status of a library item version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LibraryItemStatus {
    #[serde(rename = "Draft")]
    Draft,
    #[serde(rename = "Final")]
    Final,
    #[serde(rename = "Retired")]
    Retired,
}

impl LibraryItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LibraryItemStatus::Draft => "Draft",
            LibraryItemStatus::Final => "Final",
            LibraryItemStatus::Retired => "Retired",
        }
    }
}

impl fmt::Display for LibraryItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LibraryItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Draft" => Ok(LibraryItemStatus::Draft),
            "Final" => Ok(LibraryItemStatus::Final),
            "Retired" => Ok(LibraryItemStatus::Retired),
            other => Err(other.to_string()),
        }
    }
}

/// Lifecycle operation offered to the caller.
///
/// Ordering is the declaration order, which is also the order the read
/// model lists possible actions in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ObjectAction {
    Approve,
    Delete,
    Edit,
    Inactivate,
    NewVersion,
    Reactivate,
}

impl ObjectAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectAction::Approve => "approve",
            ObjectAction::Delete => "delete",
            ObjectAction::Edit => "edit",
            ObjectAction::Inactivate => "inactivate",
            ObjectAction::NewVersion => "newVersion",
            ObjectAction::Reactivate => "reactivate",
        }
    }
}

impl fmt::Display for ObjectAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
