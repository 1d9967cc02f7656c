//! Version metadata attached to every library item.
//!
//! A metadata value is immutable: each lifecycle transition produces a new
//! value from the current one. Version numbers never decrease.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::LibraryItemStatus;

pub const INITIAL_CHANGE_DESCRIPTION: &str = "Initial version";
pub const APPROVED_CHANGE_DESCRIPTION: &str = "Approved version";
pub const NEW_VERSION_CHANGE_DESCRIPTION: &str = "New draft created";
pub const INACTIVATED_CHANGE_DESCRIPTION: &str = "Inactivated version";
pub const REACTIVATED_CHANGE_DESCRIPTION: &str = "Reactivated version";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LibraryItemMetadataVO {
    pub status: LibraryItemStatus,
    pub major_version: u32,
    pub minor_version: u32,
    pub author_id: String,
    pub change_description: String,
    pub start_date: DateTime<Utc>,
    /// `None` means currently effective.
    pub end_date: Option<DateTime<Utc>>,
}

impl LibraryItemMetadataVO {
    #[allow(clippy::too_many_arguments)]
    pub fn from_repository_values(
        status: LibraryItemStatus,
        major_version: u32,
        minor_version: u32,
        author_id: impl Into<String>,
        change_description: impl Into<String>,
        start_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            status,
            major_version,
            minor_version,
            author_id: author_id.into(),
            change_description: change_description.into(),
            start_date,
            end_date,
        }
    }

    /// Metadata of a freshly created item: DRAFT 0.1.
    pub fn initial(author_id: &str, start_date: Option<DateTime<Utc>>) -> Self {
        Self {
            status: LibraryItemStatus::Draft,
            major_version: 0,
            minor_version: 1,
            author_id: author_id.to_string(),
            change_description: INITIAL_CHANGE_DESCRIPTION.to_string(),
            start_date: start_date.unwrap_or_else(Utc::now),
            end_date: None,
        }
    }

    pub fn version(&self) -> String {
        format!("{}.{}", self.major_version, self.minor_version)
    }

    pub fn is_current(&self) -> bool {
        self.end_date.is_none()
    }

    /// True for a draft that has never been approved.
    pub fn is_initial_draft(&self) -> bool {
        self.status == LibraryItemStatus::Draft && self.major_version == 0
    }

    /// The successor never starts before this version, even when `now` is
    /// earlier (a caller-supplied start date, a clock stepping back).
    fn successor(
        &self,
        status: LibraryItemStatus,
        major_version: u32,
        minor_version: u32,
        author_id: &str,
        change_description: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            status,
            major_version,
            minor_version,
            author_id: author_id.to_string(),
            change_description: change_description.to_string(),
            start_date: now.max(self.start_date),
            end_date: None,
        }
    }

    /// Next draft after an edit: minor version + 1.
    pub fn next_draft(&self, author_id: &str, change_description: &str, now: DateTime<Utc>) -> Self {
        self.successor(
            LibraryItemStatus::Draft,
            self.major_version,
            self.minor_version + 1,
            author_id,
            change_description,
            now,
        )
    }

    /// Approval: FINAL, major version + 1, minor version 0.
    pub fn approved(&self, author_id: &str, now: DateTime<Utc>) -> Self {
        self.successor(
            LibraryItemStatus::Final,
            self.major_version + 1,
            0,
            author_id,
            APPROVED_CHANGE_DESCRIPTION,
            now,
        )
    }

    /// Re-opened draft of an approved item: minor version 1.
    pub fn new_version(&self, author_id: &str, now: DateTime<Utc>) -> Self {
        self.successor(
            LibraryItemStatus::Draft,
            self.major_version,
            1,
            author_id,
            NEW_VERSION_CHANGE_DESCRIPTION,
            now,
        )
    }

    pub fn retired(&self, author_id: &str, now: DateTime<Utc>) -> Self {
        self.successor(
            LibraryItemStatus::Retired,
            self.major_version,
            self.minor_version,
            author_id,
            INACTIVATED_CHANGE_DESCRIPTION,
            now,
        )
    }

    pub fn reactivated(&self, author_id: &str, now: DateTime<Utc>) -> Self {
        self.successor(
            LibraryItemStatus::Final,
            self.major_version,
            self.minor_version,
            author_id,
            REACTIVATED_CHANGE_DESCRIPTION,
            now,
        )
    }

    /// Copy of this metadata closed at `end_date`.
    pub fn closed(&self, end_date: DateTime<Utc>) -> Self {
        Self {
            end_date: Some(end_date),
            ..self.clone()
        }
    }

    /// Check the status/version invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.status {
            LibraryItemStatus::Final | LibraryItemStatus::Retired => {
                if self.major_version < 1 || self.minor_version != 0 {
                    return Err(format!(
                        "{} metadata must have a major version and minor version 0, got {}",
                        self.status,
                        self.version()
                    ));
                }
            }
            LibraryItemStatus::Draft => {
                if self.minor_version == 0 {
                    return Err(format!(
                        "Draft metadata must have a minor version, got {}",
                        self.version()
                    ));
                }
            }
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err("end_date precedes start_date".to_string());
            }
        }
        Ok(())
    }
}
