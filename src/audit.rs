//! Append-only audit trail of committed create and edit transitions.
//!
//! Each record links the version it produced (`after`) and, for edits, the
//! version it replaced (`before`). Versions are addressed by their
//! per-entity sequence number. Walking the chain in order reconstructs the
//! full history of an item.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditAction {
    Create,
    Edit,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "Create",
            AuditAction::Edit => "Edit",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Create" => Ok(AuditAction::Create),
            "Edit" => Ok(AuditAction::Edit),
            other => Err(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub entity_type: String,
    pub uid: String,
    pub author_id: String,
    pub timestamp: DateTime<Utc>,
    /// Sequence of the replaced version, `None` for a create.
    pub before: Option<u32>,
    /// Sequence of the version this transition produced.
    pub after: u32,
}

impl AuditRecord {
    pub fn create(entity_type: &str, uid: &str, author_id: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            action: AuditAction::Create,
            entity_type: entity_type.to_string(),
            uid: uid.to_string(),
            author_id: author_id.to_string(),
            timestamp,
            before: None,
            after: 0,
        }
    }

    pub fn edit(
        entity_type: &str,
        uid: &str,
        author_id: &str,
        timestamp: DateTime<Utc>,
        before: u32,
    ) -> Self {
        Self {
            action: AuditAction::Edit,
            entity_type: entity_type.to_string(),
            uid: uid.to_string(),
            author_id: author_id.to_string(),
            timestamp,
            before: Some(before),
            after: before + 1,
        }
    }
}

/// Ways an audit chain can be malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditChainError {
    #[error("Audit trail is empty")]
    Empty,

    #[error("Audit trail must start with a Create record, found {0}")]
    MissingCreate(AuditAction),

    #[error("Audit record {index} has action {action} but links before={before:?}")]
    ActionMismatch {
        index: usize,
        action: AuditAction,
        before: Option<u32>,
    },

    #[error("Audit record {index} links {before:?} -> {after}, expected {expected_before:?} -> {expected_after}")]
    BrokenLink {
        index: usize,
        before: Option<u32>,
        after: u32,
        expected_before: Option<u32>,
        expected_after: u32,
    },

    #[error("Audit record {index} is timestamped before its predecessor")]
    OutOfOrder { index: usize },

    #[error("Audit record {index} belongs to {entity_type}/{uid}")]
    ForeignRecord {
        index: usize,
        entity_type: String,
        uid: String,
    },

    #[error("Audit trail references missing version {0}")]
    MissingVersion(u32),
}

/// A borrowed, ordered audit chain of one item.
#[derive(Debug, Clone, Copy)]
pub struct AuditTrail<'a> {
    records: &'a [AuditRecord],
}

impl<'a> AuditTrail<'a> {
    pub fn new(records: &'a [AuditRecord]) -> Self {
        Self { records }
    }

    /// Check that the chain starts with a create at sequence 0 and that
    /// every following edit links the previous `after` to the next one.
    pub fn verify(&self) -> Result<(), AuditChainError> {
        let first = self.records.first().ok_or(AuditChainError::Empty)?;
        if first.action != AuditAction::Create {
            return Err(AuditChainError::MissingCreate(first.action));
        }

        let mut expected_before = None;
        let mut previous_ts = first.timestamp;
        for (index, record) in self.records.iter().enumerate() {
            if record.entity_type != first.entity_type || record.uid != first.uid {
                return Err(AuditChainError::ForeignRecord {
                    index,
                    entity_type: record.entity_type.clone(),
                    uid: record.uid.clone(),
                });
            }
            let is_create = record.action == AuditAction::Create;
            if is_create != record.before.is_none() || (is_create && index > 0) {
                return Err(AuditChainError::ActionMismatch {
                    index,
                    action: record.action,
                    before: record.before,
                });
            }
            let expected_after = expected_before.map_or(0, |b: u32| b + 1);
            if record.before != expected_before || record.after != expected_after {
                return Err(AuditChainError::BrokenLink {
                    index,
                    before: record.before,
                    after: record.after,
                    expected_before,
                    expected_after,
                });
            }
            if record.timestamp < previous_ts {
                return Err(AuditChainError::OutOfOrder { index });
            }
            previous_ts = record.timestamp;
            expected_before = Some(record.after);
        }
        Ok(())
    }

    /// Sequence of the version the chain currently ends at.
    pub fn head(&self) -> Option<u32> {
        self.records.last().map(|r| r.after)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, AuditRecord> {
        self.records.iter()
    }
}
