//! Persistence of libraries, item versions, uniqueness facts and audit records.
//!
//! A library item is stored as an ordered list of immutable version records.
//! Every committed transition appends one version and one audit record in a
//! single atomic write; nothing of a failed commit is visible afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use backon::Retryable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::{AuditChainError, AuditRecord};
use crate::config::{StorageConfig, StorageType};
use crate::domain::{LibraryItemMetadataVO, LibraryItemStatus, LibraryVO};

pub mod mock;
#[cfg(feature = "sqlite")]
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use mock::MockLibraryItemStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteLibraryItemStore;

/// Errors from storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Item not found: entity_type={entity_type}, uid={uid}")]
    NotFound { entity_type: String, uid: String },

    #[error("Sequence conflict: expected {expected}, got {actual}")]
    SequenceConflict { expected: u32, actual: u32 },

    #[error("Unique constraint violated: {entity_type}.{property}='{value}' is held by {existing_uid}")]
    UniqueViolation {
        entity_type: String,
        property: String,
        value: String,
        existing_uid: String,
    },

    #[error("Item already exists: entity_type={entity_type}, uid={uid}")]
    AlreadyExists { entity_type: String, uid: String },

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Corrupt audit trail: {0}")]
    CorruptAuditTrail(#[from] AuditChainError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "sqlite")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// One committed version of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub sequence: u32,
    pub status: LibraryItemStatus,
    pub major_version: u32,
    pub minor_version: u32,
    pub author_id: String,
    pub change_description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub value: serde_json::Value,
}

impl VersionRecord {
    pub fn new(sequence: u32, metadata: &LibraryItemMetadataVO, value: serde_json::Value) -> Self {
        Self {
            sequence,
            status: metadata.status,
            major_version: metadata.major_version,
            minor_version: metadata.minor_version,
            author_id: metadata.author_id.clone(),
            change_description: metadata.change_description.clone(),
            start_date: metadata.start_date,
            end_date: metadata.end_date,
            value,
        }
    }

    pub fn metadata(&self) -> LibraryItemMetadataVO {
        LibraryItemMetadataVO::from_repository_values(
            self.status,
            self.major_version,
            self.minor_version,
            self.author_id.as_str(),
            self.change_description.as_str(),
            self.start_date,
            self.end_date,
        )
    }
}

/// An item with its current version.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredItem {
    pub entity_type: String,
    pub uid: String,
    pub library_name: String,
    pub current: VersionRecord,
}

/// A value that must be unique among items of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueValue {
    pub property: String,
    pub value: String,
}

impl UniqueValue {
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

/// Everything one transition writes.
#[derive(Debug, Clone)]
pub struct ItemCommit {
    pub entity_type: String,
    pub uid: String,
    pub library_name: String,
    /// Sequence of the current version, `None` when creating.
    pub expected_sequence: Option<u32>,
    pub version: VersionRecord,
    /// Replaces the item's previous unique values.
    pub unique_values: Vec<UniqueValue>,
    pub audit: AuditRecord,
}

impl ItemCommit {
    /// Sequence the new version must carry.
    pub fn next_sequence(&self) -> u32 {
        self.expected_sequence.map_or(0, |s| s + 1)
    }
}

/// Storage collaborator of the repository.
///
/// Implementations:
/// - `SqliteLibraryItemStore`: SQLite, one `BEGIN IMMEDIATE` transaction per write
/// - `MockLibraryItemStore`: in-memory, for tests and embedded use
#[async_trait]
pub trait LibraryItemStore: Send + Sync {
    async fn put_library(&self, library: &LibraryVO) -> Result<()>;

    async fn get_library(&self, name: &str) -> Result<Option<LibraryVO>>;

    /// Uid of the item of `entity_type` holding `value` for `property`.
    async fn uid_by_property(
        &self,
        entity_type: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<String>>;

    /// Increment and return the named counter. The first call returns 1.
    async fn next_counter(&self, name: &str) -> Result<u64>;

    async fn get_current(&self, entity_type: &str, uid: &str) -> Result<Option<StoredItem>>;

    /// All versions, ascending by sequence.
    async fn get_versions(&self, entity_type: &str, uid: &str) -> Result<Vec<VersionRecord>>;

    /// All audit records, ascending by `after`.
    async fn get_audit_trail(&self, entity_type: &str, uid: &str) -> Result<Vec<AuditRecord>>;

    /// Uids of all items of `entity_type`, sorted.
    async fn list_uids(&self, entity_type: &str) -> Result<Vec<String>>;

    /// Atomically append a version.
    ///
    /// Fails with `AlreadyExists` when creating an existing uid, `NotFound`
    /// when updating a missing one, `SequenceConflict` when another writer
    /// committed first and `UniqueViolation` when a unique value is held by
    /// another item.
    async fn commit(&self, commit: ItemCommit) -> Result<()>;

    /// Atomically remove an item with all its versions, unique values and
    /// audit records.
    async fn delete(&self, entity_type: &str, uid: &str, expected_sequence: u32) -> Result<()>;
}

/// Parse an RFC3339 timestamp stored as text.
pub(crate) fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(value.to_string()))
}

pub(crate) fn parse_status(value: &str) -> Result<LibraryItemStatus> {
    value.parse().map_err(StorageError::InvalidStatus)
}

/// Initialize storage based on configuration.
pub async fn init_storage(config: &StorageConfig) -> Result<Arc<dyn LibraryItemStore>> {
    match config.storage_type {
        StorageType::Memory => {
            info!("Storage: in-memory");
            Ok(Arc::new(MockLibraryItemStore::new()))
        }
        #[cfg(feature = "sqlite")]
        StorageType::Sqlite => {
            let path = config.sqlite.path.clone();
            info!("Storage: sqlite at {}", path);

            let store = (|| SqliteLibraryItemStore::open(&path))
                .retry(crate::utils::retry::connection_backoff())
                .when(crate::utils::retry::is_transient)
                .notify(|err, delay| {
                    warn!("Failed to open sqlite store: {}. Retrying in {:?}...", err, delay);
                })
                .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageType::Sqlite => {
            warn!("SQLite storage requested but 'sqlite' feature is not enabled");
            Err(StorageError::Unavailable(
                "sqlite feature not enabled".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_round_trip() {
        let now = Utc::now();
        assert_eq!(parse_timestamp(&now.to_rfc3339()).unwrap(), now);
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(StorageError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn test_parse_status_rejects_unknown() {
        assert_eq!(parse_status("Final").unwrap(), LibraryItemStatus::Final);
        assert!(matches!(
            parse_status("Archived"),
            Err(StorageError::InvalidStatus(s)) if s == "Archived"
        ));
    }

    #[test]
    fn test_version_record_carries_metadata() {
        let meta = LibraryItemMetadataVO::initial("alice", None);
        let record = VersionRecord::new(0, &meta, serde_json::json!({"name": "Aspirin"}));
        assert_eq!(record.metadata(), meta);
    }

    #[tokio::test]
    async fn test_init_memory_storage() {
        let config = StorageConfig {
            storage_type: StorageType::Memory,
            ..Default::default()
        };
        let store = init_storage(&config).await.unwrap();
        assert!(store.list_uids("compound").await.unwrap().is_empty());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_init_sqlite_storage_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mdr.db");
        let mut config = StorageConfig::default();
        config.sqlite.path = path.to_string_lossy().into_owned();

        let store = init_storage(&config).await.unwrap();
        store
            .put_library(&LibraryVO::from_repository_values("Sponsor", true))
            .await
            .unwrap();
        assert!(path.exists());
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_init_sqlite_storage_fails_fast_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = StorageConfig::default();
        config.sqlite.path = dir.path().to_string_lossy().into_owned();

        let result =
            tokio::time::timeout(std::time::Duration::from_secs(5), init_storage(&config)).await;
        assert!(matches!(result, Ok(Err(_))), "init_storage kept retrying");
    }
}
