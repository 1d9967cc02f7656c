//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter. Lifecycle operations
//! are never retried; only opening the store is.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::storage::StorageError;

/// Backoff for storage connection retries at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn connection_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// SQLite primary result codes for a database held by another writer.
#[cfg(feature = "sqlite")]
const SQLITE_BUSY: i32 = 5;
#[cfg(feature = "sqlite")]
const SQLITE_LOCKED: i32 = 6;

/// Determines if a storage error may go away on its own.
///
/// Retryable:
/// - pool exhaustion (`PoolTimedOut`, `PoolClosed`)
/// - SQLITE_BUSY / SQLITE_LOCKED, including their extended codes
///
/// Non-retryable: everything else, including files that cannot be opened,
/// permission errors, domain errors and malformed stored data.
pub fn is_transient(err: &StorageError) -> bool {
    match err {
        #[cfg(feature = "sqlite")]
        StorageError::Database(e) => match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => true,
            sqlx::Error::Database(db) => db
                .code()
                .and_then(|code| code.parse::<i32>().ok())
                .map(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
                .unwrap_or(false),
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_storage_errors_are_not_transient() {
        assert!(!is_transient(&StorageError::SequenceConflict {
            expected: 1,
            actual: 2
        }));
        assert!(!is_transient(&StorageError::NotFound {
            entity_type: "compound".to_string(),
            uid: "Compound_000001".to_string(),
        }));
        assert!(!is_transient(&StorageError::InvalidStatus("x".to_string())));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_only_pool_exhaustion_is_transient_without_a_code() {
        assert!(is_transient(&StorageError::Database(sqlx::Error::PoolTimedOut)));
        assert!(is_transient(&StorageError::Database(sqlx::Error::PoolClosed)));
        assert!(!is_transient(&StorageError::Database(sqlx::Error::RowNotFound)));
        assert!(!is_transient(&StorageError::Database(sqlx::Error::Io(
            std::io::Error::from(std::io::ErrorKind::PermissionDenied)
        ))));
    }

    #[cfg(feature = "sqlite")]
    #[tokio::test]
    async fn test_unopenable_database_is_not_transient() {
        use crate::storage::SqliteLibraryItemStore;

        // A directory cannot be opened as a database file (SQLITE_CANTOPEN).
        let dir = tempfile::tempdir().unwrap();
        let err = match SqliteLibraryItemStore::open(&dir.path().to_string_lossy()).await {
            Ok(_) => panic!("opening a directory should fail"),
            Err(e) => e,
        };
        assert!(!is_transient(&err), "unexpected retryable error: {err}");
    }
}
