//! In-memory LibraryItemStore.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::audit::AuditRecord;
use crate::domain::LibraryVO;
use crate::storage::{
    ItemCommit, LibraryItemStore, Result, StorageError, StoredItem, UniqueValue, VersionRecord,
};

type ItemKey = (String, String);
type UniqueKey = (String, String, String);

struct ItemRow {
    library_name: String,
    versions: Vec<VersionRecord>,
    audit: Vec<AuditRecord>,
    unique_values: Vec<UniqueValue>,
}

#[derive(Default)]
struct State {
    libraries: HashMap<String, LibraryVO>,
    // BTreeMap keeps list_uids sorted.
    items: BTreeMap<ItemKey, ItemRow>,
    unique_values: HashMap<UniqueKey, String>,
    counters: HashMap<String, u64>,
}

impl State {
    fn check_expected(&self, entity_type: &str, uid: &str, expected: Option<u32>) -> Result<()> {
        let current = self
            .items
            .get(&(entity_type.to_string(), uid.to_string()))
            .and_then(|row| row.versions.last())
            .map(|v| v.sequence);

        match (expected, current) {
            (None, None) => Ok(()),
            (None, Some(_)) => Err(StorageError::AlreadyExists {
                entity_type: entity_type.to_string(),
                uid: uid.to_string(),
            }),
            (Some(_), None) => Err(StorageError::NotFound {
                entity_type: entity_type.to_string(),
                uid: uid.to_string(),
            }),
            (Some(expected), Some(actual)) if expected != actual => {
                Err(StorageError::SequenceConflict { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn release_unique_values(&mut self, entity_type: &str, values: &[UniqueValue]) {
        for unique in values {
            self.unique_values.remove(&(
                entity_type.to_string(),
                unique.property.clone(),
                unique.value.clone(),
            ));
        }
    }
}

/// Mock store keeping every table in memory.
///
/// A single write guard is held for the whole of each commit, which makes
/// commits atomic and serialized.
#[derive(Default)]
pub struct MockLibraryItemStore {
    state: RwLock<State>,
    fail_on_commit: RwLock<bool>,
}

impl MockLibraryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail before writing anything.
    pub async fn set_fail_on_commit(&self, fail: bool) {
        *self.fail_on_commit.write().await = fail;
    }

    /// Number of items of `entity_type`.
    pub async fn item_count(&self, entity_type: &str) -> usize {
        self.state
            .read()
            .await
            .items
            .keys()
            .filter(|(et, _)| et == entity_type)
            .count()
    }
}

#[async_trait]
impl LibraryItemStore for MockLibraryItemStore {
    async fn put_library(&self, library: &LibraryVO) -> Result<()> {
        self.state
            .write()
            .await
            .libraries
            .insert(library.name.clone(), library.clone());
        Ok(())
    }

    async fn get_library(&self, name: &str) -> Result<Option<LibraryVO>> {
        Ok(self.state.read().await.libraries.get(name).cloned())
    }

    async fn uid_by_property(
        &self,
        entity_type: &str,
        property: &str,
        value: &str,
    ) -> Result<Option<String>> {
        let key = (
            entity_type.to_string(),
            property.to_string(),
            value.to_string(),
        );
        Ok(self.state.read().await.unique_values.get(&key).cloned())
    }

    async fn next_counter(&self, name: &str) -> Result<u64> {
        let mut state = self.state.write().await;
        let counter = state.counters.entry(name.to_string()).or_insert(0);
        *counter += 1;
        Ok(*counter)
    }

    async fn get_current(&self, entity_type: &str, uid: &str) -> Result<Option<StoredItem>> {
        let state = self.state.read().await;
        let key = (entity_type.to_string(), uid.to_string());
        Ok(state.items.get(&key).and_then(|row| {
            row.versions.last().map(|current| StoredItem {
                entity_type: entity_type.to_string(),
                uid: uid.to_string(),
                library_name: row.library_name.clone(),
                current: current.clone(),
            })
        }))
    }

    async fn get_versions(&self, entity_type: &str, uid: &str) -> Result<Vec<VersionRecord>> {
        let state = self.state.read().await;
        let key = (entity_type.to_string(), uid.to_string());
        Ok(state
            .items
            .get(&key)
            .map(|row| row.versions.clone())
            .unwrap_or_default())
    }

    async fn get_audit_trail(&self, entity_type: &str, uid: &str) -> Result<Vec<AuditRecord>> {
        let state = self.state.read().await;
        let key = (entity_type.to_string(), uid.to_string());
        Ok(state
            .items
            .get(&key)
            .map(|row| row.audit.clone())
            .unwrap_or_default())
    }

    async fn list_uids(&self, entity_type: &str) -> Result<Vec<String>> {
        let state = self.state.read().await;
        Ok(state
            .items
            .keys()
            .filter(|(et, _)| et == entity_type)
            .map(|(_, uid)| uid.clone())
            .collect())
    }

    async fn commit(&self, commit: ItemCommit) -> Result<()> {
        if *self.fail_on_commit.read().await {
            return Err(StorageError::Unavailable(
                "mock store configured to fail".to_string(),
            ));
        }

        let mut state = self.state.write().await;
        let entity_type = commit.entity_type.as_str();
        let uid = commit.uid.as_str();

        state.check_expected(entity_type, uid, commit.expected_sequence)?;

        let next = commit.next_sequence();
        if commit.version.sequence != next {
            return Err(StorageError::SequenceConflict {
                expected: next,
                actual: commit.version.sequence,
            });
        }

        for unique in &commit.unique_values {
            let key = (
                entity_type.to_string(),
                unique.property.clone(),
                unique.value.clone(),
            );
            if let Some(holder) = state.unique_values.get(&key) {
                if holder != uid {
                    return Err(StorageError::UniqueViolation {
                        entity_type: entity_type.to_string(),
                        property: unique.property.clone(),
                        value: unique.value.clone(),
                        existing_uid: holder.clone(),
                    });
                }
            }
        }

        // All checks passed; nothing below can fail.
        let key = (entity_type.to_string(), uid.to_string());
        let previous_unique = state
            .items
            .get(&key)
            .map(|row| row.unique_values.clone())
            .unwrap_or_default();
        state.release_unique_values(entity_type, &previous_unique);
        for unique in &commit.unique_values {
            state.unique_values.insert(
                (
                    entity_type.to_string(),
                    unique.property.clone(),
                    unique.value.clone(),
                ),
                uid.to_string(),
            );
        }

        let row = state.items.entry(key).or_insert_with(|| ItemRow {
            library_name: commit.library_name.clone(),
            versions: Vec::new(),
            audit: Vec::new(),
            unique_values: Vec::new(),
        });
        if let Some(previous) = row.versions.last_mut() {
            previous.end_date = Some(commit.version.start_date);
        }
        row.versions.push(commit.version);
        row.audit.push(commit.audit);
        row.unique_values = commit.unique_values;

        Ok(())
    }

    async fn delete(&self, entity_type: &str, uid: &str, expected_sequence: u32) -> Result<()> {
        let mut state = self.state.write().await;
        state.check_expected(entity_type, uid, Some(expected_sequence))?;

        let key = (entity_type.to_string(), uid.to_string());
        if let Some(row) = state.items.remove(&key) {
            state.release_unique_values(entity_type, &row.unique_values);
        }
        Ok(())
    }
}
