//! Library item repository.
//!
//! Loads aggregates from the store, runs one lifecycle transition under the
//! item's lock and persists the result as a new version with its audit
//! record.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditChainError, AuditRecord, AuditTrail};
use crate::config::UidConfig;
use crate::domain::{
    LibraryItemAggregateRoot, LibraryItemMetadataVO, LibraryItemStatus, LibraryItemValue,
    LibraryVO, PropertyLookup, ValuePatch,
};
use crate::error::{Error, Result};
use crate::storage::{
    ItemCommit, LibraryItemStore, StorageError, StoredItem, UniqueValue, VersionRecord,
};
use crate::uid::{uid_generator_from_config, UidGenerator};

use super::locks::EntityLocks;

type Aggregate<V> = LibraryItemAggregateRoot<V>;

/// One persisted version of an item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot<V> {
    pub sequence: u32,
    pub value: V,
    pub item_metadata: LibraryItemMetadataVO,
}

/// One audited transition with the versions it linked.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry<V> {
    pub action: AuditAction,
    pub author_id: String,
    pub timestamp: DateTime<Utc>,
    pub before: Option<ItemSnapshot<V>>,
    pub after: ItemSnapshot<V>,
}

/// Which version of an item a point-in-time lookup resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// Newest version with this `major.minor` label.
    Version(String),
    /// Newest version with this status.
    Status(LibraryItemStatus),
    /// The version effective at this instant, `[start_date, end_date)`.
    AtDate(DateTime<Utc>),
}

impl VersionSelector {
    fn matches(&self, metadata: &LibraryItemMetadataVO) -> bool {
        match self {
            VersionSelector::Version(version) => metadata.version() == *version,
            VersionSelector::Status(status) => metadata.status == *status,
            VersionSelector::AtDate(at) => {
                metadata.start_date <= *at && metadata.end_date.map_or(true, |end| *at < end)
            }
        }
    }
}

/// Repository for library items of one value type.
///
/// Writers serialize on the [`EntityLocks`] table passed in at
/// construction. Repositories over the same store must share one table,
/// otherwise concurrent writers only meet at the store's sequence check and
/// the loser fails with `Conflict`.
pub struct LibraryItemRepository<V> {
    store: Arc<dyn LibraryItemStore>,
    uid_generator: Arc<dyn UidGenerator>,
    locks: EntityLocks,
    _value: PhantomData<fn() -> V>,
}

impl<V> Clone for LibraryItemRepository<V> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            uid_generator: self.uid_generator.clone(),
            locks: self.locks.clone(),
            _value: PhantomData,
        }
    }
}

impl<V: LibraryItemValue> LibraryItemRepository<V> {
    pub fn new(
        store: Arc<dyn LibraryItemStore>,
        uid_generator: Arc<dyn UidGenerator>,
        locks: EntityLocks,
    ) -> Self {
        Self {
            store,
            uid_generator,
            locks,
            _value: PhantomData,
        }
    }

    /// Create a repository with the uid strategy selected by configuration.
    pub fn from_config(
        config: &UidConfig,
        store: Arc<dyn LibraryItemStore>,
        locks: EntityLocks,
    ) -> Self {
        let uid_generator = uid_generator_from_config(config, store.clone());
        Self::new(store, uid_generator, locks)
    }

    pub fn locks(&self) -> &EntityLocks {
        &self.locks
    }

    pub fn store(&self) -> &Arc<dyn LibraryItemStore> {
        &self.store
    }

    /// Resolve a library by name.
    pub async fn library(&self, name: &str) -> Result<LibraryVO> {
        let library = self.store.get_library(name).await?;
        LibraryVO::from_input_values(name, |_| library)
    }

    pub async fn generate_uid(&self) -> Result<String> {
        Ok(self.uid_generator.generate(V::UID_PREFIX).await?)
    }

    /// Resolve every unique property of `value` to the uid currently
    /// holding it.
    pub async fn property_lookup(&self, value: &V) -> Result<PropertyLookup> {
        let properties = value.unique_properties();
        let holders = try_join_all(properties.iter().map(|(property, value)| {
            self.store
                .uid_by_property(V::ENTITY_TYPE, property, value)
        }))
        .await?;

        let mut lookup = PropertyLookup::new();
        for ((property, value), holder) in properties.into_iter().zip(holders) {
            if let Some(uid) = holder {
                lookup.insert(property, value, uid);
            }
        }
        Ok(lookup)
    }

    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<Aggregate<V>>> {
        match self.store.get_current(V::ENTITY_TYPE, uid).await? {
            Some(stored) => Ok(Some(self.rehydrate(stored).await?.1)),
            None => Ok(None),
        }
    }

    /// The version of `uid` picked by `selector`, rehydrated as an
    /// aggregate. `None` when the item or a matching version does not exist.
    pub async fn find_by_uid_at(
        &self,
        uid: &str,
        selector: &VersionSelector,
    ) -> Result<Option<Aggregate<V>>> {
        let Some(stored) = self.store.get_current(V::ENTITY_TYPE, uid).await? else {
            return Ok(None);
        };
        let versions = self.store.get_versions(V::ENTITY_TYPE, uid).await?;
        let Some(record) = versions
            .into_iter()
            .rev()
            .find(|record| selector.matches(&record.metadata()))
        else {
            return Ok(None);
        };

        let library = self.library(&stored.library_name).await?;
        let snapshot: ItemSnapshot<V> = snapshot(record)?;
        Ok(Some(Aggregate::from_repository_values(
            stored.uid,
            snapshot.value,
            library,
            snapshot.item_metadata,
        )))
    }

    pub async fn get(&self, uid: &str) -> Result<Aggregate<V>> {
        self.find_by_uid(uid)
            .await?
            .ok_or_else(|| Error::not_found(V::DISPLAY_NAME, uid))
    }

    /// All items of this type, ordered by uid.
    pub async fn list(&self) -> Result<Vec<Aggregate<V>>> {
        let uids = self.store.list_uids(V::ENTITY_TYPE).await?;
        let items = try_join_all(uids.iter().map(|uid| self.find_by_uid(uid))).await?;
        // An item deleted between listing and loading is skipped.
        Ok(items.into_iter().flatten().collect())
    }

    /// Persist a freshly created aggregate as version 0.
    #[tracing::instrument(name = "library_item.create", skip_all, fields(entity_type = V::ENTITY_TYPE, uid = %item.uid()))]
    pub async fn create(&self, item: &Aggregate<V>) -> Result<()> {
        let metadata = item.item_metadata();
        metadata.check_invariants().map_err(Error::BusinessLogic)?;
        let commit = ItemCommit {
            entity_type: V::ENTITY_TYPE.to_string(),
            uid: item.uid().to_string(),
            library_name: item.library().name.clone(),
            expected_sequence: None,
            version: VersionRecord::new(0, metadata, to_json(item.value())?),
            unique_values: unique_values(item.value()),
            audit: AuditRecord::create(
                V::ENTITY_TYPE,
                item.uid(),
                &metadata.author_id,
                metadata.start_date,
            ),
        };
        self.commit(commit).await?;
        info!(version = %item.version(), "Created library item");
        Ok(())
    }

    /// Validate `value`, allocate a uid and persist a DRAFT 0.1.
    pub async fn create_from_input(
        &self,
        author_id: &str,
        library_name: &str,
        value: V,
    ) -> Result<Aggregate<V>> {
        let library = self.library(library_name).await?;
        let lookup = self.property_lookup(&value).await?;
        let uid = self.generate_uid().await?;
        let item = Aggregate::from_input_values(
            author_id,
            value,
            library,
            None,
            || uid,
            &lookup.as_callback(),
        )?;
        self.create(&item).await?;
        Ok(item)
    }

    /// Apply `operation` to the current state of `uid` and persist the
    /// result.
    ///
    /// Runs under the item's lock. Nothing is written when the operation
    /// fails or leaves the aggregate unchanged.
    #[tracing::instrument(name = "library_item.update", skip_all, fields(entity_type = V::ENTITY_TYPE, uid = %uid))]
    pub async fn update<F>(&self, uid: &str, operation: F) -> Result<Aggregate<V>>
    where
        F: FnOnce(&mut Aggregate<V>) -> Result<()> + Send,
    {
        let _guard = self.locks.acquire(V::ENTITY_TYPE, uid).await;
        let (sequence, current) = self.load(uid).await?;

        let mut item = current.clone();
        if let Err(e) = operation(&mut item) {
            warn!(error = %e, "Transition rejected");
            return Err(e);
        }
        self.commit_transition(sequence, &current, item).await
    }

    pub async fn edit_draft(
        &self,
        uid: &str,
        author_id: &str,
        change_description: &str,
        value: V,
    ) -> Result<Aggregate<V>> {
        let lookup = self.property_lookup(&value).await?;
        self.update(uid, move |item| {
            item.edit_draft(author_id, change_description, value, &lookup.as_callback())
                .map(|_| ())
        })
        .await
    }

    /// Merge `patch` into the current value and edit the draft with the
    /// result. An empty patch is a no-op.
    #[tracing::instrument(name = "library_item.patch_draft", skip_all, fields(entity_type = V::ENTITY_TYPE, uid = %uid))]
    pub async fn patch_draft<P>(
        &self,
        uid: &str,
        author_id: &str,
        change_description: &str,
        patch: P,
    ) -> Result<Aggregate<V>>
    where
        P: ValuePatch<V> + Send,
    {
        let _guard = self.locks.acquire(V::ENTITY_TYPE, uid).await;
        let (sequence, current) = self.load(uid).await?;

        let merged = patch.merge(current.value());
        let lookup = self.property_lookup(&merged).await?;
        let mut item = current.clone();
        if let Err(e) = item.edit_draft(author_id, change_description, merged, &lookup.as_callback()) {
            warn!(error = %e, "Transition rejected");
            return Err(e);
        }
        self.commit_transition(sequence, &current, item).await
    }

    pub async fn approve(&self, uid: &str, author_id: &str) -> Result<Aggregate<V>> {
        self.update(uid, |item| item.approve(author_id)).await
    }

    pub async fn create_new_version(&self, uid: &str, author_id: &str) -> Result<Aggregate<V>> {
        self.update(uid, |item| item.create_new_version(author_id))
            .await
    }

    pub async fn inactivate(&self, uid: &str, author_id: &str) -> Result<Aggregate<V>> {
        self.update(uid, |item| item.inactivate(author_id)).await
    }

    pub async fn reactivate(&self, uid: &str, author_id: &str) -> Result<Aggregate<V>> {
        self.update(uid, |item| item.reactivate(author_id)).await
    }

    /// Remove a never approved draft with its whole history.
    #[tracing::instrument(name = "library_item.delete", skip_all, fields(entity_type = V::ENTITY_TYPE, uid = %uid))]
    pub async fn delete(&self, uid: &str) -> Result<()> {
        let _guard = self.locks.acquire(V::ENTITY_TYPE, uid).await;
        let (sequence, item) = self.load(uid).await?;
        if let Err(e) = item.ensure_deletable() {
            warn!(error = %e, "Delete rejected");
            return Err(e);
        }
        self.store
            .delete(V::ENTITY_TYPE, uid, sequence)
            .await
            .map_err(|e| self.map_storage_error(uid, e))?;
        info!("Deleted library item");
        Ok(())
    }

    /// All versions of an item, oldest first.
    pub async fn versions(&self, uid: &str) -> Result<Vec<ItemSnapshot<V>>> {
        let records = self.store.get_versions(V::ENTITY_TYPE, uid).await?;
        if records.is_empty() {
            return Err(Error::not_found(V::DISPLAY_NAME, uid));
        }
        records.into_iter().map(snapshot).collect()
    }

    /// The audited history of an item, oldest first.
    ///
    /// Fails when the stored audit chain is malformed.
    pub async fn history(&self, uid: &str) -> Result<Vec<HistoryEntry<V>>> {
        let records = self.store.get_audit_trail(V::ENTITY_TYPE, uid).await?;
        if records.is_empty() {
            return Err(Error::not_found(V::DISPLAY_NAME, uid));
        }
        AuditTrail::new(&records)
            .verify()
            .map_err(StorageError::from)?;

        let versions: HashMap<u32, ItemSnapshot<V>> = self
            .versions(uid)
            .await?
            .into_iter()
            .map(|s| (s.sequence, s))
            .collect();
        let version_at = |sequence: u32| {
            versions.get(&sequence).cloned().ok_or_else(|| {
                StorageError::CorruptAuditTrail(AuditChainError::MissingVersion(sequence))
            })
        };

        let mut history = Vec::with_capacity(records.len());
        for record in records {
            let before = record.before.map(version_at).transpose()?;
            let after = version_at(record.after)?;
            history.push(HistoryEntry {
                action: record.action,
                author_id: record.author_id,
                timestamp: record.timestamp,
                before,
                after,
            });
        }
        Ok(history)
    }

    async fn load(&self, uid: &str) -> Result<(u32, Aggregate<V>)> {
        let stored = self
            .store
            .get_current(V::ENTITY_TYPE, uid)
            .await?
            .ok_or_else(|| Error::not_found(V::DISPLAY_NAME, uid))?;
        debug!(sequence = stored.current.sequence, "Loaded library item");
        self.rehydrate(stored).await
    }

    async fn rehydrate(&self, stored: StoredItem) -> Result<(u32, Aggregate<V>)> {
        let library = self.library(&stored.library_name).await?;
        let sequence = stored.current.sequence;
        let item_metadata = stored.current.metadata();
        let value: V = from_json(stored.current.value)?;
        Ok((
            sequence,
            Aggregate::from_repository_values(stored.uid, value, library, item_metadata),
        ))
    }

    async fn commit_transition(
        &self,
        sequence: u32,
        current: &Aggregate<V>,
        item: Aggregate<V>,
    ) -> Result<Aggregate<V>> {
        if &item == current {
            debug!("No change, nothing to persist");
            return Ok(item);
        }

        let metadata = item.item_metadata();
        metadata.check_invariants().map_err(Error::BusinessLogic)?;
        current
            .item_metadata()
            .closed(metadata.start_date)
            .check_invariants()
            .map_err(Error::BusinessLogic)?;

        let commit = ItemCommit {
            entity_type: V::ENTITY_TYPE.to_string(),
            uid: item.uid().to_string(),
            library_name: item.library().name.clone(),
            expected_sequence: Some(sequence),
            version: VersionRecord::new(sequence + 1, metadata, to_json(item.value())?),
            unique_values: unique_values(item.value()),
            audit: AuditRecord::edit(
                V::ENTITY_TYPE,
                item.uid(),
                &metadata.author_id,
                metadata.start_date,
                sequence,
            ),
        };
        self.commit(commit).await?;
        info!(
            status = %item.status(),
            version = %item.version(),
            "Committed library item transition"
        );
        Ok(item)
    }

    async fn commit(&self, commit: ItemCommit) -> Result<()> {
        let uid = commit.uid.clone();
        self.store
            .commit(commit)
            .await
            .map_err(|e| self.map_storage_error(&uid, e))
    }

    fn map_storage_error(&self, uid: &str, error: StorageError) -> Error {
        match error {
            StorageError::UniqueViolation {
                property, value, ..
            } => Error::already_exists(V::DISPLAY_NAME, property, value),
            StorageError::NotFound { .. } => Error::not_found(V::DISPLAY_NAME, uid),
            other => Error::Storage(other),
        }
    }
}

fn unique_values<V: LibraryItemValue>(value: &V) -> Vec<UniqueValue> {
    value
        .unique_properties()
        .into_iter()
        .map(|(property, value)| UniqueValue::new(property, value))
        .collect()
}

fn to_json<V: LibraryItemValue>(value: &V) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value).map_err(StorageError::from)?)
}

fn from_json<V: LibraryItemValue>(value: serde_json::Value) -> Result<V> {
    Ok(serde_json::from_value(value).map_err(StorageError::from)?)
}

fn snapshot<V: LibraryItemValue>(record: VersionRecord) -> Result<ItemSnapshot<V>> {
    let item_metadata = record.metadata();
    Ok(ItemSnapshot {
        sequence: record.sequence,
        value: from_json(record.value)?,
        item_metadata,
    })
}
