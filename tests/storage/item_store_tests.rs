//! LibraryItemStore interface tests.
//!
//! These tests verify the contract of the LibraryItemStore trait.
//! Each storage implementation should run these tests.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use clinical_mdr::audit::{AuditAction, AuditRecord, AuditTrail};
use clinical_mdr::domain::{LibraryItemMetadataVO, LibraryItemStatus, LibraryVO};
use clinical_mdr::storage::{ItemCommit, LibraryItemStore, StorageError, UniqueValue, VersionRecord};

pub const ENTITY_TYPE: &str = "test_item";

fn at(sequence: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::seconds(i64::from(sequence))
}

/// Version `sequence` of a draft, minor version `sequence + 1`.
pub fn make_version(sequence: u32, name: &str) -> VersionRecord {
    let metadata = LibraryItemMetadataVO::from_repository_values(
        LibraryItemStatus::Draft,
        0,
        sequence + 1,
        "tester",
        format!("change {sequence}"),
        at(sequence),
        None,
    );
    VersionRecord::new(sequence, &metadata, json!({ "name": name }))
}

/// Commit of version `expected + 1` (or 0 when creating) with `name` as its
/// only unique value.
pub fn make_commit(uid: &str, expected: Option<u32>, name: &str) -> ItemCommit {
    let sequence = expected.map_or(0, |s| s + 1);
    let audit = match expected {
        None => AuditRecord::create(ENTITY_TYPE, uid, "tester", at(0)),
        Some(before) => AuditRecord::edit(ENTITY_TYPE, uid, "tester", at(sequence), before),
    };
    ItemCommit {
        entity_type: ENTITY_TYPE.to_string(),
        uid: uid.to_string(),
        library_name: "Sponsor".to_string(),
        expected_sequence: expected,
        version: make_version(sequence, name),
        unique_values: vec![UniqueValue::new("name", name)],
        audit,
    }
}

// =============================================================================
// Library tests
// =============================================================================

pub async fn test_library_round_trip<S: LibraryItemStore>(store: &S) {
    assert!(store
        .get_library("test_lib_missing")
        .await
        .expect("get_library should succeed")
        .is_none());

    store
        .put_library(&LibraryVO::from_repository_values("test_lib", true))
        .await
        .expect("put_library should succeed");
    store
        .put_library(&LibraryVO::from_repository_values("test_lib", false))
        .await
        .expect("put_library should overwrite");

    let library = store
        .get_library("test_lib")
        .await
        .expect("get_library should succeed")
        .expect("library should exist");
    assert!(!library.is_editable, "second put should win");
}

// =============================================================================
// Commit tests
// =============================================================================

pub async fn test_create_and_read_back<S: LibraryItemStore>(store: &S) {
    let uid = "test_create_0001";
    store
        .commit(make_commit(uid, None, "test create"))
        .await
        .expect("create should succeed");

    let current = store
        .get_current(ENTITY_TYPE, uid)
        .await
        .expect("get_current should succeed")
        .expect("item should exist");
    assert_eq!(current.uid, uid);
    assert_eq!(current.library_name, "Sponsor");
    assert_eq!(current.current, make_version(0, "test create"));
    assert_eq!(current.current.value, json!({ "name": "test create" }));

    let trail = store
        .get_audit_trail(ENTITY_TYPE, uid)
        .await
        .expect("get_audit_trail should succeed");
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Create);
}

pub async fn test_create_existing_uid_fails<S: LibraryItemStore>(store: &S) {
    let uid = "test_dup_0001";
    store
        .commit(make_commit(uid, None, "test dup a"))
        .await
        .expect("first create should succeed");

    let result = store.commit(make_commit(uid, None, "test dup b")).await;
    assert!(
        matches!(result, Err(StorageError::AlreadyExists { .. })),
        "second create should fail, got {result:?}"
    );
}

pub async fn test_update_missing_fails<S: LibraryItemStore>(store: &S) {
    let result = store
        .commit(make_commit("test_missing_0001", Some(0), "test missing"))
        .await;
    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "update of missing item should fail, got {result:?}"
    );
}

pub async fn test_versions_append_and_close<S: LibraryItemStore>(store: &S) {
    let uid = "test_append_0001";
    store
        .commit(make_commit(uid, None, "test append"))
        .await
        .expect("create should succeed");
    for before in 0..3 {
        store
            .commit(make_commit(uid, Some(before), "test append"))
            .await
            .expect("edit should succeed");
    }

    let versions = store
        .get_versions(ENTITY_TYPE, uid)
        .await
        .expect("get_versions should succeed");
    let sequences: Vec<u32> = versions.iter().map(|v| v.sequence).collect();
    assert_eq!(sequences, [0, 1, 2, 3]);

    for pair in versions.windows(2) {
        assert_eq!(
            pair[0].end_date,
            Some(pair[1].start_date),
            "version {} should close when {} starts",
            pair[0].sequence,
            pair[1].sequence
        );
    }
    assert_eq!(versions[3].end_date, None, "current version stays open");

    let trail = store
        .get_audit_trail(ENTITY_TYPE, uid)
        .await
        .expect("get_audit_trail should succeed");
    AuditTrail::new(&trail)
        .verify()
        .expect("stored chain should verify");
    assert_eq!(AuditTrail::new(&trail).head(), Some(3));
}

pub async fn test_stale_sequence_conflicts<S: LibraryItemStore>(store: &S) {
    let uid = "test_stale_0001";
    store
        .commit(make_commit(uid, None, "test stale"))
        .await
        .expect("create should succeed");
    store
        .commit(make_commit(uid, Some(0), "test stale"))
        .await
        .expect("first writer should succeed");

    let result = store.commit(make_commit(uid, Some(0), "test stale b")).await;
    assert!(
        matches!(
            result,
            Err(StorageError::SequenceConflict {
                expected: 0,
                actual: 1
            })
        ),
        "second writer should conflict, got {result:?}"
    );

    let versions = store
        .get_versions(ENTITY_TYPE, uid)
        .await
        .expect("get_versions should succeed");
    assert_eq!(versions.len(), 2, "losing writer must not append");
    assert_eq!(
        store
            .uid_by_property(ENTITY_TYPE, "name", "test stale b")
            .await
            .expect("uid_by_property should succeed"),
        None
    );
}

pub async fn test_version_sequence_must_follow<S: LibraryItemStore>(store: &S) {
    let uid = "test_gap_0001";
    store
        .commit(make_commit(uid, None, "test gap"))
        .await
        .expect("create should succeed");

    let mut commit = make_commit(uid, Some(0), "test gap");
    commit.version.sequence = 5;
    let result = store.commit(commit).await;
    assert!(
        matches!(result, Err(StorageError::SequenceConflict { .. })),
        "gap in sequence should fail, got {result:?}"
    );
}

// =============================================================================
// Uniqueness tests
// =============================================================================

pub async fn test_unique_values_are_enforced<S: LibraryItemStore>(store: &S) {
    store
        .commit(make_commit("test_unique_0001", None, "test unique"))
        .await
        .expect("create should succeed");

    let result = store
        .commit(make_commit("test_unique_0002", None, "test unique"))
        .await;
    match result {
        Err(StorageError::UniqueViolation {
            property,
            value,
            existing_uid,
            ..
        }) => {
            assert_eq!(property, "name");
            assert_eq!(value, "test unique");
            assert_eq!(existing_uid, "test_unique_0001");
        }
        other => panic!("expected UniqueViolation, got {other:?}"),
    }
    assert!(
        store
            .get_current(ENTITY_TYPE, "test_unique_0002")
            .await
            .expect("get_current should succeed")
            .is_none(),
        "rejected create must leave nothing behind"
    );

    // The holder itself may keep its value.
    store
        .commit(make_commit("test_unique_0001", Some(0), "test unique"))
        .await
        .expect("holder should keep its own value");
}

pub async fn test_unique_values_released_on_change<S: LibraryItemStore>(store: &S) {
    let uid = "test_release_0001";
    store
        .commit(make_commit(uid, None, "test release old"))
        .await
        .expect("create should succeed");
    store
        .commit(make_commit(uid, Some(0), "test release new"))
        .await
        .expect("rename should succeed");

    assert_eq!(
        store
            .uid_by_property(ENTITY_TYPE, "name", "test release old")
            .await
            .expect("uid_by_property should succeed"),
        None
    );
    assert_eq!(
        store
            .uid_by_property(ENTITY_TYPE, "name", "test release new")
            .await
            .expect("uid_by_property should succeed")
            .as_deref(),
        Some(uid)
    );
    // Uniqueness is scoped by entity type.
    assert_eq!(
        store
            .uid_by_property("test_other", "name", "test release new")
            .await
            .expect("uid_by_property should succeed"),
        None
    );
}

// =============================================================================
// Delete tests
// =============================================================================

pub async fn test_delete_removes_everything<S: LibraryItemStore>(store: &S) {
    let uid = "test_delete_0001";
    store
        .commit(make_commit(uid, None, "test delete"))
        .await
        .expect("create should succeed");

    let result = store.delete(ENTITY_TYPE, uid, 3).await;
    assert!(
        matches!(result, Err(StorageError::SequenceConflict { .. })),
        "stale delete should conflict, got {result:?}"
    );

    store
        .delete(ENTITY_TYPE, uid, 0)
        .await
        .expect("delete should succeed");

    assert!(store
        .get_current(ENTITY_TYPE, uid)
        .await
        .expect("get_current should succeed")
        .is_none());
    assert!(store
        .get_versions(ENTITY_TYPE, uid)
        .await
        .expect("get_versions should succeed")
        .is_empty());
    assert!(store
        .get_audit_trail(ENTITY_TYPE, uid)
        .await
        .expect("get_audit_trail should succeed")
        .is_empty());
    assert_eq!(
        store
            .uid_by_property(ENTITY_TYPE, "name", "test delete")
            .await
            .expect("uid_by_property should succeed"),
        None
    );

    let result = store.delete(ENTITY_TYPE, uid, 0).await;
    assert!(
        matches!(result, Err(StorageError::NotFound { .. })),
        "second delete should fail, got {result:?}"
    );
}

// =============================================================================
// Counter and listing tests
// =============================================================================

pub async fn test_counters_are_monotonic<S: LibraryItemStore>(store: &S) {
    assert_eq!(store.next_counter("test_counter_a").await.unwrap(), 1);
    assert_eq!(store.next_counter("test_counter_a").await.unwrap(), 2);
    assert_eq!(store.next_counter("test_counter_b").await.unwrap(), 1);
    assert_eq!(store.next_counter("test_counter_a").await.unwrap(), 3);
}

pub async fn test_list_uids_sorted<S: LibraryItemStore>(store: &S) {
    let entity_type = "test_listed";
    for uid in ["test_list_0003", "test_list_0001", "test_list_0002"] {
        let mut commit = make_commit(uid, None, uid);
        commit.entity_type = entity_type.to_string();
        commit.audit.entity_type = entity_type.to_string();
        store.commit(commit).await.expect("create should succeed");
    }

    let uids = store
        .list_uids(entity_type)
        .await
        .expect("list_uids should succeed");
    assert_eq!(uids, ["test_list_0001", "test_list_0002", "test_list_0003"]);
}

// =============================================================================
// Test runner macro
// =============================================================================

/// Run all LibraryItemStore interface tests against a store implementation.
#[macro_export]
macro_rules! run_item_store_tests {
    ($store:expr) => {
        use $crate::storage::item_store_tests::*;

        test_library_round_trip($store).await;
        println!("  test_library_round_trip: PASSED");

        // commit tests
        test_create_and_read_back($store).await;
        println!("  test_create_and_read_back: PASSED");

        test_create_existing_uid_fails($store).await;
        println!("  test_create_existing_uid_fails: PASSED");

        test_update_missing_fails($store).await;
        println!("  test_update_missing_fails: PASSED");

        test_versions_append_and_close($store).await;
        println!("  test_versions_append_and_close: PASSED");

        test_stale_sequence_conflicts($store).await;
        println!("  test_stale_sequence_conflicts: PASSED");

        test_version_sequence_must_follow($store).await;
        println!("  test_version_sequence_must_follow: PASSED");

        // uniqueness tests
        test_unique_values_are_enforced($store).await;
        println!("  test_unique_values_are_enforced: PASSED");

        test_unique_values_released_on_change($store).await;
        println!("  test_unique_values_released_on_change: PASSED");

        // delete tests
        test_delete_removes_everything($store).await;
        println!("  test_delete_removes_everything: PASSED");

        // counters and listing
        test_counters_are_monotonic($store).await;
        println!("  test_counters_are_monotonic: PASSED");

        test_list_uids_sorted($store).await;
        println!("  test_list_uids_sorted: PASSED");
    };
}
