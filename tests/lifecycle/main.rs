//! Lifecycle scenarios using cucumber-rs (Gherkin).
//!
//! Every scenario runs through `LibraryItemRepository` against the
//! in-memory store.

use std::collections::HashMap;
use std::sync::Arc;

use cucumber::{given, then, when, World};

use clinical_mdr::audit::AuditTrail;
use clinical_mdr::domain::{CTTermNameVO, CompoundVO, LibraryItemValue, LibraryVO};
use clinical_mdr::repository::{EntityLocks, LibraryItemRepository};
use clinical_mdr::storage::{LibraryItemStore, MockLibraryItemStore};
use clinical_mdr::uid::CounterUidGenerator;
use clinical_mdr::Error;

/// Test world containing all test state.
#[derive(World)]
#[world(init = Self::new)]
pub struct LifecycleWorld {
    store: Arc<MockLibraryItemStore>,
    compounds: LibraryItemRepository<CompoundVO>,
    terms: LibraryItemRepository<CTTermNameVO>,
    /// Uids by the name an item was created with.
    uids: HashMap<String, String>,
    /// Uid of the item the last step acted on.
    current: Option<String>,
    /// Error of the last rejected request.
    last_error: Option<Error>,
}

impl std::fmt::Debug for LifecycleWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleWorld")
            .field("uids", &self.uids)
            .field("current", &self.current)
            .field("last_error", &self.last_error)
            .finish()
    }
}

impl LifecycleWorld {
    async fn new() -> Self {
        let store = Arc::new(MockLibraryItemStore::new());
        let dyn_store: Arc<dyn LibraryItemStore> = store.clone();
        let uid_generator = Arc::new(CounterUidGenerator::new(dyn_store.clone(), 6));
        let locks = EntityLocks::new();

        Self {
            store,
            compounds: LibraryItemRepository::new(
                dyn_store.clone(),
                uid_generator.clone(),
                locks.clone(),
            ),
            terms: LibraryItemRepository::new(dyn_store, uid_generator, locks),
            uids: HashMap::new(),
            current: None,
            last_error: None,
        }
    }

    fn current_uid(&self) -> String {
        self.current.clone().expect("no item selected")
    }

    fn record<T>(&mut self, result: clinical_mdr::Result<T>) -> Option<T> {
        match result {
            Ok(value) => {
                self.last_error = None;
                Some(value)
            }
            Err(e) => {
                self.last_error = Some(e);
                None
            }
        }
    }

    fn remember(&mut self, name: &str, uid: &str) {
        self.uids.insert(name.to_string(), uid.to_string());
        self.current = Some(uid.to_string());
    }
}

fn parse_actions(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Libraries

#[given(expr = "an editable library {string}")]
async fn given_editable_library(world: &mut LifecycleWorld, name: String) {
    world
        .store
        .put_library(&LibraryVO::from_repository_values(name, true))
        .await
        .unwrap();
}

#[given(expr = "a locked library {string}")]
async fn given_locked_library(world: &mut LifecycleWorld, name: String) {
    world
        .store
        .put_library(&LibraryVO::from_repository_values(name, false))
        .await
        .unwrap();
}

#[given(expr = "the library {string} is locked")]
async fn given_library_locked(world: &mut LifecycleWorld, name: String) {
    world
        .store
        .put_library(&LibraryVO::from_repository_values(name, false))
        .await
        .unwrap();
}

// Compounds

#[given(expr = "a compound {string} created by {string} in library {string}")]
async fn given_compound(world: &mut LifecycleWorld, name: String, author: String, library: String) {
    let item = world
        .compounds
        .create_from_input(&author, &library, CompoundVO::named(name.as_str()))
        .await
        .expect("compound should be created");
    world.remember(&name, item.uid());
}

#[when(expr = "{string} creates a compound {string} in library {string}")]
async fn when_create_compound(world: &mut LifecycleWorld, author: String, name: String, library: String) {
    let result = world
        .compounds
        .create_from_input(&author, &library, CompoundVO::named(name.as_str()))
        .await;
    if let Some(item) = world.record(result) {
        world.remember(&name, item.uid());
    }
}

#[when(expr = "{string} creates a compound {string} with external id {string} in library {string}")]
async fn when_create_compound_with_external_id(
    world: &mut LifecycleWorld,
    author: String,
    name: String,
    external_id: String,
    library: String,
) {
    let value = CompoundVO {
        external_id: Some(external_id),
        ..CompoundVO::named(name.as_str())
    };
    let result = world.compounds.create_from_input(&author, &library, value).await;
    if let Some(item) = world.record(result) {
        world.remember(&name, item.uid());
    }
}

#[when(expr = "{string} renames the compound to {string}")]
async fn when_rename_compound(world: &mut LifecycleWorld, author: String, name: String) {
    let uid = world.current_uid();
    let result = world
        .compounds
        .edit_draft(&uid, &author, "Rename", CompoundVO::named(name.as_str()))
        .await;
    world.record(result);
}

#[when(expr = "{string} selects the compound {string}")]
async fn when_select_compound(world: &mut LifecycleWorld, _author: String, name: String) {
    world.current = Some(world.uids[&name].clone());
}

#[when(expr = "{string} approves the compound")]
async fn when_approve(world: &mut LifecycleWorld, author: String) {
    let uid = world.current_uid();
    let result = world.compounds.approve(&uid, &author).await;
    world.record(result);
}

#[when(expr = "{string} creates a new version of the compound")]
async fn when_new_version(world: &mut LifecycleWorld, author: String) {
    let uid = world.current_uid();
    let result = world.compounds.create_new_version(&uid, &author).await;
    world.record(result);
}

#[when(expr = "{string} inactivates the compound")]
async fn when_inactivate(world: &mut LifecycleWorld, author: String) {
    let uid = world.current_uid();
    let result = world.compounds.inactivate(&uid, &author).await;
    world.record(result);
}

#[when(expr = "{string} reactivates the compound")]
async fn when_reactivate(world: &mut LifecycleWorld, author: String) {
    let uid = world.current_uid();
    let result = world.compounds.reactivate(&uid, &author).await;
    world.record(result);
}

#[when(expr = "{string} deletes the compound")]
async fn when_delete(world: &mut LifecycleWorld, _author: String) {
    let uid = world.current_uid();
    let result = world.compounds.delete(&uid).await;
    world.record(result);
}

#[then(expr = "the compound is {string} at version {string}")]
async fn then_compound_state(world: &mut LifecycleWorld, status: String, version: String) {
    let item = world.compounds.get(&world.current_uid()).await.unwrap();
    assert_eq!(item.status().as_str(), status);
    assert_eq!(item.version(), version);
}

#[then(expr = "the compound is named {string}")]
async fn then_compound_named(world: &mut LifecycleWorld, name: String) {
    let item = world.compounds.get(&world.current_uid()).await.unwrap();
    assert_eq!(item.name(), name);
}

#[then(expr = "the compound offers {string}")]
async fn then_compound_offers(world: &mut LifecycleWorld, actions: String) {
    let item = world.compounds.get(&world.current_uid()).await.unwrap();
    let offered: Vec<String> = item
        .possible_actions()
        .iter()
        .map(|a| a.as_str().to_string())
        .collect();
    assert_eq!(offered, parse_actions(&actions));
}

#[then("the compound offers nothing")]
async fn then_compound_offers_nothing(world: &mut LifecycleWorld) {
    let item = world.compounds.get(&world.current_uid()).await.unwrap();
    assert!(item.possible_actions().is_empty());
}

#[then(expr = "the compound has {int} versions")]
async fn then_version_count(world: &mut LifecycleWorld, count: usize) {
    let versions = world.compounds.versions(&world.current_uid()).await.unwrap();
    assert_eq!(versions.len(), count);
}

#[then(expr = "the compound audit trail has {int} records and verifies")]
async fn then_audit_trail(world: &mut LifecycleWorld, count: usize) {
    let records = world
        .store
        .get_audit_trail(CompoundVO::ENTITY_TYPE, &world.current_uid())
        .await
        .unwrap();
    assert_eq!(records.len(), count);
    AuditTrail::new(&records).verify().unwrap();

    let history = world.compounds.history(&world.current_uid()).await.unwrap();
    assert_eq!(history.len(), count);
}

#[then("the compound no longer exists")]
async fn then_compound_gone(world: &mut LifecycleWorld) {
    let found = world
        .compounds
        .find_by_uid(&world.current_uid())
        .await
        .unwrap();
    assert!(found.is_none());
}

#[then(expr = "there are {int} compounds")]
async fn then_compound_count(world: &mut LifecycleWorld, count: usize) {
    assert_eq!(world.compounds.list().await.unwrap().len(), count);
}

// Term names

#[given(expr = "a term {string} with sentence case {string} created by {string} in library {string}")]
async fn given_term(
    world: &mut LifecycleWorld,
    name: String,
    sentence_case: String,
    author: String,
    library: String,
) {
    let value = CTTermNameVO::from_repository_values(name.as_str(), sentence_case, vec![]);
    let item = world
        .terms
        .create_from_input(&author, &library, value)
        .await
        .expect("term should be created");
    world.remember(&name, item.uid());
}

#[when(expr = "{string} creates a term {string} with sentence case {string} in library {string}")]
async fn when_create_term(
    world: &mut LifecycleWorld,
    author: String,
    name: String,
    sentence_case: String,
    library: String,
) {
    let value = CTTermNameVO::from_repository_values(name.as_str(), sentence_case, vec![]);
    let result = world.terms.create_from_input(&author, &library, value).await;
    if let Some(item) = world.record(result) {
        world.remember(&name, item.uid());
    }
}

#[when(expr = "{string} approves the term")]
async fn when_approve_term(world: &mut LifecycleWorld, author: String) {
    let uid = world.current_uid();
    let result = world.terms.approve(&uid, &author).await;
    world.record(result);
}

#[when(expr = "{string} creates a new version of the term")]
async fn when_new_version_term(world: &mut LifecycleWorld, author: String) {
    let uid = world.current_uid();
    let result = world.terms.create_new_version(&uid, &author).await;
    world.record(result);
}

#[when(expr = "{string} renames the term to {string} with sentence case {string}")]
async fn when_rename_term(world: &mut LifecycleWorld, author: String, name: String, sentence_case: String) {
    let uid = world.current_uid();
    let value = CTTermNameVO::from_repository_values(name, sentence_case, vec![]);
    let result = world.terms.edit_draft(&uid, &author, "Rename", value).await;
    world.record(result);
}

#[then(expr = "the term is {string} at version {string}")]
async fn then_term_state(world: &mut LifecycleWorld, status: String, version: String) {
    let item = world.terms.get(&world.current_uid()).await.unwrap();
    assert_eq!(item.status().as_str(), status);
    assert_eq!(item.version(), version);
}

// Outcomes

#[then("the request succeeds")]
async fn then_request_succeeds(world: &mut LifecycleWorld) {
    assert!(
        world.last_error.is_none(),
        "unexpected error: {:?}",
        world.last_error
    );
}

#[then(expr = "the request fails with {string}")]
async fn then_request_fails_with(world: &mut LifecycleWorld, message: String) {
    let error = world.last_error.as_ref().expect("request should have failed");
    assert_eq!(error.to_string(), message);
}

#[then(expr = "the request fails with status {int}")]
async fn then_request_fails_with_status(world: &mut LifecycleWorld, status: u16) {
    let error = world.last_error.as_ref().expect("request should have failed");
    assert_eq!(error.status_code(), status);
}

#[tokio::main]
async fn main() {
    LifecycleWorld::cucumber()
        .fail_on_skipped()
        .run_and_exit("tests/lifecycle/features")
        .await;
}
