//! Uid generation.
//!
//! Uids look like `Compound_000001`: the entity's uid prefix followed by a
//! zero-padded counter kept durably in the store.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::{UidConfig, UidStrategy};
use crate::storage::{LibraryItemStore, Result};

#[async_trait]
pub trait UidGenerator: Send + Sync {
    async fn generate(&self, prefix: &str) -> Result<String>;
}

/// Counter-backed uids, one counter per prefix.
pub struct CounterUidGenerator {
    store: Arc<dyn LibraryItemStore>,
    digits: usize,
}

impl CounterUidGenerator {
    pub fn new(store: Arc<dyn LibraryItemStore>, digits: usize) -> Self {
        Self { store, digits }
    }
}

#[async_trait]
impl UidGenerator for CounterUidGenerator {
    async fn generate(&self, prefix: &str) -> Result<String> {
        let counter = self.store.next_counter(prefix).await?;
        Ok(format!("{prefix}_{counter:0width$}", width = self.digits))
    }
}

/// Random v4 uuids behind the prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidUidGenerator;

#[async_trait]
impl UidGenerator for UuidUidGenerator {
    async fn generate(&self, prefix: &str) -> Result<String> {
        Ok(format!("{prefix}_{}", Uuid::new_v4()))
    }
}

/// Build the generator selected by configuration.
pub fn uid_generator_from_config(
    config: &UidConfig,
    store: Arc<dyn LibraryItemStore>,
) -> Arc<dyn UidGenerator> {
    match config.strategy {
        UidStrategy::Counter => Arc::new(CounterUidGenerator::new(store, config.number_of_uid_digits)),
        UidStrategy::Uuid => Arc::new(UuidUidGenerator),
    }
}
