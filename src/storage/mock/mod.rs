//! In-memory storage implementation for tests and embedded use.

mod item_store;

pub use item_store::MockLibraryItemStore;
