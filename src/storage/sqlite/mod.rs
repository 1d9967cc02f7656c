//! SQLite implementation of the library item store.

mod item_store;

pub use item_store::SqliteLibraryItemStore;
