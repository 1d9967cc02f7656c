//! Domain repositories.

mod library_item;
pub mod locks;

pub use library_item::{HistoryEntry, ItemSnapshot, LibraryItemRepository, VersionSelector};
pub use locks::{EntityLockGuard, EntityLocks};
