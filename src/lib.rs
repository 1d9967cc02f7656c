//! Clinical MDR - versioned library items
//!
//! Lifecycle core for controlled terminology and study definition items:
//! value objects, the library item aggregate root, metadata version
//! arithmetic, library gating, an audit trail and the repository that
//! persists every transition as an immutable version.

pub mod audit;
pub mod config;
pub mod domain;
pub mod error;
pub mod projection;
pub mod repository;
pub mod storage;
pub mod uid;
pub mod utils;

pub use error::{Error, ErrorKind, Result};
