//! Screening Store Library
//!
//! Persists the user's blocked keywords and the history of blocked calls.
//! Both live in a small string-set key-value store (SQLite on disk, or an
//! in-memory map for tests and dry runs).

pub mod blocked;
pub mod keywords;
pub mod storage;

pub use blocked::{BlockLog, BlockedNumber};
pub use keywords::{KeywordSet, KeywordStore};
pub use storage::{MemorySetStore, SetStore, SqliteSetStore, StorageError};
