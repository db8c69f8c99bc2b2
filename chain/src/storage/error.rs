//! Chain store error taxonomy (spec.md §7).

use std::fmt;

/// Failure surfaced by a [`super::ChainStore`] implementation.
#[derive(Debug)]
pub enum StorageError {
    /// The underlying storage backend failed (I/O, corruption, etc.).
    BackendFailure(String),
    /// `set_head` was called with a hash not present in the store.
    UnknownHash,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::BackendFailure(msg) => write!(f, "storage backend failure: {msg}"),
            StorageError::UnknownHash => write!(f, "set_head target is not a known block"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<rocksdb::Error> for StorageError {
    fn from(e: rocksdb::Error) -> Self {
        StorageError::BackendFailure(e.to_string())
    }
}
