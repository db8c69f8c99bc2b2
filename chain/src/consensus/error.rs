//! Consensus-level error taxonomy (spec.md §7).

use std::fmt;

use crate::storage::StorageError;

/// Failure of a single consensus check in [`super::rules::validate_block`].
#[derive(Debug, Eq, PartialEq)]
pub enum ConsensusError {
    /// `parent_hash` is non-zero but not present in the chain store.
    UnknownParent,
    /// `header.height != parent_height + 1`.
    BadHeight { expected: u64, got: u64 },
    /// `header.merkle_root` does not match the recomputed root.
    MerkleMismatch,
    /// The header's hash does not meet its own `difficulty_bits` target.
    BadProofOfWork,
    /// Timestamp is not strictly greater than the parent's, or too far in
    /// the future.
    TimestampOutOfRange,
    /// Underlying chain store failure.
    Storage(StorageError),
}

impl fmt::Display for ConsensusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsensusError::UnknownParent => write!(f, "parent block is unknown"),
            ConsensusError::BadHeight { expected, got } => {
                write!(f, "bad height: expected {expected}, got {got}")
            }
            ConsensusError::MerkleMismatch => write!(f, "merkle root does not match transactions"),
            ConsensusError::BadProofOfWork => write!(f, "header does not meet proof-of-work target"),
            ConsensusError::TimestampOutOfRange => write!(f, "timestamp is out of the allowed range"),
            ConsensusError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for ConsensusError {}

impl From<StorageError> for ConsensusError {
    fn from(e: StorageError) -> Self {
        ConsensusError::Storage(e)
    }
}
