//! Core domain types used by the chain.
//!
//! This module defines strongly-typed hashes and the account address
//! newtype that are shared across the chain implementation. The goal is to
//! avoid "naked" byte buffers and bare `String`s in public APIs and instead
//! use domain-specific newtypes.

use serde::{Deserialize, Serialize};

pub mod block;
pub mod tx;

pub use block::{Block, BlockError, BlockHash, BlockHeader, Merkle};
pub use tx::{Transaction, TransactionFields, ValidationError};

/// Length in bytes of all 256-bit hash types used in this module.
pub const HASH_LEN: usize = 32;

/// Strongly-typed 256-bit hash wrapper (SHA-256).
///
/// This type is used as the backing representation for all fixed-size
/// hashes in the chain (transaction ids, block hashes). It is always
/// exactly [`HASH_LEN`] bytes long.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// All-zero hash, used as the genesis block's `parent_hash` and as the
    /// empty-transaction-list Merkle root.
    pub const ZERO: Hash256 = Hash256([0u8; HASH_LEN]);

    /// Computes a new [`Hash256`] as the SHA-256 hash of `data`.
    pub fn compute(data: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(&digest);
        Hash256(out)
    }

    /// Returns the underlying 32-byte hash as a borrowed array.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Returns `true` if this hash is the all-zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// Counts the number of leading zero *bits* in this hash, used by the
    /// proof-of-work target test.
    pub fn leading_zero_bits(&self) -> u32 {
        let mut count = 0u32;
        for byte in self.0.iter() {
            if *byte == 0 {
                count += 8;
            } else {
                count += byte.leading_zeros();
                break;
            }
        }
        count
    }
}

impl std::fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Hash256({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for Hash256 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Minimum allowed length of an [`Address`] string.
pub const ADDRESS_MIN_LEN: usize = 8;
/// Maximum allowed length of an [`Address`] string.
pub const ADDRESS_MAX_LEN: usize = 128;

/// Opaque account address, 8–128 chars drawn from `[0-9a-fA-F_:-]`.
///
/// Addresses are deliberately not interpreted by the core beyond their
/// format: the wallet collaborator is responsible for deriving them from
/// key material.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Returns `true` if every character is drawn from the address
    /// alphabet `[0-9a-fA-F_:-]` and the length is in `[8, 128]`.
    pub fn is_well_formed(&self) -> bool {
        let len = self.0.len();
        if len < ADDRESS_MIN_LEN || len > ADDRESS_MAX_LEN {
            return false;
        }
        self.0
            .chars()
            .all(|c| c.is_ascii_hexdigit() || matches!(c, '_' | ':' | '-'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Address(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_compute_is_deterministic() {
        let a = Hash256::compute(b"hello");
        let b = Hash256::compute(b"hello");
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn zero_hash_has_256_leading_zero_bits() {
        assert_eq!(Hash256::ZERO.leading_zero_bits(), 256);
    }

    #[test]
    fn leading_zero_bits_counts_across_byte_boundary() {
        let mut bytes = [0u8; HASH_LEN];
        bytes[0] = 0;
        bytes[1] = 0b0010_0000; // 2 leading zero bits in this byte
        let h = Hash256(bytes);
        assert_eq!(h.leading_zero_bits(), 8 + 2);
    }

    #[test]
    fn address_rejects_bad_alphabet_and_length() {
        assert!(!Address::from("short").is_well_formed());
        assert!(Address::from("alice123").is_well_formed());
        assert!(Address::from("alice_1234:abcd-EF").is_well_formed());
        assert!(!Address::from("has a space here ok").is_well_formed());
        let too_long = Address::from("a".repeat(129));
        assert!(!too_long.is_well_formed());
    }
}
