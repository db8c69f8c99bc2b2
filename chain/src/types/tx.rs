// chain/src/types/tx.rs

//! Transaction type for the consensus layer.
//!
//! A [`Transaction`] is an immutable record of a signed value transfer. Its
//! `id` is the SHA-256 hash of its canonical "unsigned bytes" encoding
//! (every field except `signature` and `public_key`), so the id is stable
//! under signature mutation, which is useful for wallets that sign after
//! building the rest of the transaction.

use serde::{Deserialize, Serialize};

use crate::codec::{DecodeError, Reader, Writer};

use super::{ADDRESS_MAX_LEN, ADDRESS_MIN_LEN, Address, Hash256};

/// Maximum allowed length, in bytes, of a transaction's opaque `payload`.
pub const MAX_PAYLOAD_LEN: usize = 8192;

/// The supported transaction format version.
pub const TX_VERSION: u32 = 1;

/// Stateless validation failure for a [`Transaction`].
#[derive(Debug, Eq, PartialEq)]
pub enum ValidationError {
    UnsupportedVersion(u32),
    InvalidChainId,
    InvalidAddress(&'static str),
    SameSenderAndRecipient,
    NonPositiveAmount,
    NegativeFee,
    NonPositiveTimestamp,
    PayloadTooLarge(usize),
    InvalidSignatureLength(usize),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::UnsupportedVersion(v) => write!(f, "unsupported version {v}"),
            ValidationError::InvalidChainId => write!(f, "chain_id must be positive"),
            ValidationError::InvalidAddress(which) => write!(f, "invalid {which} address"),
            ValidationError::SameSenderAndRecipient => write!(f, "from and to must differ"),
            ValidationError::NonPositiveAmount => write!(f, "amount_minor must be positive"),
            ValidationError::NegativeFee => write!(f, "fee_minor must not be negative"),
            ValidationError::NonPositiveTimestamp => write!(f, "timestamp_ms must be positive"),
            ValidationError::PayloadTooLarge(len) => {
                write!(f, "payload of {len} bytes exceeds {MAX_PAYLOAD_LEN}")
            }
            ValidationError::InvalidSignatureLength(len) => {
                write!(f, "signature length {len} must be 0 or 64")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Plain-data fields used to [`Transaction::build`] a transaction.
///
/// Kept separate from `Transaction` so that construction always goes
/// through validation instead of allowing arbitrary field mutation after
/// the fact.
#[derive(Clone, Debug)]
pub struct TransactionFields {
    pub version: u32,
    pub chain_id: u32,
    pub from: Address,
    pub to: Address,
    pub amount_minor: i64,
    pub fee_minor: i64,
    pub nonce: u64,
    pub timestamp_ms: i64,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    pub public_key: Option<Vec<u8>>,
}

/// Immutable, validated transaction record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub version: u32,
    pub chain_id: u32,
    pub from: Address,
    pub to: Address,
    pub amount_minor: i64,
    pub fee_minor: i64,
    pub nonce: u64,
    pub timestamp_ms: i64,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
    pub public_key: Option<Vec<u8>>,
}

impl Transaction {
    /// Validates `fields` and, if they are well-formed, constructs a
    /// [`Transaction`].
    pub fn build(fields: TransactionFields) -> Result<Transaction, ValidationError> {
        let tx = Transaction {
            version: fields.version,
            chain_id: fields.chain_id,
            from: fields.from,
            to: fields.to,
            amount_minor: fields.amount_minor,
            fee_minor: fields.fee_minor,
            nonce: fields.nonce,
            timestamp_ms: fields.timestamp_ms,
            payload: fields.payload,
            signature: fields.signature,
            public_key: fields.public_key,
        };
        tx.check_invariants()?;
        Ok(tx)
    }

    /// Re-runs every stateless invariant from spec.md §4.2 against an
    /// already-constructed transaction. Used by mempool admission, which
    /// needs to validate transactions decoded off the wire before running
    /// its own stateful checks.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.check_invariants()
    }

    /// Checks every stateless invariant from spec.md §4.2. Shared by
    /// [`Transaction::build`] and [`Transaction::decode`] so both paths
    /// enforce the same rules.
    fn check_invariants(&self) -> Result<(), ValidationError> {
        if self.version != TX_VERSION {
            return Err(ValidationError::UnsupportedVersion(self.version));
        }
        if self.chain_id == 0 {
            return Err(ValidationError::InvalidChainId);
        }
        if !self.from.is_well_formed() {
            return Err(ValidationError::InvalidAddress("from"));
        }
        if !self.to.is_well_formed() {
            return Err(ValidationError::InvalidAddress("to"));
        }
        if self.from == self.to {
            return Err(ValidationError::SameSenderAndRecipient);
        }
        if self.amount_minor <= 0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.fee_minor < 0 {
            return Err(ValidationError::NegativeFee);
        }
        if self.timestamp_ms <= 0 {
            return Err(ValidationError::NonPositiveTimestamp);
        }
        if self.payload.len() > MAX_PAYLOAD_LEN {
            return Err(ValidationError::PayloadTooLarge(self.payload.len()));
        }
        if !matches!(self.signature.len(), 0 | 64) {
            return Err(ValidationError::InvalidSignatureLength(
                self.signature.len(),
            ));
        }
        Ok(())
    }

    /// Deterministic encoding of every field *except* `signature` and
    /// `public_key`, in fixed order. This is what [`Transaction::id`]
    /// hashes, so that the id is stable under re-signing.
    pub fn unsigned_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(self.version);
        w.write_u32(self.chain_id);
        w.write_str("from", &self.from.0).expect("validated length");
        w.write_str("to", &self.to.0).expect("validated length");
        w.write_i64(self.amount_minor);
        w.write_i64(self.fee_minor);
        w.write_u64(self.nonce);
        w.write_i64(self.timestamp_ms);
        w.write_bytes("payload", &self.payload)
            .expect("validated length");
        w.into_bytes()
    }

    /// 32-byte content identifier: `SHA256(unsigned_bytes())`.
    pub fn id(&self) -> Hash256 {
        Hash256::compute(&self.unsigned_bytes())
    }

    /// Full canonical encoding, including `signature` and `public_key`.
    /// Used for wire transfer and chain-store persistence.
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u32(self.version);
        w.write_u32(self.chain_id);
        w.write_str("from", &self.from.0).expect("validated length");
        w.write_str("to", &self.to.0).expect("validated length");
        w.write_i64(self.amount_minor);
        w.write_i64(self.fee_minor);
        w.write_u64(self.nonce);
        w.write_i64(self.timestamp_ms);
        w.write_bytes("payload", &self.payload)
            .expect("validated length");
        w.write_bytes("signature", &self.signature)
            .expect("validated length");
        match &self.public_key {
            Some(pk) => {
                w.write_u8(1);
                w.write_bytes("public_key", pk).expect("validated length");
            }
            None => w.write_u8(0),
        }
        w.into_bytes()
    }

    /// Decodes a transaction from its full canonical encoding, re-checking
    /// every stateless invariant.
    pub fn decode(bytes: &[u8]) -> Result<Transaction, DecodeError> {
        let mut r = Reader::new(bytes);
        let version = r.read_u32("version")?;
        let chain_id = r.read_u32("chain_id")?;
        let from = Address(r.read_str("from")?);
        let to = Address(r.read_str("to")?);
        let amount_minor = r.read_i64("amount_minor")?;
        let fee_minor = r.read_i64("fee_minor")?;
        let nonce = r.read_u64("nonce")?;
        let timestamp_ms = r.read_i64("timestamp_ms")?;
        let payload = r.read_bytes("payload")?;
        let signature = r.read_bytes("signature")?;
        let has_pk = r.read_u8("has_public_key")?;
        let public_key = if has_pk != 0 {
            Some(r.read_bytes("public_key")?)
        } else {
            None
        };
        r.finish()?;

        let tx = Transaction {
            version,
            chain_id,
            from,
            to,
            amount_minor,
            fee_minor,
            nonce,
            timestamp_ms,
            payload,
            signature,
            public_key,
        };

        // A well-framed buffer can still violate a stateless invariant
        // (e.g. a replayed-but-corrupted record); surface that as a decode
        // failure rather than handing bad data to callers.
        tx.check_invariants()
            .map_err(|_| DecodeError::TrailingBytes)?;

        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_fields() -> TransactionFields {
        TransactionFields {
            version: TX_VERSION,
            chain_id: 1,
            from: Address::from("alice0001"),
            to: Address::from("bob00001"),
            amount_minor: 100,
            fee_minor: 1,
            nonce: 0,
            timestamp_ms: 1_700_000_000_000,
            payload: vec![],
            signature: vec![7u8; 64],
            public_key: None,
        }
    }

    #[test]
    fn build_accepts_well_formed_fields() {
        let tx = Transaction::build(valid_fields()).unwrap();
        assert_eq!(tx.amount_minor, 100);
    }

    #[test]
    fn build_rejects_same_sender_and_recipient() {
        let mut fields = valid_fields();
        fields.to = fields.from.clone();
        assert_eq!(
            Transaction::build(fields),
            Err(ValidationError::SameSenderAndRecipient)
        );
    }

    #[test]
    fn build_rejects_oversized_payload() {
        let mut fields = valid_fields();
        fields.payload = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            Transaction::build(fields),
            Err(ValidationError::PayloadTooLarge(MAX_PAYLOAD_LEN + 1))
        );
    }

    #[test]
    fn build_rejects_bad_signature_length() {
        let mut fields = valid_fields();
        fields.signature = vec![0u8; 10];
        assert_eq!(
            Transaction::build(fields),
            Err(ValidationError::InvalidSignatureLength(10))
        );
    }

    #[test]
    fn build_rejects_negative_fee() {
        let mut fields = valid_fields();
        fields.fee_minor = -1;
        assert_eq!(Transaction::build(fields), Err(ValidationError::NegativeFee));
    }

    #[test]
    fn id_is_stable_under_signature_mutation() {
        let tx1 = Transaction::build(valid_fields()).unwrap();
        let mut fields2 = valid_fields();
        fields2.signature = vec![9u8; 64];
        let tx2 = Transaction::build(fields2).unwrap();

        assert_eq!(tx1.id().as_bytes(), tx2.id().as_bytes());
    }

    #[test]
    fn decode_of_serialize_roundtrips_unsigned_bytes_and_id() {
        let tx = Transaction::build(valid_fields()).unwrap();
        let bytes = tx.serialize();
        let decoded = Transaction::decode(&bytes).unwrap();

        assert_eq!(decoded.unsigned_bytes(), tx.unsigned_bytes());
        assert_eq!(decoded.id().as_bytes(), tx.id().as_bytes());
    }

    #[test]
    fn decode_roundtrips_with_public_key_present() {
        let mut fields = valid_fields();
        fields.public_key = Some(vec![1, 2, 3, 4]);
        let tx = Transaction::build(fields).unwrap();
        let bytes = tx.serialize();
        let decoded = Transaction::decode(&bytes).unwrap();
        assert_eq!(decoded.public_key, Some(vec![1, 2, 3, 4]));
    }

    #[test]
    fn empty_signature_is_allowed_by_build() {
        let mut fields = valid_fields();
        fields.signature = vec![];
        assert!(Transaction::build(fields).is_ok());
    }
}
