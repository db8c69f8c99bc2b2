// chain/src/types/block.rs

//! Block types, Merkle commitment, and block hashing.
//!
//! A block bundles a [`BlockHeader`] with an ordered list of
//! [`Transaction`]s. The header commits to the transaction list via a
//! Merkle root, and the block's own content hash covers the header only
//! (transactions are committed indirectly through that root, not hashed
//! a second time into the block hash).

use serde::{Deserialize, Serialize};

use crate::codec::{DecodeError, Reader, Writer};

use super::{Hash256, Transaction};

/// Maximum number of transactions a single block may carry.
pub const MAX_TXS_PER_BLOCK: usize = 1_000_000;

/// Strongly-typed block hash: the SHA-256 digest of a [`BlockHeader`]'s
/// canonical encoding.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlockHash(pub Hash256);

impl std::fmt::Display for BlockHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural and framing failures for [`Block`].
#[derive(Debug, Eq, PartialEq)]
pub enum BlockError {
    TooManyTransactions(usize),
    Decode(DecodeError),
}

impl std::fmt::Display for BlockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockError::TooManyTransactions(n) => {
                write!(f, "block has {n} transactions, exceeds {MAX_TXS_PER_BLOCK}")
            }
            BlockError::Decode(e) => write!(f, "block decode error: {e}"),
        }
    }
}

impl std::error::Error for BlockError {}

impl From<DecodeError> for BlockError {
    fn from(e: DecodeError) -> Self {
        BlockError::Decode(e)
    }
}

/// Block header: the minimal set of consensus-relevant fields.
///
/// The header is what gets hashed and mined; the transaction list is
/// committed to it only through [`BlockHeader::merkle_root`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Hash of the parent block. The genesis block uses [`Hash256::ZERO`].
    pub parent_hash: BlockHash,
    /// Merkle root over the block's ordered transaction ids.
    pub merkle_root: Hash256,
    /// Height of this block; genesis is height 0.
    pub height: u64,
    /// Milliseconds since Unix epoch at which this header was produced.
    pub timestamp_ms: i64,
    /// Number of leading zero bits a valid proof-of-work hash must have.
    pub difficulty_bits: u32,
    /// Nonce varied by mining to satisfy the proof-of-work target.
    pub nonce: u64,
}

impl BlockHeader {
    /// Canonical encoding used for both hashing and persistence.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_fixed(self.parent_hash.0.as_bytes());
        w.write_fixed(self.merkle_root.as_bytes());
        w.write_u64(self.height);
        w.write_i64(self.timestamp_ms);
        w.write_u32(self.difficulty_bits);
        w.write_u64(self.nonce);
        w.into_bytes()
    }

    /// SHA-256 hash of [`BlockHeader::canonical_bytes`].
    ///
    /// This is the value the proof-of-work target test is applied to, and
    /// what downstream blocks reference as their `parent_hash`.
    pub fn hash(&self) -> Hash256 {
        Hash256::compute(&self.canonical_bytes())
    }

    fn decode(r: &mut Reader) -> Result<BlockHeader, DecodeError> {
        let parent_hash = BlockHash(Hash256(
            r.read_fixed("parent_hash", 32)?.try_into().unwrap(),
        ));
        let merkle_root = Hash256(r.read_fixed("merkle_root", 32)?.try_into().unwrap());
        let height = r.read_u64("height")?;
        let timestamp_ms = r.read_i64("timestamp_ms")?;
        let difficulty_bits = r.read_u32("difficulty_bits")?;
        let nonce = r.read_u64("nonce")?;
        Ok(BlockHeader {
            parent_hash,
            merkle_root,
            height,
            timestamp_ms,
            difficulty_bits,
            nonce,
        })
    }
}

/// Block = header + ordered transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Transaction>,
}

impl Block {
    /// Builds a block from a header and transaction list, checking the
    /// transaction-count cap and recomputing the header's `merkle_root` to
    /// match `txs`.
    pub fn new(mut header: BlockHeader, txs: Vec<Transaction>) -> Result<Block, BlockError> {
        if txs.len() > MAX_TXS_PER_BLOCK {
            return Err(BlockError::TooManyTransactions(txs.len()));
        }
        let ids: Vec<Hash256> = txs.iter().map(Transaction::id).collect();
        header.merkle_root = Merkle::root(&ids);
        Ok(Block { header, txs })
    }

    /// This block's content hash: [`BlockHeader::hash`] of `self.header`.
    pub fn hash(&self) -> BlockHash {
        BlockHash(self.header.hash())
    }

    /// Returns `true` if `self.header.merkle_root` matches the Merkle root
    /// recomputed from `self.txs`.
    pub fn merkle_root_is_consistent(&self) -> bool {
        let ids: Vec<Hash256> = self.txs.iter().map(Transaction::id).collect();
        Merkle::root(&ids) == self.header.merkle_root
    }

    /// Canonical encoding of the whole block (header followed by every
    /// transaction's own canonical encoding, length-prefixed).
    pub fn serialize(&self) -> Vec<u8> {
        let mut w = Writer::new();
        let header_bytes = self.header.canonical_bytes();
        w.write_bytes("header", &header_bytes)
            .expect("header is fixed-size, never oversized");
        w.write_u32(self.txs.len() as u32);
        for tx in &self.txs {
            let tx_bytes = tx.serialize();
            w.write_bytes("tx", &tx_bytes)
                .expect("transaction was already validated at admission");
        }
        w.into_bytes()
    }

    /// Decodes a block from [`Block::serialize`]'s output.
    pub fn decode(bytes: &[u8]) -> Result<Block, BlockError> {
        let mut r = Reader::new(bytes);
        let header_bytes = r.read_bytes("header")?;
        let header = BlockHeader::decode(&mut Reader::new(&header_bytes))?;
        let tx_count = r.read_u32("tx_count")? as usize;
        if tx_count > MAX_TXS_PER_BLOCK {
            return Err(BlockError::TooManyTransactions(tx_count));
        }
        let mut txs = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            let tx_bytes = r.read_bytes("tx")?;
            txs.push(Transaction::decode(&tx_bytes)?);
        }
        r.finish()?;
        Ok(Block { header, txs })
    }
}

/// Merkle tree over an ordered list of transaction ids.
///
/// Nodes at an odd level are paired with a duplicate of the last node
/// (Bitcoin-style duplication) rather than left unpaired. The empty tree's
/// root is the all-zero hash, distinguishing an empty block from one whose
/// single transaction happens to hash to zero (astronomically unlikely,
/// but the convention avoids relying on that).
pub struct Merkle;

impl Merkle {
    /// Computes the Merkle root over `ids`, in order.
    pub fn root(ids: &[Hash256]) -> Hash256 {
        if ids.is_empty() {
            return Hash256::ZERO;
        }
        let mut level: Vec<Hash256> = ids.to_vec();
        while level.len() > 1 {
            if level.len() % 2 == 1 {
                level.push(*level.last().unwrap());
            }
            let mut next = Vec::with_capacity(level.len() / 2);
            for pair in level.chunks_exact(2) {
                let mut buf = Vec::with_capacity(64);
                buf.extend_from_slice(pair[0].as_bytes());
                buf.extend_from_slice(pair[1].as_bytes());
                next.push(Hash256::compute(&buf));
            }
            level = next;
        }
        level[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::tx::{Transaction, TransactionFields, TX_VERSION};
    use crate::types::Address;

    fn sample_tx(nonce: u64) -> Transaction {
        Transaction::build(TransactionFields {
            version: TX_VERSION,
            chain_id: 1,
            from: Address::from("alice0001"),
            to: Address::from("bob00001"),
            amount_minor: 10,
            fee_minor: 1,
            nonce,
            timestamp_ms: 1_700_000_000_000,
            payload: vec![],
            signature: vec![1u8; 64],
            public_key: None,
        })
        .unwrap()
    }

    fn genesis_header() -> BlockHeader {
        BlockHeader {
            parent_hash: BlockHash(Hash256::ZERO),
            merkle_root: Hash256::ZERO,
            height: 0,
            timestamp_ms: 1_700_000_000_000,
            difficulty_bits: 1,
            nonce: 0,
        }
    }

    #[test]
    fn empty_block_has_zero_merkle_root() {
        let block = Block::new(genesis_header(), vec![]).unwrap();
        assert_eq!(block.header.merkle_root, Hash256::ZERO);
        assert!(block.merkle_root_is_consistent());
    }

    #[test]
    fn merkle_root_duplicates_last_node_for_odd_counts() {
        let ids = vec![
            sample_tx(0).id(),
            sample_tx(1).id(),
            sample_tx(2).id(),
        ];
        let root_odd = Merkle::root(&ids);

        let mut ids_padded = ids.clone();
        ids_padded.push(ids[2]);
        let root_padded = Merkle::root(&ids_padded);

        assert_eq!(root_odd, root_padded);
    }

    #[test]
    fn block_hash_is_deterministic_and_ignores_tx_body() {
        let block = Block::new(genesis_header(), vec![sample_tx(0)]).unwrap();
        let h1 = block.hash();
        let h2 = block.hash();
        assert_eq!(h1, h2);
    }

    #[test]
    fn serialize_then_decode_roundtrips() {
        let block = Block::new(genesis_header(), vec![sample_tx(0), sample_tx(1)]).unwrap();
        let bytes = block.serialize();
        let decoded = Block::decode(&bytes).unwrap();

        assert_eq!(decoded.hash(), block.hash());
        assert_eq!(decoded.txs.len(), 2);
        assert!(decoded.merkle_root_is_consistent());
    }

    #[test]
    fn decode_rejects_tx_count_above_cap() {
        let mut w = Writer::new();
        let header_bytes = genesis_header().canonical_bytes();
        w.write_bytes("header", &header_bytes).unwrap();
        w.write_u32((MAX_TXS_PER_BLOCK + 1) as u32);
        let bytes = w.into_bytes();

        assert_eq!(
            Block::decode(&bytes),
            Err(BlockError::TooManyTransactions(MAX_TXS_PER_BLOCK + 1))
        );
    }
}
