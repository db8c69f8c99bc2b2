//! Mempool and stateful transaction admission.
//!
//! Transactions are stored per-sender as an ordered `nonce -> Transaction`
//! map, plus a FIFO list recording insertion order for batch extraction.
//! See spec.md §4.5.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Mutex;

use crate::state::StateStore;
use crate::types::Transaction;
use crate::types::tx::ValidationError;

/// Failure surfaced by [`Mempool::add`].
#[derive(Debug, Eq, PartialEq)]
pub enum AdmissionError {
    Invalid(ValidationError),
    FeeBelowMinimum,
    BadNonce { expected: u64, got: u64 },
    InsufficientBalance,
    MissingSignature,
    DuplicateReplacementRejected,
}

impl std::fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdmissionError::Invalid(e) => write!(f, "stateless validation failed: {e}"),
            AdmissionError::FeeBelowMinimum => write!(f, "fee is below the configured minimum"),
            AdmissionError::BadNonce { expected, got } => {
                write!(f, "bad nonce: expected {expected}, got {got}")
            }
            AdmissionError::InsufficientBalance => write!(f, "sender balance is insufficient"),
            AdmissionError::MissingSignature => write!(f, "signature must not be empty"),
            AdmissionError::DuplicateReplacementRejected => {
                write!(f, "duplicate replacement rejected")
            }
        }
    }
}

impl std::error::Error for AdmissionError {}

impl From<ValidationError> for AdmissionError {
    fn from(e: ValidationError) -> Self {
        AdmissionError::Invalid(e)
    }
}

/// Identity used for replacement and removal: `(from, nonce)`.
type TxKey = (String, u64);

struct Inner {
    by_sender: HashMap<String, BTreeMap<u64, Transaction>>,
    fifo: VecDeque<TxKey>,
}

/// Pending-transaction pool with stateful admission checks.
pub struct Mempool {
    min_fee: i64,
    inner: Mutex<Inner>,
}

impl Mempool {
    pub fn new(min_fee: i64) -> Self {
        Self {
            min_fee,
            inner: Mutex::new(Inner {
                by_sender: HashMap::new(),
                fifo: VecDeque::new(),
            }),
        }
    }

    /// Runs stateless validation followed by the admission checks of
    /// spec.md §4.5 against `state`, then inserts `tx`. If `(from, nonce)`
    /// already exists, the previous entry is replaced and dropped from the
    /// FIFO list.
    pub fn add(&self, tx: Transaction, state: &StateStore) -> Result<(), AdmissionError> {
        tx.validate()?;

        if tx.fee_minor < self.min_fee {
            return Err(AdmissionError::FeeBelowMinimum);
        }

        let expected_nonce = state.get_nonce(&tx.from);
        if tx.nonce != expected_nonce {
            return Err(AdmissionError::BadNonce {
                expected: expected_nonce,
                got: tx.nonce,
            });
        }

        let required = tx
            .amount_minor
            .checked_add(tx.fee_minor)
            .ok_or(AdmissionError::InsufficientBalance)?;
        if state.get_balance(&tx.from) < required {
            return Err(AdmissionError::InsufficientBalance);
        }

        if tx.signature.is_empty() {
            return Err(AdmissionError::MissingSignature);
        }

        let key: TxKey = (tx.from.0.clone(), tx.nonce);
        let mut inner = self.inner.lock().expect("mempool mutex poisoned");

        let sender_map = inner.by_sender.entry(key.0.clone()).or_default();
        let replaced = sender_map.insert(tx.nonce, tx).is_some();
        if replaced {
            inner.fifo.retain(|k| k != &key);
        }
        inner.fifo.push_back(key);

        Ok(())
    }

    /// Returns the number of pending transactions across all senders.
    pub fn size(&self) -> usize {
        self.inner.lock().expect("mempool mutex poisoned").fifo.len()
    }

    /// Pops up to `max` transactions from the FIFO head, also removing them
    /// from the per-sender index.
    pub fn get_batch(&self, max: usize) -> Vec<Transaction> {
        let mut inner = self.inner.lock().expect("mempool mutex poisoned");
        let take = max.min(inner.fifo.len());
        let mut out = Vec::with_capacity(take);

        for _ in 0..take {
            let key = inner.fifo.pop_front().expect("checked by take bound");
            let tx = inner
                .by_sender
                .get_mut(&key.0)
                .and_then(|m| m.remove(&key.1))
                .expect("fifo and by_sender index must stay in sync");
            if inner
                .by_sender
                .get(&key.0)
                .map(|m| m.is_empty())
                .unwrap_or(false)
            {
                inner.by_sender.remove(&key.0);
            }
            out.push(tx);
        }

        out
    }

    /// Removes the given transactions by `(from, nonce)` identity, e.g. to
    /// re-enqueue them after a rolled-back tick.
    pub fn remove_all(&self, txs: &[Transaction]) {
        let mut inner = self.inner.lock().expect("mempool mutex poisoned");
        for tx in txs {
            let key: TxKey = (tx.from.0.clone(), tx.nonce);
            if let Some(m) = inner.by_sender.get_mut(&key.0) {
                m.remove(&key.1);
                if m.is_empty() {
                    inner.by_sender.remove(&key.0);
                }
            }
            inner.fifo.retain(|k| k != &key);
        }
    }

    /// Re-enqueues previously-drained transactions at the front of the
    /// FIFO, preserving their relative order. Used by the producer to roll
    /// back a failed tick.
    pub fn requeue(&self, txs: Vec<Transaction>) {
        let mut inner = self.inner.lock().expect("mempool mutex poisoned");
        for tx in txs.into_iter().rev() {
            let key: TxKey = (tx.from.0.clone(), tx.nonce);
            inner
                .by_sender
                .entry(key.0.clone())
                .or_default()
                .insert(key.1, tx);
            inner.fifo.push_front(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Address;
    use crate::types::tx::{TransactionFields, TX_VERSION};

    fn make_tx(from: &str, nonce: u64, amount: i64, fee: i64) -> Transaction {
        Transaction::build(TransactionFields {
            version: TX_VERSION,
            chain_id: 1,
            from: Address::from(from),
            to: Address::from("bob00001"),
            amount_minor: amount,
            fee_minor: fee,
            nonce,
            timestamp_ms: 1_700_000_000_000,
            payload: vec![],
            signature: vec![1u8; 64],
            public_key: None,
        })
        .unwrap()
    }

    #[test]
    fn add_rejects_fee_below_minimum() {
        let state = StateStore::new();
        state.set_balance(&Address::from("alice0001"), 1000);
        let pool = Mempool::new(5);

        let result = pool.add(make_tx("alice0001", 0, 100, 1), &state);
        assert_eq!(result, Err(AdmissionError::FeeBelowMinimum));
    }

    #[test]
    fn add_rejects_bad_nonce() {
        let state = StateStore::new();
        state.set_balance(&Address::from("alice0001"), 1000);
        let pool = Mempool::new(0);

        let result = pool.add(make_tx("alice0001", 1, 100, 1), &state);
        assert_eq!(
            result,
            Err(AdmissionError::BadNonce { expected: 0, got: 1 })
        );
    }

    #[test]
    fn add_rejects_insufficient_balance() {
        let state = StateStore::new();
        state.set_balance(&Address::from("alice0001"), 50);
        let pool = Mempool::new(0);

        let result = pool.add(make_tx("alice0001", 0, 100, 1), &state);
        assert_eq!(result, Err(AdmissionError::InsufficientBalance));
    }

    #[test]
    fn replacing_same_from_nonce_keeps_single_fifo_entry() {
        let state = StateStore::new();
        state.set_balance(&Address::from("alice0001"), 1000);
        let pool = Mempool::new(0);

        pool.add(make_tx("alice0001", 0, 100, 1), &state).unwrap();
        pool.add(make_tx("alice0001", 0, 200, 1), &state).unwrap();

        assert_eq!(pool.size(), 1);
        let batch = pool.get_batch(10);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].amount_minor, 200);
    }

    #[test]
    fn get_batch_drains_fifo_order() {
        let state = StateStore::new();
        state.set_balance(&Address::from("alice0001"), 1000);
        let pool = Mempool::new(0);

        pool.add(make_tx("alice0001", 0, 10, 1), &state).unwrap();
        pool.add(make_tx("alice0001", 1, 10, 1), &state).unwrap();

        let batch = pool.get_batch(1);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].nonce, 0);
        assert_eq!(pool.size(), 1);
    }

    #[test]
    fn requeue_restores_fifo_and_index() {
        let state = StateStore::new();
        state.set_balance(&Address::from("alice0001"), 1000);
        let pool = Mempool::new(0);

        pool.add(make_tx("alice0001", 0, 10, 1), &state).unwrap();
        let drained = pool.get_batch(10);
        assert_eq!(pool.size(), 0);

        pool.requeue(drained);
        assert_eq!(pool.size(), 1);
    }
}
