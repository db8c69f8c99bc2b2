//! Account state store.
//!
//! Holds the `address -> (balance_minor, nonce)` mapping described in
//! spec.md §3. All operations are serialized behind a single mutex, mirroring
//! the "single logical lock" requirement in §4.4: nothing here needs
//! fine-grained per-address locking at this scale.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::types::{Address, Block, Transaction};

/// Failure surfaced by balance arithmetic.
///
/// Per spec.md §7 these are fatal invariant violations: a caller that sees
/// one should stop producing rather than continue with corrupted balances.
#[derive(Debug, Eq, PartialEq)]
pub enum StateError {
    Overflow,
    NegativeBalance,
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::Overflow => write!(f, "balance arithmetic overflowed"),
            StateError::NegativeBalance => write!(f, "balance would go negative"),
        }
    }
}

impl std::error::Error for StateError {}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
struct Account {
    balance_minor: i64,
    nonce: u64,
}

/// In-memory account balances and nonces.
///
/// Missing entries read as `(0, 0)` per spec.md §3; entries are created
/// lazily on first credit/debit.
pub struct StateStore {
    accounts: Mutex<HashMap<String, Account>>,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
        }
    }

    fn with_account<T>(&self, addr: &Address, f: impl FnOnce(&mut Account) -> T) -> T {
        let mut accounts = self.accounts.lock().expect("state store mutex poisoned");
        let account = accounts.entry(addr.0.clone()).or_default();
        f(account)
    }

    pub fn get_balance(&self, addr: &Address) -> i64 {
        self.with_account(addr, |a| a.balance_minor)
    }

    pub fn get_nonce(&self, addr: &Address) -> u64 {
        self.with_account(addr, |a| a.nonce)
    }

    pub fn set_balance(&self, addr: &Address, balance_minor: i64) {
        self.with_account(addr, |a| a.balance_minor = balance_minor);
    }

    pub fn set_nonce(&self, addr: &Address, nonce: u64) {
        self.with_account(addr, |a| a.nonce = nonce);
    }

    /// Adds `amount` (may be negative) to `addr`'s balance. Used both for
    /// ordinary credits and to undo a reward credit during rollback.
    pub fn credit(&self, addr: &Address, amount: i64) -> Result<(), StateError> {
        self.with_account(addr, |a| {
            a.balance_minor = a
                .balance_minor
                .checked_add(amount)
                .ok_or(StateError::Overflow)?;
            Ok(())
        })
    }

    /// Applies `tx`: `balance[from] -= amount+fee; nonce[from] += 1;
    /// balance[to] += amount`. Fees are burned here; crediting them to a
    /// miner is the producer's responsibility.
    pub fn apply_tx(&self, tx: &Transaction) -> Result<(), StateError> {
        let debit = tx
            .amount_minor
            .checked_add(tx.fee_minor)
            .ok_or(StateError::Overflow)?;

        self.with_account(&tx.from, |a| {
            a.balance_minor = a.balance_minor.checked_sub(debit).ok_or(StateError::Overflow)?;
            a.nonce = a.nonce.checked_add(1).ok_or(StateError::Overflow)?;
            Ok::<(), StateError>(())
        })?;

        self.with_account(&tx.to, |a| {
            a.balance_minor = a
                .balance_minor
                .checked_add(tx.amount_minor)
                .ok_or(StateError::Overflow)?;
            Ok::<(), StateError>(())
        })?;

        Ok(())
    }

    /// Exact arithmetic inverse of [`StateStore::apply_tx`].
    pub fn revert_tx(&self, tx: &Transaction) -> Result<(), StateError> {
        let debit = tx
            .amount_minor
            .checked_add(tx.fee_minor)
            .ok_or(StateError::Overflow)?;

        self.with_account(&tx.to, |a| {
            a.balance_minor = a
                .balance_minor
                .checked_sub(tx.amount_minor)
                .ok_or(StateError::Overflow)?;
            Ok::<(), StateError>(())
        })?;

        self.with_account(&tx.from, |a| {
            a.balance_minor = a.balance_minor.checked_add(debit).ok_or(StateError::Overflow)?;
            a.nonce = a.nonce.checked_sub(1).ok_or(StateError::Overflow)?;
            Ok::<(), StateError>(())
        })?;

        Ok(())
    }

    /// Applies every transaction in `block`, in order.
    pub fn apply_block(&self, block: &Block) -> Result<(), StateError> {
        for tx in &block.txs {
            self.apply_tx(tx)?;
        }
        Ok(())
    }

    /// Reverts every transaction in `block`, in reverse order.
    pub fn revert_block(&self, block: &Block) -> Result<(), StateError> {
        for tx in block.txs.iter().rev() {
            self.revert_tx(tx)?;
        }
        Ok(())
    }
}
