//! # Value Transfer Service
//!
//! The ledger never touches balances directly. It asks a [`ValueTransfer`]
//! implementation to register accounts and move amounts between them, and
//! relies on that service refusing any transfer the sender can't cover.
//! That refusal is the only thing standing between an escrow account and a
//! negative balance, so implementations must be strict about it.
//!
//! [`InMemoryBank`] is the reference implementation: a flat map of
//! balances with checked arithmetic, good enough for tests and for hosts
//! that keep balances in process.

use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;

use crate::address::{Address, Signer};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while moving value between accounts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransferError {
    /// The sender's balance doesn't cover the requested amount.
    #[error("insufficient balance: {account} has {available}, requested {requested}")]
    InsufficientBalance {
        /// The account that was being debited.
        account: Address,
        /// Its balance at the time of the attempt.
        available: u64,
        /// The amount that was requested.
        requested: u64,
    },

    /// The destination account was never registered.
    #[error("account not registered: {0}")]
    NotRegistered(Address),

    /// Crediting the destination would exceed `u64::MAX`.
    #[error("balance overflow: {account} holds {current}, credit {credit}")]
    Overflow {
        /// The account that was being credited.
        account: Address,
        /// Its balance before the failed credit.
        current: u64,
        /// The amount that caused the overflow.
        credit: u64,
    },
}

// ---------------------------------------------------------------------------
// ValueTransfer
// ---------------------------------------------------------------------------

/// Opaque fund-movement primitive.
pub trait ValueTransfer {
    /// Opens an account so it can receive funds. Idempotent.
    fn register(&mut self, account: &Address) -> Result<(), TransferError>;

    /// Returns `true` if `account` has been registered.
    fn is_registered(&self, account: &Address) -> bool;

    /// Current balance of `account`; zero for accounts never seen.
    fn balance(&self, account: &Address) -> u64;

    /// Moves `amount` out of `from`'s account into `to`.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::InsufficientBalance`] if `from` can't cover
    /// `amount`, [`TransferError::NotRegistered`] if `to` was never
    /// registered, and [`TransferError::Overflow`] if the credit would wrap.
    /// On error, no balance changes.
    fn transfer(&mut self, from: &Signer, to: &Address, amount: u64)
        -> Result<(), TransferError>;
}

// ---------------------------------------------------------------------------
// InMemoryBank
// ---------------------------------------------------------------------------

/// Process-local balance book.
///
/// Total supply only changes through [`mint`](Self::mint); transfers
/// conserve it exactly.
#[derive(Clone, Debug, Default)]
pub struct InMemoryBank {
    balances: HashMap<Address, u64>,
}

impl InMemoryBank {
    /// Creates an empty bank with no registered accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates new funds in `to`'s account, registering it if needed.
    ///
    /// Returns the account's new balance.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::Overflow`] if the balance would exceed
    /// `u64::MAX`.
    pub fn mint(&mut self, to: &Address, amount: u64) -> Result<u64, TransferError> {
        let balance = self.balances.entry(to.clone()).or_insert(0);
        let new_balance = balance
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow {
                account: to.clone(),
                current: *balance,
                credit: amount,
            })?;
        *balance = new_balance;
        Ok(new_balance)
    }

    /// Sum of every balance in the book.
    ///
    /// Saturates rather than wrapping; a saturated value means someone
    /// minted more than `u64::MAX` across accounts.
    pub fn total_supply(&self) -> u64 {
        self.balances
            .values()
            .fold(0u64, |acc, b| acc.saturating_add(*b))
    }

    /// Number of registered accounts.
    pub fn account_count(&self) -> usize {
        self.balances.len()
    }
}

impl ValueTransfer for InMemoryBank {
    fn register(&mut self, account: &Address) -> Result<(), TransferError> {
        self.balances.entry(account.clone()).or_insert(0);
        Ok(())
    }

    fn is_registered(&self, account: &Address) -> bool {
        self.balances.contains_key(account)
    }

    fn balance(&self, account: &Address) -> u64 {
        self.balances.get(account).copied().unwrap_or(0)
    }

    fn transfer(
        &mut self,
        from: &Signer,
        to: &Address,
        amount: u64,
    ) -> Result<(), TransferError> {
        let sender = from.address();
        let available = self.balance(sender);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: sender.clone(),
                available,
                requested: amount,
            });
        }

        let current = match self.balances.get(to) {
            Some(b) => *b,
            None => return Err(TransferError::NotRegistered(to.clone())),
        };

        if amount == 0 || sender == to {
            return Ok(());
        }

        let credited = current
            .checked_add(amount)
            .ok_or_else(|| TransferError::Overflow {
                account: to.clone(),
                current,
                credit: amount,
            })?;

        // Both sides validated; commit.
        self.balances.insert(sender.clone(), available - amount);
        self.balances.insert(to.clone(), credited);

        debug!(from = %sender, to = %to, amount, "value transferred");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
