//! # Gift Distribution Contract
//!
//! A distributor parks funds in escrow, earmarked per recipient, each gift
//! unlocking at its own timestamp. The lifecycle is:
//!
//! 1. **Initialize** — the distributor opens a ledger with an initial batch
//!    of gifts and deposits their total into a fresh escrow account.
//! 2. **Add or replace** — the distributor adds a gift, or replaces the one
//!    a recipient already has.
//! 3. **Remove** — the distributor pulls a gift back; its amount returns
//!    from escrow. Allowed whether or not the gift has unlocked.
//! 4. **Claim** — once the unlock time has passed, the recipient takes the
//!    gift. Exactly once.
//!
//! One ledger per distributor, one gift per (distributor, recipient) pair.
//! No partial claims, no interest, one asset.
//!
//! ## Escrow authority
//!
//! Each ledger owns an [`EscrowAuthority`] for its escrow account. It is
//! the only thing that can sign transfers out of escrow, and it never
//! leaves the ledger: recipients prove who they are with their own
//! [`Signer`], and the ledger pays them using its authority. Escrow
//! accounts never act as callers or recipients; every operation refuses
//! them with [`GiftError::EscrowAccount`].
//!
//! ## Atomicity
//!
//! Every precondition, including whether the paying account covers the
//! amount, is checked before any account is registered or funds move.
//! Transfers run before the gift map changes and the ledger is persisted
//! last. If the store refuses the save, the transfer is reversed before
//! the error is returned, so a failed call leaves balances and stored
//! state as they were. The only leftover of a failed save is the payee's
//! account registration, which is idempotent and holds nothing.

use std::collections::BTreeMap;

use giftlock_primitives::config::DEFAULT_ESCROW_SEED;
use giftlock_primitives::{
    Address, Clock, EscrowAuthority, Signer, TransferError, ValueTransfer,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::store::{LedgerStore, StoreError};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during gift distribution operations.
#[derive(Debug, Error)]
pub enum GiftError {
    /// The distributor already has a ledger.
    #[error("ledger already initialized for distributor {0}")]
    AlreadyInitialized(Address),

    /// The distributor has no ledger yet.
    #[error("no ledger initialized for distributor {0}")]
    NotInitialized(Address),

    /// The initialization batch arrays disagree on length.
    #[error(
        "length mismatch: {recipients} recipients, {amounts} amounts, {unlock_times} unlock times"
    )]
    LengthMismatch {
        /// Number of recipients supplied.
        recipients: usize,
        /// Number of amounts supplied.
        amounts: usize,
        /// Number of unlock times supplied.
        unlock_times: usize,
    },

    /// The ledger holds no gift for this recipient.
    #[error("no gift found for recipient {0}")]
    GiftNotFound(Address),

    /// The gift exists but its unlock time is still ahead.
    #[error("gift locked until {unlock_time}, current time is {now}")]
    NotYetUnlocked {
        /// When the gift becomes claimable.
        unlock_time: u64,
        /// Clock reading at the time of the attempt.
        now: u64,
    },

    /// A recipient appears more than once in an initialization batch and
    /// [`LedgerConfig::reject_duplicate_recipients`] is set.
    #[error("duplicate recipient in batch: {0}")]
    DuplicateRecipient(Address),

    /// A zero-amount gift was offered and
    /// [`LedgerConfig::reject_zero_amounts`] is set.
    #[error("zero-amount gift for recipient {0}")]
    ZeroAmount(Address),

    /// An escrow account was offered as a caller or a recipient.
    #[error("escrow account {0} cannot act as caller or recipient")]
    EscrowAccount(Address),

    /// Summing gift amounts would exceed `u64::MAX`.
    #[error("amount overflow: gift total exceeds u64::MAX")]
    AmountOverflow,

    /// The value transfer service refused a transfer.
    #[error(transparent)]
    Transfer(#[from] TransferError),

    /// The ledger store failed to read or write.
    #[error("ledger store error: {0}")]
    Store(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Knobs for a [`GiftDistribution`] service.
///
/// The defaults reproduce the permissive behavior: duplicates in an
/// initialization batch are accepted (last one wins) and zero amounts
/// are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Seed mixed into every escrow-address derivation.
    pub escrow_seed: String,

    /// Refuse initialization batches that name a recipient twice.
    pub reject_duplicate_recipients: bool,

    /// Refuse gifts with `amount == 0`.
    pub reject_zero_amounts: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            escrow_seed: DEFAULT_ESCROW_SEED.to_string(),
            reject_duplicate_recipients: false,
            reject_zero_amounts: false,
        }
    }
}

impl LedgerConfig {
    /// Parses a JSON config document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// An amount earmarked for one recipient, claimable from `unlock_time` on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    /// Amount in the smallest unit.
    pub amount: u64,
    /// Earliest claim time, epoch seconds.
    pub unlock_time: u64,
}

impl Gift {
    /// Creates a gift.
    pub fn new(amount: u64, unlock_time: u64) -> Self {
        Self {
            amount,
            unlock_time,
        }
    }

    /// Returns `true` if the gift can be claimed at `now`.
    pub fn is_unlocked(&self, now: u64) -> bool {
        now >= self.unlock_time
    }
}

/// Per-distributor record of outstanding gifts plus escrow authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ledger {
    distributor: Address,
    escrow: EscrowAuthority,
    gifts: BTreeMap<Address, Gift>,
    created_at: u64,
}

impl Ledger {
    fn new(distributor: Address, escrow: EscrowAuthority, created_at: u64) -> Self {
        Self {
            distributor,
            escrow,
            gifts: BTreeMap::new(),
            created_at,
        }
    }

    /// The distributor that owns this ledger.
    pub fn distributor(&self) -> &Address {
        &self.distributor
    }

    /// The escrow account holding the pooled funds.
    pub fn escrow_address(&self) -> &Address {
        self.escrow.account()
    }

    /// The gift currently held for `recipient`, if any.
    pub fn gift(&self, recipient: &Address) -> Option<Gift> {
        self.gifts.get(recipient).copied()
    }

    /// All outstanding gifts, ordered by recipient.
    pub fn gifts(&self) -> impl Iterator<Item = (&Address, &Gift)> {
        self.gifts.iter()
    }

    /// Number of outstanding gifts.
    pub fn len(&self) -> usize {
        self.gifts.len()
    }

    /// Returns `true` if no gifts are outstanding.
    pub fn is_empty(&self) -> bool {
        self.gifts.is_empty()
    }

    /// Clock reading when the ledger was initialized.
    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    /// Sum of all outstanding gift amounts, or `None` on overflow.
    pub fn total_allocated(&self) -> Option<u64> {
        self.gifts
            .values()
            .try_fold(0u64, |acc, g| acc.checked_add(g.amount))
    }
}

/// A committed transfer, undone if the ledger can't be saved afterwards.
struct Reversal {
    from: Signer,
    to: Address,
    amount: u64,
}

// ---------------------------------------------------------------------------
// GiftDistribution
// ---------------------------------------------------------------------------

/// The distribution service: owns the collaborators and runs the four
/// state transitions against one ledger per distributor.
///
/// Every mutating call takes `&mut self`, which is how calls against a
/// ledger are serialized. Hosts sharing one service across threads wrap
/// it in their own lock.
#[derive(Debug)]
pub struct GiftDistribution<V, C, S> {
    bank: V,
    clock: C,
    store: S,
    config: LedgerConfig,
}

impl<V, C, S> GiftDistribution<V, C, S>
where
    V: ValueTransfer,
    C: Clock,
    S: LedgerStore,
{
    /// Creates a service with the default [`LedgerConfig`].
    pub fn new(bank: V, clock: C, store: S) -> Self {
        Self::with_config(bank, clock, store, LedgerConfig::default())
    }

    /// Creates a service with an explicit configuration.
    pub fn with_config(bank: V, clock: C, store: S, config: LedgerConfig) -> Self {
        Self {
            bank,
            clock,
            store,
            config,
        }
    }

    /// Opens a ledger for `distributor` and escrows the initial batch.
    ///
    /// `recipients[i]` receives `amounts[i]`, unlocking at
    /// `unlock_times[i]`. A recipient named twice keeps only its last
    /// entry, but every input amount is still deposited: the surplus stays
    /// in escrow and is reported by [`escrow_surplus`](Self::escrow_surplus).
    /// Set [`LedgerConfig::reject_duplicate_recipients`] to refuse such
    /// batches instead.
    ///
    /// # Errors
    ///
    /// Returns [`GiftError::AlreadyInitialized`] if the distributor already
    /// has a ledger, [`GiftError::LengthMismatch`] if the arrays disagree,
    /// [`GiftError::AmountOverflow`] if the amounts don't fit in a `u64`,
    /// and [`GiftError::Transfer`] if the deposit is refused. A failed call
    /// leaves no ledger and no escrow registration behind.
    pub fn initialize(
        &mut self,
        distributor: &Signer,
        recipients: &[Address],
        amounts: &[u64],
        unlock_times: &[u64],
    ) -> Result<(), GiftError> {
        let owner = Self::caller(distributor)?;
        if self.store.contains(owner)? {
            return Err(GiftError::AlreadyInitialized(owner.clone()));
        }

        if recipients.len() != amounts.len() || recipients.len() != unlock_times.len() {
            return Err(GiftError::LengthMismatch {
                recipients: recipients.len(),
                amounts: amounts.len(),
                unlock_times: unlock_times.len(),
            });
        }

        let escrow = EscrowAuthority::derive(owner, &self.config.escrow_seed);
        let mut ledger = Ledger::new(owner.clone(), escrow, self.clock.now());

        let mut deposit = 0u64;
        let mut superseded = 0u64;
        for ((recipient, &amount), &unlock_time) in
            recipients.iter().zip(amounts).zip(unlock_times)
        {
            Self::check_recipient(recipient)?;
            self.check_amount(recipient, amount)?;
            deposit = deposit
                .checked_add(amount)
                .ok_or(GiftError::AmountOverflow)?;

            let previous = ledger
                .gifts
                .insert(recipient.clone(), Gift::new(amount, unlock_time));
            if let Some(previous) = previous {
                if self.config.reject_duplicate_recipients {
                    return Err(GiftError::DuplicateRecipient(recipient.clone()));
                }
                superseded = superseded.saturating_add(previous.amount);
            }
        }

        if superseded > 0 || ledger.len() < recipients.len() {
            warn!(
                distributor = %owner,
                batch = recipients.len(),
                distinct = ledger.len(),
                surplus = superseded,
                "duplicate recipients in initialization batch; escrow holds unallocated surplus"
            );
        }

        self.ensure_funds(owner, deposit)?;
        self.bank.register(ledger.escrow_address())?;
        self.bank
            .transfer(distributor, ledger.escrow_address(), deposit)?;
        let reversal = Reversal {
            from: ledger.escrow.signer(),
            to: owner.clone(),
            amount: deposit,
        };
        self.persist(&ledger, Some(reversal))?;

        info!(
            distributor = %owner,
            escrow = %ledger.escrow_address(),
            gifts = ledger.len(),
            deposit,
            "gift ledger initialized"
        );
        Ok(())
    }

    /// Stores exactly `(amount, unlock_time)` for `recipient`, replacing
    /// any gift it already had.
    ///
    /// A new gift deposits `amount` into escrow. A replacement settles only
    /// the difference against the old gift's escrowed amount, so escrow
    /// keeps matching what the ledger owes. Returns the replaced gift.
    ///
    /// # Errors
    ///
    /// Returns [`GiftError::NotInitialized`] if the distributor has no
    /// ledger and [`GiftError::Transfer`] if the settlement is refused.
    pub fn add_or_replace_gift(
        &mut self,
        distributor: &Signer,
        recipient: Address,
        amount: u64,
        unlock_time: u64,
    ) -> Result<Option<Gift>, GiftError> {
        let owner = Self::caller(distributor)?;
        let mut ledger = self.load(owner)?;
        Self::check_recipient(&recipient)?;
        self.check_amount(&recipient, amount)?;

        let previous = ledger.gift(&recipient);
        let escrowed = previous.map_or(0, |g| g.amount);

        let reversal = if amount > escrowed {
            let delta = amount - escrowed;
            self.ensure_funds(owner, delta)?;
            self.bank
                .transfer(distributor, ledger.escrow_address(), delta)?;
            Some(Reversal {
                from: ledger.escrow.signer(),
                to: owner.clone(),
                amount: delta,
            })
        } else if escrowed > amount {
            let delta = escrowed - amount;
            self.ensure_funds(ledger.escrow_address(), delta)?;
            self.bank.register(owner)?;
            self.bank.transfer(&ledger.escrow.signer(), owner, delta)?;
            Some(Reversal {
                from: distributor.clone(),
                to: ledger.escrow_address().clone(),
                amount: delta,
            })
        } else {
            None
        };

        ledger
            .gifts
            .insert(recipient.clone(), Gift::new(amount, unlock_time));
        self.persist(&ledger, reversal)?;

        info!(
            distributor = %owner,
            recipient = %recipient,
            amount,
            unlock_time,
            replaced = previous.is_some(),
            "gift set"
        );
        Ok(previous)
    }

    /// Withdraws `recipient`'s gift and returns its amount to the
    /// distributor. The unlock time is not consulted.
    ///
    /// # Errors
    ///
    /// Returns [`GiftError::NotInitialized`] if the distributor has no
    /// ledger and [`GiftError::GiftNotFound`] if the recipient has no gift.
    pub fn remove_gift(
        &mut self,
        distributor: &Signer,
        recipient: &Address,
    ) -> Result<Gift, GiftError> {
        let owner = Self::caller(distributor)?;
        let mut ledger = self.load(owner)?;
        let gift = ledger
            .gift(recipient)
            .ok_or_else(|| GiftError::GiftNotFound(recipient.clone()))?;

        // Refunds always go to the distributor, whoever funded the gift.
        self.ensure_funds(ledger.escrow_address(), gift.amount)?;
        self.bank.register(owner)?;
        self.bank
            .transfer(&ledger.escrow.signer(), owner, gift.amount)?;
        ledger.gifts.remove(recipient);
        let reversal = Reversal {
            from: distributor.clone(),
            to: ledger.escrow_address().clone(),
            amount: gift.amount,
        };
        self.persist(&ledger, Some(reversal))?;

        info!(
            distributor = %owner,
            recipient = %recipient,
            amount = gift.amount,
            "gift removed and refunded"
        );
        Ok(gift)
    }

    /// Pays `recipient` their gift from `distributor`'s escrow and forgets
    /// it. Returns the amount paid.
    ///
    /// # Errors
    ///
    /// Returns [`GiftError::NotInitialized`] if the distributor has no
    /// ledger, [`GiftError::GiftNotFound`] if there is no gift (including
    /// one already claimed), and [`GiftError::NotYetUnlocked`] before the
    /// unlock time.
    pub fn claim(&mut self, recipient: &Signer, distributor: &Address) -> Result<u64, GiftError> {
        let claimant = Self::caller(recipient)?;
        let mut ledger = self.load(distributor)?;
        let gift = ledger
            .gift(claimant)
            .ok_or_else(|| GiftError::GiftNotFound(claimant.clone()))?;

        let now = self.clock.now();
        if !gift.is_unlocked(now) {
            return Err(GiftError::NotYetUnlocked {
                unlock_time: gift.unlock_time,
                now,
            });
        }

        self.ensure_funds(ledger.escrow_address(), gift.amount)?;
        self.bank.register(claimant)?;
        self.bank
            .transfer(&ledger.escrow.signer(), claimant, gift.amount)?;
        ledger.gifts.remove(claimant);
        let reversal = Reversal {
            from: recipient.clone(),
            to: ledger.escrow_address().clone(),
            amount: gift.amount,
        };
        self.persist(&ledger, Some(reversal))?;

        info!(
            distributor = %distributor,
            recipient = %claimant,
            amount = gift.amount,
            "gift claimed"
        );
        Ok(gift.amount)
    }

    // -- Queries ------------------------------------------------------------

    /// Returns `true` if `distributor` has a ledger.
    pub fn is_initialized(&self, distributor: &Address) -> Result<bool, GiftError> {
        Ok(self.store.contains(distributor)?)
    }

    /// The distributor's ledger, if it exists.
    pub fn ledger(&self, distributor: &Address) -> Result<Option<Ledger>, GiftError> {
        Ok(self.store.load(distributor)?)
    }

    /// The gift `recipient` holds in `distributor`'s ledger.
    ///
    /// # Errors
    ///
    /// Returns [`GiftError::NotInitialized`] if the distributor has no ledger.
    pub fn gift(
        &self,
        distributor: &Address,
        recipient: &Address,
    ) -> Result<Option<Gift>, GiftError> {
        Ok(self.load(distributor)?.gift(recipient))
    }

    /// Amount `recipient` could claim right now: the gift's amount once
    /// unlocked, otherwise zero.
    pub fn claimable(&self, distributor: &Address, recipient: &Address) -> Result<u64, GiftError> {
        let now = self.clock.now();
        let amount = self
            .gift(distributor, recipient)?
            .filter(|g| g.is_unlocked(now))
            .map_or(0, |g| g.amount);
        debug!(distributor = %distributor, recipient = %recipient, now, amount, "claimable");
        Ok(amount)
    }

    /// Current balance of the distributor's escrow account.
    pub fn escrow_balance(&self, distributor: &Address) -> Result<u64, GiftError> {
        let ledger = self.load(distributor)?;
        Ok(self.bank.balance(ledger.escrow_address()))
    }

    /// Escrowed funds not earmarked for any outstanding gift.
    ///
    /// Zero unless an initialization batch named a recipient twice or
    /// someone paid into the escrow account directly.
    pub fn escrow_surplus(&self, distributor: &Address) -> Result<u64, GiftError> {
        let ledger = self.load(distributor)?;
        let allocated = ledger
            .total_allocated()
            .ok_or(GiftError::AmountOverflow)?;
        Ok(self
            .bank
            .balance(ledger.escrow_address())
            .saturating_sub(allocated))
    }

    /// The value transfer service.
    pub fn bank(&self) -> &V {
        &self.bank
    }


    /// The clock used for unlock checks.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The ledger store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Shuts the service down, handing back its collaborators.
    pub fn into_parts(self) -> (V, C, S) {
        (self.bank, self.clock, self.store)
    }

    // -- Internals ----------------------------------------------------------

    fn load(&self, distributor: &Address) -> Result<Ledger, GiftError> {
        self.store
            .load(distributor)?
            .ok_or_else(|| GiftError::NotInitialized(distributor.clone()))
    }

    /// Saves `ledger`. If the store refuses, undoes `reversal` so the
    /// failed call leaves balances as they were.
    fn persist(&mut self, ledger: &Ledger, reversal: Option<Reversal>) -> Result<(), GiftError> {
        let err = match self.store.save(ledger) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        match reversal {
            Some(r) => match self.bank.transfer(&r.from, &r.to, r.amount) {
                Ok(()) => warn!(
                    distributor = %ledger.distributor(),
                    amount = r.amount,
                    error = %err,
                    "ledger save failed; transfer reversed"
                ),
                Err(undo) => error!(
                    distributor = %ledger.distributor(),
                    from = %r.from.address(),
                    to = %r.to,
                    amount = r.amount,
                    error = %err,
                    undo_error = %undo,
                    "ledger save failed and transfer could not be reversed"
                ),
            },
            None => warn!(
                distributor = %ledger.distributor(),
                error = %err,
                "ledger save failed"
            ),
        }
        Err(err.into())
    }

    /// The signer's address, refused if it belongs to an escrow account.
    fn caller(signer: &Signer) -> Result<&Address, GiftError> {
        let address = signer.address();
        if address.is_escrow() {
            return Err(GiftError::EscrowAccount(address.clone()));
        }
        Ok(address)
    }

    fn check_recipient(recipient: &Address) -> Result<(), GiftError> {
        if recipient.is_escrow() {
            return Err(GiftError::EscrowAccount(recipient.clone()));
        }
        Ok(())
    }

    /// Fails the same way the transfer would, but before any account is
    /// registered.
    fn ensure_funds(&self, from: &Address, amount: u64) -> Result<(), GiftError> {
        let available = self.bank.balance(from);
        if available < amount {
            return Err(TransferError::InsufficientBalance {
                account: from.clone(),
                available,
                requested: amount,
            }
            .into());
        }
        Ok(())
    }

    fn check_amount(&self, recipient: &Address, amount: u64) -> Result<(), GiftError> {
        if amount == 0 && self.config.reject_zero_amounts {
            return Err(GiftError::ZeroAmount(recipient.clone()));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
