// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # giftlock Contracts
//!
//! Time-locked gift distribution. A distributor escrows funds for a set of
//! recipients, each unlockable at its own timestamp; recipients claim once
//! unlocked, and the distributor can add, replace or withdraw gifts until
//! then.
//!
//! - **Gift Distribution** — the ledger, its escrow authority, and the four
//!   state transitions (initialize, add-or-replace, remove, claim).
//! - **Store** — keyed persistence of one ledger per distributor.
//!
//! ## Design Principles
//!
//! 1. All monetary sums are checked; overflow is an error, not a wrap.
//! 2. Preconditions first, transfers second, bookkeeping last. A failed
//!    call changes nothing.
//! 3. Escrow funds move only under the ledger's own authority.
//! 4. Every persisted type is serializable (serde) for storage and export.

pub mod gift_distribution;
pub mod store;

pub use gift_distribution::{Gift, GiftDistribution, GiftError, Ledger, LedgerConfig};
pub use store::{LedgerStore, MemoryLedgerStore, SledLedgerStore, StoreError};
