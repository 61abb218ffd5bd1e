// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # giftlock Primitives
//!
//! The building blocks the gift distribution ledger leans on, kept apart
//! from the ledger itself so that hosts can swap any of them out:
//!
//! - **address** — Account identities, caller signers, escrow derivation.
//! - **hash** — BLAKE3 helpers. One hash function, used consistently.
//! - **transfer** — The value transfer seam and an in-memory implementation.
//! - **clock** — Wall-clock seconds, real or hand-cranked for tests.
//! - **config** — Constants shared across the workspace.
//! - **logging** — `tracing` subscriber bootstrap.
//!
//! ## Design Philosophy
//!
//! 1. Amounts are `u64` in the smallest unit. No floats, ever.
//! 2. Every arithmetic step on money is checked.
//! 3. A failed operation leaves no trace behind.

pub mod address;
pub mod clock;
pub mod config;
pub mod hash;
pub mod logging;
pub mod transfer;

pub use address::{derive_escrow_address, Address, EscrowAuthority, Signer, SignerError};
pub use clock::{Clock, ManualClock, SystemClock};
pub use transfer::{InMemoryBank, TransferError, ValueTransfer};
