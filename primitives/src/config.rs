//! # Constants
//!
//! Every magic value the ledger depends on lives here. Changing the escrow
//! seed or prefix after ledgers exist moves every escrow address, so treat
//! them as frozen once real funds are involved.

// ---------------------------------------------------------------------------
// Escrow Accounts
// ---------------------------------------------------------------------------

/// Seed mixed into escrow-address derivation when the host doesn't pick one.
pub const DEFAULT_ESCROW_SEED: &str = "giftlock-escrow-v1";

/// Prefix on every derived escrow address, so they can't be mistaken for
/// user accounts in logs or balance dumps.
pub const ESCROW_ADDRESS_PREFIX: &str = "escrow:";

/// Domain separator between the distributor and the seed in the hash
/// preimage. Stops `("ab", "c")` and `("a", "bc")` from colliding.
pub const ESCROW_DERIVATION_SEPARATOR: u8 = 0x00;

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "giftlock_contracts=info,giftlock_primitives=info";
