//! # Account Identities
//!
//! An [`Address`] names an account: a distributor, a recipient, or an
//! escrow account owned by a ledger. The ledger never interprets it
//! beyond equality and ordering, so hosts can use hex-encoded public keys
//! or any other stable identifier.
//!
//! A [`Signer`] is what the host hands us after it authenticated a caller.
//! Holding one for an address is the only way to move funds out of that
//! address. Escrow accounts are the exception to host-made signers: only
//! an [`EscrowAuthority`] can produce a signer for one.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{ESCROW_ADDRESS_PREFIX, ESCROW_DERIVATION_SEPARATOR};
use crate::hash::blake3_hash_parts;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Opaque account identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a host-supplied identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if this address was produced by [`derive_escrow_address`].
    pub fn is_escrow(&self) -> bool {
        self.0.starts_with(ESCROW_ADDRESS_PREFIX)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Address {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Errors from constructing a [`Signer`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Escrow accounts are signed for by their [`EscrowAuthority`] only.
    #[error("cannot vouch for escrow account {0}")]
    EscrowAccount(Address),
}

/// Authenticated caller identity.
///
/// The host constructs a `Signer` once it has verified the caller (a
/// signature check, a session, whatever the deployment uses). Anything
/// accepting `&Signer` trusts that verification already happened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signer {
    address: Address,
}

impl Signer {
    /// Vouches for `address` as the current caller.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::EscrowAccount`] for escrow addresses.
    pub fn new(address: impl Into<Address>) -> Result<Self, SignerError> {
        let address = address.into();
        if address.is_escrow() {
            return Err(SignerError::EscrowAccount(address));
        }
        Ok(Self { address })
    }

    /// The address this signer speaks for.
    pub fn address(&self) -> &Address {
        &self.address
    }
}

// ---------------------------------------------------------------------------
// Escrow derivation
// ---------------------------------------------------------------------------

/// Derives the escrow account owned by `distributor`'s ledger.
///
/// ```text
/// escrow = "escrow:" || hex(BLAKE3(distributor || 0x00 || seed))
/// ```
///
/// Deterministic: the same distributor and seed always land on the same
/// account, which is what lets a ledger be re-opened from storage and
/// still find its funds.
pub fn derive_escrow_address(distributor: &Address, seed: &str) -> Address {
    let digest = blake3_hash_parts(&[
        distributor.as_str().as_bytes(),
        &[ESCROW_DERIVATION_SEPARATOR][..],
        seed.as_bytes(),
    ]);
    Address(format!("{}{}", ESCROW_ADDRESS_PREFIX, hex::encode(digest)))
}

/// Signing capability over one escrow account.
///
/// The only source of a [`Signer`] for an escrow address. Whoever holds the
/// authority can move the escrow's funds, so its owner must keep it to
/// itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowAuthority {
    account: Address,
}

impl EscrowAuthority {
    /// The authority over `distributor`'s escrow account under `seed`.
    pub fn derive(distributor: &Address, seed: &str) -> Self {
        Self {
            account: derive_escrow_address(distributor, seed),
        }
    }

    /// The escrow account this authority controls.
    pub fn account(&self) -> &Address {
        &self.account
    }

    /// A signer for the escrow account.
    pub fn signer(&self) -> Signer {
        Signer {
            address: self.account.clone(),
        }
    }
}
