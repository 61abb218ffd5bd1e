//! # Ledger Store
//!
//! One [`Ledger`] per distributor, keyed by the distributor's address. The
//! distribution service checks existence explicitly before creating or
//! touching a ledger; there is no implicit global table.
//!
//! Two implementations ship here:
//!
//! - [`MemoryLedgerStore`] — a `HashMap`, for tests and hosts that keep
//!   state elsewhere.
//! - [`SledLedgerStore`] — sled's embedded key-value store, one tree:
//!
//! | Tree      | Key                     | Value            |
//! |-----------|-------------------------|------------------|
//! | `ledgers` | distributor (UTF-8)     | `bincode(Ledger)`|
//!
//! Saves are flushed before returning, so a ledger the service reported as
//! saved survives a restart.

use std::collections::HashMap;
use std::path::Path;

use giftlock_primitives::Address;
use sled::{Db, Tree};
use thiserror::Error;

use crate::gift_distribution::Ledger;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur while reading or writing ledgers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// LedgerStore
// ---------------------------------------------------------------------------

/// Keyed persistence for ledgers.
pub trait LedgerStore {
    /// Returns `true` if a ledger exists for `distributor`.
    fn contains(&self, distributor: &Address) -> StoreResult<bool>;

    /// Loads the ledger for `distributor`, if any.
    fn load(&self, distributor: &Address) -> StoreResult<Option<Ledger>>;

    /// Inserts or overwrites the ledger under its distributor's key.
    fn save(&mut self, ledger: &Ledger) -> StoreResult<()>;
}

// ---------------------------------------------------------------------------
// MemoryLedgerStore
// ---------------------------------------------------------------------------

/// In-process ledger store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    ledgers: HashMap<Address, Ledger>,
}

impl MemoryLedgerStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored ledgers.
    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    /// Returns `true` if no ledgers are stored.
    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn contains(&self, distributor: &Address) -> StoreResult<bool> {
        Ok(self.ledgers.contains_key(distributor))
    }

    fn load(&self, distributor: &Address) -> StoreResult<Option<Ledger>> {
        Ok(self.ledgers.get(distributor).cloned())
    }

    fn save(&mut self, ledger: &Ledger) -> StoreResult<()> {
        self.ledgers
            .insert(ledger.distributor().clone(), ledger.clone());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SledLedgerStore
// ---------------------------------------------------------------------------

/// Ledger store on sled.
///
/// Cloning is cheap; clones share the same database handle.
#[derive(Debug, Clone)]
pub struct SledLedgerStore {
    db: Db,
    ledgers: Tree,
}

impl SledLedgerStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a store that lives in memory and vanishes when dropped.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    /// Opens the `ledgers` tree inside an existing sled database, so the
    /// store can share a database with other data.
    pub fn from_db(db: Db) -> StoreResult<Self> {
        let ledgers = db.open_tree("ledgers")?;
        Ok(Self { db, ledgers })
    }
}

impl LedgerStore for SledLedgerStore {
    fn contains(&self, distributor: &Address) -> StoreResult<bool> {
        Ok(self.ledgers.contains_key(distributor.as_str().as_bytes())?)
    }

    fn load(&self, distributor: &Address) -> StoreResult<Option<Ledger>> {
        match self.ledgers.get(distributor.as_str().as_bytes())? {
            Some(bytes) => {
                let ledger: Ledger = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(ledger))
            }
            None => Ok(None),
        }
    }

    fn save(&mut self, ledger: &Ledger) -> StoreResult<()> {
        let bytes =
            bincode::serialize(ledger).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.ledgers
            .insert(ledger.distributor().as_str().as_bytes(), bytes)?;
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
