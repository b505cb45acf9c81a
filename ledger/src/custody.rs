//! # Custody Adapter
//!
//! The ledger never holds external tokens itself. Wrapping and unwrapping
//! delegate the external leg to a [`Custody`] implementation that moves
//! the real funds between a holder and the vault named in token info.
//!
//! The engine calls custody while it still holds the record locks and
//! before it commits, so a custody failure leaves the ledger untouched.
//!
//! [`LocalCustody`] is a self-contained implementation over any
//! [`Store`]: external holdings live at addresses derived from
//! `(mint, holder)` under their own seed. It backs the node's devnet mode
//! and the test suite.

use parking_lot::Mutex;
use thiserror::Error;

use crate::address::Address;
use crate::config::CUSTODY_HOLDING_SEED;
use crate::storage::{decode, encode, Store, StoreError, WriteSet};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported by a custody backend.
#[derive(Debug, Error)]
pub enum CustodyError {
    /// The source holding cannot cover the requested amount.
    #[error("insufficient external funds: available {available}, requested {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    /// The destination holding would overflow.
    #[error("external holding overflow")]
    Overflow,

    /// The backend refused the movement for its own reasons.
    #[error("custody rejected request: {0}")]
    Rejected(String),

    #[error("custody storage error: {0}")]
    Storage(#[from] StoreError),
}

// ---------------------------------------------------------------------------
// Custody trait
// ---------------------------------------------------------------------------

/// Moves external tokens into and out of the vault.
pub trait Custody: Send + Sync {
    /// Moves `amount` of `mint` from `from`'s external holding into `vault`.
    fn deposit(
        &self,
        mint: &Address,
        from: &Address,
        vault: &Address,
        amount: u64,
    ) -> Result<(), CustodyError>;

    /// Moves `amount` of `mint` out of `vault` into `to`'s external holding.
    fn withdraw(
        &self,
        mint: &Address,
        vault: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), CustodyError>;
}

// ---------------------------------------------------------------------------
// LocalCustody
// ---------------------------------------------------------------------------

/// Custody over a local [`Store`], holding balances per `(mint, holder)`.
pub struct LocalCustody<S: Store> {
    store: S,
    /// Serializes read-modify-write of holdings.
    write_lock: Mutex<()>,
}

impl<S: Store> LocalCustody<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Storage address of `holder`'s holding of `mint`.
    pub fn holding_address(mint: &Address, holder: &Address) -> Address {
        Address::derive(CUSTODY_HOLDING_SEED, &[mint.as_bytes(), holder.as_bytes()])
    }

    /// Current external balance of `holder` in `mint`.
    pub fn holding(&self, mint: &Address, holder: &Address) -> Result<u64, CustodyError> {
        self.read(&Self::holding_address(mint, holder))
    }

    /// Credits `holder` with freshly issued external tokens. Faucet for
    /// devnets and tests; there is no counterpart debit.
    pub fn fund(&self, mint: &Address, holder: &Address, amount: u64) -> Result<u64, CustodyError> {
        let _guard = self.write_lock.lock();
        let address = Self::holding_address(mint, holder);
        let updated = self
            .read(&address)?
            .checked_add(amount)
            .ok_or(CustodyError::Overflow)?;

        let mut writes = WriteSet::new();
        writes.put_raw(address, encode(&updated)?);
        self.store.commit(writes)?;

        tracing::debug!(%mint, %holder, amount, "external holding funded");
        Ok(updated)
    }

    fn read(&self, address: &Address) -> Result<u64, CustodyError> {
        match self.store.get(address)? {
            Some(bytes) => Ok(decode(&bytes)?),
            None => Ok(0),
        }
    }

    /// Moves `amount` between two distinct holdings in one commit.
    fn move_funds(
        &self,
        mint: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), CustodyError> {
        if from == to {
            return Err(CustodyError::Rejected(format!(
                "source and destination are the same holding ({from})"
            )));
        }

        let _guard = self.write_lock.lock();
        let from_address = Self::holding_address(mint, from);
        let to_address = Self::holding_address(mint, to);

        let available = self.read(&from_address)?;
        if available < amount {
            return Err(CustodyError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        let credited = self
            .read(&to_address)?
            .checked_add(amount)
            .ok_or(CustodyError::Overflow)?;

        let mut writes = WriteSet::new();
        writes.put_raw(from_address, encode(&(available - amount))?);
        writes.put_raw(to_address, encode(&credited)?);
        self.store.commit(writes)?;
        Ok(())
    }
}

impl<S: Store> Custody for LocalCustody<S> {
    fn deposit(
        &self,
        mint: &Address,
        from: &Address,
        vault: &Address,
        amount: u64,
    ) -> Result<(), CustodyError> {
        self.move_funds(mint, from, vault, amount)
    }

    fn withdraw(
        &self,
        mint: &Address,
        vault: &Address,
        to: &Address,
        amount: u64,
    ) -> Result<(), CustodyError> {
        self.move_funds(mint, vault, to, amount)
    }
}
