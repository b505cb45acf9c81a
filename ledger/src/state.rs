//! # Ledger Records
//!
//! The three record types the engine reads and writes:
//!
//! ```text
//! BalanceAccount  : one per owner            (seed "createAccount")
//! AllowanceRecord : one per (owner, spender) (seed "approveAccount")
//! TokenInfo       : exactly one per ledger   (seed "tokenInfo")
//! ```
//!
//! Records know their own [`RecordKey`], so a record can be written back
//! without the caller re-deriving its address. The arithmetic helpers here
//! only mutate `self` after the check passes, which lets the engine work on
//! copies and throw them away on error.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::address::{Address, RecordKey};
use crate::config::{MAX_DECIMALS, MAX_NAME_LENGTH, MAX_SYMBOL_LENGTH};
use crate::custody::CustodyError;
use crate::error::{checked_credit, LedgerError, LedgerResult};

/// A value that lives at a derived storage address.
pub trait Record: Serialize + DeserializeOwned {
    /// Key this record is stored under.
    fn record_key(&self) -> RecordKey;

    /// Storage address of this record.
    fn address(&self) -> Address {
        self.record_key().address()
    }
}

// ---------------------------------------------------------------------------
// BalanceAccount
// ---------------------------------------------------------------------------

/// Per-owner token balance in the smallest unit.
///
/// `wrapped` is the part of `balance` backed by a deposit into the vault.
/// Only those units can be withdrawn. It never exceeds `balance`, and the
/// sum over all accounts equals [`TokenInfo::wrapped_supply`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAccount {
    /// Identity allowed to spend from this account.
    pub owner: Address,
    /// Current balance.
    pub balance: u64,
    /// Redeemable part of `balance`.
    pub wrapped: u64,
}

impl BalanceAccount {
    /// A fresh zero-balance account.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            balance: 0,
            wrapped: 0,
        }
    }

    /// Adds `amount` unbacked units, failing on overflow. Returns the new
    /// balance.
    pub fn credit(&mut self, amount: u64) -> LedgerResult<u64> {
        self.balance = checked_credit(self.balance, amount)?;
        Ok(self.balance)
    }

    /// Adds `amount` units backed by a deposit. Returns the new balance.
    pub fn credit_wrapped(&mut self, amount: u64) -> LedgerResult<u64> {
        let balance = checked_credit(self.balance, amount)?;
        let wrapped = checked_credit(self.wrapped, amount)?;
        self.balance = balance;
        self.wrapped = wrapped;
        Ok(self.balance)
    }

    /// Removes `amount` wrapped units for a withdrawal. Returns the new
    /// balance.
    ///
    /// Fails with `InsufficientBalance` if the balance is too low, then
    /// with `CustodyFailure` if too few of the units are redeemable.
    pub fn debit_wrapped(&mut self, amount: u64) -> LedgerResult<u64> {
        self.ensure_covers(amount)?;
        if self.wrapped < amount {
            return Err(LedgerError::CustodyFailure(CustodyError::InsufficientFunds {
                available: self.wrapped,
                requested: amount,
            }));
        }
        self.balance -= amount;
        self.wrapped -= amount;
        Ok(self.balance)
    }

    /// Moves `amount` into `dest`. Unbacked units leave first, so wrapped
    /// units only move once the sender has no other units left to give.
    /// Both sides are checked before either changes.
    pub fn move_to(&mut self, dest: &mut BalanceAccount, amount: u64) -> LedgerResult<()> {
        self.ensure_covers(amount)?;
        let remaining = self.balance - amount;
        let wrapped_out = self.wrapped.saturating_sub(remaining);

        let dest_balance = checked_credit(dest.balance, amount)?;
        let dest_wrapped = checked_credit(dest.wrapped, wrapped_out)?;

        self.balance = remaining;
        self.wrapped -= wrapped_out;
        dest.balance = dest_balance;
        dest.wrapped = dest_wrapped;
        Ok(())
    }

    /// Fails with `InsufficientBalance` unless `balance >= amount`.
    pub fn ensure_covers(&self, amount: u64) -> LedgerResult<()> {
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                available: self.balance,
                requested: amount,
            });
        }
        Ok(())
    }
}

impl Record for BalanceAccount {
    fn record_key(&self) -> RecordKey {
        RecordKey::Balance { owner: self.owner }
    }
}

// ---------------------------------------------------------------------------
// AllowanceRecord
// ---------------------------------------------------------------------------

/// Spending limit `owner` granted to `spender`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRecord {
    pub owner: Address,
    pub spender: Address,
    /// Remaining amount `spender` may move out of `owner`'s account.
    pub amount: u64,
}

impl AllowanceRecord {
    pub fn new(owner: Address, spender: Address, amount: u64) -> Self {
        Self {
            owner,
            spender,
            amount,
        }
    }

    /// Fails with `AllowanceExceeded` unless `amount` fits the allowance.
    pub fn ensure_covers(&self, amount: u64) -> LedgerResult<()> {
        if self.amount < amount {
            return Err(LedgerError::AllowanceExceeded {
                allowed: self.amount,
                requested: amount,
            });
        }
        Ok(())
    }

    /// Consumes `amount` of the allowance. Returns what is left.
    pub fn spend(&mut self, amount: u64) -> LedgerResult<u64> {
        self.ensure_covers(amount)?;
        self.amount -= amount;
        Ok(self.amount)
    }
}

impl Record for AllowanceRecord {
    fn record_key(&self) -> RecordKey {
        RecordKey::Allowance {
            owner: self.owner,
            spender: self.spender,
        }
    }
}

// ---------------------------------------------------------------------------
// TokenMetadata / TokenInfo
// ---------------------------------------------------------------------------

/// Display metadata supplied at initialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl TokenMetadata {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
        }
    }

    /// Checks lengths and decimal range.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.name.trim().is_empty() || self.name.len() > MAX_NAME_LENGTH {
            return Err(LedgerError::InvalidMetadata(format!(
                "name must be 1..={MAX_NAME_LENGTH} bytes"
            )));
        }
        if self.symbol.trim().is_empty() || self.symbol.len() > MAX_SYMBOL_LENGTH {
            return Err(LedgerError::InvalidMetadata(format!(
                "symbol must be 1..={MAX_SYMBOL_LENGTH} bytes"
            )));
        }
        if self.decimals > MAX_DECIMALS {
            return Err(LedgerError::InvalidMetadata(format!(
                "decimals must be at most {MAX_DECIMALS}"
            )));
        }
        Ok(())
    }
}

/// The ledger's single metadata and supply record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// Identity that initialized the token. Minting authority under the
    /// `holder` and `admin` policies.
    pub admin: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Units minted or wrapped since initialization, less units withdrawn.
    /// Mints made before `initialize` are not counted.
    pub total_supply: u64,
    /// Internal units created by deposit and not yet withdrawn.
    pub wrapped_supply: u64,
    /// External token denomination this ledger wraps.
    pub mint: Address,
    /// Custody account holding the wrapped external tokens.
    pub vault: Address,
    pub created_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(admin: Address, metadata: TokenMetadata, mint: Address, vault: Address) -> Self {
        Self {
            admin,
            name: metadata.name,
            symbol: metadata.symbol,
            decimals: metadata.decimals,
            total_supply: 0,
            wrapped_supply: 0,
            mint,
            vault,
            created_at: Utc::now(),
        }
    }

    /// Accounts for freshly minted units.
    pub fn record_mint(&mut self, amount: u64) -> LedgerResult<()> {
        self.total_supply = checked_credit(self.total_supply, amount)?;
        Ok(())
    }

    /// Accounts for units wrapped by a deposit. Checks both counters
    /// before touching either.
    pub fn record_wrap(&mut self, amount: u64) -> LedgerResult<()> {
        let total = checked_credit(self.total_supply, amount)?;
        let wrapped = checked_credit(self.wrapped_supply, amount)?;
        self.total_supply = total;
        self.wrapped_supply = wrapped;
        Ok(())
    }

    /// Accounts for units unwrapped by a withdrawal.
    pub fn record_unwrap(&mut self, amount: u64) -> LedgerResult<()> {
        if self.wrapped_supply < amount || self.total_supply < amount {
            return Err(LedgerError::CustodyFailure(
                CustodyError::InsufficientFunds {
                    available: self.wrapped_supply,
                    requested: amount,
                },
            ));
        }
        self.total_supply -= amount;
        self.wrapped_supply -= amount;
        Ok(())
    }
}

impl Record for TokenInfo {
    fn record_key(&self) -> RecordKey {
        RecordKey::TokenInfo
    }
}
