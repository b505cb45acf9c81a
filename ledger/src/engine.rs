//! # Ledger Engine
//!
//! The operation set over balance accounts, allowances and token info.
//!
//! ## Execution Model
//!
//! Every mutating operation follows the same shape:
//!
//! 1. Work out which record addresses it touches.
//! 2. Lock them through the [`LockTable`] (sorted, so no deadlocks).
//! 3. Load the records and run every check against local copies.
//! 4. Wrap/unwrap only: call [`Custody`].
//! 5. Commit the copies as one [`WriteSet`].
//!
//! Nothing reaches the store before step 5, so a failed check or a custody
//! refusal leaves state exactly as it was. Operations over disjoint records
//! never contend; overlapping ones serialize on the shared record locks.
//!
//! Account owners never change once written, so an operation may read an
//! owner before locking in order to derive further addresses (the
//! allowance key of `approve` and `transfer_from`).
//!
//! Callers name accounts by address. A slot only counts as a balance
//! account if the record stored there derives back to that address, so an
//! allowance or the token info can never be passed off as an account.

use crate::address::{Address, RecordKey};
use crate::config::{LedgerConfig, MintPolicy};
use crate::custody::{Custody, CustodyError};
use crate::error::{LedgerError, LedgerResult};
use crate::locks::LockTable;
use crate::state::{AllowanceRecord, BalanceAccount, TokenInfo, TokenMetadata};
use crate::storage::{load_record, Store, WriteSet};

/// The ledger: a store, a custody backend and the lock table that keeps
/// concurrent callers consistent.
///
/// `Ledger` is `Send + Sync` when its store and custody are, and is meant
/// to be shared behind an `Arc`.
pub struct Ledger<S: Store, C: Custody> {
    store: S,
    custody: C,
    config: LedgerConfig,
    locks: LockTable,
}

/// Custody cannot move funds between the vault and itself, so the vault
/// never acts as a depositor or withdrawal target.
fn ensure_not_vault(info: &TokenInfo, caller: &Address) -> LedgerResult<()> {
    if info.vault == *caller {
        return Err(LedgerError::CustodyFailure(CustodyError::Rejected(
            "vault cannot wrap or unwrap against itself".into(),
        )));
    }
    Ok(())
}

/// Runs `f`, logging a rejected precondition at debug level.
fn traced<T>(op: &'static str, f: impl FnOnce() -> LedgerResult<T>) -> LedgerResult<T> {
    f().map_err(|err| {
        tracing::debug!(op, kind = ?err.kind(), error = %err, "operation rejected");
        err
    })
}

impl<S: Store, C: Custody> Ledger<S, C> {
    pub fn new(store: S, custody: C, config: LedgerConfig) -> Self {
        Self {
            store,
            custody,
            config,
            locks: LockTable::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    // -- Addressing ---------------------------------------------------------

    /// Address of `owner`'s balance account.
    pub fn account_address(owner: &Address) -> Address {
        RecordKey::Balance { owner: *owner }.address()
    }

    /// Address of the allowance `owner` granted `spender`.
    pub fn allowance_address(owner: &Address, spender: &Address) -> Address {
        RecordKey::Allowance {
            owner: *owner,
            spender: *spender,
        }
        .address()
    }

    /// Address of the token info slot.
    pub fn token_info_address() -> Address {
        RecordKey::TokenInfo.address()
    }

    // -- Queries ------------------------------------------------------------

    /// The balance account at `address`, if any. A slot holding another
    /// record kind reads as no account.
    pub fn account(&self, address: &Address) -> LedgerResult<Option<BalanceAccount>> {
        Ok(load_record(&self.store, address)?)
    }

    /// The balance account owned by `owner`, if any.
    pub fn account_of(&self, owner: &Address) -> LedgerResult<Option<BalanceAccount>> {
        self.account(&Self::account_address(owner))
    }

    /// Balance of the account at `address`.
    pub fn balance(&self, address: &Address) -> LedgerResult<u64> {
        Ok(self.load_account(address)?.balance)
    }

    /// Balance of the account owned by `owner`.
    pub fn balance_of(&self, owner: &Address) -> LedgerResult<u64> {
        self.balance(&Self::account_address(owner))
    }

    /// Remaining allowance `owner` granted `spender`; zero if never approved.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> LedgerResult<u64> {
        Ok(self
            .load_allowance(owner, spender)?
            .map(|a| a.amount)
            .unwrap_or(0))
    }

    /// Token info, if initialized.
    pub fn token_info(&self) -> LedgerResult<Option<TokenInfo>> {
        Ok(load_record(&self.store, &Self::token_info_address())?)
    }

    fn load_account(&self, address: &Address) -> LedgerResult<BalanceAccount> {
        self.account(address)?.ok_or(LedgerError::AccountNotFound(*address))
    }

    fn load_allowance(
        &self,
        owner: &Address,
        spender: &Address,
    ) -> LedgerResult<Option<AllowanceRecord>> {
        Ok(load_record(&self.store, &Self::allowance_address(owner, spender))?)
    }

    fn require_token_info(&self) -> LedgerResult<TokenInfo> {
        self.token_info()?.ok_or(LedgerError::NotInitialized)
    }

    // -- Account lifecycle --------------------------------------------------

    /// Creates a zero-balance account for `owner` and returns its address.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyExists`] if `owner` already has one.
    pub fn create_account(&self, owner: &Address) -> LedgerResult<Address> {
        traced("create_account", || {
            let address = Self::account_address(owner);
            let set = self.locks.lock(&[address]);
            let _guards = set.acquire();

            if self.store.contains(&address)? {
                return Err(LedgerError::AlreadyExists(*owner));
            }

            let mut writes = WriteSet::new();
            writes.put(&BalanceAccount::new(*owner))?;
            self.store.commit(writes)?;

            tracing::info!(%owner, %address, "account created");
            Ok(address)
        })
    }

    /// Creates the token info record.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AlreadyInitialized`] on a second call,
    /// [`LedgerError::InvalidMetadata`] if the metadata is out of range.
    pub fn initialize(
        &self,
        admin: &Address,
        metadata: TokenMetadata,
        mint: &Address,
        vault: &Address,
    ) -> LedgerResult<TokenInfo> {
        traced("initialize", || {
            metadata.validate()?;

            let address = Self::token_info_address();
            let set = self.locks.lock(&[address]);
            let _guards = set.acquire();

            if self.store.contains(&address)? {
                return Err(LedgerError::AlreadyInitialized);
            }

            let info = TokenInfo::new(*admin, metadata, *mint, *vault);
            let mut writes = WriteSet::new();
            writes.put(&info)?;
            self.store.commit(writes)?;

            tracing::info!(
                %admin,
                name = %info.name,
                symbol = %info.symbol,
                decimals = info.decimals,
                %mint,
                %vault,
                "token initialized"
            );
            Ok(info)
        })
    }

    // -- Mint ---------------------------------------------------------------

    /// Credits `amount` to the account at `account`, subject to the
    /// configured [`MintPolicy`]. Returns the new balance.
    ///
    /// When token info exists its `total_supply` grows by the same amount;
    /// mints before `initialize` touch the balance only. Minted units are
    /// never redeemable through [`Ledger::withdraw`].
    pub fn mint(&self, caller: &Address, account: &Address, amount: u64) -> LedgerResult<u64> {
        traced("mint", || {
            let info_address = Self::token_info_address();
            let set = self.locks.lock(&[*account, info_address]);
            let _guards = set.acquire();

            let mut target = self.load_account(account)?;
            let mut info = self.token_info()?;

            let authorized = match self.config.mint_policy {
                MintPolicy::Open => true,
                MintPolicy::Holder => {
                    target.owner == *caller || info.as_ref().is_some_and(|i| i.admin == *caller)
                }
                MintPolicy::Admin => {
                    info.as_ref().ok_or(LedgerError::NotInitialized)?.admin == *caller
                }
            };
            if !authorized {
                return Err(LedgerError::Unauthorized);
            }

            let balance = target.credit(amount)?;
            let mut writes = WriteSet::new();
            if let Some(info) = info.as_mut() {
                info.record_mint(amount)?;
                writes.put(&*info)?;
            }
            writes.put(&target)?;
            self.store.commit(writes)?;

            tracing::info!(%caller, %account, amount, balance, "minted");
            Ok(balance)
        })
    }

    // -- Transfer -----------------------------------------------------------

    /// Moves `amount` from `from` to `to`. The caller must own `from`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Unauthorized`] if the caller is not the owner of
    /// `from`, [`LedgerError::InsufficientBalance`] if `from` cannot cover
    /// `amount`, [`LedgerError::AccountNotFound`] for a missing account.
    pub fn transfer(
        &self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> LedgerResult<()> {
        traced("transfer", || {
            let set = self.locks.lock(&[*from, *to]);
            let _guards = set.acquire();

            let mut source = self.load_account(from)?;
            let mut dest = self.load_account(to)?;

            if source.owner != *caller {
                return Err(LedgerError::Unauthorized);
            }
            source.ensure_covers(amount)?;

            if from == to {
                tracing::debug!(%from, amount, "self-transfer, nothing to move");
                return Ok(());
            }

            source.move_to(&mut dest, amount)?;

            let mut writes = WriteSet::new();
            writes.put(&source)?;
            writes.put(&dest)?;
            self.store.commit(writes)?;

            tracing::info!(%from, %to, amount, "transferred");
            Ok(())
        })
    }

    // -- Allowances ---------------------------------------------------------

    /// Sets the allowance the owner of `owner_account` grants `spender` to
    /// exactly `amount`, replacing any previous value.
    pub fn approve(
        &self,
        caller: &Address,
        owner_account: &Address,
        spender: &Address,
        amount: u64,
    ) -> LedgerResult<()> {
        traced("approve", || {
            let owner = self.load_account(owner_account)?.owner;
            if owner != *caller {
                return Err(LedgerError::Unauthorized);
            }

            let allowance_address = Self::allowance_address(&owner, spender);
            let set = self.locks.lock(&[allowance_address]);
            let _guards = set.acquire();

            let mut writes = WriteSet::new();
            writes.put(&AllowanceRecord::new(owner, *spender, amount))?;
            self.store.commit(writes)?;

            tracing::info!(%owner, %spender, amount, "allowance set");
            Ok(())
        })
    }

    /// Moves `amount` from `from` to `to` on behalf of `from`'s owner,
    /// spending the caller's allowance. Returns the remaining allowance.
    ///
    /// Checks run in order: allowance record present for the caller
    /// (`Unauthorized`), source balance (`InsufficientBalance`), allowance
    /// size (`AllowanceExceeded`).
    pub fn transfer_from(
        &self,
        caller: &Address,
        from: &Address,
        to: &Address,
        amount: u64,
    ) -> LedgerResult<u64> {
        traced("transfer_from", || {
            let owner = self.load_account(from)?.owner;
            let allowance_address = Self::allowance_address(&owner, caller);

            let set = self.locks.lock(&[*from, *to, allowance_address]);
            let _guards = set.acquire();

            let mut source = self.load_account(from)?;
            let mut dest = self.load_account(to)?;
            let mut allowance = match self.load_allowance(&owner, caller)? {
                Some(allowance) if allowance.spender == *caller => allowance,
                _ => return Err(LedgerError::Unauthorized),
            };

            source.ensure_covers(amount)?;
            let remaining = allowance.spend(amount)?;

            let mut writes = WriteSet::new();
            if from != to {
                source.move_to(&mut dest, amount)?;
                writes.put(&source)?;
                writes.put(&dest)?;
            }
            writes.put(&allowance)?;
            self.store.commit(writes)?;

            tracing::info!(%caller, %from, %to, amount, remaining, "transferred from allowance");
            Ok(remaining)
        })
    }

    // -- Wrapping -----------------------------------------------------------

    /// Wraps `amount` external tokens: custody moves them from the caller
    /// into the vault, then `account` is credited. Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::NotInitialized`] without token info,
    /// [`LedgerError::Overflow`] if the credit cannot fit (checked before
    /// custody is touched), [`LedgerError::CustodyFailure`] if custody
    /// refuses the movement or the caller is the vault itself.
    pub fn deposit(&self, caller: &Address, account: &Address, amount: u64) -> LedgerResult<u64> {
        traced("deposit", || {
            let info_address = Self::token_info_address();
            let set = self.locks.lock(&[*account, info_address]);
            let _guards = set.acquire();

            let mut info = self.require_token_info()?;
            let mut target = self.load_account(account)?;
            ensure_not_vault(&info, caller)?;

            let balance = target.credit_wrapped(amount)?;
            info.record_wrap(amount)?;

            self.custody
                .deposit(&info.mint, caller, &info.vault, amount)
                .map_err(|err| {
                    tracing::warn!(%caller, amount, error = %err, "custody refused deposit");
                    err
                })?;

            let mut writes = WriteSet::new();
            writes.put(&target)?;
            writes.put(&info)?;
            self.commit_after_custody("deposit", writes)?;

            tracing::info!(%caller, %account, amount, balance, "deposited");
            Ok(balance)
        })
    }

    /// Unwraps `amount`: debits `account` (owned by the caller) and has
    /// custody release the same amount from the vault to the caller.
    /// Returns the new balance.
    ///
    /// Only the account's own wrapped units are redeemable: asking for more
    /// than that, or withdrawing to the vault itself, fails with
    /// [`LedgerError::CustodyFailure`].
    pub fn withdraw(&self, caller: &Address, account: &Address, amount: u64) -> LedgerResult<u64> {
        traced("withdraw", || {
            let info_address = Self::token_info_address();
            let set = self.locks.lock(&[*account, info_address]);
            let _guards = set.acquire();

            let mut info = self.require_token_info()?;
            let mut source = self.load_account(account)?;

            if source.owner != *caller {
                return Err(LedgerError::Unauthorized);
            }
            ensure_not_vault(&info, caller)?;
            let balance = source.debit_wrapped(amount)?;
            info.record_unwrap(amount)?;

            self.custody
                .withdraw(&info.mint, &info.vault, caller, amount)
                .map_err(|err| {
                    tracing::warn!(%caller, amount, error = %err, "custody refused withdrawal");
                    err
                })?;

            let mut writes = WriteSet::new();
            writes.put(&source)?;
            writes.put(&info)?;
            self.commit_after_custody("withdraw", writes)?;

            tracing::info!(%caller, %account, amount, balance, "withdrawn");
            Ok(balance)
        })
    }

    /// Commits a write set whose custody leg already happened. A failure
    /// here means custody and ledger disagree, so it is logged loudly.
    fn commit_after_custody(&self, op: &'static str, writes: WriteSet) -> LedgerResult<()> {
        self.store.commit(writes).map_err(|err| {
            tracing::error!(op, error = %err, "commit failed after custody succeeded");
            LedgerError::from(err)
        })
    }
}
