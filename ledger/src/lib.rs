// Copyright (c) 2026 Wrapt Contributors. MIT License.
// See LICENSE for details.

//! # Wrapt Ledger: Core Library
//!
//! A fungible-token ledger with ERC-20 style allowances, plus a wrapping
//! path that moves an external token into a custody vault and credits the
//! same amount as an internal balance.
//!
//! ## Architecture
//!
//! - **address**: 32-byte identities and content-addressed record keys.
//! - **state**: the three record types: balance accounts, allowances and
//!   the token info slot.
//! - **engine**: the [`Ledger`] operation set. Every mutation locks the
//!   records it names, validates, then commits one atomic write set.
//! - **custody**: the seam to the external token vault.
//! - **storage**: key-value backends: in-memory and sled.
//! - **config**: seeds, metadata limits and the mint policy.
//!
//! ## Invariants
//!
//! 1. Balances and allowances are `u64`; every debit is checked and every
//!    credit is `checked_add`.
//! 2. A failed precondition leaves no trace in storage.
//! 3. The wrapped supply never exceeds what custody holds in the vault.

pub mod address;
pub mod config;
pub mod custody;
pub mod engine;
pub mod error;
pub mod locks;
pub mod state;
pub mod storage;

pub use address::{Address, RecordKey};
pub use config::{LedgerConfig, MintPolicy};
pub use custody::{Custody, CustodyError, LocalCustody};
pub use engine::Ledger;
pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use state::{AllowanceRecord, BalanceAccount, TokenInfo, TokenMetadata};
pub use storage::{MemoryStore, SledStore, Store, StoreError};
