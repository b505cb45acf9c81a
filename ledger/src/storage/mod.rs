//! # Storage Module
//!
//! Key-value backends for ledger records. The engine never knows where a
//! record physically lives: it derives a 32-byte [`Address`], reads the
//! bincode-encoded value, and hands a [`WriteSet`] back to [`Store::commit`].
//!
//! ```text
//! memory.rs: MemoryStore: HashMap behind a RwLock (tests, ephemeral nodes)
//! db.rs    : SledStore: single sled tree, atomic Batch commits
//! ```
//!
//! `commit` must be all-or-nothing: either every write in the set becomes
//! visible or none does.

pub mod db;
pub mod memory;

pub use db::SledStore;
pub use memory::MemoryStore;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::address::Address;
use crate::state::Record;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur in a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// WriteSet
// ---------------------------------------------------------------------------

/// Ordered list of encoded record writes, committed atomically.
#[derive(Debug, Default, Clone)]
pub struct WriteSet {
    writes: Vec<(Address, Vec<u8>)>,
}

impl WriteSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `record` and queues it under its own address. A later put
    /// for the same address wins.
    pub fn put<R: Record>(&mut self, record: &R) -> StoreResult<()> {
        let bytes = encode(record)?;
        self.put_raw(record.address(), bytes);
        Ok(())
    }

    /// Queues pre-encoded bytes under `address`.
    pub fn put_raw(&mut self, address: Address, bytes: Vec<u8>) {
        self.writes.retain(|(a, _)| *a != address);
        self.writes.push((address, bytes));
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn into_writes(self) -> Vec<(Address, Vec<u8>)> {
        self.writes
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// A key-value store addressed by [`Address`].
pub trait Store: Send + Sync {
    /// Reads the raw bytes at `address`.
    fn get(&self, address: &Address) -> StoreResult<Option<Vec<u8>>>;

    /// Applies every write in `writes` atomically.
    fn commit(&self, writes: WriteSet) -> StoreResult<()>;

    /// Number of stored records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a record exists at `address`.
    fn contains(&self, address: &Address) -> StoreResult<bool> {
        Ok(self.get(address)?.is_some())
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn get(&self, address: &Address) -> StoreResult<Option<Vec<u8>>> {
        (**self).get(address)
    }

    fn commit(&self, writes: WriteSet) -> StoreResult<()> {
        (**self).commit(writes)
    }

    fn len(&self) -> usize {
        (**self).len()
    }
}

/// Reads and decodes the value at `address`.
pub fn load<T, S>(store: &S, address: &Address) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    S: Store + ?Sized,
{
    match store.get(address)? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

/// Reads the record of kind `R` stored at `address`.
///
/// Returns `None` when the slot is empty or holds some other kind of
/// record: the decoded value must derive back to `address`. Callers pass
/// addresses they did not derive themselves, and bincode happily decodes a
/// longer record of another kind as a prefix.
pub fn load_record<R, S>(store: &S, address: &Address) -> StoreResult<Option<R>>
where
    R: Record,
    S: Store + ?Sized,
{
    let bytes = match store.get(address)? {
        Some(bytes) => bytes,
        None => return Ok(None),
    };
    match decode::<R>(&bytes) {
        Ok(record) if record.address() == *address => Ok(Some(record)),
        _ => {
            tracing::debug!(%address, "slot holds a different record kind");
            Ok(None)
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
