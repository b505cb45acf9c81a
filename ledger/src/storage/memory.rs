//! In-memory [`Store`] backed by a `HashMap`.
//!
//! Commits take the write lock once, so a [`WriteSet`] is never observed
//! half-applied.

use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Store, StoreResult, WriteSet};
use crate::address::Address;

/// Volatile record store. Contents vanish when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<Address, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    fn get(&self, address: &Address) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.read().get(address).cloned())
    }

    fn commit(&self, writes: WriteSet) -> StoreResult<()> {
        let mut records = self.records.write();
        for (address, bytes) in writes.into_writes() {
            records.insert(address, bytes);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.read().len()
    }
}
