//! # SledStore: Persistent Record Storage
//!
//! The persistence layer for ledger records, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree       | Key                    | Value               |
//! |------------|------------------------|---------------------|
//! | `records`  | derived address (32B)  | `bincode(record)`   |
//! | `metadata` | key (UTF-8)            | value (bytes)       |
//!
//! All record kinds share one tree. Their addresses come from distinct
//! derivation seeds, so they never collide, and keeping them together
//! means a single sled `Batch` covers every write of an operation.
//!
//! ## Atomicity
//!
//! [`Store::commit`] turns a [`WriteSet`] into one `Batch` and applies it
//! with `apply_batch`, which sled guarantees is atomic: a crash leaves
//! either all of the writes or none of them.

use sled::{Batch, Db, Tree};
use std::path::Path;

use super::{Store, StoreResult, WriteSet};
use crate::address::Address;

/// Well-known key in the `metadata` tree recording the storage layout.
const META_LAYOUT_VERSION: &[u8] = b"layout_version";

/// Current on-disk layout version.
pub const LAYOUT_VERSION: u32 = 1;

/// Persistent record store.
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// `SledStore` can be shared across threads via `Arc` without extra
/// synchronization.
#[derive(Debug, Clone)]
pub struct SledStore {
    db: Db,
    records: Tree,
    metadata: Tree,
}

impl SledStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary store, removed when dropped. Intended for tests.
    pub fn open_temporary() -> StoreResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree("records")?;
        let metadata = db.open_tree("metadata")?;

        if metadata.get(META_LAYOUT_VERSION)?.is_none() {
            metadata.insert(META_LAYOUT_VERSION, &LAYOUT_VERSION.to_be_bytes())?;
        }

        Ok(Self {
            db,
            records,
            metadata,
        })
    }

    /// Layout version stamped into this database.
    pub fn layout_version(&self) -> StoreResult<Option<u32>> {
        Ok(self.metadata.get(META_LAYOUT_VERSION)?.and_then(|bytes| {
            let arr: [u8; 4] = bytes.as_ref().try_into().ok()?;
            Some(u32::from_be_bytes(arr))
        }))
    }

    /// Block until all pending writes are durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Store for SledStore {
    fn get(&self, address: &Address) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.records.get(address.as_bytes())?.map(|v| v.to_vec()))
    }

    fn commit(&self, writes: WriteSet) -> StoreResult<()> {
        let mut batch = Batch::default();
        for (address, bytes) in writes.into_writes() {
            batch.insert(address.as_bytes(), bytes);
        }
        self.records.apply_batch(batch)?;
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BalanceAccount;
    use crate::storage::load;

    fn account(byte: u8, balance: u64) -> BalanceAccount {
        let mut account = BalanceAccount::new(Address::new([byte; 32]));
        account.credit(balance).unwrap();
        account
    }

    #[test]
    fn open_temporary_store() {
        let store = SledStore::open_temporary().expect("should create temp store");
        assert_eq!(store.len(), 0);
        assert_eq!(store.layout_version().unwrap(), Some(LAYOUT_VERSION));
    }

    #[test]
    fn batch_commit_lands_every_write() {
        let store = SledStore::open_temporary().unwrap();
        let alice = account(1, 100);
        let bob = account(2, 200);

        let mut writes = WriteSet::new();
        writes.put(&alice).unwrap();
        writes.put(&bob).unwrap();
        store.commit(writes).unwrap();

        assert_eq!(store.len(), 2);
        let a: BalanceAccount = load(&store, &address_of(&alice)).unwrap().unwrap();
        assert_eq!(a.balance, 100);
    }

    fn address_of(acct: &BalanceAccount) -> Address {
        use crate::state::Record;
        acct.address()
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let acct = account(7, 5000);

        {
            let store = SledStore::open(dir.path()).expect("should open store");
            let mut writes = WriteSet::new();
            writes.put(&acct).unwrap();
            store.commit(writes).unwrap();
            store.flush().unwrap();
        }

        let store = SledStore::open(dir.path()).expect("should reopen store");
        let loaded: BalanceAccount = load(&store, &address_of(&acct)).unwrap().unwrap();
        assert_eq!(loaded, acct);
        assert_eq!(store.layout_version().unwrap(), Some(LAYOUT_VERSION));
    }

    #[test]
    fn missing_record_is_none() {
        let store = SledStore::open_temporary().unwrap();
        assert!(store.get(&Address::new([0xAB; 32])).unwrap().is_none());
    }

    #[test]
    fn concurrent_reads_do_not_block() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(SledStore::open_temporary().unwrap());
        let mut writes = WriteSet::new();
        for i in 0..10u8 {
            writes.put(&account(i, i as u64 * 1000)).unwrap();
        }
        store.commit(writes).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..10u8 {
                        let acct = account(i, 0);
                        let loaded: BalanceAccount =
                            load(&*store, &address_of(&acct)).unwrap().unwrap();
                        assert_eq!(loaded.balance, i as u64 * 1000);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("reader thread should not panic");
        }
    }
}
