//! Per-record locking.
//!
//! Every record address gets its own mutex, created on first use. An
//! operation locks its whole address set at once through
//! [`LockTable::lock`], which sorts and deduplicates the addresses first so
//! two operations with overlapping sets always acquire in the same order.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::address::Address;

/// Lazily-populated table of record mutexes.
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<Address, Arc<Mutex<()>>>,
}

/// Handles for one operation's locks. Call [`LockSet::acquire`] to block
/// until all of them are held.
pub struct LockSet {
    handles: Vec<Arc<Mutex<()>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects the mutexes for `addresses` in canonical order.
    pub fn lock(&self, addresses: &[Address]) -> LockSet {
        let mut sorted = addresses.to_vec();
        sorted.sort_unstable();
        sorted.dedup();

        let handles = sorted
            .into_iter()
            .map(|address| Arc::clone(self.locks.entry(address).or_default().value()))
            .collect();
        LockSet { handles }
    }

    /// Number of distinct records that have ever been locked.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl LockSet {
    /// Blocks until every mutex in the set is held. The guards release on
    /// drop.
    pub fn acquire(&self) -> Vec<parking_lot::MutexGuard<'_, ()>> {
        self.handles.iter().map(|m| m.lock()).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;

    #[test]
    fn duplicate_addresses_locked_once() {
        let table = LockTable::new();
        let a = Address::new([1; 32]);
        let set = table.lock(&[a, a, a]);
        assert_eq!(set.len(), 1);
        // Would deadlock if `a` were locked twice.
        let _guards = set.acquire();
    }

    #[test]
    fn mutex_is_shared_per_address() {
        let table = LockTable::new();
        let a = Address::new([1; 32]);
        let b = Address::new([2; 32]);
        table.lock(&[a, b]);
        table.lock(&[b, a]);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn opposite_order_does_not_deadlock() {
        let table = Arc::new(LockTable::new());
        let a = Address::new([1; 32]);
        let b = Address::new([2; 32]);
        let counter = Arc::new(AtomicU64::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let table = Arc::clone(&table);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    let order = if i % 2 == 0 { [a, b] } else { [b, a] };
                    for _ in 0..200 {
                        let set = table.lock(&order);
                        let _guards = set.acquire();
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("locker thread should not panic");
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1600);
    }
}
