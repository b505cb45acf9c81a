// Ledger hot-path benchmarks.
//
// Covers a plain transfer, a transfer_from that spends an allowance, and
// transfer throughput over the in-memory and sled backends.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use wrapt_ledger::{
    Address, Custody, Ledger, LedgerConfig, LocalCustody, MemoryStore, SledStore, Store,
};

fn id(byte: u8) -> Address {
    Address::new([byte; 32])
}

/// Two funded accounts, returned as (ledger, alice account, bob account).
fn funded<S: Store, C: Custody>(ledger: Ledger<S, C>) -> (Ledger<S, C>, Address, Address) {
    let alice = ledger.create_account(&id(1)).expect("create alice");
    let bob = ledger.create_account(&id(2)).expect("create bob");
    ledger.mint(&id(1), &alice, u64::MAX / 2).expect("mint");
    (ledger, alice, bob)
}

fn memory_ledger() -> Ledger<MemoryStore, LocalCustody<MemoryStore>> {
    Ledger::new(
        MemoryStore::new(),
        LocalCustody::new(MemoryStore::new()),
        LedgerConfig::default(),
    )
}

fn bench_transfer(c: &mut Criterion) {
    let (ledger, alice, bob) = funded(memory_ledger());

    c.bench_function("ledger/transfer_memory", |b| {
        b.iter(|| ledger.transfer(&id(1), &alice, &bob, black_box(1)).unwrap());
    });
}

fn bench_transfer_from(c: &mut Criterion) {
    let (ledger, alice, bob) = funded(memory_ledger());
    ledger.approve(&id(1), &alice, &id(3), u64::MAX).unwrap();

    c.bench_function("ledger/transfer_from_memory", |b| {
        b.iter(|| {
            ledger
                .transfer_from(&id(3), &alice, &bob, black_box(1))
                .unwrap()
        });
    });
}

fn bench_transfer_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger/transfer_batch_sled");

    for size in [10u64, 100, 1_000] {
        let store = std::sync::Arc::new(SledStore::open_temporary().expect("temp store"));
        let (ledger, alice, bob) = funded(Ledger::new(
            std::sync::Arc::clone(&store),
            LocalCustody::new(std::sync::Arc::clone(&store)),
            LedgerConfig::default(),
        ));

        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &n| {
            b.iter(|| {
                for _ in 0..n {
                    ledger.transfer(&id(1), &alice, &bob, 1).unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_transfer,
    bench_transfer_from,
    bench_transfer_batch
);
criterion_main!(benches);
