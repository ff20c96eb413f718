use criterion::{black_box, criterion_group, criterion_main, Criterion};

use outpost_storage::MetricsStore;

fn bench_updates(c: &mut Criterion) {
    let store = MetricsStore::new();

    c.bench_function("update_gauge", |b| {
        b.iter(|| store.update_gauge(black_box("Alloc"), black_box(42.0)))
    });

    c.bench_function("update_counter", |b| {
        b.iter(|| store.update_counter(black_box("PollCount"), black_box(1)))
    });
}

fn bench_snapshot(c: &mut Criterion) {
    let store = MetricsStore::new();
    for i in 0..512 {
        store.update_gauge(&format!("gauge_{i}"), i as f64);
        store.update_counter(&format!("counter_{i}"), i);
    }

    c.bench_function("snapshot_1k_metrics", |b| {
        b.iter(|| black_box(store.snapshot()))
    });
}

criterion_group!(benches, bench_updates, bench_snapshot);
criterion_main!(benches);
