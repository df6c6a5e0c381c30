//! End-to-end benchmark: new group, two typed puts, dumps, delete, reorder,
//! and group release.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde::{Deserialize, Serialize};
use slabcache::BincodeCodec;
use slabcache_bench::reference_pool;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
struct Pair {
    a: i64,
    b: i64,
}

fn bench_lifecycle(c: &mut Criterion) {
    let pool = reference_pool();
    let codec = BincodeCodec::<Pair>::new();
    let first = Pair { a: 1, b: 0 };
    let second = Pair { a: 100, b: 9 };

    c.bench_function("group_lifecycle", |b| {
        b.iter(|| {
            let group = pool.new_group().unwrap();
            let m = group.put_value(&codec, &first).unwrap();
            let n = group.put_value(&codec, &second).unwrap();
            black_box(m.load(&codec).unwrap());
            black_box(n.load(&codec).unwrap());
            group.delete(&m).unwrap();
            group.reorder().unwrap();
            pool.delete_group(&group).unwrap();
        });
    });
}

criterion_group!(benches, bench_lifecycle);
criterion_main!(benches);
