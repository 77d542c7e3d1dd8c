use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use lsmkv::{Options, SyncPolicy, DB};
use tempfile::TempDir;

fn open(dir: &TempDir, sync_policy: SyncPolicy) -> DB {
    let options = Options::new(dir.path())
        .with_background_maintenance(false)
        .with_memtable_threshold(usize::MAX / 2)
        .with_sync_policy(sync_policy);
    DB::open(options).unwrap()
}

fn put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");
    group.throughput(Throughput::Elements(1));

    for (name, policy) in [
        ("every_write", SyncPolicy::EveryWrite),
        ("every_1000", SyncPolicy::EveryNWrites(1000)),
    ] {
        group.bench_function(name, |b| {
            let dir = TempDir::new().unwrap();
            let db = open(&dir, policy);
            let value = vec![b'x'; 128];
            let mut i = 0u64;
            b.iter(|| {
                db.put(&format!("key_{:08}", i), &value).unwrap();
                i += 1;
            });
        });
    }

    group.finish();
}

fn memtable_get(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open(&dir, SyncPolicy::EveryNWrites(10_000));
    for i in 0..10_000 {
        db.put(&format!("key_{:08}", i), b"value").unwrap();
    }

    c.bench_function("memtable_get", |b| {
        let mut i = 0;
        b.iter(|| {
            black_box(db.get(&format!("key_{:08}", i % 10_000)).unwrap());
            i += 1;
        });
    });
}

fn segment_get(c: &mut Criterion) {
    let mut group = c.benchmark_group("segment_get");

    for segments in [1usize, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(segments), &segments, |b, &segments| {
            let dir = TempDir::new().unwrap();
            let db = open(&dir, SyncPolicy::EveryNWrites(10_000));
            for s in 0..segments {
                for i in 0..1_000 {
                    db.put(&format!("key_{:08}", s * 1_000 + i), &[b'v'; 64]).unwrap();
                }
                db.flush().unwrap();
            }

            let total = segments * 1_000;
            let mut i = 0;
            b.iter(|| {
                black_box(db.get(&format!("key_{:08}", i % total)).unwrap());
                i += 7;
            });
        });
    }

    group.bench_function("miss", |b| {
        let dir = TempDir::new().unwrap();
        let db = open(&dir, SyncPolicy::EveryNWrites(10_000));
        for i in 0..1_000 {
            db.put(&format!("key_{:08}", i), b"v").unwrap();
        }
        db.flush().unwrap();

        b.iter(|| black_box(db.get("absent_key").unwrap()));
    });

    group.finish();
}

criterion_group!(benches, put, memtable_get, segment_get);
criterion_main!(benches);
