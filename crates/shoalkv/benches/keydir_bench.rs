use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use keydir::{DirEntry, KeyDir};

const N: usize = 10_000;

fn entry(i: u64) -> DirEntry {
    DirEntry {
        file_id: 0,
        value_offset: i * 16,
        value_len: 100,
    }
}

fn keydir_put(c: &mut Criterion) {
    c.bench_function("keydir_put_10k", |b| {
        b.iter_batched(
            || KeyDir::new(32),
            |dir| {
                for i in 0..N as u64 {
                    dir.put(format!("k{i:06}").as_bytes(), entry(i));
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn keydir_get_hit(c: &mut Criterion) {
    let dir = KeyDir::new(32);
    for i in 0..N as u64 {
        dir.put(format!("k{i:06}").as_bytes(), entry(i));
    }

    c.bench_function("keydir_get_hit_10k", |b| {
        b.iter(|| {
            for i in 0..N as u64 {
                criterion::black_box(dir.get(format!("k{i:06}").as_bytes()));
            }
        });
    });
}

fn keydir_put_remove(c: &mut Criterion) {
    c.bench_function("keydir_put_remove_10k", |b| {
        b.iter_batched(
            || KeyDir::new(32),
            |dir| {
                for i in 0..N as u64 {
                    let key = format!("k{i:06}");
                    dir.put(key.as_bytes(), entry(i));
                    dir.remove(key.as_bytes());
                }
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, keydir_put, keydir_get_hit, keydir_put_remove);
criterion_main!(benches);
