use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use logfile::LogFile;
use tempfile::tempdir;

const N: usize = 1_000;
const VAL_SIZE: usize = 100;
const MAX: u64 = 1 << 30;

fn logfile_append_fsync(c: &mut Criterion) {
    c.bench_function("logfile_append_fsync_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let lf = LogFile::open(dir.path(), 0, MAX).unwrap();
                (dir, lf)
            },
            |(_dir, mut lf)| {
                for i in 0..N {
                    let key = format!("k{i}").into_bytes();
                    lf.append(&key, &vec![b'x'; VAL_SIZE]).unwrap();
                }
            },
            BatchSize::SmallInput,
        );
    });
}

fn logfile_read_value(c: &mut Criterion) {
    c.bench_function("logfile_read_value_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut lf = LogFile::open(dir.path(), 0, MAX).unwrap();
                let mut offsets = Vec::with_capacity(N);
                for i in 0..N {
                    let key = format!("k{i:06}").into_bytes();
                    let (_, value_offset) = lf.append(&key, &vec![b'x'; VAL_SIZE]).unwrap();
                    offsets.push(value_offset);
                }
                (dir, lf, offsets)
            },
            |(_dir, lf, offsets)| {
                for &off in &offsets {
                    criterion::black_box(lf.read_value(off, VAL_SIZE).unwrap());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn logfile_replay(c: &mut Criterion) {
    c.bench_function("logfile_replay_1k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mut lf = LogFile::open(dir.path(), 0, MAX).unwrap();
                for i in 0..N {
                    let key = format!("k{i}").into_bytes();
                    lf.append(&key, &vec![b'x'; VAL_SIZE]).unwrap();
                }
                (dir, lf)
            },
            |(_dir, lf)| {
                let count = lf.iter().unwrap().map(|r| r.unwrap()).count();
                assert_eq!(count, N);
            },
            BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, logfile_append_fsync, logfile_read_value, logfile_replay);
criterion_main!(benches);
