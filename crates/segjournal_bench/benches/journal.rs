//! Journal operation benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use segjournal_bench::utils::{bench_config, populated_journal, random_data};
use segjournal_codec::RawCodec;
use segjournal_core::{ReaderMode, SegmentedJournal, StorageLevel};
use tempfile::TempDir;

/// Benchmark single appends at each storage level.
fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for level in [StorageLevel::Disk, StorageLevel::Mapped] {
        for size in [64, 256, 1024, 4096] {
            group.throughput(Throughput::Bytes(size as u64));
            group.bench_with_input(
                BenchmarkId::new(level.to_string(), size),
                &size,
                |b, &size| {
                    let temp_dir = TempDir::new().unwrap();
                    let journal =
                        SegmentedJournal::open(bench_config(temp_dir.path(), level), RawCodec)
                            .unwrap();
                    let data = random_data(size);

                    b.iter(|| {
                        let entry = journal.append(black_box(data.clone())).unwrap();
                        black_box(entry.index());
                    });
                },
            );
        }
    }
    group.finish();
}

/// Benchmark append followed by a flushing commit.
fn bench_append_commit(c: &mut Criterion) {
    let mut group = c.benchmark_group("append_commit");
    group.sample_size(20);

    for level in [StorageLevel::Disk, StorageLevel::Mapped] {
        group.throughput(Throughput::Elements(1));
        group.bench_function(BenchmarkId::from_parameter(level), |b| {
            let temp_dir = TempDir::new().unwrap();
            let config = bench_config(temp_dir.path(), level).flush_on_commit(true);
            let journal = SegmentedJournal::open(config, RawCodec).unwrap();
            let data = random_data(256);

            b.iter(|| {
                let entry = journal.append(data.clone()).unwrap();
                journal.commit(black_box(entry.index())).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark reading the whole journal front to back.
fn bench_sequential_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_read");
    group.sample_size(20);

    for level in [StorageLevel::Disk, StorageLevel::Mapped] {
        for count in [1_000usize, 10_000] {
            group.throughput(Throughput::Elements(count as u64));
            group.bench_with_input(
                BenchmarkId::new(level.to_string(), count),
                &count,
                |b, &count| {
                    let temp_dir = TempDir::new().unwrap();
                    let journal = populated_journal(temp_dir.path(), level, count, 128);

                    b.iter(|| {
                        let reader = journal.open_reader(1, ReaderMode::All).unwrap();
                        let read = reader.map(|entry| entry.unwrap().size()).count();
                        black_box(read);
                    });
                },
            );
        }
    }
    group.finish();
}

/// Benchmark positioning a reader at a random index.
fn bench_reader_seek(c: &mut Criterion) {
    let mut group = c.benchmark_group("reader_seek");

    for density in [1.0, 0.1, 0.005] {
        group.bench_with_input(
            BenchmarkId::from_parameter(density),
            &density,
            |b, &density| {
                let temp_dir = TempDir::new().unwrap();
                let config = bench_config(temp_dir.path(), StorageLevel::Disk)
                    .max_entries_per_segment(4_096)
                    .index_density(density);
                let journal = SegmentedJournal::open(config, RawCodec).unwrap();
                for _ in 0..20_000 {
                    journal.append(random_data(64)).unwrap();
                }
                let mut rng = rand::thread_rng();
                let mut reader = journal.open_reader(1, ReaderMode::All).unwrap();

                b.iter(|| {
                    let index = rng.gen_range(1..=20_000u64);
                    reader.reset_to(black_box(index)).unwrap();
                    black_box(reader.next_entry().unwrap().index());
                });
            },
        );
    }
    group.finish();
}

/// Benchmark truncating the tail and appending a replacement.
fn bench_truncate_reappend(c: &mut Criterion) {
    let mut group = c.benchmark_group("truncate_reappend");

    for depth in [1u64, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            let temp_dir = TempDir::new().unwrap();
            let journal = populated_journal(temp_dir.path(), StorageLevel::Disk, 1_000, 128);
            let data = random_data(128);

            b.iter(|| {
                let last = journal.last_index();
                journal.truncate(last - depth).unwrap();
                for _ in 0..depth {
                    journal.append(data.clone()).unwrap();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_append,
    bench_append_commit,
    bench_sequential_read,
    bench_reader_seek,
    bench_truncate_reappend,
);

criterion_main!(benches);
