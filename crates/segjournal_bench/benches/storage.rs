//! Storage backend benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segjournal_bench::utils::random_data;
use segjournal_storage::{FileBackend, InMemoryBackend, MappedBackend, SegmentStorage};
use tempfile::TempDir;

const REGION: u64 = 64 * 1024 * 1024;

/// Writes `data` at consecutive offsets, wrapping inside a fixed region so
/// mapped backends never run out of room.
fn sequential_writes(backend: &dyn SegmentStorage, data: &[u8], offset: &mut u64) {
    if *offset + data.len() as u64 > REGION {
        *offset = 0;
    }
    backend.write_at(*offset, data).unwrap();
    *offset += data.len() as u64;
}

/// Benchmark sequential writes on every backend.
fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("write");

    for size in [64, 256, 1024, 4096] {
        group.throughput(Throughput::Bytes(size as u64));
        let data = random_data(size);

        group.bench_with_input(BenchmarkId::new("memory", size), &data, |b, data| {
            let backend = InMemoryBackend::new();
            let mut offset = 0;
            b.iter(|| sequential_writes(&backend, black_box(data), &mut offset));
        });

        group.bench_with_input(BenchmarkId::new("file", size), &data, |b, data| {
            let temp_dir = TempDir::new().unwrap();
            let backend = FileBackend::open(&temp_dir.path().join("bench.log")).unwrap();
            let mut offset = 0;
            b.iter(|| sequential_writes(&backend, black_box(data), &mut offset));
        });

        group.bench_with_input(BenchmarkId::new("mapped", size), &data, |b, data| {
            let temp_dir = TempDir::new().unwrap();
            let backend = MappedBackend::open(&temp_dir.path().join("bench.log"), REGION).unwrap();
            let mut offset = 0;
            b.iter(|| sequential_writes(&backend, black_box(data), &mut offset));
        });
    }
    group.finish();
}

/// Benchmark reads from a populated region.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");
    let data = random_data(1024 * 1024);

    for size in [64, 1024, 4096] {
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("file", size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let backend = FileBackend::open(&temp_dir.path().join("bench.log")).unwrap();
            backend.write_at(0, &data).unwrap();
            let mut offset = 0u64;
            b.iter(|| {
                offset = (offset + 4096) % (data.len() - size) as u64;
                black_box(backend.read_at(black_box(offset), size).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("mapped", size), &size, |b, &size| {
            let temp_dir = TempDir::new().unwrap();
            let backend =
                MappedBackend::open(&temp_dir.path().join("bench.log"), data.len() as u64).unwrap();
            backend.write_at(0, &data).unwrap();
            let mut offset = 0u64;
            b.iter(|| {
                offset = (offset + 4096) % (data.len() - size) as u64;
                black_box(backend.read_at(black_box(offset), size).unwrap());
            });
        });
    }
    group.finish();
}

/// Benchmark flush latency.
fn bench_flush(c: &mut Criterion) {
    let mut group = c.benchmark_group("flush");
    group.sample_size(20);
    let data = random_data(256);

    group.bench_function("file", |b| {
        let temp_dir = TempDir::new().unwrap();
        let backend = FileBackend::open(&temp_dir.path().join("bench.log")).unwrap();
        let mut offset = 0;
        b.iter(|| {
            sequential_writes(&backend, &data, &mut offset);
            backend.flush().unwrap();
        });
    });

    group.bench_function("mapped", |b| {
        let temp_dir = TempDir::new().unwrap();
        let backend = MappedBackend::open(&temp_dir.path().join("bench.log"), REGION).unwrap();
        let mut offset = 0;
        b.iter(|| {
            sequential_writes(&backend, &data, &mut offset);
            backend.flush().unwrap();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_write, bench_read, bench_flush);

criterion_main!(benches);
