//! Entry codec and frame benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use segjournal_bench::utils::random_data;
use segjournal_codec::{CborCodec, EntryCodec, RawCodec};
use segjournal_core::{checksum, read_frame, EncodedFrame};
use segjournal_storage::InMemoryBackend;
use serde::{Deserialize, Serialize};

/// A log record shaped like a replicated state-machine command.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Command {
    term: u64,
    key: String,
    value: Vec<u8>,
}

fn command(size: usize) -> Command {
    Command {
        term: 42,
        key: "users/alice".to_string(),
        value: random_data(size),
    }
}

/// Benchmark encoding entries with each codec.
fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");

    for size in [64, 1024, 16 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));

        let raw = random_data(size);
        group.bench_with_input(BenchmarkId::new("raw", size), &raw, |b, raw| {
            let mut buf = Vec::with_capacity(size);
            b.iter(|| {
                buf.clear();
                RawCodec.encode(black_box(raw), &mut buf).unwrap();
            });
        });

        let record = command(size);
        let codec = CborCodec::<Command>::new();
        group.bench_with_input(BenchmarkId::new("cbor", size), &record, |b, record| {
            let mut buf = Vec::with_capacity(size + 64);
            b.iter(|| {
                buf.clear();
                codec.encode(black_box(record), &mut buf).unwrap();
            });
        });
    }
    group.finish();
}

/// Benchmark decoding CBOR entries.
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = CborCodec::<Command>::new();

    for size in [64, 1024, 16 * 1024] {
        let mut encoded = Vec::new();
        codec.encode(&command(size), &mut encoded).unwrap();
        group.throughput(Throughput::Bytes(encoded.len() as u64));

        group.bench_with_input(BenchmarkId::new("cbor", size), &encoded, |b, encoded| {
            b.iter(|| {
                let decoded = codec.decode(black_box(encoded)).unwrap();
                black_box(decoded);
            });
        });
    }
    group.finish();
}

/// Benchmark framing and CRC-32.
fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");

    for size in [64, 1024, 16 * 1024] {
        group.throughput(Throughput::Bytes(size as u64));
        let payload = random_data(size);

        group.bench_with_input(BenchmarkId::new("crc32", size), &payload, |b, payload| {
            b.iter(|| black_box(checksum(black_box(payload))));
        });

        group.bench_with_input(BenchmarkId::new("encode", size), &payload, |b, payload| {
            b.iter(|| {
                let frame = EncodedFrame::from_payload(black_box(payload), 1024 * 1024).unwrap();
                black_box(frame.checksum());
            });
        });

        let frame = EncodedFrame::from_payload(&payload, 1024 * 1024).unwrap();
        let backend = InMemoryBackend::with_data(frame.as_bytes().to_vec());
        group.bench_function(BenchmarkId::new("read", size), |b| {
            b.iter(|| {
                let frame = read_frame(&backend, black_box(0), 1024 * 1024).unwrap();
                black_box(frame);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_encode, bench_decode, bench_frame);

criterion_main!(benches);
