//! Benchmark utilities.

use rand::Rng;
use segjournal_codec::RawCodec;
use segjournal_core::{JournalConfig, SegmentedJournal, StorageLevel};
use std::path::Path;

/// Generate random entry data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a batch of random entries with the specified payload size.
pub fn generate_entries(count: usize, payload_size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|_| random_data(payload_size)).collect()
}

/// Configuration used by the journal benchmarks: 8 MiB segments and the
/// default sparse index.
pub fn bench_config(dir: &Path, level: StorageLevel) -> JournalConfig {
    JournalConfig::new()
        .directory(dir)
        .name("bench")
        .storage_level(level)
        .max_segment_size(8 * 1024 * 1024)
        .max_entries_per_segment(64 * 1024)
}

/// Opens a byte journal in `dir` holding `count` entries of `payload_size`
/// bytes.
pub fn populated_journal(
    dir: &Path,
    level: StorageLevel,
    count: usize,
    payload_size: usize,
) -> SegmentedJournal<RawCodec> {
    let journal = SegmentedJournal::open(bench_config(dir, level), RawCodec).unwrap();
    for entry in generate_entries(count, payload_size) {
        journal.append(entry).unwrap();
    }
    journal
}
