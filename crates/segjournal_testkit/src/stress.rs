//! Stress tests for segjournal.
//!
//! These tests verify behavior under heavy load and concurrent access:
//! one writer appending while several readers tail the journal.

use segjournal_codec::RawCodec;
use segjournal_core::{ReaderMode, SegmentedJournal};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// How long a tailing reader waits for the writer before giving up.
const READER_DEADLINE: Duration = Duration::from_secs(30);

/// Result of a stress test run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Total operations performed.
    pub total_ops: usize,
    /// Successful operations.
    pub successful_ops: usize,
    /// Failed operations.
    pub failed_ops: usize,
    /// Total duration.
    pub duration: Duration,
    /// Operations per second.
    pub ops_per_second: f64,
}

impl StressTestResult {
    /// Creates a new result.
    pub fn new(successful: usize, failed: usize, duration: Duration) -> Self {
        let total = successful + failed;
        let ops_per_second = if duration.as_secs_f64() > 0.0 {
            total as f64 / duration.as_secs_f64()
        } else {
            0.0
        };

        Self {
            total_ops: total,
            successful_ops: successful,
            failed_ops: failed,
            duration,
            ops_per_second,
        }
    }

    /// Prints a summary of the test.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Total operations: {}", self.total_ops);
        println!("Successful: {}", self.successful_ops);
        println!("Failed: {}", self.failed_ops);
        println!("Duration: {:?}", self.duration);
        println!("Throughput: {:.2} ops/sec", self.ops_per_second);
    }
}

/// Configuration for stress tests.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of entries to append.
    pub operations: usize,
    /// Number of concurrent reader threads.
    pub threads: usize,
    /// Size of each entry in bytes (at least 8).
    pub entry_size: usize,
    /// Compact every this many appends, keeping this many entries behind
    /// the head. Zero disables compaction.
    pub compact_every: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            operations: 10_000,
            threads: 4,
            entry_size: 256,
            compact_every: 0,
        }
    }
}

/// Builds the payload for entry `index`: its index in the first eight
/// bytes, padded to `size`.
pub fn stress_payload(index: u64, size: usize) -> Vec<u8> {
    let mut payload = index.to_le_bytes().to_vec();
    payload.resize(size.max(8), index as u8);
    payload
}

/// Recovers the index stamped into a [`stress_payload`].
pub fn stress_payload_index(payload: &[u8]) -> Option<u64> {
    let bytes: [u8; 8] = payload.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(bytes))
}

/// Run a sequential append stress test.
pub fn stress_sequential_appends(
    journal: &SegmentedJournal<RawCodec>,
    config: &StressConfig,
) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    for _ in 0..config.operations {
        let index = journal.last_index() + 1;
        match journal.append(stress_payload(index, config.entry_size)) {
            Ok(entry) if entry.index() == index => successful += 1,
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run a sequential read stress test over whatever the journal holds.
pub fn stress_sequential_reads(journal: &SegmentedJournal<RawCodec>) -> StressTestResult {
    let start = Instant::now();
    let mut successful = 0usize;
    let mut failed = 0usize;

    let reader = match journal.open_reader(journal.first_index(), ReaderMode::All) {
        Ok(reader) => reader,
        Err(_) => return StressTestResult::new(0, 1, start.elapsed()),
    };
    for entry in reader {
        match entry {
            Ok(entry) if stress_payload_index(entry.entry()) == Some(entry.index()) => {
                successful += 1;
            }
            _ => failed += 1,
        }
    }

    StressTestResult::new(successful, failed, start.elapsed())
}

/// Run one writer against several readers tailing committed entries.
///
/// Every reader must observe each entry the writer commits, in order, with
/// the payload stamped for its index. With `compact_every` set, readers
/// that fall behind compaction are moved forward and must still see
/// strictly increasing indexes.
pub fn stress_tailing_readers(
    journal: Arc<SegmentedJournal<RawCodec>>,
    config: &StressConfig,
) -> StressTestResult {
    let successful = Arc::new(AtomicUsize::new(0));
    let failed = Arc::new(AtomicUsize::new(0));
    let start_index = journal.last_index() + 1;
    let final_index = start_index + config.operations as u64 - 1;

    let start = Instant::now();

    let readers: Vec<_> = (0..config.threads)
        .filter_map(|_| journal.open_reader(start_index, ReaderMode::Commits).ok())
        .collect();
    failed.fetch_add(config.threads - readers.len(), Ordering::Relaxed);

    let handles: Vec<_> = readers
        .into_iter()
        .map(|mut reader| {
            let successful = Arc::clone(&successful);
            let failed = Arc::clone(&failed);
            let compacting = config.compact_every > 0;

            thread::spawn(move || {
                let deadline = Instant::now() + READER_DEADLINE;
                let mut last_seen = start_index - 1;
                while last_seen < final_index {
                    if Instant::now() > deadline {
                        failed.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                    match reader.has_next() {
                        Ok(true) => {}
                        Ok(false) => {
                            thread::yield_now();
                            continue;
                        }
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    }
                    let entry = match reader.next_entry() {
                        Ok(entry) => entry,
                        Err(_) => {
                            failed.fetch_add(1, Ordering::Relaxed);
                            return;
                        }
                    };
                    let in_order = if compacting {
                        entry.index() > last_seen
                    } else {
                        entry.index() == last_seen + 1
                    };
                    if in_order && stress_payload_index(entry.entry()) == Some(entry.index()) {
                        successful.fetch_add(1, Ordering::Relaxed);
                    } else {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                    last_seen = entry.index();
                }
            })
        })
        .collect();

    for _ in 0..config.operations {
        let index = journal.last_index() + 1;
        let appended = journal
            .append(stress_payload(index, config.entry_size))
            .and_then(|entry| journal.commit(entry.index()).map(|()| entry));
        match appended {
            Ok(entry) => {
                successful.fetch_add(1, Ordering::Relaxed);
                if config.compact_every > 0 && entry.index() % config.compact_every as u64 == 0 {
                    let target = entry.index().saturating_sub(config.compact_every as u64);
                    if journal.compact(target.max(1)).is_err() {
                        failed.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            Err(_) => {
                failed.fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
    }

    for handle in handles {
        if handle.join().is_err() {
            failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    StressTestResult::new(
        successful.load(Ordering::Relaxed),
        failed.load(Ordering::Relaxed),
        start.elapsed(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{small_config, TestJournal};
    use segjournal_core::StorageLevel;

    #[test]
    fn test_stress_sequential_appends() {
        let journal = TestJournal::new();
        let config = StressConfig {
            operations: 500,
            entry_size: 64,
            ..Default::default()
        };

        let result = stress_sequential_appends(&journal, &config);
        assert_eq!(result.successful_ops, 500);
        assert_eq!(result.failed_ops, 0);

        let reads = stress_sequential_reads(&journal);
        assert_eq!(reads.successful_ops, 500);
        assert_eq!(reads.failed_ops, 0);
    }

    #[test]
    fn test_stress_tailing_readers() {
        let test_journal = TestJournal::with_config(
            |dir| small_config(dir).max_entries_per_segment(32),
            RawCodec,
        );
        let (config, codec, dir) = test_journal.into_parts();
        let journal = Arc::new(SegmentedJournal::open(config, codec).unwrap());

        let stress = StressConfig {
            operations: 400,
            threads: 3,
            entry_size: 32,
            compact_every: 0,
        };
        let result = stress_tailing_readers(Arc::clone(&journal), &stress);
        assert_eq!(result.failed_ops, 0);
        // Writer appends plus one read per reader per entry.
        assert_eq!(result.successful_ops, 400 * 4);

        drop(journal);
        drop(dir);
    }

    #[test]
    fn test_stress_tailing_readers_with_compaction() {
        let test_journal = TestJournal::with_config(
            |dir| {
                small_config(dir)
                    .max_entries_per_segment(16)
                    .storage_level(StorageLevel::Mapped)
            },
            RawCodec,
        );
        let (config, codec, dir) = test_journal.into_parts();
        let journal = Arc::new(SegmentedJournal::open(config, codec).unwrap());

        let stress = StressConfig {
            operations: 300,
            threads: 2,
            entry_size: 24,
            compact_every: 50,
        };
        let result = stress_tailing_readers(Arc::clone(&journal), &stress);
        assert_eq!(result.failed_ops, 0);
        assert!(journal.first_index() > 1);

        drop(journal);
        drop(dir);
    }

    #[test]
    fn test_payload_stamp() {
        let payload = stress_payload(42, 16);
        assert_eq!(payload.len(), 16);
        assert_eq!(stress_payload_index(&payload), Some(42));
        assert_eq!(stress_payload_index(&[1, 2, 3]), None);
    }
}
