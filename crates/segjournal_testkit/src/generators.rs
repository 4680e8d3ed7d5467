//! Property-based test generators using proptest.
//!
//! Provides strategies for generating payloads, structured records,
//! configurations and operation sequences against a journal.

use proptest::prelude::*;
use segjournal_core::{JournalConfig, StorageLevel};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Strategy for generating entry payloads.
///
/// Payloads are never empty: an entry that serializes to nothing cannot be
/// told apart from unwritten space.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..512)
}

/// Strategy for generating a batch of payloads to append in order.
pub fn payload_batch_strategy(max: usize) -> impl Strategy<Value = Vec<Vec<u8>>> {
    prop::collection::vec(payload_strategy(), 1..=max.max(1))
}

/// A structured entry, as a replicated state machine might log it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord {
    /// Leader term the record was written in.
    pub term: u64,
    /// Key being modified.
    pub key: String,
    /// New value, or `None` for a delete.
    pub value: Option<Vec<u8>>,
}

/// Strategy for generating [`TestRecord`]s.
pub fn record_strategy() -> impl Strategy<Value = TestRecord> {
    (
        0u64..1_000,
        prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex"),
        prop::option::of(prop::collection::vec(any::<u8>(), 0..128)),
    )
        .prop_map(|(term, key, value)| TestRecord { term, key, value })
}

/// Strategy for a storage level.
pub fn storage_level_strategy() -> impl Strategy<Value = StorageLevel> {
    prop_oneof![Just(StorageLevel::Disk), Just(StorageLevel::Mapped)]
}

/// Segment limits for a generated configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentLimits {
    /// Storage level.
    pub level: StorageLevel,
    /// Maximum segment size in bytes.
    pub max_segment_size: u32,
    /// Maximum entries per segment.
    pub max_entries: u32,
    /// Sparse index density.
    pub density: f64,
}

impl SegmentLimits {
    /// Builds a journal configuration rooted at `dir`.
    pub fn config(&self, dir: &Path) -> JournalConfig {
        JournalConfig::new()
            .directory(dir)
            .name("prop")
            .storage_level(self.level)
            .max_segment_size(self.max_segment_size)
            .max_entries_per_segment(self.max_entries)
            .max_entry_size(1024)
            .index_density(self.density)
    }
}

/// Strategy for small segment limits that force frequent rollover.
///
/// Segments always have room for at least one maximum-size entry.
pub fn segment_limits_strategy() -> impl Strategy<Value = SegmentLimits> {
    (
        storage_level_strategy(),
        2_048u32..16_384,
        1u32..8,
        prop_oneof![Just(1.0), Just(0.5), Just(0.25), Just(0.005)],
    )
        .prop_map(|(level, max_segment_size, max_entries, density)| SegmentLimits {
            level,
            max_segment_size,
            max_entries,
            density,
        })
}

/// A single journal operation.
///
/// Index arguments are offsets back from the last index at the time the
/// operation is applied, so every generated sequence stays meaningful
/// whatever the earlier operations did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalOp {
    /// Append a payload.
    Append(Vec<u8>),
    /// Commit up to `last_index - n`.
    Commit(u8),
    /// Truncate to `last_index - n`, clamped to what truncation allows.
    Truncate(u8),
    /// Compact at `last_index - n`.
    Compact(u8),
    /// Close the journal and open it again.
    Reopen,
}

/// Strategy for a single journal operation, weighted towards appends.
pub fn journal_op_strategy() -> impl Strategy<Value = JournalOp> {
    prop_oneof![
        8 => prop::collection::vec(any::<u8>(), 1..256).prop_map(JournalOp::Append),
        2 => (0u8..8).prop_map(JournalOp::Commit),
        2 => (0u8..8).prop_map(JournalOp::Truncate),
        1 => (0u8..12).prop_map(JournalOp::Compact),
        1 => Just(JournalOp::Reopen),
    ]
}

/// Strategy for a sequence of journal operations.
pub fn op_sequence_strategy(max_len: usize) -> impl Strategy<Value = Vec<JournalOp>> {
    prop::collection::vec(journal_op_strategy(), 0..=max_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::strategy::ValueTree;
    use proptest::test_runner::TestRunner;

    proptest! {
        #[test]
        fn payloads_are_never_empty(payload in payload_strategy()) {
            prop_assert!(!payload.is_empty());
        }

        #[test]
        fn limits_produce_valid_configs(limits in segment_limits_strategy()) {
            let config = limits.config(Path::new("unused"));
            prop_assert!(config.validate().is_ok());
            prop_assert!(config.max_segment_size as usize > config.max_entry_size + 64 + 8);
        }

        #[test]
        fn record_keys_match_pattern(record in record_strategy()) {
            prop_assert!(!record.key.is_empty());
            prop_assert!(record.key.len() <= 16);
        }
    }

    #[test]
    fn op_sequences_contain_appends() {
        let mut runner = TestRunner::deterministic();
        let strategy = op_sequence_strategy(64);
        let mut appends = 0;
        for _ in 0..16 {
            let ops = strategy.new_tree(&mut runner).unwrap().current();
            appends += ops
                .iter()
                .filter(|op| matches!(op, JournalOp::Append(_)))
                .count();
        }
        assert!(appends > 0);
    }
}
