//! Fuzz testing harnesses for segjournal.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks.

use crate::generators::JournalOp;
use crate::integration::JournalHarness;
use segjournal_codec::RawCodec;
use segjournal_core::{read_frame, JournalSegment, SegmentDescriptor, SparseJournalIndex};
use segjournal_storage::InMemoryBackend;
use std::path::Path;
use std::sync::Arc;

const FUZZ_MAX_ENTRY: usize = 4096;

/// Fuzz target for the frame reader.
///
/// Walks frames through arbitrary bytes. Every byte sequence must either
/// yield a frame whose checksum holds or end the walk; nothing may panic.
pub fn fuzz_read_frame(data: &[u8]) {
    let backend = InMemoryBackend::with_data(data.to_vec());
    let mut position = 0u64;
    while let Ok(Some(frame)) = read_frame(&backend, position, FUZZ_MAX_ENTRY) {
        assert_eq!(segjournal_core::checksum(&frame.payload), frame.checksum);
        assert!(!frame.payload.is_empty());
        position += frame.frame_len() as u64;
    }
}

/// Fuzz target for segment replay.
///
/// Places arbitrary bytes after a valid descriptor and opens a segment over
/// them. Whatever prefix replays must read back with dense indexes.
pub fn fuzz_segment_replay(data: &[u8]) {
    let descriptor = SegmentDescriptor::new(1, 1, 1024 * 1024, 1024);
    let mut bytes = descriptor.encode().to_vec();
    bytes.extend_from_slice(data);

    let Ok(segment) = JournalSegment::with_storage(
        Path::new("fuzz-1.log"),
        Arc::new(InMemoryBackend::with_data(bytes)),
        descriptor,
        Box::new(SparseJournalIndex::new(0.5)),
        Arc::new(RawCodec),
        FUZZ_MAX_ENTRY,
    ) else {
        return;
    };

    let Ok(reader) = segment.create_reader() else {
        return;
    };
    let mut expected = segment.first_index();
    for entry in reader {
        let Ok(entry) = entry else {
            break;
        };
        assert_eq!(entry.index(), expected);
        expected += 1;
    }
    assert_eq!(expected, segment.last_index() + 1);
}

/// Fuzz target for journal operation sequences.
///
/// Decodes operations from the input and runs them against a real journal
/// and the reference model, checking both agree after every step.
pub fn fuzz_journal_operations(data: &[u8]) {
    let ops = parse_ops(data);
    if ops.is_empty() {
        return;
    }
    let mut harness = JournalHarness::new();
    harness.run(&ops);
}

/// Parses journal operations from fuzzer input.
///
/// Each operation starts with a tag byte; appends carry a length byte and
/// that many payload bytes. Input that runs out mid-operation ends the
/// sequence.
pub fn parse_ops(data: &[u8]) -> Vec<JournalOp> {
    let mut ops = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let tag = data[offset];
        offset += 1;

        let op = match tag % 5 {
            0 => {
                let Some(&len) = data.get(offset) else {
                    break;
                };
                offset += 1;
                let len = usize::from(len).max(1);
                if offset + len > data.len() {
                    break;
                }
                let payload = data[offset..offset + len].to_vec();
                offset += len;
                JournalOp::Append(payload)
            }
            1 | 2 | 3 => {
                let Some(&back) = data.get(offset) else {
                    break;
                };
                offset += 1;
                let back = back % 8;
                match tag % 5 {
                    1 => JournalOp::Commit(back),
                    2 => JournalOp::Truncate(back),
                    _ => JournalOp::Compact(back),
                }
            }
            _ => JournalOp::Reopen,
        };

        ops.push(op);
    }

    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::hash::{DefaultHasher, Hash, Hasher};

    /// Generate pseudo-random data for fuzzing based on a seed.
    fn generate_random_data(seed: u64, len: usize) -> Vec<u8> {
        let mut hasher = DefaultHasher::new();
        let mut result = Vec::with_capacity(len);
        let mut state = seed;

        for _ in 0..len {
            state.hash(&mut hasher);
            state = hasher.finish();
            hasher = DefaultHasher::new();
            result.push((state & 0xFF) as u8);
        }

        result
    }

    #[test]
    fn test_fuzz_read_frame_empty() {
        fuzz_read_frame(&[]);
    }

    #[test]
    fn test_fuzz_read_frame_valid_prefix() {
        let frame = segjournal_core::EncodedFrame::from_payload(b"abc", FUZZ_MAX_ENTRY).unwrap();
        let mut data = frame.as_bytes().to_vec();
        data.extend_from_slice(&[0x7F, 0x00, 0x00, 0x00, 1, 2, 3]);
        fuzz_read_frame(&data);
    }

    #[test]
    fn test_fuzz_segment_replay_garbage() {
        fuzz_segment_replay(&[0xFF; 64]);
        fuzz_segment_replay(&[0x00; 64]);
    }

    #[test]
    fn test_parse_ops() {
        let data = [0, 2, b'h', b'i', 1, 0, 2, 9, 3, 1, 4];
        let ops = parse_ops(&data);
        assert_eq!(
            ops,
            vec![
                JournalOp::Append(b"hi".to_vec()),
                JournalOp::Commit(0),
                JournalOp::Truncate(1),
                JournalOp::Compact(1),
                JournalOp::Reopen,
            ]
        );
    }

    #[test]
    fn test_parse_ops_stops_on_short_input() {
        assert!(parse_ops(&[0, 10, 1, 2]).is_empty());
        assert_eq!(parse_ops(&[4, 1]), vec![JournalOp::Reopen]);
    }

    #[test]
    fn fuzz_read_frame_random_iterations() {
        for seed in 0..200 {
            fuzz_read_frame(&generate_random_data(seed, 256));
        }
    }

    #[test]
    fn fuzz_segment_replay_random_iterations() {
        for seed in 0..100 {
            fuzz_segment_replay(&generate_random_data(seed, 512));
        }
    }

    #[test]
    fn fuzz_journal_operations_random_iterations() {
        for seed in 0..20 {
            fuzz_journal_operations(&generate_random_data(seed, 200));
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn fuzz_segment_replay_after_valid_frames(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..64), 0..8),
            tail in prop::collection::vec(any::<u8>(), 0..64),
        ) {
            let mut data = Vec::new();
            for payload in &payloads {
                let frame = segjournal_core::EncodedFrame::from_payload(payload, FUZZ_MAX_ENTRY).unwrap();
                data.extend_from_slice(frame.as_bytes());
            }
            data.extend_from_slice(&tail);
            fuzz_segment_replay(&data);
        }
    }
}
