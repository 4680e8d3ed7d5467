//! Error types for the journal.

use std::io;
use thiserror::Error;

/// Result type for journal operations.
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors that can occur in journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] segjournal_storage::StorageError),

    /// Entry codec error.
    #[error("codec error: {0}")]
    Codec(#[from] segjournal_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialized entry exceeds the configured per-entry maximum.
    #[error("entry too large: {size} bytes exceeds maximum of {max} bytes")]
    EntryTooLarge {
        /// Serialized payload size.
        size: usize,
        /// Configured maximum entry size.
        max: usize,
    },

    /// The entry serialized to zero bytes, which is the end-of-data sentinel.
    #[error("entry serialized to an empty payload")]
    EmptyEntry,

    /// The frame does not fit in the remaining space of the segment.
    #[error("segment {segment_id} is full: {required} bytes needed at position {position}")]
    SegmentFull {
        /// Id of the full segment.
        segment_id: u64,
        /// Write position at the time of the append.
        position: u32,
        /// Bytes the frame needed.
        required: usize,
    },

    /// Not enough free space on the journal's volume to allocate a segment.
    #[error("out of disk space: {available} bytes available, {required} bytes required")]
    OutOfDiskSpace {
        /// Usable bytes on the volume.
        available: u64,
        /// Bytes required before a new segment may be allocated.
        required: u64,
    },

    /// A replicated entry's checksum does not match its payload.
    #[error("invalid checksum for entry {index}: expected {expected:08x}, got {actual:08x}")]
    InvalidChecksum {
        /// Index of the rejected entry.
        index: u64,
        /// Checksum supplied with the entry.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// An indexed append would leave a gap in the log.
    #[error("non-sequential append: expected index {expected}, got {actual}")]
    InvalidIndex {
        /// The next index the writer accepts.
        expected: u64,
        /// The index that was supplied.
        actual: u64,
    },

    /// Operation not permitted in current state.
    #[error("illegal state: {message}")]
    IllegalState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A reader was advanced past its last entry.
    #[error("no such element")]
    NoSuchElement,

    /// A segment descriptor could not be decoded.
    #[error("invalid segment descriptor: {message}")]
    InvalidDescriptor {
        /// Description of the format issue.
        message: String,
    },

    /// The journal configuration is unusable.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl JournalError {
    /// Creates an illegal state error.
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }

    /// Creates an invalid descriptor error.
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns `true` for the overflow signal that triggers segment rollover.
    #[must_use]
    pub fn is_segment_full(&self) -> bool {
        matches!(self, Self::SegmentFull { .. })
    }
}
