//! Core type definitions for the journal.

use std::fmt;

/// An entry together with its position in the journal.
///
/// Produced by a writer on append or by a reader on decode. Entries are
/// never edited after the fact; truncation destroys them instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indexed<E> {
    index: u64,
    entry: E,
    size: u32,
    checksum: u32,
}

impl<E> Indexed<E> {
    /// Creates an indexed entry.
    ///
    /// `size` is the serialized payload length and `checksum` the CRC-32 of
    /// those bytes. For replicated entries the checksum is verified when the
    /// entry is appended.
    #[must_use]
    pub const fn new(index: u64, entry: E, size: u32, checksum: u32) -> Self {
        Self {
            index,
            entry,
            size,
            checksum,
        }
    }

    /// Returns the logical index.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns a reference to the entry.
    #[must_use]
    pub const fn entry(&self) -> &E {
        &self.entry
    }

    /// Consumes the wrapper and returns the entry.
    #[must_use]
    pub fn into_entry(self) -> E {
        self.entry
    }

    /// Returns the serialized payload size in bytes.
    #[must_use]
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Returns the CRC-32 of the serialized payload.
    #[must_use]
    pub const fn checksum(&self) -> u32 {
        self.checksum
    }
}

impl<E: fmt::Debug> fmt::Display for Indexed<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Indexed{{index={}, entry={:?}}}", self.index, self.entry)
    }
}

/// Which entries a journal reader may observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReaderMode {
    /// Every written entry.
    #[default]
    All,
    /// Only entries up to the journal's commit index.
    Commits,
}

/// I/O strategy used for segment files.
///
/// Both levels share one on-disk format; a segment can be converted between
/// them while open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageLevel {
    /// Buffered reads and writes through a file handle.
    #[default]
    Disk,
    /// Memory-mapped segment files, pre-sized to `max_segment_size`.
    Mapped,
}

impl fmt::Display for StorageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disk => f.write_str("disk"),
            Self::Mapped => f.write_str("mapped"),
        }
    }
}
