//! Segment storage trait definition.

use crate::error::StorageResult;
use std::fmt;

/// The I/O strategy behind a [`SegmentStorage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Buffered reads and writes through a file handle.
    File,
    /// A memory-mapped region over a pre-sized file.
    Mapped,
    /// A heap buffer; nothing survives the process.
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Mapped => f.write_str("mapped"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Positional byte store backing a single journal segment.
///
/// Storage backends are **opaque byte stores**. They know nothing about
/// descriptors, frames or indexes; the journal owns all format interpretation.
///
/// # Invariants
///
/// - `write_at` writes its whole buffer under one lock acquisition, so a
///   concurrent `read_at` sees either none or all of it
/// - bytes that were never written, or were discarded, read as absent
///   (a short read) or as zeros; both mean "nothing here"
/// - `flush` makes every completed `write_at` durable
/// - backends are `Send + Sync` and every method takes `&self`, so one
///   backend can be shared between a segment's writer and its readers
///
/// # Implementors
///
/// - [`super::FileBackend`] - buffered file I/O
/// - [`super::MappedBackend`] - memory-mapped file
/// - [`super::InMemoryBackend`] - for testing
pub trait SegmentStorage: Send + Sync {
    /// Reads up to `len` bytes starting at `offset`.
    ///
    /// The returned buffer is shorter than `len` (possibly empty) when the
    /// read runs past the end of the stored data.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` at `offset` as one contiguous region.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The write would exceed a fixed-size backend's capacity
    /// - An I/O error occurs
    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Discards `len` bytes starting at `offset` so they read as absent.
    ///
    /// Used when the journal truncates entries: stale frames must not be
    /// visible to readers after the cut.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    fn discard(&self, offset: u64, len: u64) -> StorageResult<()>;

    /// Flushes all written data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&self) -> StorageResult<()>;

    /// Returns the current length of the backing store in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Returns the fixed capacity of the backend, or `None` if it grows on
    /// demand.
    fn capacity(&self) -> Option<u64>;

    /// Returns which I/O strategy this backend implements.
    fn kind(&self) -> BackendKind;
}
