//! In-memory storage backend for testing.

use crate::backend::{BackendKind, SegmentStorage};
use crate::error::StorageResult;
use parking_lot::RwLock;

/// An in-memory segment backend.
///
/// This backend stores all data in memory and is suitable for:
/// - Unit tests of segment writers and readers
/// - Ephemeral journals that don't need persistence
///
/// # Example
///
/// ```rust
/// use segjournal_storage::{SegmentStorage, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.write_at(0, b"test data").unwrap();
/// assert_eq!(backend.size().unwrap(), 9);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    data: RwLock<Vec<u8>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory backend with pre-existing data.
    ///
    /// Useful for testing recovery scenarios.
    #[must_use]
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Returns a copy of all data in the backend.
    #[must_use]
    pub fn data(&self) -> Vec<u8> {
        self.data.read().clone()
    }

    /// Overwrites a single byte, for corruption tests.
    pub fn corrupt(&self, offset: usize, value: u8) {
        let mut data = self.data.write();
        if offset < data.len() {
            data[offset] = value;
        }
    }
}

impl SegmentStorage for InMemoryBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let data = self.data.read();
        let start = (offset as usize).min(data.len());
        let end = start.saturating_add(len).min(data.len());
        Ok(data[start..end].to_vec())
    }

    fn write_at(&self, offset: u64, new_data: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        let start = offset as usize;
        let end = start + new_data.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(new_data);
        Ok(())
    }

    fn discard(&self, offset: u64, len: u64) -> StorageResult<()> {
        let mut data = self.data.write();
        let start = offset as usize;
        if start >= data.len() {
            return Ok(());
        }
        let end = start.saturating_add(len as usize);
        if end >= data.len() {
            data.truncate(start);
        } else {
            data[start..end].fill(0);
        }
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        // Nothing is buffered
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.data.read().len() as u64)
    }

    fn capacity(&self) -> Option<u64> {
        None
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}
