//! Memory-mapped storage backend.
//!
//! The backing file is pre-sized to the segment's capacity and mapped once;
//! unwritten space is zero-filled by the filesystem.

#![allow(unsafe_code)]

use crate::backend::{BackendKind, SegmentStorage};
use crate::error::{StorageError, StorageResult};
use memmap2::MmapMut;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// A memory-mapped segment backend.
///
/// Trades one `msync` per flush for zero syscalls per read and write. The
/// mapping is released when the backend is dropped or [`unmap`](Self::unmap)
/// is called; after that every operation fails with [`StorageError::Closed`].
pub struct MappedBackend {
    path: PathBuf,
    capacity: u64,
    map: RwLock<Option<MmapMut>>,
    // Keeps the descriptor alive for the lifetime of the mapping.
    _file: File,
}

impl MappedBackend {
    /// Opens or creates the file at `path`, grows it to `capacity` bytes and
    /// maps it read-write.
    ///
    /// An existing file longer than `capacity` is mapped in full.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, resized or mapped.
    pub fn open(path: &Path, capacity: u64) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len < capacity {
            file.set_len(capacity)?;
        }
        let capacity = len.max(capacity);

        // SAFETY: the journal is the only writer of its segment files and
        // holds an exclusive directory lock while open, so the file is not
        // truncated underneath the mapping.
        let map = unsafe { MmapMut::map_mut(&file)? };

        Ok(Self {
            path: path.to_path_buf(),
            capacity,
            map: RwLock::new(Some(map)),
            _file: file,
        })
    }

    /// Returns the path to the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and releases the mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn unmap(&self) -> StorageResult<()> {
        if let Some(map) = self.map.write().take() {
            map.flush()?;
        }
        Ok(())
    }

    fn check_bounds(&self, offset: u64, len: usize) -> StorageResult<()> {
        if offset.saturating_add(len as u64) > self.capacity {
            return Err(StorageError::OutOfBounds {
                offset,
                len,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

impl SegmentStorage for MappedBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let guard = self.map.read();
        let map = guard.as_ref().ok_or(StorageError::Closed)?;
        let start = (offset as usize).min(map.len());
        let end = start.saturating_add(len).min(map.len());
        Ok(map[start..end].to_vec())
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.check_bounds(offset, data.len())?;
        let mut guard = self.map.write();
        let map = guard.as_mut().ok_or(StorageError::Closed)?;
        let start = offset as usize;
        map[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn discard(&self, offset: u64, len: u64) -> StorageResult<()> {
        let mut guard = self.map.write();
        let map = guard.as_mut().ok_or(StorageError::Closed)?;
        let start = (offset as usize).min(map.len());
        let end = (offset.saturating_add(len) as usize).min(map.len());
        map[start..end].fill(0);
        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        let guard = self.map.read();
        let map = guard.as_ref().ok_or(StorageError::Closed)?;
        map.flush()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.capacity)
    }

    fn capacity(&self) -> Option<u64> {
        Some(self.capacity)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Mapped
    }
}

impl std::fmt::Debug for MappedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedBackend")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .field("mapped", &self.map.read().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FileBackend;
    use tempfile::tempdir;

    #[test]
    fn mapped_presizes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        let backend = MappedBackend::open(&path, 4096).unwrap();
        assert_eq!(backend.size().unwrap(), 4096);
        assert_eq!(backend.capacity(), Some(4096));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
        assert!(backend.read_at(0, 16).unwrap().iter().all(|b| *b == 0));
    }

    #[test]
    fn mapped_write_and_read() {
        let dir = tempdir().unwrap();
        let backend = MappedBackend::open(&dir.path().join("test.log"), 1024).unwrap();

        backend.write_at(100, b"mapped").unwrap();
        assert_eq!(backend.read_at(100, 6).unwrap(), b"mapped");
    }

    #[test]
    fn mapped_write_past_capacity_fails() {
        let dir = tempdir().unwrap();
        let backend = MappedBackend::open(&dir.path().join("test.log"), 64).unwrap();

        let result = backend.write_at(60, b"too long");
        assert!(matches!(result, Err(StorageError::OutOfBounds { .. })));
    }

    #[test]
    fn mapped_discard_zero_fills() {
        let dir = tempdir().unwrap();
        let backend = MappedBackend::open(&dir.path().join("test.log"), 64).unwrap();

        backend.write_at(0, b"abcdef").unwrap();
        backend.discard(2, 100).unwrap();
        assert_eq!(backend.read_at(0, 6).unwrap(), b"ab\0\0\0\0");
    }

    #[test]
    fn mapped_writes_visible_through_file_backend() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.log");

        {
            let backend = MappedBackend::open(&path, 128).unwrap();
            backend.write_at(8, b"shared").unwrap();
            backend.flush().unwrap();
        }

        let file = FileBackend::open(&path).unwrap();
        assert_eq!(file.read_at(8, 6).unwrap(), b"shared");
    }

    #[test]
    fn unmapped_backend_is_closed() {
        let dir = tempdir().unwrap();
        let backend = MappedBackend::open(&dir.path().join("test.log"), 64).unwrap();

        backend.unmap().unwrap();
        assert!(matches!(backend.read_at(0, 1), Err(StorageError::Closed)));
        assert!(matches!(backend.write_at(0, b"x"), Err(StorageError::Closed)));
    }
}
