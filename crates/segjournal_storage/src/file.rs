//! File-based storage backend.

use crate::backend::{BackendKind, SegmentStorage};
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A file-based segment backend.
///
/// Reads and writes go through a seekable file handle. The file grows as
/// frames are appended; everything past its end reads as absent.
///
/// # Durability
///
/// - `flush()` calls `File::flush()` followed by `File::sync_data()`
///
/// # Thread Safety
///
/// This backend is thread-safe and can be shared across threads.
/// Internal locking ensures a write is never observed half-done.
///
/// # Example
///
/// ```no_run
/// use segjournal_storage::{SegmentStorage, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("journal-1.log")).unwrap();
/// backend.write_at(64, b"persistent data").unwrap();
/// backend.flush().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: RwLock<File>,
    size: RwLock<u64>,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: RwLock::new(file),
            size: RwLock::new(size),
        })
    }

    /// Opens or creates a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or file cannot be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SegmentStorage for FileBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let size = *self.size.read();
        if offset >= size || len == 0 {
            return Ok(Vec::new());
        }

        let available = (size - offset).min(len as u64) as usize;

        // Seeking moves the shared cursor, so reads take the write lock too.
        let mut file = self.file.write();
        file.seek(SeekFrom::Start(offset))?;

        let mut buffer = vec![0u8; available];
        file.read_exact(&mut buffer)?;

        Ok(buffer)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        let mut file = self.file.write();
        let mut size = self.size.write();

        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        *size = (*size).max(offset + data.len() as u64);

        Ok(())
    }

    fn discard(&self, offset: u64, len: u64) -> StorageResult<()> {
        let file = self.file.write();
        let mut size = self.size.write();

        if offset >= *size {
            return Ok(());
        }

        let end = offset.saturating_add(len);
        if end >= *size {
            file.set_len(offset)?;
            *size = offset;
        } else {
            drop(file);
            drop(size);
            self.write_at(offset, &vec![0u8; len as usize])?;
        }

        Ok(())
    }

    fn flush(&self) -> StorageResult<()> {
        let mut file = self.file.write();
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(*self.size.read())
    }

    fn capacity(&self) -> Option<u64> {
        None
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}
