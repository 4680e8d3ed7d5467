//! Crash simulation and on-disk corruption helpers.
//!
//! Two ways to model a failure:
//!
//! 1. **Crash during write** - [`CrashableBackend`] wraps a segment backend
//!    and stops writing partway through a frame once a byte budget runs out.
//! 2. **Damaged files** - the free functions below flip bytes, cut files
//!    short or append garbage to segment files of a closed journal, so a
//!    reopen exercises recovery.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use segjournal_testkit::crash::{flip_byte, frame_positions, segment_path};
//!
//! let (config, codec, dir) = journal.into_parts();
//! let path = segment_path(dir.path(), "test", 1);
//! flip_byte(&path, frame_positions(&path, 1024)[2] + 8);
//! let journal = TestJournal::from_parts(config, codec, dir);
//! ```

use segjournal_core::{read_frame, segment_file_name, DESCRIPTOR_BYTES};
use segjournal_storage::{BackendKind, FileBackend, SegmentStorage, StorageError, StorageResult};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A backend wrapper that simulates crashes.
///
/// Once the configured number of bytes has been written, the write in
/// flight is cut short: its leading bytes reach the inner backend and the
/// call fails. Every later write and flush fails outright.
pub struct CrashableBackend {
    inner: Arc<dyn SegmentStorage>,
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
    fail_on_flush: AtomicBool,
}

impl CrashableBackend {
    /// Creates a new crashable backend wrapping an inner backend.
    pub fn new(inner: Arc<dyn SegmentStorage>) -> Self {
        Self {
            inner,
            crash_after_bytes: AtomicUsize::new(usize::MAX),
            bytes_written: AtomicUsize::new(0),
            crashed: AtomicBool::new(false),
            fail_on_flush: AtomicBool::new(false),
        }
    }

    /// Sets the backend to crash after writing the specified number of
    /// further bytes.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Sets whether flush should fail.
    pub fn set_fail_on_flush(&self, fail: bool) {
        self.fail_on_flush.store(fail, Ordering::SeqCst);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    fn crash(message: &str) -> StorageError {
        StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, message.to_string()))
    }
}

impl SegmentStorage for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn write_at(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if self.has_crashed() {
            return Err(Self::crash("simulated crash: backend is down"));
        }

        let current = self.bytes_written.fetch_add(data.len(), Ordering::SeqCst);
        let threshold = self.crash_after_bytes.load(Ordering::SeqCst);

        if current.saturating_add(data.len()) > threshold {
            self.crashed.store(true, Ordering::SeqCst);
            let partial = threshold.saturating_sub(current).min(data.len());
            if partial > 0 {
                self.inner.write_at(offset, &data[..partial])?;
            }
            return Err(Self::crash("simulated crash during write"));
        }

        self.inner.write_at(offset, data)
    }

    fn discard(&self, offset: u64, len: u64) -> StorageResult<()> {
        self.inner.discard(offset, len)
    }

    fn flush(&self) -> StorageResult<()> {
        if self.fail_on_flush.load(Ordering::SeqCst) {
            self.crashed.store(true, Ordering::SeqCst);
            return Err(Self::crash("simulated crash during flush"));
        }
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn capacity(&self) -> Option<u64> {
        self.inner.capacity()
    }

    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }
}

/// Returns the path of segment `id` of journal `name` in `dir`.
pub fn segment_path(dir: &Path, name: &str, id: u64) -> PathBuf {
    dir.join(segment_file_name(name, id))
}

/// Returns the byte offset of every valid frame in a segment file.
pub fn frame_positions(path: &Path, max_entry_size: usize) -> Vec<u64> {
    let backend = FileBackend::open(path).expect("Failed to open segment file");
    let mut positions = Vec::new();
    let mut position = DESCRIPTOR_BYTES as u64;
    while let Some(frame) =
        read_frame(&backend, position, max_entry_size).expect("Failed to read frame")
    {
        positions.push(position);
        position += frame.frame_len() as u64;
    }
    positions
}

/// Inverts every bit of the byte at `offset`.
pub fn flip_byte(path: &Path, offset: u64) {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .expect("Failed to open file");
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.read_exact(&mut byte).expect("Failed to read byte");
    byte[0] = !byte[0];
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(&byte).expect("Failed to write byte");
    file.sync_all().expect("Failed to sync");
}

/// Overwrites bytes starting at `offset`.
pub fn overwrite(path: &Path, offset: u64, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.seek(SeekFrom::Start(offset)).expect("Failed to seek");
    file.write_all(bytes).expect("Failed to write");
    file.sync_all().expect("Failed to sync");
}

/// Cuts a file down to `len` bytes, as a crash mid-append would.
pub fn truncate_file(path: &Path, len: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.set_len(len).expect("Failed to truncate");
    file.sync_all().expect("Failed to sync");
}

/// Appends raw bytes to the end of a file.
pub fn append_garbage(path: &Path, bytes: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open file");
    file.write_all(bytes).expect("Failed to append");
    file.sync_all().expect("Failed to sync");
}
