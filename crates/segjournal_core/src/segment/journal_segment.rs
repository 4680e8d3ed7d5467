//! A segment file with its writer, index and reader bookkeeping.

use super::{SegmentReader, SegmentWriter};
use crate::descriptor::SegmentDescriptor;
use crate::error::{JournalError, JournalResult};
use crate::index::JournalIndex;
use crate::types::StorageLevel;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard, RwLock};
use segjournal_codec::EntryCodec;
use segjournal_storage::{BackendKind, FileBackend, MappedBackend, SegmentStorage};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug)]
struct Lifecycle {
    open: bool,
    released: bool,
    delete_pending: bool,
    next_reader_id: u64,
    readers: HashSet<u64>,
    last_index: u64,
    updated: u64,
}

/// One segment of a journal.
///
/// Owns the storage backend, the segment's sparse index and its single
/// writer. Readers created with [`create_reader`](Self::create_reader) keep
/// the segment alive: [`close`](Self::close) and [`delete`](Self::delete)
/// take effect once the last reader is dropped.
pub struct JournalSegment<C: EntryCodec> {
    path: PathBuf,
    descriptor: SegmentDescriptor,
    storage: RwLock<Option<Arc<dyn SegmentStorage>>>,
    index: Arc<dyn JournalIndex>,
    writer: Mutex<Option<SegmentWriter<C>>>,
    codec: Arc<C>,
    max_entry_size: usize,
    lifecycle: Mutex<Lifecycle>,
}

impl<C: EntryCodec> JournalSegment<C> {
    /// Creates a new segment file at `path` and writes its descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created or written.
    pub fn create(
        path: &Path,
        descriptor: SegmentDescriptor,
        level: StorageLevel,
        index: Box<dyn JournalIndex>,
        codec: Arc<C>,
        max_entry_size: usize,
    ) -> JournalResult<Arc<Self>> {
        let storage = open_storage(path, level, descriptor.max_segment_size())?;
        descriptor.write_to(storage.as_ref())?;
        storage.flush()?;
        tracing::debug!(
            segment = descriptor.id(),
            first_index = descriptor.index(),
            path = %path.display(),
            "created segment"
        );
        Self::build(path, storage, descriptor, index, codec, max_entry_size)
    }

    /// Opens an existing segment file and replays it to find its end.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the header is not a valid descriptor,
    /// or an I/O error.
    pub fn open(
        path: &Path,
        level: StorageLevel,
        index: Box<dyn JournalIndex>,
        codec: Arc<C>,
        max_entry_size: usize,
    ) -> JournalResult<Arc<Self>> {
        let descriptor = {
            let file = FileBackend::open(path)?;
            SegmentDescriptor::read_from(&file)?
        };
        let storage = open_storage(path, level, descriptor.max_segment_size())?;
        Self::build(path, storage, descriptor, index, codec, max_entry_size)
    }

    /// Builds a segment over an arbitrary backend that already holds the
    /// descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if replaying existing frames fails.
    pub fn with_storage(
        path: &Path,
        storage: Arc<dyn SegmentStorage>,
        descriptor: SegmentDescriptor,
        index: Box<dyn JournalIndex>,
        codec: Arc<C>,
        max_entry_size: usize,
    ) -> JournalResult<Arc<Self>> {
        Self::build(path, storage, descriptor, index, codec, max_entry_size)
    }

    fn build(
        path: &Path,
        storage: Arc<dyn SegmentStorage>,
        descriptor: SegmentDescriptor,
        index: Box<dyn JournalIndex>,
        codec: Arc<C>,
        max_entry_size: usize,
    ) -> JournalResult<Arc<Self>> {
        let index: Arc<dyn JournalIndex> = Arc::from(index);
        let writer = SegmentWriter::open(
            Arc::clone(&storage),
            descriptor,
            Arc::clone(&index),
            Arc::clone(&codec),
            max_entry_size,
        )?;
        let last_index = writer.last_index();

        Ok(Arc::new(Self {
            path: path.to_path_buf(),
            descriptor,
            storage: RwLock::new(Some(storage)),
            index,
            writer: Mutex::new(Some(writer)),
            codec,
            max_entry_size,
            lifecycle: Mutex::new(Lifecycle {
                open: true,
                released: false,
                delete_pending: false,
                next_reader_id: 0,
                readers: HashSet::new(),
                last_index,
                updated: descriptor.updated(),
            }),
        }))
    }

    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.descriptor.id()
    }

    /// Returns the segment descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns the path of the segment file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the index of the first entry this segment holds or will hold.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.descriptor.index()
    }

    /// Returns the index of the last entry, or `first_index - 1` if empty.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        if let Some(writer) = self.writer.lock().as_ref() {
            return writer.last_index();
        }
        self.lifecycle.lock().last_index
    }

    /// Returns the last-updated timestamp in milliseconds since the epoch.
    ///
    /// Advances when a flush follows appended or truncated entries.
    #[must_use]
    pub fn updated(&self) -> u64 {
        if let Some(writer) = self.writer.lock().as_ref() {
            return writer.descriptor().updated();
        }
        self.lifecycle.lock().updated
    }

    /// Returns `true` if the segment holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_index() < self.first_index()
    }

    /// Returns the number of bytes in use, descriptor included.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.writer
            .lock()
            .as_ref()
            .map_or(0, |writer| u64::from(writer.position()))
    }

    /// Returns `true` if the segment reached its byte or entry limit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.writer.lock().as_ref().map_or(true, SegmentWriter::is_full)
    }

    /// Returns `true` until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.lifecycle.lock().open
    }

    /// Returns the number of readers currently holding this segment.
    #[must_use]
    pub fn reader_count(&self) -> usize {
        self.lifecycle.lock().readers.len()
    }

    /// Returns the I/O strategy currently backing the segment, or `None`
    /// once its storage has been released.
    #[must_use]
    pub fn storage_kind(&self) -> Option<BackendKind> {
        self.storage.read().as_ref().map(|storage| storage.kind())
    }

    /// Returns the segment's sparse index.
    #[must_use]
    pub fn index(&self) -> &Arc<dyn JournalIndex> {
        &self.index
    }

    pub(crate) fn codec(&self) -> &C {
        &self.codec
    }

    pub(crate) fn max_entry_size(&self) -> usize {
        self.max_entry_size
    }

    /// Returns the current storage backend.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` once the segment's storage has been released.
    pub fn storage(&self) -> JournalResult<Arc<dyn SegmentStorage>> {
        self.storage
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| JournalError::illegal_state(format!("segment {} is closed", self.id())))
    }

    /// Locks and returns the segment's writer.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the segment is closed.
    pub fn writer(&self) -> JournalResult<MappedMutexGuard<'_, SegmentWriter<C>>> {
        if !self.is_open() {
            return Err(JournalError::illegal_state(format!(
                "segment {} is closed",
                self.id()
            )));
        }
        MutexGuard::try_map(self.writer.lock(), Option::as_mut).map_err(|_| {
            JournalError::illegal_state(format!("segment {} is closed", self.id()))
        })
    }

    /// Creates a reader positioned before the segment's first entry.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the segment is closed.
    pub fn create_reader(self: &Arc<Self>) -> JournalResult<SegmentReader<C>> {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.open {
            return Err(JournalError::illegal_state(format!(
                "segment {} is closed",
                self.id()
            )));
        }
        let id = lifecycle.next_reader_id;
        lifecycle.next_reader_id += 1;
        lifecycle.readers.insert(id);
        drop(lifecycle);

        Ok(SegmentReader::new(Arc::clone(self), id))
    }

    pub(super) fn release_reader(&self, id: u64) {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.readers.remove(&id)
            && lifecycle.readers.is_empty()
            && !lifecycle.open
            && !lifecycle.released
        {
            if let Err(e) = self.release(&mut lifecycle) {
                tracing::warn!(segment = self.id(), error = %e, "failed to release segment");
            }
        }
    }

    /// Drops index entries below `index`.
    pub fn compact_index(&self, index: u64) {
        self.index.compact(index);
    }

    /// Switches the segment to a different storage level.
    ///
    /// The writer keeps its position; readers pick up the new backend on
    /// their next read.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the segment is closed, or an I/O error if
    /// the new backend cannot be opened.
    pub fn set_storage_level(&self, level: StorageLevel) -> JournalResult<()> {
        let mut writer = self.writer()?;
        let wanted = match level {
            StorageLevel::Disk => BackendKind::File,
            StorageLevel::Mapped => BackendKind::Mapped,
        };
        if self.storage_kind() == Some(wanted) {
            return Ok(());
        }

        writer.flush()?;
        let storage = open_storage(&self.path, level, self.descriptor.max_segment_size())?;
        writer.set_storage(Arc::clone(&storage));
        *self.storage.write() = Some(storage);
        tracing::debug!(segment = self.id(), %level, "changed segment storage level");
        Ok(())
    }

    /// Flushes written data to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self) -> JournalResult<()> {
        if let Some(writer) = self.writer.lock().as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Closes the segment to new readers and writes.
    ///
    /// Resources are released immediately if no reader holds the segment,
    /// otherwise when the last one is dropped. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails.
    pub fn close(&self) -> JournalResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if !lifecycle.open {
            return Ok(());
        }
        lifecycle.open = false;
        if lifecycle.readers.is_empty() {
            self.release(&mut lifecycle)?;
        } else {
            tracing::debug!(
                segment = self.id(),
                readers = lifecycle.readers.len(),
                "segment close deferred until readers are released"
            );
        }
        Ok(())
    }

    /// Deletes the segment file.
    ///
    /// The segment must be closed first. Deletion is deferred while readers
    /// still hold the segment.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the segment is still open, or an I/O error
    /// if the file cannot be removed.
    pub fn delete(&self) -> JournalResult<()> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.open {
            return Err(JournalError::illegal_state(format!(
                "segment {} must be closed before it is deleted",
                self.id()
            )));
        }
        if lifecycle.released {
            self.remove_file()
        } else {
            lifecycle.delete_pending = true;
            Ok(())
        }
    }

    fn release(&self, lifecycle: &mut Lifecycle) -> JournalResult<()> {
        lifecycle.released = true;
        let writer = self.writer.lock().take();
        if let Some(mut writer) = writer {
            lifecycle.last_index = writer.last_index();
            writer.flush()?;
            lifecycle.updated = writer.descriptor().updated();
        }
        self.storage.write().take();
        tracing::debug!(segment = self.id(), "released segment");

        if lifecycle.delete_pending {
            self.remove_file()?;
        }
        Ok(())
    }

    fn remove_file(&self) -> JournalResult<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(segment = self.id(), path = %self.path.display(), "deleted segment");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl<C: EntryCodec> std::fmt::Debug for JournalSegment<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalSegment")
            .field("id", &self.id())
            .field("first_index", &self.first_index())
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn open_storage(
    path: &Path,
    level: StorageLevel,
    max_segment_size: u32,
) -> JournalResult<Arc<dyn SegmentStorage>> {
    let storage: Arc<dyn SegmentStorage> = match level {
        StorageLevel::Disk => Arc::new(FileBackend::open(path)?),
        StorageLevel::Mapped => Arc::new(MappedBackend::open(path, u64::from(max_segment_size))?),
    };
    Ok(storage)
}
