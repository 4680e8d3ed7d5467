//! The segmented journal.
//!
//! A journal is an ordered map of [`JournalSegment`]s keyed by their first
//! index. The last segment is the only one accepting appends; when it fills
//! up a new one is allocated with the next id and the next index.
//!
//! ## Concurrency
//!
//! One writer and any number of readers. Every structural change (append,
//! rollover, truncate, compact, reset) runs under the writer mutex. The
//! segment map sits behind a read-write lock that readers only take briefly
//! to follow rotation. Each reader's cursor has its own mutex, so rebasing
//! readers after a truncation or compaction never interleaves with a read.

mod reader;
mod writer;

pub use reader::JournalReader;
pub use writer::JournalWriter;

use crate::config::JournalConfig;
use crate::descriptor::SegmentDescriptor;
use crate::dir::JournalDirectory;
use crate::error::{JournalError, JournalResult};
use crate::index::IndexFactory;
use crate::segment::JournalSegment;
use crate::types::{Indexed, ReaderMode, StorageLevel};
use parking_lot::{Mutex, MutexGuard, RwLock};
use reader::ReaderCursor;
use segjournal_codec::EntryCodec;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

/// Summary of one segment, for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentInfo {
    /// The segment's descriptor.
    pub descriptor: SegmentDescriptor,
    /// Index of the last entry, or `first_index - 1` if empty.
    pub last_index: u64,
    /// Bytes in use, descriptor included.
    pub size: u64,
    /// Path of the segment file.
    pub path: PathBuf,
}

impl SegmentInfo {
    /// Returns the segment id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.descriptor.id()
    }

    /// Returns the index of the segment's first entry.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.descriptor.index()
    }

    /// Returns the number of entries in the segment.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.last_index + 1 - self.first_index()
    }
}

/// State shared between the journal, its writer and its readers.
struct JournalInner<C: EntryCodec> {
    config: JournalConfig,
    codec: Arc<C>,
    index_factory: IndexFactory,
    directory: JournalDirectory,
    segments: RwLock<BTreeMap<u64, Arc<JournalSegment<C>>>>,
    storage_level: RwLock<StorageLevel>,
    next_segment_id: AtomicU64,
    commit_index: AtomicU64,
    readers: Mutex<HashMap<u64, Weak<Mutex<ReaderCursor<C>>>>>,
    next_reader_id: AtomicU64,
    open: AtomicBool,
}

impl<C: EntryCodec> JournalInner<C> {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> JournalResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(JournalError::illegal_state(format!(
                "journal {} is closed",
                self.config.name
            )))
        }
    }

    fn closed_error(&self) -> JournalError {
        JournalError::illegal_state(format!("journal {} has no segments", self.config.name))
    }

    fn commit_index(&self) -> u64 {
        self.commit_index.load(Ordering::Acquire)
    }

    fn first_segment(&self) -> JournalResult<Arc<JournalSegment<C>>> {
        self.segments
            .read()
            .values()
            .next()
            .cloned()
            .ok_or_else(|| self.closed_error())
    }

    fn last_segment(&self) -> JournalResult<Arc<JournalSegment<C>>> {
        self.segments
            .read()
            .values()
            .next_back()
            .cloned()
            .ok_or_else(|| self.closed_error())
    }

    /// Returns the segment that holds `index`, or the first segment if
    /// `index` precedes it.
    fn get_segment(&self, index: u64) -> JournalResult<Arc<JournalSegment<C>>> {
        let segments = self.segments.read();
        segments
            .range(..=index)
            .next_back()
            .or_else(|| segments.iter().next())
            .map(|(_, segment)| Arc::clone(segment))
            .ok_or_else(|| self.closed_error())
    }

    /// Returns the segment whose first index is exactly `index`.
    fn segment_starting_at(&self, index: u64) -> Option<Arc<JournalSegment<C>>> {
        self.segments.read().get(&index).cloned()
    }

    fn first_index(&self) -> u64 {
        self.segments
            .read()
            .values()
            .next()
            .map_or(0, |segment| segment.first_index())
    }

    fn last_index(&self) -> u64 {
        self.segments
            .read()
            .values()
            .next_back()
            .map_or(0, |segment| segment.last_index())
    }

    /// Creates a segment starting at `index` with a never-used id.
    fn create_segment(&self, index: u64) -> JournalResult<Arc<JournalSegment<C>>> {
        let id = self.next_segment_id.fetch_add(1, Ordering::AcqRel);
        let descriptor = SegmentDescriptor::new(
            id,
            index,
            self.config.max_segment_size,
            self.config.max_entries_per_segment,
        );
        let segment = JournalSegment::create(
            &self.directory.segment_path(id),
            descriptor,
            *self.storage_level.read(),
            (self.index_factory)(),
            Arc::clone(&self.codec),
            self.config.max_entry_size,
        )?;
        self.directory.sync()?;
        Ok(segment)
    }

    fn check_disk_space(&self) -> JournalResult<()> {
        let available = self.directory.available_space()?;
        let required = self.config.required_free_space();
        if available < required {
            tracing::warn!(available, required, "not enough disk space for a new segment");
            return Err(JournalError::OutOfDiskSpace {
                available,
                required,
            });
        }
        Ok(())
    }

    /// Allocates the segment following the current one.
    fn next_segment(&self) -> JournalResult<Arc<JournalSegment<C>>> {
        self.check_disk_space()?;
        let last = self.last_segment()?;
        let segment = self.create_segment(last.last_index() + 1)?;
        self.segments
            .write()
            .insert(segment.first_index(), Arc::clone(&segment));
        tracing::debug!(
            segment = segment.id(),
            first_index = segment.first_index(),
            "rolled over to new segment"
        );
        Ok(segment)
    }

    /// Replaces every segment with one empty segment starting at `index`.
    fn reset_segments(&self, index: u64) -> JournalResult<Arc<JournalSegment<C>>> {
        self.check_disk_space()?;
        let old = std::mem::take(&mut *self.segments.write());
        for segment in old.into_values() {
            segment.close()?;
            segment.delete()?;
        }

        let segment = self.create_segment(index)?;
        self.segments
            .write()
            .insert(segment.first_index(), Arc::clone(&segment));
        tracing::info!(
            journal = %self.config.name,
            segment = segment.id(),
            index,
            "reset journal segments"
        );
        Ok(segment)
    }

    /// Closes and deletes `segment`, returning the new last segment.
    fn remove_segment(
        &self,
        segment: &Arc<JournalSegment<C>>,
    ) -> JournalResult<Arc<JournalSegment<C>>> {
        self.segments.write().remove(&segment.first_index());
        segment.close()?;
        segment.delete()?;
        self.directory.sync()?;
        tracing::debug!(segment = segment.id(), "removed segment");

        match self.last_segment() {
            Ok(last) => Ok(last),
            Err(_) => {
                let fresh = self.create_segment(segment.first_index())?;
                self.segments
                    .write()
                    .insert(fresh.first_index(), Arc::clone(&fresh));
                Ok(fresh)
            }
        }
    }

    fn is_compactable(&self, index: u64) -> bool {
        let Ok(segment) = self.get_segment(index) else {
            return false;
        };
        self.segments
            .read()
            .range(..segment.first_index())
            .next()
            .is_some()
    }

    /// Deletes every segment before the one holding `index`.
    fn compact(&self, index: u64) -> JournalResult<()> {
        let segment = self.get_segment(index)?;
        let removed: Vec<_> = {
            let mut segments = self.segments.write();
            let kept = segments.split_off(&segment.first_index());
            std::mem::replace(&mut *segments, kept).into_values().collect()
        };
        if removed.is_empty() {
            return Ok(());
        }

        for old in &removed {
            old.compact_index(index);
            old.close()?;
            old.delete()?;
        }
        self.directory.sync()?;
        tracing::info!(
            journal = %self.config.name,
            segments = removed.len(),
            first_index = segment.first_index(),
            "compacted journal"
        );

        self.reset_head(segment.first_index())
    }

    fn register_reader(&self, cursor: &Arc<Mutex<ReaderCursor<C>>>) -> u64 {
        let id = self.next_reader_id.fetch_add(1, Ordering::Relaxed);
        let mut readers = self.readers.lock();
        readers.retain(|_, reader| reader.strong_count() > 0);
        readers.insert(id, Arc::downgrade(cursor));
        id
    }

    fn deregister_reader(&self, id: u64) {
        self.readers.lock().remove(&id);
    }

    fn live_readers(&self) -> Vec<Arc<Mutex<ReaderCursor<C>>>> {
        self.readers
            .lock()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    /// Moves every reader whose next index matches `rebase` to `index`.
    fn rebase_readers(&self, index: u64, rebase: impl Fn(u64) -> bool) -> JournalResult<()> {
        let mut result = Ok(());
        for cursor in self.live_readers() {
            let mut cursor = cursor.lock();
            if !rebase(cursor.next_index()) {
                continue;
            }
            tracing::debug!(from = cursor.next_index(), to = index, "rebasing reader");
            if let Err(e) = cursor.reset_to(self, index) {
                tracing::warn!(index, error = %e, "failed to rebase reader");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Moves readers positioned before `index` forward to it.
    fn reset_head(&self, index: u64) -> JournalResult<()> {
        self.rebase_readers(index, |next| next < index)
    }

    /// Moves readers positioned at or after `index` back to it.
    fn reset_tail(&self, index: u64) -> JournalResult<()> {
        self.rebase_readers(index, |next| next >= index)
    }
}

/// A durable, append-only log of entries spread over segment files.
///
/// # Example
///
/// ```rust,no_run
/// use segjournal_codec::RawCodec;
/// use segjournal_core::{JournalConfig, ReaderMode, SegmentedJournal};
///
/// let config = JournalConfig::new().directory("data").name("raft");
/// let journal = SegmentedJournal::open(config, RawCodec)?;
///
/// let entry = journal.append(b"hello".to_vec())?;
/// journal.commit(entry.index())?;
///
/// let mut reader = journal.open_reader(1, ReaderMode::Commits)?;
/// while reader.has_next()? {
///     println!("{}", reader.next_entry()?);
/// }
/// # Ok::<(), segjournal_core::JournalError>(())
/// ```
pub struct SegmentedJournal<C: EntryCodec> {
    inner: Arc<JournalInner<C>>,
    writer: Mutex<JournalWriter<C>>,
}

impl<C: EntryCodec> SegmentedJournal<C> {
    /// Opens the journal described by `config`, recovering existing segments.
    ///
    /// Segments that cannot be read, or that do not continue the index range
    /// of the segment before them, are deleted together with every segment
    /// after them. A fresh segment starting at index 1 is created if none
    /// remain.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for an unusable configuration, `IllegalState`
    /// if the journal is already open elsewhere, or an I/O error.
    pub fn open(config: JournalConfig, codec: C) -> JournalResult<Self> {
        config.validate()?;
        let directory = JournalDirectory::open(&config.directory, &config.name)?;
        let index_factory = config.resolved_index_factory();

        let inner = Arc::new(JournalInner {
            storage_level: RwLock::new(config.storage_level),
            codec: Arc::new(codec),
            index_factory,
            directory,
            segments: RwLock::new(BTreeMap::new()),
            next_segment_id: AtomicU64::new(1),
            commit_index: AtomicU64::new(0),
            readers: Mutex::new(HashMap::new()),
            next_reader_id: AtomicU64::new(0),
            open: AtomicBool::new(true),
            config,
        });

        let loaded = load_segments(&inner)?;
        if loaded.is_empty() {
            let segment = inner.create_segment(1)?;
            inner.segments.write().insert(1, segment);
        } else {
            let mut segments = inner.segments.write();
            for segment in loaded {
                segments.insert(segment.first_index(), segment);
            }
        }

        tracing::info!(
            journal = %inner.config.name,
            directory = %inner.config.directory.display(),
            segments = inner.segments.read().len(),
            first_index = inner.first_index(),
            last_index = inner.last_index(),
            "opened journal"
        );

        let writer = JournalWriter::new(Arc::clone(&inner));
        Ok(Self {
            inner,
            writer: Mutex::new(writer),
        })
    }

    /// Returns the configuration the journal was opened with.
    #[must_use]
    pub fn config(&self) -> &JournalConfig {
        &self.inner.config
    }

    /// Returns the journal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Locks and returns the journal writer.
    ///
    /// The guard serializes every structural change; do not open readers
    /// or call other mutating journal methods while holding it.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the journal is closed.
    pub fn writer(&self) -> JournalResult<MutexGuard<'_, JournalWriter<C>>> {
        self.inner.ensure_open()?;
        Ok(self.writer.lock())
    }

    /// Appends an entry; see [`JournalWriter::append`].
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or the append fails.
    pub fn append(&self, entry: C::Entry) -> JournalResult<Indexed<C::Entry>> {
        self.writer()?.append(entry)
    }

    /// Appends a replicated entry; see [`JournalWriter::append_indexed`].
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or the append fails.
    pub fn append_indexed(&self, entry: Indexed<C::Entry>) -> JournalResult<Indexed<C::Entry>> {
        self.writer()?.append_indexed(entry)
    }

    /// Advances the commit index; see [`JournalWriter::commit`].
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or the flush fails.
    pub fn commit(&self, index: u64) -> JournalResult<()> {
        self.writer()?.commit(index)
    }

    /// Discards entries after `index`; see [`JournalWriter::truncate`].
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or the truncation fails.
    pub fn truncate(&self, index: u64) -> JournalResult<()> {
        self.writer()?.truncate(index)
    }

    /// Restarts the log at `index`; see [`JournalWriter::reset`].
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or the reset fails.
    pub fn reset(&self, index: u64) -> JournalResult<()> {
        self.writer()?.reset(index)
    }

    /// Opens a reader whose first entry is `index`.
    ///
    /// An index below the first index starts at the first entry; an index
    /// past the last one waits at the end of the log.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the journal is closed, or an error if
    /// positioning the reader fails.
    pub fn open_reader(&self, index: u64, mode: ReaderMode) -> JournalResult<JournalReader<C>> {
        let _writer = self.writer()?;
        JournalReader::open(Arc::clone(&self.inner), index, mode)
    }

    /// Deletes every segment that lies entirely before the segment holding
    /// `index`, and moves readers positioned there to the new first index.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or a segment cannot be
    /// deleted.
    pub fn compact(&self, index: u64) -> JournalResult<()> {
        let _writer = self.writer()?;
        self.inner.compact(index)
    }

    /// Returns `true` if [`compact`](Self::compact) at `index` would delete
    /// at least one segment.
    #[must_use]
    pub fn is_compactable(&self, index: u64) -> bool {
        self.inner.is_compactable(index)
    }

    /// Returns the bytes in use across all segments.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner
            .segments
            .read()
            .values()
            .map(|segment| segment.size())
            .sum()
    }

    /// Returns the index of the first entry in the journal.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.inner.first_index()
    }

    /// Returns the index of the last entry, or `first_index - 1` if empty.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.inner.last_index()
    }

    /// Returns `true` if the journal holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let segments = self.inner.segments.read();
        segments.values().all(|segment| segment.is_empty())
    }

    /// Returns `true` until [`close`](Self::close) is called.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    /// Returns the highest committed index.
    #[must_use]
    pub fn commit_index(&self) -> u64 {
        self.inner.commit_index()
    }

    /// Returns the storage level used for segment files.
    #[must_use]
    pub fn storage_level(&self) -> StorageLevel {
        *self.inner.storage_level.read()
    }

    /// Returns the segment holding `index`, or the first segment if `index`
    /// precedes it.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the journal is closed.
    pub fn segment(&self, index: u64) -> JournalResult<Arc<JournalSegment<C>>> {
        self.inner.get_segment(index)
    }

    /// Returns a snapshot of every segment, ordered by first index.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentInfo> {
        self.inner
            .segments
            .read()
            .values()
            .map(|segment| {
                let mut descriptor = *segment.descriptor();
                descriptor.update(segment.updated());
                SegmentInfo {
                    descriptor,
                    last_index: segment.last_index(),
                    size: segment.size(),
                    path: segment.path().to_path_buf(),
                }
            })
            .collect()
    }

    /// Flushes the current segment to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or the flush fails.
    pub fn flush(&self) -> JournalResult<()> {
        self.writer()?.flush()
    }

    /// Converts every segment to `level`. New segments use it too.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or a segment cannot be
    /// reopened.
    pub fn set_storage_level(&self, level: StorageLevel) -> JournalResult<()> {
        let _writer = self.writer()?;
        *self.inner.storage_level.write() = level;
        let segments: Vec<_> = self.inner.segments.read().values().cloned().collect();
        for segment in segments {
            segment.set_storage_level(level)?;
        }
        tracing::info!(journal = %self.inner.config.name, %level, "changed storage level");
        Ok(())
    }

    /// Flushes and closes every segment.
    ///
    /// Segments still held by readers are released when those readers are
    /// dropped. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a segment fails to flush.
    pub fn close(&self) -> JournalResult<()> {
        self.close_segments().map(drop)
    }

    fn close_segments(&self) -> JournalResult<Vec<Arc<JournalSegment<C>>>> {
        let _writer = self.writer.lock();
        if !self.inner.open.swap(false, Ordering::AcqRel) {
            return Ok(Vec::new());
        }

        let segments: Vec<_> = std::mem::take(&mut *self.inner.segments.write())
            .into_values()
            .collect();
        let mut result = Ok(());
        for segment in &segments {
            if let Err(e) = segment.close() {
                tracing::warn!(segment = segment.id(), error = %e, "failed to close segment");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        tracing::info!(journal = %self.inner.config.name, "closed journal");
        result.map(|()| segments)
    }

    /// Closes the journal and removes every segment file.
    ///
    /// # Errors
    ///
    /// Returns an error if closing fails or a file cannot be removed.
    pub fn delete(self) -> JournalResult<()> {
        for segment in self.close_segments()? {
            segment.delete()?;
        }
        for (_, path) in self.inner.directory.list_segments()? {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        self.inner.directory.sync()?;
        tracing::info!(journal = %self.inner.config.name, "deleted journal");
        Ok(())
    }
}

impl<C: EntryCodec> Drop for SegmentedJournal<C> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(journal = %self.inner.config.name, error = %e, "failed to close journal");
        }
    }
}

impl<C: EntryCodec> std::fmt::Debug for SegmentedJournal<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentedJournal")
            .field("name", &self.inner.config.name)
            .field("first_index", &self.first_index())
            .field("last_index", &self.last_index())
            .field("commit_index", &self.commit_index())
            .field("segments", &self.inner.segments.read().len())
            .finish_non_exhaustive()
    }
}

/// Opens the segment files on disk, keeping the longest valid contiguous
/// prefix and deleting the rest.
fn load_segments<C: EntryCodec>(
    inner: &JournalInner<C>,
) -> JournalResult<Vec<Arc<JournalSegment<C>>>> {
    let files = inner.directory.list_segments()?;
    if let Some((max_id, _)) = files.last() {
        inner.next_segment_id.store(max_id + 1, Ordering::Release);
    }
    let mut loaded: Vec<Arc<JournalSegment<C>>> = Vec::with_capacity(files.len());
    let mut discard_from = files.len();

    for (position, (id, path)) in files.iter().enumerate() {
        let segment = match JournalSegment::open(
            path,
            *inner.storage_level.read(),
            (inner.index_factory)(),
            Arc::clone(&inner.codec),
            inner.config.max_entry_size,
        ) {
            Ok(segment) if segment.id() == *id => segment,
            Ok(segment) => {
                tracing::warn!(
                    path = %path.display(),
                    descriptor_id = segment.id(),
                    "segment descriptor does not match file name, discarding"
                );
                segment.close()?;
                discard_from = position;
                break;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable segment, discarding");
                discard_from = position;
                break;
            }
        };

        if let Some(previous) = loaded.last() {
            if previous.is_empty() && previous.first_index() == segment.first_index() {
                // An empty segment superseded by a later one with the same start.
                tracing::warn!(segment = previous.id(), "discarding empty superseded segment");
                if let Some(previous) = loaded.pop() {
                    previous.close()?;
                    previous.delete()?;
                }
            } else if previous.last_index() + 1 != segment.first_index() {
                tracing::warn!(
                    segment = segment.id(),
                    expected_index = previous.last_index() + 1,
                    first_index = segment.first_index(),
                    "segment does not continue the journal, discarding it and all later segments"
                );
                segment.close()?;
                discard_from = position;
                break;
            }
        }
        loaded.push(segment);
    }

    for (_, path) in &files[discard_from..] {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    if discard_from < files.len() {
        inner.directory.sync()?;
    }

    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::checksum;
    use segjournal_codec::RawCodec;
    use std::path::Path;
    use tempfile::tempdir;

    fn config(dir: &Path) -> JournalConfig {
        JournalConfig::new()
            .directory(dir)
            .name("test")
            .max_segment_size(4096)
            .max_entries_per_segment(4)
            .max_entry_size(1024)
            .index_density(0.5)
    }

    fn open(dir: &Path) -> SegmentedJournal<RawCodec> {
        SegmentedJournal::open(config(dir), RawCodec).unwrap()
    }

    fn entry(i: u64) -> Vec<u8> {
        format!("entry-{i}").into_bytes()
    }

    fn append_n(journal: &SegmentedJournal<RawCodec>, range: std::ops::RangeInclusive<u64>) {
        for i in range {
            let indexed = journal.append(entry(i)).unwrap();
            assert_eq!(indexed.index(), i);
        }
    }

    fn read_all(journal: &SegmentedJournal<RawCodec>, from: u64) -> Vec<Vec<u8>> {
        journal
            .open_reader(from, ReaderMode::All)
            .unwrap()
            .map(|e| e.unwrap().into_entry())
            .collect()
    }

    #[test]
    fn fresh_journal_starts_at_one() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());

        assert!(journal.is_open());
        assert!(journal.is_empty());
        assert_eq!(journal.first_index(), 1);
        assert_eq!(journal.last_index(), 0);
        assert_eq!(journal.writer().unwrap().next_index(), 1);
        assert_eq!(journal.segments().len(), 1);
        assert!(dir.path().join("test-1.log").exists());
    }

    #[test]
    fn two_entry_segments_scenario() {
        let dir = tempdir().unwrap();
        let journal =
            SegmentedJournal::open(config(dir.path()).max_entries_per_segment(2), RawCodec)
                .unwrap();

        for payload in [b"A", b"B", b"C"] {
            journal.append(payload.to_vec()).unwrap();
        }

        let segments = journal.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!((segments[0].first_index(), segments[0].last_index), (1, 2));
        assert_eq!((segments[1].first_index(), segments[1].last_index), (3, 3));
        assert_eq!(journal.writer().unwrap().last_index(), 3);

        assert_eq!(
            read_all(&journal, 1),
            vec![b"A".to_vec(), b"B".to_vec(), b"C".to_vec()]
        );

        journal.truncate(2).unwrap();
        assert_eq!(journal.writer().unwrap().last_index(), 2);
        assert_eq!(read_all(&journal, 1), vec![b"A".to_vec(), b"B".to_vec()]);
    }

    #[test]
    fn reader_follows_rollover() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        let mut reader = journal.open_reader(1, ReaderMode::All).unwrap();
        assert!(!reader.has_next().unwrap());

        append_n(&journal, 1..=10);
        assert_eq!(journal.segments().len(), 3);

        let mut seen = Vec::new();
        while reader.has_next().unwrap() {
            seen.push(reader.next_entry().unwrap().into_entry());
        }
        assert_eq!(seen, read_all(&journal, 1));
        assert_eq!(seen.len(), 10);
        assert_eq!(reader.current_index(), 10);
        assert!(matches!(reader.next_entry(), Err(JournalError::NoSuchElement)));
    }

    #[test]
    fn reader_opened_mid_journal() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=10);

        let mut reader = journal.open_reader(6, ReaderMode::All).unwrap();
        assert_eq!(reader.next_index(), 6);
        assert_eq!(reader.current_entry().unwrap().index(), 5);
        assert_eq!(reader.next_entry().unwrap().entry(), &entry(6));

        reader.reset_to(2).unwrap();
        assert_eq!(reader.next_entry().unwrap().entry(), &entry(2));

        reader.reset().unwrap();
        assert_eq!(reader.next_index(), 1);
    }

    #[test]
    fn reopen_recovers_all_segments() {
        let dir = tempdir().unwrap();
        {
            let journal = open(dir.path());
            append_n(&journal, 1..=10);
        }

        let journal = open(dir.path());
        assert_eq!(journal.first_index(), 1);
        assert_eq!(journal.last_index(), 10);
        assert_eq!(journal.segments().len(), 3);
        assert_eq!(read_all(&journal, 1).len(), 10);

        assert_eq!(journal.append(entry(11)).unwrap().index(), 11);
    }

    #[test]
    fn commits_mode_is_clamped() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=5);
        journal.commit(3).unwrap();

        let mut reader = journal.open_reader(1, ReaderMode::Commits).unwrap();
        assert_eq!(reader.mode(), ReaderMode::Commits);
        assert_eq!(reader.last_index(), 3);
        let mut count = 0;
        while reader.has_next().unwrap() {
            reader.next_entry().unwrap();
            count += 1;
        }
        assert_eq!(count, 3);

        journal.commit(5).unwrap();
        assert!(reader.has_next().unwrap());
        assert_eq!(reader.next_entry().unwrap().index(), 4);
    }

    #[test]
    fn commit_index_is_monotonic() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=5);

        journal.commit(4).unwrap();
        journal.commit(2).unwrap();
        assert_eq!(journal.commit_index(), 4);
    }

    #[test]
    fn truncate_below_commit_rejected() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=5);
        journal.commit(4).unwrap();

        let result = journal.truncate(3);
        assert!(matches!(result, Err(JournalError::IllegalState { .. })));
        assert_eq!(journal.last_index(), 5);

        journal.truncate(4).unwrap();
        assert_eq!(journal.last_index(), 4);
    }

    #[test]
    fn truncate_rebases_readers() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=8);

        let mut ahead = journal.open_reader(1, ReaderMode::All).unwrap();
        for _ in 0..6 {
            ahead.next_entry().unwrap();
        }
        let mut peeking = journal.open_reader(1, ReaderMode::All).unwrap();
        for _ in 0..3 {
            peeking.next_entry().unwrap();
        }
        assert!(peeking.has_next().unwrap());

        journal.truncate(3).unwrap();
        assert_eq!(ahead.next_index(), 4);
        assert_eq!(peeking.next_index(), 4);

        journal.append(b"replacement".to_vec()).unwrap();
        assert_eq!(ahead.next_entry().unwrap().entry(), b"replacement");
        assert_eq!(peeking.next_entry().unwrap().entry(), b"replacement");
    }

    #[test]
    fn append_indexed_replaces_conflicting_suffix() {
        let dir = tempdir().unwrap();
        let journal =
            SegmentedJournal::open(config(dir.path()).max_entries_per_segment(2), RawCodec)
                .unwrap();
        append_n(&journal, 1..=5);

        let payload = b"leader".to_vec();
        let replicated = Indexed::new(3, payload.clone(), 6, checksum(&payload));
        let written = journal.append_indexed(replicated).unwrap();

        assert_eq!(written.index(), 3);
        assert_eq!(journal.last_index(), 3);
        assert_eq!(read_all(&journal, 3), vec![payload]);
    }

    #[test]
    fn append_indexed_rejects_gap_and_bad_checksum() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=2);

        let payload = b"x".to_vec();
        let gap = Indexed::new(5, payload.clone(), 1, checksum(&payload));
        assert!(matches!(
            journal.append_indexed(gap),
            Err(JournalError::InvalidIndex { expected: 3, actual: 5 })
        ));

        let corrupt = Indexed::new(3, payload, 1, 0);
        assert!(matches!(
            journal.append_indexed(corrupt),
            Err(JournalError::InvalidChecksum { index: 3, .. })
        ));
        assert_eq!(journal.last_index(), 2);
    }

    #[test]
    fn append_indexed_before_first_index_keeps_entries() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=10);
        journal.compact(6).unwrap();
        assert_eq!(journal.first_index(), 5);

        let payload = b"stale".to_vec();
        let stale = Indexed::new(3, payload.clone(), 5, checksum(&payload));
        assert!(matches!(
            journal.append_indexed(stale),
            Err(JournalError::InvalidIndex { expected: 5, actual: 3 })
        ));

        assert_eq!(journal.first_index(), 5);
        assert_eq!(journal.last_index(), 10);
        assert_eq!(read_all(&journal, 5), (5..=10).map(entry).collect::<Vec<_>>());
    }

    #[test]
    fn oversized_entries_rejected() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());

        let result = journal.append(vec![0u8; 1025]);
        assert!(matches!(result, Err(JournalError::EntryTooLarge { size: 1025, max: 1024 })));
        assert!(journal.is_empty());
    }

    #[test]
    fn entry_larger_than_empty_segment_is_fatal() {
        let dir = tempdir().unwrap();
        let journal =
            SegmentedJournal::open(config(dir.path()).max_segment_size(128), RawCodec).unwrap();

        let result = journal.append(vec![1u8; 100]);
        assert!(matches!(result, Err(JournalError::SegmentFull { .. })));
        assert_eq!(journal.segments().len(), 1);
    }

    #[test]
    fn byte_overflow_rolls_over() {
        let dir = tempdir().unwrap();
        let journal = SegmentedJournal::open(
            config(dir.path())
                .max_segment_size(200)
                .max_entries_per_segment(100),
            RawCodec,
        )
        .unwrap();

        for _ in 0..3 {
            journal.append(vec![7u8; 50]).unwrap();
        }
        let segments = journal.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].last_index, 2);
        assert_eq!(segments[1].first_index(), 3);
    }

    #[test]
    fn out_of_disk_space_checked_before_rollover() {
        let dir = tempdir().unwrap();
        let journal = SegmentedJournal::open(
            config(dir.path())
                .max_entries_per_segment(1)
                .disk_space_factor(u64::MAX),
            RawCodec,
        )
        .unwrap();

        journal.append(entry(1)).unwrap();
        let result = journal.append(entry(2));
        assert!(matches!(result, Err(JournalError::OutOfDiskSpace { .. })));
        assert_eq!(journal.segments().len(), 1);
    }

    #[test]
    fn compaction_deletes_whole_segments_and_rebases_readers() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=10);

        assert!(!journal.is_compactable(3));
        assert!(journal.is_compactable(6));

        let mut reader = journal.open_reader(1, ReaderMode::All).unwrap();
        reader.next_entry().unwrap();
        reader.next_entry().unwrap();

        journal.compact(6).unwrap();
        assert_eq!(journal.first_index(), 5);
        assert_eq!(journal.segments().len(), 2);
        assert!(!dir.path().join("test-1.log").exists());

        assert_eq!(reader.next_index(), 5);
        assert_eq!(reader.next_entry().unwrap().entry(), &entry(5));

        // Compacting inside the first segment does nothing.
        journal.compact(5).unwrap();
        assert_eq!(journal.first_index(), 5);
    }

    #[test]
    fn reset_beyond_current_segment_starts_fresh() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=6);
        let mut reader = journal.open_reader(1, ReaderMode::All).unwrap();

        journal.reset(100).unwrap();
        assert_eq!(journal.first_index(), 100);
        assert_eq!(journal.last_index(), 99);
        assert!(journal.is_empty());
        assert_eq!(journal.segments()[0].id(), 3);
        assert!(!dir.path().join("test-1.log").exists());
        assert_eq!(reader.next_index(), 100);

        assert_eq!(journal.append(entry(100)).unwrap().index(), 100);
        assert_eq!(reader.next_entry().unwrap().entry(), &entry(100));
    }

    #[test]
    fn reset_to_current_first_index_truncates() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=3);

        journal.reset(1).unwrap();
        assert!(journal.is_empty());
        assert_eq!(journal.first_index(), 1);
        assert_eq!(journal.last_index(), 0);
        assert_eq!(journal.segments()[0].id(), 1);
        assert_eq!(journal.append(entry(1)).unwrap().index(), 1);
        assert!(journal.reset(0).is_err());
    }

    #[test]
    fn non_contiguous_tail_discarded_on_open() {
        let dir = tempdir().unwrap();
        {
            let journal =
                SegmentedJournal::open(config(dir.path()).max_entries_per_segment(2), RawCodec)
                    .unwrap();
            append_n(&journal, 1..=6);
        }
        std::fs::remove_file(dir.path().join("test-2.log")).unwrap();

        let journal =
            SegmentedJournal::open(config(dir.path()).max_entries_per_segment(2), RawCodec)
                .unwrap();
        assert_eq!(journal.last_index(), 2);
        assert_eq!(journal.segments().len(), 1);
        assert!(!dir.path().join("test-3.log").exists());
        assert_eq!(journal.append(entry(3)).unwrap().index(), 3);
    }

    #[test]
    fn corrupt_descriptor_discards_tail() {
        let dir = tempdir().unwrap();
        {
            let journal = open(dir.path());
            append_n(&journal, 1..=10);
        }
        std::fs::write(dir.path().join("test-2.log"), [0xABu8; 64]).unwrap();

        let journal = open(dir.path());
        assert_eq!(journal.last_index(), 4);
        assert!(!dir.path().join("test-2.log").exists());
        assert!(!dir.path().join("test-3.log").exists());
    }

    #[test]
    fn torn_tail_write_is_dropped() {
        let dir = tempdir().unwrap();
        {
            let journal = open(dir.path());
            append_n(&journal, 1..=3);
        }
        let path = dir.path().join("test-1.log");
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let journal = open(dir.path());
        assert_eq!(journal.last_index(), 2);
        assert_eq!(journal.append(entry(3)).unwrap().index(), 3);
        assert_eq!(read_all(&journal, 1).len(), 3);
    }

    #[test]
    fn second_open_is_rejected() {
        let dir = tempdir().unwrap();
        let _journal = open(dir.path());

        let result = SegmentedJournal::open(config(dir.path()), RawCodec);
        assert!(matches!(result, Err(JournalError::IllegalState { .. })));
    }

    #[test]
    fn mapped_journal_round_trip() {
        let dir = tempdir().unwrap();
        {
            let journal = SegmentedJournal::open(
                config(dir.path()).storage_level(StorageLevel::Mapped),
                RawCodec,
            )
            .unwrap();
            append_n(&journal, 1..=10);
            journal.flush().unwrap();
        }

        let journal = open(dir.path());
        assert_eq!(journal.storage_level(), StorageLevel::Disk);
        assert_eq!(journal.last_index(), 10);
        assert_eq!(read_all(&journal, 1).len(), 10);
    }

    #[test]
    fn storage_level_switch_while_open() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=5);

        journal.set_storage_level(StorageLevel::Mapped).unwrap();
        assert_eq!(journal.storage_level(), StorageLevel::Mapped);
        append_n(&journal, 6..=10);

        journal.set_storage_level(StorageLevel::Disk).unwrap();
        let expected: Vec<_> = (1..=10).map(entry).collect();
        assert_eq!(read_all(&journal, 1), expected);
    }

    #[test]
    fn closed_journal_rejects_operations() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        journal.append(entry(1)).unwrap();
        journal.close().unwrap();
        journal.close().unwrap();

        assert!(!journal.is_open());
        assert!(matches!(journal.append(entry(2)), Err(JournalError::IllegalState { .. })));
        assert!(journal.open_reader(1, ReaderMode::All).is_err());
    }

    #[test]
    fn delete_removes_segment_files() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        append_n(&journal, 1..=10);

        journal.delete().unwrap();
        let remaining = crate::dir::list_segment_files(dir.path(), "test").unwrap();
        assert!(remaining.is_empty());
    }

    #[test]
    fn size_counts_used_bytes() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        let empty = journal.size();
        assert_eq!(empty, crate::descriptor::DESCRIPTOR_BYTES as u64);

        journal.append(vec![0u8; 10]).unwrap();
        assert_eq!(journal.size(), empty + 18);
    }

    #[test]
    fn concurrent_reader_sees_every_entry_in_order() {
        let dir = tempdir().unwrap();
        let journal = open(dir.path());
        let mut reader = journal.open_reader(1, ReaderMode::All).unwrap();

        std::thread::scope(|scope| {
            scope.spawn(|| append_n(&journal, 1..=200));

            let mut next = 1;
            while next <= 200 {
                if reader.has_next().unwrap() {
                    let indexed = reader.next_entry().unwrap();
                    assert_eq!(indexed.index(), next);
                    assert_eq!(indexed.entry(), &entry(next));
                    next += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });
    }

    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    struct Vote {
        term: u64,
        candidate: String,
    }

    #[test]
    fn cbor_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let codec = segjournal_codec::CborCodec::<Vote>::new();
        let votes: Vec<_> = (1..=6)
            .map(|term| Vote {
                term,
                candidate: format!("node-{}", term % 3),
            })
            .collect();

        {
            let journal = SegmentedJournal::open(config(dir.path()), codec.clone()).unwrap();
            for vote in &votes {
                journal.append(vote.clone()).unwrap();
            }
        }

        let journal = SegmentedJournal::open(config(dir.path()), codec).unwrap();
        let read: Vec<_> = journal
            .open_reader(1, ReaderMode::All)
            .unwrap()
            .map(|e| e.unwrap().into_entry())
            .collect();
        assert_eq!(read, votes);
    }

    proptest::proptest! {
        #![proptest_config(proptest::prelude::ProptestConfig::with_cases(24))]

        #[test]
        fn appended_payloads_read_back_in_order(
            payloads in proptest::collection::vec(
                proptest::collection::vec(proptest::prelude::any::<u8>(), 1..300),
                1..40,
            ),
        ) {
            let dir = tempdir().unwrap();
            let journal = open(dir.path());
            for (i, payload) in payloads.iter().enumerate() {
                let indexed = journal.append(payload.clone()).unwrap();
                proptest::prop_assert_eq!(indexed.index(), i as u64 + 1);
                proptest::prop_assert_eq!(indexed.checksum(), checksum(payload));
            }
            proptest::prop_assert_eq!(read_all(&journal, 1), payloads);
        }
    }
}
