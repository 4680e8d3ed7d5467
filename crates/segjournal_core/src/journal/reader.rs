//! Journal-scoped reader.

use super::JournalInner;
use crate::error::{JournalError, JournalResult};
use crate::segment::SegmentReader;
use crate::types::{Indexed, ReaderMode};
use parking_lot::Mutex;
use segjournal_codec::EntryCodec;
use std::sync::Arc;

/// Cursor state of one journal reader.
///
/// Lives behind a mutex shared with the journal's reader registry, so the
/// writer can rebase it after a truncation or compaction.
pub(super) struct ReaderCursor<C: EntryCodec> {
    reader: SegmentReader<C>,
    current: Option<Indexed<C::Entry>>,
    mode: ReaderMode,
}

/// Creates a reader on the segment holding `index`, retrying if the
/// segment is closed between lookup and acquisition.
fn acquire_segment<C: EntryCodec>(
    inner: &JournalInner<C>,
    index: u64,
) -> JournalResult<SegmentReader<C>> {
    loop {
        let segment = inner.get_segment(index)?;
        match segment.create_reader() {
            Ok(reader) => return Ok(reader),
            Err(_) if !segment.is_open() && inner.is_open() => continue,
            Err(e) => return Err(e),
        }
    }
}

impl<C: EntryCodec> ReaderCursor<C> {
    fn open(inner: &JournalInner<C>, index: u64, mode: ReaderMode) -> JournalResult<Self> {
        let reader = acquire_segment(inner, index)?;
        let mut cursor = Self {
            reader,
            current: None,
            mode,
        };
        cursor.reader.reset_to(index)?;
        cursor.current = cursor.reader.current_entry().cloned();
        Ok(cursor)
    }

    pub(super) fn next_index(&self) -> u64 {
        self.reader.next_index()
    }

    fn has_next(&mut self, inner: &JournalInner<C>) -> JournalResult<bool> {
        if self.mode == ReaderMode::Commits && self.next_index() > inner.commit_index() {
            return Ok(false);
        }
        if self.reader.has_next()? {
            return Ok(true);
        }

        // Follow rotation to the segment starting where this one ended.
        let Some(segment) = inner.segment_starting_at(self.next_index()) else {
            return Ok(false);
        };
        if Arc::ptr_eq(&segment, self.reader.segment()) {
            return Ok(false);
        }
        match segment.create_reader() {
            Ok(reader) => {
                tracing::trace!(segment = segment.id(), "reader advanced to next segment");
                self.reader = reader;
                self.reader.has_next()
            }
            Err(_) if !segment.is_open() => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn next_entry(&mut self, inner: &JournalInner<C>) -> JournalResult<Indexed<C::Entry>> {
        if !self.has_next(inner)? {
            return Err(JournalError::NoSuchElement);
        }
        let entry = self.reader.next_entry()?;
        self.current = Some(entry.clone());
        Ok(entry)
    }

    /// Positions the cursor so the next entry returned is `index`, switching
    /// segments if needed.
    pub(super) fn reset_to(&mut self, inner: &JournalInner<C>, index: u64) -> JournalResult<()> {
        let segment = inner.get_segment(index)?;
        if !Arc::ptr_eq(&segment, self.reader.segment()) || !segment.is_open() {
            self.reader = acquire_segment(inner, index)?;
        }
        self.reader.reset_to(index)?;
        self.current = self.reader.current_entry().cloned();
        Ok(())
    }
}

/// Reads entries across segment boundaries.
///
/// Follows the journal as it grows, and is moved automatically when the
/// entries under it are truncated or compacted away. In
/// [`ReaderMode::Commits`] only entries up to the commit index are visible.
pub struct JournalReader<C: EntryCodec> {
    id: u64,
    inner: Arc<JournalInner<C>>,
    cursor: Arc<Mutex<ReaderCursor<C>>>,
    mode: ReaderMode,
}

impl<C: EntryCodec> JournalReader<C> {
    pub(super) fn open(
        inner: Arc<JournalInner<C>>,
        index: u64,
        mode: ReaderMode,
    ) -> JournalResult<Self> {
        let cursor = Arc::new(Mutex::new(ReaderCursor::open(&inner, index, mode)?));
        let id = inner.register_reader(&cursor);
        tracing::debug!(reader = id, index, ?mode, "opened journal reader");
        Ok(Self {
            id,
            inner,
            cursor,
            mode,
        })
    }

    /// Returns which entries this reader may observe.
    #[must_use]
    pub fn mode(&self) -> ReaderMode {
        self.mode
    }

    /// Returns the journal's first index.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.inner.first_index()
    }

    /// Returns the last index visible to this reader.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        let last_index = self.inner.last_index();
        match self.mode {
            ReaderMode::All => last_index,
            ReaderMode::Commits => last_index.min(self.inner.commit_index()),
        }
    }

    /// Returns the index of the most recently returned entry.
    #[must_use]
    pub fn current_index(&self) -> u64 {
        let cursor = self.cursor.lock();
        cursor
            .current
            .as_ref()
            .map_or(cursor.next_index() - 1, Indexed::index)
    }

    /// Returns the most recently returned entry.
    #[must_use]
    pub fn current_entry(&self) -> Option<Indexed<C::Entry>> {
        self.cursor.lock().current.clone()
    }

    /// Returns the index the next call to [`next_entry`](Self::next_entry)
    /// will return.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.cursor.lock().next_index()
    }

    /// Returns `true` if another entry can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails or a payload cannot be decoded.
    pub fn has_next(&mut self) -> JournalResult<bool> {
        self.cursor.lock().has_next(&self.inner)
    }

    /// Returns the next entry.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchElement` if no entry is available, or an error if
    /// reading fails.
    pub fn next_entry(&mut self) -> JournalResult<Indexed<C::Entry>> {
        self.cursor.lock().next_entry(&self.inner)
    }

    /// Rewinds to the journal's first entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or positioning fails.
    pub fn reset(&mut self) -> JournalResult<()> {
        let first_index = self.inner.first_index();
        self.cursor.lock().reset_to(&self.inner, first_index)
    }

    /// Positions the reader so the next entry returned is `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal is closed or positioning fails.
    pub fn reset_to(&mut self, index: u64) -> JournalResult<()> {
        self.cursor.lock().reset_to(&self.inner, index)
    }

    /// Closes the reader, releasing its segment.
    pub fn close(self) {}
}

impl<C: EntryCodec> Iterator for JournalReader<C> {
    type Item = JournalResult<Indexed<C::Entry>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut cursor = self.cursor.lock();
        match cursor.has_next(&self.inner) {
            Ok(true) => Some(cursor.next_entry(&self.inner)),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<C: EntryCodec> Drop for JournalReader<C> {
    fn drop(&mut self) {
        self.inner.deregister_reader(self.id);
    }
}

impl<C: EntryCodec> std::fmt::Debug for JournalReader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalReader")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("next_index", &self.next_index())
            .finish_non_exhaustive()
    }
}
