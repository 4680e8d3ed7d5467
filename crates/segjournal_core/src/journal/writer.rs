//! Journal-scoped writer.

use super::JournalInner;
use crate::error::{JournalError, JournalResult};
use crate::frame::EncodedFrame;
use crate::types::Indexed;
use segjournal_codec::EntryCodec;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Appends to the journal, rolling over to new segments as they fill.
///
/// Obtained through [`SegmentedJournal::writer`](super::SegmentedJournal::writer);
/// holding the guard serializes every structural change to the journal.
pub struct JournalWriter<C: EntryCodec> {
    inner: Arc<JournalInner<C>>,
}

impl<C: EntryCodec> JournalWriter<C> {
    pub(super) fn new(inner: Arc<JournalInner<C>>) -> Self {
        Self { inner }
    }

    /// Returns the index of the last written entry.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.inner.last_index()
    }

    /// Returns the last written entry, if the current segment holds one.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the journal is closed.
    pub fn last_entry(&self) -> JournalResult<Option<Indexed<C::Entry>>> {
        let segment = self.inner.last_segment()?;
        let writer = segment.writer()?;
        Ok(writer.last_entry().cloned())
    }

    /// Returns the index the next append will receive.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.inner
            .segments
            .read()
            .values()
            .next_back()
            .map_or(1, |segment| segment.last_index() + 1)
    }

    /// Appends an entry and returns it with its assigned index.
    ///
    /// Rolls over to a new segment when the current one is full or cannot
    /// fit the entry.
    ///
    /// # Errors
    ///
    /// Returns `EntryTooLarge` if the entry exceeds the maximum entry size,
    /// `SegmentFull` if it does not fit even in an empty segment,
    /// `OutOfDiskSpace` if a new segment cannot be allocated, or an I/O
    /// error.
    pub fn append(&mut self, entry: C::Entry) -> JournalResult<Indexed<C::Entry>> {
        self.inner.ensure_open()?;
        let frame = EncodedFrame::encode(
            self.inner.codec.as_ref(),
            &entry,
            self.inner.config.max_entry_size,
        )?;
        self.append_frame(&frame, entry)
    }

    /// Appends a replicated entry whose index is already known.
    ///
    /// An index below the next index truncates the journal to `index - 1`
    /// first, discarding the conflicting suffix.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` if the index skips ahead or precedes the first
    /// retained entry, `InvalidChecksum` if the checksum does not match the
    /// serialized entry, `IllegalState` if the conflict lies below the commit
    /// index, or any error
    /// [`append`](Self::append) returns.
    pub fn append_indexed(&mut self, entry: Indexed<C::Entry>) -> JournalResult<Indexed<C::Entry>> {
        self.inner.ensure_open()?;
        let next_index = self.next_index();
        if entry.index() > next_index {
            return Err(JournalError::InvalidIndex {
                expected: next_index,
                actual: entry.index(),
            });
        }

        let frame = EncodedFrame::encode(
            self.inner.codec.as_ref(),
            entry.entry(),
            self.inner.config.max_entry_size,
        )?;
        if frame.checksum() != entry.checksum() {
            return Err(JournalError::InvalidChecksum {
                index: entry.index(),
                expected: entry.checksum(),
                actual: frame.checksum(),
            });
        }

        let first_index = self.inner.first_index();
        if entry.index() < first_index {
            // The conflicting entry lies before the first retained segment.
            return Err(JournalError::InvalidIndex {
                expected: first_index,
                actual: entry.index(),
            });
        }
        if entry.index() < next_index {
            self.truncate(entry.index() - 1)?;
        }
        self.append_frame(&frame, entry.into_entry())
    }

    fn append_frame(
        &mut self,
        frame: &EncodedFrame,
        entry: C::Entry,
    ) -> JournalResult<Indexed<C::Entry>> {
        let mut segment = self.inner.last_segment()?;
        if segment.is_full() {
            segment = self.inner.next_segment()?;
        }

        let fits = {
            let writer = segment.writer()?;
            match writer.check_capacity(frame) {
                Ok(()) => true,
                Err(e) if e.is_segment_full() && !writer.is_empty() => false,
                Err(e) => return Err(e),
            }
        };
        if !fits {
            segment = self.inner.next_segment()?;
        }

        let mut writer = segment.writer()?;
        writer.append_encoded(frame, entry)
    }

    /// Advances the commit index to `index` if it is higher.
    ///
    /// Flushes the current segment when `flush_on_commit` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn commit(&mut self, index: u64) -> JournalResult<()> {
        let previous = self.inner.commit_index.fetch_max(index, Ordering::AcqRel);
        if index > previous {
            tracing::trace!(index, "advanced commit index");
        }
        if self.inner.config.flush_on_commit {
            self.flush()?;
        }
        Ok(())
    }

    /// Discards every entry after `index`.
    ///
    /// Segments starting after `index` are deleted and the segment holding
    /// it is truncated. Readers positioned past `index` move back to
    /// `index + 1`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if `index` is below the commit index, or an
    /// I/O error.
    pub fn truncate(&mut self, index: u64) -> JournalResult<()> {
        self.inner.ensure_open()?;
        let commit_index = self.inner.commit_index();
        if index < commit_index {
            return Err(JournalError::illegal_state(format!(
                "cannot truncate to {index} below commit index {commit_index}"
            )));
        }
        if index >= self.last_index() {
            return Ok(());
        }

        let first = self.inner.first_segment()?;
        let mut segment = self.inner.last_segment()?;
        while segment.first_index() > index && segment.id() != first.id() {
            segment = self.inner.remove_segment(&segment)?;
        }
        segment.writer()?.truncate(index)?;
        tracing::debug!(index, segment = segment.id(), "truncated journal");

        self.inner.reset_tail(index + 1)
    }

    /// Restarts the log so the next append receives `index`.
    ///
    /// Beyond the current segment's first index every segment is replaced
    /// by one empty segment starting at `index`; otherwise this truncates to
    /// `index - 1`. Every reader moves to `index`.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` for index 0 or when truncating below the
    /// commit index, or an I/O error.
    pub fn reset(&mut self, index: u64) -> JournalResult<()> {
        self.inner.ensure_open()?;
        if index == 0 {
            return Err(JournalError::illegal_state("journal indexes start at 1"));
        }

        let segment = self.inner.last_segment()?;
        if index > segment.first_index() {
            self.inner.reset_segments(index)?;
        } else {
            self.truncate(index - 1)?;
        }

        self.inner.rebase_readers(index, |_| true)
    }

    /// Flushes the current segment to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&mut self) -> JournalResult<()> {
        self.inner.last_segment()?.flush()
    }
}

impl<C: EntryCodec> std::fmt::Debug for JournalWriter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JournalWriter")
            .field("last_index", &self.last_index())
            .field("next_index", &self.next_index())
            .finish_non_exhaustive()
    }
}
