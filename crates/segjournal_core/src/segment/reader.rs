//! Sequential reads within a single segment.

use super::JournalSegment;
use crate::descriptor::DESCRIPTOR_BYTES;
use crate::error::{JournalError, JournalResult};
use crate::frame::{read_frame, FRAME_HEADER_SIZE};
use crate::types::Indexed;
use segjournal_codec::EntryCodec;
use std::sync::Arc;

/// Forward cursor over one segment's entries.
///
/// Reads one entry ahead so [`has_next`](Self::has_next) can answer without
/// consuming anything. The reader holds a reference on its segment until
/// it is dropped.
pub struct SegmentReader<C: EntryCodec> {
    segment: Arc<JournalSegment<C>>,
    id: u64,
    position: u32,
    next_index: u64,
    current: Option<Indexed<C::Entry>>,
    peeked: Option<Indexed<C::Entry>>,
}

impl<C: EntryCodec> SegmentReader<C> {
    pub(super) fn new(segment: Arc<JournalSegment<C>>, id: u64) -> Self {
        let next_index = segment.first_index();
        Self {
            segment,
            id,
            position: DESCRIPTOR_BYTES as u32,
            next_index,
            current: None,
            peeked: None,
        }
    }

    /// Returns the segment this reader walks.
    #[must_use]
    pub fn segment(&self) -> &Arc<JournalSegment<C>> {
        &self.segment
    }

    /// Returns the index of the segment's first entry.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.segment.first_index()
    }

    /// Returns the most recently returned entry.
    #[must_use]
    pub fn current_entry(&self) -> Option<&Indexed<C::Entry>> {
        self.current.as_ref()
    }

    /// Returns the index of the most recently returned entry, or
    /// `next_index - 1` if nothing has been returned yet.
    #[must_use]
    pub fn current_index(&self) -> u64 {
        self.current
            .as_ref()
            .map_or(self.next_index - 1, Indexed::index)
    }

    /// Returns the index [`next_entry`](Self::next_entry) will return.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Returns `true` if the segment holds no entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed or the read fails.
    pub fn is_empty(&self) -> JournalResult<bool> {
        let storage = self.segment.storage()?;
        let frame = read_frame(
            storage.as_ref(),
            DESCRIPTOR_BYTES as u64,
            self.segment.max_entry_size(),
        )?;
        Ok(frame.is_none())
    }

    /// Returns `true` if another entry can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the segment is closed, the read fails or a
    /// validated payload cannot be decoded.
    pub fn has_next(&mut self) -> JournalResult<bool> {
        if self.peeked.is_none() {
            self.peeked = self.read_ahead()?;
        }
        Ok(self.peeked.is_some())
    }

    /// Returns the next entry.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchElement` if no entry is available, or any error
    /// [`has_next`](Self::has_next) returns.
    pub fn next_entry(&mut self) -> JournalResult<Indexed<C::Entry>> {
        if !self.has_next()? {
            return Err(JournalError::NoSuchElement);
        }
        let entry = self.peeked.take().ok_or(JournalError::NoSuchElement)?;
        self.next_index = entry.index() + 1;
        self.current = Some(entry.clone());
        Ok(entry)
    }

    /// Rewinds to the segment's first entry.
    pub fn reset(&mut self) {
        self.position = DESCRIPTOR_BYTES as u32;
        self.next_index = self.segment.first_index();
        self.current = None;
        self.peeked = None;
    }

    /// Positions the reader so the next entry returned is `index`.
    ///
    /// Jumps to the nearest indexed position at or before `index - 1` and
    /// scans forward from there. Stops early if the segment ends first.
    ///
    /// # Errors
    ///
    /// Returns an error if reading during the scan fails.
    pub fn reset_to(&mut self, index: u64) -> JournalResult<()> {
        self.reset();
        let first_index = self.segment.first_index();
        if index <= first_index {
            return Ok(());
        }

        if let Some(position) = self.segment.index().lookup(index - 1) {
            if position.index() >= first_index {
                self.position = position.position();
                self.next_index = position.index();
            }
        }

        while self.next_index < index && self.has_next()? {
            self.next_entry()?;
        }
        Ok(())
    }

    /// Releases the reader's reference on its segment.
    pub fn close(self) {}

    fn read_ahead(&mut self) -> JournalResult<Option<Indexed<C::Entry>>> {
        let descriptor = self.segment.descriptor();
        let max_segment_size = u64::from(descriptor.max_segment_size());
        if self.next_index - descriptor.index() >= u64::from(descriptor.max_entries())
            || u64::from(self.position) + FRAME_HEADER_SIZE as u64 > max_segment_size
        {
            return Ok(None);
        }

        let storage = self.segment.storage()?;
        let Some(frame) = read_frame(
            storage.as_ref(),
            u64::from(self.position),
            self.segment.max_entry_size(),
        )?
        else {
            return Ok(None);
        };
        if u64::from(self.position) + frame.frame_len() as u64 > max_segment_size {
            return Ok(None);
        }

        let entry = self.segment.codec().decode(&frame.payload)?;
        self.position += frame.frame_len() as u32;
        Ok(Some(Indexed::new(
            self.next_index,
            entry,
            frame.payload.len() as u32,
            frame.checksum,
        )))
    }
}

impl<C: EntryCodec> Iterator for SegmentReader<C> {
    type Item = JournalResult<Indexed<C::Entry>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.has_next() {
            Ok(true) => Some(self.next_entry()),
            Ok(false) => None,
            Err(e) => Some(Err(e)),
        }
    }
}

impl<C: EntryCodec> Drop for SegmentReader<C> {
    fn drop(&mut self) {
        self.segment.release_reader(self.id);
    }
}

impl<C: EntryCodec> std::fmt::Debug for SegmentReader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentReader")
            .field("segment", &self.segment.id())
            .field("position", &self.position)
            .field("next_index", &self.next_index)
            .finish_non_exhaustive()
    }
}
