//! Appends frames to a single segment.

use crate::descriptor::{now_millis, SegmentDescriptor, DESCRIPTOR_BYTES};
use crate::error::{JournalError, JournalResult};
use crate::frame::{read_frame, EncodedFrame, Frame, FRAME_HEADER_SIZE};
use crate::index::JournalIndex;
use crate::types::Indexed;
use segjournal_codec::EntryCodec;
use segjournal_storage::SegmentStorage;
use std::sync::Arc;

/// Writer for one segment.
///
/// Tracks the append position and the last written entry. Each frame is
/// built in memory and written as one contiguous region, so a concurrent
/// reader never sees a header without its payload.
pub struct SegmentWriter<C: EntryCodec> {
    storage: Arc<dyn SegmentStorage>,
    descriptor: SegmentDescriptor,
    index: Arc<dyn JournalIndex>,
    codec: Arc<C>,
    max_entry_size: usize,
    position: u32,
    last_entry: Option<Indexed<C::Entry>>,
    dirty: bool,
}

impl<C: EntryCodec> SegmentWriter<C> {
    /// Creates a writer and replays the segment to find its end.
    ///
    /// # Errors
    ///
    /// Returns an error if the replay fails to read or decode a frame.
    pub(crate) fn open(
        storage: Arc<dyn SegmentStorage>,
        descriptor: SegmentDescriptor,
        index: Arc<dyn JournalIndex>,
        codec: Arc<C>,
        max_entry_size: usize,
    ) -> JournalResult<Self> {
        let mut writer = Self {
            storage,
            descriptor,
            index,
            codec,
            max_entry_size,
            position: DESCRIPTOR_BYTES as u32,
            last_entry: None,
            dirty: false,
        };
        writer.reset(0)?;
        writer.discard_tail()?;
        Ok(writer)
    }

    /// Returns the descriptor, with the timestamp of the last flush that
    /// followed a change.
    #[must_use]
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns the index of the segment's first entry.
    #[must_use]
    pub fn first_index(&self) -> u64 {
        self.descriptor.index()
    }

    /// Returns the index of the last written entry, or `first_index - 1`
    /// if the segment is empty.
    #[must_use]
    pub fn last_index(&self) -> u64 {
        self.last_entry
            .as_ref()
            .map_or(self.first_index() - 1, Indexed::index)
    }

    /// Returns the last written entry.
    #[must_use]
    pub fn last_entry(&self) -> Option<&Indexed<C::Entry>> {
        self.last_entry.as_ref()
    }

    /// Returns the index the next append will receive.
    #[must_use]
    pub fn next_index(&self) -> u64 {
        self.last_index() + 1
    }

    /// Returns the current append position in bytes, descriptor included.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    /// Returns the number of entries in the segment.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.next_index() - self.first_index()
    }

    /// Returns `true` if no entry has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_entry.is_none()
    }

    /// Returns `true` once the segment reached its byte or entry limit.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.position >= self.descriptor.max_segment_size()
            || self.entry_count() >= u64::from(self.descriptor.max_entries())
    }

    /// Appends an entry and returns it with its assigned index.
    ///
    /// # Errors
    ///
    /// Returns `EntryTooLarge` if the serialized entry exceeds the maximum
    /// entry size and `SegmentFull` if the frame does not fit.
    pub fn append(&mut self, entry: C::Entry) -> JournalResult<Indexed<C::Entry>> {
        let frame = EncodedFrame::encode(self.codec.as_ref(), &entry, self.max_entry_size)?;
        self.append_encoded(&frame, entry)
    }

    /// Appends a replicated entry whose index is already known.
    ///
    /// An index below the next index first truncates the conflicting
    /// suffix. The entry's checksum must match its serialized payload.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIndex` if the index skips ahead, `InvalidChecksum` if
    /// the checksum does not match, or any error `append` returns.
    pub fn append_indexed(
        &mut self,
        entry: Indexed<C::Entry>,
    ) -> JournalResult<Indexed<C::Entry>> {
        let frame = EncodedFrame::encode(self.codec.as_ref(), entry.entry(), self.max_entry_size)?;
        if frame.checksum() != entry.checksum() {
            return Err(JournalError::InvalidChecksum {
                index: entry.index(),
                expected: entry.checksum(),
                actual: frame.checksum(),
            });
        }

        let next_index = self.next_index();
        if entry.index() > next_index {
            return Err(JournalError::InvalidIndex {
                expected: next_index,
                actual: entry.index(),
            });
        }
        if entry.index() < next_index {
            self.truncate(entry.index() - 1)?;
        }

        self.append_encoded(&frame, entry.into_entry())
    }

    /// Fails with `SegmentFull` if `frame` cannot be appended here.
    pub(crate) fn check_capacity(&self, frame: &EncodedFrame) -> JournalResult<()> {
        let end = u64::from(self.position) + frame.frame_len() as u64;
        if end > u64::from(self.descriptor.max_segment_size())
            || self.entry_count() >= u64::from(self.descriptor.max_entries())
        {
            return Err(JournalError::SegmentFull {
                segment_id: self.descriptor.id(),
                position: self.position,
                required: frame.frame_len(),
            });
        }
        Ok(())
    }

    /// Writes a pre-built frame for `entry`.
    pub(crate) fn append_encoded(
        &mut self,
        frame: &EncodedFrame,
        entry: C::Entry,
    ) -> JournalResult<Indexed<C::Entry>> {
        self.check_capacity(frame)?;

        let index = self.next_index();
        let position = self.position;
        self.storage.write_at(u64::from(position), frame.as_bytes())?;
        self.index.index(index, position);
        self.position = position + frame.frame_len() as u32;
        self.dirty = true;

        let indexed = Indexed::new(index, entry, frame.payload_len(), frame.checksum());
        self.last_entry = Some(indexed.clone());
        Ok(indexed)
    }

    /// Discards every entry with an index greater than `index`.
    ///
    /// Truncating to an index below the segment's first index empties the
    /// segment. Discarded bytes read as absent afterwards. No-op if `index`
    /// is at or beyond the last index.
    ///
    /// # Errors
    ///
    /// Returns an error if replaying or discarding fails.
    pub fn truncate(&mut self, index: u64) -> JournalResult<()> {
        if index >= self.last_index() {
            return Ok(());
        }

        let end = self.position;
        self.index.truncate(index);
        if index < self.first_index() {
            self.position = DESCRIPTOR_BYTES as u32;
            self.last_entry = None;
        } else {
            self.reset(index)?;
        }

        self.storage
            .discard(u64::from(self.position), u64::from(end - self.position))?;
        self.dirty = true;
        tracing::debug!(
            segment = self.descriptor.id(),
            index,
            position = self.position,
            "truncated segment"
        );
        Ok(())
    }

    /// Rebuilds the writer state by replaying frames up to `index`, or to the
    /// end of written data if `index` is zero.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be read or the last one decoded.
    pub fn reset(&mut self, index: u64) -> JournalResult<()> {
        let max_segment_size = u64::from(self.descriptor.max_segment_size());
        let max_entries = u64::from(self.descriptor.max_entries());

        let mut position = DESCRIPTOR_BYTES as u32;
        let mut next_index = self.first_index();
        let mut last: Option<(u64, Frame)> = None;

        while (index == 0 || next_index <= index)
            && next_index - self.first_index() < max_entries
            && u64::from(position) + FRAME_HEADER_SIZE as u64 <= max_segment_size
        {
            let Some(frame) =
                read_frame(self.storage.as_ref(), u64::from(position), self.max_entry_size)?
            else {
                break;
            };
            if u64::from(position) + frame.frame_len() as u64 > max_segment_size {
                break;
            }

            self.index.index(next_index, position);
            position += frame.frame_len() as u32;
            last = Some((next_index, frame));
            next_index += 1;
        }

        self.position = position;
        self.last_entry = match last {
            Some((last_index, frame)) => {
                let entry = self.codec.decode(&frame.payload)?;
                Some(Indexed::new(
                    last_index,
                    entry,
                    frame.payload.len() as u32,
                    frame.checksum,
                ))
            }
            None => None,
        };
        Ok(())
    }

    /// Clears whatever follows the last valid frame.
    ///
    /// Replay stops at a torn or corrupt frame, but intact frames written
    /// after it may still be on disk. Left in place, an append over the bad
    /// frame would make them readable again.
    fn discard_tail(&self) -> JournalResult<()> {
        const SCAN_CHUNK: usize = 64 * 1024;

        let start = u64::from(self.position);
        let size = self.storage.size()?;
        let mut offset = start;
        while offset < size {
            let chunk = self.storage.read_at(offset, SCAN_CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            if chunk.iter().any(|&b| b != 0) {
                tracing::warn!(
                    segment = self.descriptor.id(),
                    last_index = self.last_index(),
                    position = self.position,
                    discarded = size - start,
                    "discarding torn segment tail"
                );
                self.storage.discard(start, size - start)?;
                return Ok(());
            }
            offset += chunk.len() as u64;
        }
        Ok(())
    }

    /// Forces written bytes to durable storage.
    ///
    /// If entries were appended or truncated since the last flush, the
    /// descriptor's last-updated timestamp is rewritten first.
    ///
    /// # Errors
    ///
    /// Returns an error if the timestamp write or the flush fails.
    pub fn flush(&mut self) -> JournalResult<()> {
        if self.dirty {
            self.descriptor.update(now_millis());
            self.descriptor.write_timestamp(self.storage.as_ref())?;
            self.dirty = false;
        }
        self.storage.flush()?;
        Ok(())
    }

    /// Points the writer at a different backend over the same file.
    pub(crate) fn set_storage(&mut self, storage: Arc<dyn SegmentStorage>) {
        self.storage = storage;
    }
}

impl<C: EntryCodec> std::fmt::Debug for SegmentWriter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentWriter")
            .field("segment", &self.descriptor.id())
            .field("first_index", &self.first_index())
            .field("last_index", &self.last_index())
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}
