//! On-disk framing of a single journal entry.
//!
//! ## Frame Format
//!
//! ```text
//! | length (4, i32 LE) | crc32 (4, LE) | payload (length) |
//! ```
//!
//! `length` counts payload bytes only and the CRC-32 covers exactly those
//! bytes. A length of zero, a negative length or a length above the
//! configured maximum entry size means "no entry from here on": segments are
//! zero-filled past the last frame, so this is how a reader finds the end of
//! written data.
//!
//! ## Recovery Policy
//!
//! A frame whose stored checksum does not match its payload is treated
//! exactly like a missing frame. A torn append (crash mid-write) and a
//! corrupted tail both stop forward reading at that point; neither is raised
//! as an error.

use crate::error::{JournalError, JournalResult};
use segjournal_codec::EntryCodec;
use segjournal_storage::SegmentStorage;

/// Header size: length (4) + checksum (4).
pub const FRAME_HEADER_SIZE: usize = 8;

/// Computes the CRC-32 (IEEE) checksum used by frames.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// A fully built frame, ready to be written in one contiguous region.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    bytes: Vec<u8>,
    checksum: u32,
}

impl EncodedFrame {
    /// Serializes `entry` and wraps it in a frame header.
    ///
    /// # Errors
    ///
    /// Returns `EntryTooLarge` if the serialized payload exceeds
    /// `max_entry_size`, or a codec error if serialization fails.
    pub fn encode<C: EntryCodec>(
        codec: &C,
        entry: &C::Entry,
        max_entry_size: usize,
    ) -> JournalResult<Self> {
        let mut bytes = vec![0u8; FRAME_HEADER_SIZE];
        codec.encode(entry, &mut bytes)?;
        Self::seal(bytes, max_entry_size)
    }

    /// Wraps already-serialized payload bytes in a frame header.
    ///
    /// # Errors
    ///
    /// Returns `EntryTooLarge` if the payload exceeds `max_entry_size`.
    pub fn from_payload(payload: &[u8], max_entry_size: usize) -> JournalResult<Self> {
        let mut bytes = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&[0u8; FRAME_HEADER_SIZE]);
        bytes.extend_from_slice(payload);
        Self::seal(bytes, max_entry_size)
    }

    fn seal(mut bytes: Vec<u8>, max_entry_size: usize) -> JournalResult<Self> {
        let length = bytes.len() - FRAME_HEADER_SIZE;
        if length == 0 {
            return Err(JournalError::EmptyEntry);
        }
        if length > max_entry_size || length > i32::MAX as usize {
            return Err(JournalError::EntryTooLarge {
                size: length,
                max: max_entry_size,
            });
        }

        let checksum = checksum(&bytes[FRAME_HEADER_SIZE..]);
        bytes[0..4].copy_from_slice(&(length as i32).to_le_bytes());
        bytes[4..8].copy_from_slice(&checksum.to_le_bytes());

        Ok(Self { bytes, checksum })
    }

    /// Returns the complete frame bytes (header and payload).
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Returns the total frame length including the header.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns the payload length.
    #[must_use]
    pub fn payload_len(&self) -> u32 {
        (self.bytes.len() - FRAME_HEADER_SIZE) as u32
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.bytes[FRAME_HEADER_SIZE..]
    }

    /// Returns the payload checksum.
    #[must_use]
    pub const fn checksum(&self) -> u32 {
        self.checksum
    }
}

/// A frame read back from storage whose checksum has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The payload bytes.
    pub payload: Vec<u8>,
    /// The verified checksum.
    pub checksum: u32,
}

impl Frame {
    /// Returns the total on-disk length of this frame.
    #[must_use]
    pub fn frame_len(&self) -> usize {
        FRAME_HEADER_SIZE + self.payload.len()
    }
}

/// Reads and validates the frame at `position`.
///
/// Returns `Ok(None)` when no valid frame is present: zero or out-of-range
/// length, short read, or checksum mismatch.
///
/// # Errors
///
/// Returns an error only if the storage itself fails.
pub fn read_frame(
    storage: &dyn SegmentStorage,
    position: u64,
    max_entry_size: usize,
) -> JournalResult<Option<Frame>> {
    let header = storage.read_at(position, FRAME_HEADER_SIZE)?;
    if header.len() < FRAME_HEADER_SIZE {
        return Ok(None);
    }

    let length = i32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if length <= 0 || length as usize > max_entry_size {
        return Ok(None);
    }
    let stored = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

    let payload = storage.read_at(position + FRAME_HEADER_SIZE as u64, length as usize)?;
    if payload.len() < length as usize {
        tracing::debug!(position, length, "truncated frame payload, treating as end of data");
        return Ok(None);
    }

    let computed = checksum(&payload);
    if computed != stored {
        tracing::debug!(
            position,
            expected = stored,
            actual = computed,
            "frame checksum mismatch, treating as end of data"
        );
        return Ok(None);
    }

    Ok(Some(Frame {
        payload,
        checksum: stored,
    }))
}
