//! Fixed-size header persisted at the start of every segment file.
//!
//! ## Descriptor Format (64 bytes, little-endian)
//!
//! ```text
//! | magic (4) | version (4) | id (8) | index (8) | max_segment_size (4) |
//! | max_entries (4) | updated (8) | locked (1) | padding (23) |
//! ```
//!
//! The descriptor is written once when the segment is created. Only the
//! `updated` timestamp changes afterwards.

use crate::error::{JournalError, JournalResult};
use segjournal_storage::SegmentStorage;
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic bytes identifying a segment file.
pub const DESCRIPTOR_MAGIC: [u8; 4] = *b"SJNL";

/// Current descriptor format version.
pub const DESCRIPTOR_VERSION: u32 = 1;

/// Size of the serialized descriptor in bytes.
pub const DESCRIPTOR_BYTES: usize = 64;

const UPDATED_OFFSET: usize = 32;

/// Identity and limits of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentDescriptor {
    id: u64,
    version: u32,
    index: u64,
    max_segment_size: u32,
    max_entries: u32,
    updated: u64,
    locked: bool,
}

impl SegmentDescriptor {
    /// Creates a descriptor for a new segment, stamped with the current time.
    #[must_use]
    pub fn new(id: u64, index: u64, max_segment_size: u32, max_entries: u32) -> Self {
        Self {
            id,
            version: DESCRIPTOR_VERSION,
            index,
            max_segment_size,
            max_entries,
            updated: now_millis(),
            locked: false,
        }
    }

    /// Returns the segment id. Ids increase strictly over a journal's lifetime.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Returns the descriptor format version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the logical index of the segment's first entry.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns the maximum segment size in bytes, header included.
    #[must_use]
    pub const fn max_segment_size(&self) -> u32 {
        self.max_segment_size
    }

    /// Returns the maximum number of entries in the segment.
    #[must_use]
    pub const fn max_entries(&self) -> u32 {
        self.max_entries
    }

    /// Returns the last-updated timestamp in milliseconds since the epoch.
    #[must_use]
    pub const fn updated(&self) -> u64 {
        self.updated
    }

    /// Returns whether the segment was locked by its writer.
    #[must_use]
    pub const fn locked(&self) -> bool {
        self.locked
    }

    /// Sets the last-updated timestamp.
    pub fn update(&mut self, timestamp: u64) {
        if !self.locked {
            self.updated = timestamp;
        }
    }

    /// Serializes the descriptor.
    #[must_use]
    pub fn encode(&self) -> [u8; DESCRIPTOR_BYTES] {
        let mut buf = [0u8; DESCRIPTOR_BYTES];
        buf[0..4].copy_from_slice(&DESCRIPTOR_MAGIC);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..16].copy_from_slice(&self.id.to_le_bytes());
        buf[16..24].copy_from_slice(&self.index.to_le_bytes());
        buf[24..28].copy_from_slice(&self.max_segment_size.to_le_bytes());
        buf[28..32].copy_from_slice(&self.max_entries.to_le_bytes());
        buf[UPDATED_OFFSET..UPDATED_OFFSET + 8].copy_from_slice(&self.updated.to_le_bytes());
        buf[40] = u8::from(self.locked);
        buf
    }

    /// Deserializes a descriptor.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDescriptor` if the buffer is short, the magic is
    /// wrong, the version is unknown or a field is out of range.
    pub fn decode(bytes: &[u8]) -> JournalResult<Self> {
        if bytes.len() < DESCRIPTOR_BYTES {
            return Err(JournalError::invalid_descriptor(format!(
                "expected {DESCRIPTOR_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0..4] != DESCRIPTOR_MAGIC {
            return Err(JournalError::invalid_descriptor(format!(
                "invalid magic {:?}",
                &bytes[0..4]
            )));
        }

        let read_u32 =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let read_u64 = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        let version = read_u32(4);
        if version == 0 || version > DESCRIPTOR_VERSION {
            return Err(JournalError::invalid_descriptor(format!(
                "unsupported version {version}"
            )));
        }

        let descriptor = Self {
            version,
            id: read_u64(8),
            index: read_u64(16),
            max_segment_size: read_u32(24),
            max_entries: read_u32(28),
            updated: read_u64(UPDATED_OFFSET),
            locked: bytes[40] != 0,
        };

        if descriptor.id == 0 || descriptor.index == 0 {
            return Err(JournalError::invalid_descriptor(format!(
                "id {} and index {} must both be positive",
                descriptor.id, descriptor.index
            )));
        }
        if (descriptor.max_segment_size as usize) < DESCRIPTOR_BYTES {
            return Err(JournalError::invalid_descriptor(format!(
                "max segment size {} smaller than the descriptor",
                descriptor.max_segment_size
            )));
        }

        Ok(descriptor)
    }

    /// Writes the descriptor at the start of `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_to(&self, storage: &dyn SegmentStorage) -> JournalResult<()> {
        storage.write_at(0, &self.encode())?;
        Ok(())
    }

    /// Rewrites only the timestamp field in `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_timestamp(&self, storage: &dyn SegmentStorage) -> JournalResult<()> {
        storage.write_at(UPDATED_OFFSET as u64, &self.updated.to_le_bytes())?;
        Ok(())
    }

    /// Reads the descriptor from the start of `storage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or the header is invalid.
    pub fn read_from(storage: &dyn SegmentStorage) -> JournalResult<Self> {
        let bytes = storage.read_at(0, DESCRIPTOR_BYTES)?;
        Self::decode(&bytes)
    }
}

/// Milliseconds since the Unix epoch, saturating at zero for clocks set
/// before it.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use segjournal_storage::InMemoryBackend;

    #[test]
    fn descriptor_roundtrip() {
        let descriptor = SegmentDescriptor::new(3, 1001, 1024 * 1024, 500);
        let decoded = SegmentDescriptor::decode(&descriptor.encode()).unwrap();

        assert_eq!(decoded, descriptor);
        assert_eq!(decoded.id(), 3);
        assert_eq!(decoded.index(), 1001);
        assert_eq!(decoded.version(), DESCRIPTOR_VERSION);
        assert!(!decoded.locked());
    }

    #[test]
    fn descriptor_is_64_bytes() {
        let descriptor = SegmentDescriptor::new(1, 1, 4096, 10);
        assert_eq!(descriptor.encode().len(), 64);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut bytes = SegmentDescriptor::new(1, 1, 4096, 10).encode();
        bytes[0] = b'X';
        assert!(matches!(
            SegmentDescriptor::decode(&bytes),
            Err(JournalError::InvalidDescriptor { .. })
        ));
    }

    #[test]
    fn zero_filled_header_rejected() {
        assert!(SegmentDescriptor::decode(&[0u8; 64]).is_err());
    }

    #[test]
    fn short_header_rejected() {
        let bytes = SegmentDescriptor::new(1, 1, 4096, 10).encode();
        assert!(SegmentDescriptor::decode(&bytes[..40]).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = SegmentDescriptor::new(1, 1, 4096, 10).encode();
        bytes[4..8].copy_from_slice(&(DESCRIPTOR_VERSION + 1).to_le_bytes());
        assert!(SegmentDescriptor::decode(&bytes).is_err());
    }

    #[test]
    fn timestamp_update_only_touches_timestamp() {
        let storage = InMemoryBackend::new();
        let mut descriptor = SegmentDescriptor::new(2, 10, 4096, 10);
        descriptor.write_to(&storage).unwrap();

        descriptor.update(42);
        descriptor.write_timestamp(&storage).unwrap();

        let read = SegmentDescriptor::read_from(&storage).unwrap();
        assert_eq!(read.updated(), 42);
        assert_eq!(read.id(), 2);
        assert_eq!(read.index(), 10);
        assert_eq!(storage.size().unwrap(), DESCRIPTOR_BYTES as u64);
    }
}
