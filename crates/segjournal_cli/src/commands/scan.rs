//! Read-only frame scanning over segment files.
//!
//! Works on the files directly, without taking the journal lock, so a
//! journal can be examined while another process has it open.

use segjournal_core::{read_frame, Frame, JournalResult, SegmentDescriptor, DESCRIPTOR_BYTES};
use segjournal_storage::{FileBackend, SegmentStorage};
use std::path::Path;

/// A validated frame and where it was found.
#[derive(Debug, Clone)]
pub struct ScannedFrame {
    /// Logical index of the entry.
    pub index: u64,
    /// Byte offset of the frame header within the file.
    pub position: u64,
    /// The frame contents.
    pub frame: Frame,
}

/// Iterates over the valid frames of one segment file.
pub struct FrameScanner {
    storage: FileBackend,
    descriptor: SegmentDescriptor,
    position: u64,
    next_index: u64,
}

impl FrameScanner {
    /// Opens `path` and reads its descriptor.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its descriptor is
    /// invalid.
    pub fn open(path: &Path) -> JournalResult<Self> {
        let storage = FileBackend::open(path)?;
        let descriptor = SegmentDescriptor::read_from(&storage)?;
        Ok(Self {
            storage,
            next_index: descriptor.index(),
            descriptor,
            position: DESCRIPTOR_BYTES as u64,
        })
    }

    /// Returns the segment descriptor.
    pub fn descriptor(&self) -> &SegmentDescriptor {
        &self.descriptor
    }

    /// Returns the offset just past the last frame scanned.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Returns the size of the file on disk.
    pub fn file_size(&self) -> JournalResult<u64> {
        Ok(self.storage.size()?)
    }

    /// Returns `true` if non-zero bytes follow the scanned frames, which
    /// means a torn or corrupted frame rather than clean unused space.
    ///
    /// Only meaningful once the scanner is exhausted.
    pub fn has_trailing_data(&self) -> JournalResult<bool> {
        let limit = u64::from(self.descriptor.max_segment_size());
        if self.position >= limit {
            return Ok(false);
        }
        let len = (limit - self.position).min(4096) as usize;
        let bytes = self.storage.read_at(self.position, len)?;
        Ok(bytes.iter().any(|b| *b != 0))
    }

    fn scan_next(&mut self) -> JournalResult<Option<ScannedFrame>> {
        let max_segment_size = u64::from(self.descriptor.max_segment_size());
        let entries = self.next_index - self.descriptor.index();
        if entries >= u64::from(self.descriptor.max_entries()) {
            return Ok(None);
        }

        let max_entry_size = self.descriptor.max_segment_size() as usize;
        let Some(frame) = read_frame(&self.storage, self.position, max_entry_size)? else {
            return Ok(None);
        };
        if self.position + frame.frame_len() as u64 > max_segment_size {
            return Ok(None);
        }

        let scanned = ScannedFrame {
            index: self.next_index,
            position: self.position,
            frame,
        };
        self.position += scanned.frame.frame_len() as u64;
        self.next_index += 1;
        Ok(Some(scanned))
    }
}

impl Iterator for FrameScanner {
    type Item = JournalResult<ScannedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.scan_next().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segjournal_codec::RawCodec;
    use segjournal_core::{JournalConfig, SegmentedJournal};
    use tempfile::tempdir;

    #[test]
    fn scans_frames_in_order() {
        let dir = tempdir().unwrap();
        {
            let journal = SegmentedJournal::open(
                JournalConfig::new().directory(dir.path()).name("scan"),
                RawCodec,
            )
            .unwrap();
            for payload in [&b"one"[..], b"two", b"three"] {
                journal.append(payload.to_vec()).unwrap();
            }
        }

        let mut scanner = FrameScanner::open(&dir.path().join("scan-1.log")).unwrap();
        let frames: Vec<_> = scanner.by_ref().map(Result::unwrap).collect();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].index, 1);
        assert_eq!(frames[0].position, DESCRIPTOR_BYTES as u64);
        assert_eq!(frames[2].frame.payload, b"three");
        assert!(!scanner.has_trailing_data().unwrap());
    }

    #[test]
    fn detects_torn_frame() {
        let dir = tempdir().unwrap();
        {
            let journal = SegmentedJournal::open(
                JournalConfig::new().directory(dir.path()).name("scan"),
                RawCodec,
            )
            .unwrap();
            journal.append(b"intact".to_vec()).unwrap();
            journal.append(b"broken".to_vec()).unwrap();
        }
        let path = dir.path().join("scan-1.log");
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;
        std::fs::write(&path, bytes).unwrap();

        let mut scanner = FrameScanner::open(&path).unwrap();
        assert_eq!(scanner.by_ref().count(), 1);
        assert!(scanner.has_trailing_data().unwrap());
    }
}
