//! # segjournal core
//!
//! Segmented write-ahead journal.
//!
//! This crate provides:
//! - Frame codec with CRC-32 validation and torn-write detection
//! - Segment descriptors, writers and readers
//! - A sparse, pluggable per-segment index
//! - The segmented journal: rollover, truncation, compaction and reset
//! - Journal-scoped writer and readers that span segment boundaries
//!
//! ## Example
//!
//! ```rust,no_run
//! use segjournal_codec::RawCodec;
//! use segjournal_core::{JournalConfig, ReaderMode, SegmentedJournal};
//!
//! let journal = SegmentedJournal::open(JournalConfig::new().directory("data"), RawCodec)?;
//! journal.append(b"first".to_vec())?;
//! journal.append(b"second".to_vec())?;
//!
//! for entry in journal.open_reader(1, ReaderMode::All)? {
//!     let entry = entry?;
//!     println!("{}: {:?}", entry.index(), entry.entry());
//! }
//! # Ok::<(), segjournal_core::JournalError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod descriptor;
mod dir;
mod error;
mod frame;
mod index;
mod journal;
mod segment;
mod types;

pub use config::JournalConfig;
pub use descriptor::{
    now_millis, SegmentDescriptor, DESCRIPTOR_BYTES, DESCRIPTOR_MAGIC, DESCRIPTOR_VERSION,
};
pub use dir::{list_segment_files, parse_segment_file_name, segment_file_name, JournalDirectory};
pub use error::{JournalError, JournalResult};
pub use frame::{checksum, read_frame, EncodedFrame, Frame, FRAME_HEADER_SIZE};
pub use index::{IndexFactory, JournalIndex, Position, SparseJournalIndex};
pub use journal::{JournalReader, JournalWriter, SegmentInfo, SegmentedJournal};
pub use segment::{JournalSegment, SegmentReader, SegmentWriter};
pub use types::{Indexed, ReaderMode, StorageLevel};

// Re-export the codec and storage seams for convenience.
pub use segjournal_codec::{CborCodec, EntryCodec, RawCodec};
pub use segjournal_storage::{BackendKind, SegmentStorage};
