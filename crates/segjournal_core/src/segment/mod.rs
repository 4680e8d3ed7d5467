//! Journal segments.
//!
//! A segment is one file holding a contiguous run of entries:
//!
//! ```text
//! | descriptor (64) | frame | frame | ... | zero / end of file |
//! ```
//!
//! Each frame is `length (i32 LE) | crc32 (u32 LE) | payload`. The first
//! frame that is missing, zero-length, oversized or fails its checksum marks
//! the end of the segment's data.
//!
//! A [`JournalSegment`] owns one writer and hands out any number of
//! [`SegmentReader`]s. Readers hold a reference on the segment, so closing
//! or deleting it is deferred until the last one is released.

mod journal_segment;
mod reader;
mod writer;

pub use journal_segment::JournalSegment;
pub use reader::SegmentReader;
pub use writer::SegmentWriter;
