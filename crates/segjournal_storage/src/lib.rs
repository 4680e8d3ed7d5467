//! # segjournal storage
//!
//! Byte-store trait and backends for journal segments.
//!
//! This crate provides the lowest-level storage abstraction for segjournal.
//! Each journal segment file is backed by one [`SegmentStorage`]; backends
//! are **opaque positional byte stores** - they do not interpret the data
//! they store.
//!
//! ## Design Principles
//!
//! - Backends are simple positional stores (read, write, discard, flush)
//! - No knowledge of descriptors, frames or indexes
//! - Must be `Send + Sync`; one backend is shared by a segment's writer and
//!   all of its readers
//! - The journal owns all file format interpretation
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - buffered reads/writes through a file handle
//! - [`MappedBackend`] - memory-mapped, pre-sized file
//! - [`InMemoryBackend`] - for testing and ephemeral storage
//!
//! ## Example
//!
//! ```rust
//! use segjournal_storage::{SegmentStorage, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.write_at(0, b"hello world").unwrap();
//! let data = backend.read_at(0, 11).unwrap();
//! assert_eq!(&data, b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod mapped;
mod memory;

pub use backend::{BackendKind, SegmentStorage};
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use mapped::MappedBackend;
pub use memory::InMemoryBackend;
