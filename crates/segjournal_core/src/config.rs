//! Journal configuration.

use crate::descriptor::DESCRIPTOR_BYTES;
use crate::error::{JournalError, JournalResult};
use crate::frame::FRAME_HEADER_SIZE;
use crate::index::{IndexFactory, SparseJournalIndex};
use crate::types::StorageLevel;
use std::fmt;
use std::path::{Path, PathBuf};

/// Configuration for opening a journal.
#[derive(Clone)]
pub struct JournalConfig {
    /// Directory holding the segment files.
    pub directory: PathBuf,

    /// Journal name; segment files are named `{name}-{id}.log`.
    pub name: String,

    /// I/O strategy for segment files.
    pub storage_level: StorageLevel,

    /// Maximum size of a single segment file, descriptor included.
    pub max_segment_size: u32,

    /// Maximum number of entries in a single segment.
    pub max_entries_per_segment: u32,

    /// Maximum serialized size of a single entry.
    pub max_entry_size: usize,

    /// Fraction of entries recorded in each segment's sparse index.
    pub index_density: f64,

    /// Whether to flush the current segment on every commit.
    pub flush_on_commit: bool,

    /// Free space required before allocating a segment, as a multiple of
    /// `max_segment_size`.
    pub disk_space_factor: u64,

    /// Builds the per-segment index. Defaults to a sparse index with
    /// `index_density`.
    pub index_factory: Option<IndexFactory>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            name: "journal".to_string(),
            storage_level: StorageLevel::Disk,
            max_segment_size: 32 * 1024 * 1024, // 32 MB
            max_entries_per_segment: 1024 * 1024,
            max_entry_size: 1024 * 1024, // 1 MB
            index_density: SparseJournalIndex::DEFAULT_DENSITY,
            flush_on_commit: false,
            disk_space_factor: 3,
            index_factory: None,
        }
    }
}

impl JournalConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the journal directory.
    #[must_use]
    pub fn directory(mut self, directory: impl AsRef<Path>) -> Self {
        self.directory = directory.as_ref().to_path_buf();
        self
    }

    /// Sets the journal name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the storage level.
    #[must_use]
    pub const fn storage_level(mut self, level: StorageLevel) -> Self {
        self.storage_level = level;
        self
    }

    /// Sets the maximum segment size.
    #[must_use]
    pub const fn max_segment_size(mut self, size: u32) -> Self {
        self.max_segment_size = size;
        self
    }

    /// Sets the maximum number of entries per segment.
    #[must_use]
    pub const fn max_entries_per_segment(mut self, entries: u32) -> Self {
        self.max_entries_per_segment = entries;
        self
    }

    /// Sets the maximum entry size.
    #[must_use]
    pub const fn max_entry_size(mut self, size: usize) -> Self {
        self.max_entry_size = size;
        self
    }

    /// Sets the sparse index density.
    #[must_use]
    pub const fn index_density(mut self, density: f64) -> Self {
        self.index_density = density;
        self
    }

    /// Sets whether to flush on every commit.
    #[must_use]
    pub const fn flush_on_commit(mut self, value: bool) -> Self {
        self.flush_on_commit = value;
        self
    }

    /// Sets the free disk space factor.
    #[must_use]
    pub const fn disk_space_factor(mut self, factor: u64) -> Self {
        self.disk_space_factor = factor;
        self
    }

    /// Replaces the per-segment index implementation.
    #[must_use]
    pub fn index_factory(mut self, factory: IndexFactory) -> Self {
        self.index_factory = Some(factory);
        self
    }

    /// Returns the free bytes required before a new segment is allocated.
    #[must_use]
    pub fn required_free_space(&self) -> u64 {
        self.disk_space_factor
            .saturating_mul(u64::from(self.max_segment_size))
    }

    /// Returns the configured index factory, or the sparse default.
    #[must_use]
    pub fn resolved_index_factory(&self) -> IndexFactory {
        self.index_factory
            .clone()
            .unwrap_or_else(|| SparseJournalIndex::factory(self.index_density))
    }

    /// Checks the configuration for values the journal cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first problem found.
    pub fn validate(&self) -> JournalResult<()> {
        if self.name.is_empty() || self.name.contains(['/', '\\']) {
            return Err(JournalError::invalid_config(format!(
                "invalid journal name {:?}",
                self.name
            )));
        }
        if (self.max_segment_size as usize) <= DESCRIPTOR_BYTES + FRAME_HEADER_SIZE {
            return Err(JournalError::invalid_config(format!(
                "max segment size {} cannot hold a descriptor and a frame",
                self.max_segment_size
            )));
        }
        if self.max_entries_per_segment == 0 {
            return Err(JournalError::invalid_config(
                "max entries per segment must be positive",
            ));
        }
        if self.max_entry_size == 0 || self.max_entry_size > i32::MAX as usize {
            return Err(JournalError::invalid_config(format!(
                "max entry size {} out of range",
                self.max_entry_size
            )));
        }
        if !(self.index_density.is_finite() && self.index_density > 0.0) {
            return Err(JournalError::invalid_config(format!(
                "index density {} must be positive",
                self.index_density
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for JournalConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalConfig")
            .field("directory", &self.directory)
            .field("name", &self.name)
            .field("storage_level", &self.storage_level)
            .field("max_segment_size", &self.max_segment_size)
            .field("max_entries_per_segment", &self.max_entries_per_segment)
            .field("max_entry_size", &self.max_entry_size)
            .field("index_density", &self.index_density)
            .field("flush_on_commit", &self.flush_on_commit)
            .field("disk_space_factor", &self.disk_space_factor)
            .field("custom_index", &self.index_factory.is_some())
            .finish()
    }
}
