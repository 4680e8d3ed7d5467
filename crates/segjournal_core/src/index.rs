//! Sparse in-memory index from logical index to byte position.
//!
//! Only a sampled subset of entries is recorded. A seek looks up the closest
//! recorded position at or before its target and scans forward from there,
//! trading seek precision for memory.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A recorded `(index, position)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    index: u64,
    position: u32,
}

impl Position {
    /// Creates a position.
    #[must_use]
    pub const fn new(index: u64, position: u32) -> Self {
        Self { index, position }
    }

    /// Returns the logical index of the entry.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns the byte offset of the entry's frame within its segment.
    #[must_use]
    pub const fn position(&self) -> u32 {
        self.position
    }
}

/// Index of entry positions within one segment.
///
/// Implementations decide which entries to record; callers offer every
/// appended entry. All methods take `&self` because a segment's writer and
/// its readers share the index.
pub trait JournalIndex: Send + Sync + fmt::Debug {
    /// Offers the entry at `index`, whose frame starts at `position`.
    fn index(&self, index: u64, position: u32);

    /// Returns the greatest recorded position whose index is `<= index`.
    fn lookup(&self, index: u64) -> Option<Position>;

    /// Removes every recorded position with an index greater than `index`.
    fn truncate(&self, index: u64);

    /// Removes every recorded position with an index less than `index`.
    fn compact(&self, index: u64);
}

/// Builds one index per segment.
pub type IndexFactory = Arc<dyn Fn() -> Box<dyn JournalIndex> + Send + Sync>;

/// Records one position every `1 / density` entries.
#[derive(Debug)]
pub struct SparseJournalIndex {
    interval: u64,
    positions: RwLock<BTreeMap<u64, u32>>,
}

impl SparseJournalIndex {
    /// Default fraction of entries that get indexed.
    pub const DEFAULT_DENSITY: f64 = 0.005;

    /// Creates an index recording roughly `density` of all entries.
    ///
    /// Densities at or above `1.0` index every entry; non-finite or
    /// non-positive densities fall back to [`Self::DEFAULT_DENSITY`].
    #[must_use]
    pub fn new(density: f64) -> Self {
        let density = if density.is_finite() && density > 0.0 {
            density
        } else {
            Self::DEFAULT_DENSITY
        };
        let interval = (1.0 / density).round().max(1.0) as u64;
        Self {
            interval,
            positions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns a factory producing indexes with the given density.
    #[must_use]
    pub fn factory(density: f64) -> IndexFactory {
        Arc::new(move || Box::new(Self::new(density)) as Box<dyn JournalIndex>)
    }

    /// Returns the sampling interval.
    #[must_use]
    pub const fn interval(&self) -> u64 {
        self.interval
    }

    /// Returns the number of recorded positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.read().len()
    }

    /// Returns `true` if no position is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.read().is_empty()
    }
}

impl Default for SparseJournalIndex {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DENSITY)
    }
}

impl JournalIndex for SparseJournalIndex {
    fn index(&self, index: u64, position: u32) {
        if index % self.interval == 0 {
            self.positions.write().insert(index, position);
        }
    }

    fn lookup(&self, index: u64) -> Option<Position> {
        self.positions
            .read()
            .range(..=index)
            .next_back()
            .map(|(&index, &position)| Position::new(index, position))
    }

    fn truncate(&self, index: u64) {
        let mut positions = self.positions.write();
        if let Some(first_removed) = index.checked_add(1) {
            let _ = positions.split_off(&first_removed);
        }
    }

    fn compact(&self, index: u64) {
        let mut positions = self.positions.write();
        let kept = positions.split_off(&index);
        *positions = kept;
    }
}
