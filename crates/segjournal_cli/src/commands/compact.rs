//! Compact command implementation.

use super::inspect::{inspect, InspectResult};
use segjournal_codec::RawCodec;
use segjournal_core::{JournalConfig, SegmentedJournal};
use serde::Serialize;
use std::path::Path;

/// A segment compaction would delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoomedSegment {
    /// Segment id.
    pub id: u64,
    /// Index of the first entry.
    pub first_index: u64,
    /// Index of the last entry.
    pub last_index: u64,
    /// Bytes in use.
    pub bytes: u64,
}

/// What compacting up to an index deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompactionPlan {
    /// Requested index.
    pub index: u64,
    /// First index of the segment that is kept.
    pub keep_from: u64,
    /// Segments that would be deleted, oldest first.
    pub doomed: Vec<DoomedSegment>,
}

impl CompactionPlan {
    /// Bytes the deleted segments occupy.
    #[must_use]
    pub fn reclaimed_bytes(&self) -> u64 {
        self.doomed.iter().map(|s| s.bytes).sum()
    }
}

/// Builds a plan from scanned segment files without touching them.
///
/// The kept segment is the last one starting at or before `index`, or the
/// first segment when `index` precedes all of them.
pub fn plan(inspected: &InspectResult, index: u64) -> CompactionPlan {
    let keep_from = inspected
        .segments
        .iter()
        .rev()
        .find(|s| s.first_index <= index)
        .or_else(|| inspected.segments.first())
        .map_or(0, |s| s.first_index);

    let doomed = inspected
        .segments
        .iter()
        .filter(|s| s.first_index < keep_from)
        .map(|s| DoomedSegment {
            id: s.id,
            first_index: s.first_index,
            last_index: s.last_index,
            bytes: s.used_bytes,
        })
        .collect();

    CompactionPlan {
        index,
        keep_from,
        doomed,
    }
}

/// Compacts journal `name` in `path` up to `index` and returns what was
/// deleted, or only plans it when `dry_run` is set.
///
/// A dry run reads the segment files directly. Anything else opens the
/// journal, which takes its lock and applies the usual load-time recovery.
pub fn compact(
    path: &Path,
    name: &str,
    index: u64,
    dry_run: bool,
) -> Result<CompactionPlan, Box<dyn std::error::Error>> {
    let inspected = inspect(path, name)?;
    if dry_run {
        return Ok(plan(&inspected, index));
    }

    // Size limits come from the existing segments so replay accepts every
    // frame they hold.
    let max_segment_size = inspected
        .segments
        .iter()
        .map(|s| s.max_segment_size)
        .max()
        .unwrap_or(JournalConfig::default().max_segment_size);
    let config = JournalConfig::new()
        .directory(path)
        .name(name)
        .max_segment_size(max_segment_size)
        .max_entry_size(max_segment_size.min(i32::MAX as u32) as usize);
    let journal = SegmentedJournal::open(config, RawCodec)?;

    let keep_from = journal.segment(index)?.first_index();
    let doomed = journal
        .segments()
        .into_iter()
        .filter(|s| s.first_index() < keep_from)
        .map(|s| DoomedSegment {
            id: s.id(),
            first_index: s.first_index(),
            last_index: s.last_index,
            bytes: s.size,
        })
        .collect();

    journal.compact(index)?;
    journal.close()?;
    Ok(CompactionPlan {
        index,
        keep_from,
        doomed,
    })
}

/// Runs the compact command.
pub fn run(
    path: &Path,
    name: &str,
    index: u64,
    dry_run: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Compacting journal {name:?} at {} up to index {index}", path.display());
    if dry_run {
        println!("(dry run - no changes will be made)");
    }
    println!();

    let plan = compact(path, name, index, dry_run)?;
    if plan.doomed.is_empty() {
        println!("Nothing to compact: index {index} lies in the first segment");
        return Ok(());
    }

    println!("Segments to delete:");
    for segment in &plan.doomed {
        println!(
            "  [{}] indexes {}..={}",
            segment.id, segment.first_index, segment.last_index
        );
    }
    println!();
    println!("  Space reclaimed: {}", super::format_size(plan.reclaimed_bytes()));

    if !dry_run {
        tracing::info!(journal = name, index, segments = plan.doomed.len(), "compacted journal");
        println!();
        println!("✓ Compaction complete, first index is now {}", plan.keep_from);
    }
    Ok(())
}
