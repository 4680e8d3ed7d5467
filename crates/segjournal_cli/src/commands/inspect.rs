//! Inspect command implementation.

use super::scan::FrameScanner;
use super::format_size;
use crate::Format;
use segjournal_core::list_segment_files;
use serde::Serialize;
use std::path::Path;

/// Journal inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Journal directory.
    pub path: String,
    /// Journal name.
    pub name: String,
    /// First index in the journal.
    pub first_index: u64,
    /// Last index in the journal.
    pub last_index: u64,
    /// Total number of entries.
    pub entry_count: u64,
    /// Bytes in use across all segments.
    pub used_bytes: u64,
    /// Bytes allocated on disk across all segments.
    pub file_bytes: u64,
    /// Per-segment details.
    pub segments: Vec<SegmentSummary>,
}

/// Statistics for a single segment.
#[derive(Debug, Serialize)]
pub struct SegmentSummary {
    /// Segment id.
    pub id: u64,
    /// Index of the first entry.
    pub first_index: u64,
    /// Index of the last entry (`first_index - 1` if empty).
    pub last_index: u64,
    /// Number of entries.
    pub entries: u64,
    /// Bytes in use, descriptor included.
    pub used_bytes: u64,
    /// Size of the file on disk.
    pub file_bytes: u64,
    /// Configured segment size limit.
    pub max_segment_size: u32,
    /// Configured entry count limit.
    pub max_entries: u32,
    /// Last update, in milliseconds since the Unix epoch.
    pub updated: u64,
}

/// Collects segment statistics for journal `name` in `path`.
pub fn inspect(path: &Path, name: &str) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let files = list_segment_files(path, name)?;
    if files.is_empty() {
        return Err(format!("no journal named {name:?} found in {}", path.display()).into());
    }

    let mut segments = Vec::with_capacity(files.len());
    for (_, file) in &files {
        let mut scanner = FrameScanner::open(file)?;
        let mut entries = 0;
        for frame in scanner.by_ref() {
            frame?;
            entries += 1;
        }
        let descriptor = *scanner.descriptor();
        segments.push(SegmentSummary {
            id: descriptor.id(),
            first_index: descriptor.index(),
            last_index: descriptor.index() + entries - 1,
            entries,
            used_bytes: scanner.position(),
            file_bytes: scanner.file_size()?,
            max_segment_size: descriptor.max_segment_size(),
            max_entries: descriptor.max_entries(),
            updated: descriptor.updated(),
        });
    }

    let first_index = segments.first().map_or(0, |s| s.first_index);
    let last_index = segments.last().map_or(0, |s| s.last_index);
    Ok(InspectResult {
        path: path.display().to_string(),
        name: name.to_string(),
        first_index,
        last_index,
        entry_count: segments.iter().map(|s| s.entries).sum(),
        used_bytes: segments.iter().map(|s| s.used_bytes).sum(),
        file_bytes: segments.iter().map(|s| s.file_bytes).sum(),
        segments,
    })
}

/// Runs the inspect command.
pub fn run(path: &Path, name: &str, format: Format) -> Result<(), Box<dyn std::error::Error>> {
    let result = inspect(path, name)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        Format::Text => print_text_output(&result),
    }
    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("Journal Inspection");
    println!("==================");
    println!();
    println!("Path: {}", result.path);
    println!("Name: {}", result.name);
    println!();
    println!("Entries:");
    println!("  First index: {}", result.first_index);
    println!("  Last index:  {}", result.last_index);
    println!("  Count:       {}", result.entry_count);
    println!();
    println!("Storage:");
    println!("  Used:      {}", format_size(result.used_bytes));
    println!("  On disk:   {}", format_size(result.file_bytes));
    println!();
    println!("Segments ({}):", result.segments.len());
    for segment in &result.segments {
        println!(
            "  [{}] indexes {}..={} ({} entries), {} used of {}",
            segment.id,
            segment.first_index,
            segment.last_index,
            segment.entries,
            format_size(segment.used_bytes),
            format_size(u64::from(segment.max_segment_size)),
        );
    }
}
