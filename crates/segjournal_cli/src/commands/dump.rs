//! Dump command implementation.

use super::scan::FrameScanner;
use crate::Format;
use segjournal_core::list_segment_files;
use serde::Serialize;
use std::path::Path;

/// Information about a single frame.
#[derive(Debug, Serialize)]
pub struct FrameInfo {
    /// Logical index.
    pub index: u64,
    /// Segment id.
    pub segment: u64,
    /// Byte offset of the frame within the segment file.
    pub position: u64,
    /// Payload size in bytes.
    pub size: usize,
    /// CRC-32 of the payload.
    pub checksum: u32,
    /// Leading payload bytes as hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Collects frames of journal `name` starting at index `from`.
pub fn collect(
    path: &Path,
    name: &str,
    from: u64,
    limit: Option<usize>,
    hex: usize,
) -> Result<Vec<FrameInfo>, Box<dyn std::error::Error>> {
    let limit = limit.unwrap_or(usize::MAX);
    let mut frames = Vec::new();

    for (id, file) in list_segment_files(path, name)? {
        if frames.len() >= limit {
            break;
        }
        for scanned in FrameScanner::open(&file)? {
            let scanned = scanned?;
            if scanned.index < from {
                continue;
            }
            if frames.len() >= limit {
                break;
            }
            let payload = &scanned.frame.payload;
            frames.push(FrameInfo {
                index: scanned.index,
                segment: id,
                position: scanned.position,
                size: payload.len(),
                checksum: scanned.frame.checksum,
                preview: (hex > 0).then(|| to_hex(&payload[..payload.len().min(hex)])),
            });
        }
    }

    Ok(frames)
}

/// Runs the dump command.
pub fn run(
    path: &Path,
    name: &str,
    from: u64,
    limit: Option<usize>,
    hex: usize,
    format: Format,
) -> Result<(), Box<dyn std::error::Error>> {
    let frames = collect(path, name, from, limit, hex)?;
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&frames)?),
        Format::Text => print_text_output(&frames),
    }
    Ok(())
}

fn print_text_output(frames: &[FrameInfo]) {
    println!("Journal Frames ({} total)", frames.len());
    println!("=====================");
    println!();

    for frame in frames {
        print!(
            "[{:>10}] segment={} pos={} size={} crc={:08x}",
            frame.index, frame.segment, frame.position, frame.size, frame.checksum
        );
        if let Some(preview) = &frame.preview {
            print!(" {preview}");
        }
        println!();
    }
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
