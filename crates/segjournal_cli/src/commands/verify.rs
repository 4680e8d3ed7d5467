//! Verify command implementation.

use super::scan::FrameScanner;
use segjournal_core::{list_segment_files, parse_segment_file_name};
use std::path::Path;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segment files checked.
    pub segments_checked: usize,
    /// Number of valid frames found.
    pub frames_checked: u64,
    /// Problems that make the journal inconsistent.
    pub errors: Vec<String>,
    /// Problems recovery repairs on its own, such as a torn final write.
    pub warnings: Vec<String>,
}

impl VerifyResult {
    /// Returns `true` if no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Walks every frame of journal `name` in `path`.
pub fn verify(path: &Path, name: &str) -> Result<VerifyResult, Box<dyn std::error::Error>> {
    let files = list_segment_files(path, name)?;
    let mut result = VerifyResult::default();
    let mut expected_index: Option<u64> = None;
    let mut previous_id = 0;

    for (position, (id, file)) in files.iter().enumerate() {
        let is_last = position + 1 == files.len();
        result.segments_checked += 1;
        let file_name = file.file_name().and_then(|n| n.to_str()).unwrap_or_default();

        let mut scanner = match FrameScanner::open(file) {
            Ok(scanner) => scanner,
            Err(e) => {
                result.errors.push(format!("{file_name}: unreadable descriptor: {e}"));
                expected_index = None;
                continue;
            }
        };

        let descriptor = *scanner.descriptor();
        if parse_segment_file_name(name, file_name) != Some(descriptor.id()) {
            result.errors.push(format!(
                "{file_name}: descriptor id {} does not match file name",
                descriptor.id()
            ));
        }
        if *id <= previous_id {
            result.errors.push(format!("{file_name}: segment ids are not increasing"));
        }
        previous_id = *id;

        if let Some(expected) = expected_index {
            if descriptor.index() != expected {
                result.errors.push(format!(
                    "{file_name}: starts at index {} but the previous segment ends at {}",
                    descriptor.index(),
                    expected - 1
                ));
            }
        }

        let mut entries = 0;
        for frame in scanner.by_ref() {
            frame?;
            entries += 1;
        }
        result.frames_checked += entries;

        if scanner.has_trailing_data()? {
            let message = format!(
                "{file_name}: invalid frame at offset {} after index {}",
                scanner.position(),
                descriptor.index() + entries - 1
            );
            if is_last {
                result.warnings.push(format!("{message} (torn write)"));
            } else {
                result.errors.push(message);
            }
        }
        expected_index = Some(descriptor.index() + entries);
    }

    Ok(result)
}

/// Runs the verify command.
pub fn run(path: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying journal {name:?} at {}", path.display());
    println!();

    let result = verify(path, name)?;
    println!(
        "  segments checked: {}, frames checked: {}",
        result.segments_checked, result.frames_checked
    );
    for warning in &result.warnings {
        println!("    WARNING: {warning}");
    }
    for error in &result.errors {
        println!("    ERROR: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Journal verification passed");
        Ok(())
    } else {
        println!("✗ Journal verification failed");
        Err("Verification failed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use segjournal_codec::RawCodec;
    use segjournal_core::{JournalConfig, SegmentedJournal};
    use tempfile::tempdir;

    fn write_journal(dir: &Path) {
        let journal = SegmentedJournal::open(
            JournalConfig::new()
                .directory(dir)
                .name("v")
                .max_entries_per_segment(2),
            RawCodec,
        )
        .unwrap();
        for i in 0..5u8 {
            journal.append(vec![i; 8]).unwrap();
        }
    }

    #[test]
    fn clean_journal_verifies() {
        let dir = tempdir().unwrap();
        write_journal(dir.path());

        let result = verify(dir.path(), "v").unwrap();
        assert!(result.is_ok());
        assert_eq!(result.segments_checked, 3);
        assert_eq!(result.frames_checked, 5);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn gap_between_segments_is_an_error() {
        let dir = tempdir().unwrap();
        write_journal(dir.path());
        std::fs::remove_file(dir.path().join("v-2.log")).unwrap();

        let result = verify(dir.path(), "v").unwrap();
        assert!(!result.is_ok());
        assert!(result.errors[0].contains("v-3.log"));
    }

    #[test]
    fn torn_tail_is_a_warning() {
        let dir = tempdir().unwrap();
        write_journal(dir.path());
        let path = dir.path().join("v-3.log");
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let result = verify(dir.path(), "v").unwrap();
        assert!(result.is_ok());
        assert_eq!(result.frames_checked, 4);
        assert_eq!(result.warnings.len(), 1);
    }
}
