//! Test fixtures and journal helpers.
//!
//! Provides convenience functions for setting up temporary journals
//! and common test scenarios.

use segjournal_codec::{EntryCodec, RawCodec};
use segjournal_core::{JournalConfig, SegmentedJournal, StorageLevel};
use std::path::Path;
use tempfile::TempDir;

/// A journal in a temporary directory, deleted when the fixture drops.
pub struct TestJournal<C: EntryCodec + Clone = RawCodec> {
    /// The journal instance.
    pub journal: SegmentedJournal<C>,
    config: JournalConfig,
    codec: C,
    // Declared last so the journal closes before its directory is removed.
    temp_dir: TempDir,
}

impl TestJournal<RawCodec> {
    /// Creates a byte journal with small segments.
    pub fn new() -> Self {
        Self::with_config(small_config, RawCodec)
    }

    /// Creates a byte journal using the given storage level.
    pub fn with_level(level: StorageLevel) -> Self {
        Self::with_config(|dir| small_config(dir).storage_level(level), RawCodec)
    }
}

impl Default for TestJournal<RawCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: EntryCodec + Clone> TestJournal<C> {
    /// Creates a journal whose configuration is built from the temporary
    /// directory path.
    pub fn with_config<F>(build: F, codec: C) -> Self
    where
        F: FnOnce(&Path) -> JournalConfig,
    {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = build(temp_dir.path());
        let journal =
            SegmentedJournal::open(config.clone(), codec.clone()).expect("Failed to open journal");
        Self {
            journal,
            config,
            codec,
            temp_dir,
        }
    }

    /// Returns the directory holding the segment files.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the configuration the journal was opened with.
    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    /// Closes the journal and opens it again over the same directory.
    pub fn reopen(self) -> Self {
        self.reopen_with(|config| config)
    }

    /// Closes the journal and reopens it with an adjusted configuration.
    pub fn reopen_with<F>(self, adjust: F) -> Self
    where
        F: FnOnce(JournalConfig) -> JournalConfig,
    {
        let Self {
            journal,
            config,
            codec,
            temp_dir,
        } = self;
        journal.close().expect("Failed to close journal");
        drop(journal);

        let config = adjust(config);
        let journal =
            SegmentedJournal::open(config.clone(), codec.clone()).expect("Failed to reopen journal");
        Self {
            journal,
            config,
            codec,
            temp_dir,
        }
    }

    /// Closes the journal and hands back the directory so the caller can
    /// tamper with segment files before reopening.
    pub fn into_parts(self) -> (JournalConfig, C, TempDir) {
        let Self {
            journal,
            config,
            codec,
            temp_dir,
        } = self;
        journal.close().expect("Failed to close journal");
        drop(journal);
        (config, codec, temp_dir)
    }

    /// Reassembles a fixture from parts produced by [`into_parts`](Self::into_parts).
    pub fn from_parts(config: JournalConfig, codec: C, temp_dir: TempDir) -> Self {
        let journal =
            SegmentedJournal::open(config.clone(), codec.clone()).expect("Failed to reopen journal");
        Self {
            journal,
            config,
            codec,
            temp_dir,
        }
    }
}

impl<C: EntryCodec + Clone> std::ops::Deref for TestJournal<C> {
    type Target = SegmentedJournal<C>;

    fn deref(&self) -> &Self::Target {
        &self.journal
    }
}

/// Configuration with segments of at most four entries and every entry
/// indexed, so short tests cross segment boundaries and hit the index.
pub fn small_config(dir: &Path) -> JournalConfig {
    JournalConfig::new()
        .directory(dir)
        .name("test")
        .max_segment_size(64 * 1024)
        .max_entries_per_segment(4)
        .max_entry_size(8 * 1024)
        .index_density(1.0)
}

/// Builds a deterministic, recognizable payload for entry `n`.
pub fn payload(n: u64) -> Vec<u8> {
    format!("entry-{n:06}").into_bytes()
}

/// Runs a test with a temporary byte journal.
///
/// # Example
///
/// ```rust,ignore
/// use segjournal_testkit::with_temp_journal;
///
/// #[test]
/// fn my_test() {
///     with_temp_journal(|journal| {
///         journal.append(b"a".to_vec()).unwrap();
///     });
/// }
/// ```
pub fn with_temp_journal<F, R>(f: F) -> R
where
    F: FnOnce(&SegmentedJournal<RawCodec>) -> R,
{
    let test_journal = TestJournal::new();
    f(&test_journal.journal)
}

/// Runs a test with a temporary memory-mapped byte journal.
pub fn with_mapped_journal<F, R>(f: F) -> R
where
    F: FnOnce(&SegmentedJournal<RawCodec>) -> R,
{
    let test_journal = TestJournal::with_level(StorageLevel::Mapped);
    f(&test_journal.journal)
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// Creates a byte journal holding entries `1..=count`, each carrying
    /// [`payload`] of its index.
    pub fn populated_journal(count: u64) -> TestJournal {
        let test_journal = TestJournal::new();
        for n in 1..=count {
            let appended = test_journal
                .append(payload(n))
                .expect("Failed to append entry");
            assert_eq!(appended.index(), n);
        }
        test_journal
    }

    /// Creates a populated journal with everything up to `commit` committed.
    pub fn committed_journal(count: u64, commit: u64) -> TestJournal {
        let test_journal = populated_journal(count);
        test_journal.commit(commit).expect("Failed to commit");
        test_journal
    }
}
