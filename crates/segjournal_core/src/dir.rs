//! Journal directory management.
//!
//! A journal named `name` owns these files in its directory:
//!
//! ```text
//! <directory>/
//! ├─ name.lock        # Advisory lock for single-process access
//! ├─ name-1.log       # Segment files, one per segment id
//! ├─ name-2.log
//! └─ ...
//! ```
//!
//! Other files in the directory are ignored, so several journals with
//! different names can share one directory.

use crate::error::{JournalError, JournalResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const SEGMENT_EXTENSION: &str = "log";
const LOCK_EXTENSION: &str = "lock";

/// Returns the file name of segment `id` of journal `name`.
#[must_use]
pub fn segment_file_name(name: &str, id: u64) -> String {
    format!("{name}-{id}.{SEGMENT_EXTENSION}")
}

/// Extracts the segment id from `file_name` if it is a segment file of
/// journal `name`.
#[must_use]
pub fn parse_segment_file_name(name: &str, file_name: &str) -> Option<u64> {
    let id = file_name
        .strip_prefix(name)?
        .strip_prefix('-')?
        .strip_suffix(SEGMENT_EXTENSION)?
        .strip_suffix('.')?;
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    id.parse().ok().filter(|id| *id > 0)
}

/// A journal's directory, exclusively locked for the lifetime of this value.
#[derive(Debug)]
pub struct JournalDirectory {
    path: PathBuf,
    name: String,
    _lock_file: File,
}

impl JournalDirectory {
    /// Opens the directory for journal `name`, creating it if missing, and
    /// takes the journal's lock.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if another handle holds the lock, or an I/O
    /// error if the directory cannot be created.
    pub fn open(path: &Path, name: &str) -> JournalResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        if !path.is_dir() {
            return Err(JournalError::invalid_config(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(format!("{name}.{LOCK_EXTENSION}"));
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(JournalError::illegal_state(format!(
                "journal {name} in {} is locked by another handle",
                path.display()
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            name: name.to_string(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the journal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the path of segment `id`.
    #[must_use]
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.path.join(segment_file_name(&self.name, id))
    }

    /// Lists this journal's segment files, sorted by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list_segments(&self) -> JournalResult<Vec<(u64, PathBuf)>> {
        list_segment_files(&self.path, &self.name)
    }

    /// Returns the bytes available to this process on the directory's volume.
    ///
    /// # Errors
    ///
    /// Returns an error if the filesystem cannot be queried.
    pub fn available_space(&self) -> JournalResult<u64> {
        Ok(fs2::available_space(&self.path)?)
    }

    /// Syncs the directory so created and deleted segment files are durable.
    ///
    /// Directory fsync is not supported on Windows, where NTFS journaling
    /// covers metadata, so this is a no-op there.
    #[cfg(unix)]
    pub fn sync(&self) -> JournalResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    /// Syncs the directory so created and deleted segment files are durable.
    #[cfg(not(unix))]
    pub fn sync(&self) -> JournalResult<()> {
        Ok(())
    }
}

/// Lists the segment files of journal `name` in `directory`, sorted by id.
///
/// Does not take the journal's lock, so it can be used to inspect a journal
/// owned by another process.
///
/// # Errors
///
/// Returns an error if the directory cannot be read.
pub fn list_segment_files(directory: &Path, name: &str) -> JournalResult<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        if let Some(id) = parse_segment_file_name(name, file_name) {
            segments.push((id, entry.path()));
        }
    }
    segments.sort_by_key(|(id, _)| *id);
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn segment_names() {
        assert_eq!(segment_file_name("raft", 7), "raft-7.log");
        assert_eq!(parse_segment_file_name("raft", "raft-7.log"), Some(7));
        assert_eq!(parse_segment_file_name("raft", "raft-12345.log"), Some(12345));
    }

    #[test]
    fn foreign_names_rejected() {
        assert_eq!(parse_segment_file_name("raft", "other-1.log"), None);
        assert_eq!(parse_segment_file_name("raft", "raft-1.txt"), None);
        assert_eq!(parse_segment_file_name("raft", "raft-.log"), None);
        assert_eq!(parse_segment_file_name("raft", "raft-x1.log"), None);
        assert_eq!(parse_segment_file_name("raft", "raft-0.log"), None);
        assert_eq!(parse_segment_file_name("raft", "raft.lock"), None);
        assert_eq!(parse_segment_file_name("raft", "raft-log-1.log"), None);
    }

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("journal");

        let dir = JournalDirectory::open(&path, "test").unwrap();
        assert!(path.is_dir());
        assert!(path.join("test.lock").exists());
        assert_eq!(dir.segment_path(3), path.join("test-3.log"));
    }

    #[test]
    fn second_open_is_locked() {
        let temp = tempdir().unwrap();
        let _dir = JournalDirectory::open(temp.path(), "test").unwrap();

        let result = JournalDirectory::open(temp.path(), "test");
        assert!(matches!(result, Err(JournalError::IllegalState { .. })));

        // A different journal name has its own lock.
        assert!(JournalDirectory::open(temp.path(), "other").is_ok());
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        drop(JournalDirectory::open(temp.path(), "test").unwrap());
        assert!(JournalDirectory::open(temp.path(), "test").is_ok());
    }

    #[test]
    fn list_sorts_by_id() {
        let temp = tempdir().unwrap();
        for name in ["test-10.log", "test-2.log", "test-1.log", "other-3.log", "notes.txt"] {
            std::fs::write(temp.path().join(name), b"").unwrap();
        }

        let dir = JournalDirectory::open(temp.path(), "test").unwrap();
        let ids: Vec<u64> = dir.list_segments().unwrap().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![1, 2, 10]);
    }
}
