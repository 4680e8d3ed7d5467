//! Differential testing against a reference model.
//!
//! [`JournalModel`] is a plain in-memory list with the journal's append,
//! commit and truncate rules. [`JournalHarness`] applies the same
//! operations to a model and a real journal and checks that every reader
//! sees exactly what the model holds.

use crate::fixtures::TestJournal;
use crate::generators::{JournalOp, SegmentLimits};
use segjournal_codec::RawCodec;
use segjournal_core::{JournalError, ReaderMode};
use std::collections::VecDeque;

/// Reference model of a journal's observable contents.
#[derive(Debug, Clone)]
pub struct JournalModel {
    first: u64,
    entries: VecDeque<Vec<u8>>,
    commit: u64,
}

impl JournalModel {
    /// Creates an empty model whose first entry will be index 1.
    pub fn new() -> Self {
        Self {
            first: 1,
            entries: VecDeque::new(),
            commit: 0,
        }
    }

    /// Returns the first index the model can hold.
    pub fn first_index(&self) -> u64 {
        self.first
    }

    /// Returns the last index, or `first_index - 1` when empty.
    pub fn last_index(&self) -> u64 {
        self.first + self.entries.len() as u64 - 1
    }

    /// Returns the commit index.
    pub fn commit_index(&self) -> u64 {
        self.commit
    }

    /// Returns the entry at `index`, if held.
    pub fn get(&self, index: u64) -> Option<&Vec<u8>> {
        index
            .checked_sub(self.first)
            .and_then(|offset| self.entries.get(offset as usize))
    }

    /// Appends an entry and returns its index.
    pub fn append(&mut self, entry: Vec<u8>) -> u64 {
        self.entries.push_back(entry);
        self.last_index()
    }

    /// Advances the commit index.
    pub fn commit(&mut self, index: u64) {
        self.commit = self.commit.max(index);
    }

    /// Drops every entry after `index`.
    pub fn truncate(&mut self, index: u64) {
        let keep = index.saturating_sub(self.first - 1) as usize;
        self.entries.truncate(keep);
    }

    /// Drops every entry before `first`.
    pub fn compact_to(&mut self, first: u64) {
        let dropped = first.saturating_sub(self.first).min(self.entries.len() as u64);
        self.entries.drain(..dropped as usize);
        self.first = self.first.max(first);
    }

    /// Forgets the commit index, as a restart does.
    pub fn restart(&mut self) {
        self.commit = 0;
    }
}

impl Default for JournalModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs a journal and a [`JournalModel`] side by side.
pub struct JournalHarness {
    journal: Option<TestJournal<RawCodec>>,
    model: JournalModel,
}

impl JournalHarness {
    /// Creates a harness over a small-segment byte journal.
    pub fn new() -> Self {
        Self::from_journal(TestJournal::new())
    }

    /// Creates a harness over a journal with the given segment limits.
    pub fn with_limits(limits: SegmentLimits) -> Self {
        Self::from_journal(TestJournal::with_config(
            |dir| limits.config(dir),
            RawCodec,
        ))
    }

    fn from_journal(journal: TestJournal<RawCodec>) -> Self {
        Self {
            journal: Some(journal),
            model: JournalModel::new(),
        }
    }

    /// Returns the journal under test.
    pub fn journal(&self) -> &TestJournal<RawCodec> {
        self.journal.as_ref().expect("Harness journal missing")
    }

    /// Returns the model.
    pub fn model(&self) -> &JournalModel {
        &self.model
    }

    /// Applies `op` to both the journal and the model.
    pub fn apply(&mut self, op: &JournalOp) {
        let last = self.model.last_index();
        match op {
            JournalOp::Append(payload) => {
                let expected = self.model.append(payload.clone());
                let appended = self
                    .journal()
                    .append(payload.clone())
                    .expect("Append failed");
                assert_eq!(appended.index(), expected, "append index mismatch");
            }
            JournalOp::Commit(back) => {
                let index = last.saturating_sub(u64::from(*back));
                self.journal().commit(index).expect("Commit failed");
                self.model.commit(index);
            }
            JournalOp::Truncate(back) => {
                let index = last
                    .saturating_sub(u64::from(*back))
                    .max(self.model.commit_index())
                    .max(self.model.first_index() - 1);
                self.journal().truncate(index).expect("Truncate failed");
                self.model.truncate(index);

                if self.model.commit_index() > 0 {
                    let below = self.model.commit_index() - 1;
                    if below < self.model.last_index() {
                        let result = self.journal().truncate(below);
                        assert!(
                            matches!(result, Err(JournalError::IllegalState { .. })),
                            "truncate below commit must fail, got {result:?}"
                        );
                    }
                }
            }
            JournalOp::Compact(back) => {
                let index = last.saturating_sub(u64::from(*back)).max(1);
                let before = self.journal().first_index();
                self.journal().compact(index).expect("Compact failed");
                let after = self.journal().first_index();
                assert!(after >= before, "compaction moved the head backwards");
                assert!(
                    after <= index.max(before),
                    "compaction at {index} dropped past it to {after}"
                );
                self.model.compact_to(after);
            }
            JournalOp::Reopen => {
                let journal = self.journal.take().expect("Harness journal missing");
                self.journal = Some(journal.reopen());
                self.model.restart();
            }
        }
    }

    /// Checks the journal against the model.
    pub fn verify(&self) {
        let journal = self.journal();
        let model = &self.model;

        assert_eq!(journal.first_index(), model.first_index(), "first index");
        assert_eq!(journal.last_index(), model.last_index(), "last index");
        assert_eq!(journal.commit_index(), model.commit_index(), "commit index");

        let mut reader = journal
            .open_reader(model.first_index(), ReaderMode::All)
            .expect("Failed to open reader");
        let mut expected = model.first_index();
        while reader.has_next().expect("has_next failed") {
            let entry = reader.next_entry().expect("next_entry failed");
            assert_eq!(entry.index(), expected, "reader skipped an index");
            assert_eq!(
                Some(entry.entry()),
                model.get(expected),
                "entry {expected} differs"
            );
            expected += 1;
        }
        assert_eq!(expected, model.last_index() + 1, "reader stopped early");

        let visible = journal
            .open_reader(model.first_index(), ReaderMode::Commits)
            .expect("Failed to open reader")
            .count() as u64;
        let committed = model
            .commit_index()
            .min(model.last_index())
            .saturating_sub(model.first_index() - 1);
        assert_eq!(visible, committed, "commits reader saw uncommitted entries");
    }

    /// Applies each operation in turn, verifying after every step.
    pub fn run(&mut self, ops: &[JournalOp]) {
        for op in ops {
            self.apply(op);
            self.verify();
        }
    }
}

impl Default for JournalHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads every entry from `index` onwards through a fresh reader.
pub fn read_all(journal: &TestJournal<RawCodec>, index: u64) -> Vec<(u64, Vec<u8>)> {
    journal
        .open_reader(index, ReaderMode::All)
        .expect("Failed to open reader")
        .map(|entry| {
            let entry = entry.expect("Failed to read entry");
            (entry.index(), entry.into_entry())
        })
        .collect()
}
