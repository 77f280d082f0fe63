//! Read-only projections derived from [`State`].
//!
//! # Overview
//!
//! Everything here is recomputed on demand from the current snapshot and
//! never stored: the bounded duplicate-group list, the minimum-size cutoff
//! it implies, per-group survivor counts, folder listings, and per-file
//! display status. The cutoff closes the loop with the hash scheduler:
//! files too small to ever appear in the visible group list are not worth
//! hashing at all.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::scheduler;
use crate::state::{Digest, FileRecord, Selection, State};

/// A set of files sharing one content digest, with survivor bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Content digest shared by every member.
    pub digest: Digest,
    /// File size shared by every member.
    pub size: u64,
    /// Member records, path order.
    pub files: Vec<FileRecord>,
    /// Members whose underlying file still exists.
    pub remaining: usize,
}

impl DuplicateGroup {
    /// Bytes freed by deleting all copies but one.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * (self.files.len() as u64).saturating_sub(1)
    }
}

/// Display status of one hashed file, mirroring the lock/spinner/cross
/// markers of the interactive view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    /// Hash computation still in flight.
    Pending,
    /// The underlying file has been removed.
    Deleted,
    /// Safe mode forbids deleting the last surviving copy.
    Locked,
    /// Hashing or removal failed; the message explains why.
    Failed(String),
    /// Eligible for deletion.
    Deletable,
}

/// Aggregate counters for the status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Paths reported by the walkers.
    pub discovered: usize,
    /// Paths with a completed hash.
    pub hashed: usize,
    /// Visible duplicate groups.
    pub groups: usize,
    /// Smallest file size still worth hashing.
    pub min_size_cutoff: u64,
    /// Paths waiting for a hash (scheduled or still in the frontier).
    pub pending_hashes: usize,
}

/// The visible duplicate groups: every digest with at least two records,
/// largest file size first, truncated to `max_groups`.
///
/// The group matching the current [`Selection::Group`], if any, is
/// excluded; it is already on screen.
#[must_use]
pub fn duplicate_groups(state: &State, max_groups: usize) -> Vec<DuplicateGroup> {
    let selected = match &state.selection {
        Selection::Group(digest) => Some(digest.as_str()),
        _ => None,
    };

    let mut groups = Vec::new();
    // size_to_digests iterated largest size first; digests in set order for
    // a deterministic listing.
    for (size, digests) in state.size_to_digests.iter().rev() {
        for digest in digests {
            if selected == Some(digest.as_str()) {
                continue;
            }
            let Some(paths) = state.digest_index.get(digest) else {
                continue;
            };
            if paths.len() < 2 {
                continue;
            }
            let files: Vec<FileRecord> = paths
                .iter()
                .filter_map(|p| state.files.get(p))
                .cloned()
                .collect();
            let remaining = state.remaining_in_group(digest);
            groups.push(DuplicateGroup {
                digest: digest.clone(),
                size: *size,
                files,
                remaining,
            });
            if groups.len() == max_groups {
                return groups;
            }
        }
    }
    groups
}

/// Smallest file size that can still appear in the visible group list.
///
/// Zero while fewer than `max_groups` groups exist; afterwards the size of
/// the smallest included group. Files below the cutoff are provably
/// invisible, so the scheduler skips hashing them.
#[must_use]
pub fn min_size_cutoff(state: &State, max_groups: usize) -> u64 {
    let groups = duplicate_groups(state, max_groups);
    if groups.len() < max_groups {
        0
    } else {
        groups.last().map_or(0, |g| g.size)
    }
}

/// Survivor count for one digest group.
#[must_use]
pub fn remaining_in_group(state: &State, digest: &str) -> usize {
    state.remaining_in_group(digest)
}

/// Hashed files directly inside `folder`, smallest first.
#[must_use]
pub fn files_in_folder(state: &State, folder: &Path) -> Vec<FileRecord> {
    let mut files: Vec<FileRecord> = state
        .files
        .values()
        .filter(|r| r.parent.as_deref() == Some(folder))
        .cloned()
        .collect();
    files.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.path.cmp(&b.path)));
    files
}

/// Paths still waiting for a hash that are worth hashing, per the
/// scheduler's frontier.
#[must_use]
pub fn files_needing_hash(state: &State, max_groups: usize) -> Vec<PathBuf> {
    scheduler::frontier(state, min_size_cutoff(state, max_groups))
}

/// Frontier size plus in-flight hashes, for progress display.
#[must_use]
pub fn pending_hash_count(state: &State, max_groups: usize) -> usize {
    files_needing_hash(state, max_groups).len() + state.hashing.len()
}

/// Display status of `path`.
#[must_use]
pub fn file_status(state: &State, path: &Path) -> FileStatus {
    if state.hashing.contains(path) {
        return FileStatus::Pending;
    }
    if state.deleted.contains(path) {
        return FileStatus::Deleted;
    }
    if let Some(message) = state.errors.get(path) {
        return FileStatus::Failed(message.clone());
    }
    if let Some(record) = state.files.get(path) {
        if state.safe_mode && state.remaining_in_group(&record.digest) < 2 {
            return FileStatus::Locked;
        }
        return FileStatus::Deletable;
    }
    FileStatus::Pending
}

/// Counters for the status line.
#[must_use]
pub fn summary(state: &State, max_groups: usize) -> Summary {
    Summary {
        discovered: state.discovered.len(),
        hashed: state.files.len(),
        groups: duplicate_groups(state, max_groups).len(),
        min_size_cutoff: min_size_cutoff(state, max_groups),
        pending_hashes: pending_hash_count(state, max_groups),
    }
}
