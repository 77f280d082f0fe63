//! Immutable engine state.
//!
//! # Overview
//!
//! [`State`] is a single immutable aggregate holding everything the engine
//! has discovered so far: scan roots, discovered files, the size index used
//! to pick hashing candidates, completed [`FileRecord`]s and the digest
//! groups they form. The reducer never mutates a `State` in place; it clones
//! the current value and returns the successor, so any snapshot handed out
//! (as `Arc<State>`) stays valid and consistent forever.
//!
//! A path moves through exactly one lifecycle:
//! not yet seen → discovered (unhashed) → hashing → hashed, with deletion
//! tracked separately in a grow-only set.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Content digest rendered as a lowercase hex string.
pub type Digest = String;

/// Identity of one filesystem entry once its content has been hashed.
///
/// Created exactly once per path by the reducer on a hash-computed event
/// and never mutated. Records are retained even after the underlying file
/// is deleted so that groups can still report "n of m remaining".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Absolute path to the file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Content digest (hex).
    pub digest: Digest,
    /// Containing folder, if the path has one.
    pub parent: Option<PathBuf>,
}

/// Which derived view the user is looking at.
///
/// The three forms are mutually exclusive by construction; selecting a
/// group and a folder at the same time is unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Selection {
    /// No selection; the top-level group list is shown.
    #[default]
    None,
    /// A duplicate group, keyed by its digest.
    Group(Digest),
    /// A folder listing.
    Folder(PathBuf),
}

/// Lifecycle phase of a path within the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Never reported by any walker.
    Unseen,
    /// Discovered by a walker but not yet scheduled for hashing.
    Discovered,
    /// Hash computation scheduled but not completed.
    Hashing,
    /// Hash computed; a [`FileRecord`] exists.
    Hashed,
}

/// Immutable snapshot of everything discovered so far.
///
/// Cheap structural equality makes reducer tests a matter of comparing
/// whole snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct State {
    /// Scan roots currently tracked. No root is a path-prefix of another.
    pub roots: BTreeSet<PathBuf>,
    /// Most recently added root; survives [`Clear`](crate::reducer::Event::Clear)
    /// as a convenience default for the next folder picker.
    pub last_root: Option<PathBuf>,
    /// Every path seen by a walker, mapped to its size.
    pub discovered: HashMap<PathBuf, u64>,
    /// Size → paths of that size. Size classes with fewer than two members
    /// are never worth hashing.
    pub size_index: BTreeMap<u64, BTreeSet<PathBuf>>,
    /// Paths with a scheduled but uncompleted hash computation.
    pub hashing: BTreeSet<PathBuf>,
    /// Path → record, populated once hashing completes.
    pub files: HashMap<PathBuf, FileRecord>,
    /// Digest → paths sharing it (the duplicate groups).
    pub digest_index: HashMap<Digest, BTreeSet<PathBuf>>,
    /// Size → digests observed at that size; bounds the hashing frontier.
    pub size_to_digests: BTreeMap<u64, BTreeSet<Digest>>,
    /// Paths whose underlying file has been removed. Grow-only.
    pub deleted: BTreeSet<PathBuf>,
    /// Per-path I/O failure messages (hash or removal). A bad file never
    /// aborts processing of the rest of the tree.
    pub errors: HashMap<PathBuf, String>,
    /// When true, deletion that would leave a group with zero surviving
    /// copies is refused.
    pub safe_mode: bool,
    /// Current view selection.
    pub selection: Selection,
}

impl Default for State {
    fn default() -> Self {
        Self {
            roots: BTreeSet::new(),
            last_root: None,
            discovered: HashMap::new(),
            size_index: BTreeMap::new(),
            hashing: BTreeSet::new(),
            files: HashMap::new(),
            digest_index: HashMap::new(),
            size_to_digests: BTreeMap::new(),
            deleted: BTreeSet::new(),
            errors: HashMap::new(),
            safe_mode: true,
            selection: Selection::None,
        }
    }
}

impl State {
    /// Lifecycle phase of `path`.
    #[must_use]
    pub fn phase(&self, path: &Path) -> Phase {
        if self.files.contains_key(path) {
            Phase::Hashed
        } else if self.hashing.contains(path) {
            Phase::Hashing
        } else if self.discovered.contains_key(path) {
            Phase::Discovered
        } else {
            Phase::Unseen
        }
    }

    /// Number of files in the group for `digest` whose underlying file has
    /// not been removed.
    #[must_use]
    pub fn remaining_in_group(&self, digest: &str) -> usize {
        self.digest_index.get(digest).map_or(0, |paths| {
            paths.iter().filter(|p| !self.deleted.contains(*p)).count()
        })
    }

    /// Verify the structural invariants that must hold after every reducer
    /// application. Used by tests; cheap enough to debug-assert.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first violated invariant.
    pub fn assert_invariants(&self) {
        // Hashing and hashed are disjoint; both are subsets of discovered.
        for path in &self.hashing {
            assert!(
                !self.files.contains_key(path),
                "path both hashing and hashed: {}",
                path.display()
            );
            assert!(
                self.discovered.contains_key(path),
                "hashing path never discovered: {}",
                path.display()
            );
        }
        // Every group is non-empty and every member has a matching record.
        for (digest, paths) in &self.digest_index {
            assert!(!paths.is_empty(), "empty group retained for {digest}");
            for path in paths {
                let record = self
                    .files
                    .get(path)
                    .unwrap_or_else(|| panic!("group member has no record: {}", path.display()));
                assert_eq!(record.digest, *digest);
            }
        }
        // No root is a prefix of another.
        for a in &self.roots {
            for b in &self.roots {
                assert!(
                    a == b || !a.starts_with(b),
                    "subsumed root retained: {} under {}",
                    a.display(),
                    b.display()
                );
            }
        }
        // The size index only holds discovered paths at the right size.
        for (size, paths) in &self.size_index {
            for path in paths {
                assert_eq!(self.discovered.get(path), Some(size));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, size: u64, digest: &str) -> FileRecord {
        FileRecord {
            path: PathBuf::from(path),
            size,
            digest: digest.to_string(),
            parent: Path::new(path).parent().map(Path::to_path_buf),
        }
    }

    #[test]
    fn default_state_is_empty_and_safe() {
        let state = State::default();
        assert!(state.roots.is_empty());
        assert!(state.discovered.is_empty());
        assert!(state.safe_mode);
        assert_eq!(state.selection, Selection::None);
        state.assert_invariants();
    }

    #[test]
    fn phase_transitions() {
        let mut state = State::default();
        let path = PathBuf::from("/a");
        assert_eq!(state.phase(&path), Phase::Unseen);

        state.discovered.insert(path.clone(), 10);
        assert_eq!(state.phase(&path), Phase::Discovered);

        state.hashing.insert(path.clone());
        assert_eq!(state.phase(&path), Phase::Hashing);

        state.hashing.remove(&path);
        state.files.insert(path.clone(), record("/a", 10, "d"));
        assert_eq!(state.phase(&path), Phase::Hashed);
    }

    #[test]
    fn remaining_counts_exclude_deleted() {
        let mut state = State::default();
        for p in ["/a", "/b", "/c"] {
            state.discovered.insert(PathBuf::from(p), 10);
            state.files.insert(PathBuf::from(p), record(p, 10, "d"));
            state
                .digest_index
                .entry("d".to_string())
                .or_default()
                .insert(PathBuf::from(p));
        }
        assert_eq!(state.remaining_in_group("d"), 3);

        state.deleted.insert(PathBuf::from("/b"));
        assert_eq!(state.remaining_in_group("d"), 2);
        assert_eq!(state.remaining_in_group("unknown"), 0);
    }

    #[test]
    fn snapshots_are_value_semantics() {
        let mut state = State::default();
        state.discovered.insert(PathBuf::from("/a"), 1);

        let snapshot = state.clone();
        state.discovered.insert(PathBuf::from("/b"), 2);

        assert_eq!(snapshot.discovered.len(), 1);
        assert_eq!(state.discovered.len(), 2);
    }
}
