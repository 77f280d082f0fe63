//! The reducer: the sole mutation path of the engine.
//!
//! # Overview
//!
//! Every change to the index flows through [`apply`] as an [`Event`],
//! producing a [`Transition`]: the successor [`State`] plus any side
//! effects to perform, expressed as [`Effect`] values. The reducer itself
//! performs no I/O; the engine executes the effects and feeds their
//! completions back as further events. This closed loop keeps the reducer
//! a total, pure function that can be tested by comparing snapshots.
//!
//! The only failure [`apply`] can return is a caller contract violation:
//! delivering a hash for a path that already has a record. Recoverable
//! I/O failures arrive as ordinary events ([`Event::HashFailed`],
//! [`Event::RemoveFailed`]) and policy refusals are reported in the
//! transition, not as errors.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::state::{Digest, FileRecord, Selection, State};

/// A mutation request. The only legal entry points into the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Track a new scan root. Subsumed roots are dropped; adding a path
    /// already covered by an ancestor root changes nothing but the
    /// remembered picker default.
    AddRoot(PathBuf),
    /// Reset the index, keeping only the remembered picker default.
    /// Cancels all in-flight background work.
    Clear,
    /// A walker found a regular file. Idempotent.
    FileDiscovered { path: PathBuf, size: u64 },
    /// The scheduler claimed these paths for hashing. Marks them before
    /// dispatch so no path is ever scheduled twice.
    HashingScheduled(Vec<PathBuf>),
    /// A background hash completed.
    HashComputed {
        path: PathBuf,
        size: u64,
        digest: Digest,
        parent: Option<PathBuf>,
    },
    /// A background hash failed with an I/O error.
    HashFailed { path: PathBuf, message: String },
    /// Flip safe mode.
    ToggleSafeMode,
    /// Replace the current view selection.
    Select(Selection),
    /// The user asked to delete a file. Checked against safe mode before
    /// any removal is attempted.
    DeleteRequested(PathBuf),
    /// The removal collaborator succeeded.
    FileRemoved(PathBuf),
    /// The removal collaborator failed; the path stays not-deleted.
    RemoveFailed { path: PathBuf, message: String },
}

/// Side effect requested by a transition, executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Start walking a root directory.
    Scan(PathBuf),
    /// Hash one file in the background.
    Hash(PathBuf),
    /// Remove one file via the removal collaborator.
    Remove(PathBuf),
    /// Cancel all background work belonging to the superseded state.
    CancelBackground,
}

/// A normal, expected "no" from the engine. Distinct from both I/O
/// failures and programming errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refusal {
    /// The path has no record; nothing to delete.
    UnknownPath(PathBuf),
    /// The path was already deleted.
    AlreadyDeleted(PathBuf),
    /// Safe mode: deleting this file would leave its group with no
    /// surviving copy.
    LastCopy { path: PathBuf, digest: Digest },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownPath(p) => write!(f, "no such indexed file: {}", p.display()),
            Self::AlreadyDeleted(p) => write!(f, "already deleted: {}", p.display()),
            Self::LastCopy { path, .. } => write!(
                f,
                "refused: deleting {} would leave no surviving copy",
                path.display()
            ),
        }
    }
}

/// Caller contract violations. These indicate an integration bug, not a
/// runtime condition, and leave the previous state untouched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReduceError {
    /// A hash arrived for a path that already has a record (I5).
    #[error("hash recomputed for already-hashed path: {0}")]
    AlreadyHashed(PathBuf),
}

/// Result of applying one event: the successor state, the side effects to
/// run, and an optional policy refusal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: State,
    pub effects: Vec<Effect>,
    pub refusal: Option<Refusal>,
}

impl Transition {
    fn new(state: State) -> Self {
        Self {
            state,
            effects: Vec::new(),
            refusal: None,
        }
    }

    fn with_effect(state: State, effect: Effect) -> Self {
        Self {
            state,
            effects: vec![effect],
            refusal: None,
        }
    }

    fn refused(state: State, refusal: Refusal) -> Self {
        Self {
            state,
            effects: Vec::new(),
            refusal: Some(refusal),
        }
    }
}

/// Apply one event to the current state, producing the next.
///
/// Total for every well-formed event; the only error is the I5 contract
/// violation of re-hashing a known path.
pub fn apply(state: &State, event: Event) -> Result<Transition, ReduceError> {
    match event {
        Event::AddRoot(path) => Ok(add_root(state, path)),
        Event::Clear => Ok(clear(state)),
        Event::FileDiscovered { path, size } => Ok(file_discovered(state, path, size)),
        Event::HashingScheduled(paths) => Ok(hashing_scheduled(state, paths)),
        Event::HashComputed {
            path,
            size,
            digest,
            parent,
        } => hash_computed(state, path, size, digest, parent),
        Event::HashFailed { path, message } => Ok(hash_failed(state, path, message)),
        Event::ToggleSafeMode => {
            let mut next = state.clone();
            next.safe_mode = !next.safe_mode;
            Ok(Transition::new(next))
        }
        Event::Select(selection) => {
            let mut next = state.clone();
            next.selection = selection;
            Ok(Transition::new(next))
        }
        Event::DeleteRequested(path) => Ok(delete_requested(state, path)),
        Event::FileRemoved(path) => {
            let mut next = state.clone();
            next.errors.remove(&path);
            next.deleted.insert(path);
            Ok(Transition::new(next))
        }
        Event::RemoveFailed { path, message } => {
            let mut next = state.clone();
            next.errors.insert(path, message);
            Ok(Transition::new(next))
        }
    }
}

/// Insert a root, maintaining subsumption: descendants of the new root are
/// dropped, and a root already covered by an ancestor is not inserted and
/// triggers no scan.
fn add_root(state: &State, path: PathBuf) -> Transition {
    let mut next = state.clone();
    next.last_root = Some(path.clone());

    let covered = state.roots.iter().any(|r| path.starts_with(r));
    if covered {
        log::debug!("root {} already covered, not rescanning", path.display());
        return Transition::new(next);
    }

    next.roots.retain(|r| !r.starts_with(&path));
    next.roots.insert(path.clone());
    Transition::with_effect(next, Effect::Scan(path))
}

/// Reset to empty, preserving only the picker default.
fn clear(state: &State) -> Transition {
    let next = State {
        last_root: state.last_root.clone(),
        ..State::default()
    };
    Transition::with_effect(next, Effect::CancelBackground)
}

fn file_discovered(state: &State, path: PathBuf, size: u64) -> Transition {
    if state.discovered.contains_key(&path) {
        return Transition::new(state.clone());
    }
    let mut next = state.clone();
    next.size_index.entry(size).or_default().insert(path.clone());
    next.discovered.insert(path, size);
    Transition::new(next)
}

/// Mark paths as hashing and request the background work. Paths that are
/// no longer eligible (already claimed, hashed, or swept away by a clear)
/// are skipped rather than dispatched twice.
fn hashing_scheduled(state: &State, paths: Vec<PathBuf>) -> Transition {
    let mut next = state.clone();
    let mut effects = Vec::new();
    for path in paths {
        let eligible = next.discovered.contains_key(&path)
            && !next.hashing.contains(&path)
            && !next.files.contains_key(&path);
        if eligible {
            next.hashing.insert(path.clone());
            effects.push(Effect::Hash(path));
        }
    }
    Transition {
        state: next,
        effects,
        refusal: None,
    }
}

fn hash_computed(
    state: &State,
    path: PathBuf,
    size: u64,
    digest: Digest,
    parent: Option<PathBuf>,
) -> Result<Transition, ReduceError> {
    if state.files.contains_key(&path) {
        return Err(ReduceError::AlreadyHashed(path));
    }
    let mut next = state.clone();
    next.hashing.remove(&path);
    next.errors.remove(&path);
    // A hash delivered for a path the walker never reported still keeps
    // the size bookkeeping coherent.
    next.discovered.entry(path.clone()).or_insert(size);
    next.size_index.entry(size).or_default().insert(path.clone());
    next.digest_index
        .entry(digest.clone())
        .or_default()
        .insert(path.clone());
    next.size_to_digests
        .entry(size)
        .or_default()
        .insert(digest.clone());
    next.files.insert(
        path.clone(),
        FileRecord {
            path,
            size,
            digest,
            parent,
        },
    );
    Ok(Transition::new(next))
}

fn hash_failed(state: &State, path: PathBuf, message: String) -> Transition {
    log::warn!("hashing {} failed: {}", path.display(), message);
    let mut next = state.clone();
    next.hashing.remove(&path);
    next.errors.insert(path, message);
    Transition::new(next)
}

/// Check the deletion request against safe mode. The file is only removed
/// by the collaborator; `deleted` is updated by the later
/// [`Event::FileRemoved`], never optimistically.
fn delete_requested(state: &State, path: PathBuf) -> Transition {
    let Some(record) = state.files.get(&path) else {
        return Transition::refused(state.clone(), Refusal::UnknownPath(path));
    };
    if state.deleted.contains(&path) {
        return Transition::refused(state.clone(), Refusal::AlreadyDeleted(path));
    }
    if state.safe_mode && state.remaining_in_group(&record.digest) <= 1 {
        let digest = record.digest.clone();
        return Transition::refused(state.clone(), Refusal::LastCopy { path, digest });
    }
    Transition::with_effect(state.clone(), Effect::Remove(path))
}
