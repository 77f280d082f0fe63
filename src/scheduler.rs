//! Hash scheduling: decide what is worth hashing next, bounded.
//!
//! # Overview
//!
//! Hashing is the expensive half of duplicate detection, so the frontier
//! is restricted twice before any work is dispatched:
//!
//! - only size classes with at least two members can contain duplicates;
//! - files below the view's minimum-size cutoff can never appear in the
//!   bounded group list, so hashing them is wasted work.
//!
//! From that frontier, [`next_batch`] claims at most as many paths as the
//! concurrency budget allows. Ordering is largest size class first, then
//! lexical path order within a class, which makes scheduling decisions
//! reproducible in tests.

use std::path::PathBuf;

use crate::config::EngineConfig;
use crate::state::State;
use crate::view;

/// Discovered-but-unhashed paths eligible for hashing: members of size
/// classes with two or more files, at or above `min_size`, that are not
/// already hashing, hashed, or failed.
#[must_use]
pub fn frontier(state: &State, min_size: u64) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for (size, class) in state.size_index.iter().rev() {
        if *size < min_size {
            // Iterating largest-first, everything below is too small too.
            break;
        }
        if class.len() < 2 {
            continue;
        }
        for path in class {
            let waiting = !state.hashing.contains(path)
                && !state.files.contains_key(path)
                && !state.errors.contains_key(path);
            if waiting {
                paths.push(path.clone());
            }
        }
    }
    paths
}

/// Plan the next hashing batch for the current snapshot.
///
/// The budget is the configured concurrency minus hashes already in
/// flight; an empty batch means the scheduler has nothing useful to do
/// right now. The caller must mark the returned paths as hashing (via a
/// reducer event) before dispatching them, so a rerun of the scheduler
/// cannot claim them twice.
#[must_use]
pub fn next_batch(state: &State, config: &EngineConfig) -> Vec<PathBuf> {
    let budget = config.concurrency.saturating_sub(state.hashing.len());
    if budget == 0 {
        return Vec::new();
    }
    let cutoff = view::min_size_cutoff(state, config.max_groups);
    let mut batch = frontier(state, cutoff);
    batch.truncate(budget);
    batch
}
