//! Directory walker built on jwalk.
//!
//! # Overview
//!
//! Produces the `(path, size)` sequence the engine indexes: regular,
//! non-empty files only, no ordering guarantee beyond a per-directory sort
//! for reproducibility. Unreadable entries are logged and skipped so one
//! bad directory never stops a scan. A shared cancel flag lets the engine
//! abandon a walk whose generation has been cleared.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

/// Walks one root directory, yielding regular non-empty files.
#[derive(Debug)]
pub struct Walker {
    root: PathBuf,
    cancel: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a walker for `root`.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            cancel: None,
        }
    }

    /// Stop the walk as soon as possible once `flag` is set.
    #[must_use]
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the tree, yielding `(path, size)` for every regular file with
    /// size greater than zero. Symlinks are not followed; per-entry errors
    /// are logged and skipped.
    pub fn walk(&self) -> impl Iterator<Item = (PathBuf, u64)> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _state, children| {
                // Sort children for deterministic output.
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .take_while(move |_| !self.is_cancelled())
            .filter_map(move |entry_result| {
                let entry = match entry_result {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("walk error under {}: {}", self.root.display(), e);
                        return None;
                    }
                };

                let file_type = entry.file_type();
                if !file_type.is_file() || file_type.is_symlink() {
                    return None;
                }

                let path = entry.path();
                let metadata = match std::fs::symlink_metadata(&path) {
                    Ok(m) => m,
                    Err(e) => {
                        log::warn!("cannot stat {}: {}", path.display(), e);
                        return None;
                    }
                };

                let size = metadata.len();
                if size == 0 {
                    // Every empty file is trivially identical; not worth tracking.
                    return None;
                }

                Some((path, size))
            })
    }
}
