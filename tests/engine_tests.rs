//! End-to-end tests: real filesystem scans through the full engine loop.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use dupescan::actions::PermanentRemover;
use dupescan::config::EngineConfig;
use dupescan::engine::{Engine, EngineError, EngineHandle};
use dupescan::reducer::Event;
use dupescan::state::Selection;
use dupescan::view;

const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

fn start(config: EngineConfig) -> (EngineHandle, thread::JoinHandle<Result<(), EngineError>>) {
    let engine = Engine::new(config, Arc::new(PermanentRemover));
    let handle = engine.handle();
    let join = thread::spawn(move || engine.run());
    (handle, join)
}

fn stop(handle: EngineHandle, join: thread::JoinHandle<Result<(), EngineError>>) {
    handle.shutdown();
    join.join()
        .expect("engine thread panicked")
        .expect("engine failed");
}

fn settle(handle: &EngineHandle) {
    assert!(
        handle.wait_idle_timeout(IDLE_TIMEOUT),
        "engine did not go idle in time"
    );
}

fn write(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn duplicates_found_across_roots() {
    let left = TempDir::new().unwrap();
    let right = TempDir::new().unwrap();
    let a = write(left.path(), "a.txt", b"shared payload");
    let b = write(right.path(), "b.txt", b"shared payload");
    write(right.path(), "unique.txt", b"nothing like me");

    let (handle, join) = start(EngineConfig::default());
    handle.dispatch(Event::AddRoot(left.path().to_path_buf()));
    handle.dispatch(Event::AddRoot(right.path().to_path_buf()));
    settle(&handle);

    let snapshot = handle.snapshot();
    snapshot.assert_invariants();
    assert_eq!(snapshot.roots.len(), 2);

    let groups = view::duplicate_groups(&snapshot, 50);
    assert_eq!(groups.len(), 1);
    let mut paths: Vec<PathBuf> = groups[0].files.iter().map(|f| f.path.clone()).collect();
    paths.sort();
    let mut expected = vec![a, b];
    expected.sort();
    assert_eq!(paths, expected);
    assert_eq!(groups[0].remaining, 2);
    stop(handle, join);
}

#[test]
fn nested_root_is_subsumed_and_files_counted_once() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("sub");
    fs::create_dir(&sub).unwrap();
    write(&sub, "x.bin", b"copy");
    write(&sub, "y.bin", b"copy");

    let (handle, join) = start(EngineConfig::default());
    handle.dispatch(Event::AddRoot(sub.clone()));
    settle(&handle);
    // A parent root replaces the child; rediscovery is idempotent.
    handle.dispatch(Event::AddRoot(dir.path().to_path_buf()));
    settle(&handle);
    // Re-adding the child changes nothing: a parent already covers it.
    handle.dispatch(Event::AddRoot(sub.clone()));
    settle(&handle);

    let snapshot = handle.snapshot();
    assert_eq!(
        snapshot.roots.iter().collect::<Vec<_>>(),
        vec![dir.path()]
    );
    assert_eq!(snapshot.discovered.len(), 2);
    assert_eq!(view::duplicate_groups(&snapshot, 50).len(), 1);
    stop(handle, join);
}

#[test]
fn delete_all_but_last_copy() {
    let dir = TempDir::new().unwrap();
    let a = write(dir.path(), "a", b"triple");
    let b = write(dir.path(), "b", b"triple");
    let c = write(dir.path(), "c", b"triple");

    let (handle, join) = start(EngineConfig::default());
    handle.dispatch(Event::AddRoot(dir.path().to_path_buf()));
    settle(&handle);

    let digest = handle.snapshot().files[&a].digest.clone();
    assert_eq!(view::remaining_in_group(&handle.snapshot(), &digest), 3);

    handle.dispatch(Event::DeleteRequested(a.clone()));
    settle(&handle);
    handle.dispatch(Event::DeleteRequested(b.clone()));
    settle(&handle);

    let snapshot = handle.snapshot();
    assert_eq!(view::remaining_in_group(&snapshot, &digest), 1);
    assert!(!a.exists() && !b.exists() && c.exists());

    // Safe mode refuses the survivor.
    handle.dispatch(Event::DeleteRequested(c.clone()));
    settle(&handle);
    assert!(c.exists());
    assert_eq!(view::remaining_in_group(&handle.snapshot(), &digest), 1);

    // Disabling safe mode allows it.
    handle.dispatch(Event::ToggleSafeMode);
    handle.dispatch(Event::DeleteRequested(c.clone()));
    settle(&handle);
    assert!(!c.exists());
    assert_eq!(view::remaining_in_group(&handle.snapshot(), &digest), 0);
    stop(handle, join);
}

#[test]
fn group_list_is_bounded_with_cutoff() {
    let dir = TempDir::new().unwrap();
    // Six duplicate pairs of strictly increasing sizes.
    for i in 0..6u8 {
        let contents = vec![i; 100 * (usize::from(i) + 1)];
        write(dir.path(), &format!("{i}-a.bin"), &contents);
        write(dir.path(), &format!("{i}-b.bin"), &contents);
    }

    let config = EngineConfig {
        max_groups: 3,
        ..EngineConfig::default()
    };
    let (handle, join) = start(config);
    handle.dispatch(Event::AddRoot(dir.path().to_path_buf()));
    settle(&handle);

    let snapshot = handle.snapshot();
    let groups = view::duplicate_groups(&snapshot, 3);
    assert_eq!(groups.len(), 3);
    // Largest first; the cutoff is the smallest visible group's size.
    assert!(groups.windows(2).all(|w| w[0].size >= w[1].size));
    assert_eq!(
        view::min_size_cutoff(&snapshot, 3),
        groups.last().unwrap().size
    );
    stop(handle, join);
}

#[test]
fn folder_view_lists_hashed_files() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("pics");
    fs::create_dir(&sub).unwrap();
    let small = write(&sub, "small.jpg", b"img");
    let big = write(&sub, "big.jpg", b"imgimgimgimg");
    write(&sub, "small-copy.jpg", b"img");
    write(dir.path(), "big-copy.jpg", b"imgimgimgimg");

    let (handle, join) = start(EngineConfig::default());
    handle.dispatch(Event::AddRoot(dir.path().to_path_buf()));
    settle(&handle);

    handle.dispatch(Event::Select(Selection::Folder(sub.clone())));
    settle(&handle);

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.selection, Selection::Folder(sub.clone()));
    let listing = view::files_in_folder(&snapshot, &sub);
    // Size ascending; only files in this exact folder.
    assert_eq!(listing.len(), 3);
    assert!(listing.iter().all(|f| f.parent.as_deref() == Some(sub.as_path())));
    assert_eq!(listing[0].size, 3);
    assert_eq!(listing.last().unwrap().size, 12);
    assert!(listing.iter().any(|f| f.path == small));
    assert!(listing.iter().any(|f| f.path == big));
    stop(handle, join);
}

#[test]
fn selected_group_hidden_from_group_list() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "1a", b"first pair");
    write(dir.path(), "1b", b"first pair");
    write(dir.path(), "2a", b"second pair!");
    write(dir.path(), "2b", b"second pair!");

    let (handle, join) = start(EngineConfig::default());
    handle.dispatch(Event::AddRoot(dir.path().to_path_buf()));
    settle(&handle);

    let snapshot = handle.snapshot();
    let groups = view::duplicate_groups(&snapshot, 50);
    assert_eq!(groups.len(), 2);

    handle.dispatch(Event::Select(Selection::Group(groups[0].digest.clone())));
    settle(&handle);
    let snapshot = handle.snapshot();
    let visible = view::duplicate_groups(&snapshot, 50);
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].digest, groups[1].digest);
    stop(handle, join);
}
