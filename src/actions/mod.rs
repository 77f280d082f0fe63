//! File actions performed on behalf of the engine.

pub mod remove;

pub use remove::{FileRemover, PermanentRemover, RemoveError, TrashRemover};
