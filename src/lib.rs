//! dupescan - incremental duplicate file indexer.
//!
//! Finds duplicate files under one or more roots by combining a cheap
//! approximate equality test (file size) with an exact one (BLAKE3
//! content hash), built around an event-driven core: an immutable
//! [`state::State`] snapshot, a pure [`reducer`], a bounded hash
//! [`scheduler`], and derived read-only [`view`] projections. The
//! [`engine`] wires the core to its filesystem collaborators.

pub mod actions;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod reducer;
pub mod scanner;
pub mod scheduler;
pub mod state;
pub mod view;

pub use cli::run_app;
