//! Command-line surface.
//!
//! The CLI is a thin, non-interactive shell around the engine: scan the
//! given roots, wait for the index to go quiescent, print the bounded
//! duplicate-group report as text or JSON.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread;

use anyhow::{anyhow, Context, Result};
use bytesize::ByteSize;
use clap::Parser;
use serde::Serialize;

use crate::actions::TrashRemover;
use crate::config::{EngineConfig, DEFAULT_MAX_GROUPS};
use crate::engine::Engine;
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::reducer::Event;
use crate::view::{self, DuplicateGroup, Summary};

/// Find duplicate files by size, then by content hash.
#[derive(Parser, Debug)]
#[command(name = "dupescan", version, about)]
pub struct Cli {
    /// Directories to scan for duplicates.
    #[arg(required = true, value_name = "DIR")]
    pub roots: Vec<PathBuf>,

    /// Maximum concurrent hashing jobs [default: processing units - 1].
    #[arg(short, long, env = "DUPESCAN_JOBS", value_name = "N")]
    pub jobs: Option<usize>,

    /// Maximum number of duplicate groups to report.
    #[arg(long, default_value_t = DEFAULT_MAX_GROUPS, value_name = "N")]
    pub max_groups: usize,

    /// Emit the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// The machine-readable report for `--json`.
#[derive(Debug, Serialize)]
struct Report {
    summary: Summary,
    groups: Vec<DuplicateGroup>,
}

/// Run the application: scan, wait for quiescence, report.
///
/// # Errors
///
/// Returns an error for unusable roots or an engine failure.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let mut roots = Vec::with_capacity(cli.roots.len());
    for root in &cli.roots {
        let canonical = std::fs::canonicalize(root)
            .with_context(|| format!("cannot access scan root {}", root.display()))?;
        roots.push(canonical);
    }

    let config = EngineConfig {
        max_groups: cli.max_groups,
        concurrency: cli.jobs.unwrap_or_else(crate::config::default_concurrency),
    }
    .sanitized();
    let max_groups = config.max_groups;

    let engine = Engine::new(config, Arc::new(TrashRemover));
    let handle = engine.handle();
    let worker = thread::spawn(move || engine.run());

    for root in roots {
        handle.dispatch(Event::AddRoot(root));
    }
    handle.wait_idle();

    let snapshot = handle.snapshot();
    let report = Report {
        summary: view::summary(&snapshot, max_groups),
        groups: view::duplicate_groups(&snapshot, max_groups),
    };

    handle.shutdown();
    worker
        .join()
        .map_err(|_| anyhow!("engine thread panicked"))?
        .context("engine failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        render_text(&report);
    }

    Ok(if report.groups.is_empty() {
        ExitCode::NoDuplicates
    } else {
        ExitCode::Success
    })
}

fn render_text(report: &Report) {
    if report.groups.is_empty() {
        println!("No duplicates found.");
    }
    for (i, group) in report.groups.iter().enumerate() {
        let short_digest = &group.digest[..group.digest.len().min(12)];
        println!(
            "[{}] {} x{} ({} reclaimable) {}",
            i + 1,
            ByteSize::b(group.size),
            group.files.len(),
            ByteSize::b(group.wasted_space()),
            short_digest,
        );
        for file in &group.files {
            println!("    {}", file.path.display());
        }
    }
    let s = &report.summary;
    println!(
        "{} files discovered, {} hashed, {} group(s), {} minimum",
        s.discovered,
        s.hashed,
        s.groups,
        ByteSize::b(s.min_size_cutoff),
    );
}
