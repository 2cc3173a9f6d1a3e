//! CLI interface for prwatch.
//!
//! Designed for agents and humans alike: arguments in, one JSON object
//! per line out on stdout, diagnostics on stderr. Three mutually
//! exclusive modes share the same options:
//!
//! - `--once` (default): emit one snapshot and exit.
//! - `--watch`: poll until the PR is mergeable, blocked, or closed.
//! - `--retry-failed-now`: rerun failed jobs when policy allows.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::config::{Config, DEFAULT_MAX_FLAKY_RETRIES, DEFAULT_POLL_SECONDS};
use crate::gateway::PrSpec;
use crate::model::Snapshot;
use crate::watch::{self, WatchOptions};

const WORKFLOW_HELP: &str = r"Workflow: babysitting a PR
  1. prwatch --pr 42 --once
     -> one snapshot with recommended actions
  2. prwatch --pr 42 --watch
     -> JSONL events until stop_ready_to_merge / stop_pr_closed /
        stop_exhausted_retries
  3. prwatch --pr 42 --retry-failed-now
     -> reruns failed jobs on the head commit, within the flaky budget

State (seen feedback ids, per-commit retry counts) persists in a JSON
file under the temp directory, keyed by repo and PR number.";

/// Watch a pull request's CI and review activity and recommend next
/// actions.
#[derive(Debug, Parser)]
#[command(name = "prwatch", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// PR to watch: `auto` (infer from the current branch), a PR
    /// number, or a PR URL.
    #[arg(long, default_value = "auto")]
    pr: String,

    /// OWNER/REPO override, for when the PR cannot be inferred.
    #[arg(long)]
    repo: Option<String>,

    /// Watch poll interval in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    poll_seconds: Option<u64>,

    /// Max rerun cycles per head SHA before recommending stop.
    #[arg(long)]
    max_flaky_retries: Option<u32>,

    /// State file path. Defaults to a deterministic path under the
    /// temp directory, derived from repo and PR number.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Emit one snapshot and exit (the default mode).
    // Read only through clap's conflict rules; no-mode invocations fall
    // through to the same branch.
    #[allow(dead_code)]
    #[arg(long, conflicts_with_all = ["watch", "retry_failed_now"])]
    once: bool,

    /// Continuously emit snapshot events, one JSON object per line.
    #[arg(long, conflicts_with = "retry_failed_now")]
    watch: bool,

    /// Rerun failed jobs for the current failed workflow runs, when
    /// the flaky-retry policy allows it.
    #[arg(long)]
    retry_failed_now: bool,
}

/// One-shot output: the snapshot plus where its state was tracked.
#[derive(Serialize)]
struct OnceOutput {
    #[serde(flatten)]
    snapshot: Snapshot,
    state_file: String,
}

/// Parse arguments, validate, and run the selected mode.
pub fn run(config: &Config) -> Result<(), String> {
    let cli = Cli::parse();
    dispatch(cli, config)
}

fn dispatch(cli: Cli, config: &Config) -> Result<(), String> {
    // All validation happens here, before any gh invocation.
    let pr = PrSpec::parse(&cli.pr).map_err(|e| e.to_string())?;

    let opts = WatchOptions {
        pr,
        repo: cli.repo,
        poll_seconds: cli
            .poll_seconds
            .or(config.poll_seconds)
            .unwrap_or(DEFAULT_POLL_SECONDS),
        max_flaky_retries: cli
            .max_flaky_retries
            .or(config.max_flaky_retries)
            .unwrap_or(DEFAULT_MAX_FLAKY_RETRIES),
        state_file: cli.state_file,
    };

    if cli.retry_failed_now {
        let outcome = watch::retry_failed_now(&opts).map_err(|e| e.to_string())?;
        print_json(&outcome)
    } else if cli.watch {
        watch::run_watch(&opts).map_err(|e| e.to_string())
    } else {
        let (snapshot, state_path) = watch::collect_snapshot(&opts).map_err(|e| e.to_string())?;
        print_json(&OnceOutput {
            snapshot,
            state_file: state_path.display().to_string(),
        })
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)
        .map_err(|e| format!("failed to serialize output: {e}"))?;
    stdout
        .write_all(b"\n")
        .and_then(|()| stdout.flush())
        .map_err(|e| format!("failed to write output: {e}"))?;
    Ok(())
}
