//! Cycle orchestration and the watch loop.
//!
//! One cycle is fetch, summarize, normalize, recommend, persist, emit.
//! State mutations always reach disk before the cycle's snapshot is
//! surfaced, so an observer of emitted snapshots never sees state that
//! was not durably saved.
//!
//! The loop's backoff is a small value-type state machine carried
//! between iterations: once a PR is green and nothing changes between
//! cycles, the poll interval doubles up to a one-hour ceiling; any
//! change or non-green snapshot resets it to the configured base.

use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use jiff::Timestamp;

use crate::gateway::{self, GatewayError, PrSpec};
use crate::model::{Action, RerunOutcome, RetryState, Snapshot, WatchEvent};
use crate::state::{self, StateError};
use crate::{engine, engine::RerunBlocked};

/// Poll interval ceiling once a PR has gone green and quiet.
pub const GREEN_STATE_MAX_POLL_SECONDS: u64 = 60 * 60;

/// Errors that can end a watch: every per-cycle failure is terminal,
/// never swallowed to keep polling.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// What one watcher invocation operates on.
#[derive(Debug, Clone)]
pub struct WatchOptions {
    pub pr: PrSpec,
    pub repo: Option<String>,
    pub poll_seconds: u64,
    pub max_flaky_retries: u32,
    pub state_file: Option<PathBuf>,
}

/// The per-cycle change fingerprint driving the backoff.
///
/// Two cycles with equal keys saw the same world: same head, same
/// lifecycle and merge eligibility, same check counts, same new
/// feedback, same advice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeKey {
    head_sha: String,
    pr_state: String,
    mergeable: String,
    merge_state_status: String,
    review_decision: String,
    passed_count: usize,
    failed_count: usize,
    pending_count: usize,
    new_item_ids: Vec<(String, String)>,
    actions: Vec<Action>,
}

impl ChangeKey {
    pub fn of(snapshot: &Snapshot) -> Self {
        Self {
            head_sha: snapshot.pr.head_sha.clone(),
            pr_state: snapshot.pr.state.clone(),
            mergeable: snapshot.pr.mergeable.clone(),
            merge_state_status: snapshot.pr.merge_state_status.clone(),
            review_decision: snapshot.pr.review_decision.clone(),
            passed_count: snapshot.checks.passed_count,
            failed_count: snapshot.checks.failed_count,
            pending_count: snapshot.checks.pending_count,
            new_item_ids: snapshot
                .new_review_items
                .iter()
                .map(|i| (i.kind.as_str().to_string(), i.id.clone()))
                .collect(),
            actions: snapshot.actions.clone(),
        }
    }
}

/// Adaptive poll-interval state, carried between loop iterations.
#[derive(Debug)]
pub struct Backoff {
    base: u64,
    ceiling: u64,
    current: u64,
    last_key: Option<ChangeKey>,
}

impl Backoff {
    pub fn new(base_seconds: u64) -> Self {
        Self {
            base: base_seconds,
            ceiling: GREEN_STATE_MAX_POLL_SECONDS,
            current: base_seconds,
            last_key: None,
        }
    }

    /// Fold in one cycle's outcome and return the next poll interval.
    ///
    /// Doubles (capped) only on consecutive green, unchanged cycles.
    /// The first cycle always polls at the base.
    pub fn next_interval(&mut self, green: bool, key: ChangeKey) -> u64 {
        let unchanged = self.last_key.as_ref() == Some(&key);
        self.current = if green && unchanged {
            (self.current * 2).min(self.ceiling)
        } else {
            self.base
        };
        self.last_key = Some(key);
        self.current
    }
}

/// Run one full cycle: fetch everything, decide, persist, and return
/// the snapshot plus the state-file path it was tracked in.
pub fn collect_snapshot(opts: &WatchOptions) -> Result<(Snapshot, PathBuf), WatchError> {
    let pr = gateway::resolve_pr(&opts.pr, opts.repo.as_deref())?;
    let state_path = opts
        .state_file
        .clone()
        .unwrap_or_else(|| state::default_path(&pr.repo, pr.number));

    let (mut state, fresh) = state::load(&state_path)?;
    if fresh {
        // A fresh state file starts with empty seen-sets, so review
        // activity that predates the watcher is surfaced rather than
        // silently treated as already seen.
        log::info!("starting fresh tracking state at {}", state_path.display());
    }
    if state.started_at.is_none() {
        state.started_at = Some(Timestamp::now());
    }

    // `gh pr checks -R <repo>` needs an explicit selector, so use the
    // resolved number even when the PR was selected with `auto`.
    let checks = gateway::list_checks(pr.number, &pr.repo)?;
    let summary = engine::summarize_checks(&checks);

    let runs = gateway::list_workflow_runs(&pr.repo, &pr.head_sha)?;
    let failed_runs = engine::failed_runs_from(runs, &pr.head_sha);

    let login = gateway::authenticated_login()?;
    let raw_items = gateway::list_review_items(&pr.repo, pr.number)?;
    let new_review_items = engine::new_review_items(raw_items, &mut state, &login);

    let retries_used = state.retries_used(&pr.head_sha);
    let actions = engine::recommend_actions(
        &pr,
        &summary,
        &failed_runs,
        &new_review_items,
        retries_used,
        opts.max_flaky_retries,
    );

    state.pr.repo = Some(pr.repo.clone());
    state.pr.number = Some(pr.number);
    state.last_seen_head_sha = Some(pr.head_sha.clone());
    state.last_snapshot_at = Some(Timestamp::now());
    state::save(&state_path, &state)?;

    let snapshot = Snapshot {
        pr,
        checks: summary,
        failed_runs,
        new_review_items,
        actions,
        retry_state: RetryState {
            current_sha_retries_used: retries_used,
            max_flaky_retries: opts.max_flaky_retries,
        },
    };
    Ok((snapshot, state_path))
}

fn emit_event(event: &WatchEvent) -> Result<(), WatchError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, event)?;
    stdout.write_all(b"\n")?;
    stdout.flush()?;
    Ok(())
}

/// Poll the PR until a stop action appears, emitting one JSON event
/// per line.
pub fn run_watch(opts: &WatchOptions) -> Result<(), WatchError> {
    let mut backoff = Backoff::new(opts.poll_seconds);
    loop {
        let (snapshot, state_path) = collect_snapshot(opts)?;

        let green = snapshot.checks.is_green();
        let next_poll_seconds = backoff.next_interval(green, ChangeKey::of(&snapshot));
        let stop = snapshot.has_stop_action();

        emit_event(&WatchEvent::Snapshot {
            state_file: state_path.display().to_string(),
            next_poll_seconds,
            snapshot: snapshot.clone(),
        })?;

        if stop {
            emit_event(&WatchEvent::Stop {
                actions: snapshot.actions,
                pr: snapshot.pr,
            })?;
            return Ok(());
        }

        log::debug!("sleeping {next_poll_seconds}s until next cycle");
        thread::sleep(Duration::from_secs(next_poll_seconds));
    }
}

/// Collect a snapshot and, when policy allows, rerun the failed jobs
/// on the current head commit right now.
///
/// One successful invocation consumes exactly one unit of the per-SHA
/// retry budget, no matter how many runs were rerun.
pub fn retry_failed_now(opts: &WatchOptions) -> Result<RerunOutcome, WatchError> {
    let (snapshot, state_path) = collect_snapshot(opts)?;

    let mut outcome = RerunOutcome {
        state_file: state_path.display().to_string(),
        rerun_attempted: false,
        rerun_count: 0,
        rerun_run_ids: Vec::new(),
        reason: String::new(),
        snapshot,
    };

    let policy = engine::check_rerun_policy(
        &outcome.snapshot.pr,
        &outcome.snapshot.checks,
        &outcome.snapshot.failed_runs,
        outcome.snapshot.retry_state.current_sha_retries_used,
        opts.max_flaky_retries,
    );
    if let Err(blocked) = policy {
        outcome.reason = blocked.as_str().to_string();
        return Ok(outcome);
    }

    for run in &outcome.snapshot.failed_runs {
        let Some(run_id) = run.run_id else { continue };
        gateway::rerun_failed_jobs(&outcome.snapshot.pr.repo, run_id)?;
        outcome.rerun_run_ids.push(run_id);
    }

    if outcome.rerun_run_ids.is_empty() {
        outcome.reason = RerunBlocked::FailedRunsMissingIds.as_str().to_string();
        return Ok(outcome);
    }

    // Re-read the state so the increment lands on whatever is on disk,
    // then persist before reporting success.
    let (mut state, _) = state::load(&state_path)?;
    state.record_retry(&outcome.snapshot.pr.head_sha);
    state.last_snapshot_at = Some(Timestamp::now());
    state::save(&state_path, &state)?;

    outcome.rerun_attempted = true;
    outcome.rerun_count = outcome.rerun_run_ids.len();
    outcome.reason = "rerun_triggered".to_string();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(head: &str, actions: Vec<Action>) -> ChangeKey {
        ChangeKey {
            head_sha: head.into(),
            pr_state: "OPEN".into(),
            mergeable: "MERGEABLE".into(),
            merge_state_status: "CLEAN".into(),
            review_decision: String::new(),
            passed_count: 5,
            failed_count: 0,
            pending_count: 0,
            new_item_ids: Vec::new(),
            actions,
        }
    }

    #[test]
    fn first_cycle_polls_at_base() {
        let mut backoff = Backoff::new(30);
        assert_eq!(backoff.next_interval(true, key("abc", vec![Action::Idle])), 30);
    }

    #[test]
    fn consecutive_green_unchanged_cycles_double() {
        let mut backoff = Backoff::new(30);
        backoff.next_interval(true, key("abc", vec![Action::Idle]));
        assert_eq!(backoff.next_interval(true, key("abc", vec![Action::Idle])), 60);
        assert_eq!(backoff.next_interval(true, key("abc", vec![Action::Idle])), 120);
    }

    #[test]
    fn doubling_caps_at_the_ceiling() {
        let mut backoff = Backoff::new(3000);
        backoff.next_interval(true, key("abc", vec![Action::Idle]));
        for _ in 0..10 {
            backoff.next_interval(true, key("abc", vec![Action::Idle]));
        }
        assert_eq!(
            backoff.next_interval(true, key("abc", vec![Action::Idle])),
            GREEN_STATE_MAX_POLL_SECONDS
        );
    }

    #[test]
    fn any_change_resets_to_base() {
        let mut backoff = Backoff::new(30);
        backoff.next_interval(true, key("abc", vec![Action::Idle]));
        backoff.next_interval(true, key("abc", vec![Action::Idle]));
        // New head commit: the world changed.
        assert_eq!(backoff.next_interval(true, key("def", vec![Action::Idle])), 30);
    }

    #[test]
    fn non_green_resets_even_when_unchanged() {
        let mut backoff = Backoff::new(30);
        let k = key("abc", vec![Action::DiagnoseCiFailure]);
        backoff.next_interval(true, k.clone());
        backoff.next_interval(true, k.clone());
        assert_eq!(backoff.next_interval(false, k), 30);
    }

    #[test]
    fn action_list_participates_in_the_fingerprint() {
        let mut backoff = Backoff::new(30);
        backoff.next_interval(true, key("abc", vec![Action::Idle]));
        backoff.next_interval(true, key("abc", vec![Action::Idle]));
        assert_eq!(
            backoff.next_interval(true, key("abc", vec![Action::ProcessReviewComment])),
            30
        );
    }
}
