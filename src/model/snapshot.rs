//! The per-cycle decision snapshot and the records built around it.

use serde::{Deserialize, Serialize};

use super::{CheckSummary, PullRequest, ReviewItem};

/// Recommended next step for the babysitting agent.
///
/// The recommender emits these in priority order; the `Stop*` variants
/// terminate a watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    ProcessReviewComment,
    StopPrClosed,
    StopReadyToMerge,
    DiagnoseCiFailure,
    RetryFailedChecks,
    StopExhaustedRetries,
    Idle,
}

impl Action {
    /// Whether this action ends the watch loop.
    pub fn is_stop(self) -> bool {
        matches!(
            self,
            Self::StopPrClosed | Self::StopReadyToMerge | Self::StopExhaustedRetries
        )
    }
}

/// One execution of a CI pipeline definition, as returned by the
/// actions API for a head commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Option<u64>,
    pub workflow_name: String,
    pub status: String,
    pub conclusion: String,
    pub head_sha: String,
    pub html_url: String,
}

/// A workflow run on the PR head whose conclusion counts as a failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRun {
    /// Run id used for `gh run rerun`. The API should always supply it,
    /// but the rerun path tolerates its absence.
    pub run_id: Option<u64>,
    pub workflow_name: String,
    pub status: String,
    pub conclusion: String,
    pub html_url: String,
}

/// Where the flaky-retry budget stands for the current head commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryState {
    pub current_sha_retries_used: u32,
    pub max_flaky_retries: u32,
}

/// Everything the watcher decided in one cycle.
///
/// Fully derived; only its side effects (seen ids, retry counts,
/// timestamps) are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub pr: PullRequest,
    pub checks: CheckSummary,
    pub failed_runs: Vec<FailedRun>,
    pub new_review_items: Vec<ReviewItem>,
    pub actions: Vec<Action>,
    pub retry_state: RetryState,
}

impl Snapshot {
    pub fn has_stop_action(&self) -> bool {
        self.actions.iter().any(|a| a.is_stop())
    }
}

/// One line of watch-mode output, tagged so each line is self-describing
/// when read back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum WatchEvent {
    Snapshot {
        snapshot: Snapshot,
        state_file: String,
        next_poll_seconds: u64,
    },
    Stop {
        actions: Vec<Action>,
        pr: PullRequest,
    },
}

/// Result of a `--retry-failed-now` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerunOutcome {
    pub snapshot: Snapshot,
    pub state_file: String,
    pub rerun_attempted: bool,
    pub rerun_count: usize,
    pub rerun_run_ids: Vec<u64>,
    pub reason: String,
}
