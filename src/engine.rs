//! The decision engine: pure functions from fetched signals to
//! recommended actions.
//!
//! Each concern has its own submodule: check summarizing, review-item
//! filtering and dedup, action recommendation, and the rerun policy.
//! Nothing in here performs I/O; the classification vocabularies are
//! named constants so tests (and forks) can reason about the exact
//! contract.

mod actions;
mod checks;
mod rerun;
mod review;

pub use actions::{is_ready_to_merge, recommend_actions};
pub use checks::{failed_runs_from, summarize_checks};
pub use rerun::{RerunBlocked, check_rerun_policy};
pub use review::new_review_items;

/// Workflow-run conclusions that count as failures worth diagnosing
/// or retrying.
pub const FAILED_RUN_CONCLUSIONS: &[&str] = &[
    "failure",
    "timed_out",
    "cancelled",
    "action_required",
    "startup_failure",
    "stale",
];

/// Raw check states that mean a check is still in flight. Consulted in
/// addition to gh's `pending` bucket, for providers that report a state
/// but omit the bucket.
pub const PENDING_CHECK_STATES: &[&str] =
    &["QUEUED", "IN_PROGRESS", "PENDING", "WAITING", "REQUESTED"];

/// Login keywords identifying the review-automation accounts whose
/// feedback is actionable. Any other `[bot]` account is ignored.
pub const REVIEW_AGENT_LOGIN_KEYWORDS: &[&str] = &["codex", "copilot", "coderabbit"];

/// Author associations whose review feedback is trusted without being
/// the authenticated caller.
pub const TRUSTED_AUTHOR_ASSOCIATIONS: &[&str] = &["OWNER", "MEMBER", "COLLABORATOR"];

/// Review decisions that block a merge.
pub const MERGE_BLOCKING_REVIEW_DECISIONS: &[&str] = &["REVIEW_REQUIRED", "CHANGES_REQUESTED"];

/// Merge-state statuses that block a merge (conflicts, branch
/// protection, drafts, or GitHub still computing).
pub const MERGE_CONFLICT_OR_BLOCKING_STATES: &[&str] = &["BLOCKED", "DIRTY", "DRAFT", "UNKNOWN"];
