//! The action recommender: the watcher's centerpiece state machine.
//!
//! Pure function of one cycle's signals. Rules are evaluated top to
//! bottom and append rather than replace, except for the two terminal
//! short-circuits: a closed PR makes all other advice moot, and a PR
//! ready to merge leaves nothing else actionable. Review feedback is
//! surfaced independent of CI outcome, since a human can act on it
//! while CI reruns.

use crate::model::{Action, CheckSummary, FailedRun, PullRequest, ReviewItem};

use super::{MERGE_BLOCKING_REVIEW_DECISIONS, MERGE_CONFLICT_OR_BLOCKING_STATES};

/// Whether nothing stands between this PR and the merge button.
pub fn is_ready_to_merge(
    pr: &PullRequest,
    checks: &CheckSummary,
    new_review_items: &[ReviewItem],
) -> bool {
    if pr.is_finished() {
        return false;
    }
    if !checks.all_terminal || checks.failed_count > 0 || checks.pending_count > 0 {
        return false;
    }
    if !new_review_items.is_empty() {
        return false;
    }
    if pr.mergeable != "MERGEABLE" {
        return false;
    }
    if MERGE_CONFLICT_OR_BLOCKING_STATES.contains(&pr.merge_state_status.as_str()) {
        return false;
    }
    if MERGE_BLOCKING_REVIEW_DECISIONS.contains(&pr.review_decision.as_str()) {
        return false;
    }
    true
}

fn dedupe(actions: Vec<Action>) -> Vec<Action> {
    let mut out = Vec::with_capacity(actions.len());
    for action in actions {
        if !out.contains(&action) {
            out.push(action);
        }
    }
    out
}

/// Combine one cycle's signals into an ordered, duplicate-free action
/// list.
pub fn recommend_actions(
    pr: &PullRequest,
    checks: &CheckSummary,
    failed_runs: &[FailedRun],
    new_review_items: &[ReviewItem],
    retries_used: u32,
    max_retries: u32,
) -> Vec<Action> {
    let mut actions = Vec::new();

    if pr.is_finished() {
        if !new_review_items.is_empty() {
            actions.push(Action::ProcessReviewComment);
        }
        actions.push(Action::StopPrClosed);
        return dedupe(actions);
    }

    if is_ready_to_merge(pr, checks, new_review_items) {
        actions.push(Action::StopReadyToMerge);
        return dedupe(actions);
    }

    if !new_review_items.is_empty() {
        actions.push(Action::ProcessReviewComment);
    }

    if checks.failed_count > 0 {
        if checks.all_terminal && retries_used >= max_retries {
            actions.push(Action::StopExhaustedRetries);
        } else {
            actions.push(Action::DiagnoseCiFailure);
            if checks.all_terminal && !failed_runs.is_empty() && retries_used < max_retries {
                actions.push(Action::RetryFailedChecks);
            }
        }
    }

    if actions.is_empty() {
        actions.push(Action::Idle);
    }
    dedupe(actions)
}
