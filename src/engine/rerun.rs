//! The flaky-rerun policy: when a rerun request is allowed.
//!
//! The budget unit is one rerun cycle per head commit, not one rerun
//! per job. Reruns are refused while anything is still running, since
//! a rerun fired into a half-finished check set wastes budget on
//! results that may change on their own.

use std::fmt;

use serde::Serialize;

use crate::model::{CheckSummary, FailedRun, PullRequest};

/// Why a rerun request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerunBlocked {
    PrClosed,
    NoFailedPrChecks,
    NoFailedRuns,
    ChecksStillPending,
    RetryBudgetExhausted,
    /// Failed runs exist but none carried a run id to rerun. Reported
    /// by the executor after attempting, not by the policy check.
    FailedRunsMissingIds,
}

impl RerunBlocked {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PrClosed => "pr_closed",
            Self::NoFailedPrChecks => "no_failed_pr_checks",
            Self::NoFailedRuns => "no_failed_runs",
            Self::ChecksStillPending => "checks_still_pending",
            Self::RetryBudgetExhausted => "retry_budget_exhausted",
            Self::FailedRunsMissingIds => "failed_runs_missing_ids",
        }
    }
}

impl fmt::Display for RerunBlocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check whether policy permits requesting reruns this cycle.
pub fn check_rerun_policy(
    pr: &PullRequest,
    checks: &CheckSummary,
    failed_runs: &[FailedRun],
    retries_used: u32,
    max_retries: u32,
) -> Result<(), RerunBlocked> {
    if pr.is_finished() {
        return Err(RerunBlocked::PrClosed);
    }
    if checks.failed_count == 0 {
        return Err(RerunBlocked::NoFailedPrChecks);
    }
    if failed_runs.is_empty() {
        return Err(RerunBlocked::NoFailedRuns);
    }
    if !checks.all_terminal {
        return Err(RerunBlocked::ChecksStillPending);
    }
    if retries_used >= max_retries {
        return Err(RerunBlocked::RetryBudgetExhausted);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_pr() -> PullRequest {
        PullRequest {
            number: 42,
            url: String::new(),
            repo: "octo/widgets".into(),
            head_sha: "abc123".into(),
            head_branch: "fix-widget".into(),
            state: "OPEN".into(),
            merged: false,
            closed: false,
            mergeable: "MERGEABLE".into(),
            merge_state_status: "CLEAN".into(),
            review_decision: String::new(),
        }
    }

    fn summary(pending: usize, failed: usize) -> CheckSummary {
        CheckSummary {
            pending_count: pending,
            failed_count: failed,
            passed_count: 0,
            all_terminal: pending == 0,
        }
    }

    fn failed_run() -> FailedRun {
        FailedRun {
            run_id: Some(1),
            workflow_name: "ci".into(),
            status: "completed".into(),
            conclusion: "failure".into(),
            html_url: String::new(),
        }
    }

    #[test]
    fn closed_pr_is_refused() {
        let mut pr = open_pr();
        pr.merged = true;
        let err = check_rerun_policy(&pr, &summary(0, 1), &[failed_run()], 0, 3).unwrap_err();
        assert_eq!(err, RerunBlocked::PrClosed);
    }

    #[test]
    fn green_checks_are_refused() {
        let err = check_rerun_policy(&open_pr(), &summary(0, 0), &[failed_run()], 0, 3).unwrap_err();
        assert_eq!(err, RerunBlocked::NoFailedPrChecks);
    }

    #[test]
    fn no_matching_runs_is_refused() {
        let err = check_rerun_policy(&open_pr(), &summary(0, 1), &[], 0, 3).unwrap_err();
        assert_eq!(err, RerunBlocked::NoFailedRuns);
    }

    #[test]
    fn pending_checks_are_refused() {
        let err = check_rerun_policy(&open_pr(), &summary(1, 1), &[failed_run()], 0, 3).unwrap_err();
        assert_eq!(err, RerunBlocked::ChecksStillPending);
    }

    #[test]
    fn exhausted_budget_is_refused() {
        let err = check_rerun_policy(&open_pr(), &summary(0, 1), &[failed_run()], 3, 3).unwrap_err();
        assert_eq!(err, RerunBlocked::RetryBudgetExhausted);
    }

    #[test]
    fn terminal_failure_with_budget_is_allowed() {
        assert!(check_rerun_policy(&open_pr(), &summary(0, 1), &[failed_run()], 2, 3).is_ok());
    }
}
