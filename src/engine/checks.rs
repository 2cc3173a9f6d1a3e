//! Check summarizing and failed-run filtering.

use crate::model::{CheckEntry, CheckSummary, FailedRun, WorkflowRun};

use super::{FAILED_RUN_CONCLUSIONS, PENDING_CHECK_STATES};

/// A check is pending when gh buckets it as such, or when its raw state
/// is in the pending vocabulary. The redundancy covers providers that
/// report a state but leave the bucket empty.
fn is_pending(check: &CheckEntry) -> bool {
    check.bucket.eq_ignore_ascii_case("pending")
        || PENDING_CHECK_STATES
            .iter()
            .any(|s| check.state.eq_ignore_ascii_case(s))
}

/// Classify raw check entries into pending/fail/pass counts.
///
/// An empty list summarizes to all zeroes with `all_terminal = true`:
/// a PR with no checks configured has nothing left to wait for.
pub fn summarize_checks(checks: &[CheckEntry]) -> CheckSummary {
    let mut pending_count = 0;
    let mut failed_count = 0;
    let mut passed_count = 0;

    for check in checks {
        if is_pending(check) {
            pending_count += 1;
        }
        match check.bucket.to_ascii_lowercase().as_str() {
            "fail" => failed_count += 1,
            "pass" => passed_count += 1,
            _ => {}
        }
    }

    CheckSummary {
        pending_count,
        failed_count,
        passed_count,
        all_terminal: pending_count == 0,
    }
}

/// Filter workflow runs down to failures on the PR's current head.
///
/// Runs on other commits are stale and never actionable. The result is
/// sorted by (workflow name, run id) for stable output.
pub fn failed_runs_from(runs: Vec<WorkflowRun>, head_sha: &str) -> Vec<FailedRun> {
    let mut failed: Vec<FailedRun> = runs
        .into_iter()
        .filter(|run| {
            run.head_sha == head_sha && FAILED_RUN_CONCLUSIONS.contains(&run.conclusion.as_str())
        })
        .map(|run| FailedRun {
            run_id: run.id,
            workflow_name: run.workflow_name,
            status: run.status,
            conclusion: run.conclusion,
            html_url: run.html_url,
        })
        .collect();
    failed.sort_by(|a, b| {
        (a.workflow_name.as_str(), a.run_id).cmp(&(b.workflow_name.as_str(), b.run_id))
    });
    failed
}
