//! Pull request snapshot: identity plus merge-eligibility fields.

use serde::{Deserialize, Serialize};

/// One pull request as reported by GitHub at a single point in time.
///
/// Re-fetched every cycle; never tracked incrementally. The merge
/// eligibility fields (`mergeable`, `merge_state_status`,
/// `review_decision`) are kept as the provider's raw strings so the
/// readiness predicate can match them against its named vocabularies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub url: String,

    /// `OWNER/REPO` the PR belongs to.
    pub repo: String,

    /// Commit currently proposed for merge.
    pub head_sha: String,
    pub head_branch: String,

    /// Raw lifecycle state string (`OPEN`, `MERGED`, `CLOSED`).
    pub state: String,
    pub merged: bool,
    pub closed: bool,

    /// Tri-state merge eligibility (`MERGEABLE`, `CONFLICTING`, `UNKNOWN`).
    pub mergeable: String,
    pub merge_state_status: String,
    pub review_decision: String,
}

impl PullRequest {
    /// Whether the PR's lifecycle has ended, one way or the other.
    pub fn is_finished(&self) -> bool {
        self.closed || self.merged
    }
}
