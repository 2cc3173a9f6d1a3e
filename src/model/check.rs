//! Check run entries and their per-cycle aggregate.

use serde::{Deserialize, Serialize};

/// One CI check as listed by `gh pr checks`.
///
/// `bucket` is gh's own pending/pass/fail classification; `state` is the
/// raw provider state (`QUEUED`, `SUCCESS`, ...). The summarizer consults
/// both because some providers report a state without a bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckEntry {
    pub name: String,
    pub bucket: String,
    pub state: String,
    pub url: String,
}

/// Aggregate check counts for one cycle. Derived, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSummary {
    pub pending_count: usize,
    pub failed_count: usize,
    pub passed_count: usize,

    /// True when nothing is still queued or running.
    pub all_terminal: bool,
}

impl CheckSummary {
    /// Every check finished and none of them failed.
    pub fn is_green(&self) -> bool {
        self.all_terminal && self.failed_count == 0 && self.pending_count == 0
    }
}
