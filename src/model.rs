//! Core data model for prwatch.
//!
//! These types cover the three worlds the watcher reconciles: the pull
//! request as GitHub reports it, the CI signals attached to its head
//! commit, and the review feedback left by trusted humans and agents.
//! Everything here is plain data; the decisions live in `engine`.

mod check;
mod pr;
mod review;
mod snapshot;

pub use check::{CheckEntry, CheckSummary};
pub use pr::PullRequest;
pub use review::{ReviewItem, ReviewKind};
pub use snapshot::{Action, FailedRun, RerunOutcome, RetryState, Snapshot, WatchEvent, WorkflowRun};
