//! Persisted tracking state for one watched pull request.
//!
//! The state file is the only thing with a lifecycle spanning cycles:
//! it carries the seen-id sets that keep review feedback from being
//! surfaced twice and the per-commit flaky-retry counters. It is loaded
//! at the start of a cycle, mutated in place, and atomically rewritten
//! before the cycle's snapshot is emitted.
//!
//! One watcher instance owns the file per PR identity. Concurrent
//! watchers on the same PR race on it; the deterministic default path
//! makes that collision visible rather than forking state silently.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading or saving tracking state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },

    /// A corrupt state file is fatal. Resetting it silently would lose
    /// the dedup and retry history the whole tool exists to keep.
    #[error("state file is not valid JSON: {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// PR identity recorded in the state file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrIdentity {
    pub repo: Option<String>,
    pub number: Option<u64>,
}

/// Durable tracking state for one pull request.
///
/// The seen-id sets are monotonically non-decreasing: an id once added
/// is never removed. Retry counters are independent per SHA, so a new
/// head commit starts at zero regardless of history on prior commits.
/// BTree collections keep the serialized file stably ordered and
/// diff-friendly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistedState {
    pub pr: PrIdentity,
    pub started_at: Option<Timestamp>,
    pub last_seen_head_sha: Option<String>,
    pub retries_by_sha: BTreeMap<String, u32>,
    pub seen_issue_comment_ids: BTreeSet<String>,
    pub seen_review_comment_ids: BTreeSet<String>,
    pub seen_review_ids: BTreeSet<String>,
    pub last_snapshot_at: Option<Timestamp>,
}

impl PersistedState {
    /// Rerun cycles already spent on the given head commit.
    pub fn retries_used(&self, head_sha: &str) -> u32 {
        self.retries_by_sha.get(head_sha).copied().unwrap_or(0)
    }

    /// Record one completed rerun cycle for the given head commit.
    ///
    /// Called only after reruns were actually requested, and exactly
    /// once per cycle no matter how many individual runs were rerun.
    pub fn record_retry(&mut self, head_sha: &str) {
        *self.retries_by_sha.entry(head_sha.to_string()).or_insert(0) += 1;
    }
}

/// Load tracking state, or synthesize an empty default when the file
/// does not exist yet.
///
/// The returned flag is true when the state was freshly created, so
/// callers can special-case first-run behavior (a fresh watcher must
/// surface pre-existing review activity, not treat it as seen).
pub fn load(path: &Path) -> Result<(PersistedState, bool), StateError> {
    let contents = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Ok((PersistedState::default(), true));
        }
        Err(e) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let state = serde_json::from_str(&contents).map_err(|e| StateError::Invalid {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok((state, false))
}

/// Atomically persist the state file.
///
/// Writes a temporary sibling and renames it over the target, so the
/// file on disk is always a complete state, never a half-written one.
/// The temporary file is cleaned up on failure (tempfile removes it
/// when the guard drops without persisting).
pub fn save(path: &Path, state: &PersistedState) -> Result<(), StateError> {
    let mut payload = serde_json::to_string_pretty(state)?;
    payload.push('\n');

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StateError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;

    let tmp = tempfile::Builder::new()
        .prefix(".prwatch-state.")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| StateError::Write {
            path: path.to_path_buf(),
            source: e,
        })?;

    fs::write(tmp.path(), &payload).map_err(|e| StateError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;

    tmp.persist(path).map_err(|e| StateError::Write {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}

/// Deterministic default state-file path for a PR identity, under the
/// OS temp directory: `prwatch-<owner>-<repo>-pr<number>.json`.
pub fn default_path(repo: &str, number: u64) -> PathBuf {
    let slug = repo.replace('/', "-");
    env::temp_dir().join(format!("prwatch-{slug}-pr{number}.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    fn state_path(dir: &TempDir) -> PathBuf {
        dir.path().join("state.json")
    }

    #[test]
    fn missing_file_yields_fresh_default() {
        let dir = TempDir::new().unwrap();
        let (state, fresh) = load(&state_path(&dir)).unwrap();

        assert!(fresh);
        assert!(state.seen_issue_comment_ids.is_empty());
        assert!(state.retries_by_sha.is_empty());
        assert!(state.started_at.is_none());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = state_path(&dir);

        let mut state = PersistedState::default();
        state.pr.repo = Some("octo/widgets".into());
        state.pr.number = Some(42);
        state.seen_review_ids.insert("900".into());
        state.record_retry("abc");

        save(&path, &state).unwrap();
        let (loaded, fresh) = load(&path).unwrap();

        assert!(!fresh);
        assert_eq!(loaded.pr.number, Some(42));
        assert!(loaded.seen_review_ids.contains("900"));
        assert_eq!(loaded.retries_used("abc"), 1);
    }

    #[test]
    fn invalid_json_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = state_path(&dir);
        fs::write(&path, "not json").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StateError::Invalid { .. }));
    }

    #[test]
    fn wrong_shape_is_fatal() {
        let dir = TempDir::new().unwrap();
        let path = state_path(&dir);
        fs::write(&path, "[1, 2, 3]").unwrap();

        let err = load(&path).unwrap_err();
        assert!(matches!(err, StateError::Invalid { .. }));
    }

    #[test]
    fn save_replaces_existing_file_atomically() {
        let dir = TempDir::new().unwrap();
        let path = state_path(&dir);

        let mut state = PersistedState::default();
        save(&path, &state).unwrap();
        state.record_retry("abc");
        save(&path, &state).unwrap();

        let (loaded, _) = load(&path).unwrap();
        assert_eq!(loaded.retries_used("abc"), 1);

        // No temp residue left beside the target.
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name() != "state.json")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn retry_counters_are_independent_per_sha() {
        let mut state = PersistedState::default();
        state.record_retry("sha_a");
        state.record_retry("sha_a");

        assert_eq!(state.retries_used("sha_a"), 2);
        assert_eq!(state.retries_used("sha_b"), 0);

        state.record_retry("sha_b");
        assert_eq!(state.retries_used("sha_a"), 2);
        assert_eq!(state.retries_used("sha_b"), 1);
    }

    #[test]
    fn default_path_is_deterministic() {
        let a = default_path("octo/widgets", 42);
        let b = default_path("octo/widgets", 42);
        assert_eq!(a, b);
        assert!(
            a.file_name()
                .unwrap()
                .to_string_lossy()
                .contains("octo-widgets-pr42")
        );
    }
}
