//! The PR/check gateway: everything fetched from or triggered through
//! the `gh` CLI.
//!
//! Pure data source; no decisions. Each fetch maps one `gh` invocation
//! to a typed payload shape and converts it into the domain model.
//! Unlike a best-effort viewer, every failure here is fatal: a watcher
//! acting on a silently-defaulted payload would make wrong
//! recommendations, so tool failures and malformed payloads surface as
//! distinct `GatewayError`s.

use std::process::Command;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::model::{CheckEntry, PullRequest, ReviewItem, ReviewKind, WorkflowRun};

/// Errors from invoking `gh` or decoding what it returned.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("`gh` command not found; install the GitHub CLI and run `gh auth login`")]
    GhNotFound,

    #[error("GitHub CLI command failed: {cmd}\n{detail}")]
    CommandFailed { cmd: String, detail: String },

    #[error("failed to parse JSON from `{cmd}`: {source}")]
    MalformedPayload {
        cmd: String,
        source: serde_json::Error,
    },

    #[error("unexpected payload from `{cmd}`: {detail}")]
    UnexpectedPayload { cmd: String, detail: String },

    #[error("--pr must be 'auto', a PR number, or a PR URL (got '{0}')")]
    InvalidPrSpec(String),

    #[error("unable to determine OWNER/REPO for the PR; pass --repo")]
    UnknownRepo,
}

/// How the user selected the PR to watch.
#[derive(Debug, Clone)]
pub enum PrSpec {
    /// Let `gh` infer the PR from the current branch.
    Auto,
    Number(u64),
    Url(String),
}

impl PrSpec {
    /// Parse the `--pr` argument. Validated before any I/O happens.
    pub fn parse(spec: &str) -> Result<Self, GatewayError> {
        if spec == "auto" {
            return Ok(Self::Auto);
        }
        if !spec.is_empty() && spec.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = spec.parse() {
                return Ok(Self::Number(n));
            }
        }
        if (spec.starts_with("https://") || spec.starts_with("http://"))
            && spec.contains("/pull/")
        {
            return Ok(Self::Url(spec.to_string()));
        }
        Err(GatewayError::InvalidPrSpec(spec.to_string()))
    }

    /// The positional selector passed to `gh pr view`, if any.
    fn selector(&self) -> Option<String> {
        match self {
            Self::Auto => None,
            Self::Number(n) => Some(n.to_string()),
            Self::Url(url) => Some(url.clone()),
        }
    }
}

// ── gh invocation ──

fn describe(args: &[&str]) -> String {
    format!("gh {}", args.join(" "))
}

/// Run `gh` and return stdout.
///
/// `gh api` never gets `-R`: not all gh versions accept it there, and
/// the API calls use explicit `repos/{owner}/{repo}/...` endpoints.
fn gh_text(args: &[&str], repo: Option<&str>) -> Result<String, GatewayError> {
    let mut cmd = Command::new("gh");
    if let Some(repo) = repo
        && args.first() != Some(&"api")
    {
        cmd.args(["-R", repo]);
    }
    cmd.args(args);

    log::debug!("running {}", describe(args));
    let output = cmd.output().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GatewayError::GhNotFound
        } else {
            GatewayError::CommandFailed {
                cmd: describe(args),
                detail: e.to_string(),
            }
        }
    })?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut detail = String::new();
        if !stdout.trim().is_empty() {
            detail.push_str(&format!("stdout: {}\n", stdout.trim()));
        }
        if !stderr.trim().is_empty() {
            detail.push_str(&format!("stderr: {}", stderr.trim()));
        }
        return Err(GatewayError::CommandFailed {
            cmd: describe(args),
            detail: detail.trim_end().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run `gh` and decode its stdout as JSON. Empty output yields `None`.
fn gh_json<T: DeserializeOwned>(args: &[&str], repo: Option<&str>) -> Result<Option<T>, GatewayError> {
    let raw = gh_text(args, repo)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(raw)
        .map(Some)
        .map_err(|e| GatewayError::MalformedPayload {
            cmd: describe(args),
            source: e,
        })
}

// ── Pull request resolution ──

const PR_VIEW_FIELDS: &str = "number,url,state,mergedAt,closedAt,headRefName,headRefOid,\
                              headRepository,headRepositoryOwner,mergeable,mergeStateStatus,reviewDecision";

/// JSON shape returned by `gh pr view --json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GhPrView {
    number: u64,
    url: Option<String>,
    state: Option<String>,
    merged_at: Option<String>,
    closed_at: Option<String>,
    head_ref_name: Option<String>,
    head_ref_oid: Option<String>,
    head_repository: Option<GhRepoRef>,
    head_repository_owner: Option<GhOwnerRef>,
    mergeable: Option<String>,
    merge_state_status: Option<String>,
    review_decision: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhRepoRef {
    name: Option<String>,
    owner: Option<GhOwnerRef>,
}

#[derive(Debug, Deserialize)]
struct GhOwnerRef {
    login: Option<String>,
    name: Option<String>,
}

/// Resolve the PR selection to a full [`PullRequest`] record.
pub fn resolve_pr(spec: &PrSpec, repo_override: Option<&str>) -> Result<PullRequest, GatewayError> {
    let selector = spec.selector();
    let mut args = vec!["pr", "view"];
    if let Some(sel) = selector.as_deref() {
        args.push(sel);
    }
    args.extend(["--json", PR_VIEW_FIELDS]);

    let cmd = describe(&args);
    let view: GhPrView = gh_json(&args, repo_override)?.ok_or(GatewayError::UnexpectedPayload {
        cmd,
        detail: "empty PR payload".into(),
    })?;
    pr_from_view(view, repo_override)
}

fn pr_from_view(view: GhPrView, repo_override: Option<&str>) -> Result<PullRequest, GatewayError> {
    let url = view.url.unwrap_or_default();
    let repo = repo_override
        .map(str::to_string)
        .or_else(|| repo_from_pr_url(&url))
        .or_else(|| repo_from_head_fields(view.head_repository.as_ref(), view.head_repository_owner.as_ref()))
        .ok_or(GatewayError::UnknownRepo)?;

    let state = view.state.unwrap_or_default();
    let merged = view.merged_at.is_some_and(|t| !t.is_empty());
    let closed = view.closed_at.is_some_and(|t| !t.is_empty()) || state.eq_ignore_ascii_case("CLOSED");

    Ok(PullRequest {
        number: view.number,
        url,
        repo,
        head_sha: view.head_ref_oid.unwrap_or_default(),
        head_branch: view.head_ref_name.unwrap_or_default(),
        state,
        merged,
        closed,
        mergeable: view.mergeable.unwrap_or_default(),
        merge_state_status: view.merge_state_status.unwrap_or_default(),
        review_decision: view.review_decision.unwrap_or_default(),
    })
}

/// Extract `OWNER/REPO` from a PR URL path (`/owner/repo/pull/N`).
fn repo_from_pr_url(url: &str) -> Option<String> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))?;
    let mut parts = rest.split('/').filter(|p| !p.is_empty());
    let _host = parts.next()?;
    let owner = parts.next()?;
    let repo = parts.next()?;
    (parts.next()? == "pull").then(|| format!("{owner}/{repo}"))
}

/// Fall back to the head-repository fields when the URL gave nothing.
fn repo_from_head_fields(repo: Option<&GhRepoRef>, owner: Option<&GhOwnerRef>) -> Option<String> {
    let name = repo?.name.clone()?;
    let owner_login = owner
        .and_then(|o| o.login.clone().or_else(|| o.name.clone()))
        .or_else(|| {
            repo?
                .owner
                .as_ref()
                .and_then(|o| o.login.clone().or_else(|| o.name.clone()))
        })?;
    Some(format!("{owner_login}/{name}"))
}

// ── Checks ──

/// JSON shape for `gh pr checks --json`.
#[derive(Debug, Deserialize)]
struct GhCheck {
    name: Option<String>,
    state: Option<String>,
    bucket: Option<String>,
    link: Option<String>,
}

/// List CI checks for the PR.
///
/// `gh pr checks -R <repo>` requires an explicit selector, so callers
/// pass the concrete PR number even when `--pr auto` was given.
pub fn list_checks(number: u64, repo: &str) -> Result<Vec<CheckEntry>, GatewayError> {
    let num = number.to_string();
    let args = ["pr", "checks", &num, "--json", "name,state,bucket,link"];
    let checks: Vec<GhCheck> = gh_json(&args, Some(repo))?.unwrap_or_default();

    Ok(checks
        .into_iter()
        .map(|c| CheckEntry {
            name: c.name.unwrap_or_default(),
            bucket: c.bucket.unwrap_or_default(),
            state: c.state.unwrap_or_default(),
            url: c.link.unwrap_or_default(),
        })
        .collect())
}

// ── Workflow runs ──

/// JSON shape for the actions runs API.
#[derive(Debug, Deserialize)]
struct GhRunsPayload {
    workflow_runs: Option<Vec<GhWorkflowRun>>,
}

#[derive(Debug, Deserialize)]
struct GhWorkflowRun {
    id: Option<u64>,
    name: Option<String>,
    display_title: Option<String>,
    status: Option<String>,
    conclusion: Option<String>,
    head_sha: Option<String>,
    html_url: Option<String>,
}

/// List workflow runs recorded for a head commit.
pub fn list_workflow_runs(repo: &str, head_sha: &str) -> Result<Vec<WorkflowRun>, GatewayError> {
    let endpoint = format!("repos/{repo}/actions/runs");
    let head_filter = format!("head_sha={head_sha}");
    let args = [
        "api",
        endpoint.as_str(),
        "-X",
        "GET",
        "-f",
        head_filter.as_str(),
        "-f",
        "per_page=100",
    ];
    let cmd = describe(&args);
    let payload: GhRunsPayload = gh_json(&args, Some(repo))?.ok_or(GatewayError::UnexpectedPayload {
        cmd,
        detail: "empty actions runs payload".into(),
    })?;

    Ok(payload
        .workflow_runs
        .unwrap_or_default()
        .into_iter()
        .map(|run| WorkflowRun {
            id: run.id,
            workflow_name: run.name.or(run.display_title).unwrap_or_default(),
            status: run.status.unwrap_or_default(),
            conclusion: run.conclusion.unwrap_or_default(),
            head_sha: run.head_sha.unwrap_or_default(),
            html_url: run.html_url.unwrap_or_default(),
        })
        .collect())
}

// ── Review feedback ──

#[derive(Debug, Deserialize)]
struct GhUser {
    login: Option<String>,
}

/// JSON shape shared by the REST comment endpoints.
#[derive(Debug, Deserialize)]
struct GhFeedbackItem {
    id: Option<u64>,
    user: Option<GhUser>,
    author_association: Option<String>,
    created_at: Option<String>,
    submitted_at: Option<String>,
    body: Option<String>,
    path: Option<String>,
    line: Option<u64>,
    original_line: Option<u64>,
    html_url: Option<String>,
}

impl GhFeedbackItem {
    fn into_review_item(self, kind: ReviewKind) -> ReviewItem {
        // Formal reviews carry submitted_at; the comment kinds carry
        // created_at. Inline comments on outdated diffs report only
        // original_line.
        let created_at = match kind {
            ReviewKind::Review => self.submitted_at.or(self.created_at),
            _ => self.created_at,
        };
        let (path, line) = match kind {
            ReviewKind::ReviewComment => (self.path, self.line.or(self.original_line)),
            _ => (None, None),
        };
        ReviewItem {
            kind,
            id: self.id.map(|id| id.to_string()).unwrap_or_default(),
            author: self
                .user
                .and_then(|u| u.login)
                .unwrap_or_default(),
            author_association: self.author_association.unwrap_or_default(),
            created_at: created_at.unwrap_or_default(),
            body: self.body.unwrap_or_default(),
            path,
            line,
            url: self.html_url.unwrap_or_default(),
        }
    }
}

/// Fetch one REST list endpoint page by page until a short page.
fn api_list_paginated<T: DeserializeOwned>(endpoint: &str) -> Result<Vec<T>, GatewayError> {
    const PER_PAGE: usize = 100;
    let mut items = Vec::new();
    let mut page = 1;
    loop {
        let page_endpoint = format!("{endpoint}?per_page={PER_PAGE}&page={page}");
        let args = ["api", page_endpoint.as_str()];
        let Some(payload) = gh_json::<Vec<T>>(&args, None)? else {
            break;
        };
        let len = payload.len();
        items.extend(payload);
        if len < PER_PAGE {
            break;
        }
        page += 1;
    }
    Ok(items)
}

/// Fetch all three feedback feeds for a PR, normalized into one list.
pub fn list_review_items(repo: &str, number: u64) -> Result<Vec<ReviewItem>, GatewayError> {
    let feeds = [
        (
            ReviewKind::IssueComment,
            format!("repos/{repo}/issues/{number}/comments"),
        ),
        (
            ReviewKind::ReviewComment,
            format!("repos/{repo}/pulls/{number}/comments"),
        ),
        (
            ReviewKind::Review,
            format!("repos/{repo}/pulls/{number}/reviews"),
        ),
    ];

    let mut items = Vec::new();
    for (kind, endpoint) in feeds {
        let raw: Vec<GhFeedbackItem> = api_list_paginated(&endpoint)?;
        items.extend(raw.into_iter().map(|r| r.into_review_item(kind)));
    }
    Ok(items)
}

// ── Actor and reruns ──

/// The authenticated actor's login, used by the trust filter.
pub fn authenticated_login() -> Result<String, GatewayError> {
    let args = ["api", "user"];
    let cmd = describe(&args);
    let user: GhUser = gh_json(&args, None)?.ok_or(GatewayError::UnexpectedPayload {
        cmd: cmd.clone(),
        detail: "empty user payload".into(),
    })?;
    user.login
        .filter(|l| !l.is_empty())
        .ok_or(GatewayError::UnexpectedPayload {
            cmd,
            detail: "no login in user payload".into(),
        })
}

/// Rerun the failed jobs of one workflow run.
pub fn rerun_failed_jobs(repo: &str, run_id: u64) -> Result<(), GatewayError> {
    let id = run_id.to_string();
    gh_text(&["run", "rerun", &id, "--failed"], Some(repo))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pr_spec_parses_auto_number_and_url() {
        assert!(matches!(PrSpec::parse("auto").unwrap(), PrSpec::Auto));
        assert!(matches!(PrSpec::parse("42").unwrap(), PrSpec::Number(42)));
        assert!(matches!(
            PrSpec::parse("https://github.com/octo/widgets/pull/42").unwrap(),
            PrSpec::Url(_)
        ));
    }

    #[test]
    fn pr_spec_rejects_garbage() {
        for bad in ["", "forty-two", "https://github.com/octo/widgets", "4 2"] {
            assert!(
                matches!(PrSpec::parse(bad), Err(GatewayError::InvalidPrSpec(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn repo_extracted_from_pr_url() {
        assert_eq!(
            repo_from_pr_url("https://github.com/octo/widgets/pull/42"),
            Some("octo/widgets".into())
        );
        assert_eq!(repo_from_pr_url("https://github.com/octo/widgets"), None);
        assert_eq!(repo_from_pr_url("not a url"), None);
    }

    #[test]
    fn pr_view_decodes_and_derives_lifecycle() {
        let view: GhPrView = serde_json::from_str(
            r#"{
                "number": 42,
                "url": "https://github.com/octo/widgets/pull/42",
                "state": "OPEN",
                "mergedAt": null,
                "closedAt": null,
                "headRefName": "fix-widget",
                "headRefOid": "abc123",
                "mergeable": "MERGEABLE",
                "mergeStateStatus": "CLEAN",
                "reviewDecision": ""
            }"#,
        )
        .unwrap();
        let pr = pr_from_view(view, None).unwrap();
        assert_eq!(pr.repo, "octo/widgets");
        assert_eq!(pr.head_sha, "abc123");
        assert!(!pr.closed);
        assert!(!pr.merged);
    }

    #[test]
    fn merged_at_marks_pr_merged() {
        let view: GhPrView = serde_json::from_str(
            r#"{"number": 1, "state": "MERGED", "mergedAt": "2026-08-20T10:00:00Z"}"#,
        )
        .unwrap();
        let pr = pr_from_view(view, Some("octo/widgets")).unwrap();
        assert!(pr.merged);
    }

    #[test]
    fn closed_state_marks_pr_closed_without_timestamp() {
        let view: GhPrView =
            serde_json::from_str(r#"{"number": 1, "state": "CLOSED"}"#).unwrap();
        let pr = pr_from_view(view, Some("octo/widgets")).unwrap();
        assert!(pr.closed);
    }

    #[test]
    fn repo_falls_back_to_head_fields() {
        let view: GhPrView = serde_json::from_str(
            r#"{
                "number": 1,
                "state": "OPEN",
                "headRepository": {"name": "widgets"},
                "headRepositoryOwner": {"login": "octo"}
            }"#,
        )
        .unwrap();
        let pr = pr_from_view(view, None).unwrap();
        assert_eq!(pr.repo, "octo/widgets");
    }

    #[test]
    fn unresolvable_repo_is_an_error() {
        let view: GhPrView = serde_json::from_str(r#"{"number": 1, "state": "OPEN"}"#).unwrap();
        assert!(matches!(
            pr_from_view(view, None),
            Err(GatewayError::UnknownRepo)
        ));
    }

    #[test]
    fn feedback_item_normalizes_review_timestamps_and_lines() {
        let raw: GhFeedbackItem = serde_json::from_str(
            r#"{
                "id": 900,
                "user": {"login": "alice"},
                "author_association": "MEMBER",
                "submitted_at": "2026-08-20T10:00:00Z",
                "body": "LGTM"
            }"#,
        )
        .unwrap();
        let item = raw.into_review_item(ReviewKind::Review);
        assert_eq!(item.id, "900");
        assert_eq!(item.created_at, "2026-08-20T10:00:00Z");
        assert_eq!(item.path, None);

        let raw: GhFeedbackItem = serde_json::from_str(
            r#"{
                "id": 901,
                "user": {"login": "alice"},
                "created_at": "2026-08-20T11:00:00Z",
                "path": "src/widget.rs",
                "original_line": 12,
                "body": "off by one"
            }"#,
        )
        .unwrap();
        let item = raw.into_review_item(ReviewKind::ReviewComment);
        assert_eq!(item.path.as_deref(), Some("src/widget.rs"));
        assert_eq!(item.line, Some(12));
    }
}
