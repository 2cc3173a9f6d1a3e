//! Unified review feedback items.
//!
//! GitHub exposes PR feedback through three separate APIs: top-level
//! issue comments, inline review comments, and formal review
//! submissions. The watcher folds all three into one tagged record so
//! downstream logic can treat "new feedback" uniformly.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which feedback API an item came from.
///
/// Provider ids are only unique within a kind, so item identity is
/// always the `(kind, id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    IssueComment,
    ReviewComment,
    Review,
}

impl ReviewKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IssueComment => "issue_comment",
            Self::ReviewComment => "review_comment",
            Self::Review => "review",
        }
    }
}

impl fmt::Display for ReviewKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One piece of review feedback, normalized across the three kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub kind: ReviewKind,

    /// Provider id, unique within `kind`.
    pub id: String,
    pub author: String,

    /// Raw association string (`OWNER`, `MEMBER`, `NONE`, ...).
    pub author_association: String,

    /// Provider-formatted RFC 3339 timestamp. Kept as a string: it is
    /// only compared lexically for chronological ordering.
    pub created_at: String,
    pub body: String,

    /// File path and line, present only for inline review comments.
    pub path: Option<String>,
    pub line: Option<u64>,
    pub url: String,
}
