//! Review-item filtering: trust, dedup, and chronological ordering.

use crate::model::ReviewItem;
use crate::state::PersistedState;

use super::{REVIEW_AGENT_LOGIN_KEYWORDS, TRUSTED_AUTHOR_ASSOCIATIONS};

/// GitHub automation accounts carry this login suffix.
const BOT_LOGIN_SUFFIX: &str = "[bot]";

fn is_bot_login(login: &str) -> bool {
    !login.is_empty() && login.ends_with(BOT_LOGIN_SUFFIX)
}

/// Only specific review-automation identities are actionable; every
/// other bot (CI annotators, dependency updaters, ...) is noise.
fn is_actionable_review_bot(login: &str) -> bool {
    if !is_bot_login(login) {
        return false;
    }
    let lower = login.to_ascii_lowercase();
    REVIEW_AGENT_LOGIN_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// A human author is trusted when they are the authenticated caller
/// themselves or hold a trusted repository association.
fn is_trusted_human(item: &ReviewItem, own_login: &str) -> bool {
    if !own_login.is_empty() && item.author == own_login {
        return true;
    }
    let association = item.author_association.to_ascii_uppercase();
    TRUSTED_AUTHOR_ASSOCIATIONS.contains(&association.as_str())
}

fn already_seen(state: &PersistedState, item: &ReviewItem) -> bool {
    use crate::model::ReviewKind::{IssueComment, Review, ReviewComment};
    match item.kind {
        IssueComment => state.seen_issue_comment_ids.contains(&item.id),
        ReviewComment => state.seen_review_comment_ids.contains(&item.id),
        Review => state.seen_review_ids.contains(&item.id),
    }
}

fn mark_seen(state: &mut PersistedState, item: &ReviewItem) {
    use crate::model::ReviewKind::{IssueComment, Review, ReviewComment};
    let set = match item.kind {
        IssueComment => &mut state.seen_issue_comment_ids,
        ReviewComment => &mut state.seen_review_comment_ids,
        Review => &mut state.seen_review_ids,
    };
    set.insert(item.id.clone());
}

/// Reduce the full feedback feed to the new, trusted items.
///
/// Items without an id or author are dropped (no identity to dedup on,
/// no author to trust-evaluate). Kept items are marked seen immediately,
/// so a crash between this call and persistence re-surfaces an item at
/// most once. The result is sorted by (created_at, kind, id) for a
/// deterministic chronological feed.
pub fn new_review_items(
    items: Vec<ReviewItem>,
    state: &mut PersistedState,
    own_login: &str,
) -> Vec<ReviewItem> {
    let mut new_items = Vec::new();

    for item in items {
        if item.id.is_empty() || item.author.is_empty() {
            continue;
        }
        if is_bot_login(&item.author) {
            if !is_actionable_review_bot(&item.author) {
                continue;
            }
        } else if !is_trusted_human(&item, own_login) {
            continue;
        }
        if already_seen(state, &item) {
            continue;
        }
        mark_seen(state, &item);
        new_items.push(item);
    }

    new_items.sort_by(|a, b| {
        (a.created_at.as_str(), a.kind, a.id.as_str())
            .cmp(&(b.created_at.as_str(), b.kind, b.id.as_str()))
    });
    new_items
}
