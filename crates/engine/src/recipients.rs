//! Recipient resolution for new comments and replies.
//!
//! Given the new comment, its parent (if any) and the record owner, compute
//! who is told about it and in which role:
//! 1. Top-level comment → the record owner (`Comment`).
//! 2. Reply → the parent's author (`ReComment`), then the record owner
//!    (`RecordReComment`), then everyone who replied to any ancestor of the
//!    reply up to the root (`ReComment`).
//!
//! The acting author is never a recipient, and each member appears once. When
//! a member qualifies for several roles the first one assigned wins.

use std::collections::BTreeMap;

use uuid::Uuid;

use walwal_common::types::{CommentNode, RecipientRole};

use crate::comments::CommentTree;

/// Member id → role. Ordered so iteration is stable across runs.
pub type Recipients = BTreeMap<Uuid, RecipientRole>;

/// Resolve the audience for `comment`.
///
/// `parent` must be `Some` exactly when `comment.parent_id` is `Some`; the
/// caller resolves it (and reports a missing parent) before calling.
pub fn resolve_comment_recipients(
    tree: &CommentTree,
    comment: &CommentNode,
    parent: Option<&CommentNode>,
    record_owner: Uuid,
) -> Recipients {
    let author = comment.author_id;
    let mut recipients = Recipients::new();

    let Some(parent) = parent else {
        if record_owner != author {
            recipients.insert(record_owner, RecipientRole::Comment);
        }
        return recipients;
    };

    let mut assign = |member: Uuid, role: RecipientRole| {
        if member != author {
            recipients.entry(member).or_insert(role);
        }
    };

    assign(parent.author_id, RecipientRole::ReComment);
    assign(record_owner, RecipientRole::RecordReComment);

    for ancestor in tree.path_to_root(parent.id) {
        for reply in tree.children(ancestor.id) {
            assign(reply.author_id, RecipientRole::ReComment);
        }
    }

    recipients
}
