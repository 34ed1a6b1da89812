use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation lifecycle of a post. `Reviewed` marks a reported post an admin
/// has looked at; it is retained for store compatibility and does not affect
/// feed visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationStatus {
    Pending,
    Approved,
    Declined,
    Reviewed,
}

/// Reaction kinds. A user holds at most one reaction per post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Love,
    Laugh,
    Sad,
    Angry,
}

/// Outcome of a reaction toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionChange {
    /// No prior reaction; the kind was set.
    Set,
    /// A different kind was replaced. Not a net add.
    Replaced,
    /// The same kind was toggled off.
    Removed,
}

/// A comment owned by its parent post. Ids are assigned from the post-local
/// monotonic sequence, never from wall-clock or client randomness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub content: String,
    #[serde(default)]
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_edited(&self) -> bool {
        self.edited_at.is_some()
    }
}

/// A community post with its denormalized interaction state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub status: ModerationStatus,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub archived: bool,
    /// Single-valued reaction edge per user.
    #[serde(default)]
    pub reactions: BTreeMap<String, ReactionKind>,
    /// Insertion order is chronological order.
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Post-local monotonic comment id sequence.
    #[serde(default)]
    pub comment_seq: u64,
    /// Denormalized count, kept equal to `reactions.len()` on every write.
    #[serde(default)]
    pub likes: u64,
    /// Decline reason; present iff `status == Declined`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moderated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Post {
    pub fn new(id: impl Into<String>, author_id: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            author_id: author_id.into(),
            content: content.into(),
            status: ModerationStatus::Pending,
            hidden: false,
            archived: false,
            reactions: BTreeMap::new(),
            comments: Vec::new(),
            comment_seq: 0,
            likes: 0,
            feedback: None,
            moderated_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Visible in public feeds iff approved, not hidden, not archived.
    pub fn is_public(&self) -> bool {
        self.status == ModerationStatus::Approved && !self.hidden && !self.archived
    }

    /// Derived count; there is no separately stored comment counter to drift.
    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn comment(&self, comment_id: &str) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == comment_id)
    }

    pub fn comment_mut(&mut self, comment_id: &str) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|c| c.id == comment_id)
    }

    /// Toggle semantics: absent sets, same kind removes, different kind
    /// replaces. `likes` is recomputed from the reaction map, never
    /// incremented, so a replace is not a net add.
    pub fn apply_reaction(&mut self, user_id: &str, kind: ReactionKind) -> ReactionChange {
        let change = match self.reactions.get(user_id) {
            Some(existing) if *existing == kind => {
                self.reactions.remove(user_id);
                ReactionChange::Removed
            }
            Some(_) => {
                self.reactions.insert(user_id.to_string(), kind);
                ReactionChange::Replaced
            }
            None => {
                self.reactions.insert(user_id.to_string(), kind);
                ReactionChange::Set
            }
        };
        self.recount_likes();
        change
    }

    pub fn recount_likes(&mut self) {
        self.likes = self.reactions.len() as u64;
    }

    /// Next server-assigned comment id from the post-local sequence.
    pub fn next_comment_id(&mut self) -> String {
        self.comment_seq += 1;
        format!("c{}", self.comment_seq)
    }
}

super::impl_document!(Post, "posts");
