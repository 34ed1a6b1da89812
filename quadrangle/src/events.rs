//! Typed change feed. Every committed [`WritePlan`](crate::store::WritePlan)
//! carries the domain events describing the transition; the store publishes
//! them to subscribers instead of re-sending raw document snapshots.

use serde::{Deserialize, Serialize};

use crate::model::{Actor, ReactionChange, ReactionKind};

/// A state transition observed on the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    PostSubmitted {
        post_id: String,
        author_id: String,
    },
    PostApproved {
        post_id: String,
        author_id: String,
        moderator: Actor,
    },
    PostDeclined {
        post_id: String,
        author_id: String,
        reason: String,
        moderator: Actor,
    },
    PostHiddenChanged {
        post_id: String,
        hidden: bool,
    },
    PostArchivedChanged {
        post_id: String,
        archived: bool,
    },
    PostReported {
        post_id: String,
        author_id: String,
        reason: String,
        reporter: Actor,
    },
    ReportReviewed {
        post_id: String,
        reporter_id: String,
        moderator: Actor,
    },
    ReactionChanged {
        post_id: String,
        post_author_id: String,
        actor: Actor,
        reaction: ReactionKind,
        change: ReactionChange,
    },
    CommentAdded {
        post_id: String,
        post_author_id: String,
        comment_id: String,
        actor: Actor,
        is_anonymous: bool,
        preview: String,
    },
    CommentEdited {
        post_id: String,
        comment_id: String,
    },
    CommentDeleted {
        post_id: String,
        comment_id: String,
    },
    FriendRequestSent {
        request_id: String,
        sender: Actor,
        receiver_id: String,
    },
    FriendRequestAccepted {
        request_id: String,
        sender_id: String,
        receiver: Actor,
    },
    FriendRequestDeclined {
        request_id: String,
        sender_id: String,
    },
    FriendRequestCancelled {
        request_id: String,
    },
    Unfriended {
        user_a: String,
        user_b: String,
    },
    MessageSent {
        conversation_id: String,
        message_id: String,
        sender_id: String,
        recipient_id: String,
    },
    ConversationOpened {
        conversation_id: String,
        viewer_id: String,
    },
    FeedbackSubmitted {
        feedback_id: String,
        author_id: String,
    },
    FeedbackReplied {
        feedback_id: String,
        author_id: String,
        moderator: Actor,
    },
}
