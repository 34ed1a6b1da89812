use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::post::ReactionKind;
use super::user::Actor;

/// Actor display data denormalized into a notification at creation time, so
/// rendering never needs a further join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorCard {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ActorCard {
    /// Masked card for anonymous interactions. Carries no identity.
    pub fn anonymous() -> Self {
        Self {
            id: String::new(),
            name: "Anonymous".to_string(),
            avatar_url: None,
        }
    }
}

impl From<&Actor> for ActorCard {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id.clone(),
            name: actor.name.clone(),
            avatar_url: actor.avatar_url.clone(),
        }
    }
}

/// Type-specific notification payload, discriminated by the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationBody {
    Reaction {
        post_id: String,
        actor: ActorCard,
        kind: ReactionKind,
    },
    Comment {
        post_id: String,
        comment_id: String,
        actor: ActorCard,
        preview: String,
    },
    FriendRequest {
        request_id: String,
        actor: ActorCard,
    },
    FriendAccepted {
        actor: ActorCard,
    },
    PostApproved {
        post_id: String,
    },
    PostViolation {
        post_id: String,
        reason: String,
    },
    PostReported {
        post_id: String,
        reason: String,
        actor: ActorCard,
    },
    ReportReviewed {
        post_id: String,
    },
    AdminReply {
        feedback_id: String,
        actor: ActorCard,
    },
}

impl NotificationBody {
    /// Stable discriminant string, matching the stored `type` field.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Reaction { .. } => "reaction",
            Self::Comment { .. } => "comment",
            Self::FriendRequest { .. } => "friend_request",
            Self::FriendAccepted { .. } => "friend_accepted",
            Self::PostApproved { .. } => "post_approved",
            Self::PostViolation { .. } => "post_violation",
            Self::PostReported { .. } => "post_reported",
            Self::ReportReviewed { .. } => "report_reviewed",
            Self::AdminReply { .. } => "admin_reply",
        }
    }

    fn actor_id(&self) -> &str {
        match self {
            Self::Reaction { actor, .. }
            | Self::Comment { actor, .. }
            | Self::FriendRequest { actor, .. }
            | Self::FriendAccepted { actor }
            | Self::PostReported { actor, .. }
            | Self::AdminReply { actor, .. } => &actor.id,
            Self::PostApproved { .. } | Self::PostViolation { .. } | Self::ReportReviewed { .. } => "",
        }
    }

    fn subject_id(&self) -> &str {
        match self {
            Self::Reaction { post_id, .. }
            | Self::Comment { post_id, .. }
            | Self::PostApproved { post_id }
            | Self::PostViolation { post_id, .. }
            | Self::PostReported { post_id, .. }
            | Self::ReportReviewed { post_id } => post_id,
            Self::FriendRequest { request_id, .. } => request_id,
            Self::FriendAccepted { .. } => "",
            Self::AdminReply { feedback_id, .. } => feedback_id,
        }
    }
}

/// A notification addressed to one user. Created by the dispatcher only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub body: NotificationBody,
    #[serde(default)]
    pub version: u64,
}

impl Notification {
    pub fn new(id: impl Into<String>, user_id: impl Into<String>, body: NotificationBody) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            read: false,
            created_at: Utc::now(),
            body,
            version: 0,
        }
    }

    /// Coalescing key for the dispatcher's dedupe window:
    /// `(type, actor, target, subject)`.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.body.type_name(),
            self.body.actor_id(),
            self.user_id,
            self.body.subject_id()
        )
    }
}

super::impl_document!(Notification, "notifications");
