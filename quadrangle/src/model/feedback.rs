use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feedback triage status. One canonical snake_case taxonomy; the store never
/// sees mixed-case variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    #[default]
    Pending,
    Reviewed,
    InProgress,
    Resolved,
}

/// An admin's reply, denormalized onto the feedback item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminReply {
    pub message: String,
    pub replied_at: DateTime<Utc>,
    pub replied_by: String,
}

/// A feedback submission from a community member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackItem {
    pub id: String,
    pub user_id: String,
    pub category: String,
    pub message: String,
    #[serde(default)]
    pub status: FeedbackStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_reply: Option<AdminReply>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl FeedbackItem {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            user_id: user_id.into(),
            category: category.into(),
            message: message.into(),
            status: FeedbackStatus::Pending,
            admin_reply: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

super::impl_document!(FeedbackItem, "feedback");
