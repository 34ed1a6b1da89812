//! Forum document model: the shapes stored in each collection, plus the
//! typed query surfaces over a [`DocumentStore`](crate::store::DocumentStore).

pub mod chat;
pub mod feedback;
pub mod friend;
pub mod notification;
pub mod post;
pub mod queries;
pub mod user;

pub use chat::{Conversation, LastMessage, Message};
pub use feedback::{AdminReply, FeedbackItem, FeedbackStatus};
pub use friend::{FriendRequest, Friendship, PartyCard, RequestStatus};
pub use notification::{ActorCard, Notification, NotificationBody};
pub use post::{Comment, ModerationStatus, Post, ReactionChange, ReactionKind};
pub use user::{Actor, Role, UserProfile};

/// Binds a model struct to its collection. Every document carries `id` and a
/// store-managed `version` field.
macro_rules! impl_document {
    ($ty:ty, $collection:literal) => {
        impl $crate::store::Document for $ty {
            const COLLECTION: &'static str = $collection;

            fn doc_id(&self) -> &str {
                &self.id
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }
        }
    };
}

pub(crate) use impl_document;

/// Derived id for documents keyed by an unordered user pair (friendships,
/// conversations). The id alphabet excludes `_`, so the join is unambiguous.
pub(crate) fn sorted_pair_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}
