//! Typed per-collection query helpers over any [`DocumentStore`]. These are
//! the read surfaces the view layer binds its live result sets to.

use crate::errors::ForumError;
use crate::store::{DocumentStore, DocumentStoreExt};

use super::{
    Conversation, FeedbackItem, FeedbackStatus, FriendRequest, Friendship, Message, ModerationStatus, Notification,
    Post, Role, UserProfile,
};

pub mod posts {
    use super::*;

    /// Approved, unhidden, unarchived posts, newest first.
    pub async fn public_feed<S: DocumentStore>(store: &S) -> Result<Vec<Post>, ForumError> {
        let mut posts = store.find_where(Post::is_public).await?;
        posts.sort_by(|a: &Post, b: &Post| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    /// A user's own posts; archived ones only when asked for.
    pub async fn by_author<S: DocumentStore>(
        store: &S,
        author_id: &str,
        include_archived: bool,
    ) -> Result<Vec<Post>, ForumError> {
        let mut posts = store
            .find_where(|p: &Post| p.author_id == author_id && (include_archived || !p.archived))
            .await?;
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts)
    }

    /// Moderation queue, oldest first.
    pub async fn pending_review<S: DocumentStore>(store: &S) -> Result<Vec<Post>, ForumError> {
        let mut posts = store
            .find_where(|p: &Post| p.status == ModerationStatus::Pending)
            .await?;
        posts.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(posts)
    }
}

pub mod users {
    use super::*;

    pub async fn admins<S: DocumentStore>(store: &S) -> Result<Vec<UserProfile>, ForumError> {
        store.find_where(|u: &UserProfile| u.role == Role::Admin).await
    }
}

pub mod friend_requests {
    use super::*;

    pub async fn pending_for<S: DocumentStore>(
        store: &S,
        receiver_id: &str,
    ) -> Result<Vec<FriendRequest>, ForumError> {
        store
            .find_where(|r: &FriendRequest| r.receiver_id == receiver_id && r.is_pending())
            .await
    }

    pub async fn outgoing_from<S: DocumentStore>(
        store: &S,
        sender_id: &str,
    ) -> Result<Vec<FriendRequest>, ForumError> {
        store
            .find_where(|r: &FriendRequest| r.sender_id == sender_id && r.is_pending())
            .await
    }
}

pub mod friendships {
    use super::*;

    pub async fn of_user<S: DocumentStore>(store: &S, user_id: &str) -> Result<Vec<Friendship>, ForumError> {
        store.find_where(|f: &Friendship| f.involves(user_id)).await
    }
}

pub mod conversations {
    use super::*;

    /// A user's conversations, most recently touched first.
    pub async fn for_user<S: DocumentStore>(store: &S, user_id: &str) -> Result<Vec<Conversation>, ForumError> {
        let mut convos = store.find_where(|c: &Conversation| c.involves(user_id)).await?;
        convos.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(convos)
    }
}

pub mod messages {
    use super::*;

    /// Messages of one conversation in chronological order.
    pub async fn in_conversation<S: DocumentStore>(
        store: &S,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ForumError> {
        let mut msgs = store
            .find_where(|m: &Message| m.conversation_id == conversation_id)
            .await?;
        msgs.sort_by(|a, b| a.sent_at.cmp(&b.sent_at));
        Ok(msgs)
    }
}

pub mod notifications {
    use super::*;

    pub async fn unread_for<S: DocumentStore>(store: &S, user_id: &str) -> Result<Vec<Notification>, ForumError> {
        let mut items = store
            .find_where(|n: &Notification| n.user_id == user_id && !n.read)
            .await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    pub async fn all_for<S: DocumentStore>(store: &S, user_id: &str) -> Result<Vec<Notification>, ForumError> {
        let mut items = store.find_where(|n: &Notification| n.user_id == user_id).await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

pub mod feedback {
    use super::*;

    pub async fn by_status<S: DocumentStore>(
        store: &S,
        status: FeedbackStatus,
    ) -> Result<Vec<FeedbackItem>, ForumError> {
        store.find_where(|f: &FeedbackItem| f.status == status).await
    }

    pub async fn by_author<S: DocumentStore>(store: &S, user_id: &str) -> Result<Vec<FeedbackItem>, ForumError> {
        let mut items = store.find_where(|f: &FeedbackItem| f.user_id == user_id).await?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}
