//! Reactions and comments. All interaction writes target approved posts and
//! keep the denormalized counters derived from source-of-truth collections
//! within the same commit.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::{
    errors::ForumError,
    events::DomainEvent,
    model::{Actor, Comment, ModerationStatus, Post, ReactionChange, ReactionKind},
    service::dispatch::NotificationDispatcher,
    store::{DocumentStore, DocumentStoreExt, MAX_WRITE_ATTEMPTS, WritePlan},
};

/// Comment preview length carried in notifications.
const PREVIEW_CHARS: usize = 80;

pub struct InteractionService<S> {
    store: S,
    dispatcher: Arc<NotificationDispatcher>,
}

impl<S: DocumentStore> InteractionService<S> {
    pub fn new(store: S, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Toggle the actor's reaction on a post: absent sets it, the same kind
    /// removes it, a different kind replaces it. The like counter is
    /// recomputed from the reaction map in the same write.
    pub async fn toggle_reaction(
        &self,
        actor: &Actor,
        post_id: &str,
        kind: ReactionKind,
    ) -> Result<(Post, ReactionChange), ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut post: Post = self.store.require(post_id).await?;
            if post.status != ModerationStatus::Approved {
                return Err(ForumError::invariant("post is not open for interaction"));
            }

            let change = post.apply_reaction(&actor.id, kind);
            post.updated_at = Utc::now();

            let event = DomainEvent::ReactionChanged {
                post_id: post.id.clone(),
                post_author_id: post.author_id.clone(),
                actor: actor.clone(),
                reaction: kind,
                change,
            };
            let mut plan = WritePlan::new();
            plan.update(&post)?;
            let notification = self.dispatcher.derive(&event);
            if let Some(n) = &notification {
                plan.create(n)?;
            }
            plan.emit(event);

            match self.store.commit(plan).await {
                Ok(receipts) => {
                    if let Some(n) = &notification {
                        self.dispatcher.confirm(n);
                    }
                    if let Some(receipt) = receipts.first() {
                        post.version = receipt.version;
                    }
                    return Ok((post, change));
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying toggle_reaction after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Append a comment. The id comes from the post-local sequence, so two
    /// concurrent commenters can never collide (the loser's version guard
    /// fails and it retries against the fresh sequence).
    pub async fn add_comment(
        &self,
        actor: &Actor,
        post_id: &str,
        content: &str,
        is_anonymous: bool,
    ) -> Result<Comment, ForumError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ForumError::validation("comment cannot be empty"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut post: Post = self.store.require(post_id).await?;
            if post.status != ModerationStatus::Approved {
                return Err(ForumError::invariant("post is not open for interaction"));
            }

            let comment = Comment {
                id: post.next_comment_id(),
                author_id: actor.id.clone(),
                content: content.to_string(),
                is_anonymous,
                created_at: Utc::now(),
                edited_at: None,
            };
            post.comments.push(comment.clone());
            post.updated_at = Utc::now();

            let event = DomainEvent::CommentAdded {
                post_id: post.id.clone(),
                post_author_id: post.author_id.clone(),
                comment_id: comment.id.clone(),
                actor: actor.clone(),
                is_anonymous,
                preview: preview_of(content),
            };
            let mut plan = WritePlan::new();
            plan.update(&post)?;
            let notification = self.dispatcher.derive(&event);
            if let Some(n) = &notification {
                plan.create(n)?;
            }
            plan.emit(event);

            match self.store.commit(plan).await {
                Ok(_) => {
                    if let Some(n) = &notification {
                        self.dispatcher.confirm(n);
                    }
                    return Ok(comment);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying add_comment after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Edit one's own comment in place; the edit timestamp marks it.
    pub async fn edit_comment(
        &self,
        actor: &Actor,
        post_id: &str,
        comment_id: &str,
        content: &str,
    ) -> Result<Comment, ForumError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ForumError::validation("comment cannot be empty"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut post: Post = self.store.require(post_id).await?;
            if post.status != ModerationStatus::Approved {
                return Err(ForumError::invariant("post is not open for interaction"));
            }
            let comment = post
                .comment_mut(comment_id)
                .ok_or_else(|| ForumError::not_found(comment_id))?;
            if comment.author_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the comment author may edit it",
                ));
            }
            comment.content = content.to_string();
            comment.edited_at = Some(Utc::now());
            let edited = comment.clone();
            post.updated_at = Utc::now();

            let mut plan = WritePlan::new();
            plan.update(&post)?;
            plan.emit(DomainEvent::CommentEdited {
                post_id: post.id.clone(),
                comment_id: comment_id.to_string(),
            });

            match self.store.commit(plan).await {
                Ok(_) => return Ok(edited),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying edit_comment after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Remove one's own comment. The derived comment count shrinks with it;
    /// the sequence never goes backwards, so ids are not reused.
    pub async fn delete_comment(&self, actor: &Actor, post_id: &str, comment_id: &str) -> Result<(), ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut post: Post = self.store.require(post_id).await?;
            if post.status != ModerationStatus::Approved {
                return Err(ForumError::invariant("post is not open for interaction"));
            }
            let comment = post
                .comment(comment_id)
                .ok_or_else(|| ForumError::not_found(comment_id))?;
            if comment.author_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the comment author may delete it",
                ));
            }
            post.comments.retain(|c| c.id != comment_id);
            post.updated_at = Utc::now();

            let mut plan = WritePlan::new();
            plan.update(&post)?;
            plan.emit(DomainEvent::CommentDeleted {
                post_id: post.id.clone(),
                comment_id: comment_id.to_string(),
            });

            match self.store.commit(plan).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying delete_comment after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn preview_of(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(PREVIEW_CHARS).collect();
    format!("{cut}…")
}
