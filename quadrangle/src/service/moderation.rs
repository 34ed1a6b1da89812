//! Post moderation state machine: submission, the admin approve/decline
//! verdicts, author visibility toggles, and the report flow.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};

use crate::{
    errors::ForumError,
    events::DomainEvent,
    id::generate_doc_id,
    model::{Actor, ModerationStatus, Post, queries},
    service::dispatch::NotificationDispatcher,
    store::{DocumentStore, DocumentStoreExt, MAX_WRITE_ATTEMPTS, WritePlan},
};

pub struct ModerationService<S> {
    store: S,
    dispatcher: Arc<NotificationDispatcher>,
}

impl<S: DocumentStore> ModerationService<S> {
    pub fn new(store: S, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    /// Create a post in `pending` status. It stays out of every public feed
    /// until an admin approves it.
    pub async fn submit_post(&self, actor: &Actor, content: &str) -> Result<Post, ForumError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ForumError::validation("post content cannot be empty"));
        }
        let post = Post::new(generate_doc_id(), &actor.id, content);

        let mut plan = WritePlan::new();
        plan.create(&post)?;
        plan.emit(DomainEvent::PostSubmitted {
            post_id: post.id.clone(),
            author_id: post.author_id.clone(),
        });
        let receipts = self.store.commit(plan).await?;
        let mut post = post;
        if let Some(receipt) = receipts.first() {
            post.version = receipt.version;
        }
        info!("post {} submitted for review", post.id);
        Ok(post)
    }

    /// Admin verdict: pending -> approved. The author is notified.
    pub async fn approve(&self, actor: &Actor, post_id: &str) -> Result<Post, ForumError> {
        self.moderate(actor, post_id, None).await
    }

    /// Admin verdict: pending -> declined. The reason is required, stored on
    /// the post, and carried in the author's violation notice. Declined posts
    /// archive immediately so they never surface in feeds.
    pub async fn decline(&self, actor: &Actor, post_id: &str, reason: &str) -> Result<Post, ForumError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ForumError::validation("a decline reason is required"));
        }
        self.moderate(actor, post_id, Some(reason)).await
    }

    async fn moderate(&self, actor: &Actor, post_id: &str, decline_reason: Option<&str>) -> Result<Post, ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::permission_denied("moderation requires admin role"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut post: Post = self.store.require(post_id).await?;
            if post.status != ModerationStatus::Pending {
                return Err(ForumError::invariant("post is not awaiting review"));
            }

            post.moderated_at = Some(Utc::now());
            post.updated_at = Utc::now();
            let event = match decline_reason {
                None => {
                    post.status = ModerationStatus::Approved;
                    DomainEvent::PostApproved {
                        post_id: post.id.clone(),
                        author_id: post.author_id.clone(),
                        moderator: actor.clone(),
                    }
                }
                Some(reason) => {
                    post.status = ModerationStatus::Declined;
                    post.archived = true;
                    post.feedback = Some(reason.to_string());
                    DomainEvent::PostDeclined {
                        post_id: post.id.clone(),
                        author_id: post.author_id.clone(),
                        reason: reason.to_string(),
                        moderator: actor.clone(),
                    }
                }
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
                    info!("post {} moderated: {:?}", post.id, post.status);
                    return Ok(post);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying moderate after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Author-only visibility toggle. Hiding keeps the post readable to its
    /// author but out of public feeds; no notification is produced.
    pub async fn set_hidden(&self, actor: &Actor, post_id: &str, hidden: bool) -> Result<Post, ForumError> {
        self.toggle(actor, post_id, ToggleField::Hidden, hidden).await
    }

    /// Author-only archive toggle. Declined posts stay archived.
    pub async fn set_archived(&self, actor: &Actor, post_id: &str, archived: bool) -> Result<Post, ForumError> {
        self.toggle(actor, post_id, ToggleField::Archived, archived).await
    }

    async fn toggle(&self, actor: &Actor, post_id: &str, field: ToggleField, on: bool) -> Result<Post, ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut post: Post = self.store.require(post_id).await?;
            if post.author_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the author may change post visibility",
                ));
            }
            // Only approved posts have visibility to manage; in particular a
            // declined post cannot be unarchived back into circulation.
            if post.status != ModerationStatus::Approved {
                return Err(ForumError::invariant("post is not approved"));
            }

            let event = match field {
                ToggleField::Hidden => {
                    if post.hidden == on {
                        return Ok(post);
                    }
                    post.hidden = on;
                    DomainEvent::PostHiddenChanged {
                        post_id: post.id.clone(),
                        hidden: on,
                    }
                }
                ToggleField::Archived => {
                    if post.archived == on {
                        return Ok(post);
                    }
                    post.archived = on;
                    DomainEvent::PostArchivedChanged {
                        post_id: post.id.clone(),
                        archived: on,
                    }
                }
            };
            post.updated_at = Utc::now();

            let mut plan = WritePlan::new();
            plan.update(&post)?;
            plan.emit(event);

            match self.store.commit(plan).await {
                Ok(receipts) => {
                    if let Some(receipt) = receipts.first() {
                        post.version = receipt.version;
                    }
                    return Ok(post);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying visibility toggle after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Flag a post for moderator attention. Every admin except the reporter
    /// gets a notification; the post itself is untouched.
    pub async fn report_post(&self, actor: &Actor, post_id: &str, reason: &str) -> Result<(), ForumError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ForumError::validation("a report reason is required"));
        }
        let post: Post = self.store.require(post_id).await?;

        let admins = queries::users::admins(&self.store).await?;
        let admin_ids: Vec<String> = admins.into_iter().map(|a| a.id).collect();

        let event = DomainEvent::PostReported {
            post_id: post.id.clone(),
            author_id: post.author_id.clone(),
            reason: reason.to_string(),
            reporter: actor.clone(),
        };
        let mut plan = WritePlan::new();
        let notifications = self.dispatcher.derive_for_admins(&event, &admin_ids);
        for notification in &notifications {
            plan.create(notification)?;
        }
        plan.emit(event);
        self.store.commit(plan).await?;
        for notification in &notifications {
            self.dispatcher.confirm(notification);
        }
        info!("post {} reported", post.id);
        Ok(())
    }

    /// Close out a report: the reporter learns their flag was looked at. The
    /// post's status and visibility are deliberately untouched; an admin who
    /// agrees with the report acts through [`decline`](Self::decline).
    pub async fn review_report(&self, actor: &Actor, post_id: &str, reporter_id: &str) -> Result<(), ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::permission_denied("reviewing reports requires admin role"));
        }
        let post: Post = self.store.require(post_id).await?;

        let event = DomainEvent::ReportReviewed {
            post_id: post.id.clone(),
            reporter_id: reporter_id.to_string(),
            moderator: actor.clone(),
        };
        let mut plan = WritePlan::new();
        let notification = self.dispatcher.derive(&event);
        if let Some(n) = &notification {
            plan.create(n)?;
        }
        plan.emit(event);
        self.store.commit(plan).await?;
        if let Some(n) = &notification {
            self.dispatcher.confirm(n);
        }
        Ok(())
    }

    pub async fn pending_queue(&self, actor: &Actor) -> Result<Vec<Post>, ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::permission_denied("the review queue is admin-only"));
        }
        queries::posts::pending_review(&self.store).await
    }

    pub async fn public_feed(&self) -> Result<Vec<Post>, ForumError> {
        queries::posts::public_feed(&self.store).await
    }

    pub async fn posts_by(&self, actor: &Actor, author_id: &str) -> Result<Vec<Post>, ForumError> {
        // Archived posts are visible only to their author.
        let include_archived = actor.id == author_id;
        queries::posts::by_author(&self.store, author_id, include_archived).await
    }
}

#[derive(Clone, Copy)]
enum ToggleField {
    Hidden,
    Archived,
}
