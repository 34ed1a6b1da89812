//! Notification derivation. One qualifying state transition yields at most
//! one notification per target; rapid duplicates coalesce inside a dedupe
//! window keyed by `(type, actor, target, subject)`.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::{
    errors::ForumError,
    events::DomainEvent,
    id::generate_doc_id,
    model::{Actor, ActorCard, Notification, NotificationBody, ReactionChange, queries},
    store::{DocumentStore, DocumentStoreExt, MAX_WRITE_ATTEMPTS, WritePlan},
};

/// Derive the notification a transition event addresses to its affected
/// user, or `None` when nothing qualifies (including self-notification and
/// reaction removal). Pure; payloads are self-sufficient for rendering.
pub fn derive_notification(event: &DomainEvent) -> Option<Notification> {
    let (target, actor_id, body) = match event {
        DomainEvent::ReactionChanged {
            post_id,
            post_author_id,
            actor,
            reaction,
            change,
        } => {
            if *change == ReactionChange::Removed {
                return None;
            }
            (
                post_author_id,
                actor.id.as_str(),
                NotificationBody::Reaction {
                    post_id: post_id.clone(),
                    actor: ActorCard::from(actor),
                    kind: *reaction,
                },
            )
        }
        DomainEvent::CommentAdded {
            post_id,
            post_author_id,
            comment_id,
            actor,
            is_anonymous,
            preview,
        } => {
            let card = if *is_anonymous {
                ActorCard::anonymous()
            } else {
                ActorCard::from(actor)
            };
            (
                post_author_id,
                actor.id.as_str(),
                NotificationBody::Comment {
                    post_id: post_id.clone(),
                    comment_id: comment_id.clone(),
                    actor: card,
                    preview: preview.clone(),
                },
            )
        }
        DomainEvent::FriendRequestSent {
            request_id,
            sender,
            receiver_id,
        } => (
            receiver_id,
            sender.id.as_str(),
            NotificationBody::FriendRequest {
                request_id: request_id.clone(),
                actor: ActorCard::from(sender),
            },
        ),
        DomainEvent::FriendRequestAccepted {
            sender_id, receiver, ..
        } => (
            sender_id,
            receiver.id.as_str(),
            NotificationBody::FriendAccepted {
                actor: ActorCard::from(receiver),
            },
        ),
        DomainEvent::PostApproved {
            post_id,
            author_id,
            moderator,
        } => (
            author_id,
            moderator.id.as_str(),
            NotificationBody::PostApproved {
                post_id: post_id.clone(),
            },
        ),
        DomainEvent::PostDeclined {
            post_id,
            author_id,
            reason,
            moderator,
        } => (
            author_id,
            moderator.id.as_str(),
            NotificationBody::PostViolation {
                post_id: post_id.clone(),
                reason: reason.clone(),
            },
        ),
        DomainEvent::ReportReviewed {
            post_id,
            reporter_id,
            moderator,
        } => (
            reporter_id,
            moderator.id.as_str(),
            NotificationBody::ReportReviewed {
                post_id: post_id.clone(),
            },
        ),
        DomainEvent::FeedbackReplied {
            feedback_id,
            author_id,
            moderator,
        } => (
            author_id,
            moderator.id.as_str(),
            NotificationBody::AdminReply {
                feedback_id: feedback_id.clone(),
                actor: ActorCard::from(moderator),
            },
        ),
        _ => return None,
    };

    if actor_id == target {
        return None;
    }
    Some(Notification::new(generate_doc_id(), target.clone(), body))
}

/// Stateful wrapper adding the dedupe window over [`derive_notification`].
pub struct NotificationDispatcher {
    window: Duration,
    recent: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self::with_window(Duration::seconds(30))
    }

    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            recent: Mutex::new(HashMap::new()),
        }
    }

    /// Derive, suppressing duplicates seen within the window. The key is not
    /// recorded yet: callers must [`confirm`](Self::confirm) once the commit
    /// carrying the notification succeeds, so a failed optimistic attempt
    /// does not swallow the retry's notification.
    pub fn derive(&self, event: &DomainEvent) -> Option<Notification> {
        let notification = derive_notification(event)?;
        self.admits(&notification).then_some(notification)
    }

    /// Record a delivered notification's dedupe key. Call after the plan
    /// containing it commits.
    pub fn confirm(&self, notification: &Notification) {
        let mut recent = self.recent.lock().expect("dispatcher mutex poisoned");
        recent.insert(notification.dedupe_key(), Utc::now());
    }

    /// Fan a report out to the moderator group (the reporter never notifies
    /// themselves).
    pub fn derive_for_admins(&self, event: &DomainEvent, admin_ids: &[String]) -> Vec<Notification> {
        let DomainEvent::PostReported {
            post_id,
            reason,
            reporter,
            ..
        } = event
        else {
            return Vec::new();
        };
        admin_ids
            .iter()
            .filter(|id| **id != reporter.id)
            .filter_map(|id| {
                let notification = Notification::new(
                    generate_doc_id(),
                    id.clone(),
                    NotificationBody::PostReported {
                        post_id: post_id.clone(),
                        reason: reason.clone(),
                        actor: ActorCard::from(reporter),
                    },
                );
                self.admits(&notification).then_some(notification)
            })
            .collect()
    }

    fn admits(&self, notification: &Notification) -> bool {
        let key = notification.dedupe_key();
        let now = Utc::now();
        let mut recent = self.recent.lock().expect("dispatcher mutex poisoned");
        recent.retain(|_, seen| now.signed_duration_since(*seen) <= self.window);
        if recent.contains_key(&key) {
            debug!("coalesced duplicate notification {key}");
            return false;
        }
        true
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-side operations on a user's notification feed.
pub struct NotificationService<S> {
    store: S,
}

impl<S: DocumentStore> NotificationService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub async fn unread_for(&self, actor: &Actor) -> Result<Vec<Notification>, ForumError> {
        queries::notifications::unread_for(&self.store, &actor.id).await
    }

    pub async fn all_for(&self, actor: &Actor) -> Result<Vec<Notification>, ForumError> {
        queries::notifications::all_for(&self.store, &actor.id).await
    }

    pub async fn mark_read(&self, actor: &Actor, notification_id: &str) -> Result<(), ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let mut notification: Notification = self.store.require(notification_id).await?;
            if notification.user_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the addressee may mark a notification read",
                ));
            }
            if notification.read {
                return Ok(());
            }
            notification.read = true;
            let mut plan = WritePlan::new();
            plan.update(&notification)?;
            match self.store.commit(plan).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => continue,
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> Result<usize, ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let unread = queries::notifications::unread_for(&self.store, &actor.id).await?;
            if unread.is_empty() {
                return Ok(0);
            }
            let count = unread.len();
            let mut plan = WritePlan::new();
            for mut notification in unread {
                notification.read = true;
                plan.update(&notification)?;
            }
            match self.store.commit(plan).await {
                Ok(_) => return Ok(count),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => continue,
                Err(err) => return Err(err),
            }
        }
    }
}
