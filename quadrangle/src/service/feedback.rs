//! User feedback inbox: submission, admin triage, and replies that land in
//! the author's notification feed.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::{
    errors::ForumError,
    events::DomainEvent,
    id::generate_doc_id,
    model::{Actor, AdminReply, FeedbackItem, FeedbackStatus, queries},
    service::dispatch::NotificationDispatcher,
    store::{DocumentStore, DocumentStoreExt, MAX_WRITE_ATTEMPTS, WritePlan},
};

pub struct FeedbackService<S> {
    store: S,
    dispatcher: Arc<NotificationDispatcher>,
}

impl<S: DocumentStore> FeedbackService<S> {
    pub fn new(store: S, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self { store, dispatcher }
    }

    pub async fn submit(&self, actor: &Actor, category: &str, message: &str) -> Result<FeedbackItem, ForumError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(ForumError::validation("feedback message cannot be empty"));
        }
        let item = FeedbackItem::new(generate_doc_id(), &actor.id, category, message);

        let mut plan = WritePlan::new();
        plan.create(&item)?;
        plan.emit(DomainEvent::FeedbackSubmitted {
            feedback_id: item.id.clone(),
            author_id: item.user_id.clone(),
        });
        let receipts = self.store.commit(plan).await?;
        let mut item = item;
        if let Some(receipt) = receipts.first() {
            item.version = receipt.version;
        }
        Ok(item)
    }

    /// Admin triage without a reply; the author is not notified.
    pub async fn set_status(&self, actor: &Actor, feedback_id: &str, status: FeedbackStatus) -> Result<FeedbackItem, ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::permission_denied("feedback triage requires admin role"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut item: FeedbackItem = self.store.require(feedback_id).await?;
            if item.status == status {
                return Ok(item);
            }
            item.status = status;
            item.updated_at = Utc::now();

            let mut plan = WritePlan::new();
            plan.update(&item)?;

            match self.store.commit(plan).await {
                Ok(receipts) => {
                    if let Some(receipt) = receipts.first() {
                        item.version = receipt.version;
                    }
                    return Ok(item);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying set_status after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Admin reply. Stores the reply on the item, moves it to `reviewed`, and
    /// notifies the author in the same commit.
    pub async fn reply(&self, actor: &Actor, feedback_id: &str, message: &str) -> Result<FeedbackItem, ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::permission_denied("replying to feedback requires admin role"));
        }
        let message = message.trim();
        if message.is_empty() {
            return Err(ForumError::validation("reply cannot be empty"));
        }

        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut item: FeedbackItem = self.store.require(feedback_id).await?;
            item.admin_reply = Some(AdminReply {
                message: message.to_string(),
                replied_at: Utc::now(),
                replied_by: actor.id.clone(),
            });
            item.status = FeedbackStatus::Reviewed;
            item.updated_at = Utc::now();

            let event = DomainEvent::FeedbackReplied {
                feedback_id: item.id.clone(),
                author_id: item.user_id.clone(),
                moderator: actor.clone(),
            };
            let mut plan = WritePlan::new();
            plan.update(&item)?;
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
                        item.version = receipt.version;
                    }
                    return Ok(item);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying reply after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub async fn inbox(&self, actor: &Actor, status: FeedbackStatus) -> Result<Vec<FeedbackItem>, ForumError> {
        if !actor.is_admin() {
            return Err(ForumError::permission_denied("the feedback inbox is admin-only"));
        }
        queries::feedback::by_status(&self.store, status).await
    }

    pub async fn mine(&self, actor: &Actor) -> Result<Vec<FeedbackItem>, ForumError> {
        queries::feedback::by_author(&self.store, &actor.id).await
    }
}
