//! Direct messaging: conversation documents with per-participant unread
//! counters, kept exact by committing the message and the counter in one
//! plan. No notifications; the conversation list is its own signal.

use chrono::Utc;
use log::debug;

use crate::{
    errors::ForumError,
    events::DomainEvent,
    id::generate_doc_id,
    model::{Actor, Conversation, LastMessage, Message, UserProfile, queries},
    store::{DocumentStore, DocumentStoreExt, MAX_WRITE_ATTEMPTS, WritePlan},
};

pub struct MessagingService<S> {
    store: S,
}

impl<S: DocumentStore> MessagingService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Send a message, creating the pair's conversation on first contact.
    /// The message, the last-message preview, and the recipient's unread
    /// increment land atomically, so the counter equals the number of unread
    /// messages at every observable point.
    pub async fn send_message(&self, actor: &Actor, recipient_id: &str, content: &str) -> Result<Message, ForumError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ForumError::validation("message cannot be empty"));
        }
        if actor.id == recipient_id {
            return Err(ForumError::validation("cannot message yourself"));
        }
        let _recipient: UserProfile = self.store.require(recipient_id).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let pair_id = Conversation::pair_id(&actor.id, recipient_id);
            let existing = self.store.get::<Conversation>(&pair_id).await?;
            let creating = existing.is_none();
            let mut conversation =
                existing.unwrap_or_else(|| Conversation::between(&actor.id, recipient_id));

            let message = Message::new(generate_doc_id(), &conversation, &actor.id, content);

            conversation.last_message = Some(LastMessage {
                content: content.to_string(),
                timestamp: message.sent_at,
                read: false,
            });
            *conversation.unread_count.entry(recipient_id.to_string()).or_insert(0) += 1;
            conversation.updated_at = Utc::now();

            let mut plan = WritePlan::new();
            plan.create(&message)?;
            if creating {
                plan.create(&conversation)?;
            } else {
                plan.update(&conversation)?;
            }
            plan.emit(DomainEvent::MessageSent {
                conversation_id: conversation.id.clone(),
                message_id: message.id.clone(),
                sender_id: actor.id.clone(),
                recipient_id: recipient_id.to_string(),
            });

            match self.store.commit(plan).await {
                Ok(receipts) => {
                    let mut message = message;
                    if let Some(receipt) = receipts.first() {
                        message.version = receipt.version;
                    }
                    return Ok(message);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying send_message after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Open a conversation as `actor`: every unread message addressed to them
    /// flips to read and their unread counter resets to zero, atomically.
    /// Returns the number of messages marked. Opening a conversation that was
    /// never started is not an error.
    pub async fn open_conversation(&self, actor: &Actor, other_id: &str) -> Result<usize, ForumError> {
        let pair_id = Conversation::pair_id(&actor.id, other_id);

        let mut attempt = 0;
        loop {
            attempt += 1;

            let Some(mut conversation) = self.store.get::<Conversation>(&pair_id).await? else {
                return Ok(0);
            };
            if !conversation.involves(&actor.id) {
                return Err(ForumError::permission_denied(
                    "only a participant may open a conversation",
                ));
            }

            let mut unread: Vec<Message> = self
                .store
                .find_where(|m: &Message| {
                    m.conversation_id == conversation.id && !m.read && m.sender_id != actor.id
                })
                .await?;

            if unread.is_empty() && conversation.unread_for(&actor.id) == 0 {
                return Ok(0);
            }

            let marked = unread.len();
            let mut plan = WritePlan::new();
            for message in &mut unread {
                message.read = true;
                plan.update(message)?;
            }
            conversation.unread_count.insert(actor.id.clone(), 0);
            if let Some(last) = conversation.last_message.as_mut()
                && !last.read
            {
                // The preview flips only when the last message was addressed
                // to the viewer.
                let addressed_to_viewer = unread
                    .iter()
                    .any(|m| m.sent_at == last.timestamp && m.content == last.content);
                if addressed_to_viewer {
                    last.read = true;
                }
            }
            plan.update(&conversation)?;
            plan.emit(DomainEvent::ConversationOpened {
                conversation_id: conversation.id.clone(),
                viewer_id: actor.id.clone(),
            });

            match self.store.commit(plan).await {
                Ok(_) => return Ok(marked),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying open_conversation after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Sum of the actor's unread counters across all conversations.
    pub async fn unread_total(&self, actor: &Actor) -> Result<u64, ForumError> {
        let conversations = queries::conversations::for_user(&self.store, &actor.id).await?;
        Ok(conversations.iter().map(|c| c.unread_for(&actor.id)).sum())
    }

    pub async fn conversations_of(&self, actor: &Actor) -> Result<Vec<Conversation>, ForumError> {
        queries::conversations::for_user(&self.store, &actor.id).await
    }

    /// Message history, participant-only.
    pub async fn history(&self, actor: &Actor, other_id: &str) -> Result<Vec<Message>, ForumError> {
        let pair_id = Conversation::pair_id(&actor.id, other_id);
        let Some(conversation) = self.store.get::<Conversation>(&pair_id).await? else {
            return Ok(Vec::new());
        };
        if !conversation.involves(&actor.id) {
            return Err(ForumError::permission_denied(
                "only a participant may read a conversation",
            ));
        }
        queries::messages::in_conversation(&self.store, &conversation.id).await
    }
}
