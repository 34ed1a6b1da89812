//! Drift repair. Counters are always recomputed from their source-of-truth
//! collections on write, but data written before that rule (or touched by
//! hand) can disagree; this sweep re-derives and repairs in place.

use log::{debug, info, warn};

use crate::{
    errors::ForumError,
    model::{Conversation, Message, ModerationStatus, Post},
    store::{DocumentStore, DocumentStoreExt, WritePlan},
};

/// What one sweep found and fixed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub posts_scanned: usize,
    pub posts_repaired: usize,
    pub conversations_scanned: usize,
    pub conversations_repaired: usize,
    /// Documents left alone because a writer got there first.
    pub skipped_conflicts: usize,
}

/// Run one full sweep. Each repair is a separate version-guarded write; a
/// conflict means a live writer already rewrote the document (and with it the
/// counters), so the sweep skips it rather than fight.
pub async fn run<S: DocumentStore>(store: &S) -> Result<ReconcileReport, ForumError> {
    let mut report = ReconcileReport::default();
    repair_posts(store, &mut report).await?;
    repair_conversations(store, &mut report).await?;
    info!(
        "reconcile: {}/{} posts and {}/{} conversations repaired, {} skipped",
        report.posts_repaired,
        report.posts_scanned,
        report.conversations_repaired,
        report.conversations_scanned,
        report.skipped_conflicts
    );
    Ok(report)
}

async fn repair_posts<S: DocumentStore>(store: &S, report: &mut ReconcileReport) -> Result<(), ForumError> {
    let posts: Vec<Post> = store.list_all().await?;
    for mut post in posts {
        report.posts_scanned += 1;

        let mut dirty = false;
        if post.likes as usize != post.reactions.len() {
            warn!(
                "post {}: like counter {} != {} reactions",
                post.id,
                post.likes,
                post.reactions.len()
            );
            post.recount_likes();
            dirty = true;
        }
        let max_seq = post
            .comments
            .iter()
            .filter_map(|c| c.id.strip_prefix('c')?.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        if post.comment_seq < max_seq {
            warn!("post {}: comment sequence behind existing ids", post.id);
            post.comment_seq = max_seq;
            dirty = true;
        }
        if post.status == ModerationStatus::Declined && !post.archived {
            warn!("post {}: declined but not archived", post.id);
            post.archived = true;
            dirty = true;
        }
        if !dirty {
            continue;
        }

        let mut plan = WritePlan::new();
        plan.update(&post)?;
        match store.commit(plan).await {
            Ok(_) => report.posts_repaired += 1,
            Err(err) if err.is_retryable() => {
                debug!("post {}: concurrent write, skipping repair", post.id);
                report.skipped_conflicts += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

async fn repair_conversations<S: DocumentStore>(store: &S, report: &mut ReconcileReport) -> Result<(), ForumError> {
    let conversations: Vec<Conversation> = store.list_all().await?;
    let messages: Vec<Message> = store.list_all().await?;

    for mut conversation in conversations {
        report.conversations_scanned += 1;

        let mut dirty = false;
        for participant in conversation.participants.clone() {
            let actual = messages
                .iter()
                .filter(|m| m.conversation_id == conversation.id && !m.read && m.recipient_id() == participant)
                .count() as u64;
            if conversation.unread_for(&participant) != actual {
                warn!(
                    "conversation {}: unread counter for {} was {}, recounted {}",
                    conversation.id,
                    participant,
                    conversation.unread_for(&participant),
                    actual
                );
                if actual == 0 {
                    conversation.unread_count.remove(&participant);
                } else {
                    conversation.unread_count.insert(participant.clone(), actual);
                }
                dirty = true;
            }
        }
        if !dirty {
            continue;
        }

        let mut plan = WritePlan::new();
        plan.update(&conversation)?;
        match store.commit(plan).await {
            Ok(_) => report.conversations_repaired += 1,
            Err(err) if err.is_retryable() => {
                debug!(
                    "conversation {}: concurrent write, skipping repair",
                    conversation.id
                );
                report.skipped_conflicts += 1;
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}
