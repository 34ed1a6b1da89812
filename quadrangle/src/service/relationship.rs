//! Friend relationship state machine: directed requests, undirected
//! friendship edges, and the notifications their transitions produce.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, info};

use crate::{
    errors::ForumError,
    events::DomainEvent,
    model::{Actor, FriendRequest, Friendship, RequestStatus, UserProfile, queries},
    service::dispatch::NotificationDispatcher,
    store::{DocumentStore, DocumentStoreExt, MAX_WRITE_ATTEMPTS, WritePlan},
};

/// Where a pair of users stands, as seen from one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipState {
    None,
    Friends,
    /// This user has a pending request out to the other.
    PendingOutgoing,
    /// The other user has a pending request in to this one.
    PendingIncoming,
    /// This user's last request was declined.
    Declined,
}

/// Tunable relationship rules.
#[derive(Debug, Clone)]
pub struct RelationshipPolicy {
    /// Whether a declined sender may request the same user again.
    pub allow_rerequest_after_decline: bool,
}

impl Default for RelationshipPolicy {
    fn default() -> Self {
        Self {
            allow_rerequest_after_decline: true,
        }
    }
}

pub struct RelationshipService<S> {
    store: S,
    dispatcher: Arc<NotificationDispatcher>,
    policy: RelationshipPolicy,
}

impl<S: DocumentStore> RelationshipService<S> {
    pub fn new(store: S, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self::with_policy(store, dispatcher, RelationshipPolicy::default())
    }

    pub fn with_policy(store: S, dispatcher: Arc<NotificationDispatcher>, policy: RelationshipPolicy) -> Self {
        Self {
            store,
            dispatcher,
            policy,
        }
    }

    /// Send a friend request. Rejected while the pair is already friends or
    /// either direction has a pending request; a prior declined attempt is
    /// overwritten when policy allows.
    pub async fn send_request(&self, actor: &Actor, receiver_id: &str) -> Result<FriendRequest, ForumError> {
        if actor.id == receiver_id {
            return Err(ForumError::validation("cannot befriend yourself"));
        }
        // The receiver must exist; the error names the missing profile.
        let _receiver: UserProfile = self.store.require(receiver_id).await?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let pair_id = Friendship::pair_id(&actor.id, receiver_id);
            if self.store.get::<Friendship>(&pair_id).await?.is_some() {
                return Err(ForumError::invariant("already friends"));
            }
            if let Some(reverse) = self
                .store
                .get::<FriendRequest>(&FriendRequest::id_for(receiver_id, &actor.id))
                .await?
                && reverse.is_pending()
            {
                return Err(ForumError::invariant(
                    "the other user already has a pending request to you",
                ));
            }

            let prior = self
                .store
                .get::<FriendRequest>(&FriendRequest::id_for(&actor.id, receiver_id))
                .await?;
            let mut request = FriendRequest::new(&actor.id, receiver_id);
            match &prior {
                Some(existing) if existing.is_pending() => {
                    return Err(ForumError::invariant("request already pending"));
                }
                Some(existing) if existing.status == RequestStatus::Declined => {
                    if !self.policy.allow_rerequest_after_decline {
                        return Err(ForumError::permission_denied(
                            "a declined request may not be repeated",
                        ));
                    }
                    request.version = existing.version;
                }
                Some(existing) => {
                    // Accepted but the friendship edge is gone (unfriended);
                    // overwrite the stale request.
                    request.version = existing.version;
                }
                None => {}
            }

            let mut plan = WritePlan::new();
            if prior.is_some() {
                plan.update(&request)?;
            } else {
                plan.create(&request)?;
            }
            let event = DomainEvent::FriendRequestSent {
                request_id: request.id.clone(),
                sender: actor.clone(),
                receiver_id: receiver_id.to_string(),
            };
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
                        request.version = receipt.version;
                    }
                    info!("friend request {} sent", request.id);
                    return Ok(request);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying send_request after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Accept a pending request addressed to the actor. The status change and
    /// the friendship edge land in one commit; the edge's create guard makes
    /// a second concurrent accept fail rather than duplicate it.
    pub async fn accept_request(&self, actor: &Actor, request_id: &str) -> Result<Friendship, ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request: FriendRequest = self.store.require(request_id).await?;
            if request.receiver_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the receiver may accept a request",
                ));
            }
            if !request.is_pending() {
                return Err(ForumError::invariant("request is no longer pending"));
            }

            let sender: UserProfile = self.store.require(&request.sender_id).await?;
            let friendship = Friendship::between(&sender.actor(), actor);

            request.status = RequestStatus::Accepted;
            request.updated_at = Some(Utc::now());

            let mut plan = WritePlan::new();
            plan.update(&request)?;
            plan.create(&friendship)?;
            let event = DomainEvent::FriendRequestAccepted {
                request_id: request.id.clone(),
                sender_id: request.sender_id.clone(),
                receiver: actor.clone(),
            };
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
                    let mut friendship = friendship;
                    // The edge is the second write in the plan.
                    if let Some(receipt) = receipts.get(1) {
                        friendship.version = receipt.version;
                    }
                    info!("friendship {} established", friendship.id);
                    return Ok(friendship);
                }
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying accept_request after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Decline a pending request addressed to the actor. The document is
    /// retained with `declined` status as history.
    pub async fn decline_request(&self, actor: &Actor, request_id: &str) -> Result<(), ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let mut request: FriendRequest = self.store.require(request_id).await?;
            if request.receiver_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the receiver may decline a request",
                ));
            }
            if !request.is_pending() {
                return Err(ForumError::invariant("request is no longer pending"));
            }

            request.status = RequestStatus::Declined;
            request.updated_at = Some(Utc::now());

            let mut plan = WritePlan::new();
            plan.update(&request)?;
            plan.emit(DomainEvent::FriendRequestDeclined {
                request_id: request.id.clone(),
                sender_id: request.sender_id.clone(),
            });

            match self.store.commit(plan).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying decline_request after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Withdraw one's own pending request. The document is deleted.
    pub async fn cancel_request(&self, actor: &Actor, request_id: &str) -> Result<(), ForumError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let request: FriendRequest = self.store.require(request_id).await?;
            if request.sender_id != actor.id {
                return Err(ForumError::permission_denied(
                    "only the sender may cancel a request",
                ));
            }
            if !request.is_pending() {
                return Err(ForumError::invariant("request is no longer pending"));
            }

            let mut plan = WritePlan::new();
            plan.delete::<FriendRequest>(&request.id, Some(request.version));
            plan.emit(DomainEvent::FriendRequestCancelled {
                request_id: request.id.clone(),
            });

            match self.store.commit(plan).await {
                Ok(_) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < MAX_WRITE_ATTEMPTS => {
                    debug!("retrying cancel_request after {err}");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Remove the friendship edge between the actor and another user. Either
    /// side may do this; no notification is produced. The edge is looked up
    /// by the pair id derived from the actor, so only a participant can ever
    /// reach it.
    pub async fn unfriend(&self, actor: &Actor, other_id: &str) -> Result<(), ForumError> {
        let pair_id = Friendship::pair_id(&actor.id, other_id);
        let friendship: Friendship = self.store.require(&pair_id).await?;

        let mut plan = WritePlan::new();
        plan.delete::<Friendship>(&friendship.id, Some(friendship.version));
        plan.emit(DomainEvent::Unfriended {
            user_a: friendship.users[0].clone(),
            user_b: friendship.users[1].clone(),
        });

        match self.store.commit(plan).await {
            // Concurrent unfriend of the same edge: the goal state holds.
            Err(ForumError::NotFound { .. }) | Ok(_) => {
                info!("friendship {pair_id} removed");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// The pair's current state as seen from `actor`.
    pub async fn relationship_between(&self, actor: &Actor, other_id: &str) -> Result<RelationshipState, ForumError> {
        let pair_id = Friendship::pair_id(&actor.id, other_id);
        if self.store.get::<Friendship>(&pair_id).await?.is_some() {
            return Ok(RelationshipState::Friends);
        }
        if let Some(outgoing) = self
            .store
            .get::<FriendRequest>(&FriendRequest::id_for(&actor.id, other_id))
            .await?
        {
            match outgoing.status {
                RequestStatus::Pending => return Ok(RelationshipState::PendingOutgoing),
                RequestStatus::Declined => return Ok(RelationshipState::Declined),
                RequestStatus::Accepted => {}
            }
        }
        if let Some(incoming) = self
            .store
            .get::<FriendRequest>(&FriendRequest::id_for(other_id, &actor.id))
            .await?
            && incoming.is_pending()
        {
            return Ok(RelationshipState::PendingIncoming);
        }
        Ok(RelationshipState::None)
    }

    pub async fn friends_of(&self, user_id: &str) -> Result<Vec<Friendship>, ForumError> {
        queries::friendships::of_user(&self.store, user_id).await
    }

    pub async fn incoming_requests(&self, actor: &Actor) -> Result<Vec<FriendRequest>, ForumError> {
        queries::friend_requests::pending_for(&self.store, &actor.id).await
    }

    pub async fn outgoing_requests(&self, actor: &Actor) -> Result<Vec<FriendRequest>, ForumError> {
        queries::friend_requests::outgoing_from(&self.store, &actor.id).await
    }
}
