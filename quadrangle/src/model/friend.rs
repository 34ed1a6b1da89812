use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::Actor;

/// Friend request lifecycle. `Accepted` and `Declined` are terminal for the
/// directed attempt; declined requests are retained as history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Declined,
}

/// A directed friend request, keyed deterministically by the ordered pair so
/// at most one document exists per direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FriendRequest {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: u64,
}

impl FriendRequest {
    /// Deterministic document id for the ordered pair.
    pub fn id_for(sender_id: &str, receiver_id: &str) -> String {
        format!("{sender_id}_{receiver_id}")
    }

    pub fn new(sender_id: impl Into<String>, receiver_id: impl Into<String>) -> Self {
        let sender_id = sender_id.into();
        let receiver_id = receiver_id.into();
        Self {
            id: Self::id_for(&sender_id, &receiver_id),
            sender_id,
            receiver_id,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            updated_at: None,
            version: 0,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }
}

super::impl_document!(FriendRequest, "friend_requests");

/// Denormalized display data for one side of a friendship edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartyCard {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl From<&Actor> for PartyCard {
    fn from(actor: &Actor) -> Self {
        Self {
            name: actor.name.clone(),
            avatar_url: actor.avatar_url.clone(),
        }
    }
}

/// An undirected friendship edge. The document id is the sorted user pair, so
/// at most one edge can exist per unordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friendship {
    pub id: String,
    /// Sorted two-element user id set.
    pub users: [String; 2],
    pub user_details: BTreeMap<String, PartyCard>,
    pub created_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Friendship {
    /// Order-independent document id for the pair.
    pub fn pair_id(a: &str, b: &str) -> String {
        super::sorted_pair_id(a, b)
    }

    pub fn between(a: &Actor, b: &Actor) -> Self {
        let now = Utc::now();
        let mut users = [a.id.clone(), b.id.clone()];
        users.sort();
        let mut user_details = BTreeMap::new();
        user_details.insert(a.id.clone(), PartyCard::from(a));
        user_details.insert(b.id.clone(), PartyCard::from(b));
        Self {
            id: Self::pair_id(&a.id, &b.id),
            users,
            user_details,
            created_at: now,
            last_interaction_at: now,
            version: 0,
        }
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.users.iter().any(|u| u == user_id)
    }

    pub fn other_side<'a>(&'a self, user_id: &str) -> Option<&'a str> {
        self.users
            .iter()
            .map(String::as_str)
            .find(|u| *u != user_id)
    }
}

super::impl_document!(Friendship, "friendships");
