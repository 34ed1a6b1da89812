use quadrangle::{
    ForumError,
    model::{FriendRequest, Friendship, RequestStatus, queries},
    service::{RelationshipPolicy, RelationshipState},
};

use super::support::*;

#[tokio::test]
async fn accept_creates_exactly_one_friendship_and_notifies_the_sender() {
    let store = store();
    let relationships = RelationshipService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    let request = relationships.send_request(&avi, "bea").await.expect("send");
    assert!(request.is_pending());

    let friendship = relationships.accept_request(&bea, &request.id).await.expect("accept");
    assert_eq!(friendship.users, ["avi".to_string(), "bea".to_string()]);
    assert_eq!(friendship.user_details["avi"].name, "Avi");

    let stored: FriendRequest = store.require(&request.id).await.expect("request kept");
    assert_eq!(stored.status, RequestStatus::Accepted);

    let edges = queries::friendships::of_user(&store, "avi").await.expect("list");
    assert_eq!(edges.len(), 1);

    // Exactly one friend_accepted notification, addressed to the sender.
    let unread = queries::notifications::unread_for(&store, "avi").await.expect("unread");
    assert_eq!(unread.len(), 1);
    let bea_unread = queries::notifications::unread_for(&store, "bea").await.expect("unread");
    // Bea still holds the original friend_request notification, nothing more.
    assert_eq!(bea_unread.len(), 1);
}

#[tokio::test]
async fn duplicate_and_reverse_requests_are_rejected() {
    let store = store();
    let relationships = RelationshipService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    relationships.send_request(&avi, "bea").await.expect("send");
    let err = relationships.send_request(&avi, "bea").await.unwrap_err();
    assert!(matches!(err, ForumError::InvariantViolation { .. }));

    // Bea cannot open a second pending edge in the other direction.
    let err = relationships.send_request(&bea, "avi").await.unwrap_err();
    assert!(matches!(err, ForumError::InvariantViolation { .. }));
}

#[tokio::test]
async fn requests_between_friends_are_rejected_until_unfriended() {
    let store = store();
    let relationships = RelationshipService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    let request = relationships.send_request(&avi, "bea").await.expect("send");
    relationships.accept_request(&bea, &request.id).await.expect("accept");

    let err = relationships.send_request(&bea, "avi").await.unwrap_err();
    assert!(matches!(err, ForumError::InvariantViolation { .. }));

    relationships.unfriend(&avi, "bea").await.expect("unfriend");
    assert_eq!(
        relationships.relationship_between(&avi, "bea").await.expect("state"),
        RelationshipState::None
    );

    // With the edge gone the pair may start over.
    relationships.send_request(&bea, "avi").await.expect("re-request");
}

#[tokio::test]
async fn only_the_receiver_may_accept_or_decline() {
    let store = store();
    let relationships = RelationshipService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let _bea = seed_user(&store, "bea", "Bea").await;
    let eve = seed_user(&store, "eve", "Eve").await;

    let request = relationships.send_request(&avi, "bea").await.expect("send");

    let err = relationships.accept_request(&avi, &request.id).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));
    let err = relationships.decline_request(&eve, &request.id).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));
}

#[tokio::test]
async fn decline_is_kept_as_history_and_policy_gates_rerequest() {
    let store = store();
    let strict = RelationshipService::with_policy(
        store.clone(),
        dispatcher(),
        RelationshipPolicy {
            allow_rerequest_after_decline: false,
        },
    );
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    let request = strict.send_request(&avi, "bea").await.expect("send");
    strict.decline_request(&bea, &request.id).await.expect("decline");

    let stored: FriendRequest = store.require(&request.id).await.expect("retained");
    assert_eq!(stored.status, RequestStatus::Declined);
    assert_eq!(
        strict.relationship_between(&avi, "bea").await.expect("state"),
        RelationshipState::Declined
    );

    let err = strict.send_request(&avi, "bea").await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));

    // Default policy allows trying again; the declined document is reused.
    let lenient = RelationshipService::new(store.clone(), dispatcher());
    let retry = lenient.send_request(&avi, "bea").await.expect("re-request");
    assert_eq!(retry.id, request.id);
    assert!(retry.is_pending());
}

#[tokio::test]
async fn cancel_removes_a_pending_request() {
    let store = store();
    let relationships = RelationshipService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    let request = relationships.send_request(&avi, "bea").await.expect("send");
    let err = relationships.cancel_request(&bea, &request.id).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));

    relationships.cancel_request(&avi, &request.id).await.expect("cancel");
    assert!(
        store
            .get::<FriendRequest>(&request.id)
            .await
            .expect("lookup")
            .is_none()
    );
    assert_eq!(
        relationships.relationship_between(&avi, "bea").await.expect("state"),
        RelationshipState::None
    );
}

#[tokio::test]
async fn relationship_state_is_directional() {
    let store = store();
    let relationships = RelationshipService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    relationships.send_request(&avi, "bea").await.expect("send");
    assert_eq!(
        relationships.relationship_between(&avi, "bea").await.expect("state"),
        RelationshipState::PendingOutgoing
    );
    assert_eq!(
        relationships.relationship_between(&bea, "avi").await.expect("state"),
        RelationshipState::PendingIncoming
    );
}

#[tokio::test]
async fn friendship_id_prevents_duplicate_edges() {
    let store = store();
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    let mut plan = WritePlan::new();
    plan.create(&Friendship::between(&avi, &bea)).expect("plan");
    store.commit(plan).await.expect("first edge");

    let mut plan = WritePlan::new();
    plan.create(&Friendship::between(&bea, &avi)).expect("plan");
    let err = store.commit(plan).await.unwrap_err();
    assert!(matches!(err, ForumError::VersionConflict { .. }));
}
