use chrono::Duration;
use quadrangle::{
    ForumError,
    model::{ReactionKind, queries},
};

use super::support::*;

#[tokio::test]
async fn rapid_reaction_toggles_yield_one_notification() {
    let store = store();
    // One shared dispatcher, as in production: its window spans the toggles.
    let shared = dispatcher();
    let interactions = InteractionService::new(store.clone(), shared.clone());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = approved_post(&store, &avi, &mina, "toggle me").await;
    let notifications = NotificationService::new(store.clone());
    notifications.mark_all_read(&avi).await.expect("clear approval notice");

    for _ in 0..3 {
        interactions
            .toggle_reaction(&bea, &post.id, ReactionKind::Like)
            .await
            .expect("like");
        interactions
            .toggle_reaction(&bea, &post.id, ReactionKind::Like)
            .await
            .expect("unlike");
    }
    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("final like");

    let unread = notifications.unread_for(&avi).await.expect("unread");
    assert_eq!(unread.len(), 1, "toggles within the window must coalesce");
}

#[tokio::test]
async fn distinct_actors_are_never_coalesced() {
    let store = store();
    let shared = dispatcher();
    let interactions = InteractionService::new(store.clone(), shared);
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let cam = seed_user(&store, "cam", "Cam").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = approved_post(&store, &avi, &mina, "popular").await;
    let notifications = NotificationService::new(store.clone());
    notifications.mark_all_read(&avi).await.expect("clear approval notice");

    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("bea likes");
    interactions
        .toggle_reaction(&cam, &post.id, ReactionKind::Love)
        .await
        .expect("cam loves");

    assert_eq!(notifications.unread_for(&avi).await.expect("unread").len(), 2);
}

#[tokio::test]
async fn an_expired_window_admits_the_same_key_again() {
    let store = store();
    let shared = Arc::new(NotificationDispatcher::with_window(Duration::zero()));
    let interactions = InteractionService::new(store.clone(), shared);
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = approved_post(&store, &avi, &mina, "slow burn").await;
    let notifications = NotificationService::new(store.clone());
    notifications.mark_all_read(&avi).await.expect("clear approval notice");

    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("like");
    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("unlike");
    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("like again");

    assert_eq!(notifications.unread_for(&avi).await.expect("unread").len(), 2);
}

#[tokio::test]
async fn a_conflicted_accept_still_notifies_the_sender_on_retry() {
    let store = store();
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;

    let conflicting = ConflictingStore::new(store.clone());
    let relationships = RelationshipService::new(conflicting.clone(), dispatcher());

    let request = relationships.send_request(&avi, "bea").await.expect("send");
    // The first accept commit loses a version conflict; the retry must still
    // carry the friend_accepted notification.
    conflicting.fail_next(1);
    relationships.accept_request(&bea, &request.id).await.expect("accept");

    let unread = queries::notifications::unread_for(&store, "avi").await.expect("unread");
    assert_eq!(
        unread.len(),
        1,
        "accept must produce exactly one friend_accepted notification"
    );
}

#[tokio::test]
async fn a_conflicted_reaction_still_notifies_on_retry() {
    let store = store();
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = approved_post(&store, &avi, &mina, "contended").await;
    let notifications = NotificationService::new(store.clone());
    notifications.mark_all_read(&avi).await.expect("clear approval notice");

    let conflicting = ConflictingStore::new(store.clone());
    let interactions = InteractionService::new(conflicting.clone(), dispatcher());
    conflicting.fail_next(1);
    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("like");

    assert_eq!(notifications.unread_for(&avi).await.expect("unread").len(), 1);
}

#[tokio::test]
async fn mark_read_is_addressee_only() {
    let store = store();
    let interactions = InteractionService::new(store.clone(), dispatcher());
    let notifications = NotificationService::new(store.clone());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = approved_post(&store, &avi, &mina, "mark me").await;
    notifications.mark_all_read(&avi).await.expect("clear approval notice");
    interactions
        .toggle_reaction(&bea, &post.id, ReactionKind::Like)
        .await
        .expect("like");

    let unread = notifications.unread_for(&avi).await.expect("unread");
    assert_eq!(unread.len(), 1);
    let id = unread[0].id.clone();

    let err = notifications.mark_read(&bea, &id).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));

    notifications.mark_read(&avi, &id).await.expect("mark read");
    assert!(notifications.unread_for(&avi).await.expect("unread").is_empty());
    // Idempotent.
    notifications.mark_read(&avi, &id).await.expect("mark again");
    // Read history is retained.
    assert_eq!(queries::notifications::all_for(&store, "avi").await.expect("all").len(), 2);
}
