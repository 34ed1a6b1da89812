use quadrangle::{
    ForumError,
    model::{ModerationStatus, NotificationBody, Post, queries},
};

use super::support::*;

#[tokio::test]
async fn submitted_posts_wait_in_the_queue_not_the_feed() {
    let store = store();
    let moderation = ModerationService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = moderation.submit_post(&avi, "first day on campus").await.expect("submit");
    assert_eq!(post.status, ModerationStatus::Pending);

    assert!(moderation.public_feed().await.expect("feed").is_empty());
    let queue = moderation.pending_queue(&mina).await.expect("queue");
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].id, post.id);
}

#[tokio::test]
async fn approval_publishes_and_notifies_the_author() {
    let store = store();
    let moderation = ModerationService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = moderation.submit_post(&avi, "hello quad").await.expect("submit");
    let approved = moderation.approve(&mina, &post.id).await.expect("approve");
    assert_eq!(approved.status, ModerationStatus::Approved);
    assert!(approved.moderated_at.is_some());

    let feed = moderation.public_feed().await.expect("feed");
    assert_eq!(feed.len(), 1);

    let unread = queries::notifications::unread_for(&store, "avi").await.expect("unread");
    assert_eq!(unread.len(), 1);
    assert!(matches!(unread[0].body, NotificationBody::PostApproved { .. }));
}

#[tokio::test]
async fn decline_requires_a_reason_and_archives_with_it() {
    let store = store();
    let moderation = ModerationService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = moderation.submit_post(&avi, "buy my essay service").await.expect("submit");

    let err = moderation.decline(&mina, &post.id, "  ").await.unwrap_err();
    assert!(matches!(err, ForumError::Validation { .. }));

    let declined = moderation
        .decline(&mina, &post.id, "solicitation is not allowed")
        .await
        .expect("decline");
    assert_eq!(declined.status, ModerationStatus::Declined);
    assert!(declined.archived);
    assert_eq!(declined.feedback.as_deref(), Some("solicitation is not allowed"));

    // The author sees the violation notice with the reason.
    let unread = queries::notifications::unread_for(&store, "avi").await.expect("unread");
    assert_eq!(unread.len(), 1);
    match &unread[0].body {
        NotificationBody::PostViolation { reason, .. } => {
            assert_eq!(reason, "solicitation is not allowed");
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    // A declined post cannot be unarchived back into circulation.
    let err = moderation.set_archived(&avi, &post.id, false).await.unwrap_err();
    assert!(matches!(err, ForumError::InvariantViolation { .. }));
}

#[tokio::test]
async fn moderation_is_admin_only_and_single_shot() {
    let store = store();
    let moderation = ModerationService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = moderation.submit_post(&avi, "hello").await.expect("submit");

    let err = moderation.approve(&bea, &post.id).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));
    let err = moderation.pending_queue(&bea).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));

    moderation.approve(&mina, &post.id).await.expect("approve");
    let err = moderation.approve(&mina, &post.id).await.unwrap_err();
    assert!(matches!(err, ForumError::InvariantViolation { .. }));
}

#[tokio::test]
async fn hiding_and_archiving_are_author_only_and_leave_the_feed() {
    let store = store();
    let moderation = ModerationService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let post = approved_post(&store, &avi, &mina, "now you see me").await;

    let err = moderation.set_hidden(&bea, &post.id, true).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));

    moderation.set_hidden(&avi, &post.id, true).await.expect("hide");
    assert!(moderation.public_feed().await.expect("feed").is_empty());

    moderation.set_hidden(&avi, &post.id, false).await.expect("unhide");
    assert_eq!(moderation.public_feed().await.expect("feed").len(), 1);

    moderation.set_archived(&avi, &post.id, true).await.expect("archive");
    assert!(moderation.public_feed().await.expect("feed").is_empty());

    // Archived posts show only in the author's own view.
    let own = moderation.posts_by(&avi, "avi").await.expect("own");
    assert_eq!(own.len(), 1);
    let visitors = moderation.posts_by(&bea, "avi").await.expect("visitor");
    assert!(visitors.is_empty());
}

#[tokio::test]
async fn reports_fan_out_to_admins_but_not_the_reporter() {
    let store = store();
    let moderation = ModerationService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let bea = seed_user(&store, "bea", "Bea").await;
    let mina = seed_admin(&store, "mina", "Mina").await;
    let noor = seed_admin(&store, "noor", "Noor").await;

    let post = approved_post(&store, &avi, &mina, "questionable").await;
    // Clear the approval notice so counts below are about the report.
    let notifications = NotificationService::new(store.clone());
    notifications.mark_all_read(&avi).await.expect("clear");

    moderation
        .report_post(&bea, &post.id, "looks like spam")
        .await
        .expect("report");

    for admin in [&mina, &noor] {
        let unread = queries::notifications::unread_for(&store, &admin.id).await.expect("unread");
        assert_eq!(unread.len(), 1, "admin {} should see the report", admin.id);
        assert!(matches!(unread[0].body, NotificationBody::PostReported { .. }));
    }
    // Neither the reporter nor the author hears about it.
    assert!(queries::notifications::unread_for(&store, "bea").await.expect("unread").is_empty());
    assert!(queries::notifications::unread_for(&store, "avi").await.expect("unread").is_empty());

    // The post itself is untouched by the report and its review.
    moderation.review_report(&mina, &post.id, "bea").await.expect("review");
    let after: Post = store.require(&post.id).await.expect("post");
    assert_eq!(after.status, ModerationStatus::Approved);
    assert!(!after.archived);

    let unread = queries::notifications::unread_for(&store, "bea").await.expect("unread");
    assert_eq!(unread.len(), 1);
    assert!(matches!(unread[0].body, NotificationBody::ReportReviewed { .. }));
}
