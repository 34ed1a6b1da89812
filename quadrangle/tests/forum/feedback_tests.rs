use quadrangle::{
    ForumError,
    model::{FeedbackStatus, NotificationBody, queries},
};

use super::support::*;

#[tokio::test]
async fn submitted_feedback_lands_in_the_admin_inbox() {
    let store = store();
    let feedback = FeedbackService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let item = feedback
        .submit(&avi, "bug", "the feed shows my hidden post")
        .await
        .expect("submit");
    assert_eq!(item.status, FeedbackStatus::Pending);

    let inbox = feedback.inbox(&mina, FeedbackStatus::Pending).await.expect("inbox");
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].id, item.id);

    let err = feedback.inbox(&avi, FeedbackStatus::Pending).await.unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));
}

#[tokio::test]
async fn triage_moves_items_between_status_buckets() {
    let store = store();
    let feedback = FeedbackService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let item = feedback.submit(&avi, "idea", "dark mode please").await.expect("submit");

    let err = feedback
        .set_status(&avi, &item.id, FeedbackStatus::Resolved)
        .await
        .unwrap_err();
    assert!(matches!(err, ForumError::PermissionDenied { .. }));

    feedback
        .set_status(&mina, &item.id, FeedbackStatus::InProgress)
        .await
        .expect("triage");
    assert!(feedback.inbox(&mina, FeedbackStatus::Pending).await.expect("inbox").is_empty());
    assert_eq!(
        feedback
            .inbox(&mina, FeedbackStatus::InProgress)
            .await
            .expect("inbox")
            .len(),
        1
    );
}

#[tokio::test]
async fn an_admin_reply_notifies_the_author() {
    let store = store();
    let feedback = FeedbackService::new(store.clone(), dispatcher());
    let avi = seed_user(&store, "avi", "Avi").await;
    let mina = seed_admin(&store, "mina", "Mina").await;

    let item = feedback.submit(&avi, "bug", "unread badge stuck").await.expect("submit");
    let replied = feedback
        .reply(&mina, &item.id, "fixed in the next deploy")
        .await
        .expect("reply");

    assert_eq!(replied.status, FeedbackStatus::Reviewed);
    let reply = replied.admin_reply.expect("reply stored");
    assert_eq!(reply.replied_by, "mina");
    assert_eq!(reply.message, "fixed in the next deploy");

    let unread = queries::notifications::unread_for(&store, "avi").await.expect("unread");
    assert_eq!(unread.len(), 1);
    match &unread[0].body {
        NotificationBody::AdminReply { feedback_id, actor } => {
            assert_eq!(feedback_id, &item.id);
            assert_eq!(actor.id, "mina");
        }
        other => panic!("unexpected notification: {other:?}"),
    }

    // The author sees their own item with the reply attached.
    let mine = feedback.mine(&avi).await.expect("mine");
    assert_eq!(mine.len(), 1);
    assert!(mine[0].admin_reply.is_some());
}
