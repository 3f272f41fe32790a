//! Chat sending, retrieval ordering and soft delete
mod common;

use campus_portal::db::models::{MessageBody, MessageType, ResourceType};
use campus_portal::db::{FileRepository, MessageRepository};
use campus_portal::service::chat::MessageWindow;

use common::database::{setup, TestApp};
use common::fixtures::{count, create_student, png, TestUser};

const T_10_00: i64 = 1_704_103_200_000;
const MINUTE: i64 = 60_000;

async fn community_with(app: &TestApp, lead: &TestUser, members: &[&TestUser]) -> i64 {
    let community = app
        .services
        .communities
        .create(&lead.principal, "Study Group", "SG")
        .await
        .unwrap();
    for member in members {
        app.services
            .communities
            .join(&member.principal, community.id)
            .await
            .unwrap();
    }
    community.id
}

async fn insert_text_at(app: &TestApp, community_id: i64, sender: i64, text: &str, at: i64) -> i64 {
    let mut conn = app.db.acquire().await.unwrap();
    MessageRepository::create(
        &mut conn,
        community_id,
        sender,
        &MessageBody::Text {
            content: text.to_string(),
        },
        at,
    )
    .await
    .unwrap()
    .id
}

#[tokio::test]
async fn test_retrieval_ordering() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let c = community_with(&app, &alice, &[]).await;

    let m1 = insert_text_at(&app, c, alice.user.id, "m1", T_10_00).await;
    let m2 = insert_text_at(&app, c, alice.user.id, "m2", T_10_00 + MINUTE).await;
    let m3 = insert_text_at(&app, c, alice.user.id, "m3", T_10_00 + 2 * MINUTE).await;

    let latest = app
        .services
        .chat
        .get_messages(
            &alice.principal,
            c,
            &MessageWindow {
                limit: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(latest.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m3, m2]);

    let forward = app
        .services
        .chat
        .get_messages(
            &alice.principal,
            c,
            &MessageWindow {
                after: Some("2024-01-01T10:00:00Z".to_string()),
                limit: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(forward.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m2, m3]);

    let range = app
        .services
        .chat
        .get_messages(
            &alice.principal,
            c,
            &MessageWindow {
                after: Some("2024-01-01T09:59:00Z".to_string()),
                before: Some("2024-01-01T10:02:00Z".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(range.iter().map(|m| m.id).collect::<Vec<_>>(), vec![m2, m1]);
}

#[tokio::test]
async fn test_identical_timestamps_break_ties_by_id() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let c = community_with(&app, &alice, &[]).await;

    let a = insert_text_at(&app, c, alice.user.id, "a", T_10_00).await;
    let b = insert_text_at(&app, c, alice.user.id, "b", T_10_00).await;

    let desc = app
        .services
        .chat
        .get_messages(&alice.principal, c, &MessageWindow::default())
        .await
        .unwrap();
    assert_eq!(desc.iter().map(|m| m.id).collect::<Vec<_>>(), vec![b, a]);
}

#[tokio::test]
async fn test_sender_filter_and_membership() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let bob = create_student(&app, "bob", "22222222").await;
    let eve = create_student(&app, "eve", "33333333").await;
    let c = community_with(&app, &alice, &[&bob]).await;

    app.services.chat.send_text(&alice.principal, c, "hi").await.unwrap();
    app.services.chat.send_text(&bob.principal, c, " hey ").await.unwrap();

    let bobs = app
        .services
        .chat
        .get_messages(
            &alice.principal,
            c,
            &MessageWindow {
                sender: Some(bob.user.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].content.as_deref(), Some("hey"));
    assert_eq!(bobs[0].message_type, MessageType::Text);

    let outsider = app.services.chat.send_text(&eve.principal, c, "let me in").await.unwrap_err();
    assert_eq!(outsider.code(), "AUTH_008");
    let outsider = app
        .services
        .chat
        .get_messages(&eve.principal, c, &MessageWindow::default())
        .await
        .unwrap_err();
    assert_eq!(outsider.code(), "AUTH_008");

    let blank = app.services.chat.send_text(&alice.principal, c, "   ").await.unwrap_err();
    assert_eq!(blank.code(), "VAL_001");

    let missing = app.services.chat.send_text(&alice.principal, 9999, "hi").await.unwrap_err();
    assert_eq!(missing.code(), "RES_001");
}

#[tokio::test]
async fn test_lead_deletes_message_once() {
    let app = setup().await;
    let charlie = create_student(&app, "charlie", "11111111").await;
    let bob = create_student(&app, "bob", "22222222").await;
    let dave = create_student(&app, "dave", "33333333").await;
    let c = community_with(&app, &charlie, &[&bob, &dave]).await;

    let m = app.services.chat.send_text(&bob.principal, c, "oops").await.unwrap();

    let denied = app
        .services
        .chat
        .delete_message(&dave.principal, c, m.id)
        .await
        .unwrap_err();
    assert_eq!(denied.code(), "AUTH_008");

    app.services.chat.delete_message(&charlie.principal, c, m.id).await.unwrap();

    let again = app
        .services
        .chat
        .delete_message(&bob.principal, c, m.id)
        .await
        .unwrap_err();
    assert_eq!(again.code(), "RES_001");

    let visible = app
        .services
        .chat
        .get_messages(&charlie.principal, c, &MessageWindow::default())
        .await
        .unwrap();
    assert!(visible.is_empty());
}

#[tokio::test]
async fn test_file_message_attaches_to_message() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let c = community_with(&app, &alice, &[]).await;

    let sent = app
        .services
        .chat
        .send_file(&alice.principal, c, None, png("diagram.png"))
        .await
        .unwrap();
    assert_eq!(sent.message_type, MessageType::File);
    assert!(sent.content.is_none());

    let file_id = sent.file.as_ref().unwrap().id;
    let row = FileRepository::get_by_id(&app.db, file_id).await.unwrap().unwrap();
    assert_eq!(row.resource_type, ResourceType::Chat);
    assert_eq!(row.resource_id, Some(sent.id));
    assert!(app.blobs.contains(&row.path).await);

    let listed = app
        .services
        .chat
        .get_messages(&alice.principal, c, &MessageWindow::default())
        .await
        .unwrap();
    assert_eq!(listed[0].file.as_ref().unwrap().url, row.url);
}

#[tokio::test]
async fn test_failed_message_insert_discards_file() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let c = community_with(&app, &alice, &[]).await;

    sqlx::query(
        r#"
CREATE TRIGGER reject_file_messages BEFORE INSERT ON chat_messages
WHEN NEW.type = 'FILE'
BEGIN
    SELECT RAISE(ABORT, 'simulated insert failure');
END
        "#,
    )
    .execute(&app.db)
    .await
    .unwrap();

    let err = app
        .services
        .chat
        .send_file(&alice.principal, c, Some("caption"), png("lost.png"))
        .await
        .unwrap_err();
    assert!(err.is_server_error());

    assert_eq!(count(&app, "SELECT COUNT(*) FROM files").await, 0);
    assert!(app.blobs.is_empty().await);
    assert_eq!(count(&app, "SELECT COUNT(*) FROM chat_messages").await, 0);
}

#[tokio::test]
async fn test_blob_store_outage_surfaces_external_error() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let c = community_with(&app, &alice, &[]).await;

    app.blobs.set_fail_puts(true);
    let err = app
        .services
        .chat
        .send_file(&alice.principal, c, None, png("x.png"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "SRV_003");
    assert_eq!(count(&app, "SELECT COUNT(*) FROM files").await, 0);
}

#[tokio::test]
async fn test_file_messages_resolve_their_own_files() {
    let app = setup().await;
    let alice = create_student(&app, "alice", "11111111").await;
    let c = community_with(&app, &alice, &[]).await;

    let mut sent = Vec::new();
    for name in ["a.png", "b.png", "c.png"] {
        sent.push(
            app.services
                .chat
                .send_file(&alice.principal, c, None, png(name))
                .await
                .unwrap(),
        );
        app.services.chat.send_text(&alice.principal, c, "between").await.unwrap();
    }

    let listed = app
        .services
        .chat
        .get_messages(&alice.principal, c, &MessageWindow::default())
        .await
        .unwrap();
    assert_eq!(listed.len(), 6);
    for original in &sent {
        let found = listed.iter().find(|m| m.id == original.id).unwrap();
        assert_eq!(
            found.file.as_ref().unwrap().id,
            original.file.as_ref().unwrap().id
        );
    }
    assert!(listed
        .iter()
        .filter(|m| m.message_type == MessageType::Text)
        .all(|m| m.file.is_none()));

    let ids: Vec<i64> = sent.iter().map(|m| m.file.as_ref().unwrap().id).collect();
    let fetched = FileRepository::get_many(&app.db, &[ids[0], ids[2], 9999]).await.unwrap();
    assert_eq!(fetched.len(), 2);
    assert!(FileRepository::get_many(&app.db, &[]).await.unwrap().is_empty());
}
