// SPDX-FileCopyrightText: 2026 Chatportal Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end protocol behavior over a real temporary database.

use std::sync::Arc;

use chatportal_core::{ClientEvent, Role, ServerEvent, User, UserId};
use chatportal_realtime::{ConnHandle, Connection, ProtocolHandler, SessionRegistry};
use chatportal_storage::{queries, Database};
use tempfile::TempDir;
use tokio::sync::mpsc;

fn uid(s: &str) -> UserId {
    UserId(s.to_string())
}

fn account(id: &str, name: &str, role: Role) -> User {
    User {
        id: id.to_string(),
        name: name.to_string(),
        email: format!("{id}@example.com"),
        employee_id: format!("EMP-{id}"),
        password_hash: "$argon2id$test".to_string(),
        role,
        is_online: false,
        last_seen: "2026-01-01T00:00:00.000Z".to_string(),
        created_at: "2026-01-01T00:00:00.000Z".to_string(),
    }
}

async fn setup() -> (TempDir, Database, ProtocolHandler) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("portal.db");
    let db = Database::open(path.to_str().unwrap()).await.unwrap();
    queries::users::create_user(&db, &account("u1", "Alice", Role::Tester))
        .await
        .unwrap();
    queries::users::create_user(&db, &account("u2", "Bob", Role::Developer))
        .await
        .unwrap();
    let handler = ProtocolHandler::new(db.clone(), Arc::new(SessionRegistry::new()));
    (dir, db, handler)
}

async fn connect(handler: &ProtocolHandler, id: &str) -> (Connection, mpsc::Receiver<ServerEvent>) {
    let (handle, rx) = ConnHandle::new();
    let mut conn = Connection::new(handle);
    handler
        .handle_event(&mut conn, ClientEvent::UserConnected { user_id: uid(id) })
        .await;
    (conn, rx)
}

fn drain(rx: &mut mpsc::Receiver<ServerEvent>) -> Vec<ServerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn send(sender: &str, receiver: &str, body: &str) -> ClientEvent {
    ClientEvent::SendMessage {
        sender_id: uid(sender),
        receiver_id: uid(receiver),
        body: Some(body.to_string()),
        file: None,
    }
}

#[tokio::test]
async fn send_delivers_to_receiver_and_confirms_exactly_once() {
    let (_dir, _db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    let (_bob, mut bob_rx) = connect(&handler, "u2").await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    handler
        .handle_event(&mut alice, send("u1", "u2", "hello"))
        .await;

    let bob_events = drain(&mut bob_rx);
    assert!(matches!(
        &bob_events[0],
        ServerEvent::MessageReceived(view)
            if view.body.as_deref() == Some("hello") && view.sender.name == "Alice"
    ));
    assert!(matches!(
        &bob_events[1],
        ServerEvent::NewNotification { sender_id, .. } if sender_id.0 == "u1"
    ));
    assert!(matches!(
        &bob_events[2],
        ServerEvent::UnreadCountUpdate { sender_id, count: 1 } if sender_id.0 == "u1"
    ));
    assert_eq!(bob_events.len(), 3);

    let confirmations = drain(&mut alice_rx)
        .into_iter()
        .filter(|e| matches!(e, ServerEvent::MessageSent(_)))
        .count();
    assert_eq!(confirmations, 1);
}

#[tokio::test]
async fn send_to_offline_receiver_persists_without_delivery() {
    let (_dir, db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    drain(&mut alice_rx);

    handler
        .handle_event(&mut alice, send("u1", "u2", "while you were out"))
        .await;

    let alice_events = drain(&mut alice_rx);
    assert_eq!(alice_events.len(), 1);
    assert!(matches!(&alice_events[0], ServerEvent::MessageSent(_)));

    let count = queries::messages::count_unread(&db, "u1", "u2").await.unwrap();
    assert_eq!(count, 1);
    let log = queries::messages::conversation(&db, "u1", "u2").await.unwrap();
    assert_eq!(log.len(), 1);
    assert!(!log[0].is_read);
}

#[tokio::test]
async fn mark_read_notifies_sender_and_clears_counter_idempotently() {
    let (_dir, db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    let (mut bob, mut bob_rx) = connect(&handler, "u2").await;

    handler.handle_event(&mut alice, send("u1", "u2", "one")).await;
    handler.handle_event(&mut alice, send("u1", "u2", "two")).await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    let mark = ClientEvent::MarkAsRead {
        sender_id: uid("u1"),
        receiver_id: uid("u2"),
    };
    handler.handle_event(&mut bob, mark.clone()).await;

    let alice_events = drain(&mut alice_rx);
    assert!(alice_events
        .iter()
        .any(|e| matches!(e, ServerEvent::MessagesRead { receiver_id } if receiver_id.0 == "u2")));
    let bob_events = drain(&mut bob_rx);
    assert!(bob_events.iter().any(|e| matches!(
        e,
        ServerEvent::UnreadCountUpdate { sender_id, count: 0 } if sender_id.0 == "u1"
    )));
    assert_eq!(queries::messages::count_unread(&db, "u1", "u2").await.unwrap(), 0);

    // Repeat call flips nothing but produces the same notifications.
    handler.handle_event(&mut bob, mark).await;
    assert!(drain(&mut alice_rx)
        .iter()
        .any(|e| matches!(e, ServerEvent::MessagesRead { .. })));
    assert_eq!(queries::messages::count_unread(&db, "u1", "u2").await.unwrap(), 0);
}

#[tokio::test]
async fn empty_message_is_rejected_without_a_write() {
    let (_dir, db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    drain(&mut alice_rx);

    handler
        .handle_event(
            &mut alice,
            ClientEvent::SendMessage {
                sender_id: uid("u1"),
                receiver_id: uid("u2"),
                body: None,
                file: None,
            },
        )
        .await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerEvent::Error { .. }));
    let log = queries::messages::conversation(&db, "u1", "u2").await.unwrap();
    assert!(log.is_empty());
}

#[tokio::test]
async fn send_to_unknown_receiver_is_rejected_without_a_write() {
    let (_dir, db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    drain(&mut alice_rx);

    handler
        .handle_event(&mut alice, send("u1", "nobody", "hi"))
        .await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], ServerEvent::Error { .. }));
    let log = queries::messages::conversation(&db, "u1", "nobody").await.unwrap();
    assert!(log.is_empty());
}

#[tokio::test]
async fn typing_relays_only_to_online_receivers() {
    let (_dir, _db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    let (_bob, mut bob_rx) = connect(&handler, "u2").await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    handler
        .handle_event(
            &mut alice,
            ClientEvent::Typing {
                sender_id: uid("u1"),
                receiver_id: uid("u2"),
                is_typing: true,
            },
        )
        .await;
    let bob_events = drain(&mut bob_rx);
    assert_eq!(bob_events.len(), 1);
    assert!(matches!(
        &bob_events[0],
        ServerEvent::UserTyping { sender_id, is_typing: true } if sender_id.0 == "u1"
    ));

    // Relay to an offline peer is simply dropped.
    handler
        .handle_event(
            &mut alice,
            ClientEvent::Typing {
                sender_id: uid("u1"),
                receiver_id: uid("nobody"),
                is_typing: true,
            },
        )
        .await;
    assert!(drain(&mut alice_rx).is_empty());
}

#[tokio::test]
async fn observers_get_snapshot_joins_and_leaves() {
    let (_dir, _db, handler) = setup().await;
    let (alice, mut alice_rx) = connect(&handler, "u1").await;
    drain(&mut alice_rx);

    let (handle, mut admin_rx) = ConnHandle::new();
    let mut admin = Connection::new(handle);
    handler
        .handle_event(&mut admin, ClientEvent::AdminConnected)
        .await;

    let admin_events = drain(&mut admin_rx);
    assert!(matches!(
        &admin_events[0],
        ServerEvent::CurrentOnlineSnapshot { user_ids } if user_ids == &vec![uid("u1")]
    ));

    let (_bob, mut bob_rx) = connect(&handler, "u2").await;
    drain(&mut bob_rx);
    let admin_events = drain(&mut admin_rx);
    assert!(admin_events.iter().any(|e| matches!(
        e,
        ServerEvent::UserStatusChanged { user_id, is_online: true } if user_id.0 == "u2"
    )));
    assert!(admin_events
        .iter()
        .any(|e| matches!(e, ServerEvent::UserJoined { user_id } if user_id.0 == "u2")));

    handler.disconnect(&alice).await;
    let admin_events = drain(&mut admin_rx);
    assert!(admin_events.iter().any(|e| matches!(
        e,
        ServerEvent::UserStatusChanged { user_id, is_online: false } if user_id.0 == "u1"
    )));
    assert!(admin_events
        .iter()
        .any(|e| matches!(e, ServerEvent::UserLeft { user_id } if user_id.0 == "u1")));
}

#[tokio::test]
async fn reannounce_under_new_identity_takes_old_identity_offline() {
    let (_dir, db, handler) = setup().await;
    let (mut conn, mut rx) = connect(&handler, "u1").await;
    drain(&mut rx);

    handler
        .handle_event(&mut conn, ClientEvent::UserConnected { user_id: uid("u2") })
        .await;

    assert!(handler.registry().lookup(&uid("u1")).is_none());
    assert!(handler.registry().lookup(&uid("u2")).is_some());
    let u1 = queries::users::get_user(&db, "u1").await.unwrap().unwrap();
    assert!(!u1.is_online);
    let u2 = queries::users::get_user(&db, "u2").await.unwrap().unwrap();
    assert!(u2.is_online);
}

#[tokio::test]
async fn repeat_announce_of_same_identity_does_not_flap_presence() {
    let (_dir, db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    let (_bob, mut bob_rx) = connect(&handler, "u2").await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    handler
        .handle_event(&mut alice, ClientEvent::UserConnected { user_id: uid("u1") })
        .await;

    // The peer never sees an offline transition for u1.
    assert!(!drain(&mut bob_rx).iter().any(|e| matches!(
        e,
        ServerEvent::UserStatusChanged { user_id, is_online: false } if user_id.0 == "u1"
    )));
    assert!(handler.registry().lookup(&uid("u1")).is_some());
    let u1 = queries::users::get_user(&db, "u1").await.unwrap().unwrap();
    assert!(u1.is_online);
}

#[tokio::test]
async fn superseded_connection_disconnect_keeps_user_online() {
    let (_dir, db, handler) = setup().await;
    let (old, mut old_rx) = connect(&handler, "u1").await;
    let (_new, mut new_rx) = connect(&handler, "u1").await;
    drain(&mut old_rx);
    drain(&mut new_rx);

    handler.disconnect(&old).await;

    // The replacement session is untouched and no offline broadcast happened.
    assert!(handler.registry().lookup(&uid("u1")).is_some());
    assert!(drain(&mut new_rx).is_empty());
    let user = queries::users::get_user(&db, "u1").await.unwrap().unwrap();
    assert!(user.is_online);
}

#[tokio::test]
async fn disconnect_marks_user_offline_and_records_last_seen() {
    let (_dir, db, handler) = setup().await;
    let (alice, mut alice_rx) = connect(&handler, "u1").await;
    drain(&mut alice_rx);

    handler.disconnect(&alice).await;

    assert!(handler.registry().lookup(&uid("u1")).is_none());
    let user = queries::users::get_user(&db, "u1").await.unwrap().unwrap();
    assert!(!user.is_online);
    assert!(user.last_seen.ends_with('Z'));
    assert_ne!(user.last_seen, "2026-01-01T00:00:00.000Z");
}

#[tokio::test]
async fn counter_tracks_interleaved_sends_and_reads() {
    let (_dir, db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    let (mut bob, mut bob_rx) = connect(&handler, "u2").await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    handler.handle_event(&mut alice, send("u1", "u2", "a")).await;
    handler
        .handle_event(
            &mut bob,
            ClientEvent::MarkAsRead {
                sender_id: uid("u1"),
                receiver_id: uid("u2"),
            },
        )
        .await;
    handler.handle_event(&mut alice, send("u1", "u2", "b")).await;
    handler.handle_event(&mut alice, send("u1", "u2", "c")).await;

    let counters: Vec<i64> = drain(&mut bob_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::UnreadCountUpdate { count, .. } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(counters, vec![1, 0, 1, 2]);
    assert_eq!(queries::messages::count_unread(&db, "u1", "u2").await.unwrap(), 2);
}

#[tokio::test]
async fn per_pair_delivery_order_matches_processing_order() {
    let (_dir, _db, handler) = setup().await;
    let (mut alice, mut alice_rx) = connect(&handler, "u1").await;
    let (_bob, mut bob_rx) = connect(&handler, "u2").await;
    drain(&mut alice_rx);
    drain(&mut bob_rx);

    for body in ["first", "second", "third"] {
        handler.handle_event(&mut alice, send("u1", "u2", body)).await;
    }

    let bodies: Vec<String> = drain(&mut bob_rx)
        .into_iter()
        .filter_map(|e| match e {
            ServerEvent::MessageReceived(view) => view.body,
            _ => None,
        })
        .collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
}
