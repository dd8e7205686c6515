// SPDX-FileCopyrightText: 2026 Taskchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: real gateway, real SQLite, real WebSocket clients.

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use taskchat_client::{ChatClient, ConnectionState};
use taskchat_core::{ChatEvent, EventKind, MessageType, Role, RoomDetails};
use taskchat_test_utils::{TestHarness, assignment, identity, token_for};

const WAIT: Duration = Duration::from_secs(3);

const OWNER: i64 = 1;
const WORKER: i64 = 2;
const OUTSIDER: i64 = 3;

async fn harness() -> TestHarness {
    TestHarness::builder()
        .with_task(assignment(42, OWNER, Some(WORKER)))
        .with_user(OWNER)
        .with_user(WORKER)
        .with_user(OUTSIDER)
        .build()
        .await
        .unwrap()
}

fn joined_room(event: Option<ChatEvent>) -> (RoomDetails, Vec<taskchat_core::Message>) {
    match event {
        Some(ChatEvent::RoomJoined { room, messages }) => (room, messages),
        other => panic!("expected room-joined, got {other:?}"),
    }
}

fn new_message(event: Option<ChatEvent>) -> taskchat_core::Message {
    match event {
        Some(ChatEvent::NewMessage(message)) => message,
        other => panic!("expected new-message, got {other:?}"),
    }
}

#[tokio::test]
async fn owner_and_worker_chat_on_task_42() {
    let harness = harness().await;

    let (owner, mut owner_log) = harness.connect(OWNER).await.unwrap();
    owner.join_task_room(42).unwrap();
    let (room, backlog) = joined_room(owner_log.wait_for(EventKind::RoomJoined, WAIT).await);
    assert_eq!(room.room.owner_id, OWNER);
    assert_eq!(room.room.bidder_id, WORKER);
    assert_eq!(room.other_user.id, WORKER);
    assert!(backlog.is_empty());

    let (worker, mut worker_log) = harness.connect(WORKER).await.unwrap();
    worker.join_task_room(42).unwrap();
    let (same, _) = joined_room(worker_log.wait_for(EventKind::RoomJoined, WAIT).await);
    assert_eq!(same.room.id, room.room.id);
    assert_eq!(same.other_user.role, Role::Owner);
    assert_eq!(harness.tasks.calls(), 1);

    worker.send_message(42, "hi", MessageType::Text).unwrap();
    let echoed = new_message(worker_log.wait_for(EventKind::NewMessage, WAIT).await);
    let hi = new_message(owner_log.wait_for(EventKind::NewMessage, WAIT).await);
    assert_eq!(hi.id, echoed.id);
    assert_eq!(hi.message, "hi");
    assert_eq!(hi.sender_role, Role::Bidder);

    let stored = harness.engine.get_room_by_task(42, OWNER).await.unwrap();
    assert_eq!(stored.unread_count.owner, 1);
    assert_eq!(stored.unread_count.bidder, 0);

    owner
        .mark_messages_read(&room.room.id, vec![hi.id.clone()])
        .unwrap();
    match owner_log.wait_for(EventKind::MessagesRead, WAIT).await {
        Some(ChatEvent::MessagesRead {
            room_id,
            unread_count,
        }) => {
            assert_eq!(room_id, room.room.id);
            assert_eq!(unread_count, 0);
        }
        other => panic!("expected messages-read, got {other:?}"),
    }

    owner.send_message(42, "hello", MessageType::Text).unwrap();
    let hello = new_message(worker_log.wait_for(EventKind::NewMessage, WAIT).await);
    assert_eq!(hello.sender_role, Role::Owner);

    let stored = harness.engine.get_room_by_task(42, OWNER).await.unwrap();
    assert_eq!(stored.unread_count.owner, 0);
    assert_eq!(stored.unread_count.bidder, 1);

    // Read receipts are reader-specific and never broadcast.
    assert!(
        worker_log
            .drain()
            .iter()
            .all(|e| e.kind() != EventKind::MessagesRead)
    );
}

#[tokio::test]
async fn outsider_gets_an_in_band_error_and_stays_connected() {
    let harness = harness().await;
    let (outsider, mut log) = harness.connect(OUTSIDER).await.unwrap();

    outsider.join_task_room(42).unwrap();
    match log.wait_for(EventKind::Error, WAIT).await {
        Some(ChatEvent::Error { code, .. }) => assert_eq!(code.as_deref(), Some("ACCESS_DENIED")),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(outsider.state(), ConnectionState::Connected);

    outsider.join_task_room(999).unwrap();
    match log.wait_for(EventKind::Error, WAIT).await {
        Some(ChatEvent::Error { code, .. }) => assert_eq!(code.as_deref(), Some("NOT_FOUND")),
        other => panic!("expected error, got {other:?}"),
    }
    assert!(outsider.is_connected());
}

#[tokio::test]
async fn typing_indicator_expires_without_stop() {
    let harness = harness().await;
    let (owner, mut owner_log) = harness.connect(OWNER).await.unwrap();
    let (worker, mut worker_log) = harness.connect(WORKER).await.unwrap();
    owner.join_task_room(42).unwrap();
    owner_log.wait_for(EventKind::RoomJoined, WAIT).await.unwrap();
    worker.join_task_room(42).unwrap();
    worker_log.wait_for(EventKind::RoomJoined, WAIT).await.unwrap();

    let started = Instant::now();
    worker.send_typing(42).unwrap();
    assert_eq!(
        owner_log.wait_for(EventKind::UserTyping, WAIT).await,
        Some(ChatEvent::UserTyping {
            user_id: WORKER,
            is_typing: true
        })
    );
    assert_eq!(
        owner_log
            .wait_for(EventKind::UserTyping, Duration::from_secs(5))
            .await,
        Some(ChatEvent::UserTyping {
            user_id: WORKER,
            is_typing: false
        })
    );
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(2500), "{elapsed:?}");
    assert!(elapsed <= Duration::from_secs(4), "{elapsed:?}");

    // The typist never hears about itself.
    assert!(
        worker_log
            .drain()
            .iter()
            .all(|e| e.kind() != EventKind::UserTyping)
    );
}

#[tokio::test]
async fn stop_typing_clears_the_indicator_at_once() {
    let harness = harness().await;
    let (owner, mut owner_log) = harness.connect(OWNER).await.unwrap();
    let (worker, mut worker_log) = harness.connect(WORKER).await.unwrap();
    owner.join_task_room(42).unwrap();
    owner_log.wait_for(EventKind::RoomJoined, WAIT).await.unwrap();
    worker.join_task_room(42).unwrap();
    worker_log.wait_for(EventKind::RoomJoined, WAIT).await.unwrap();

    worker.send_typing(42).unwrap();
    owner_log.wait_for(EventKind::UserTyping, WAIT).await.unwrap();
    worker.send_stop_typing(42).unwrap();
    assert_eq!(
        owner_log
            .wait_for(EventKind::UserTyping, Duration::from_secs(1))
            .await,
        Some(ChatEvent::UserTyping {
            user_id: WORKER,
            is_typing: false
        })
    );
}

#[tokio::test]
async fn typing_requires_joining_first() {
    let harness = harness().await;
    let (owner, mut log) = harness.connect(OWNER).await.unwrap();
    owner.send_typing(42).unwrap();
    match log.wait_for(EventKind::Error, WAIT).await {
        Some(ChatEvent::Error { code, .. }) => assert_eq!(code.as_deref(), Some("ACCESS_DENIED")),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_token_fails_the_handshake() {
    let harness = harness().await;
    let client = ChatClient::new(harness.client_settings());
    let err = client.connect("not-a-token").await.unwrap_err();
    assert_eq!(err.code(), "AUTH_ERROR");
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(harness.sessions.connected_user_count(), 0);
}

#[tokio::test]
async fn malformed_frames_get_an_error_event() {
    let harness = harness().await;
    let mut request = harness.ws_url().into_client_request().unwrap();
    request.headers_mut().insert(
        "authorization",
        format!("Bearer {}", token_for(OWNER)).parse().unwrap(),
    );
    let (mut ws, _) = tokio_tungstenite::connect_async(request).await.unwrap();

    async fn next_event(
        ws: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    ) -> ChatEvent {
        loop {
            let frame = tokio::time::timeout(WAIT, ws.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if let WsMessage::Text(text) = frame {
                return ChatEvent::from_frame(text.as_str()).unwrap();
            }
        }
    }

    assert!(matches!(
        next_event(&mut ws).await,
        ChatEvent::Connected { user_id: OWNER, .. }
    ));

    ws.send(WsMessage::Text(String::from("{not json").into()))
        .await
        .unwrap();
    match next_event(&mut ws).await {
        ChatEvent::Error { code, .. } => assert_eq!(code.as_deref(), Some("VALIDATION_ERROR")),
        other => panic!("expected error, got {other:?}"),
    }

    // The connection survives and still serves room traffic.
    let join = r#"{"event":"join-task-room","data":{"taskId":42}}"#;
    ws.send(WsMessage::Text(String::from(join).into()))
        .await
        .unwrap();
    assert!(matches!(
        next_event(&mut ws).await,
        ChatEvent::RoomJoined { .. }
    ));
}

#[tokio::test]
async fn server_shutdown_ends_in_a_terminal_error() {
    let mut harness = harness().await;
    let (client, mut log) = harness.connect(OWNER).await.unwrap();
    assert_eq!(
        log.wait_for(EventKind::Connected, WAIT)
            .await
            .map(|e| e.kind()),
        Some(EventKind::Connected)
    );

    harness.shutdown().await;

    match log.wait_for(EventKind::Disconnected, WAIT).await {
        Some(ChatEvent::Disconnected { reason }) => assert_eq!(reason, "server shutdown"),
        other => panic!("expected disconnected, got {other:?}"),
    }
    match log.wait_for(EventKind::Error, Duration::from_secs(10)).await {
        Some(ChatEvent::Error { code, .. }) => {
            assert_eq!(code.as_deref(), Some("CONNECTION_ERROR"))
        }
        other => panic!("expected terminal error, got {other:?}"),
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.reconnect_attempts(), 2);
}

#[tokio::test]
async fn presence_follows_connections() {
    let harness = harness().await;
    let (client, _log) = harness.connect(WORKER).await.unwrap();
    assert!(harness.sessions.is_user_online(WORKER));

    client.disconnect().await;
    let deadline = Instant::now() + WAIT;
    while harness.sessions.is_user_online(WORKER) && Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(!harness.sessions.is_user_online(WORKER));
}

#[tokio::test]
async fn rest_surface_enforces_tokens_and_membership() {
    let harness = harness().await;
    let http = reqwest::Client::new();

    let health: Value = http
        .get(harness.http_url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["activeRooms"], 0);

    let anonymous = http
        .get(harness.http_url("/api/chat/rooms"))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), 401);
    let body: Value = anonymous.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_ERROR");

    let opened: Value = http
        .post(harness.http_url("/api/chat/rooms/task/42"))
        .bearer_auth(token_for(OWNER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(opened["data"]["room"]["taskId"], 42);
    assert_eq!(opened["data"]["room"]["otherUser"]["id"], WORKER);
    let room_id = opened["data"]["room"]["id"].as_str().unwrap().to_string();

    harness
        .engine
        .send_message(&room_id, &identity(WORKER), "hi", MessageType::Text)
        .await
        .unwrap();

    let unread: Value = http
        .get(harness.http_url("/api/chat/unread-count"))
        .bearer_auth(token_for(OWNER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(unread["data"]["totalUnread"], 1);

    let page: Value = http
        .get(harness.http_url(&format!("/api/chat/rooms/{room_id}/messages?limit=10")))
        .bearer_auth(token_for(OWNER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = page["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["senderRole"], "bidder");
    let message_id = messages[0]["id"].as_str().unwrap().to_string();

    let read: Value = http
        .post(harness.http_url(&format!("/api/chat/rooms/{room_id}/messages/read")))
        .bearer_auth(token_for(OWNER))
        .json(&serde_json::json!({ "messageIds": [message_id] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(read["data"]["unreadCount"], 0);

    let denied = http
        .get(harness.http_url("/api/chat/rooms/task/42"))
        .bearer_auth(token_for(OUTSIDER))
        .send()
        .await
        .unwrap();
    assert_eq!(denied.status(), 403);

    let listed: Value = http
        .get(harness.http_url("/api/chat/rooms"))
        .bearer_auth(token_for(WORKER))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed["data"]["rooms"].as_array().unwrap().len(), 1);
    assert_eq!(listed["data"]["rooms"][0]["lastMessage"]["message"], "hi");
}

#[tokio::test]
async fn rest_requests_are_limited_per_user() {
    let harness = TestHarness::builder()
        .with_task(assignment(42, OWNER, Some(WORKER)))
        .with_user(OWNER)
        .with_user(WORKER)
        .with_rate_limit(3, 900)
        .build()
        .await
        .unwrap();
    let http = reqwest::Client::new();
    let rooms = harness.http_url("/api/chat/rooms");

    for _ in 0..3 {
        let ok = http
            .get(&rooms)
            .bearer_auth(token_for(OWNER))
            .send()
            .await
            .unwrap();
        assert_eq!(ok.status(), 200);
    }

    let limited = http
        .get(&rooms)
        .bearer_auth(token_for(OWNER))
        .send()
        .await
        .unwrap();
    assert_eq!(limited.status(), 429);
    let body: Value = limited.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "RATE_LIMITED");

    let other = http
        .get(&rooms)
        .bearer_auth(token_for(WORKER))
        .send()
        .await
        .unwrap();
    assert_eq!(other.status(), 200);

    // Unauthenticated calls are rejected before they count against anyone.
    let anonymous = http.get(&rooms).send().await.unwrap();
    assert_eq!(anonymous.status(), 401);

    let health = http.get(harness.http_url("/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
}
