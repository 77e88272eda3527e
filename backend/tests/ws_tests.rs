//! WebSocket Integration Tests for the Booking Server
//!
//! These tests verify room subscriptions and live notices over real
//! WebSocket connections.

use booking_server::{
    api::AppState,
    create_test_app,
    ws::messages::{ClientMessage, ServerMessage},
};
use chrono::{Duration, Utc};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct TestClient {
    http: reqwest::Client,
    base_url: String,
    state: Arc<AppState>,
}

impl TestClient {
    async fn register(&self, name: &str, role: &str) -> (String, String) {
        let body = self.register_account(name, role).await;
        (
            body["user"]["id"].as_str().unwrap().to_string(),
            body["token"].as_str().unwrap().to_string(),
        )
    }

    /// An organizer's token and the id of its association.
    async fn register_organizer(&self, name: &str) -> (String, String) {
        let body = self.register_account(name, "organizer").await;
        (
            body["token"].as_str().unwrap().to_string(),
            body["association"]["id"].as_str().unwrap().to_string(),
        )
    }

    async fn register_account(&self, name: &str, role: &str) -> Value {
        let response = self
            .http
            .post(format!("{}/api/auth/register", self.base_url))
            .json(&json!({
                "name": name,
                "email": format!("{}@example.com", name),
                "password": "Password123",
                "role": role
            }))
            .send()
            .await
            .unwrap();

        response.json().await.unwrap()
    }

    async fn post(&self, path: &str, token: &str, body: Value) -> Value {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", token))
            .json(&body)
            .send()
            .await
            .unwrap();

        assert!(response.status().is_success(), "{} failed", path);
        response.json().await.unwrap()
    }

    /// An organizer account with one event three days out.
    async fn organizer_with_event(&self) -> (String, String) {
        let (_, token) = self.register("club", "organizer").await;

        let terrain = self
            .post(
                "/api/terrains",
                &token,
                json!({ "name": "Pitch 1", "images": [] }),
            )
            .await;

        let starts_at = Utc::now() + Duration::days(3);
        let event = self
            .post(
                "/api/events",
                &token,
                json!({
                    "terrain_id": terrain["id"],
                    "name": "Evening match",
                    "starts_at": starts_at,
                    "ends_at": starts_at + Duration::hours(2),
                    "price": 1000,
                    "capacity": 10
                }),
            )
            .await;

        (token, event["id"].as_str().unwrap().to_string())
    }
}

/// Test helper to spin up a server and return its address
async fn spawn_server() -> (SocketAddr, TestClient) {
    let (app, state) = create_test_app().await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = TestClient {
        http: reqwest::Client::new(),
        base_url: format!("http://{}", addr),
        state,
    };

    (addr, client)
}

async fn connect(addr: SocketAddr, token: &str) -> WsStream {
    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let (mut ws_stream, _) = connect_async(&ws_url).await.expect("Failed to connect");

    let greeting = next_message(&mut ws_stream).await;
    assert!(matches!(greeting, ServerMessage::Connected));

    ws_stream
}

async fn send(ws_stream: &mut WsStream, message: &ClientMessage) {
    let text = serde_json::to_string(message).unwrap();
    ws_stream.send(Message::Text(text)).await.unwrap();
}

async fn next_message(ws_stream: &mut WsStream) -> ServerMessage {
    let msg = tokio::time::timeout(std::time::Duration::from_secs(5), ws_stream.next())
        .await
        .expect("Timed out waiting for a server message")
        .unwrap()
        .unwrap();

    match msg {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("Expected text message, got {:?}", other),
    }
}

/// Nothing arrives within a short grace period.
async fn assert_silent(ws_stream: &mut WsStream) {
    let next = tokio::time::timeout(std::time::Duration::from_millis(300), ws_stream.next()).await;
    assert!(next.is_err(), "unexpected message: {:?}", next);
}

async fn join_room(ws_stream: &mut WsStream, event_id: &str) {
    send(
        ws_stream,
        &ClientMessage::JoinEvent {
            event_id: event_id.to_string(),
        },
    )
    .await;

    match next_message(ws_stream).await {
        ServerMessage::JoinedEvent { event_id: joined } => assert_eq!(joined, event_id),
        other => panic!("Expected JoinedEvent, got {:?}", other),
    }
}

// ============================================================================
// Connection
// ============================================================================

#[tokio::test]
async fn test_ws_connect_and_receive_connected_message() {
    let (addr, client) = spawn_server().await;
    let (_, token) = client.register("alice", "player").await;

    connect(addr, &token).await;
}

#[tokio::test]
async fn test_ws_connect_with_invalid_token() {
    let (addr, _client) = spawn_server().await;

    let ws_url = format!("ws://{}/ws?token=invalid_token", addr);
    let result = connect_async(&ws_url).await;

    // The upgrade is refused with 401
    assert!(result.is_err());
}

#[tokio::test]
async fn test_ws_blocked_account_is_refused() {
    let (addr, client) = spawn_server().await;
    let (alice_id, token) = client.register("alice", "player").await;

    sqlx::query("UPDATE users SET blocked = 1 WHERE id = ?")
        .bind(&alice_id)
        .execute(&client.state.pool)
        .await
        .unwrap();

    let ws_url = format!("ws://{}/ws?token={}", addr, token);
    let err = connect_async(&ws_url)
        .await
        .err()
        .expect("A blocked account must not connect");

    match err {
        tokio_tungstenite::tungstenite::Error::Http(response) => {
            assert_eq!(response.status().as_u16(), 403)
        }
        other => panic!("Expected an HTTP refusal, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_ping_pong() {
    let (addr, client) = spawn_server().await;
    let (_, token) = client.register("alice", "player").await;
    let mut ws_stream = connect(addr, &token).await;

    send(&mut ws_stream, &ClientMessage::Ping).await;

    assert!(matches!(next_message(&mut ws_stream).await, ServerMessage::Pong));
}

#[tokio::test]
async fn test_ws_unrecognised_message_gets_error() {
    let (addr, client) = spawn_server().await;
    let (_, token) = client.register("alice", "player").await;
    let mut ws_stream = connect(addr, &token).await;

    ws_stream
        .send(Message::Text(r#"{"type":"Dance"}"#.to_string()))
        .await
        .unwrap();

    assert!(matches!(
        next_message(&mut ws_stream).await,
        ServerMessage::Error { .. }
    ));

    // The connection stays usable afterwards.
    send(&mut ws_stream, &ClientMessage::Ping).await;
    assert!(matches!(next_message(&mut ws_stream).await, ServerMessage::Pong));
}

// ============================================================================
// Rooms
// ============================================================================

#[tokio::test]
async fn test_ws_join_and_leave_event_room() {
    let (addr, client) = spawn_server().await;
    let (_, token) = client.register("alice", "player").await;
    let mut ws_stream = connect(addr, &token).await;

    join_room(&mut ws_stream, "event-1").await;

    send(
        &mut ws_stream,
        &ClientMessage::LeaveEvent {
            event_id: "event-1".to_string(),
        },
    )
    .await;

    match next_message(&mut ws_stream).await {
        ServerMessage::LeftEvent { event_id } => assert_eq!(event_id, "event-1"),
        other => panic!("Expected LeftEvent, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_group_message_reaches_room_members() {
    let (addr, client) = spawn_server().await;
    let (organizer_token, event_id) = client.organizer_with_event().await;
    let (_, alice_token) = client.register("alice", "player").await;
    client
        .post(
            "/api/registrations",
            &alice_token,
            json!({ "event_id": event_id }),
        )
        .await;

    let mut organizer_ws = connect(addr, &organizer_token).await;
    join_room(&mut organizer_ws, &event_id).await;

    client
        .post(
            "/api/messages",
            &alice_token,
            json!({ "kind": "group", "event_id": event_id, "content": "Who brings the ball?" }),
        )
        .await;

    match next_message(&mut organizer_ws).await {
        ServerMessage::NewMessage { message, author } => {
            assert_eq!(message.content, "Who brings the ball?");
            assert_eq!(message.event_id.as_deref(), Some(event_id.as_str()));
            assert_eq!(author.name, "alice");
        }
        other => panic!("Expected NewMessage, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_broadcast_reaches_room_members() {
    let (addr, client) = spawn_server().await;
    let (organizer_token, event_id) = client.organizer_with_event().await;
    let (_, alice_token) = client.register("alice", "player").await;

    let mut alice_ws = connect(addr, &alice_token).await;
    join_room(&mut alice_ws, &event_id).await;

    client
        .post(
            &format!("/api/messages/event/{}/broadcast", event_id),
            &organizer_token,
            json!({ "content": "Kick-off moved to 19:30" }),
        )
        .await;

    match next_message(&mut alice_ws).await {
        ServerMessage::BroadcastMessage { message, event } => {
            assert_eq!(message.content, "Kick-off moved to 19:30");
            assert_eq!(event.id, event_id);
            assert_eq!(event.name, "Evening match");
        }
        other => panic!("Expected BroadcastMessage, got {:?}", other),
    }
}

// ============================================================================
// Personal notices
// ============================================================================

#[tokio::test]
async fn test_ws_event_cancellation_notifies_registrants() {
    let (addr, client) = spawn_server().await;
    let (organizer_token, event_id) = client.organizer_with_event().await;
    let (_, alice_token) = client.register("alice", "player").await;
    client
        .post(
            "/api/registrations",
            &alice_token,
            json!({ "event_id": event_id }),
        )
        .await;

    // Not in the room: the notice arrives on the personal channel.
    let mut alice_ws = connect(addr, &alice_token).await;

    client
        .post(
            &format!("/api/events/{}/cancel", event_id),
            &organizer_token,
            json!({}),
        )
        .await;

    match next_message(&mut alice_ws).await {
        ServerMessage::EventCancelled { event } => assert_eq!(event.id, event_id),
        other => panic!("Expected EventCancelled, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_ban_notifies_player() {
    let (addr, client) = spawn_server().await;
    let (organizer_token, event_id) = client.organizer_with_event().await;
    let (alice_id, alice_token) = client.register("alice", "player").await;
    client
        .post(
            "/api/registrations",
            &alice_token,
            json!({ "event_id": event_id }),
        )
        .await;

    let mut alice_ws = connect(addr, &alice_token).await;

    client
        .post(
            "/api/associations/me/bans",
            &organizer_token,
            json!({ "player_id": alice_id, "reason": "Repeated no-shows" }),
        )
        .await;

    match next_message(&mut alice_ws).await {
        ServerMessage::RegistrationBlocked { event, reason } => {
            assert_eq!(event.id, event_id);
            assert_eq!(reason, "Repeated no-shows");
        }
        other => panic!("Expected RegistrationBlocked, got {:?}", other),
    }
}

#[tokio::test]
async fn test_ws_private_message_reaches_only_both_parties() {
    let (addr, client) = spawn_server().await;
    let (owner_token, association_id) = client.register_organizer("club").await;
    let (_, alice_token) = client.register("alice", "player").await;
    let (_, bob_token) = client.register("bob", "player").await;

    let mut owner_ws = connect(addr, &owner_token).await;
    let mut alice_ws = connect(addr, &alice_token).await;
    let mut bob_ws = connect(addr, &bob_token).await;

    client
        .post(
            "/api/messages",
            &alice_token,
            json!({
                "kind": "private",
                "association_id": association_id,
                "content": "Is there parking near the pitch?"
            }),
        )
        .await;

    for ws_stream in [&mut owner_ws, &mut alice_ws] {
        match next_message(ws_stream).await {
            ServerMessage::NewMessage { message, author } => {
                assert_eq!(message.content, "Is there parking near the pitch?");
                assert_eq!(message.association_id.as_deref(), Some(association_id.as_str()));
                assert_eq!(author.name, "alice");
            }
            other => panic!("Expected NewMessage, got {:?}", other),
        }
    }

    assert_silent(&mut bob_ws).await;
}
