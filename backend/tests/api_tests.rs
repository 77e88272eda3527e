//! Integration tests for the Event Booking Server API
//!
//! These tests verify that the HTTP API endpoints work correctly
//! with a real database and authentication flow.

mod common;

use axum::http::{header::AUTHORIZATION, StatusCode};
use axum_test::TestServer;
use booking_server::create_test_app;
use chrono::{Duration, Utc};
use common::*;
use serde_json::{json, Value};

/// Helper to create a test server instance
async fn setup() -> TestServer {
    let (app, _state) = create_test_app().await;
    TestServer::new(app).unwrap()
}

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = setup().await;

    let response = server.get("/health").await;

    response.assert_status_ok();
    response.assert_text("OK");
}

#[tokio::test]
async fn test_root_endpoint() {
    let server = setup().await;

    let response = server.get("/").await;

    response.assert_status_ok();
    response.assert_text("Event Booking Server");
}

// ============================================================================
// Authentication Tests
// ============================================================================

#[tokio::test]
async fn test_register_player() {
    let server = setup().await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Alice",
            "email": "Alice@Example.com",
            "password": PASSWORD,
            "role": "player"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["name"], "Alice");
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert_eq!(body["user"]["role"], "player");
    assert!(body["user"].get("password_hash").is_none());
    assert!(body["association"].is_null());
}

#[tokio::test]
async fn test_register_organizer_creates_association() {
    let server = setup().await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Bob",
            "email": "bob@example.com",
            "password": PASSWORD,
            "role": "organizer",
            "association_name": "FC Riverside"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["association"]["name"], "FC Riverside");
    assert_eq!(body["association"]["user_id"], body["user"]["id"]);
}

#[tokio::test]
async fn test_register_duplicate_email_case_insensitive() {
    let server = setup().await;
    register(&server, "Alice", "alice@example.com", "player").await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Other Alice",
            "email": "ALICE@example.com",
            "password": PASSWORD,
            "role": "player"
        }))
        .await;

    response.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_weak_password() {
    let server = setup().await;

    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "name": "Alice",
            "email": "alice@example.com",
            "password": "short",
            "role": "player"
        }))
        .await;

    response.assert_status_bad_request();
    assert!(response.json::<Value>()["error"].is_string());
}

#[tokio::test]
async fn test_login_success() {
    let server = setup().await;
    register(&server, "Alice", "alice@example.com", "player").await;

    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": PASSWORD }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["token"].is_string());
    assert_eq!(body["user"]["name"], "Alice");
}

#[tokio::test]
async fn test_login_wrong_password() {
    let server = setup().await;
    register(&server, "Alice", "alice@example.com", "player").await;

    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": "WrongPassword1" }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_login_unknown_email() {
    let server = setup().await;

    let response = server
        .post("/api/auth/login")
        .json(&json!({ "email": "nobody@example.com", "password": PASSWORD }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn test_blocked_account_cannot_login_or_use_token() {
    let (app, state) = create_test_app().await;
    let server = TestServer::new(app).unwrap();
    let alice = register(&server, "Alice", "alice@example.com", "player").await;

    sqlx::query("UPDATE users SET blocked = 1 WHERE id = ?")
        .bind(&alice.id)
        .execute(&state.pool)
        .await
        .unwrap();

    server
        .post("/api/auth/login")
        .json(&json!({ "email": "alice@example.com", "password": PASSWORD }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, alice.bearer())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_me_returns_profile_and_association() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;

    let response = server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, organizer.bearer())
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["user"]["id"], organizer.id.as_str());
    assert_eq!(
        body["association"]["id"],
        organizer.association_id.as_deref().unwrap()
    );
}

#[tokio::test]
async fn test_me_requires_token() {
    let server = setup().await;

    server.get("/api/auth/me").await.assert_status_unauthorized();

    server
        .get("/api/auth/me")
        .add_header(AUTHORIZATION, "Bearer not-a-token")
        .await
        .assert_status_unauthorized();
}

// ============================================================================
// Terrain Tests
// ============================================================================

#[tokio::test]
async fn test_terrain_crud() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;
    let terrain_id = create_terrain(&server, &organizer).await;

    let all: Value = server.get("/api/terrains").await.json();
    assert_eq!(all.as_array().unwrap().len(), 1);
    assert_eq!(all[0]["images"][0], "https://img.test/pitch-1.jpg");

    let response = server
        .put(&format!("/api/terrains/{}", terrain_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({ "name": "Center court", "images": [] }))
        .await;
    response.assert_status_ok();
    let updated: Value = response.json();
    assert_eq!(updated["name"], "Center court");
    assert_eq!(updated["images"], json!([]));

    let own: Value = server
        .get("/api/terrains/association")
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .json();
    assert_eq!(own[0]["name"], "Center court");

    server
        .delete(&format!("/api/terrains/{}", terrain_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let all: Value = server.get("/api/terrains").await.json();
    assert!(all.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_terrain_rejects_bad_image_url() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;

    server
        .post("/api/terrains")
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({ "name": "Pitch", "images": ["file:///etc/passwd"] }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_players_cannot_create_terrains() {
    let server = setup().await;
    let player = register_player(&server, "alice").await;

    server
        .post("/api/terrains")
        .add_header(AUTHORIZATION, player.bearer())
        .json(&json!({ "name": "Pitch" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_terrain_of_other_association_is_forbidden() {
    let server = setup().await;
    let owner = register_organizer(&server, "owner").await;
    let intruder = register_organizer(&server, "intruder").await;
    let terrain_id = create_terrain(&server, &owner).await;

    server
        .put(&format!("/api/terrains/{}", terrain_id))
        .add_header(AUTHORIZATION, intruder.bearer())
        .json(&json!({ "name": "Mine now" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .delete(&format!("/api/terrains/{}", terrain_id))
        .add_header(AUTHORIZATION, intruder.bearer())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_terrain_in_use_cannot_be_deleted() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;
    let terrain_id = create_terrain(&server, &organizer).await;
    create_event(&server, &organizer, &terrain_id, 1000, 10, Duration::days(3)).await;

    server
        .delete(&format!("/api/terrains/{}", terrain_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .assert_status(StatusCode::CONFLICT);
}

// ============================================================================
// Event Tests
// ============================================================================

#[tokio::test]
async fn test_create_and_fetch_event() {
    let server = setup().await;
    let (_organizer, event_id) = organizer_with_event(&server, 2000, 12, Duration::days(3)).await;

    let response = server.get(&format!("/api/events/{}", event_id)).await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["id"], event_id.as_str());
    assert_eq!(body["status"], "active");
    assert_eq!(body["recurrence"], "one_off");
    assert_eq!(body["price"], 2000);
    assert_eq!(body["capacity"], 12);
    assert_eq!(body["seats_taken"], 0);
    assert_eq!(body["terrain_name"], "Pitch 1");
}

#[tokio::test]
async fn test_event_validation() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;
    let terrain_id = create_terrain(&server, &organizer).await;
    let starts_at = Utc::now() + Duration::days(2);

    let cases = [
        json!({ "ends_at": starts_at - Duration::hours(1), "price": 1000, "capacity": 10 }),
        json!({ "ends_at": starts_at + Duration::hours(1), "price": -1, "capacity": 10 }),
        json!({ "ends_at": starts_at + Duration::hours(1), "price": 1000, "capacity": 0 }),
    ];

    for case in cases {
        let mut body = json!({
            "terrain_id": terrain_id,
            "name": "Broken",
            "starts_at": starts_at
        });
        for (key, value) in case.as_object().unwrap() {
            body[key.as_str()] = value.clone();
        }

        server
            .post("/api/events")
            .add_header(AUTHORIZATION, organizer.bearer())
            .json(&body)
            .await
            .assert_status_bad_request();
    }
}

#[tokio::test]
async fn test_event_on_foreign_terrain_is_forbidden() {
    let server = setup().await;
    let owner = register_organizer(&server, "owner").await;
    let other = register_organizer(&server, "other").await;
    let terrain_id = create_terrain(&server, &owner).await;
    let starts_at = Utc::now() + Duration::days(2);

    server
        .post("/api/events")
        .add_header(AUTHORIZATION, other.bearer())
        .json(&json!({
            "terrain_id": terrain_id,
            "name": "Squatting",
            "starts_at": starts_at,
            "ends_at": starts_at + Duration::hours(2),
            "price": 0,
            "capacity": 4
        }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_public_listing_shows_active_events_by_start() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;
    let terrain_id = create_terrain(&server, &organizer).await;

    let later = create_event(&server, &organizer, &terrain_id, 0, 5, Duration::days(10)).await;
    let sooner = create_event(&server, &organizer, &terrain_id, 0, 5, Duration::days(2)).await;
    let cancelled = create_event(&server, &organizer, &terrain_id, 0, 5, Duration::days(5)).await;

    server
        .post(&format!("/api/events/{}/cancel", cancelled))
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .assert_status_ok();

    let listing: Value = server.get("/api/events").await.json();
    let ids: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![sooner.as_str(), later.as_str()]);

    let own: Value = server
        .get("/api/events/association")
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .json();
    assert_eq!(own.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_update_event_by_other_organizer_is_forbidden() {
    let server = setup().await;
    let (_owner, event_id) = organizer_with_event(&server, 1000, 10, Duration::days(3)).await;
    let other = register_organizer(&server, "other").await;

    server
        .put(&format!("/api/events/{}", event_id))
        .add_header(AUTHORIZATION, other.bearer())
        .json(&json!({ "name": "Hijacked" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post(&format!("/api/events/{}/cancel", event_id))
        .add_header(AUTHORIZATION, other.bearer())
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_capacity_change_rederives_status() {
    let server = setup().await;
    let (organizer, event_id) = organizer_with_event(&server, 1000, 1, Duration::days(3)).await;
    let player = register_player(&server, "alice").await;
    join_event(&server, &player, &event_id).await;

    let event: Value = server.get(&format!("/api/events/{}", event_id)).await.json();
    assert_eq!(event["status"], "full");

    let response = server
        .put(&format!("/api/events/{}", event_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({ "capacity": 3 }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "active");

    let response = server
        .put(&format!("/api/events/{}", event_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({ "capacity": 1 }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "full");
}

#[tokio::test]
async fn test_cancelled_event_cannot_be_updated() {
    let server = setup().await;
    let (organizer, event_id) = organizer_with_event(&server, 1000, 10, Duration::days(3)).await;

    server
        .post(&format!("/api/events/{}/cancel", event_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .assert_status_ok();

    server
        .put(&format!("/api/events/{}", event_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({ "capacity": 20 }))
        .await
        .assert_status(StatusCode::CONFLICT);

    server
        .post(&format!("/api/events/{}/cancel", event_id))
        .add_header(AUTHORIZATION, organizer.bearer())
        .await
        .assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_unknown_event_is_not_found() {
    let server = setup().await;

    let response = server.get("/api/events/does-not-exist").await;

    response.assert_status_not_found();
    assert_eq!(response.json::<Value>()["error"], "Event not found");
}

// ============================================================================
// Association Tests
// ============================================================================

#[tokio::test]
async fn test_association_profile_update() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;
    let association_id = organizer.association_id.clone().unwrap();

    server
        .put("/api/associations/me")
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({
            "description": "Weekly matches since 1998",
            "logo_url": "https://img.test/logo.png"
        }))
        .await
        .assert_status_ok();

    let profile: Value = server
        .get(&format!("/api/associations/{}", association_id))
        .await
        .json();
    assert_eq!(profile["description"], "Weekly matches since 1998");
    assert_eq!(profile["logo_url"], "https://img.test/logo.png");
}

#[tokio::test]
async fn test_players_have_no_association() {
    let server = setup().await;
    let player = register_player(&server, "alice").await;

    server
        .put("/api/associations/me")
        .add_header(AUTHORIZATION, player.bearer())
        .json(&json!({ "name": "Sneaky" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);
}

// ============================================================================
// Messaging Tests
// ============================================================================

#[tokio::test]
async fn test_message_kind_needs_its_target() {
    let server = setup().await;
    let player = register_player(&server, "alice").await;

    server
        .post("/api/messages")
        .add_header(AUTHORIZATION, player.bearer())
        .json(&json!({ "kind": "group", "content": "Anyone up for a game?" }))
        .await
        .assert_status_bad_request();

    server
        .post("/api/messages")
        .add_header(AUTHORIZATION, player.bearer())
        .json(&json!({ "kind": "private", "content": "Hello?" }))
        .await
        .assert_status_bad_request();

    server
        .post("/api/messages")
        .add_header(AUTHORIZATION, player.bearer())
        .json(&json!({ "kind": "info", "event_id": "event-1", "content": "Announcement" }))
        .await
        .assert_status_bad_request();
}

#[tokio::test]
async fn test_group_message_requires_participation() {
    let server = setup().await;
    let (_organizer, event_id) = organizer_with_event(&server, 1000, 10, Duration::days(3)).await;
    let alice = register_player(&server, "alice").await;
    let outsider = register_player(&server, "bob").await;
    join_event(&server, &alice, &event_id).await;

    server
        .post("/api/messages")
        .add_header(AUTHORIZATION, outsider.bearer())
        .json(&json!({ "kind": "group", "event_id": event_id, "content": "Let me in" }))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    server
        .post("/api/messages")
        .add_header(AUTHORIZATION, alice.bearer())
        .json(&json!({ "kind": "group", "event_id": event_id, "content": "See you there" }))
        .await
        .assert_status(StatusCode::CREATED);

    let history: Value = server
        .get(&format!("/api/messages/event/{}", event_id))
        .add_header(AUTHORIZATION, outsider.bearer())
        .await
        .json();
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["message"]["content"], "See you there");
    assert_eq!(history[0]["author"]["name"], "alice");
}

#[tokio::test]
async fn test_private_history_is_limited_to_the_conversation() {
    let server = setup().await;
    let organizer = register_organizer(&server, "club").await;
    let association_id = organizer.association_id.clone().unwrap();
    let alice = register_player(&server, "alice").await;
    let bob = register_player(&server, "bob").await;

    server
        .post("/api/messages")
        .add_header(AUTHORIZATION, alice.bearer())
        .json(&json!({
            "kind": "private",
            "association_id": association_id,
            "content": "Can I bring a friend?"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let alice_view: Value = server
        .get(&format!("/api/messages/association/{}", association_id))
        .add_header(AUTHORIZATION, alice.bearer())
        .await
        .json();
    assert_eq!(alice_view.as_array().unwrap().len(), 1);
    assert_eq!(alice_view[0]["message"]["content"], "Can I bring a friend?");

    let bob_view: Value = server
        .get(&format!("/api/messages/association/{}", association_id))
        .add_header(AUTHORIZATION, bob.bearer())
        .await
        .json();
    assert!(bob_view.as_array().unwrap().is_empty());

    server
        .get("/api/messages/association/missing")
        .add_header(AUTHORIZATION, alice.bearer())
        .await
        .assert_status_not_found();
}
