//! Helpers shared by the integration test binaries.

#![allow(dead_code)]

use axum::http::header::AUTHORIZATION;
use axum_test::TestServer;
use chrono::{Duration, Utc};
use serde_json::{json, Value};

pub const PASSWORD: &str = "Password123";

pub struct Account {
    pub id: String,
    pub token: String,
    pub association_id: Option<String>,
}

impl Account {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

pub async fn register(server: &TestServer, name: &str, email: &str, role: &str) -> Account {
    let response = server
        .post("/api/auth/register")
        .json(&json!({
            "name": name,
            "email": email,
            "password": PASSWORD,
            "role": role
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    let body: Value = response.json();

    Account {
        id: body["user"]["id"].as_str().unwrap().to_string(),
        token: body["token"].as_str().unwrap().to_string(),
        association_id: body["association"]["id"].as_str().map(str::to_string),
    }
}

pub async fn register_player(server: &TestServer, name: &str) -> Account {
    register(server, name, &format!("{}@players.test", name), "player").await
}

pub async fn register_organizer(server: &TestServer, name: &str) -> Account {
    register(server, name, &format!("{}@clubs.test", name), "organizer").await
}

pub async fn create_terrain(server: &TestServer, organizer: &Account) -> String {
    let response = server
        .post("/api/terrains")
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({
            "name": "Pitch 1",
            "description": "Synthetic grass",
            "images": ["https://img.test/pitch-1.jpg"]
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

/// Create an event starting `starts_in` from now, lasting two hours.
pub async fn create_event(
    server: &TestServer,
    organizer: &Account,
    terrain_id: &str,
    price: i64,
    capacity: i64,
    starts_in: Duration,
) -> String {
    let starts_at = Utc::now() + starts_in;
    let response = server
        .post("/api/events")
        .add_header(AUTHORIZATION, organizer.bearer())
        .json(&json!({
            "terrain_id": terrain_id,
            "name": "Sunday five-a-side",
            "starts_at": starts_at,
            "ends_at": starts_at + Duration::hours(2),
            "price": price,
            "capacity": capacity
        }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    response.json::<Value>()["id"].as_str().unwrap().to_string()
}

/// Organizer with one terrain and one event; returns (organizer, event id).
pub async fn organizer_with_event(
    server: &TestServer,
    price: i64,
    capacity: i64,
    starts_in: Duration,
) -> (Account, String) {
    let organizer = register_organizer(server, "club").await;
    let terrain_id = create_terrain(server, &organizer).await;
    let event_id = create_event(server, &organizer, &terrain_id, price, capacity, starts_in).await;
    (organizer, event_id)
}

/// Register a player for an event and return the admission body.
pub async fn join_event(server: &TestServer, player: &Account, event_id: &str) -> Value {
    let response = server
        .post("/api/registrations")
        .add_header(AUTHORIZATION, player.bearer())
        .json(&json!({ "event_id": event_id }))
        .await;

    response.assert_status(axum::http::StatusCode::CREATED);
    response.json()
}
