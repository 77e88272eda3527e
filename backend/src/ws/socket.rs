use crate::{
    api::AppState,
    audit,
    db::queries,
    ws::messages::{ClientMessage, ServerMessage},
};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio_stream::{wrappers::BroadcastStream, StreamMap};

/// Rooms one connection may sit in at the same time.
const MAX_ROOMS_PER_CONNECTION: usize = 32;

#[derive(Deserialize)]
pub struct WsQuery {
    token: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let claims = match state.jwt_manager.verify_token(&query.token) {
        Ok(claims) => claims,
        Err(_) => {
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    // Blocked accounts lose live delivery along with the HTTP API.
    match queries::find_user(&state.pool, &claims.sub).await {
        Ok(Some(user)) if !user.blocked => {}
        Ok(Some(_)) => {
            audit::log_security_event(&claims.sub, "ws_rejected", "account blocked");
            return (StatusCode::FORBIDDEN, "Account blocked").into_response();
        }
        Ok(None) => return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response(),
        Err(e) => {
            tracing::error!("Failed to load user {} for websocket: {}", claims.sub, e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let token_expires_at = DateTime::from_timestamp(claims.exp as i64, 0)
        .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

    ws.max_message_size(8 * 1024)
        .on_upgrade(move |socket| handle_socket(socket, claims.sub, state, token_expires_at))
}

async fn send_json(
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> bool {
    match serde_json::to_string(message) {
        Ok(text) => sender.send(Message::Text(text)).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

async fn handle_socket(
    socket: WebSocket,
    user_id: String,
    state: Arc<AppState>,
    token_expires_at: DateTime<Utc>,
) {
    let (mut sender, mut receiver) = socket.split();

    let mut personal = BroadcastStream::new(state.hub.subscribe_user(&user_id).await);
    let mut rooms: StreamMap<String, BroadcastStream<ServerMessage>> = StreamMap::new();
    let mut token_check_interval = tokio::time::interval(tokio::time::Duration::from_secs(60));

    if !send_json(&mut sender, &ServerMessage::Connected).await {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handle_client_message(client_msg, &user_id, &state, &mut rooms).await,
                            Err(_) => ServerMessage::Error { message: "Unrecognised message".to_string() },
                        };
                        if !send_json(&mut sender, &reply).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    _ => {}
                }
            }

            Some((event_id, notice)) = rooms.next(), if !rooms.is_empty() => {
                match notice {
                    Ok(notice) => {
                        if !send_json(&mut sender, &notice).await {
                            break;
                        }
                    }
                    Err(lagged) => {
                        tracing::warn!("User {} lagging in room {}: {}", user_id, event_id, lagged);
                    }
                }
            }

            Some(notice) = personal.next() => {
                if let Ok(notice) = notice {
                    if !send_json(&mut sender, &notice).await {
                        break;
                    }
                }
            }

            _ = token_check_interval.tick() => {
                if Utc::now() >= token_expires_at {
                    let err = ServerMessage::Error {
                        message: "Token expired, please reconnect".to_string(),
                    };
                    send_json(&mut sender, &err).await;
                    break;
                }
            }
        }
    }

    drop(rooms);
    drop(personal);
    state.hub.prune().await;
    tracing::debug!("Connection closed for user {}", user_id);
}

async fn handle_client_message(
    msg: ClientMessage,
    user_id: &str,
    state: &AppState,
    rooms: &mut StreamMap<String, BroadcastStream<ServerMessage>>,
) -> ServerMessage {
    fn validate_event_id(event_id: &str) -> Result<(), String> {
        if event_id.is_empty() || event_id.len() > 128 {
            return Err("Invalid event ID".to_string());
        }
        Ok(())
    }

    match msg {
        ClientMessage::JoinEvent { event_id } => {
            if let Err(message) = validate_event_id(&event_id) {
                return ServerMessage::Error { message };
            }
            if !rooms.contains_key(&event_id) && rooms.len() >= MAX_ROOMS_PER_CONNECTION {
                return ServerMessage::Error {
                    message: "Too many rooms joined".to_string(),
                };
            }
            let rx = state.hub.subscribe_event(&event_id).await;
            rooms.insert(event_id.clone(), BroadcastStream::new(rx));
            tracing::debug!("User {} joined event room {}", user_id, event_id);
            ServerMessage::JoinedEvent { event_id }
        }

        ClientMessage::LeaveEvent { event_id } => {
            rooms.remove(&event_id);
            tracing::debug!("User {} left event room {}", user_id, event_id);
            ServerMessage::LeftEvent { event_id }
        }

        ClientMessage::Ping => ServerMessage::Pong,
    }
}
