use crate::{
    api::{current_user, require_organizer, AppState},
    db::{
        models::{Message, MessageKind, Role, User},
        queries,
    },
    error::{AppError, Result},
    ws::{
        messages::{AuthorInfo, EventRef, ServerMessage},
        Notifier,
    },
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::sync::Arc;

const MAX_MESSAGE_LENGTH: usize = 2000;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub kind: MessageKind,
    pub event_id: Option<String>,
    pub association_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub message: Message,
    pub author: AuthorInfo,
}

#[derive(FromRow)]
struct MessageRow {
    #[sqlx(flatten)]
    message: Message,
    author_name: String,
    author_role: Role,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        Self {
            author: AuthorInfo {
                id: row.message.author_id.clone(),
                name: row.author_name,
                role: row.author_role,
            },
            message: row.message,
        }
    }
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(send_message))
        .route("/event/:event_id", get(event_history))
        .route("/event/:event_id/broadcast", post(broadcast))
        .route("/association/:association_id", get(private_history))
}

fn validate_content(content: &str) -> Result<String> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation("Message cannot be empty".to_string()));
    }
    if content.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(AppError::Validation(format!(
            "Message cannot exceed {} characters",
            MAX_MESSAGE_LENGTH
        )));
    }
    Ok(content.to_string())
}

fn author_info(user: &User) -> AuthorInfo {
    AuthorInfo {
        id: user.id.clone(),
        name: user.name.clone(),
        role: user.role,
    }
}

async fn insert_message(state: &AppState, message: &Message) -> Result<()> {
    sqlx::query(
        "INSERT INTO messages (id, author_id, event_id, association_id, content, kind, created_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&message.id)
    .bind(&message.author_id)
    .bind(&message.event_id)
    .bind(&message.association_id)
    .bind(&message.content)
    .bind(message.kind)
    .bind(&message.created_at)
    .execute(&state.pool)
    .await?;
    Ok(())
}

async fn send_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let user = current_user(&state, &headers).await?;
    let content = validate_content(&req.content)?;

    match req.kind {
        MessageKind::Group => {
            let event_id = req.event_id.ok_or_else(|| {
                AppError::Validation("Group messages need an event".to_string())
            })?;
            let event = queries::find_event(&state.pool, &event_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

            // Participants and the organizer of the event may talk in its room.
            let is_organizer = queries::find_association_by_user(&state.pool, &user.id)
                .await?
                .is_some_and(|a| a.id == event.association_id);
            let is_participant = queries::find_live_registration(&state.pool, &user.id, &event.id)
                .await?
                .is_some();
            if !is_organizer && !is_participant {
                return Err(AppError::Forbidden(
                    "Only participants can write in this event".to_string(),
                ));
            }

            let message = Message::new(
                user.id.clone(),
                Some(event.id.clone()),
                None,
                content,
                MessageKind::Group,
            );
            insert_message(&state, &message).await?;

            state
                .hub
                .publish_to_event(
                    &event.id,
                    ServerMessage::NewMessage {
                        message: message.clone(),
                        author: author_info(&user),
                    },
                )
                .await;

            Ok((StatusCode::CREATED, Json(message)))
        }

        MessageKind::Private => {
            let association_id = req.association_id.ok_or_else(|| {
                AppError::Validation("Private messages need an association".to_string())
            })?;
            let association = queries::find_association(&state.pool, &association_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Association not found".to_string()))?;

            let message = Message::new(
                user.id.clone(),
                None,
                Some(association.id.clone()),
                content,
                MessageKind::Private,
            );
            insert_message(&state, &message).await?;

            let notice = ServerMessage::NewMessage {
                message: message.clone(),
                author: author_info(&user),
            };
            state.hub.publish_to_user(&user.id, notice.clone()).await;
            if association.user_id != user.id {
                state
                    .hub
                    .publish_to_user(&association.user_id, notice)
                    .await;
            }

            Ok((StatusCode::CREATED, Json(message)))
        }

        MessageKind::Info => Err(AppError::Validation(
            "Info messages are sent through the event broadcast".to_string(),
        )),
    }
}

async fn event_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
) -> Result<Json<Vec<MessageView>>> {
    current_user(&state, &headers).await?;

    let event = queries::find_event(&state.pool, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let rows: Vec<MessageRow> = sqlx::query_as(
        "SELECT m.*, u.name AS author_name, u.role AS author_role
         FROM messages m
         JOIN users u ON u.id = m.author_id
         WHERE m.event_id = ?
         ORDER BY m.created_at",
    )
    .bind(&event.id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(MessageView::from).collect()))
}

async fn private_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(association_id): Path<String>,
) -> Result<Json<Vec<MessageView>>> {
    let user = current_user(&state, &headers).await?;

    let association = queries::find_association(&state.pool, &association_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Association not found".to_string()))?;

    let rows: Vec<MessageRow> = sqlx::query_as(
        "SELECT m.*, u.name AS author_name, u.role AS author_role
         FROM messages m
         JOIN users u ON u.id = m.author_id
         WHERE m.association_id = ? AND m.kind = 'private'
           AND m.author_id IN (?, ?)
         ORDER BY m.created_at",
    )
    .bind(&association.id)
    .bind(&user.id)
    .bind(&association.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(MessageView::from).collect()))
}

async fn broadcast(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(event_id): Path<String>,
    Json(req): Json<BroadcastRequest>,
) -> Result<(StatusCode, Json<Message>)> {
    let (user, association) = require_organizer(&state, &headers).await?;
    let content = validate_content(&req.content)?;

    let event = queries::find_event(&state.pool, &event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    if event.association_id != association.id {
        return Err(AppError::Forbidden(
            "This event belongs to another association".to_string(),
        ));
    }

    let message = Message::new(
        user.id.clone(),
        Some(event.id.clone()),
        None,
        content,
        MessageKind::Info,
    );
    insert_message(&state, &message).await?;

    state
        .hub
        .publish_to_event(
            &event.id,
            ServerMessage::BroadcastMessage {
                message: message.clone(),
                event: EventRef {
                    id: event.id.clone(),
                    name: event.name.clone(),
                },
            },
        )
        .await;

    tracing::info!("Organizer {} broadcast to event {}", user.id, event.id);

    Ok((StatusCode::CREATED, Json(message)))
}
