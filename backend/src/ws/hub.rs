//! Room-based fan-out for live notifications.
//!
//! Every event has a room keyed by its id and every user has a personal
//! channel. Delivery is best effort: a receiver that is not subscribed at
//! publish time misses the notice and reads history instead.

use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{broadcast, RwLock};

use super::messages::ServerMessage;

/// Per-room buffer; a subscriber lagging further behind skips ahead.
pub const ROOM_CHANNEL_CAPACITY: usize = 64;

/// Publishing capability handed to the booking and messaging code.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver to everyone currently in the event's room.
    async fn publish_to_event(&self, event_id: &str, message: ServerMessage);

    /// Deliver to every open connection of one user.
    async fn publish_to_user(&self, user_id: &str, message: ServerMessage);
}

#[derive(Default)]
pub struct NotificationHub {
    event_rooms: Arc<RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>>,
    user_channels: Arc<RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe_event(&self, event_id: &str) -> broadcast::Receiver<ServerMessage> {
        subscribe(&self.event_rooms, event_id).await
    }

    pub async fn subscribe_user(&self, user_id: &str) -> broadcast::Receiver<ServerMessage> {
        subscribe(&self.user_channels, user_id).await
    }

    /// Number of live receivers in an event room.
    pub async fn event_subscribers(&self, event_id: &str) -> usize {
        self.event_rooms
            .read()
            .await
            .get(event_id)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop rooms nobody listens to any more.
    pub async fn prune(&self) {
        self.event_rooms
            .write()
            .await
            .retain(|_, tx| tx.receiver_count() > 0);
        self.user_channels
            .write()
            .await
            .retain(|_, tx| tx.receiver_count() > 0);
    }
}

async fn subscribe(
    channels: &RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>,
    key: &str,
) -> broadcast::Receiver<ServerMessage> {
    let mut channels = channels.write().await;
    let tx = channels.entry(key.to_string()).or_insert_with(|| {
        let (tx, _rx) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        tx
    });
    tx.subscribe()
}

async fn publish(
    channels: &RwLock<HashMap<String, broadcast::Sender<ServerMessage>>>,
    key: &str,
    message: ServerMessage,
) -> usize {
    let channels = channels.read().await;
    match channels.get(key) {
        // send only fails when there are no receivers
        Some(tx) => tx.send(message).unwrap_or(0),
        None => 0,
    }
}

#[async_trait]
impl Notifier for NotificationHub {
    async fn publish_to_event(&self, event_id: &str, message: ServerMessage) {
        let delivered = publish(&self.event_rooms, event_id, message).await;
        tracing::debug!("Published to event room {} ({} receivers)", event_id, delivered);
    }

    async fn publish_to_user(&self, user_id: &str, message: ServerMessage) {
        let delivered = publish(&self.user_channels, user_id, message).await;
        tracing::debug!("Published to user {} ({} receivers)", user_id, delivered);
    }
}
