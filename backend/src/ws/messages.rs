use crate::db::models::{Message, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    // Room subscriptions
    JoinEvent { event_id: String },
    LeaveEvent { event_id: String },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorInfo {
    pub id: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    Connected,
    Pong,
    Error {
        message: String,
    },
    JoinedEvent {
        event_id: String,
    },
    LeftEvent {
        event_id: String,
    },

    // Relayed chat
    NewMessage {
        message: Message,
        author: AuthorInfo,
    },
    BroadcastMessage {
        message: Message,
        event: EventRef,
    },

    // Lifecycle notices
    EventCancelled {
        event: EventRef,
    },
    RegistrationBlocked {
        event: EventRef,
        reason: String,
    },
}
