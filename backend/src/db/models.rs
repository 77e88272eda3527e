use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::auth::password::PasswordHash;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Role {
    Player,
    Organizer,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub blocked: bool,
    pub created_at: String,
}

impl User {
    pub fn new(name: String, email: String, password: PasswordHash, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name,
            email,
            password_hash: password.into_string(),
            role,
            blocked: false,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Association {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub logo_url: Option<String>,
    pub created_at: String,
}

impl Association {
    pub fn new(user_id: String, name: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            name,
            description: None,
            logo_url: None,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Terrain {
    pub id: String,
    pub association_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Image URLs, stored as a JSON array.
    #[sqlx(json)]
    pub images: Vec<String>,
    pub created_at: String,
}

impl Terrain {
    pub fn new(
        association_id: String,
        name: String,
        description: Option<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            association_id,
            name,
            description,
            images,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum Recurrence {
    OneOff,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum EventStatus {
    Active,
    Cancelled,
    Full,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Active => "active",
            EventStatus::Cancelled => "cancelled",
            EventStatus::Full => "full",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: String,
    pub association_id: String,
    pub terrain_id: String,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub recurrence: Recurrence,
    pub price: i64, // cents
    pub capacity: i64,
    pub status: EventStatus,
    pub created_at: String,
}

impl Event {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        association_id: String,
        terrain_id: String,
        name: String,
        description: Option<String>,
        starts_at: DateTime<Utc>,
        ends_at: DateTime<Utc>,
        recurrence: Recurrence,
        price: i64,
        capacity: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            association_id,
            terrain_id,
            name,
            description,
            starts_at,
            ends_at,
            recurrence,
            price,
            capacity,
            status: EventStatus::Active,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Validated,
    Cancelled,
    Blocked,
}

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Validated => "validated",
            RegistrationStatus::Cancelled => "cancelled",
            RegistrationStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Registration {
    pub id: String,
    pub player_id: String,
    pub event_id: String,
    pub payment_id: String,
    pub status: RegistrationStatus,
    pub created_at: String,
}

impl Registration {
    pub fn new(player_id: String, event_id: String, payment_id: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            player_id,
            event_id,
            payment_id,
            status: RegistrationStatus::Validated,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
        }
    }

    /// Settlement and refund only ever move forward one step.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: String,
    pub player_id: String,
    pub event_id: String,
    pub amount: i64,     // cents
    pub commission: i64, // cents
    pub status: PaymentStatus,
    pub external_ref: Option<String>,
    pub checkout_session_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Payment {
    pub fn new(player_id: String, event_id: String, amount: i64, commission: i64) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            player_id,
            event_id,
            amount,
            commission,
            status: PaymentStatus::Pending,
            external_ref: None,
            checkout_session_id: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn total(&self) -> i64 {
        self.amount + self.commission
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Ban {
    pub id: String,
    pub player_id: String,
    pub association_id: String,
    pub reason: String,
    pub created_at: String,
}

impl Ban {
    pub fn new(player_id: String, association_id: String, reason: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            player_id,
            association_id,
            reason,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum MessageKind {
    Group,
    Private,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: String,
    pub author_id: String,
    pub event_id: Option<String>,
    pub association_id: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub created_at: String,
}

impl Message {
    pub fn new(
        author_id: String,
        event_id: Option<String>,
        association_id: Option<String>,
        content: String,
        kind: MessageKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author_id,
            event_id,
            association_id,
            content,
            kind,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
