//! Booking domain errors.
//!
//! Each variant is a rule of the registration and payment lifecycle; the API
//! layer maps them onto HTTP statuses.

use std::fmt;

use crate::{
    db::models::{PaymentStatus, RegistrationStatus},
    payments::GatewayError,
};

#[derive(Debug)]
pub enum BookingError {
    // Lookup errors
    EventNotFound,
    RegistrationNotFound,
    PaymentNotFound,

    // Admission errors
    EventUnavailable,
    AlreadyRegistered,
    CapacityExceeded,
    PlayerBanned,
    CapacityBelowRegistrations { taken: i64 },

    // Lifecycle errors
    CancellationWindowClosed { lead_hours: i64 },
    InvalidRegistrationState { actual: RegistrationStatus },
    InvalidPaymentState {
        expected: PaymentStatus,
        actual: PaymentStatus,
    },
    PaymentChanged,
    NotOwner,

    // Collaborators
    Upstream(GatewayError),
    Database(sqlx::Error),
}

impl fmt::Display for BookingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingError::EventNotFound => write!(f, "Event not found"),
            BookingError::RegistrationNotFound => write!(f, "Registration not found"),
            BookingError::PaymentNotFound => write!(f, "Payment not found"),

            BookingError::EventUnavailable => write!(f, "This event is no longer available"),
            BookingError::AlreadyRegistered => {
                write!(f, "You are already registered for this event")
            }
            BookingError::CapacityExceeded => write!(f, "No seats left for this event"),
            BookingError::PlayerBanned => {
                write!(f, "You have been banned by the organizer of this event")
            }
            BookingError::CapacityBelowRegistrations { taken } => write!(
                f,
                "Capacity cannot be lower than the {} seats already taken",
                taken
            ),

            BookingError::CancellationWindowClosed { lead_hours } => write!(
                f,
                "Cancellation is only possible up to {} hours before the event",
                lead_hours
            ),
            BookingError::InvalidRegistrationState { actual } => {
                write!(f, "Registration is already {}", actual.as_str())
            }
            BookingError::InvalidPaymentState { expected, actual } => write!(
                f,
                "Payment is {} but must be {} for this operation",
                actual.as_str(),
                expected.as_str()
            ),
            BookingError::PaymentChanged => write!(
                f,
                "The payment changed while the registration was being cancelled; please retry"
            ),
            BookingError::NotOwner => write!(f, "You do not own this resource"),

            BookingError::Upstream(e) => write!(f, "{}; please retry later", e),
            BookingError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<sqlx::Error> for BookingError {
    fn from(err: sqlx::Error) -> Self {
        BookingError::Database(err)
    }
}

impl From<GatewayError> for BookingError {
    fn from(err: GatewayError) -> Self {
        BookingError::Upstream(err)
    }
}
