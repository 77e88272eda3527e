//! Structured audit logging for security-relevant events.
//!
//! Sign-ups and logins, admissions and cancellations, settlements and
//! refunds, event cancellations and bans are logged under the `audit`
//! target so they can be routed separately.

/// Log an authentication event
pub fn log_auth_event(email: &str, event: &str, success: bool) {
    if success {
        tracing::info!(
            target: "audit",
            event = "auth",
            email = email,
            auth_event = event,
            success = success,
            "Auth: {} - {} (success={})",
            event,
            email,
            success
        );
    } else {
        tracing::warn!(
            target: "audit",
            event = "auth",
            email = email,
            auth_event = event,
            success = success,
            "Auth: {} - {} (success={})",
            event,
            email,
            success
        );
    }
}

/// Log a registration admission or cancellation
pub fn log_registration_event(registration_id: &str, player_id: &str, event_id: &str, action: &str) {
    tracing::info!(
        target: "audit",
        event = "registration",
        registration_id = registration_id,
        player_id = player_id,
        event_id = event_id,
        action = action,
        "Registration {}: {} by player {} for event {}",
        registration_id,
        action,
        player_id,
        event_id
    );
}

/// Log a payment state change
pub fn log_payment_event(payment_id: &str, action: &str, amount: Option<i64>) {
    tracing::info!(
        target: "audit",
        event = "payment",
        payment_id = payment_id,
        action = action,
        amount = amount.unwrap_or(0),
        "Payment {}: {}",
        payment_id,
        action
    );
}

/// Log an organizer action on an event
pub fn log_event_lifecycle(event_id: &str, action: &str, association_id: &str) {
    tracing::info!(
        target: "audit",
        event = "event_lifecycle",
        event_id = event_id,
        action = action,
        association_id = association_id,
        "Event {}: {} by association {}",
        event_id,
        action,
        association_id
    );
}

/// Log a ban being placed or lifted
pub fn log_moderation_event(association_id: &str, player_id: &str, action: &str, reason: &str) {
    tracing::warn!(
        target: "audit",
        event = "moderation",
        association_id = association_id,
        player_id = player_id,
        action = action,
        reason = reason,
        "Moderation: {} of player {} by association {} - {}",
        action,
        player_id,
        association_id,
        reason
    );
}

/// Log a security event (bad webhook signature, blocked account, etc.)
pub fn log_security_event(subject: &str, event: &str, details: &str) {
    tracing::warn!(
        target: "audit",
        event = "security",
        subject = subject,
        security_event = event,
        details = details,
        "Security: {} - {} - {}",
        event,
        subject,
        details
    );
}
