//! Settlement notifications pushed by the processor.
//!
//! Signature header format: `t=<unix seconds>,v1=<hex hmac-sha256>` where the
//! MAC covers `"<t>.<raw body>"`.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Notifications older than this are refused to limit replay.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq)]
pub enum SignatureError {
    MissingHeader,
    Malformed,
    Expired,
    Mismatch,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MissingHeader => write!(f, "Missing signature header"),
            SignatureError::Malformed => write!(f, "Malformed signature header"),
            SignatureError::Expired => write!(f, "Signature timestamp outside tolerance"),
            SignatureError::Mismatch => write!(f, "Signature does not match payload"),
        }
    }
}

fn keyed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Hex MAC of `"<timestamp>.<payload>"`.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    hex::encode(keyed_mac(secret, timestamp, payload).finalize().into_bytes())
}

/// Header value a processor would send for `payload` at `timestamp`.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!("t={},v1={}", timestamp, sign_payload(secret, timestamp, payload))
}

pub fn verify_signature(
    secret: &str,
    header: Option<&str>,
    payload: &[u8],
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;

    let mut timestamp: Option<i64> = None;
    let mut candidates: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse().map_err(|_| SignatureError::Malformed)?)
            }
            Some(("v1", value)) => {
                candidates.push(hex::decode(value).map_err(|_| SignatureError::Malformed)?)
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if candidates.is_empty() {
        return Err(SignatureError::Malformed);
    }

    if (now.timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }

    for candidate in candidates {
        // verify_slice compares in constant time
        if keyed_mac(secret, timestamp, payload)
            .verify_slice(&candidate)
            .is_ok()
        {
            return Ok(());
        }
    }

    Err(SignatureError::Mismatch)
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: serde_json::Value,
}

/// What a verified notification means for one of our payments.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementNotice {
    /// Funds captured.
    Completed {
        payment_id: String,
        external_ref: String,
    },
    /// Checkout abandoned or payment failed; the payment stays pending.
    Failed { payment_id: String, reason: String },
}

impl WebhookEvent {
    /// Map the processor event onto a settlement notice, `None` for event
    /// types we do not act on.
    pub fn settlement_notice(&self) -> Option<SettlementNotice> {
        let object = &self.data.object;
        let payment_id = object
            .get("metadata")
            .and_then(|m| m.get("payment_id"))
            .and_then(|v| v.as_str())?
            .to_string();

        match self.event_type.as_str() {
            "checkout.session.completed" => {
                let external_ref = object
                    .get("payment_intent")
                    .and_then(|v| v.as_str())
                    .or_else(|| object.get("id").and_then(|v| v.as_str()))?
                    .to_string();
                Some(SettlementNotice::Completed {
                    payment_id,
                    external_ref,
                })
            }
            "checkout.session.expired" | "payment_intent.payment_failed" => {
                Some(SettlementNotice::Failed {
                    payment_id,
                    reason: self.event_type.clone(),
                })
            }
            _ => None,
        }
    }
}
