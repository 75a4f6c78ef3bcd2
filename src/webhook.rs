//! Classification of incoming webhook bodies.
//!
//! Two envelopes are accepted: the platform-native `entry[0].changes[0].value` shape and a
//! flat shape used for direct calls and testing. Nothing here fails; missing fields just
//! narrow the classification.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::types::{InboundMessage, StatusUpdate};

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    StatusUpdate(Vec<StatusUpdate>),
    InboundMessage(InboundMessage),
    Ignored,
    /// A flat envelope that carries some message fields but not phone and text both.
    Invalid,
}

pub fn classify(body: &Value, default_tenant_id: &str) -> WebhookEvent {
    let entry = body
        .get("entry")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first());
    let value = entry
        .and_then(|e| e.get("changes"))
        .and_then(Value::as_array)
        .and_then(|changes| changes.first())
        .and_then(|c| c.get("value"));

    let statuses = value
        .and_then(|v| v.get("statuses"))
        .and_then(Value::as_array)
        .filter(|s| !s.is_empty());
    if let Some(statuses) = statuses {
        return WebhookEvent::StatusUpdate(statuses.iter().filter_map(parse_status).collect());
    }

    let tenant_id = first_text(body, &["tenant_id", "tenantId"]);
    let mut phone_number_id = first_text(body, &["phone_number_id", "phoneNumberId"]);
    let mut text = first_text(body, &["message", "text", "body"]);
    let mut phone = first_text(body, &["phone", "from"]);
    let mut contact_name = first_text(body, &["contact_name", "contactName", "name"]);

    if text.is_none() && entry.is_some() {
        let Some(message) = value
            .and_then(|v| v.get("messages"))
            .and_then(Value::as_array)
            .and_then(|messages| messages.first())
        else {
            return WebhookEvent::Ignored;
        };
        phone = text_at(message, &["from"]).or(phone);
        phone_number_id = value
            .and_then(|v| v.get("metadata"))
            .and_then(|m| text_at(m, &["phone_number_id"]))
            .or(phone_number_id);
        contact_name = value
            .and_then(|v| v.get("contacts"))
            .and_then(Value::as_array)
            .and_then(|contacts| contacts.first())
            .and_then(|c| text_at(c, &["profile", "name"]))
            .or(contact_name);
        text = Some(message_text(message));
    }

    match (phone, text) {
        (Some(phone), Some(text)) => WebhookEvent::InboundMessage(InboundMessage {
            tenant_id: tenant_id.unwrap_or_else(|| default_tenant_id.to_string()),
            phone_number_id,
            phone,
            contact_name,
            text,
        }),
        (None, None) => WebhookEvent::Ignored,
        _ => WebhookEvent::Invalid,
    }
}

/// Body text, else the first media caption, else a `[type]` placeholder.
fn message_text(message: &Value) -> String {
    text_at(message, &["text", "body"])
        .or_else(|| text_at(message, &["image", "caption"]))
        .or_else(|| text_at(message, &["video", "caption"]))
        .or_else(|| text_at(message, &["document", "caption"]))
        .unwrap_or_else(|| {
            let kind = text_at(message, &["type"]).unwrap_or_else(|| "message".to_string());
            format!("[{kind}]")
        })
}

fn parse_status(status: &Value) -> Option<StatusUpdate> {
    let message_id = text_at(status, &["id"])?;
    Some(StatusUpdate {
        message_id,
        state: text_at(status, &["status"]),
        timestamp: status.get("timestamp").and_then(parse_webhook_timestamp),
    })
}

/// Seconds since epoch, given as a JSON string or number.
pub fn parse_webhook_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        Value::String(raw) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            raw.parse::<f64>().ok()?
        }
        Value::Number(n) => n.as_f64()?,
        _ => return None,
    };
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((seconds * 1000.0).trunc() as i64)
}

fn first_text(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| text_at(value, &[*key]))
}

fn text_at(value: &Value, path: &[&str]) -> Option<String> {
    path.iter()
        .try_fold(value, |node, key| node.get(key))
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}
