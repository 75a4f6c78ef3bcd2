//! Contact/conversation resolution and the writes made around each turn.
//!
//! Every write here stands alone; a pipeline that stops half way leaves whatever was
//! already written in place.

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::store::{ConversationStore, ConversationTouch};
use crate::types::{
    Contact, InboundMessage, NewMessage, ResolvedConversation, StatusUpdate, STATUS_SENT,
};

pub async fn resolve_contact(
    store: &dyn ConversationStore,
    tenant_id: &str,
    phone: &str,
    display_name: Option<&str>,
) -> Result<Contact, AppError> {
    store
        .upsert_contact(tenant_id, phone, display_name)
        .await?
        .ok_or(AppError::NotFound("Contact not found"))
}

pub async fn resolve_conversation(
    store: &dyn ConversationStore,
    tenant_id: &str,
    contact: &Contact,
    title: &str,
    message_text: &str,
    now: DateTime<Utc>,
) -> Result<ResolvedConversation, AppError> {
    store
        .find_or_create_conversation(tenant_id, &contact.id, title, message_text, now)
        .await?
        .ok_or(AppError::NotFound("Conversation not found"))
}

/// Stores the customer's message and reopens the conversation.
///
/// A conversation created for this very message already counts it as unread.
pub async fn record_inbound(
    store: &dyn ConversationStore,
    inbound: &InboundMessage,
    resolved: &ResolvedConversation,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    let conversation_id = &resolved.conversation.id;
    let message_id = store
        .insert_message(&NewMessage {
            tenant_id: inbound.tenant_id.clone(),
            conversation_id: conversation_id.clone(),
            sender: inbound
                .contact_name
                .clone()
                .unwrap_or_else(|| inbound.phone.clone()),
            body: inbound.text.clone(),
            is_from_customer: true,
            sent_at: now,
            wa_message_id: None,
            wa_status: None,
        })
        .await?;

    let touch = ConversationTouch {
        last_message: inbound.text.clone(),
        updated_at: now,
        reopen: true,
        unread_increment: if resolved.created { 0 } else { 1 },
    };
    if let Err(err) = store.touch_conversation(conversation_id, &touch).await {
        tracing::warn!(%conversation_id, error = %err, "failed to update conversation after inbound message");
    }
    Ok(message_id)
}

pub struct OutboundRecord<'a> {
    pub tenant_id: &'a str,
    pub conversation_id: &'a str,
    pub sender: &'a str,
    pub body: &'a str,
    pub wa_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

/// Stores a delivered reply; the conversation status is left as it is.
pub async fn record_outbound(
    store: &dyn ConversationStore,
    record: OutboundRecord<'_>,
) -> Result<String, AppError> {
    let message_id = store
        .insert_message(&NewMessage {
            tenant_id: record.tenant_id.to_string(),
            conversation_id: record.conversation_id.to_string(),
            sender: record.sender.to_string(),
            body: record.body.to_string(),
            is_from_customer: false,
            sent_at: record.sent_at,
            wa_message_id: record.wa_message_id,
            wa_status: Some(STATUS_SENT.to_string()),
        })
        .await?;

    let touch = ConversationTouch {
        last_message: record.body.to_string(),
        updated_at: record.sent_at,
        reopen: false,
        unread_increment: 0,
    };
    if let Err(err) = store.touch_conversation(record.conversation_id, &touch).await {
        tracing::warn!(conversation_id = %record.conversation_id, error = %err, "failed to update conversation after reply");
    }
    Ok(message_id)
}

/// Applies each status event in order. Unknown message ids and failed writes are skipped.
pub async fn apply_status_updates(store: &dyn ConversationStore, updates: &[StatusUpdate]) -> u64 {
    let mut touched = 0;
    for update in updates {
        match store.apply_status(update).await {
            Ok(rows) => touched += rows,
            Err(err) => {
                tracing::warn!(message_id = %update.message_id, error = %err, "failed to apply status update");
            }
        }
    }
    touched
}
