//! One webhook invocation, start to finish.
//!
//! A status webhook only touches message rows. A customer message walks the turn stages
//! in order and stops at the first failure; nothing written before that point is undone.

use std::fmt;

use chrono::Utc;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::completion::CompletionRequest;
use crate::delivery::WhatsAppClient;
use crate::error::AppError;
use crate::history::{conversation_history, MemoryWindow};
use crate::knowledge::knowledge_context;
use crate::prompting::{render_system_prompt, SystemPromptContext};
use crate::state::{
    apply_status_updates, record_inbound, record_outbound, resolve_contact, resolve_conversation,
    OutboundRecord,
};
use crate::types::{InboundMessage, ReplySettings};
use crate::webhook::{classify, WebhookEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    StatusesApplied { updated: u64 },
    Ignored,
    Disabled { conversation_id: String },
    Replied { reply: String, conversation_id: String },
}

impl WebhookOutcome {
    pub fn to_json(&self) -> Value {
        match self {
            WebhookOutcome::StatusesApplied { .. } => json!({ "status": "ok" }),
            WebhookOutcome::Ignored => json!({ "status": "ignored" }),
            WebhookOutcome::Disabled { conversation_id } => {
                json!({ "status": "disabled", "conversation_id": conversation_id })
            }
            WebhookOutcome::Replied {
                reply,
                conversation_id,
            } => json!({ "status": "ok", "reply": reply, "conversation_id": conversation_id }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    Received,
    ContactResolved,
    ConversationResolved,
    InboundPersisted,
    ContextAssembled,
    CompletionObtained,
    Delivered,
    OutboundPersisted,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TurnStage::Received => "received",
            TurnStage::ContactResolved => "contact-resolved",
            TurnStage::ConversationResolved => "conversation-resolved",
            TurnStage::InboundPersisted => "inbound-persisted",
            TurnStage::ContextAssembled => "context-assembled",
            TurnStage::CompletionObtained => "completion-obtained",
            TurnStage::Delivered => "delivered",
            TurnStage::OutboundPersisted => "outbound-persisted",
        };
        f.write_str(name)
    }
}

pub async fn handle_webhook(state: &AppState, body: &Value) -> Result<WebhookOutcome, AppError> {
    let Some(delivery) = state.delivery.as_ref() else {
        return Err(AppError::ConfigurationMissing("WhatsApp config missing"));
    };

    match classify(body, &state.default_tenant_id) {
        WebhookEvent::StatusUpdate(updates) => {
            let updated = apply_status_updates(state.store.as_ref(), &updates).await;
            tracing::info!(events = updates.len(), updated, "applied delivery statuses");
            Ok(WebhookOutcome::StatusesApplied { updated })
        }
        WebhookEvent::Ignored => {
            tracing::debug!("webhook carried nothing to process");
            Ok(WebhookOutcome::Ignored)
        }
        WebhookEvent::Invalid => Err(AppError::InvalidPayload),
        WebhookEvent::InboundMessage(inbound) => {
            let mut stage = TurnStage::Received;
            let result = run_turn(state, delivery, &inbound, &mut stage).await;
            if let Err(err) = &result {
                tracing::warn!(%stage, tenant_id = %inbound.tenant_id, error = %err, "inbound turn stopped");
            }
            result
        }
    }
}

async fn run_turn(
    state: &AppState,
    delivery: &WhatsAppClient,
    inbound: &InboundMessage,
    stage: &mut TurnStage,
) -> Result<WebhookOutcome, AppError> {
    let store = state.store.as_ref();
    let tenant_id = inbound.tenant_id.as_str();
    let now = Utc::now();

    let contact =
        resolve_contact(store, tenant_id, &inbound.phone, inbound.contact_name.as_deref()).await?;
    *stage = TurnStage::ContactResolved;

    let title = inbound.contact_name.as_deref().unwrap_or(&inbound.phone);
    let resolved = resolve_conversation(store, tenant_id, &contact, title, &inbound.text, now).await?;
    let conversation_id = resolved.conversation.id.clone();
    *stage = TurnStage::ConversationResolved;
    tracing::info!(
        %tenant_id,
        contact_id = %contact.id,
        %conversation_id,
        created = resolved.created,
        "resolved conversation"
    );

    record_inbound(store, inbound, &resolved, now).await?;
    *stage = TurnStage::InboundPersisted;

    let settings = ReplySettings::from(store.bot_settings(tenant_id).await?);
    if !settings.is_active {
        tracing::info!(%conversation_id, "bot disabled for tenant, not replying");
        return Ok(WebhookOutcome::Disabled { conversation_id });
    }

    let knowledge = knowledge_context(store, tenant_id).await?;
    let system_prompt = render_system_prompt(&SystemPromptContext {
        base_prompt: &settings.system_prompt,
        knowledge: &knowledge,
    });

    let Some(completion) = state.completion.as_ref() else {
        return Err(AppError::ConfigurationMissing("OpenAI key missing"));
    };

    let window = MemoryWindow {
        hours: settings.memory_hours,
        max_messages: settings.max_history_messages,
    };
    let history = conversation_history(store, &conversation_id, window, Utc::now()).await?;
    *stage = TurnStage::ContextAssembled;

    let reply = completion
        .complete(&CompletionRequest {
            model: &settings.model,
            temperature: settings.temperature,
            system_prompt: &system_prompt,
            history: &history,
            message_text: &inbound.text,
        })
        .await?;
    *stage = TurnStage::CompletionObtained;

    let wa_message_id = delivery
        .send_text(inbound.phone_number_id.as_deref(), &inbound.phone, &reply)
        .await?;
    *stage = TurnStage::Delivered;

    record_outbound(
        store,
        OutboundRecord {
            tenant_id,
            conversation_id: &conversation_id,
            sender: &settings.name,
            body: &reply,
            wa_message_id: wa_message_id.clone(),
            sent_at: Utc::now(),
        },
    )
    .await?;
    *stage = TurnStage::OutboundPersisted;
    tracing::info!(%conversation_id, wa_message_id = ?wa_message_id, "reply delivered");

    Ok(WebhookOutcome::Replied {
        reply,
        conversation_id,
    })
}
