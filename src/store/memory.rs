use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{status_fields, ConversationStore, ConversationTouch};
use crate::error::AppError;
use crate::types::{
    BotSettings, Contact, Conversation, KnowledgeEntry, NewMessage, ResolvedConversation,
    StatusUpdate, StoredMessage, CONVERSATION_OPEN,
};

#[derive(Default)]
struct MemoryState {
    contacts: Vec<Contact>,
    conversations: Vec<Conversation>,
    messages: Vec<StoredMessage>,
    settings: HashMap<String, BotSettings>,
    knowledge: HashMap<String, Vec<(DateTime<Utc>, KnowledgeEntry)>>,
}

/// In-process store with the same observable behaviour as `PgStore`.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_bot_settings(&self, tenant_id: &str, settings: BotSettings) {
        self.state
            .lock()
            .await
            .settings
            .insert(tenant_id.to_string(), settings);
    }

    pub async fn add_knowledge(
        &self,
        tenant_id: &str,
        title: &str,
        content: &str,
        updated_at: DateTime<Utc>,
    ) {
        self.state
            .lock()
            .await
            .knowledge
            .entry(tenant_id.to_string())
            .or_default()
            .push((
                updated_at,
                KnowledgeEntry {
                    title: Some(title.to_string()),
                    content: Some(content.to_string()),
                },
            ));
    }

    /// Inserts an open conversation directly and returns its id.
    pub async fn seed_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        title: &str,
        updated_at: DateTime<Utc>,
    ) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.lock().await.conversations.push(Conversation {
            id: id.clone(),
            tenant_id: tenant_id.to_string(),
            contact_id: contact_id.to_string(),
            title: title.to_string(),
            last_message: String::new(),
            status: CONVERSATION_OPEN.to_string(),
            unread_count: 0,
            updated_at,
        });
        id
    }

    pub async fn contacts(&self) -> Vec<Contact> {
        self.state.lock().await.contacts.clone()
    }

    pub async fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().await.conversations.clone()
    }

    pub async fn messages(&self) -> Vec<StoredMessage> {
        self.state.lock().await.messages.clone()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn upsert_contact(
        &self,
        tenant_id: &str,
        phone: &str,
        display_name: Option<&str>,
    ) -> Result<Option<Contact>, AppError> {
        let mut state = self.state.lock().await;
        if let Some(contact) = state
            .contacts
            .iter_mut()
            .find(|c| c.tenant_id == tenant_id && c.phone == phone)
        {
            if let Some(name) = display_name {
                contact.full_name = name.to_string();
            }
            return Ok(Some(contact.clone()));
        }
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            phone: phone.to_string(),
            full_name: display_name.unwrap_or(phone).to_string(),
            tags: Vec::new(),
        };
        state.contacts.push(contact.clone());
        Ok(Some(contact))
    }

    async fn find_or_create_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        title: &str,
        first_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedConversation>, AppError> {
        let mut state = self.state.lock().await;
        let latest = state
            .conversations
            .iter()
            .filter(|c| c.tenant_id == tenant_id && c.contact_id == contact_id)
            .max_by_key(|c| c.updated_at);
        if let Some(conversation) = latest {
            return Ok(Some(ResolvedConversation {
                conversation: conversation.clone(),
                created: false,
            }));
        }
        let conversation = Conversation {
            id: Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            contact_id: contact_id.to_string(),
            title: title.to_string(),
            last_message: first_message.to_string(),
            status: CONVERSATION_OPEN.to_string(),
            unread_count: 1,
            updated_at: now,
        };
        state.conversations.push(conversation.clone());
        Ok(Some(ResolvedConversation {
            conversation,
            created: true,
        }))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        self.state.lock().await.messages.push(StoredMessage {
            id: id.clone(),
            tenant_id: message.tenant_id.clone(),
            conversation_id: message.conversation_id.clone(),
            sender: message.sender.clone(),
            body: message.body.clone(),
            is_from_customer: message.is_from_customer,
            sent_at: message.sent_at,
            wa_message_id: message.wa_message_id.clone(),
            wa_status: message.wa_status.clone(),
            delivered_at: None,
            read_at: None,
        });
        Ok(id)
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        touch: &ConversationTouch,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().await;
        if let Some(conversation) = state
            .conversations
            .iter_mut()
            .find(|c| c.id == conversation_id)
        {
            conversation.last_message = touch.last_message.clone();
            conversation.updated_at = touch.updated_at;
            if touch.reopen {
                conversation.status = CONVERSATION_OPEN.to_string();
            }
            conversation.unread_count += touch.unread_increment;
        }
        Ok(())
    }

    async fn bot_settings(&self, tenant_id: &str) -> Result<Option<BotSettings>, AppError> {
        Ok(self.state.lock().await.settings.get(tenant_id).cloned())
    }

    async fn recent_knowledge(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<KnowledgeEntry>, AppError> {
        let state = self.state.lock().await;
        let mut entries = state.knowledge.get(tenant_id).cloned().unwrap_or_default();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|(_, entry)| entry)
            .collect())
    }

    async fn messages_since(
        &self,
        conversation_id: &str,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let state = self.state.lock().await;
        let mut messages = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.sent_at >= cutoff)
            .cloned()
            .collect::<Vec<_>>();
        messages.sort_by(|a, b| b.sent_at.cmp(&a.sent_at));
        messages.truncate(limit.max(0) as usize);
        Ok(messages)
    }

    async fn apply_status(&self, update: &StatusUpdate) -> Result<u64, AppError> {
        let Some(fields) = status_fields(update) else {
            return Ok(0);
        };
        let mut state = self.state.lock().await;
        let mut touched = 0;
        for message in state
            .messages
            .iter_mut()
            .filter(|m| m.wa_message_id.as_deref() == Some(update.message_id.as_str()))
        {
            message.wa_status = Some(fields.state.to_string());
            if fields.delivered_at.is_some() {
                message.delivered_at = fields.delivered_at;
            }
            if fields.read_at.is_some() {
                message.read_at = fields.read_at;
            }
            touched += 1;
        }
        Ok(touched)
    }
}
