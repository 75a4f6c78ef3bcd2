use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const CONVERSATION_OPEN: &str = "open";
pub const STATUS_SENT: &str = "sent";
pub const STATUS_DELIVERED: &str = "delivered";
pub const STATUS_READ: &str = "read";

pub const DEFAULT_BOT_NAME: &str = "Bot";
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "Reply briefly, like a professional customer representative.";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f64 = 0.3;
pub const DEFAULT_MEMORY_HOURS: i64 = 6;
pub const DEFAULT_HISTORY_MESSAGES: i64 = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub tenant_id: String,
    pub phone: String,
    pub full_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub tenant_id: String,
    pub contact_id: String,
    pub title: String,
    pub last_message: String,
    pub status: String,
    pub unread_count: i32,
    pub updated_at: DateTime<Utc>,
}

/// A conversation handed back by the resolver, flagged when this call created it.
#[derive(Debug, Clone)]
pub struct ResolvedConversation {
    pub conversation: Conversation,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub tenant_id: String,
    pub conversation_id: String,
    pub sender: String,
    pub body: String,
    pub is_from_customer: bool,
    pub sent_at: DateTime<Utc>,
    pub wa_message_id: Option<String>,
    pub wa_status: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub tenant_id: String,
    pub conversation_id: String,
    pub sender: String,
    pub body: String,
    pub is_from_customer: bool,
    pub sent_at: DateTime<Utc>,
    pub wa_message_id: Option<String>,
    pub wa_status: Option<String>,
}

/// Raw `bot_settings` row; every column may be unset.
#[derive(Debug, Clone, Default)]
pub struct BotSettings {
    pub name: Option<String>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub is_active: Option<bool>,
    pub memory_hours: Option<i64>,
    pub max_history_messages: Option<i64>,
}

/// Bot settings with defaults filled in for a tenant.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplySettings {
    pub name: String,
    pub system_prompt: String,
    pub model: String,
    pub temperature: f64,
    pub is_active: bool,
    pub memory_hours: i64,
    pub max_history_messages: i64,
}

impl From<Option<BotSettings>> for ReplySettings {
    fn from(row: Option<BotSettings>) -> Self {
        let row = row.unwrap_or_default();
        Self {
            name: row.name.unwrap_or_else(|| DEFAULT_BOT_NAME.to_string()),
            system_prompt: row
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
                .trim()
                .to_string(),
            model: row.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: row.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            is_active: row.is_active.unwrap_or(true),
            memory_hours: row.memory_hours.unwrap_or(DEFAULT_MEMORY_HOURS),
            max_history_messages: row
                .max_history_messages
                .unwrap_or(DEFAULT_HISTORY_MESSAGES),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeEntry {
    pub title: Option<String>,
    pub content: Option<String>,
}

/// One delivery-status event correlated by the provider's message id.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub message_id: String,
    pub state: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub tenant_id: String,
    pub phone_number_id: Option<String>,
    pub phone: String,
    pub contact_name: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}
