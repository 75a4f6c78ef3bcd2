//! Persistence seam for contacts, conversations and messages.
//!
//! Production runs against Postgres; tests run the same pipeline against an in-memory
//! store with identical semantics.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::types::{
    BotSettings, Contact, KnowledgeEntry, NewMessage, ResolvedConversation, StatusUpdate,
    StoredMessage,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// Summary fields written onto a conversation after each turn.
#[derive(Debug, Clone)]
pub struct ConversationTouch {
    pub last_message: String,
    pub updated_at: DateTime<Utc>,
    /// Force `status` back to open.
    pub reopen: bool,
    pub unread_increment: i32,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Inserts the contact or, when `(tenant_id, phone)` already exists, returns it with
    /// `display_name` applied. `None` means the row could not be produced.
    async fn upsert_contact(
        &self,
        tenant_id: &str,
        phone: &str,
        display_name: Option<&str>,
    ) -> Result<Option<Contact>, AppError>;

    /// Returns the most recently updated conversation for the contact, creating an open
    /// one seeded with `first_message` when none exists.
    async fn find_or_create_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        title: &str,
        first_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedConversation>, AppError>;

    async fn insert_message(&self, message: &NewMessage) -> Result<String, AppError>;

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        touch: &ConversationTouch,
    ) -> Result<(), AppError>;

    async fn bot_settings(&self, tenant_id: &str) -> Result<Option<BotSettings>, AppError>;

    /// Most recently updated entries first.
    async fn recent_knowledge(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<KnowledgeEntry>, AppError>;

    /// Messages sent at or after `cutoff`, newest first.
    async fn messages_since(
        &self,
        conversation_id: &str,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, AppError>;

    /// Applies a delivery status to every message carrying its external id and returns
    /// the number of rows touched.
    async fn apply_status(&self, update: &StatusUpdate) -> Result<u64, AppError>;
}

/// Column values a status event writes: the new state, plus `delivered_at`/`read_at`
/// only when the state names them and a timestamp was parsed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StatusFields<'a> {
    pub state: &'a str,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
}

pub(crate) fn status_fields(update: &StatusUpdate) -> Option<StatusFields<'_>> {
    let state = update.state.as_deref()?;
    let stamped = |name: &str| update.timestamp.filter(|_| state == name);
    Some(StatusFields {
        state,
        delivered_at: stamped(crate::types::STATUS_DELIVERED),
        read_at: stamped(crate::types::STATUS_READ),
    })
}
