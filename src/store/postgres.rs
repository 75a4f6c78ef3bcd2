use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use super::{status_fields, ConversationStore, ConversationTouch};
use crate::error::AppError;
use crate::types::{
    BotSettings, Contact, Conversation, KnowledgeEntry, NewMessage, ResolvedConversation,
    StatusUpdate, StoredMessage, CONVERSATION_OPEN,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_contact_row(row: &PgRow) -> Result<Contact, sqlx::Error> {
    Ok(Contact {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        phone: row.try_get("phone")?,
        full_name: row.try_get("full_name")?,
        tags: row.try_get("tags")?,
    })
}

fn parse_conversation_row(row: &PgRow) -> Result<Conversation, sqlx::Error> {
    Ok(Conversation {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        contact_id: row.try_get("contact_id")?,
        title: row.try_get("title")?,
        last_message: row.try_get("last_message")?,
        status: row.try_get("status")?,
        unread_count: row.try_get("unread_count")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn parse_message_row(row: &PgRow) -> Result<StoredMessage, sqlx::Error> {
    Ok(StoredMessage {
        id: row.try_get("id")?,
        tenant_id: row.try_get("tenant_id")?,
        conversation_id: row.try_get("conversation_id")?,
        sender: row.try_get("sender")?,
        body: row.try_get("body")?,
        is_from_customer: row.try_get("is_from_customer")?,
        sent_at: row.try_get("sent_at")?,
        wa_message_id: row.try_get("wa_message_id")?,
        wa_status: row.try_get("wa_status")?,
        delivered_at: row.try_get("delivered_at")?,
        read_at: row.try_get("read_at")?,
    })
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn upsert_contact(
        &self,
        tenant_id: &str,
        phone: &str,
        display_name: Option<&str>,
    ) -> Result<Option<Contact>, AppError> {
        // One statement so concurrent first messages from a phone converge on one row.
        let row = sqlx::query(
            "INSERT INTO contacts (id, tenant_id, phone, full_name, tags, created_at) \
             VALUES ($1, $2, $3, $4, '{}', $5) \
             ON CONFLICT (tenant_id, phone) DO UPDATE \
               SET full_name = COALESCE($6, contacts.full_name) \
             RETURNING id, tenant_id, phone, full_name, tags",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(tenant_id)
        .bind(phone)
        .bind(display_name.unwrap_or(phone))
        .bind(Utc::now())
        .bind(display_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(parse_contact_row).transpose()?)
    }

    async fn find_or_create_conversation(
        &self,
        tenant_id: &str,
        contact_id: &str,
        title: &str,
        first_message: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ResolvedConversation>, AppError> {
        let existing = sqlx::query(
            "SELECT id, tenant_id, contact_id, title, last_message, status, unread_count, updated_at \
             FROM conversations \
             WHERE tenant_id = $1 AND contact_id = $2 \
             ORDER BY updated_at DESC \
             LIMIT 1",
        )
        .bind(tenant_id)
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await?;
        if let Some(row) = existing {
            return Ok(Some(ResolvedConversation {
                conversation: parse_conversation_row(&row)?,
                created: false,
            }));
        }

        let created = sqlx::query(
            "INSERT INTO conversations \
             (id, tenant_id, contact_id, title, last_message, status, tags, unread_count, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, '{}', 1, $7, $7) \
             RETURNING id, tenant_id, contact_id, title, last_message, status, unread_count, updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(tenant_id)
        .bind(contact_id)
        .bind(title)
        .bind(first_message)
        .bind(CONVERSATION_OPEN)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(created
            .as_ref()
            .map(parse_conversation_row)
            .transpose()?
            .map(|conversation| ResolvedConversation {
                conversation,
                created: true,
            }))
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<String, AppError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO messages \
             (id, tenant_id, conversation_id, sender, body, is_from_customer, sent_at, wa_message_id, wa_status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&id)
        .bind(&message.tenant_id)
        .bind(&message.conversation_id)
        .bind(&message.sender)
        .bind(&message.body)
        .bind(message.is_from_customer)
        .bind(message.sent_at)
        .bind(&message.wa_message_id)
        .bind(&message.wa_status)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn touch_conversation(
        &self,
        conversation_id: &str,
        touch: &ConversationTouch,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE conversations SET \
               last_message = $1, \
               updated_at = $2, \
               status = CASE WHEN $3 THEN $4 ELSE status END, \
               unread_count = unread_count + $5 \
             WHERE id = $6",
        )
        .bind(&touch.last_message)
        .bind(touch.updated_at)
        .bind(touch.reopen)
        .bind(CONVERSATION_OPEN)
        .bind(touch.unread_increment)
        .bind(conversation_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn bot_settings(&self, tenant_id: &str) -> Result<Option<BotSettings>, AppError> {
        let row = sqlx::query(
            "SELECT name, system_prompt, model, temperature, is_active, memory_hours, max_history_messages \
             FROM bot_settings WHERE tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(BotSettings {
            name: row.try_get("name")?,
            system_prompt: row.try_get("system_prompt")?,
            model: row.try_get("model")?,
            temperature: row.try_get("temperature")?,
            is_active: row.try_get("is_active")?,
            memory_hours: row.try_get("memory_hours")?,
            max_history_messages: row.try_get("max_history_messages")?,
        }))
    }

    async fn recent_knowledge(
        &self,
        tenant_id: &str,
        limit: i64,
    ) -> Result<Vec<KnowledgeEntry>, AppError> {
        let rows = sqlx::query(
            "SELECT title, content FROM knowledge_base \
             WHERE tenant_id = $1 \
             ORDER BY updated_at DESC \
             LIMIT $2",
        )
        .bind(tenant_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        let entries = rows
            .iter()
            .map(|row| {
                Ok::<_, sqlx::Error>(KnowledgeEntry {
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    async fn messages_since(
        &self,
        conversation_id: &str,
        cutoff: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StoredMessage>, AppError> {
        let rows = sqlx::query(
            "SELECT id, tenant_id, conversation_id, sender, body, is_from_customer, sent_at, \
                    wa_message_id, wa_status, delivered_at, read_at \
             FROM messages \
             WHERE conversation_id = $1 AND sent_at >= $2 \
             ORDER BY sent_at DESC \
             LIMIT $3",
        )
        .bind(conversation_id)
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(parse_message_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn apply_status(&self, update: &StatusUpdate) -> Result<u64, AppError> {
        let Some(fields) = status_fields(update) else {
            return Ok(0);
        };
        let result = sqlx::query(
            "UPDATE messages SET \
               wa_status = $1, \
               delivered_at = COALESCE($2, delivered_at), \
               read_at = COALESCE($3, read_at) \
             WHERE wa_message_id = $4",
        )
        .bind(fields.state)
        .bind(fields.delivered_at)
        .bind(fields.read_at)
        .bind(&update.message_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
