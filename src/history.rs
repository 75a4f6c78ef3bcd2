use chrono::{DateTime, Duration, Utc};

use crate::error::AppError;
use crate::store::ConversationStore;
use crate::types::{ChatRole, ChatTurn};

#[derive(Debug, Clone, Copy)]
pub struct MemoryWindow {
    pub hours: i64,
    pub max_messages: i64,
}

/// Recent turns of a conversation, oldest first, as completion context.
///
/// Only messages sent within the last `hours` count, and of those only the newest
/// `max_messages`.
pub async fn conversation_history(
    store: &dyn ConversationStore,
    conversation_id: &str,
    window: MemoryWindow,
    now: DateTime<Utc>,
) -> Result<Vec<ChatTurn>, AppError> {
    // A window too wide for chrono means no time bound. The epoch stands in for the
    // minimum since Postgres rejects timestamps as early as `DateTime::MIN_UTC`.
    let cutoff = Duration::try_hours(window.hours.max(0))
        .and_then(|span| now.checked_sub_signed(span))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let mut recent = store
        .messages_since(conversation_id, cutoff, window.max_messages.max(0))
        .await?;
    recent.reverse();
    Ok(recent
        .into_iter()
        .map(|message| {
            let role = if message.is_from_customer {
                ChatRole::User
            } else {
                ChatRole::Assistant
            };
            ChatTurn::new(role, message.body)
        })
        .collect())
}
