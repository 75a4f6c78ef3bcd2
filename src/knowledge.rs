use crate::error::AppError;
use crate::store::ConversationStore;
use crate::types::KnowledgeEntry;

pub const KNOWLEDGE_ENTRY_LIMIT: i64 = 5;
pub const MAX_KNOWLEDGE_LENGTH: usize = 600;

/// Renders the tenant's newest knowledge entries as a bullet list, or an empty string when
/// the tenant has none.
pub async fn knowledge_context(
    store: &dyn ConversationStore,
    tenant_id: &str,
) -> Result<String, AppError> {
    let entries = store
        .recent_knowledge(tenant_id, KNOWLEDGE_ENTRY_LIMIT)
        .await?;
    Ok(render_knowledge(&entries))
}

pub fn render_knowledge(entries: &[KnowledgeEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            let title = entry.title.as_deref().unwrap_or("Note").trim();
            let content = truncate_chars(entry.content.as_deref().unwrap_or("").trim());
            format!("- {title}: {content}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate_chars(content: &str) -> String {
    match content.char_indices().nth(MAX_KNOWLEDGE_LENGTH) {
        Some((cut, _)) => format!("{}...", &content[..cut]),
        None => content.to_string(),
    }
}
