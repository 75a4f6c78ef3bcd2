use std::env;

pub const DEFAULT_TENANT_ID: &str = "11111111-1111-1111-1111-111111111111";
const DEFAULT_WHATSAPP_API_VERSION: &str = "v20.0";
const DEFAULT_WHATSAPP_BASE_URL: &str = "https://graph.facebook.com";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub api_version: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
}

/// Process configuration, read once at start-up.
///
/// Provider credentials are optional here; handlers report their absence per request.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub whatsapp: Option<WhatsAppConfig>,
    pub openai: Option<OpenAiConfig>,
    pub default_tenant_id: String,
    pub verify_token: String,
}

impl Config {
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(4000);

        let whatsapp = non_empty_var("WHATSAPP_ACCESS_TOKEN").map(|access_token| WhatsAppConfig {
            access_token,
            phone_number_id: non_empty_var("WHATSAPP_PHONE_NUMBER_ID").unwrap_or_default(),
            api_version: non_empty_var("WHATSAPP_API_VERSION")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_API_VERSION.to_string()),
            base_url: non_empty_var("WHATSAPP_BASE_URL")
                .unwrap_or_else(|| DEFAULT_WHATSAPP_BASE_URL.to_string()),
        });

        let openai = non_empty_var("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: non_empty_var("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        });

        Self {
            port,
            database_url: resolve_database_url(),
            whatsapp,
            openai,
            default_tenant_id: non_empty_var("DEFAULT_TENANT_ID")
                .unwrap_or_else(|| DEFAULT_TENANT_ID.to_string()),
            verify_token: env::var("WHATSAPP_WEBHOOK_TOKEN").unwrap_or_default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn resolve_database_url() -> String {
    if let Some(url) = non_empty_var("DATABASE_URL") {
        return url;
    }
    let host = env::var("POSTGRES_HOST")
        .or_else(|_| env::var("PGHOST"))
        .unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("POSTGRES_PORT")
        .or_else(|_| env::var("PGPORT"))
        .unwrap_or_else(|_| "5432".to_string());
    let user = env::var("POSTGRES_USER")
        .or_else(|_| env::var("PGUSER"))
        .unwrap_or_else(|_| "postgres".to_string());
    let password = env::var("POSTGRES_PASSWORD")
        .or_else(|_| env::var("PGPASSWORD"))
        .unwrap_or_else(|_| "postgres".to_string());
    let db = env::var("POSTGRES_DB")
        .or_else(|_| env::var("PGDATABASE"))
        .unwrap_or_else(|_| "whatsapp_bot".to_string());
    format!("postgres://{user}:{password}@{host}:{port}/{db}")
}
