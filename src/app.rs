use std::{collections::HashMap, sync::Arc};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::completion::OpenAiClient;
use crate::config::Config;
use crate::delivery::WhatsAppClient;
use crate::error::AppError;
use crate::pipeline::handle_webhook;
use crate::store::{ConversationStore, PgStore};

pub struct AppState {
    pub store: Arc<dyn ConversationStore>,
    pub completion: Option<OpenAiClient>,
    pub delivery: Option<WhatsAppClient>,
    pub default_tenant_id: String,
    pub verify_token: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/webhook",
            get(webhook_verify)
                .post(webhook_event)
                .fallback(method_not_allowed),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method not allowed" })),
    )
}

async fn webhook_verify(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let mode = params.get("hub.mode").cloned().unwrap_or_default();
    let verify_token = params.get("hub.verify_token").cloned().unwrap_or_default();
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    if mode == "subscribe"
        && !challenge.is_empty()
        && !state.verify_token.is_empty()
        && verify_token == state.verify_token
    {
        return (StatusCode::OK, challenge).into_response();
    }

    tracing::warn!(%mode, "webhook verification rejected");
    (
        StatusCode::FORBIDDEN,
        Json(json!({ "error": "Forbidden" })),
    )
        .into_response()
}

async fn webhook_event(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    let payload = serde_json::from_slice::<Value>(&body).unwrap_or_else(|_| json!({}));
    match handle_webhook(&state, &payload).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.to_json())).into_response(),
        Err(err) => err.into_response(),
    }
}

pub async fn run() -> Result<(), AppError> {
    let config = Config::from_env();

    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let http = reqwest::Client::new();
    if config.whatsapp.is_none() {
        tracing::warn!("WHATSAPP_ACCESS_TOKEN is not set; webhook posts will be refused");
    }
    if config.openai.is_none() {
        tracing::warn!("OPENAI_API_KEY is not set; active bots cannot reply");
    }

    let state = Arc::new(AppState {
        store: Arc::new(PgStore::new(db)),
        completion: config
            .openai
            .as_ref()
            .map(|openai| OpenAiClient::new(http.clone(), openai)),
        delivery: config
            .whatsapp
            .as_ref()
            .map(|whatsapp| WhatsAppClient::new(http.clone(), whatsapp)),
        default_tenant_id: config.default_tenant_id.clone(),
        verify_token: config.verify_token.clone(),
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("whatsapp bot server running at http://localhost:{}", config.port);
    axum::serve(listener, router(state)).await?;
    Ok(())
}
