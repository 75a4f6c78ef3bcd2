use serde_json::{json, Value};

use crate::config::WhatsAppConfig;
use crate::error::AppError;

pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

#[derive(Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    access_token: String,
    base_url: String,
    api_version: String,
    default_phone_number_id: String,
}

impl WhatsAppClient {
    pub fn new(http: reqwest::Client, config: &WhatsAppConfig) -> Self {
        Self {
            http,
            access_token: config.access_token.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            default_phone_number_id: config.phone_number_id.clone(),
        }
    }

    /// Sends one text message and returns the provider-assigned message id, if any.
    ///
    /// `phone_number_id` selects the sending number; the configured one is used when the
    /// webhook did not name it.
    pub async fn send_text(
        &self,
        phone_number_id: Option<&str>,
        to_raw: &str,
        body: &str,
    ) -> Result<Option<String>, AppError> {
        let sender_id = phone_number_id.unwrap_or(&self.default_phone_number_id);
        let payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": normalize_phone(to_raw),
            "type": "text",
            "text": { "body": body },
        });

        let response = self
            .http
            .post(format!(
                "{}/{}/{}/messages",
                self.base_url, self.api_version, sender_id
            ))
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|err| AppError::DeliveryRejected(format!("whatsapp request failed: {err}")))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            tracing::warn!(%status, "delivery service rejected message");
            return Err(AppError::DeliveryRejected(raw_body));
        }

        let Ok(body) = serde_json::from_str::<Value>(&raw_body) else {
            tracing::warn!(%status, "delivery service answered with an undecodable body");
            return Err(AppError::DeliveryRejected(raw_body));
        };
        Ok(body
            .get("messages")
            .and_then(Value::as_array)
            .and_then(|messages| messages.first())
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string))
    }
}
