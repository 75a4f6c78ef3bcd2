use serde_json::{json, Value};

use crate::config::OpenAiConfig;
use crate::error::AppError;
use crate::types::{ChatRole, ChatTurn};

pub const MAX_REPLY_TOKENS: u32 = 200;
pub const FALLBACK_REPLY: &str = "How can I help you?";

pub struct CompletionRequest<'a> {
    pub model: &'a str,
    pub temperature: f64,
    pub system_prompt: &'a str,
    pub history: &'a [ChatTurn],
    pub message_text: &'a str,
}

/// System turn followed by the history; with no history the inbound text stands in as
/// the only user turn.
pub fn build_messages(system_prompt: &str, history: &[ChatTurn], message_text: &str) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatTurn::new(ChatRole::System, system_prompt));
    if history.is_empty() {
        messages.push(ChatTurn::new(ChatRole::User, message_text));
    } else {
        messages.extend_from_slice(history);
    }
    messages
}

#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, config: &OpenAiConfig) -> Self {
        Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// One chat-completion call, no retries. Any non-success answer is returned as
    /// `CompletionRejected` with the upstream body.
    pub async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String, AppError> {
        let messages = build_messages(request.system_prompt, request.history, request.message_text);
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": request.model,
                "temperature": request.temperature,
                "max_tokens": MAX_REPLY_TOKENS,
                "messages": messages,
            }))
            .send()
            .await
            .map_err(|err| AppError::CompletionRejected(format!("openai request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, "completion service rejected request");
            return Err(AppError::CompletionRejected(body));
        }

        let payload = response
            .json::<Value>()
            .await
            .map_err(|err| AppError::CompletionRejected(format!("openai parse failed: {err}")))?;
        Ok(reply_text(&payload))
    }
}

fn reply_text(payload: &Value) -> String {
    payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(FALLBACK_REPLY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> OpenAiClient {
        OpenAiClient::new(
            reqwest::Client::new(),
            &OpenAiConfig {
                api_key: "sk-test".into(),
                base_url: base_url.into(),
            },
        )
    }

    fn request<'a>(history: &'a [ChatTurn]) -> CompletionRequest<'a> {
        CompletionRequest {
            model: "gpt-4o-mini",
            temperature: 0.3,
            system_prompt: "Be brief.",
            history,
            message_text: "Merhaba",
        }
    }

    #[test]
    fn empty_history_sends_the_inbound_text() {
        let messages = build_messages("sys", &[], "Merhaba");
        assert_eq!(
            messages,
            vec![
                ChatTurn::new(ChatRole::System, "sys"),
                ChatTurn::new(ChatRole::User, "Merhaba"),
            ]
        );
    }

    #[test]
    fn history_replaces_the_inbound_text() {
        let history = vec![
            ChatTurn::new(ChatRole::User, "a"),
            ChatTurn::new(ChatRole::Assistant, "b"),
            ChatTurn::new(ChatRole::User, "Merhaba"),
        ];
        let messages = build_messages("sys", &history, "ignored");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1..], history[..]);
    }

    #[tokio::test]
    async fn complete_returns_trimmed_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 200,
                "messages": [
                    { "role": "system", "content": "Be brief." },
                    { "role": "user", "content": "Merhaba" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": "  Hi there!  " } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = test_client(&server.uri()).complete(&request(&[])).await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn blank_completion_uses_fallback_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "content": "   " } }]
            })))
            .mount(&server)
            .await;

        let reply = test_client(&server.uri()).complete(&request(&[])).await.unwrap();
        assert_eq!(reply, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn upstream_error_body_is_propagated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
            .expect(1)
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .complete(&request(&[]))
            .await
            .unwrap_err();
        match err {
            AppError::CompletionRejected(body) => assert_eq!(body, "model overloaded"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
