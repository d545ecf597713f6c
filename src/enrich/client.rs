//! HTTP client for an OpenAI-compatible model service.
//!
//! Two endpoints are used: `GET /models` for validation of the configured
//! model list and `POST /chat/completions` for enrichment calls. The
//! [`ModelClient`] trait is the seam that lets engine tests substitute
//! scripted responses for live HTTP.

use super::ModelCallError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

/// Hard timeout for one model call.
const MODEL_TIMEOUT_SECS: u64 = 30;

/// Calls into an OpenAI-compatible service.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// List the model ids the service currently offers.
    async fn list_models(&self) -> Result<Vec<String>, ModelCallError>;

    /// Run one chat completion and return the assistant message text.
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelCallError>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

/// HTTP implementation of [`ModelClient`].
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpModelClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(crate::feeds::USER_AGENT)
            .timeout(Duration::from_secs(MODEL_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    #[instrument(level = "debug", skip_all)]
    async fn list_models(&self) -> Result<Vec<String>, ModelCallError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(ModelCallError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelCallError::Status(status.as_u16()));
        }

        let parsed: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(e.to_string()))?;
        let ids: Vec<String> = parsed.data.into_iter().map(|m| m.id).collect();
        debug!(count = ids.len(), "Listed available models");
        Ok(ids)
    }

    #[instrument(level = "debug", skip_all, fields(model = %model))]
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, ModelCallError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.3,
        };

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(ModelCallError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ModelCallError::Status(status.as_u16()));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ModelCallError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ModelCallError::Malformed("response had no choices".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serializes_openai_shape() {
        let body = ChatRequest {
            model: "test-model",
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
            temperature: 0.3,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "test-model");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"], "hello");
    }

    #[test]
    fn test_chat_response_parses_first_choice() {
        let raw = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"{\"headline\":\"Hi\"}"},"finish_reason":"stop"}],"usage":{"total_tokens":10}}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].message.content, "{\"headline\":\"Hi\"}");
    }

    #[test]
    fn test_models_response_parses_ids() {
        let raw = r#"{"object":"list","data":[{"id":"gpt-4o-mini","object":"model"},{"id":"gpt-4o","object":"model"}]}"#;
        let parsed: ModelsResponse = serde_json::from_str(raw).unwrap();
        let ids: Vec<String> = parsed.data.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["gpt-4o-mini", "gpt-4o"]);
    }
}
