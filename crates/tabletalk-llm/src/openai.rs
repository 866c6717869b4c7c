//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tabletalk_core::error::{Result, TabletalkError};

use crate::{ChatModel, CompletionRequest, Message, Role};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat model backed by an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiChatModel {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChatModel {
    /// Create a new client against the official OpenAI endpoint.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL)
    }

    /// Create a client with a custom base URL (Azure or compatible APIs).
    pub fn with_base_url(
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        }
    }

    /// Create from environment variables.
    ///
    /// Reads `OPENAI_API_KEY` (required), `OPENAI_MODEL` (default
    /// "gpt-4o-mini"), and `OPENAI_BASE_URL` (default official endpoint).
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            TabletalkError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Ok(Self::with_base_url(api_key, model, base_url))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Serialize)]
struct WireRequest {
    model: String,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
}

#[derive(Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: Option<WireMessageBody>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireMessageBody {
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireError {
    error: WireErrorDetail,
}

#[derive(Deserialize)]
struct WireErrorDetail {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

fn convert_messages(messages: &[Message]) -> Vec<WireMessage> {
    messages
        .iter()
        .map(|m| WireMessage {
            role: match m.role {
                Role::System => "system".to_string(),
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        })
        .collect()
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let wire_request = WireRequest {
            model: self.model.clone(),
            messages: convert_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| TabletalkError::Llm(format!("Request to model API failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            // Prefer the structured error body when the API sends one.
            if let Ok(parsed) = serde_json::from_str::<WireError>(&text) {
                return Err(TabletalkError::Llm(format!(
                    "Model API error ({}): {}",
                    parsed.error.error_type.unwrap_or_else(|| status.to_string()),
                    parsed.error.message
                )));
            }
            return Err(TabletalkError::Llm(format!(
                "Model API error ({}): {}",
                status, text
            )));
        }

        let parsed: WireResponse = response
            .json()
            .await
            .map_err(|e| TabletalkError::Llm(format!("Failed to parse model response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| TabletalkError::Llm("Model API returned no choices".to_string()))?;

        if choice.finish_reason.as_deref() == Some("content_filter") {
            return Err(TabletalkError::Llm(
                "Model reply was blocked by the provider's content filter".to_string(),
            ));
        }

        let content = choice
            .message
            .and_then(|m| m.content)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(TabletalkError::Llm(
                "Model API returned an empty reply".to_string(),
            ));
        }

        tracing::debug!(model = %self.model, reply_len = content.len(), "Completion received");
        Ok(content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
