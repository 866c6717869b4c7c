//! Model provider seam.
//!
//! Defines the `ChatModel` trait the agent and classifier are written
//! against, the message types fed to it, and provider selection. The only
//! shipped implementation speaks the OpenAI-compatible chat completions
//! protocol; tests substitute scripted stubs.

pub mod openai;

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

use tabletalk_core::error::{Result, TabletalkError};

pub use openai::OpenAiChatModel;

/// Who authored a message in a completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A completion request with per-call sampling parameters.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

/// A chat-completion model.
///
/// The one seam between the pipeline and the external model API; anything
/// implementing this can drive the agent and classifier.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the reply text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// The model name sent with requests, for logging.
    fn model_name(&self) -> &str;
}

/// Supported model providers, selected at process startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// OpenAI, or any API speaking the same protocol via a base URL override.
    OpenAi,
}

impl FromStr for Provider {
    type Err = TabletalkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            other => Err(TabletalkError::Config(format!(
                "Unknown model provider '{}' (supported: openai)",
                other
            ))),
        }
    }
}

/// Construct the configured provider's chat model.
pub fn build_model(
    provider: Provider,
    api_key: impl Into<String>,
    model: impl Into<String>,
    base_url: impl Into<String>,
) -> Arc<dyn ChatModel> {
    match provider {
        Provider::OpenAi => Arc::new(OpenAiChatModel::with_base_url(api_key, model, base_url)),
    }
}
