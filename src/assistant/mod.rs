//! The operations assistant: a language model that answers in Spanish and
//! reads or changes workshop state through a fixed set of tools.

pub mod client;
pub mod dispatch;
pub mod history;
pub mod prompts;
pub mod session;
pub mod tools;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::error::DeskError;

pub use client::{ChatModel, HttpChatModel};
pub use dispatch::dispatch;
pub use history::{ChatHistory, HistoryEntry};
pub use session::{AssistantReply, ChatSession};
pub use tools::{tool_specs, ToolRequest, ToolSpec};

/// Supported language-model backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Gemini,
    Claude,
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "openrouter")]
    OpenRouter,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Gemini,
        Provider::Claude,
        Provider::OpenAi,
        Provider::OpenRouter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini",
            Provider::Claude => "claude",
            Provider::OpenAi => "openai",
            Provider::OpenRouter => "openrouter",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-2.5-flash",
            Provider::Claude => "claude-sonnet-4-20250514",
            Provider::OpenAi => "gpt-4o",
            Provider::OpenRouter => "openai/gpt-4o-mini",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/",
            Provider::Claude => "https://api.anthropic.com/v1/",
            Provider::OpenAi => "https://api.openai.com/v1/",
            Provider::OpenRouter => "https://openrouter.ai/api/v1/",
        }
    }

    /// Keychain service name holding this provider's API key.
    pub fn keychain_service(&self) -> String {
        format!("sinapsis-desk-{}-api", self.as_str())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id; Gemini does not always send one.
    pub id: Option<String>,
    pub name: String,
    pub args: Value,
}

/// A tool call together with what it returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub call: ToolCall,
    pub result: Value,
}

/// One entry of the conversation as sent to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Turn {
    User(String),
    Model(String),
    ToolCalls(Vec<ToolCall>),
    ToolResults(Vec<ToolOutcome>),
}

/// What the model answered: either final text or a request to run tools.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCalls(Vec<ToolCall>),
}

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("No API key configured for {0}")]
    MissingApiKey(Provider),

    #[error("API key rejected by {provider}: {message}")]
    Unauthorized { provider: Provider, message: String },

    #[error("Request to {provider} failed: {message}")]
    Network { provider: Provider, message: String },

    #[error("LLM API error: {status} from {provider} - {body}")]
    Api {
        provider: Provider,
        status: u16,
        body: String,
    },

    #[error("Unexpected response from {provider}: {message}")]
    InvalidResponse { provider: Provider, message: String },

    #[error("Model kept requesting tools after {0} rounds")]
    ToolLoop(usize),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error(transparent)]
    Desk(#[from] DeskError),
}

impl AssistantError {
    /// Errors that call for a new API key rather than a retry.
    pub fn needs_api_key(&self) -> bool {
        matches!(
            self,
            AssistantError::MissingApiKey(_) | AssistantError::Unauthorized { .. }
        )
    }
}

impl From<AssistantError> for String {
    fn from(err: AssistantError) -> Self {
        err.to_string()
    }
}
