//! LLM client module for interacting with the remote model service.
//!
//! This module provides a trait-based abstraction over the four remote
//! capabilities the dispatcher and handlers use (chat with tool selection,
//! embeddings, speech transcription, vision chat), with an OpenAI-compatible
//! proxy as the implementation.

mod error;
mod openai;
#[cfg(test)]
pub(crate) mod scripted;

pub use error::LlmError;
pub(crate) use error::check_status;
pub use openai::OpenAiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    fn text(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::text(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::text(Role::User, content)
    }
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type", default = "default_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn default_call_type() -> String {
    "function".to_string()
}

/// Function call details. `arguments` is a JSON-encoded object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default = "empty_arguments")]
    pub arguments: String,
}

fn empty_arguments() -> String {
    "{}".to_string()
}

/// Tool definition for the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

/// Function definition with schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Response from a chat completion.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub finish_reason: Option<String>,
    pub usage: Option<TokenUsage>,
    pub model: Option<String>,
}

impl ChatResponse {
    /// Text content of the reply, or an error if the model sent none.
    pub fn into_text(self) -> Result<String, LlmError> {
        self.content
            .ok_or_else(|| LlmError::InvalidResponse("response has no message content".to_string()))
    }

    /// Tool calls in the order the model returned them (possibly empty).
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or_default()
    }
}

/// Token usage information (if provided by the upstream provider).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

/// Optional parameters for chat completions.
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Sampling temperature (0 = deterministic).
    pub temperature: Option<f64>,
    /// Maximum output tokens to generate.
    pub max_tokens: Option<u64>,
}

/// Trait for LLM clients.
///
/// Every call blocks the calling task until the remote service answers or
/// fails; no retries and no timeouts are applied here.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a chat completion request. When `tools` is given the model picks
    /// among them automatically.
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
    ) -> Result<ChatResponse, LlmError> {
        self.chat_completion_with_options(model, messages, tools, ChatOptions::default())
            .await
    }

    /// Send a chat completion request with optional parameters.
    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError>;

    /// Embed a single text and return its vector.
    async fn embedding(&self, model: &str, input: &str) -> Result<Vec<f64>, LlmError>;

    /// Transcribe an audio file to plain text.
    async fn transcription(
        &self,
        model: &str,
        file_name: &str,
        audio: Vec<u8>,
    ) -> Result<String, LlmError>;

    /// Ask a vision-capable model about an image given as a URL or data URL.
    async fn vision(
        &self,
        model: &str,
        prompt: &str,
        image_url: &str,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError>;
}
