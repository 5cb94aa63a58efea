//! In-process [`LlmClient`] double that replays canned responses.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatMessage, ChatOptions, ChatResponse, FunctionCall, LlmClient, LlmError, ToolCall, ToolDefinition};

/// One recorded chat request.
#[derive(Debug, Clone)]
pub struct RecordedChat {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tool_names: Vec<String>,
    pub temperature: Option<f64>,
}

#[derive(Default)]
pub struct ScriptedClient {
    chats: Mutex<VecDeque<Result<ChatResponse, LlmError>>>,
    embeddings: HashMap<String, Vec<f64>>,
    transcript: Option<String>,
    pub recorded: Mutex<Vec<RecordedChat>>,
    pub embedding_calls: Mutex<Vec<String>>,
    pub vision_urls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text reply.
    pub fn reply(self, text: &str) -> Self {
        self.push(Ok(ChatResponse {
            content: Some(text.to_string()),
            ..ChatResponse::default()
        }))
    }

    /// Queue a reply carrying the given `(name, arguments)` tool calls.
    pub fn tool_calls(self, calls: &[(&str, &str)]) -> Self {
        let calls = calls
            .iter()
            .enumerate()
            .map(|(i, (name, arguments))| ToolCall {
                id: format!("call_{}", i),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: name.to_string(),
                    arguments: arguments.to_string(),
                },
            })
            .collect();
        self.push(Ok(ChatResponse {
            tool_calls: Some(calls),
            ..ChatResponse::default()
        }))
    }

    pub fn failure(self, err: LlmError) -> Self {
        self.push(Err(err))
    }

    pub fn embedding(mut self, text: &str, vector: Vec<f64>) -> Self {
        self.embeddings.insert(text.to_string(), vector);
        self
    }

    pub fn transcript(mut self, text: &str) -> Self {
        self.transcript = Some(text.to_string());
        self
    }

    fn push(self, response: Result<ChatResponse, LlmError>) -> Self {
        self.chats.lock().unwrap().push_back(response);
        self
    }

    fn next_chat(&self) -> Result<ChatResponse, LlmError> {
        self.chats
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::InvalidResponse("no scripted response left".into())))
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        self.recorded.lock().unwrap().push(RecordedChat {
            model: model.to_string(),
            messages: messages.to_vec(),
            tool_names: tools
                .unwrap_or_default()
                .iter()
                .map(|t| t.function.name.clone())
                .collect(),
            temperature: options.temperature,
        });
        self.next_chat()
    }

    async fn embedding(&self, _model: &str, input: &str) -> Result<Vec<f64>, LlmError> {
        self.embedding_calls.lock().unwrap().push(input.to_string());
        self.embeddings
            .get(input)
            .cloned()
            .ok_or_else(|| LlmError::Status {
                status: 500,
                body: format!("no embedding scripted for {:?}", input),
            })
    }

    async fn transcription(
        &self,
        _model: &str,
        _file_name: &str,
        _audio: Vec<u8>,
    ) -> Result<String, LlmError> {
        self.transcript.clone().ok_or(LlmError::Status {
            status: 400,
            body: "no transcript scripted".to_string(),
        })
    }

    async fn vision(
        &self,
        _model: &str,
        _prompt: &str,
        image_url: &str,
        _options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        self.vision_urls.lock().unwrap().push(image_url.to_string());
        self.next_chat()
    }
}
