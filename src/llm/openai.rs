//! OpenAI-compatible HTTP client (chat, embeddings, transcription, vision).

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::error::check_status;
use super::{
    ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError, TokenUsage, ToolCall, ToolDefinition,
};
use crate::config::Config;

/// Client for an OpenAI-compatible API root such as the AI proxy.
pub struct OpenAiClient {
    config: Arc<Config>,
    http: reqwest::Client,
}

impl OpenAiClient {
    /// Create a client from shared configuration.
    ///
    /// Certificate validation follows `config.accept_invalid_certs`.
    pub fn new(config: Arc<Config>) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self { config, http })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base, path)
    }

    fn token(&self) -> Result<&str, LlmError> {
        self.config.api_token.as_deref().ok_or(LlmError::MissingToken)
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<Value, LlmError> {
        let token = self.token()?;
        debug!("POST {} ({} bytes)", path, body.to_string().len());

        let response = self
            .http
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json::<Value>().await?)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<TokenUsage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingBody {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    embedding: Vec<f64>,
}

/// Decode a chat-completion body into a [`ChatResponse`] using its first choice.
fn parse_completion(body: Value) -> Result<ChatResponse, LlmError> {
    let parsed: CompletionBody =
        serde_json::from_value(body).map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

    let Some(choice) = parsed.choices.into_iter().next() else {
        return Ok(ChatResponse {
            usage: parsed.usage,
            model: parsed.model,
            ..ChatResponse::default()
        });
    };

    Ok(ChatResponse {
        content: choice.message.content,
        tool_calls: choice.message.tool_calls,
        finish_reason: choice.finish_reason,
        usage: parsed.usage,
        model: parsed.model,
    })
}

fn apply_options(body: &mut Value, options: &ChatOptions) {
    if let Some(temperature) = options.temperature {
        body["temperature"] = json!(temperature);
    }
    if let Some(max_tokens) = options.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat_completion_with_options(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: Option<&[ToolDefinition]>,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let mut body = json!({
            "model": model,
            "messages": messages,
        });
        if let Some(tools) = tools {
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }
        apply_options(&mut body, &options);

        let response = self.post_json("chat/completions", &body).await?;
        parse_completion(response)
    }

    async fn embedding(&self, model: &str, input: &str) -> Result<Vec<f64>, LlmError> {
        let body = json!({ "model": model, "input": input });
        let response = self.post_json("embeddings", &body).await?;
        let parsed: EmbeddingBody = serde_json::from_value(response)
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| LlmError::InvalidResponse("embedding response has no data".to_string()))
    }

    async fn transcription(
        &self,
        model: &str,
        file_name: &str,
        audio: Vec<u8>,
    ) -> Result<String, LlmError> {
        let token = self.token()?;
        let part = multipart::Part::bytes(audio)
            .file_name(file_name.to_string())
            .mime_str("audio/mpeg")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("model", model.to_string())
            .text("response_format", "text");

        debug!("POST audio/transcriptions ({})", file_name);
        let response = self
            .http
            .post(self.url("audio/transcriptions"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.text().await?)
    }

    async fn vision(
        &self,
        model: &str,
        prompt: &str,
        image_url: &str,
        options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        let mut body = json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    { "type": "image_url", "image_url": { "url": image_url } },
                ],
            }],
        });
        apply_options(&mut body, &options);

        let response = self.post_json("chat/completions", &body).await?;
        parse_completion(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::body::Bytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::Router;

    use crate::llm::FunctionDefinition;

    type Captured = Arc<Mutex<Vec<(HeaderMap, Bytes)>>>;

    /// Serve `reply` with `status` on `path` from a local listener, recording every request.
    async fn local_api(path: &str, status: StatusCode, reply: &'static str) -> (OpenAiClient, Captured) {
        let captured = Captured::default();
        let sink = captured.clone();
        let app = Router::new().route(
            path,
            post(move |headers: HeaderMap, body: Bytes| async move {
                sink.lock().unwrap().push((headers, body));
                (status, reply)
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let config = Config {
            api_token: Some("test-token".to_string()),
            api_base: format!("http://{}", addr),
            ..Config::default()
        };
        (OpenAiClient::new(Arc::new(config)).unwrap(), captured)
    }

    fn only_request(captured: &Captured) -> (HeaderMap, Bytes) {
        let requests = captured.lock().unwrap();
        assert_eq!(requests.len(), 1);
        requests[0].clone()
    }

    fn count_days_tool() -> ToolDefinition {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: "count_days".to_string(),
                description: "Counts weekdays".to_string(),
                parameters: json!({ "type": "object", "properties": {} }),
            },
        }
    }

    #[tokio::test]
    async fn test_chat_request_carries_tools_and_options() {
        let (client, captured) = local_api(
            "/chat/completions",
            StatusCode::OK,
            r#"{"choices":[{"finish_reason":"tool_calls","message":{"content":null,"tool_calls":[{"id":"call_0","type":"function","function":{"name":"count_days","arguments":"{}"}}]}}]}"#,
        )
        .await;

        let response = client
            .chat_completion_with_options(
                "gpt-4o-mini",
                &[ChatMessage::system("pick one"), ChatMessage::user("count mondays")],
                Some(&[count_days_tool()]),
                ChatOptions {
                    temperature: Some(0.0),
                    max_tokens: Some(50),
                },
            )
            .await
            .unwrap();
        assert_eq!(response.tool_calls()[0].function.name, "count_days");

        let (headers, body) = only_request(&captured);
        assert_eq!(headers["authorization"], "Bearer test-token");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(
            body["messages"],
            json!([
                { "role": "system", "content": "pick one" },
                { "role": "user", "content": "count mondays" },
            ])
        );
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "count_days");
        assert_eq!(body["temperature"], json!(0.0));
        assert_eq!(body["max_tokens"], json!(50));
    }

    #[tokio::test]
    async fn test_chat_without_tools_omits_tool_choice() {
        let (client, captured) = local_api(
            "/chat/completions",
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"hi"}}],"usage":{"total_tokens":3}}"#,
        )
        .await;

        let response = client
            .chat_completion("gpt-4o-mini", &[ChatMessage::user("hello")], None)
            .await
            .unwrap();
        assert_eq!(response.usage.as_ref().map(|u| u.total_tokens), Some(3));
        assert_eq!(response.into_text().unwrap(), "hi");

        let (_, body) = only_request(&captured);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_embedding_request() {
        let (client, captured) = local_api(
            "/embeddings",
            StatusCode::OK,
            r#"{"data":[{"embedding":[0.25,-0.5]}]}"#,
        )
        .await;

        let vector = client.embedding("text-embedding-3-small", "hello").await.unwrap();
        assert_eq!(vector, vec![0.25, -0.5]);

        let (headers, body) = only_request(&captured);
        assert_eq!(headers["authorization"], "Bearer test-token");
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body, json!({ "model": "text-embedding-3-small", "input": "hello" }));
    }

    #[tokio::test]
    async fn test_transcription_is_multipart_text() {
        let (client, captured) =
            local_api("/audio/transcriptions", StatusCode::OK, "Hello there.\n").await;

        let transcript = client
            .transcription("whisper-1", "clip.mp3", b"ID3fake".to_vec())
            .await
            .unwrap();
        assert_eq!(transcript, "Hello there.\n");

        let (headers, body) = only_request(&captured);
        assert_eq!(headers["authorization"], "Bearer test-token");
        assert!(headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("multipart/form-data; boundary="));

        let body = String::from_utf8_lossy(&body).to_lowercase();
        assert!(body.contains(r#"name="file"; filename="clip.mp3""#));
        assert!(body.contains("content-type: audio/mpeg"));
        assert!(body.contains("id3fake"));
        assert!(body.contains("name=\"model\"\r\n\r\nwhisper-1\r\n"));
        assert!(body.contains("name=\"response_format\"\r\n\r\ntext\r\n"));
    }

    #[tokio::test]
    async fn test_vision_sends_image_url_part() {
        let (client, captured) = local_api(
            "/chat/completions",
            StatusCode::OK,
            r#"{"choices":[{"message":{"content":"4111111111111111"}}]}"#,
        )
        .await;

        let data_url = "data:image/png;base64,iVBORw0KGgo=";
        let response = client
            .vision(
                "gpt-4o-mini",
                "Read the card number",
                data_url,
                ChatOptions {
                    max_tokens: Some(300),
                    ..ChatOptions::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(response.into_text().unwrap(), "4111111111111111");

        let (headers, body) = only_request(&captured);
        assert_eq!(headers["authorization"], "Bearer test-token");
        let body: Value = serde_json::from_slice(&body).unwrap();
        let content = &body["messages"][0]["content"];
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(content[0], json!({ "type": "text", "text": "Read the card number" }));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], data_url);
        assert_eq!(body["max_tokens"], json!(300));
        assert!(body.get("tools").is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_keeps_body() {
        let (client, _) =
            local_api("/embeddings", StatusCode::TOO_MANY_REQUESTS, "rate limited").await;

        let err = client
            .embedding("text-embedding-3-small", "hello")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LlmError::Status { status: 429, ref body } if body == "rate limited"
        ));
    }

    #[test]
    fn test_parse_completion_with_tool_calls() {
        let body = json!({
            "model": "gpt-4o-mini",
            "choices": [{
                "finish_reason": "tool_calls",
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "count_days",
                            "arguments": "{\"day_name\":\"monday\"}"
                        }
                    }]
                }
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        });

        let response = parse_completion(body).unwrap();
        let calls = response.tool_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "count_days");
        assert_eq!(calls[0].function.arguments, "{\"day_name\":\"monday\"}");
        assert_eq!(response.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(response.usage.map(|u| u.total_tokens), Some(15));
    }

    #[test]
    fn test_parse_completion_missing_arguments_defaults_to_empty_object() {
        let body = json!({
            "choices": [{
                "message": { "tool_calls": [{ "function": { "name": "sort_contacts" } }] }
            }]
        });
        let response = parse_completion(body).unwrap();
        assert_eq!(response.tool_calls()[0].function.arguments, "{}");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let response = parse_completion(json!({ "choices": [] })).unwrap();
        assert!(response.tool_calls().is_empty());
        assert!(response.into_text().is_err());
    }

    #[test]
    fn test_parse_completion_rejects_garbage() {
        assert!(matches!(
            parse_completion(json!({ "choices": "nope" })),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_sending() {
        let client = OpenAiClient::new(Arc::new(Config::default())).unwrap();
        let err = client
            .embedding("text-embedding-3-small", "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::MissingToken));
    }
}
