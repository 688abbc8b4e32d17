//! Chat-completion client for OpenAI- and Ollama-compatible backends.
//!
//! The HTTP client built here never carries distributed-tracing propagation
//! middleware (no `reqwest-tracing`/`traceparent` layer): the configuration
//! happens once, at [`LlmClient::new`], not per call, because several local
//! inference backends reject requests carrying a `traceparent` header.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    HttpError(String),
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("config error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            top_k: None,
            top_p: None,
            frequency_penalty: None,
            stream: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Default)]
pub struct ChatChunk {
    pub delta: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChatCompletion {
    choices: Vec<RawChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct RawChoice {
    #[serde(default)]
    message: Option<RawMessage>,
    #[serde(default)]
    delta: Option<RawDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    content: String,
}

#[derive(Debug, Deserialize, Default)]
struct RawDelta {
    #[serde(default)]
    content: String,
}

/// Approximation used when a backend omits `usage` from its response:
/// roughly one token per four characters.
pub fn estimate_tokens(text: &str) -> u32 {
    ((text.len() as f64) / 4.0).ceil() as u32
}

#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    base_url: String,
}

impl LlmClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into();
        let trimmed = base_url.trim().trim_end_matches('/').to_string();
        if trimmed.is_empty() {
            return Err(LlmError::ConfigError("base_url is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| LlmError::ConfigError(error.to_string()))?;

        Ok(Self {
            http,
            base_url: trimmed,
        })
    }

    pub async fn chat_completion(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|error| LlmError::HttpError(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpError(format!("{status}: {body}")));
        }

        let raw: RawChatCompletion = response
            .json()
            .await
            .map_err(|error| LlmError::ParseError(error.to_string()))?;

        let choice = raw
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::ParseError("response had no choices".to_string()))?;
        let content = choice
            .message
            .ok_or_else(|| LlmError::ParseError("choice had no message".to_string()))?
            .content;

        Ok(ChatResponse {
            content,
            usage: raw.usage,
        })
    }

    /// Yields incremental chunks parsed from an SSE stream terminated by
    /// `data: [DONE]`. The returned stream is finite and not restartable.
    pub async fn chat_completion_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<impl Stream<Item = Result<ChatChunk>> + Send> {
        let mut streaming_request = request.clone();
        streaming_request.stream = Some(true);

        let url = format!("{}/v1/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(&streaming_request)
            .send()
            .await
            .map_err(|error| LlmError::HttpError(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::HttpError(format!("{status}: {body}")));
        }

        let byte_stream = response.bytes_stream();
        Ok(parse_sse_stream(byte_stream))
    }

    pub async fn check_status(&self) -> bool {
        let url = format!("{}/v1/models", self.base_url);
        self.http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .is_ok()
    }

    /// Probes `/v1/models` (OpenAI-compatible) falling back to `/api/tags`
    /// (Ollama's native listing). Never blocks job processing: callers treat
    /// an empty result as "unknown", not an error.
    pub async fn list_models(&self) -> Vec<String> {
        if let Some(models) = self.list_openai_compatible_models().await {
            return models;
        }
        self.list_ollama_models().await.unwrap_or_default()
    }

    async fn list_openai_compatible_models(&self) -> Option<Vec<String>> {
        let url = format!("{}/v1/models", self.base_url);
        let response = self.http.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let json: serde_json::Value = response.json().await.ok()?;
        let entries = if json.is_array() {
            json.as_array()?.clone()
        } else {
            json.get("data")?.as_array()?.clone()
        };
        Some(
            entries
                .iter()
                .filter_map(|entry| {
                    entry
                        .get("id")
                        .or_else(|| entry.get("name"))
                        .and_then(|value| value.as_str())
                        .map(str::to_string)
                })
                .collect(),
        )
    }

    async fn list_ollama_models(&self) -> Option<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http.get(&url).send().await.ok()?;
        if !response.status().is_success() {
            return None;
        }
        let json: serde_json::Value = response.json().await.ok()?;
        Some(
            json.get("models")?
                .as_array()?
                .iter()
                .filter_map(|entry| entry.get("name")?.as_str().map(str::to_string))
                .collect(),
        )
    }
}

fn parse_sse_stream(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
) -> impl Stream<Item = Result<ChatChunk>> + Send {
    let mut buffer = String::new();
    byte_stream
        .map(|chunk| chunk.map_err(|error| LlmError::HttpError(error.to_string())))
        .flat_map(move |chunk| {
            let mut chunks = Vec::new();
            match chunk {
                Ok(bytes) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    while let Some(newline_pos) = buffer.find('\n') {
                        let line = buffer[..newline_pos].trim().to_string();
                        buffer.drain(..=newline_pos);
                        if let Some(result) = parse_sse_line(&line) {
                            chunks.push(result);
                        }
                    }
                }
                Err(error) => chunks.push(Err(error)),
            }
            futures_util::stream::iter(chunks)
        })
}

fn parse_sse_line(line: &str) -> Option<Result<ChatChunk>> {
    let payload = line.strip_prefix("data:")?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == "[DONE]" {
        return None;
    }

    let parsed: std::result::Result<RawChatCompletion, _> = serde_json::from_str(payload);
    Some(match parsed {
        Ok(completion) => {
            let choice = completion.choices.into_iter().next();
            match choice {
                Some(choice) => Ok(ChatChunk {
                    delta: choice.delta.unwrap_or_default().content,
                    finish_reason: choice.finish_reason,
                }),
                None => Ok(ChatChunk::default()),
            }
        }
        Err(error) => Err(LlmError::ParseError(error.to_string())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_base_url_is_rejected() {
        let result = LlmClient::new("   ");
        assert!(matches!(result, Err(LlmError::ConfigError(_))));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = LlmClient::new("http://localhost:11434/").expect("client");
        assert_eq!(client.base_url, "http://localhost:11434");
    }

    #[test]
    fn estimate_tokens_uses_four_char_heuristic() {
        assert_eq!(estimate_tokens("12345678"), 2);
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
    }

    #[test]
    fn sse_done_marker_yields_nothing() {
        assert!(parse_sse_line("data: [DONE]").is_none());
    }

    #[test]
    fn sse_blank_line_yields_nothing() {
        assert!(parse_sse_line("").is_none());
    }

    #[test]
    fn sse_chunk_parses_delta_content() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"},"finish_reason":null}]}"#;
        let result = parse_sse_line(line).expect("some").expect("ok");
        assert_eq!(result.delta, "hi");
        assert_eq!(result.finish_reason, None);
    }

    #[tokio::test]
    async fn chat_completion_against_unreachable_backend_is_http_error() {
        let client = LlmClient::with_timeout("http://127.0.0.1:1", Duration::from_millis(200))
            .expect("client");
        let request = ChatRequest::new("test-model", vec![ChatMessage::user("hi")]);
        let result = client.chat_completion(&request).await;
        assert!(matches!(result, Err(LlmError::HttpError(_))));
    }

    #[tokio::test]
    async fn check_status_against_unreachable_backend_is_false() {
        let client = LlmClient::with_timeout("http://127.0.0.1:1", Duration::from_millis(200))
            .expect("client");
        assert!(!client.check_status().await);
    }
}
