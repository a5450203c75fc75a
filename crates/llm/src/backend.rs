//! LLM backend implementations
//!
//! [`GroqBackend`] talks to any OpenAI-compatible chat completions endpoint
//! (Groq by default) and supports server-sent-event streaming.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use booking_assistant_config::LlmSettings;

use crate::prompt::Message;
use crate::LlmError;

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL
    pub endpoint: String,
    /// Bearer credential
    pub api_key: String,
    /// Model name/ID
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    pub temperature: f32,
    /// Top-p sampling
    pub top_p: f32,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama3-8b-8192".to_string(),
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 1.0,
            timeout: Duration::from_secs(30),
        }
    }
}

impl LlmConfig {
    pub fn from_settings(settings: &LlmSettings, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: api_key.into(),
            model: settings.model.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            top_p: settings.top_p,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Token accounting reported by the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Chunks (streaming) or completion tokens
    pub tokens: usize,
    /// Time to first token (ms)
    pub time_to_first_token_ms: u64,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    pub finish_reason: FinishReason,
    pub usage: Option<TokenUsage>,
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    Error,
}

impl FinishReason {
    fn from_api(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        }
    }
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Generate with a per-request model. Backends without model selection ignore it.
    async fn generate_with_model(
        &self,
        messages: &[Message],
        _model: &str,
    ) -> Result<GenerationResult, LlmError> {
        self.generate(messages).await
    }

    /// Generate with streaming; each content delta is sent on `tx`
    async fn generate_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError>;

    /// Get model name
    fn model_name(&self) -> &str;
}

/// One parsed server-sent-event line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine {
    /// A content delta
    Content(String),
    /// Terminal `[DONE]` marker
    Done,
    /// Blank lines, comments, role-only deltas, unparseable payloads
    Skip,
}

/// Parse a single SSE line from a chat completions stream
pub fn parse_sse_line(line: &str) -> SseLine {
    let line = line.trim();
    let Some(payload) = line.strip_prefix("data:") else {
        return SseLine::Skip;
    };
    let payload = payload.trim_start();
    if payload == "[DONE]" {
        return SseLine::Done;
    }
    match serde_json::from_str::<ChatStreamChunk>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta)
            .and_then(|d| d.content)
            .filter(|c| !c.is_empty())
            .map(SseLine::Content)
            .unwrap_or(SseLine::Skip),
        Err(e) => {
            tracing::debug!(error = %e, "Skipping unparseable stream chunk");
            SseLine::Skip
        },
    }
}

/// Splits a raw SSE byte stream into complete lines
///
/// Bytes are buffered until a newline arrives, so a multi-byte character
/// split across network chunks is decoded only once it is whole.
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line, without its terminator
    pub fn next_line(&mut self) -> Option<String> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let line: Vec<u8> = self.pending.drain(..=end).collect();
        Some(String::from_utf8_lossy(&line[..end]).into_owned())
    }
}

/// OpenAI-compatible backend, configured for Groq by default
pub struct GroqBackend {
    config: LlmConfig,
    client: Client,
}

impl GroqBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if config.api_key.trim().is_empty() && !config.endpoint.starts_with("http://localhost") {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint.trim_end_matches('/'))
    }

    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();
        let auth_value = format!("Bearer {}", self.config.api_key);
        if let Ok(val) = HeaderValue::from_str(&auth_value) {
            headers.insert(reqwest::header::AUTHORIZATION, val);
        }
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers
    }

    fn build_request(&self, messages: &[Message], model: &str, stream: bool) -> ChatRequest {
        ChatRequest {
            model: model.to_string(),
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            top_p: Some(self.config.top_p),
            stream: Some(stream),
        }
    }

    async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn complete(&self, messages: &[Message], model: &str) -> Result<GenerationResult, LlmError> {
        let start = std::time::Instant::now();
        let request = self.build_request(messages, model, false);
        let response = self.send(&request).await?;

        let response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let total_time_ms = start.elapsed().as_millis() as u64;
        let usage = response.usage;

        Ok(GenerationResult {
            text: choice.message.content.clone(),
            tokens: usage.map(|u| u.completion_tokens).unwrap_or(0),
            time_to_first_token_ms: total_time_ms,
            total_time_ms,
            finish_reason: FinishReason::from_api(choice.finish_reason.as_deref()),
            usage,
        })
    }
}

/// Build an API error from a non-success status and the error body
fn api_error(status: u16, body: &str) -> LlmError {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => LlmError::Api {
            status,
            code: parsed.error.code.or(parsed.error.kind),
            message: parsed.error.message,
        },
        Err(_) => LlmError::Api {
            status,
            code: None,
            message: if body.trim().is_empty() {
                "empty error body".to_string()
            } else {
                body.trim().to_string()
            },
        },
    }
}

#[async_trait]
impl LlmBackend for GroqBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        self.complete(messages, &self.config.model).await
    }

    async fn generate_with_model(
        &self,
        messages: &[Message],
        model: &str,
    ) -> Result<GenerationResult, LlmError> {
        self.complete(messages, model).await
    }

    async fn generate_stream(
        &self,
        messages: &[Message],
        tx: mpsc::Sender<String>,
    ) -> Result<GenerationResult, LlmError> {
        use futures::StreamExt;

        let start = std::time::Instant::now();
        let mut first_token_time: Option<u64> = None;
        let mut full_text = String::new();
        let mut chunk_count = 0;

        let request = self.build_request(messages, &self.config.model, true);
        let response = self.send(&request).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = SseLineBuffer::new();

        'read: while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| LlmError::StreamInterrupted(e.to_string()))?;
            buffer.push(&chunk);

            while let Some(line) = buffer.next_line() {
                match parse_sse_line(&line) {
                    SseLine::Content(content) => {
                        if first_token_time.is_none() {
                            first_token_time = Some(start.elapsed().as_millis() as u64);
                        }
                        full_text.push_str(&content);
                        chunk_count += 1;
                        if tx.send(content).await.is_err() {
                            return Err(LlmError::StreamInterrupted(
                                "receiver dropped".to_string(),
                            ));
                        }
                    },
                    SseLine::Done => break 'read,
                    SseLine::Skip => {},
                }
            }
        }

        let total_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            model = %self.config.model,
            chunks = chunk_count,
            total_time_ms,
            "Streaming completion finished"
        );

        Ok(GenerationResult {
            text: full_text,
            tokens: chunk_count,
            time_to_first_token_ms: first_token_time.unwrap_or(total_time_ms),
            total_time_ms,
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    choices: Vec<ChatStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatStreamChoice {
    delta: Option<ChatDelta>,
}

#[derive(Debug, Deserialize)]
struct ChatDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    code: Option<String>,
}
