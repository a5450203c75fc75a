//! Retrying completion client
//!
//! Wraps an [`LlmBackend`] with the booking assistant's system instruction and
//! an attempt/backoff policy. Replies are exposed both as a chunk stream and
//! as a single concatenated string.

use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::mpsc;

use booking_assistant_config::{BusinessCatalog, Settings};
use booking_assistant_core::ConversationTurn;

use crate::backend::{GenerationResult, GroqBackend, LlmBackend, LlmConfig};
use crate::prompt::{Message, PromptContext, SystemPromptBuilder};
use crate::{ApiError, LlmError};

/// Stream of reply chunks; ends after the first `Err`
pub type ReplyStream<'a> = Pin<Box<dyn Stream<Item = Result<String, ApiError>> + Send + 'a>>;

const NOT_CONFIGURED: &str =
    "Completion service is not configured. Please set the GROQ_API_KEY credential.";

/// Attempt and backoff policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after failed attempt `n` (1-based) is `backoff_base * 2^n`
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

enum Step {
    Chunk(String),
    Finished(Result<GenerationResult, LlmError>),
    Closed,
}

/// Completion client used by the dialogue session
pub struct CompletionClient {
    backend: Option<Arc<dyn LlmBackend>>,
    prompt: SystemPromptBuilder,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(backend: Arc<dyn LlmBackend>, prompt: SystemPromptBuilder, retry: RetryPolicy) -> Self {
        Self {
            backend: Some(backend),
            prompt,
            retry,
        }
    }

    /// A client with no credential; every generation fails fast
    pub fn unavailable(prompt: SystemPromptBuilder) -> Self {
        Self {
            backend: None,
            prompt,
            retry: RetryPolicy::default(),
        }
    }

    /// Build a Groq-backed client; a missing credential yields an unavailable client
    pub fn from_settings(settings: &Settings, catalog: &BusinessCatalog) -> Result<Self, LlmError> {
        let prompt = SystemPromptBuilder::new(catalog);
        let Some(api_key) = settings.resolved_api_key() else {
            tracing::warn!("No completion credential configured; generation is disabled");
            return Ok(Self::unavailable(prompt));
        };

        let backend = GroqBackend::new(LlmConfig::from_settings(&settings.llm, api_key))?;
        let retry = RetryPolicy::new(
            settings.llm.max_retries,
            Duration::from_millis(settings.llm.backoff_base_ms),
        );
        tracing::info!(model = %settings.llm.model, "Completion client ready");
        Ok(Self::new(Arc::new(backend), prompt, retry))
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    pub fn model_name(&self) -> Option<&str> {
        self.backend.as_ref().map(|b| b.model_name())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    fn build_messages(
        &self,
        history: &[ConversationTurn],
        user_name: Option<&str>,
        context: &PromptContext,
    ) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(self.prompt.build(user_name, context)));
        messages.extend(history.iter().map(Message::from));
        messages
    }

    /// Stream the assistant's reply
    ///
    /// A failed attempt is retried only while nothing has been yielded; once
    /// chunks have been delivered a failure ends the stream with an error.
    pub fn generate_streaming_reply<'a>(
        &'a self,
        history: &[ConversationTurn],
        user_name: Option<&str>,
        context: PromptContext,
    ) -> ReplyStream<'a> {
        let messages = self.build_messages(history, user_name, &context);
        let backend = self.backend.clone();
        let retry = self.retry;

        Box::pin(async_stream::stream! {
            let backend = match backend {
                Some(b) => b,
                None => {
                    yield Err(ApiError::from(LlmError::Configuration(NOT_CONFIGURED.to_string())));
                    return;
                },
            };

            let attempts = retry.max_attempts.max(1);
            for attempt in 1..=attempts {
                let (tx, mut rx) = mpsc::channel::<String>(64);
                let mut generation = backend.generate_stream(&messages, tx);
                let mut finished: Option<Result<GenerationResult, LlmError>> = None;
                let mut yielded = false;

                loop {
                    let step = tokio::select! {
                        chunk = rx.recv() => match chunk {
                            Some(c) => Step::Chunk(c),
                            None => Step::Closed,
                        },
                        result = &mut generation, if finished.is_none() => Step::Finished(result),
                    };
                    match step {
                        Step::Chunk(c) => {
                            yielded = true;
                            yield Ok(c);
                        },
                        Step::Finished(result) => finished = Some(result),
                        Step::Closed => break,
                    }
                }

                let result = match finished {
                    Some(r) => r,
                    None => generation.await,
                };

                let err = match result {
                    Ok(_) if yielded => return,
                    Ok(done) if !done.text.is_empty() => {
                        yield Ok(done.text);
                        return;
                    },
                    Ok(_) => LlmError::InvalidResponse("Empty completion".to_string()),
                    Err(e) => e,
                };

                if yielded || attempt == attempts {
                    tracing::error!(
                        attempt,
                        max_attempts = attempts,
                        partial = yielded,
                        error = %err,
                        "Completion request failed"
                    );
                    yield Err(ApiError::from(&err));
                    return;
                }

                let delay = retry.delay_after(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Completion request failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        })
    }

    /// Full reply text; on final failure returns the error, never partial text
    pub async fn generate_reply(
        &self,
        history: &[ConversationTurn],
        user_name: Option<&str>,
        context: PromptContext,
    ) -> Result<String, ApiError> {
        let mut stream = self.generate_streaming_reply(history, user_name, context);
        let mut reply = String::new();
        while let Some(chunk) = stream.next().await {
            reply.push_str(&chunk?);
        }
        Ok(reply)
    }
}
