//! Provider adapter port
//!
//! Defines the uniform interface over one LLM backend. Concrete adapters
//! (OpenAI-compatible, Anthropic, Ollama, mock) live in the infrastructure
//! layer; the dispatcher only ever sees this trait.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use ultra_domain::{Capabilities, GenerationParams, ProviderErrorKind, StreamEvent, TokenUsage};

/// Classified adapter failure
///
/// Messages never contain credentials; adapters sanitize provider error
/// bodies before building one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl AdapterError {
    pub fn rate_limited(message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        AdapterError::RateLimited {
            message: message.into(),
            retry_after,
        }
    }

    pub fn kind(&self) -> ProviderErrorKind {
        match self {
            AdapterError::Auth(_) => ProviderErrorKind::Auth,
            AdapterError::RateLimited { .. } => ProviderErrorKind::RateLimited,
            AdapterError::Timeout(_) => ProviderErrorKind::Timeout,
            AdapterError::ProviderUnavailable(_) => ProviderErrorKind::ProviderUnavailable,
            AdapterError::MalformedResponse(_) => ProviderErrorKind::MalformedResponse,
        }
    }

    /// Server-requested delay before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AdapterError::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Text produced by one successful call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    pub tokens_used: Option<TokenUsage>,
}

impl Generation {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_used: None,
        }
    }

    pub fn with_tokens(mut self, tokens: TokenUsage) -> Self {
        self.tokens_used = Some(tokens);
        self
    }
}

/// Handle for receiving streaming events from an adapter.
///
/// Wraps an `mpsc::Receiver<StreamEvent>` and provides convenience methods
/// for consuming the stream.
pub struct StreamHandle {
    pub receiver: mpsc::Receiver<StreamEvent>,
}

impl StreamHandle {
    pub fn new(receiver: mpsc::Receiver<StreamEvent>) -> Self {
        Self { receiver }
    }

    /// Consume the stream and collect all text into a single string.
    pub async fn collect_text(mut self) -> Result<String, AdapterError> {
        let mut full_text = String::new();
        while let Some(event) = self.receiver.recv().await {
            match event {
                StreamEvent::Delta(chunk) => full_text.push_str(&chunk),
                StreamEvent::Completed(text) => {
                    if full_text.is_empty() {
                        return Ok(text);
                    }
                    return Ok(full_text);
                }
                StreamEvent::Error(e) => {
                    return Err(AdapterError::ProviderUnavailable(e));
                }
            }
        }
        // Channel closed without a terminal event
        if full_text.is_empty() {
            return Err(AdapterError::MalformedResponse(
                "stream ended without output".to_string(),
            ));
        }
        Ok(full_text)
    }
}

/// Uniform interface over one backend model
///
/// One adapter instance serves one model id and must be safe to call
/// concurrently.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Generate a complete response
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<Generation, AdapterError>;

    /// Generate a streaming response.
    ///
    /// Default implementation calls `generate()` and wraps the result in a
    /// single `Completed` event.
    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<StreamHandle, AdapterError> {
        let generation = self.generate(prompt, params).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(StreamEvent::Completed(generation.text)).await;
        Ok(StreamHandle::new(rx))
    }

    /// Static description of what this backend supports
    fn describe(&self) -> Capabilities;
}
