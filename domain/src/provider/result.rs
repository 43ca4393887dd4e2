//! Provider result value objects - one immutable record per adapter call.
//!
//! - [`ProviderErrorKind`] - classified failure taxonomy
//! - [`ResultOrigin`] - where the text came from (live call, cache, mock, breaker)
//! - [`ProviderResult`] - the record itself

use crate::core::model::ModelId;
use crate::pipeline::stage::Stage;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Classified provider failure
///
/// Adapters never surface raw transport errors; everything is mapped onto
/// one of these kinds at the dispatcher boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// Credentials missing, invalid or rejected
    Auth,
    /// Provider asked us to slow down
    RateLimited,
    /// The call (or the request deadline) ran out of time
    Timeout,
    /// Circuit open, provider down, or no credentials with mocking disabled
    ProviderUnavailable,
    /// The provider answered with something we could not use
    MalformedResponse,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Auth => "auth_error",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::ProviderUnavailable => "provider_unavailable",
            ProviderErrorKind::MalformedResponse => "malformed_response",
        }
    }

    /// Transient kinds worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::RateLimited | ProviderErrorKind::Timeout
        )
    }
}

impl std::fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    Error {
        kind: ProviderErrorKind,
        message: String,
    },
}

/// Where a result's content came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    /// A real adapter call in this request
    #[default]
    Live,
    /// Served from the response cache
    Cached,
    /// Produced by a mock adapter bound in place of a real provider
    Mock,
    /// Rejected by an open circuit without calling the adapter
    ShortCircuit,
}

/// Token accounting reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl TokenUsage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
        }
    }

    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Result of one adapter call in one pipeline stage
///
/// Created once and never updated in place; a retry or a cache hit yields a
/// new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult {
    pub model_id: ModelId,
    pub stage: Stage,
    #[serde(flatten)]
    pub status: ResultStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_used: Option<TokenUsage>,
    #[serde(default)]
    pub origin: ResultOrigin,
    /// Adapter invocations that went into this result (0 for cache/breaker)
    #[serde(default)]
    pub attempts: u32,
}

impl ProviderResult {
    /// Creates a successful result.
    pub fn ok(model_id: ModelId, stage: Stage, text: impl Into<String>, latency: Duration) -> Self {
        Self {
            model_id,
            stage,
            status: ResultStatus::Ok,
            text: Some(text.into()),
            latency_ms: duration_ms(latency),
            tokens_used: None,
            origin: ResultOrigin::Live,
            attempts: 1,
        }
    }

    /// Creates a failed result with a classified kind.
    pub fn error(
        model_id: ModelId,
        stage: Stage,
        kind: ProviderErrorKind,
        message: impl Into<String>,
        latency: Duration,
    ) -> Self {
        Self {
            model_id,
            stage,
            status: ResultStatus::Error {
                kind,
                message: message.into(),
            },
            text: None,
            latency_ms: duration_ms(latency),
            tokens_used: None,
            origin: ResultOrigin::Live,
            attempts: 1,
        }
    }

    /// Creates the result reported when an open circuit rejects a call.
    pub fn short_circuit(model_id: ModelId, stage: Stage) -> Self {
        let message = format!("circuit open for {}", model_id);
        Self {
            origin: ResultOrigin::ShortCircuit,
            attempts: 0,
            ..Self::error(
                model_id,
                stage,
                ProviderErrorKind::ProviderUnavailable,
                message,
                Duration::ZERO,
            )
        }
    }

    pub fn with_tokens(mut self, tokens: Option<TokenUsage>) -> Self {
        self.tokens_used = tokens;
        self
    }

    pub fn with_origin(mut self, origin: ResultOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// A copy of a cached result, re-attributed to the stage that read it.
    pub fn served_from_cache(&self, stage: Stage) -> Self {
        Self {
            stage,
            latency_ms: 0,
            origin: ResultOrigin::Cached,
            attempts: 0,
            ..self.clone()
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ResultStatus::Ok)
    }

    pub fn is_mock(&self) -> bool {
        self.origin == ResultOrigin::Mock
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn error_kind(&self) -> Option<ProviderErrorKind> {
        match &self.status {
            ResultStatus::Ok => None,
            ResultStatus::Error { kind, .. } => Some(*kind),
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            ResultStatus::Ok => None,
            ResultStatus::Error { message, .. } => Some(message),
        }
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
