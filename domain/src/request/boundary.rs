//! JSON boundary types
//!
//! [`InboundRequest`] is what a front-end (CLI, HTTP handler) hands to the
//! core; [`OutboundResponse`] is what it gets back. Both are plain serde
//! structs with string-typed fields; validation happens in
//! [`InboundRequest::into_request`].

use crate::core::error::DomainError;
use crate::core::model::ModelId;
use crate::core::prompt::Prompt;
use crate::pipeline::diagnostics::{StageDiagnostics, StageResult};
use crate::pipeline::response::{ResponseStatus, UltraResponse};
use crate::request::options::{CachePolicy, RequestOptions};
use crate::request::pattern::AnalysisPattern;
use crate::request::request::Request;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Inbound request as received over the boundary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub prompt: String,
    #[serde(default)]
    pub models: Vec<String>,
    #[serde(default)]
    pub synthesizer: String,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub options: Option<InboundOptions>,
}

/// Optional per-request overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboundOptions {
    pub timeout_ms: Option<u64>,
    pub include_diagnostics: Option<bool>,
    pub cache_policy: Option<String>,
    pub peer_review: Option<bool>,
}

impl InboundRequest {
    /// Validate and convert into a [`Request`], filling unset options from `defaults`.
    ///
    /// Model ids are checked for shape only here; whether they resolve to a
    /// registered adapter is up to the registry.
    pub fn into_request(
        self,
        defaults: &RequestOptions,
        default_pattern: AnalysisPattern,
    ) -> Result<Request, DomainError> {
        let prompt = Prompt::try_new(self.prompt).ok_or(DomainError::EmptyPrompt)?;
        let models = self
            .models
            .iter()
            .map(|m| m.parse::<ModelId>())
            .collect::<Result<Vec<_>, _>>()?;
        let synthesizer: ModelId = self.synthesizer.parse()?;
        let pattern = match self.pattern.as_deref() {
            Some(p) if !p.trim().is_empty() => p.parse()?,
            _ => default_pattern,
        };

        let mut options = defaults.clone();
        if let Some(inbound) = self.options {
            if let Some(ms) = inbound.timeout_ms {
                options.timeout = Duration::from_millis(ms);
            }
            if let Some(include) = inbound.include_diagnostics {
                options.include_diagnostics = include;
            }
            if let Some(policy) = inbound.cache_policy.as_deref() {
                options.cache_policy = policy.parse::<CachePolicy>()?;
            }
            if let Some(review) = inbound.peer_review {
                options.enable_peer_review = review;
            }
        }

        Ok(Request::new(prompt, models, synthesizer, pattern)?.with_options(options))
    }
}

/// Outbound status string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundStatus {
    Success,
    PartialSuccess,
    Error,
}

impl From<ResponseStatus> for OutboundStatus {
    fn from(status: ResponseStatus) -> Self {
        match status {
            ResponseStatus::Success => OutboundStatus::Success,
            ResponseStatus::PartialSuccess => OutboundStatus::PartialSuccess,
        }
    }
}

/// Diagnostics block of the outbound response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<AnalysisPattern>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesizer: Option<ModelId>,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<ModelId>,
    pub stages: Vec<StageDiagnostics>,
    pub unavailable_models: Vec<ModelId>,
    pub mocked_models: Vec<ModelId>,
    pub total_latency_ms: u64,
}

impl Diagnostics {
    pub fn from_response(response: &UltraResponse) -> Self {
        Self {
            pattern: Some(response.pattern),
            synthesizer: Some(response.synthesizer.clone()),
            degraded: response.degraded,
            fallback_model: response.fallback_model.clone(),
            stages: response.stages.iter().map(StageResult::diagnostics).collect(),
            unavailable_models: response.unavailable_models.clone(),
            mocked_models: response.mocked_models.clone(),
            total_latency_ms: response.total_latency_ms,
        }
    }

    /// Diagnostics for a run that died in a stage (every attempt failed)
    pub fn from_failed_stage(stage: &StageResult) -> Self {
        let diag = stage.diagnostics();
        Self {
            pattern: None,
            synthesizer: None,
            degraded: false,
            fallback_model: None,
            unavailable_models: diag.attempted.clone(),
            mocked_models: diag.mocked.clone(),
            stages: vec![diag],
            total_latency_ms: 0,
        }
    }
}

/// Outbound response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundResponse {
    pub status: OutboundStatus,
    pub synthesis: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
    pub generated_at: DateTime<Utc>,
}

impl OutboundResponse {
    pub fn from_response(response: &UltraResponse, include_diagnostics: bool) -> Self {
        Self {
            status: response.status.into(),
            synthesis: response.synthesis.clone(),
            error: None,
            diagnostics: include_diagnostics.then(|| Diagnostics::from_response(response)),
            generated_at: Utc::now(),
        }
    }

    pub fn failure(message: impl Into<String>, diagnostics: Option<Diagnostics>) -> Self {
        Self {
            status: OutboundStatus::Error,
            synthesis: String::new(),
            error: Some(message.into()),
            diagnostics,
            generated_at: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == OutboundStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound() -> InboundRequest {
        InboundRequest {
            prompt: "Define entropy".to_string(),
            models: vec!["A".to_string(), "B".to_string()],
            synthesizer: "A".to_string(),
            pattern: Some("confidence".to_string()),
            options: None,
        }
    }

    #[test]
    fn test_deserialize_minimal_request() {
        let json = r#"{"prompt":"Define entropy","models":["A","B"],"synthesizer":"A","pattern":"confidence"}"#;
        let parsed: InboundRequest = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, inbound());
    }

    #[test]
    fn test_into_request_applies_overrides() {
        let mut req = inbound();
        req.options = Some(InboundOptions {
            timeout_ms: Some(1500),
            include_diagnostics: Some(false),
            cache_policy: Some("bypass".to_string()),
            peer_review: Some(false),
        });
        let request = req
            .into_request(&RequestOptions::default(), AnalysisPattern::Gut)
            .unwrap();
        assert_eq!(request.options().timeout, Duration::from_millis(1500));
        assert!(!request.options().include_diagnostics);
        assert_eq!(request.options().cache_policy, CachePolicy::Bypass);
        assert!(!request.options().enable_peer_review);
        assert_eq!(request.pattern(), AnalysisPattern::Confidence);
    }

    #[test]
    fn test_missing_pattern_uses_default() {
        let mut req = inbound();
        req.pattern = None;
        let request = req
            .into_request(&RequestOptions::default(), AnalysisPattern::Critique)
            .unwrap();
        assert_eq!(request.pattern(), AnalysisPattern::Critique);
    }

    #[test]
    fn test_validation_errors() {
        let mut empty = inbound();
        empty.prompt = "  ".to_string();
        assert_eq!(
            empty.into_request(&RequestOptions::default(), AnalysisPattern::Gut),
            Err(DomainError::EmptyPrompt)
        );

        let mut bad_pattern = inbound();
        bad_pattern.pattern = Some("vibes".to_string());
        assert!(matches!(
            bad_pattern.into_request(&RequestOptions::default(), AnalysisPattern::Gut),
            Err(DomainError::UnknownPattern(_))
        ));

        let mut one_model = inbound();
        one_model.models = vec!["A".to_string()];
        assert_eq!(
            one_model.into_request(&RequestOptions::default(), AnalysisPattern::Gut),
            Err(DomainError::TooFewModels { found: 1 })
        );
    }

    #[test]
    fn test_failure_envelope_serializes_error_status() {
        let out = OutboundResponse::failure("All providers failed to respond", None);
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["synthesis"], "");
        assert!(json.get("diagnostics").is_none());
    }
}
