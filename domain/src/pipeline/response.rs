//! Final envelope of an Ultra run

use crate::core::model::ModelId;
use crate::pipeline::diagnostics::StageResult;
use crate::pipeline::stage::Stage;
use crate::request::pattern::AnalysisPattern;
use crate::request::request::Request;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quality of a completed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    /// Every requested model answered live (or from cache) and synthesis ran
    Success,
    /// Some models were unavailable or mocked, or synthesis fell back
    PartialSuccess,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::PartialSuccess => "partial_success",
        }
    }
}

/// Complete result of an Ultra run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UltraResponse {
    pub prompt: String,
    pub pattern: AnalysisPattern,
    pub status: ResponseStatus,
    pub synthesizer: ModelId,
    pub synthesis: String,
    /// True when the synthesizer failed and a stage output was returned instead
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_model: Option<ModelId>,
    pub requested_models: Vec<ModelId>,
    pub stages: Vec<StageResult>,
    /// Requested models that produced no usable initial answer
    pub unavailable_models: Vec<ModelId>,
    /// Models answered by a mock adapter in any stage
    pub mocked_models: Vec<ModelId>,
    pub total_latency_ms: u64,
}

impl UltraResponse {
    /// Build the envelope from the stage records of a finished run.
    pub fn assemble(
        request: &Request,
        stages: Vec<StageResult>,
        synthesis: String,
        fallback_model: Option<ModelId>,
        total_latency: Duration,
    ) -> Self {
        let requested_models = request.model_ids().to_vec();

        let initial = stages.iter().find(|s| s.stage == Stage::Initial);
        let unavailable_models: Vec<ModelId> = requested_models
            .iter()
            .filter(|m| {
                initial
                    .and_then(|s| s.result_for(m))
                    .is_none_or(|r| !r.is_ok())
            })
            .cloned()
            .collect();

        let mut mocked_models: Vec<ModelId> = Vec::new();
        for result in stages.iter().flat_map(|s| s.inputs.iter()) {
            if result.is_mock() && !mocked_models.contains(&result.model_id) {
                mocked_models.push(result.model_id.clone());
            }
        }

        let degraded = fallback_model.is_some();
        let status = if unavailable_models.is_empty() && mocked_models.is_empty() && !degraded {
            ResponseStatus::Success
        } else {
            ResponseStatus::PartialSuccess
        };

        Self {
            prompt: request.prompt().content().to_string(),
            pattern: request.pattern(),
            status,
            synthesizer: request.synthesizer_id().clone(),
            synthesis,
            degraded,
            fallback_model,
            requested_models,
            stages,
            unavailable_models,
            mocked_models,
            total_latency_ms: u64::try_from(total_latency.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn stage(&self, stage: Stage) -> Option<&StageResult> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    pub fn is_partial(&self) -> bool {
        self.status == ResponseStatus::PartialSuccess
    }
}
