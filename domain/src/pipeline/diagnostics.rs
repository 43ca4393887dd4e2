//! Per-stage records and their diagnostic projection

use crate::core::model::ModelId;
use crate::pipeline::stage::Stage;
use crate::pipeline::state::SkipReason;
use crate::provider::result::{ProviderErrorKind, ProviderResult, ResultOrigin};
use serde::{Deserialize, Serialize};

/// Everything one stage produced
///
/// Owned by the pipeline controller for the lifetime of one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: Stage,
    /// One result per model called in this stage
    pub inputs: Vec<ProviderResult>,
    /// Models whose output is carried forward to the next stage
    pub survivors: Vec<ModelId>,
    /// Final text (synthesis stage only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Free-form remark, e.g. why synthesis fell back
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl StageResult {
    /// A stage that ran; survivors default to the successful inputs.
    pub fn completed(stage: Stage, inputs: Vec<ProviderResult>) -> Self {
        let survivors = inputs
            .iter()
            .filter(|r| r.is_ok())
            .map(|r| r.model_id.clone())
            .collect();
        Self {
            stage,
            inputs,
            survivors,
            output: None,
            skipped: false,
            skip_reason: None,
            note: None,
        }
    }

    /// A stage that did not run.
    pub fn skipped(stage: Stage, reason: &SkipReason) -> Self {
        Self {
            stage,
            inputs: Vec::new(),
            survivors: Vec::new(),
            output: None,
            skipped: true,
            skip_reason: Some(reason.message()),
            note: None,
        }
    }

    pub fn with_survivors(mut self, survivors: Vec<ModelId>) -> Self {
        self.survivors = survivors;
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn successes(&self) -> impl Iterator<Item = &ProviderResult> {
        self.inputs.iter().filter(|r| r.is_ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProviderResult> {
        self.inputs.iter().filter(|r| !r.is_ok())
    }

    pub fn result_for(&self, model: &ModelId) -> Option<&ProviderResult> {
        self.inputs.iter().find(|r| &r.model_id == model)
    }

    pub fn diagnostics(&self) -> StageDiagnostics {
        let with_origin = |origin: ResultOrigin| {
            self.inputs
                .iter()
                .filter(|r| r.origin == origin)
                .map(|r| r.model_id.clone())
                .collect::<Vec<_>>()
        };

        StageDiagnostics {
            stage: self.stage,
            attempted: self.inputs.iter().map(|r| r.model_id.clone()).collect(),
            succeeded: self.successes().map(|r| r.model_id.clone()).collect(),
            failed: self
                .failures()
                .map(|r| FailedModel {
                    model_id: r.model_id.clone(),
                    kind: r
                        .error_kind()
                        .unwrap_or(ProviderErrorKind::ProviderUnavailable),
                    message: r.error_message().unwrap_or_default().to_string(),
                })
                .collect(),
            cache_hits: with_origin(ResultOrigin::Cached),
            mocked: with_origin(ResultOrigin::Mock),
            short_circuited: with_origin(ResultOrigin::ShortCircuit),
            skipped: self.skipped,
            skip_reason: self.skip_reason.clone(),
            note: self.note.clone(),
        }
    }
}

/// A model that failed within a stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedModel {
    pub model_id: ModelId,
    pub kind: ProviderErrorKind,
    pub message: String,
}

/// Serializable summary of a stage for the response envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    pub stage: Stage,
    pub attempted: Vec<ModelId>,
    pub succeeded: Vec<ModelId>,
    pub failed: Vec<FailedModel>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cache_hits: Vec<ModelId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mocked: Vec<ModelId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub short_circuited: Vec<ModelId>,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}
