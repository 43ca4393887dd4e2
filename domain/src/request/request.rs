//! Validated Ultra request

use crate::core::error::DomainError;
use crate::core::model::ModelId;
use crate::core::prompt::Prompt;
use crate::request::options::RequestOptions;
use crate::request::pattern::AnalysisPattern;

/// A request that passed validation (Entity)
///
/// - model ids are unique, in first-seen order
/// - the synthesizer is always one of the model ids
/// - there are at least two model ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    prompt: Prompt,
    model_ids: Vec<ModelId>,
    synthesizer_id: ModelId,
    pattern: AnalysisPattern,
    options: RequestOptions,
}

impl Request {
    pub fn new(
        prompt: Prompt,
        models: impl IntoIterator<Item = ModelId>,
        synthesizer_id: ModelId,
        pattern: AnalysisPattern,
    ) -> Result<Self, DomainError> {
        let mut model_ids: Vec<ModelId> = Vec::new();
        for model in models {
            if !model_ids.contains(&model) {
                model_ids.push(model);
            }
        }
        if !model_ids.contains(&synthesizer_id) {
            model_ids.push(synthesizer_id.clone());
        }
        if model_ids.len() < 2 {
            return Err(DomainError::TooFewModels {
                found: model_ids.len(),
            });
        }

        Ok(Self {
            prompt,
            model_ids,
            synthesizer_id,
            pattern,
            options: RequestOptions::default(),
        })
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn model_ids(&self) -> &[ModelId] {
        &self.model_ids
    }

    pub fn synthesizer_id(&self) -> &ModelId {
        &self.synthesizer_id
    }

    pub fn pattern(&self) -> AnalysisPattern {
        self.pattern
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }
}
