//! Defaults applied to requests that leave fields unset

use ultra_domain::{AnalysisPattern, InboundRequest, ModelId, RequestOptions};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineDefaults {
    pub options: RequestOptions,
    pub default_pattern: AnalysisPattern,
    /// Models queried when the caller names none
    pub models: Vec<ModelId>,
    /// Synthesizer used when the caller names none (first model otherwise)
    pub synthesizer: Option<ModelId>,
}

impl PipelineDefaults {
    /// The synthesizer to use when none is given explicitly
    pub fn effective_synthesizer(&self) -> Option<&ModelId> {
        self.synthesizer.as_ref().or_else(|| self.models.first())
    }

    /// Fill an inbound request's missing model list and synthesizer
    ///
    /// When the caller names models but no synthesizer, the configured
    /// synthesizer is used, else the first named model.
    pub fn fill(&self, mut inbound: InboundRequest) -> InboundRequest {
        if inbound.models.is_empty() {
            inbound.models = self.models.iter().map(|m| m.to_string()).collect();
        }
        if inbound.synthesizer.trim().is_empty() {
            let synthesizer = self
                .synthesizer
                .as_ref()
                .map(ModelId::to_string)
                .or_else(|| inbound.models.first().cloned());
            if let Some(synthesizer) = synthesizer {
                inbound.synthesizer = synthesizer;
            }
        }
        inbound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesizer_falls_back_to_first_model() {
        let mut defaults = PipelineDefaults {
            models: vec![ModelId::new("a:x"), ModelId::new("b:y")],
            ..Default::default()
        };
        assert_eq!(defaults.effective_synthesizer(), Some(&ModelId::new("a:x")));

        defaults.synthesizer = Some(ModelId::new("b:y"));
        assert_eq!(defaults.effective_synthesizer(), Some(&ModelId::new("b:y")));
    }

    #[test]
    fn test_fill_uses_configured_models() {
        let defaults = PipelineDefaults {
            models: vec![ModelId::new("a:x"), ModelId::new("b:y")],
            ..Default::default()
        };
        let inbound = InboundRequest {
            prompt: "q".to_string(),
            ..Default::default()
        };
        let filled = defaults.fill(inbound);
        assert_eq!(filled.models, vec!["a:x".to_string(), "b:y".to_string()]);
        assert_eq!(filled.synthesizer, "a:x");
    }

    #[test]
    fn test_fill_keeps_explicit_choices() {
        let defaults = PipelineDefaults {
            models: vec![ModelId::new("a:x")],
            synthesizer: Some(ModelId::new("a:x")),
            ..Default::default()
        };
        let inbound = InboundRequest {
            prompt: "q".to_string(),
            models: vec!["c:z".to_string(), "d:w".to_string()],
            synthesizer: "d:w".to_string(),
            ..Default::default()
        };
        let filled = defaults.fill(inbound.clone());
        assert_eq!(filled, inbound);
    }
}
