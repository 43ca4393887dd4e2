//! Pipeline defaults from TOML (`[pipeline]` section)

use serde::{Deserialize, Serialize};
use std::time::Duration;
use ultra_domain::{
    AnalysisPattern, CachePolicy, ConfigIssue, ConfigIssueCode, ModelId, RequestOptions,
};

/// Defaults applied to requests that leave fields unset
///
/// # Example
///
/// ```toml
/// [pipeline]
/// timeout_ms = 60000
/// peer_review = true
/// default_pattern = "confidence"
/// models = ["openai:gpt-4o", "anthropic:claude-sonnet-4-5"]
/// synthesizer = "anthropic:claude-sonnet-4-5"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilePipelineConfig {
    /// Overall deadline per request, across all stages
    pub timeout_ms: u64,
    pub include_diagnostics: bool,
    pub peer_review: bool,
    /// use | refresh | bypass
    pub cache_policy: String,
    pub default_pattern: String,
    /// Models used when a request names none
    pub models: Vec<String>,
    /// Synthesizer used when a request names none (first model if unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesizer: Option<String>,
}

impl Default for FilePipelineConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            include_diagnostics: true,
            peer_review: true,
            cache_policy: "use".to_string(),
            default_pattern: AnalysisPattern::Confidence.as_str().to_string(),
            models: vec![
                "openai:gpt-4o".to_string(),
                "anthropic:claude-sonnet-4-5".to_string(),
            ],
            synthesizer: Some("anthropic:claude-sonnet-4-5".to_string()),
        }
    }
}

impl FilePipelineConfig {
    pub fn parse_models(&self) -> (Vec<ModelId>, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let mut models = Vec::new();
        for name in &self.models {
            match ModelId::try_new(name.as_str()) {
                Some(model) => models.push(model),
                None => issues.push(ConfigIssue::error(
                    ConfigIssueCode::EmptyModelName {
                        field: "pipeline.models".to_string(),
                    },
                    "pipeline.models: model name cannot be empty",
                )),
            }
        }
        if !models.is_empty() && models.len() < 2 {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::TooFewDefaultModels {
                    found: models.len(),
                },
                format!(
                    "pipeline.models: {} default model configured, requests must name at least two",
                    models.len()
                ),
            ));
        }
        (models, issues)
    }

    pub fn parse_synthesizer(&self) -> (Option<ModelId>, Vec<ConfigIssue>) {
        match self.synthesizer.as_deref() {
            None => (None, Vec::new()),
            Some(name) => match ModelId::try_new(name) {
                Some(model) => (Some(model), Vec::new()),
                None => (
                    None,
                    vec![ConfigIssue::error(
                        ConfigIssueCode::EmptyModelName {
                            field: "pipeline.synthesizer".to_string(),
                        },
                        "pipeline.synthesizer: model name cannot be empty",
                    )],
                ),
            },
        }
    }

    pub fn parse_default_pattern(&self) -> (AnalysisPattern, Vec<ConfigIssue>) {
        match self.default_pattern.parse::<AnalysisPattern>() {
            Ok(pattern) => (pattern, Vec::new()),
            Err(_) => (
                AnalysisPattern::default(),
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "pipeline.default_pattern".to_string(),
                        value: self.default_pattern.clone(),
                        valid_values: AnalysisPattern::all()
                            .iter()
                            .map(|p| p.as_str().to_string())
                            .collect(),
                    },
                    format!(
                        "pipeline.default_pattern: unknown pattern '{}'",
                        self.default_pattern
                    ),
                )],
            ),
        }
    }

    pub fn parse_options(&self) -> (RequestOptions, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        if self.timeout_ms == 0 {
            issues.push(zero("pipeline.timeout_ms"));
        }
        let cache_policy = match self.cache_policy.parse::<CachePolicy>() {
            Ok(policy) => policy,
            Err(_) => {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "pipeline.cache_policy".to_string(),
                        value: self.cache_policy.clone(),
                        valid_values: ["use", "refresh", "bypass"].map(String::from).to_vec(),
                    },
                    format!(
                        "pipeline.cache_policy: unknown policy '{}'",
                        self.cache_policy
                    ),
                ));
                CachePolicy::default()
            }
        };
        let defaults = RequestOptions::default();
        let options = RequestOptions {
            timeout: if self.timeout_ms == 0 {
                defaults.timeout
            } else {
                Duration::from_millis(self.timeout_ms)
            },
            cache_policy,
            include_diagnostics: self.include_diagnostics,
            enable_peer_review: self.peer_review,
        };
        (options, issues)
    }
}

pub(super) fn zero(field: &str) -> ConfigIssue {
    ConfigIssue::error(
        ConfigIssueCode::ZeroValue {
            field: field.to_string(),
        },
        format!("{}: must be greater than 0", field),
    )
}
