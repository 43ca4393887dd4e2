//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into the application's
//! [`UltraConfig`] and the registry's [`RegistryConfig`].

mod output;
mod pipeline;
mod providers;
mod resilience;

pub use output::FileOutputConfig;
pub use pipeline::FilePipelineConfig;
pub use providers::{FileProviderConfig, FileProvidersConfig};
pub use resilience::{FileCacheConfig, FileCircuitBreakerConfig, FileDispatchConfig};

use crate::registry::RegistryConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ultra_application::{PipelineDefaults, UltraConfig};
use ultra_domain::ConfigIssue;

#[derive(Error, Debug)]
pub enum ConfigValidationError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl ConfigValidationError {
    /// `Some` when any issue is an error; warnings alone pass
    pub fn from_issues(issues: &[ConfigIssue]) -> Option<Self> {
        let errors: Vec<String> = issues
            .iter()
            .filter(|i| i.is_error())
            .map(|i| i.message.clone())
            .collect();
        if errors.is_empty() {
            None
        } else {
            Some(ConfigValidationError::Invalid(errors))
        }
    }
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Request defaults
    pub pipeline: FilePipelineConfig,
    /// Per-call timeout and retry
    pub dispatch: FileDispatchConfig,
    pub circuit_breaker: FileCircuitBreakerConfig,
    pub cache: FileCacheConfig,
    /// Provider credentials, endpoints and model lists
    pub providers: FileProvidersConfig,
    pub output: FileOutputConfig,
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        self.convert().1
    }

    /// Convert into the application configuration.
    ///
    /// Invalid values fall back to their defaults; call [`validate`](Self::validate)
    /// first to report them.
    pub fn to_ultra_config(&self) -> UltraConfig {
        self.convert().0
    }

    /// Registry configuration with API keys read from the environment
    pub fn to_registry_config(&self) -> RegistryConfig {
        self.providers.to_registry_config()
    }

    /// Copy safe to print (inline API keys masked)
    pub fn redacted(&self) -> Self {
        Self {
            providers: self.providers.redacted(),
            ..self.clone()
        }
    }

    /// Pretty TOML of the redacted configuration, for `--show-config`
    pub fn to_display_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&self.redacted())
    }

    fn convert(&self) -> (UltraConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();

        let (options, found) = self.pipeline.parse_options();
        issues.extend(found);
        let (default_pattern, found) = self.pipeline.parse_default_pattern();
        issues.extend(found);
        let (models, found) = self.pipeline.parse_models();
        issues.extend(found);
        let (synthesizer, found) = self.pipeline.parse_synthesizer();
        issues.extend(found);

        let (dispatch, found) = self
            .dispatch
            .to_dispatch_config(self.providers.provider_limits());
        issues.extend(found);
        let (circuit_breaker, found) = self.circuit_breaker.to_circuit_breaker_config();
        issues.extend(found);
        let (cache, found) = self.cache.to_cache_config();
        issues.extend(found);

        issues.extend(self.providers.validate());

        let config = UltraConfig {
            pipeline: PipelineDefaults {
                options,
                default_pattern,
                models,
                synthesizer,
            },
            dispatch,
            circuit_breaker,
            cache,
        };
        (config, issues)
    }
}
