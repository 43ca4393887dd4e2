//! Provider configuration from TOML (`[providers]` section)

use super::pipeline::zero;
use crate::providers::anthropic::DEFAULT_API_VERSION;
use crate::providers::ollama::DEFAULT_BASE_URL as OLLAMA_BASE_URL;
use crate::providers::{ApiKey, ProviderKind, ProviderSettings};
use crate::registry::{MockMode, ProviderSpec, RegistryConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use ultra_domain::{ConfigIssue, ConfigIssueCode};

const DEFAULT_MAX_TOKENS: u32 = 4096;
const REDACTED: &str = "****";

/// One `[providers.<name>]` block
///
/// Unset fields take the provider's defaults (see [`ProviderKind`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProviderConfig {
    pub enabled: bool,
    /// Environment variable holding the API key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
    /// Inline API key (prefer `api_key_env`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// `anthropic-version` header
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Maximum in-flight calls to this provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,
    /// Model names served by this provider (with or without the `provider:` prefix)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
}

impl Default for FileProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: None,
            api_key: None,
            base_url: None,
            api_version: None,
            max_tokens: None,
            max_concurrency: None,
            models: None,
        }
    }
}

fn default_base_url(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "https://api.openai.com",
        ProviderKind::Anthropic => "https://api.anthropic.com",
        ProviderKind::Ollama => OLLAMA_BASE_URL,
        ProviderKind::Mock => "",
    }
}

fn default_api_key_env(kind: ProviderKind) -> Option<&'static str> {
    match kind {
        ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
        ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
        ProviderKind::Ollama | ProviderKind::Mock => None,
    }
}

fn default_models(kind: ProviderKind) -> Vec<String> {
    let names: &[&str] = match kind {
        ProviderKind::OpenAi => &["gpt-4o", "gpt-4o-mini"],
        ProviderKind::Anthropic => &["claude-sonnet-4-5", "claude-haiku-4-5"],
        ProviderKind::Ollama | ProviderKind::Mock => &[],
    };
    names.iter().map(|s| s.to_string()).collect()
}

impl FileProviderConfig {
    fn models_for(&self, kind: ProviderKind) -> Vec<String> {
        self.models.clone().unwrap_or_else(|| default_models(kind))
    }

    fn api_key_env_for(&self, kind: ProviderKind) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| default_api_key_env(kind).map(String::from))
    }

    /// Resolve credentials and defaults into a registry entry
    pub fn to_provider_spec<F>(&self, kind: ProviderKind, lookup_env: &F) -> ProviderSpec
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key_env = self.api_key_env_for(kind);
        let api_key = self
            .api_key
            .as_deref()
            .and_then(ApiKey::new)
            .or_else(|| {
                api_key_env
                    .as_deref()
                    .and_then(lookup_env)
                    .and_then(ApiKey::new)
            });

        let mut settings = ProviderSettings::new(
            self.base_url
                .clone()
                .unwrap_or_else(|| default_base_url(kind).to_string()),
        )
        .with_api_key(api_key)
        .with_max_tokens(self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS));
        if kind == ProviderKind::Anthropic {
            settings = settings.with_api_version(
                self.api_version
                    .clone()
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            );
        }

        let mut spec = ProviderSpec::new(kind, settings).with_models(self.models_for(kind));
        spec.enabled = self.enabled;
        spec.api_key_env = api_key_env;
        spec
    }

    fn validate(&self, kind: ProviderKind) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let section = format!("providers.{}", kind.as_str());
        if self.max_concurrency == Some(0) {
            issues.push(zero(&format!("{}.max_concurrency", section)));
        }
        if self.max_tokens == Some(0) {
            issues.push(zero(&format!("{}.max_tokens", section)));
        }
        if let Some(models) = &self.models
            && models.iter().any(|m| m.trim().is_empty())
        {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::EmptyModelName {
                    field: format!("{}.models", section),
                },
                format!("{}.models: model name cannot be empty", section),
            ));
        }
        issues
    }
}

/// `[providers]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileProvidersConfig {
    /// auto | always | never
    pub mock_mode: String,
    /// TCP connect timeout shared by all HTTP providers
    pub connect_timeout_ms: u64,
    pub openai: FileProviderConfig,
    pub anthropic: FileProviderConfig,
    pub ollama: FileProviderConfig,
    pub mock: FileProviderConfig,
}

impl Default for FileProvidersConfig {
    fn default() -> Self {
        Self {
            mock_mode: MockMode::default().as_str().to_string(),
            connect_timeout_ms: 10_000,
            openai: FileProviderConfig::default(),
            anthropic: FileProviderConfig::default(),
            ollama: FileProviderConfig::default(),
            mock: FileProviderConfig::default(),
        }
    }
}

impl FileProvidersConfig {
    fn blocks(&self) -> [(ProviderKind, &FileProviderConfig); 4] {
        [
            (ProviderKind::OpenAi, &self.openai),
            (ProviderKind::Anthropic, &self.anthropic),
            (ProviderKind::Ollama, &self.ollama),
            (ProviderKind::Mock, &self.mock),
        ]
    }

    pub fn parse_mock_mode(&self) -> (MockMode, Vec<ConfigIssue>) {
        match self.mock_mode.parse::<MockMode>() {
            Ok(mode) => (mode, Vec::new()),
            Err(_) => (
                MockMode::default(),
                vec![ConfigIssue::error(
                    ConfigIssueCode::InvalidEnumValue {
                        field: "providers.mock_mode".to_string(),
                        value: self.mock_mode.clone(),
                        valid_values: MockMode::valid_values(),
                    },
                    format!("providers.mock_mode: unknown value '{}'", self.mock_mode),
                )],
            ),
        }
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = self.parse_mock_mode().1;
        if self.connect_timeout_ms == 0 {
            issues.push(zero("providers.connect_timeout_ms"));
        }
        for (kind, block) in self.blocks() {
            issues.extend(block.validate(kind));
        }
        issues
    }

    /// Build the registry configuration, reading API keys through `lookup_env`
    pub fn to_registry_config_with<F>(&self, lookup_env: F) -> RegistryConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        RegistryConfig {
            mock_mode: self.parse_mock_mode().0,
            providers: self
                .blocks()
                .into_iter()
                .map(|(kind, block)| block.to_provider_spec(kind, &lookup_env))
                .collect(),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms.max(1)),
        }
    }

    /// Build the registry configuration from the process environment
    pub fn to_registry_config(&self) -> RegistryConfig {
        self.to_registry_config_with(|name| std::env::var(name).ok())
    }

    /// Concurrency limits keyed by provider name, for enabled providers that set one
    pub fn provider_limits(&self) -> HashMap<String, usize> {
        self.blocks()
            .into_iter()
            .filter(|(_, block)| block.enabled)
            .filter_map(|(kind, block)| {
                block
                    .max_concurrency
                    .filter(|n| *n > 0)
                    .map(|n| (kind.as_str().to_string(), n))
            })
            .collect()
    }

    /// Copy with inline API keys masked, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for block in [
            &mut copy.openai,
            &mut copy.anthropic,
            &mut copy.ollama,
            &mut copy.mock,
        ] {
            if block.api_key.is_some() {
                block.api_key = Some(REDACTED.to_string());
            }
        }
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    fn spec(config: &RegistryConfig, kind: ProviderKind) -> &ProviderSpec {
        config.providers.iter().find(|p| p.kind == kind).unwrap()
    }

    #[test]
    fn test_defaults_fill_per_provider() {
        let config = FileProvidersConfig::default().to_registry_config_with(env(&[]));
        assert_eq!(config.mock_mode, MockMode::Auto);

        let openai = spec(&config, ProviderKind::OpenAi);
        assert_eq!(openai.settings.base_url, "https://api.openai.com");
        assert_eq!(openai.api_key_env.as_deref(), Some("OPENAI_API_KEY"));
        assert!(openai.settings.api_key.is_none());
        assert_eq!(openai.models, vec!["gpt-4o", "gpt-4o-mini"]);

        let anthropic = spec(&config, ProviderKind::Anthropic);
        assert_eq!(anthropic.settings.api_version.as_deref(), Some(DEFAULT_API_VERSION));

        let ollama = spec(&config, ProviderKind::Ollama);
        assert_eq!(ollama.settings.base_url, OLLAMA_BASE_URL);
        assert!(ollama.models.is_empty());
    }

    #[test]
    fn test_api_key_resolution() {
        let mut file = FileProvidersConfig::default();
        file.anthropic.api_key_env = Some("MY_CLAUDE_KEY".to_string());
        file.openai.api_key = Some("sk-inline-0123456789abcdef".to_string());

        let config = file.to_registry_config_with(env(&[
            ("MY_CLAUDE_KEY", "sk-ant-0123456789abcdef"),
            ("OPENAI_API_KEY", "sk-env-should-lose"),
        ]));
        let openai = spec(&config, ProviderKind::OpenAi);
        assert_eq!(
            openai.settings.api_key.as_ref().unwrap().expose(),
            "sk-inline-0123456789abcdef"
        );
        let anthropic = spec(&config, ProviderKind::Anthropic);
        assert_eq!(
            anthropic.settings.api_key.as_ref().unwrap().expose(),
            "sk-ant-0123456789abcdef"
        );
    }

    #[test]
    fn test_blank_env_key_counts_as_missing() {
        let config =
            FileProvidersConfig::default().to_registry_config_with(env(&[("OPENAI_API_KEY", " ")]));
        assert!(spec(&config, ProviderKind::OpenAi).settings.api_key.is_none());
    }

    #[test]
    fn test_validate_reports_bad_values() {
        let mut file = FileProvidersConfig {
            mock_mode: "sometimes".to_string(),
            ..Default::default()
        };
        file.openai.max_concurrency = Some(0);
        file.ollama.models = Some(vec!["".to_string()]);

        let issues = file.validate();
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.is_error()));
        assert_eq!(file.parse_mock_mode().0, MockMode::Auto);
    }

    #[test]
    fn test_provider_limits_skip_disabled() {
        let mut file = FileProvidersConfig::default();
        file.openai.max_concurrency = Some(4);
        file.anthropic.max_concurrency = Some(2);
        file.anthropic.enabled = false;

        let limits = file.provider_limits();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits.get("openai"), Some(&4));
    }

    #[test]
    fn test_redacted_masks_inline_keys() {
        let mut file = FileProvidersConfig::default();
        file.openai.api_key = Some("sk-secret".to_string());
        let shown = toml::to_string(&file.redacted()).unwrap();
        assert!(!shown.contains("sk-secret"));
        assert!(shown.contains(REDACTED));
    }
}
