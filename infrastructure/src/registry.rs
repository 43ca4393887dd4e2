//! Provider registry
//!
//! Maps model ids to adapter bindings. Built once at startup from the
//! `[providers]` configuration; further models can be registered at runtime.
//!
//! Resolution priority:
//!  1. exact model id (`openai:gpt-4o`)
//!  2. a bare model name (`gpt-4o`) that matches exactly one registered id
//!  3. otherwise `UnknownModel`

use crate::providers::{AdapterFactory, ProviderKind, ProviderSettings};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use ultra_application::{Binding, ProviderResolver, ResolveError};
use ultra_domain::ModelId;

/// What to do when a provider has no usable credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MockMode {
    /// Mock only providers whose credentials are missing
    #[default]
    Auto,
    /// Mock every model, even with credentials present
    Always,
    /// Never mock; models without credentials fail with `ProviderUnavailable`
    Never,
}

impl MockMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MockMode::Auto => "auto",
            MockMode::Always => "always",
            MockMode::Never => "never",
        }
    }

    pub fn valid_values() -> Vec<String> {
        ["auto", "always", "never"].map(String::from).to_vec()
    }
}

impl std::str::FromStr for MockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(MockMode::Auto),
            "always" => Ok(MockMode::Always),
            "never" | "off" => Ok(MockMode::Never),
            other => Err(format!("unknown mock mode: {}", other)),
        }
    }
}

/// One provider block after credentials were resolved
#[derive(Debug, Clone)]
pub struct ProviderSpec {
    pub kind: ProviderKind,
    pub enabled: bool,
    pub settings: ProviderSettings,
    /// Environment variable the key was read from, for diagnostics
    pub api_key_env: Option<String>,
    pub models: Vec<String>,
}

impl ProviderSpec {
    pub fn new(kind: ProviderKind, settings: ProviderSettings) -> Self {
        Self {
            kind,
            enabled: true,
            settings,
            api_key_env: None,
            models: Vec::new(),
        }
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    fn has_credentials(&self) -> bool {
        !self.kind.requires_credentials() || self.settings.api_key.is_some()
    }

    /// Registered id for a configured model name
    fn model_id(&self, name: &str) -> Option<ModelId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let prefix = format!("{}:", self.kind.as_str());
        if name.starts_with(&prefix) {
            ModelId::try_new(name)
        } else {
            Some(ModelId::from_parts(self.kind.as_str(), name))
        }
    }

    fn missing_credentials_reason(&self) -> String {
        match &self.api_key_env {
            Some(env) => format!("{} credentials missing ({} is not set)", self.kind, env),
            None => format!("{} credentials missing", self.kind),
        }
    }
}

/// Everything needed to build a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub mock_mode: MockMode,
    pub providers: Vec<ProviderSpec>,
    pub connect_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            mock_mode: MockMode::Auto,
            providers: Vec::new(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// How a registered model will be served
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Live,
    Mock,
    Unavailable(String),
}

impl Availability {
    fn of(factory: &AdapterFactory) -> Self {
        match factory {
            AdapterFactory::Live { .. } => Availability::Live,
            AdapterFactory::Mock => Availability::Mock,
            AdapterFactory::Unavailable { reason } => Availability::Unavailable(reason.clone()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Availability::Live => "live",
            Availability::Mock => "mock",
            Availability::Unavailable(_) => "unavailable",
        }
    }
}

/// Listing entry for `--list-models`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModel {
    pub model_id: ModelId,
    pub provider: String,
    pub availability: Availability,
}

struct Entry {
    binding: Binding,
    availability: Availability,
}

/// Model id to adapter table
pub struct ProviderRegistry {
    client: reqwest::Client,
    entries: RwLock<BTreeMap<ModelId, Entry>>,
}

impl ProviderRegistry {
    /// Empty registry sharing `client` across every adapter it builds
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| RegistryError::HttpClient(e.to_string()))?;
        let registry = Self::new(client);

        if config.mock_mode == MockMode::Always {
            info!("Mock mode 'always': every model is served by a mock adapter");
        }

        for spec in &config.providers {
            if !spec.enabled {
                debug!(provider = %spec.kind, "Provider disabled, registering nothing");
                continue;
            }
            let factory = factory_for(spec, config.mock_mode);
            for name in &spec.models {
                match spec.model_id(name) {
                    Some(model) => registry.register(model, factory.clone()),
                    None => warn!(provider = %spec.kind, "Skipping empty model name"),
                }
            }
        }

        Ok(registry)
    }

    /// Register (or replace) the adapter for `model`
    pub fn register(&self, model: ModelId, factory: AdapterFactory) {
        let binding = factory.build(&model, &self.client);
        let availability = Availability::of(&factory);
        debug!(model = %model, availability = availability.label(), "Registered model");
        self.write().insert(
            model,
            Entry {
                binding,
                availability,
            },
        );
    }

    pub fn unregister(&self, model: &ModelId) -> bool {
        self.write().remove(model).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Registered models, sorted by id
    pub fn models(&self) -> Vec<RegisteredModel> {
        self.read()
            .iter()
            .map(|(id, entry)| RegisteredModel {
                model_id: id.clone(),
                provider: entry.binding.provider.clone(),
                availability: entry.availability.clone(),
            })
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<ModelId, Entry>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<ModelId, Entry>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProviderResolver for ProviderRegistry {
    fn resolve(&self, model: &ModelId) -> Result<Binding, ResolveError> {
        let entries = self.read();

        // 1. Exact id
        if let Some(entry) = entries.get(model) {
            return Ok(entry.binding.clone());
        }

        // 2. Unambiguous bare model name
        if !model.as_str().contains(':') {
            let mut matches = entries
                .iter()
                .filter(|(id, _)| id.model_name() == model.as_str());
            if let (Some((_, entry)), None) = (matches.next(), matches.next()) {
                return Ok(entry.binding.clone());
            }
        }

        Err(ResolveError::UnknownModel(model.clone()))
    }

    fn list_available(&self) -> BTreeSet<ModelId> {
        self.read().keys().cloned().collect()
    }
}

/// Pick the adapter factory for a provider under `mode`
fn factory_for(spec: &ProviderSpec, mode: MockMode) -> AdapterFactory {
    if spec.kind == ProviderKind::Mock || mode == MockMode::Always {
        return AdapterFactory::Mock;
    }
    if spec.has_credentials() {
        return AdapterFactory::live(spec.kind, spec.settings.clone());
    }

    let reason = spec.missing_credentials_reason();
    match mode {
        MockMode::Never => {
            warn!(provider = %spec.kind, "{}; its models will be unavailable", reason);
            AdapterFactory::Unavailable { reason }
        }
        _ => {
            warn!(provider = %spec.kind, "{}; substituting mock adapters", reason);
            AdapterFactory::Mock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ApiKey;
    use ultra_domain::{GenerationParams, ProviderErrorKind};

    fn openai(key: Option<&str>) -> ProviderSpec {
        let mut spec = ProviderSpec::new(
            ProviderKind::OpenAi,
            ProviderSettings::new("https://api.openai.com").with_api_key(key.and_then(ApiKey::new)),
        )
        .with_models(["gpt-4o", "openai:gpt-4o-mini"]);
        spec.api_key_env = Some("OPENAI_API_KEY".to_string());
        spec
    }

    fn ollama() -> ProviderSpec {
        ProviderSpec::new(
            ProviderKind::Ollama,
            ProviderSettings::new("http://localhost:11434"),
        )
        .with_models(["llama3"])
    }

    fn registry(mode: MockMode, providers: Vec<ProviderSpec>) -> ProviderRegistry {
        ProviderRegistry::from_config(&RegistryConfig {
            mock_mode: mode,
            providers,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_model_ids_are_prefixed_once() {
        let reg = registry(MockMode::Auto, vec![openai(Some("sk-test-key-0123456789"))]);
        let ids: Vec<String> = reg
            .list_available()
            .into_iter()
            .map(|m| m.to_string())
            .collect();
        assert_eq!(ids, vec!["openai:gpt-4o", "openai:gpt-4o-mini"]);
    }

    #[test]
    fn test_auto_mode_mocks_missing_credentials_only() {
        let reg = registry(MockMode::Auto, vec![openai(None), ollama()]);
        assert!(reg.resolve(&ModelId::new("openai:gpt-4o")).unwrap().mocked);
        // Ollama needs no key
        assert!(!reg.resolve(&ModelId::new("ollama:llama3")).unwrap().mocked);

        let with_key = registry(MockMode::Auto, vec![openai(Some("sk-test-key-0123456789"))]);
        let binding = with_key.resolve(&ModelId::new("openai:gpt-4o")).unwrap();
        assert!(!binding.mocked);
        assert_eq!(binding.provider, "openai");
    }

    #[test]
    fn test_always_mode_mocks_everything() {
        let reg = registry(
            MockMode::Always,
            vec![openai(Some("sk-test-key-0123456789")), ollama()],
        );
        for model in reg.list_available() {
            assert!(reg.resolve(&model).unwrap().mocked, "{model} should be mocked");
        }
    }

    #[tokio::test]
    async fn test_never_mode_registers_unavailable_models() {
        let reg = registry(MockMode::Never, vec![openai(None)]);
        let binding = reg.resolve(&ModelId::new("openai:gpt-4o")).unwrap();
        assert!(!binding.mocked);

        let err = binding
            .adapter
            .generate("hi", &GenerationParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::ProviderUnavailable);
        assert!(err.to_string().contains("OPENAI_API_KEY"));

        let listing = reg.models();
        assert!(matches!(listing[0].availability, Availability::Unavailable(_)));
    }

    #[test]
    fn test_disabled_provider_registers_nothing() {
        let reg = registry(MockMode::Auto, vec![openai(None).disabled(), ollama()]);
        assert_eq!(
            reg.resolve(&ModelId::new("openai:gpt-4o")).unwrap_err(),
            ResolveError::UnknownModel(ModelId::new("openai:gpt-4o"))
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_bare_name_resolves_when_unambiguous() {
        let reg = registry(MockMode::Auto, vec![openai(None), ollama()]);
        assert!(reg.resolve(&ModelId::new("llama3")).is_ok());
        assert!(reg.resolve(&ModelId::new("gpt-4o")).is_ok());
        assert!(reg.resolve(&ModelId::new("claude")).is_err());

        reg.register(ModelId::new("ollama:gpt-4o"), AdapterFactory::Mock);
        // now two ids share the name
        assert!(reg.resolve(&ModelId::new("gpt-4o")).is_err());
    }

    #[test]
    fn test_register_replaces_and_unregister_removes() {
        let reg = ProviderRegistry::new(reqwest::Client::new());
        assert!(reg.is_empty());

        let model = ModelId::new("mock:alpha");
        reg.register(
            model.clone(),
            AdapterFactory::Unavailable {
                reason: "down".into(),
            },
        );
        assert!(!reg.resolve(&model).unwrap().mocked);

        reg.register(model.clone(), AdapterFactory::Mock);
        assert!(reg.resolve(&model).unwrap().mocked);
        assert_eq!(reg.len(), 1);

        assert!(reg.unregister(&model));
        assert!(!reg.unregister(&model));
        assert!(reg.resolve(&model).is_err());
    }

    #[test]
    fn test_mock_provider_kind_is_always_mock() {
        let spec = ProviderSpec::new(ProviderKind::Mock, ProviderSettings::new(""))
            .with_models(["alpha", "beta"]);
        let reg = registry(MockMode::Never, vec![spec]);
        let binding = reg.resolve(&ModelId::new("mock:alpha")).unwrap();
        assert!(binding.mocked);
    }

    #[test]
    fn test_mock_mode_parsing() {
        assert_eq!("auto".parse::<MockMode>(), Ok(MockMode::Auto));
        assert_eq!("ALWAYS".parse::<MockMode>(), Ok(MockMode::Always));
        assert_eq!("never".parse::<MockMode>(), Ok(MockMode::Never));
        assert!("sometimes".parse::<MockMode>().is_err());
    }
}
