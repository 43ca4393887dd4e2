//! Concrete provider adapters
//!
//! A closed set of backends behind the application's `ProviderAdapter`
//! port. Which adapter a model gets is decided once, at registry build
//! time, through an [`AdapterFactory`] value.

pub mod anthropic;
pub mod http;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod unavailable;

pub use anthropic::AnthropicAdapter;
pub use http::ApiKey;
pub use mock::MockAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use unavailable::UnavailableAdapter;

use std::sync::Arc;
use ultra_application::{Binding, ProviderAdapter};
use ultra_domain::ModelId;

/// Supported backend families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Ollama,
    Mock,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Ollama => "ollama",
            ProviderKind::Mock => "mock",
        }
    }

    /// Whether calls need an API key
    pub fn requires_credentials(&self) -> bool {
        matches!(self, ProviderKind::OpenAi | ProviderKind::Anthropic)
    }

    pub fn all() -> [ProviderKind; 4] {
        [
            ProviderKind::OpenAi,
            ProviderKind::Anthropic,
            ProviderKind::Ollama,
            ProviderKind::Mock,
        ]
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "ollama" => Ok(ProviderKind::Ollama),
            "mock" => Ok(ProviderKind::Mock),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Connection settings shared by the HTTP adapters
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub base_url: String,
    pub api_key: Option<ApiKey>,
    /// `anthropic-version` header (Anthropic only)
    pub api_version: Option<String>,
    /// Completion cap used when the call does not set one
    pub max_tokens: u32,
}

impl ProviderSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            api_version: None,
            max_tokens: 4096,
        }
    }

    pub fn with_api_key(mut self, key: Option<ApiKey>) -> Self {
        self.api_key = key;
        self
    }

    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// `base_url` joined with `path`, without doubled slashes
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// How to build the adapter for one model
#[derive(Debug, Clone)]
pub enum AdapterFactory {
    /// A real backend call
    Live {
        kind: ProviderKind,
        settings: ProviderSettings,
    },
    /// Deterministic placeholder output
    Mock,
    /// Registered but not callable (e.g. missing credentials with mocking off)
    Unavailable { reason: String },
}

impl AdapterFactory {
    pub fn live(kind: ProviderKind, settings: ProviderSettings) -> Self {
        if kind == ProviderKind::Mock {
            return AdapterFactory::Mock;
        }
        AdapterFactory::Live { kind, settings }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, AdapterFactory::Mock)
    }

    /// Build the binding for `model`, sharing `client` across adapters
    pub fn build(&self, model: &ModelId, client: &reqwest::Client) -> Binding {
        let provider = model.provider_hint().to_string();
        match self {
            AdapterFactory::Live { kind, settings } => {
                let adapter: Arc<dyn ProviderAdapter> = match kind {
                    ProviderKind::OpenAi => Arc::new(OpenAiAdapter::new(
                        client.clone(),
                        model.model_name(),
                        settings.clone(),
                    )),
                    ProviderKind::Anthropic => Arc::new(AnthropicAdapter::new(
                        client.clone(),
                        model.model_name(),
                        settings.clone(),
                    )),
                    ProviderKind::Ollama => Arc::new(OllamaAdapter::new(
                        client.clone(),
                        model.model_name(),
                        settings.clone(),
                    )),
                    ProviderKind::Mock => Arc::new(MockAdapter::new(model.clone())),
                };
                let binding = Binding::new(adapter, provider);
                if *kind == ProviderKind::Mock {
                    binding.mocked()
                } else {
                    binding
                }
            }
            AdapterFactory::Mock => {
                Binding::new(Arc::new(MockAdapter::new(model.clone())), provider).mocked()
            }
            AdapterFactory::Unavailable { reason } => {
                Binding::new(Arc::new(UnavailableAdapter::new(reason.clone())), provider)
            }
        }
    }
}
