//! Infrastructure layer for ultra
//!
//! This crate contains adapters that implement the ports defined
//! in the application layer: the HTTP provider adapters, the provider
//! registry, and configuration file loading.

pub mod config;
pub mod providers;
pub mod registry;

// Re-export commonly used types
pub use config::{
    ConfigLoader, ConfigValidationError, FileCacheConfig, FileCircuitBreakerConfig, FileConfig,
    FileDispatchConfig, FileOutputConfig, FilePipelineConfig, FileProviderConfig,
    FileProvidersConfig,
};
pub use providers::{
    AdapterFactory, AnthropicAdapter, ApiKey, MockAdapter, OllamaAdapter, OpenAiAdapter,
    ProviderKind, ProviderSettings, UnavailableAdapter,
};
pub use registry::{
    Availability, MockMode, ProviderRegistry, ProviderSpec, RegisteredModel, RegistryConfig,
    RegistryError,
};
