//! Application layer for ultra
//!
//! This crate contains the dispatcher, the pipeline controller, their
//! resilience policies (cache, circuit breakers, retry), and the ports the
//! infrastructure layer implements. It depends only on the domain layer.

pub mod cache;
pub mod circuit;
pub mod config;
pub mod ports;
pub mod retry;
pub mod use_cases;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheKey, ResponseCache};
pub use circuit::{CircuitBreakerConfig, CircuitBreakers, CircuitPermit, CircuitState};
pub use config::{DispatchConfig, PipelineDefaults, UltraConfig};
pub use ports::{
    progress::{NoProgress, ProgressNotifier},
    provider_adapter::{AdapterError, Generation, ProviderAdapter, StreamHandle},
    resolver::{Binding, ProviderResolver, ResolveError},
};
pub use retry::RetryPolicy;
pub use use_cases::dispatch::{DispatchOutcome, DispatchPlan, Dispatcher};
pub use use_cases::run_ultra::{PipelineError, RunUltraUseCase};
