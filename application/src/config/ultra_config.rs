//! Top-level application configuration

use super::{DispatchConfig, PipelineDefaults};
use crate::cache::CacheConfig;
use crate::circuit::CircuitBreakerConfig;

/// Everything the use case needs to build its dispatcher
///
/// Produced by the infrastructure config loader from TOML and environment
/// layers; tests construct it directly.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UltraConfig {
    pub pipeline: PipelineDefaults,
    pub dispatch: DispatchConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub cache: CacheConfig,
}
