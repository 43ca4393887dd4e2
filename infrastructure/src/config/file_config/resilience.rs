//! Dispatch, circuit breaker and cache settings from TOML

use super::pipeline::zero;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use ultra_application::{CacheConfig, CircuitBreakerConfig, DispatchConfig, RetryPolicy};
use ultra_domain::ConfigIssue;

/// `[dispatch]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileDispatchConfig {
    /// Deadline for a single adapter attempt
    pub call_timeout_ms: u64,
    /// Extra attempts for rate-limited or timed-out calls
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Default for FileDispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: 30_000,
            max_retries: 2,
            backoff_base_ms: 250,
            backoff_max_ms: 4_000,
        }
    }
}

impl FileDispatchConfig {
    /// Convert, taking per-provider concurrency limits from `[providers.*]`
    pub fn to_dispatch_config(
        &self,
        provider_limits: HashMap<String, usize>,
    ) -> (DispatchConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = Self::default();
        let call_timeout_ms = if self.call_timeout_ms == 0 {
            issues.push(zero("dispatch.call_timeout_ms"));
            defaults.call_timeout_ms
        } else {
            self.call_timeout_ms
        };
        let base = if self.backoff_base_ms == 0 {
            issues.push(zero("dispatch.backoff_base_ms"));
            defaults.backoff_base_ms
        } else {
            self.backoff_base_ms
        };
        let max = self.backoff_max_ms.max(base);

        let retry = RetryPolicy::default()
            .with_max_retries(self.max_retries)
            .with_backoff(Duration::from_millis(base), Duration::from_millis(max));

        let mut config = DispatchConfig::default()
            .with_call_timeout(Duration::from_millis(call_timeout_ms))
            .with_retry(retry);
        for (provider, limit) in provider_limits {
            config = config.with_provider_limit(provider, limit);
        }
        (config, issues)
    }
}

/// `[circuit_breaker]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCircuitBreakerConfig {
    /// Consecutive failures that open a model's circuit
    pub failure_threshold: u32,
    /// How long an open circuit rejects calls before admitting a probe
    pub cool_down_ms: u64,
}

impl Default for FileCircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_down_ms: 30_000,
        }
    }
}

impl FileCircuitBreakerConfig {
    pub fn to_circuit_breaker_config(&self) -> (CircuitBreakerConfig, Vec<ConfigIssue>) {
        let mut issues = Vec::new();
        let defaults = CircuitBreakerConfig::default();
        let mut config = defaults;
        if self.failure_threshold == 0 {
            issues.push(zero("circuit_breaker.failure_threshold"));
        } else {
            config = config.with_failure_threshold(self.failure_threshold);
        }
        if self.cool_down_ms == 0 {
            issues.push(zero("circuit_breaker.cool_down_ms"));
        } else {
            config = config.with_cool_down(Duration::from_millis(self.cool_down_ms));
        }
        (config, issues)
    }
}

/// `[cache]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileCacheConfig {
    pub enabled: bool,
    /// Maximum number of cached results (LRU beyond that)
    pub capacity: usize,
    pub ttl_secs: u64,
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 512,
            ttl_secs: 900,
        }
    }
}

impl FileCacheConfig {
    pub fn to_cache_config(&self) -> (CacheConfig, Vec<ConfigIssue>) {
        if !self.enabled {
            return (CacheConfig::disabled(), Vec::new());
        }
        let mut issues = Vec::new();
        let mut config = CacheConfig::default();
        if self.capacity == 0 {
            issues.push(zero("cache.capacity"));
        } else {
            config = config.with_capacity(self.capacity);
        }
        if self.ttl_secs == 0 {
            issues.push(zero("cache.ttl_secs"));
        } else {
            config = config.with_ttl(Duration::from_secs(self.ttl_secs));
        }
        (config, issues)
    }
}
