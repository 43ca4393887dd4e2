//! Dispatch policy

use crate::retry::RetryPolicy;
use std::collections::HashMap;
use std::time::Duration;

/// How the dispatcher invokes adapters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Upper bound on a single adapter attempt
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// Maximum in-flight calls per provider; providers not listed are unbounded
    pub provider_limits: HashMap<String, usize>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            provider_limits: HashMap::new(),
        }
    }
}

impl DispatchConfig {
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_provider_limit(mut self, provider: impl Into<String>, limit: usize) -> Self {
        self.provider_limits.insert(provider.into(), limit);
        self
    }
}
