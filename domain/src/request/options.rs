//! Per-request options

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a request interacts with the response cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
    /// Read hits, write successful results
    #[default]
    Use,
    /// Skip reads but store fresh results
    Refresh,
    /// Neither read nor write
    Bypass,
}

impl CachePolicy {
    pub fn reads(&self) -> bool {
        matches!(self, CachePolicy::Use)
    }

    pub fn writes(&self) -> bool {
        matches!(self, CachePolicy::Use | CachePolicy::Refresh)
    }
}

impl std::str::FromStr for CachePolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "use" => Ok(CachePolicy::Use),
            "refresh" => Ok(CachePolicy::Refresh),
            "bypass" | "off" => Ok(CachePolicy::Bypass),
            _ => Err(DomainError::UnknownCachePolicy(s.to_string())),
        }
    }
}

/// Options controlling one Ultra run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOptions {
    /// Overall deadline for the whole request, across all stages
    pub timeout: Duration,
    pub cache_policy: CachePolicy,
    pub include_diagnostics: bool,
    pub enable_peer_review: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            cache_policy: CachePolicy::Use,
            include_diagnostics: true,
            enable_peer_review: true,
        }
    }
}

impl RequestOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = policy;
        self
    }

    pub fn without_peer_review(mut self) -> Self {
        self.enable_peer_review = false;
        self
    }

    pub fn without_diagnostics(mut self) -> Self {
        self.include_diagnostics = false;
        self
    }
}
