//! Adapter for a model that is configured but cannot be called

use async_trait::async_trait;
use ultra_application::{AdapterError, Generation, ProviderAdapter};
use ultra_domain::{Capabilities, GenerationParams};

/// Fails every call with `ProviderUnavailable`
#[derive(Debug, Clone)]
pub struct UnavailableAdapter {
    reason: String,
}

impl UnavailableAdapter {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ProviderAdapter for UnavailableAdapter {
    async fn generate(
        &self,
        _prompt: &str,
        _params: &GenerationParams,
    ) -> Result<Generation, AdapterError> {
        Err(AdapterError::ProviderUnavailable(self.reason.clone()))
    }

    fn describe(&self) -> Capabilities {
        Capabilities::new(0)
    }
}
