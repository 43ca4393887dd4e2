//! Provider resolution port
//!
//! The dispatcher looks adapters up by [`ModelId`] through this trait; the
//! provider registry in the infrastructure layer implements it.

use super::provider_adapter::ProviderAdapter;
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;
use ultra_domain::ModelId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),
}

/// Adapter bound to a model id
#[derive(Clone)]
pub struct Binding {
    pub adapter: Arc<dyn ProviderAdapter>,
    /// Provider name used for concurrency limits and logging
    pub provider: String,
    /// True when a mock adapter stands in for the real provider
    pub mocked: bool,
}

impl Binding {
    pub fn new(adapter: Arc<dyn ProviderAdapter>, provider: impl Into<String>) -> Self {
        Self {
            adapter,
            provider: provider.into(),
            mocked: false,
        }
    }

    pub fn mocked(mut self) -> Self {
        self.mocked = true;
        self
    }
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("provider", &self.provider)
            .field("mocked", &self.mocked)
            .finish_non_exhaustive()
    }
}

/// Lookup table from model id to adapter
pub trait ProviderResolver: Send + Sync {
    fn resolve(&self, model: &ModelId) -> Result<Binding, ResolveError>;

    /// Every model id that currently resolves
    fn list_available(&self) -> BTreeSet<ModelId>;
}
