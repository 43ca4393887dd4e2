//! Domain error types

use thiserror::Error;

/// Domain-level errors
///
/// Only these surface to the caller as a failed request. Everything that
/// goes wrong with an individual provider is carried inside a
/// [`ProviderResult`](crate::ProviderResult) instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Prompt cannot be empty")]
    EmptyPrompt,

    #[error("At least two distinct models are required, got {found}")]
    TooFewModels { found: usize },

    #[error("Invalid model id: {0}")]
    InvalidModel(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Unknown analysis pattern: {0}")]
    UnknownPattern(String),

    #[error("Unknown cache policy: {0}")]
    UnknownCachePolicy(String),

    #[error("All providers failed to respond")]
    AllProvidersFailed,

    #[error("Operation cancelled")]
    Cancelled,
}

impl DomainError {
    /// Check if this error represents a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DomainError::Cancelled)
    }

    /// Whether the request was rejected before anything was dispatched
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::EmptyPrompt
                | DomainError::TooFewModels { .. }
                | DomainError::InvalidModel(_)
                | DomainError::UnknownModel(_)
                | DomainError::UnknownPattern(_)
                | DomainError::UnknownCachePolicy(_)
        )
    }
}
