//! Model identifier value object

use crate::core::error::DomainError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of one provider+model pair (Value Object)
///
/// Opaque to the pipeline: it is only ever compared, hashed and resolved
/// through the provider registry. By convention ids are written as
/// `provider:model` (`openai:gpt-4o`, `ollama:llama3`), and the part before
/// the first `:` is the *provider hint* used for routing and per-provider
/// concurrency limits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(String);

impl ModelId {
    /// Create a new model id
    ///
    /// # Panics
    /// Panics if the id is empty or only whitespace
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        assert!(!id.trim().is_empty(), "Model id cannot be empty");
        Self(id.trim().to_string())
    }

    /// Try to create a model id, returning None if invalid
    pub fn try_new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Build an id from its provider and model parts
    pub fn from_parts(provider: &str, model: &str) -> Self {
        Self::new(format!("{}:{}", provider.trim(), model.trim()))
    }

    /// Get the string identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Provider part of the id (the whole id when there is no `:`)
    pub fn provider_hint(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(p, _)| p)
    }

    /// Model part of the id, as the provider's API expects it
    pub fn model_name(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(_, m)| m)
    }
}

impl std::fmt::Display for ModelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ModelId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_new(s).ok_or_else(|| DomainError::InvalidModel(s.to_string()))
    }
}

impl From<&str> for ModelId {
    fn from(s: &str) -> Self {
        ModelId::new(s)
    }
}

impl Serialize for ModelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_hint_and_model_name() {
        let id = ModelId::new("openai:gpt-4o");
        assert_eq!(id.provider_hint(), "openai");
        assert_eq!(id.model_name(), "gpt-4o");
    }

    #[test]
    fn test_id_without_provider() {
        let id = ModelId::new("A");
        assert_eq!(id.provider_hint(), "A");
        assert_eq!(id.model_name(), "A");
    }

    #[test]
    fn test_model_name_keeps_later_colons() {
        let id = ModelId::new("ollama:llama3:8b");
        assert_eq!(id.provider_hint(), "ollama");
        assert_eq!(id.model_name(), "llama3:8b");
    }

    #[test]
    fn test_parse_rejects_blank() {
        assert!("   ".parse::<ModelId>().is_err());
        assert_eq!(" a:b ".parse::<ModelId>().unwrap().as_str(), "a:b");
    }

    #[test]
    fn test_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<ModelId>("\"\"").is_err());
        let id: ModelId = serde_json::from_str("\"anthropic:claude\"").unwrap();
        assert_eq!(id, ModelId::from_parts("anthropic", "claude"));
    }
}
