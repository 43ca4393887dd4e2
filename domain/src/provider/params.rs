//! Generation parameters sent along with a prompt

use serde::{Deserialize, Serialize};

/// Per-call generation parameters
///
/// Part of the response cache key: two calls hit the same entry only when
/// their parameters are identical.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on completion tokens (adapter default when `None`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// System prompt for this call
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

impl GenerationParams {
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Stable textual form used when hashing cache keys
    pub fn fingerprint(&self) -> String {
        format!(
            "max_tokens={};temperature={};system={}",
            self.max_tokens.map(|t| t.to_string()).unwrap_or_default(),
            self.temperature.map(|t| t.to_string()).unwrap_or_default(),
            self.system_prompt.as_deref().unwrap_or_default()
        )
    }
}
