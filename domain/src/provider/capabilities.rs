//! Capability declaration of a provider adapter

use serde::{Deserialize, Serialize};

/// What an adapter can do, as reported by `describe()`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Maximum context length in tokens
    pub max_context_tokens: u32,
    /// Whether `stream_generate` yields incremental chunks
    pub supports_streaming: bool,
    /// USD per 1K prompt tokens (0.0 for local runners and mocks)
    pub cost_per_1k_input_tokens: f64,
    /// USD per 1K completion tokens
    pub cost_per_1k_output_tokens: f64,
}

impl Capabilities {
    pub fn new(max_context_tokens: u32) -> Self {
        Self {
            max_context_tokens,
            supports_streaming: false,
            cost_per_1k_input_tokens: 0.0,
            cost_per_1k_output_tokens: 0.0,
        }
    }

    pub fn with_streaming(mut self) -> Self {
        self.supports_streaming = true;
        self
    }

    pub fn with_cost(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.cost_per_1k_input_tokens = input_per_1k;
        self.cost_per_1k_output_tokens = output_per_1k;
        self
    }

    /// Estimated cost of a call in USD
    pub fn estimate_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        (prompt_tokens as f64 / 1000.0) * self.cost_per_1k_input_tokens
            + (completion_tokens as f64 / 1000.0) * self.cost_per_1k_output_tokens
    }
}
