//! Prompt value object

use crate::core::string::collapse_whitespace;
use serde::{Deserialize, Serialize};

/// The user's prompt (Value Object)
///
/// Never empty. [`normalized`](Prompt::normalized) is the form used for
/// cache keys, so prompts that differ only in whitespace share a cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Prompt {
    content: String,
}

impl Prompt {
    /// Create a new prompt
    ///
    /// # Panics
    /// Panics if the content is empty or only whitespace
    pub fn new(content: impl Into<String>) -> Self {
        let content = content.into();
        assert!(!content.trim().is_empty(), "Prompt cannot be empty");
        Self { content }
    }

    /// Try to create a new prompt, returning None if invalid
    pub fn try_new(content: impl Into<String>) -> Option<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            None
        } else {
            Some(Self { content })
        }
    }

    /// Get the prompt content as the user wrote it
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Trimmed content with internal whitespace runs collapsed to one space
    pub fn normalized(&self) -> String {
        collapse_whitespace(&self.content)
    }
}

impl std::fmt::Display for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.content)
    }
}

impl From<&str> for Prompt {
    fn from(s: &str) -> Self {
        Prompt::new(s)
    }
}
