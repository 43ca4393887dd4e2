//! Output format value object

use serde::{Deserialize, Serialize};

/// How an Ultra response is rendered by the front-end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Synthesis followed by per-stage diagnostics
    Full,
    /// Only the final synthesis (default)
    #[default]
    Synthesis,
    /// The outbound JSON envelope
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_synthesis() {
        assert_eq!(OutputFormat::default(), OutputFormat::Synthesis);
    }

    #[test]
    fn test_deserialize_lowercase() {
        let format: OutputFormat = serde_json::from_str("\"json\"").unwrap();
        assert_eq!(format, OutputFormat::Json);
    }
}
