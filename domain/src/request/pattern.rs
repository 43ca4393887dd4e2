//! Analysis patterns
//!
//! A pattern decides how the synthesizer is asked to combine the answers.
//! It changes prompt wording only; the pipeline shape is the same for all.

use crate::core::error::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPattern {
    /// Trust the collective first impression, keep it short
    Gut,
    /// Weigh claims by how many models support them and how strongly
    #[default]
    Confidence,
    /// Lead with weaknesses and errors found across answers
    Critique,
    /// Verify factual claims and flag unsupported ones
    FactCheck,
    /// Preserve distinct viewpoints instead of forcing consensus
    Perspective,
    /// Lay out outcomes under different assumptions
    Scenario,
}

impl AnalysisPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPattern::Gut => "gut",
            AnalysisPattern::Confidence => "confidence",
            AnalysisPattern::Critique => "critique",
            AnalysisPattern::FactCheck => "fact_check",
            AnalysisPattern::Perspective => "perspective",
            AnalysisPattern::Scenario => "scenario",
        }
    }

    pub fn all() -> [AnalysisPattern; 6] {
        [
            AnalysisPattern::Gut,
            AnalysisPattern::Confidence,
            AnalysisPattern::Critique,
            AnalysisPattern::FactCheck,
            AnalysisPattern::Perspective,
            AnalysisPattern::Scenario,
        ]
    }
}

impl std::fmt::Display for AnalysisPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AnalysisPattern {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::all()
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownPattern(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_lenient_about_case_and_dashes() {
        assert_eq!("Fact-Check".parse::<AnalysisPattern>().unwrap(), AnalysisPattern::FactCheck);
        assert_eq!(" confidence ".parse::<AnalysisPattern>().unwrap(), AnalysisPattern::Confidence);
    }

    #[test]
    fn test_unknown_pattern() {
        let err = "vibes".parse::<AnalysisPattern>().unwrap_err();
        assert_eq!(err, DomainError::UnknownPattern("vibes".to_string()));
    }

    #[test]
    fn test_every_pattern_parses_from_its_name() {
        for p in AnalysisPattern::all() {
            assert_eq!(p.as_str().parse::<AnalysisPattern>().unwrap(), p);
        }
    }
}
