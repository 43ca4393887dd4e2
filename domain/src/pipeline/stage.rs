//! Pipeline stage identifier

use serde::{Deserialize, Serialize};

/// Stage of an Ultra run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Initial generation - every model answers the prompt
    Initial,
    /// Peer review - models critique each other and revise their answers
    PeerReview,
    /// Synthesis - the synthesizer folds surviving answers into one
    Synthesis,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Initial => "initial",
            Stage::PeerReview => "peer_review",
            Stage::Synthesis => "synthesis",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Stage::Initial => "Initial Generation",
            Stage::PeerReview => "Peer Review",
            Stage::Synthesis => "Ultra Synthesis",
        }
    }

    /// 1-based position in the pipeline
    pub fn ordinal(&self) -> usize {
        match self {
            Stage::Initial => 1,
            Stage::PeerReview => 2,
            Stage::Synthesis => 3,
        }
    }

    pub fn all() -> [Stage; 3] {
        [Stage::Initial, Stage::PeerReview, Stage::Synthesis]
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
