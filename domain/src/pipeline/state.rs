//! Pipeline state machine
//!
//! ```text
//! Initial ──(≥2 ok, review on)──▶ PeerReview ──▶ Synthesis ──▶ Done
//!    │                                              ▲
//!    ├──(1 ok, or review off)── skip PeerReview ────┘
//!    └──(0 ok)──▶ abort (AllProvidersFailed)
//! ```
//!
//! Transitions are plain data so the controller never branches on stage
//! ordering itself; it asks [`PipelineState::next`] and records whatever
//! skip the answer carries.

use crate::pipeline::stage::Stage;
use serde::{Deserialize, Serialize};

/// Where the controller is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Initial,
    PeerReview,
    Synthesis,
    Done,
}

/// Why a stage did not run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Peer review needs at least two answers to compare
    InsufficientResponses { succeeded: usize },
    /// The request turned peer review off
    DisabledByRequest,
}

impl SkipReason {
    pub fn message(&self) -> String {
        match self {
            SkipReason::InsufficientResponses { succeeded } => format!(
                "fewer than two successful initial responses ({} succeeded)",
                succeeded
            ),
            SkipReason::DisabledByRequest => "peer review disabled by request options".to_string(),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// What the stage that just settled produced, as far as sequencing cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    pub succeeded: usize,
    pub peer_review_enabled: bool,
}

/// Decision returned by the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Run the given state next
    Enter(PipelineState),
    /// Record `stage` as skipped, then continue with `then`
    Skip {
        stage: Stage,
        reason: SkipReason,
        then: PipelineState,
    },
    /// Nothing survived; the request fails
    Abort,
}

impl PipelineState {
    /// The stage executed in this state, if any
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineState::Initial => Some(Stage::Initial),
            PipelineState::PeerReview => Some(Stage::PeerReview),
            PipelineState::Synthesis => Some(Stage::Synthesis),
            PipelineState::Done => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done)
    }

    /// Decide what follows this state once its stage has settled
    pub fn next(self, outcome: StageOutcome) -> Transition {
        match self {
            PipelineState::Initial => match outcome.succeeded {
                0 => Transition::Abort,
                _ if !outcome.peer_review_enabled => Transition::Skip {
                    stage: Stage::PeerReview,
                    reason: SkipReason::DisabledByRequest,
                    then: PipelineState::Synthesis,
                },
                1 => Transition::Skip {
                    stage: Stage::PeerReview,
                    reason: SkipReason::InsufficientResponses { succeeded: 1 },
                    then: PipelineState::Synthesis,
                },
                _ => Transition::Enter(PipelineState::PeerReview),
            },
            // Revision failures fall back to initial answers, so peer review
            // can never reduce the survivor count to zero.
            PipelineState::PeerReview => Transition::Enter(PipelineState::Synthesis),
            PipelineState::Synthesis | PipelineState::Done => {
                Transition::Enter(PipelineState::Done)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(succeeded: usize, peer_review_enabled: bool) -> StageOutcome {
        StageOutcome {
            succeeded,
            peer_review_enabled,
        }
    }

    #[test]
    fn test_initial_with_two_successes_enters_peer_review() {
        assert_eq!(
            PipelineState::Initial.next(outcome(2, true)),
            Transition::Enter(PipelineState::PeerReview)
        );
    }

    #[test]
    fn test_initial_with_one_success_skips_peer_review() {
        let t = PipelineState::Initial.next(outcome(1, true));
        assert_eq!(
            t,
            Transition::Skip {
                stage: Stage::PeerReview,
                reason: SkipReason::InsufficientResponses { succeeded: 1 },
                then: PipelineState::Synthesis,
            }
        );
    }

    #[test]
    fn test_initial_with_review_disabled_skips_with_reason() {
        match PipelineState::Initial.next(outcome(3, false)) {
            Transition::Skip { reason, then, .. } => {
                assert_eq!(reason, SkipReason::DisabledByRequest);
                assert_eq!(then, PipelineState::Synthesis);
            }
            other => panic!("unexpected transition {:?}", other),
        }
    }

    #[test]
    fn test_initial_with_no_success_aborts() {
        assert_eq!(PipelineState::Initial.next(outcome(0, true)), Transition::Abort);
    }

    #[test]
    fn test_later_states_advance_in_order() {
        assert_eq!(
            PipelineState::PeerReview.next(outcome(0, true)),
            Transition::Enter(PipelineState::Synthesis)
        );
        assert_eq!(
            PipelineState::Synthesis.next(outcome(1, true)),
            Transition::Enter(PipelineState::Done)
        );
        assert!(PipelineState::Done.is_terminal());
        assert_eq!(PipelineState::Done.stage(), None);
    }

    #[test]
    fn test_skip_reason_message_mentions_count() {
        let reason = SkipReason::InsufficientResponses { succeeded: 1 };
        assert!(reason.message().starts_with("fewer than two successful initial responses"));
    }
}
