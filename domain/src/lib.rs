//! Domain layer for ultra
//!
//! This crate contains the core types of the orchestration pipeline.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! ## Ultra synthesis
//!
//! One prompt is fanned out to several independent providers, the survivors
//! optionally revise their answers after reading each other's output, and a
//! designated synthesizer folds everything into a single "Ultra" answer.
//!
//! - [`Request`] - validated input (prompt, model set, synthesizer, pattern)
//! - [`ProviderResult`] - one immutable outcome of one adapter call
//! - [`StageResult`] - everything one pipeline stage produced
//! - [`UltraResponse`] - the final envelope with per-stage diagnostics

pub mod config;
pub mod core;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod request;

// Re-export commonly used types
pub use config::{ConfigIssue, ConfigIssueCode, OutputFormat, Severity};
pub use core::{error::DomainError, model::ModelId, prompt::Prompt};
pub use pipeline::{
    diagnostics::{FailedModel, StageDiagnostics, StageResult},
    response::{ResponseStatus, UltraResponse},
    stage::Stage,
    state::{PipelineState, SkipReason, StageOutcome, Transition},
};
pub use prompt::PromptTemplate;
pub use provider::{
    capabilities::Capabilities,
    params::GenerationParams,
    result::{ProviderErrorKind, ProviderResult, ResultOrigin, ResultStatus, TokenUsage},
    stream::StreamEvent,
};
pub use request::{
    boundary::{Diagnostics, InboundOptions, InboundRequest, OutboundResponse, OutboundStatus},
    options::{CachePolicy, RequestOptions},
    pattern::AnalysisPattern,
    request::Request,
};
