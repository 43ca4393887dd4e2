//! Run Ultra use case
//!
//! Drives one request through the stage state machine:
//! Initial fan-out, optional peer review, then synthesis by the designated
//! model. Stage sequencing is delegated to [`PipelineState::next`]; this
//! module only executes stages and records their results.

use crate::cache::ResponseCache;
use crate::circuit::CircuitBreakers;
use crate::config::{PipelineDefaults, UltraConfig};
use crate::ports::progress::{NoProgress, ProgressNotifier};
use crate::ports::resolver::ProviderResolver;
use crate::use_cases::dispatch::{DispatchPlan, Dispatcher};
use std::cmp::Reverse;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use ultra_domain::{
    Diagnostics, DomainError, GenerationParams, InboundRequest, ModelId, OutboundResponse,
    PipelineState, PromptTemplate, ProviderErrorKind, ProviderResult, Request, ResultOrigin,
    Stage, StageOutcome, StageResult, Transition, UltraResponse,
};

/// Errors that end a run without a synthesized answer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] DomainError),

    #[error("Unknown model: {0}")]
    UnknownModel(ModelId),

    #[error("All providers failed to respond")]
    AllProvidersFailed { stage: Box<StageResult> },

    #[error("Operation cancelled")]
    Cancelled,
}

impl PipelineError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PipelineError::Cancelled)
    }

    /// Diagnostics worth returning alongside the error, if any were gathered
    pub fn diagnostics(&self) -> Option<Diagnostics> {
        match self {
            PipelineError::AllProvidersFailed { stage } => {
                Some(Diagnostics::from_failed_stage(stage))
            }
            _ => None,
        }
    }
}

/// An answer carried forward between stages
#[derive(Debug, Clone, PartialEq)]
struct Survivor {
    model: ModelId,
    text: String,
    revised: bool,
    origin: ResultOrigin,
    latency_ms: u64,
}

impl Survivor {
    fn from_result(result: &ProviderResult, revised: bool) -> Option<Self> {
        if !result.is_ok() {
            return None;
        }
        let text = result.text()?;
        Some(Self {
            model: result.model_id.clone(),
            text: if revised {
                extract_revision(text)
            } else {
                text.to_string()
            },
            revised,
            origin: result.origin,
            latency_ms: result.latency_ms,
        })
    }

    /// Fallback preference: revised, then non-mock, then longer, then faster
    fn rank(&self) -> (bool, bool, usize, Reverse<u64>) {
        (
            self.revised,
            self.origin != ResultOrigin::Mock,
            self.text.len(),
            Reverse(self.latency_ms),
        )
    }
}

/// The part of a peer review answer after the revision heading
fn extract_revision(text: &str) -> String {
    match text.find(PromptTemplate::REVISION_HEADING) {
        Some(pos) => {
            let revision = text[pos + PromptTemplate::REVISION_HEADING.len()..].trim();
            if revision.is_empty() {
                text.trim().to_string()
            } else {
                revision.to_string()
            }
        }
        None => text.trim().to_string(),
    }
}

/// Highest-confidence survivor; earlier survivors win ties
fn best_survivor(survivors: &[Survivor]) -> Option<&Survivor> {
    survivors.iter().rev().max_by_key(|s| s.rank())
}

/// Use case for running the Ultra pipeline
pub struct RunUltraUseCase {
    dispatcher: Dispatcher,
    defaults: PipelineDefaults,
}

impl RunUltraUseCase {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            defaults: PipelineDefaults::default(),
        }
    }

    /// Build the dispatcher (cache, circuit breakers, retry) from configuration
    pub fn from_config(resolver: Arc<dyn ProviderResolver>, config: &UltraConfig) -> Self {
        let mut dispatcher = Dispatcher::new(resolver, &config.dispatch)
            .with_breakers(Arc::new(CircuitBreakers::new(config.circuit_breaker)));
        if config.cache.enabled {
            dispatcher = dispatcher.with_cache(Arc::new(ResponseCache::new(&config.cache)));
        }

        Self {
            dispatcher,
            defaults: config.pipeline.clone(),
        }
    }

    pub fn with_defaults(mut self, defaults: PipelineDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &PipelineDefaults {
        &self.defaults
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Execute the use case with default (no-op) progress
    pub async fn execute(&self, request: Request) -> Result<UltraResponse, PipelineError> {
        self.execute_with_progress(request, &NoProgress, &CancellationToken::new())
            .await
    }

    /// Execute the use case with progress callbacks and cancellation
    pub async fn execute_with_progress(
        &self,
        request: Request,
        progress: &dyn ProgressNotifier,
        cancel: &CancellationToken,
    ) -> Result<UltraResponse, PipelineError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                warn!("Ultra run cancelled");
                Err(PipelineError::Cancelled)
            }
            result = self.run(&request, progress) => result,
        }
    }

    /// Boundary entry point: validate an inbound request, run it, and wrap
    /// the outcome in the outbound envelope.
    pub async fn respond(
        &self,
        inbound: InboundRequest,
        progress: &dyn ProgressNotifier,
        cancel: &CancellationToken,
    ) -> OutboundResponse {
        let inbound = self.defaults.fill(inbound);
        let request =
            match inbound.into_request(&self.defaults.options, self.defaults.default_pattern) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Rejected request: {}", e);
                    return OutboundResponse::failure(e.to_string(), None);
                }
            };

        let include_diagnostics = request.options().include_diagnostics;
        match self.execute_with_progress(request, progress, cancel).await {
            Ok(response) => OutboundResponse::from_response(&response, include_diagnostics),
            Err(e) => {
                let diagnostics = if include_diagnostics {
                    e.diagnostics()
                } else {
                    None
                };
                OutboundResponse::failure(e.to_string(), diagnostics)
            }
        }
    }

    /// Every model must resolve before anything is dispatched
    fn validate(&self, request: &Request) -> Result<(), PipelineError> {
        let resolver = self.dispatcher.resolver();
        for model in request.model_ids() {
            if resolver.resolve(model).is_err() {
                return Err(PipelineError::UnknownModel(model.clone()));
            }
        }
        Ok(())
    }

    async fn run(
        &self,
        request: &Request,
        progress: &dyn ProgressNotifier,
    ) -> Result<UltraResponse, PipelineError> {
        self.validate(request)?;

        let started = Instant::now();
        let deadline = started + request.options().timeout;

        info!(
            models = request.model_ids().len(),
            synthesizer = %request.synthesizer_id(),
            pattern = request.pattern().as_str(),
            "Starting Ultra run"
        );

        let mut stages: Vec<StageResult> = Vec::new();
        let mut survivors: Vec<Survivor> = Vec::new();
        let mut synthesis = String::new();
        let mut fallback_model: Option<ModelId> = None;
        let mut state = PipelineState::Initial;

        loop {
            let transition = match state {
                PipelineState::Initial => {
                    let stage = self.stage_initial(request, deadline, progress).await;
                    survivors = stage
                        .inputs
                        .iter()
                        .filter_map(|r| Survivor::from_result(r, false))
                        .collect();
                    stages.push(stage);
                    state.next(StageOutcome {
                        succeeded: survivors.len(),
                        peer_review_enabled: request.options().enable_peer_review,
                    })
                }
                PipelineState::PeerReview => {
                    let stage = self
                        .stage_peer_review(request, &survivors, deadline, progress)
                        .await;
                    survivors = revise(survivors, &stage);
                    stages.push(stage);
                    state.next(StageOutcome {
                        succeeded: survivors.len(),
                        peer_review_enabled: true,
                    })
                }
                PipelineState::Synthesis => {
                    let (stage, fallback) = self
                        .stage_synthesis(request, &survivors, deadline, progress)
                        .await?;
                    synthesis = stage.output.clone().unwrap_or_default();
                    fallback_model = fallback;
                    stages.push(stage);
                    state.next(StageOutcome {
                        succeeded: 1,
                        peer_review_enabled: request.options().enable_peer_review,
                    })
                }
                PipelineState::Done => break,
            };

            state = match transition {
                Transition::Enter(next) => next,
                Transition::Skip {
                    stage,
                    reason,
                    then,
                } => {
                    info!(stage = stage.as_str(), "Skipping stage: {}", reason);
                    progress.on_stage_skipped(stage, &reason);
                    stages.push(StageResult::skipped(stage, &reason));
                    then
                }
                Transition::Abort => {
                    warn!("Every model failed in the initial stage");
                    let failed = stages
                        .pop()
                        .unwrap_or_else(|| StageResult::completed(Stage::Initial, Vec::new()));
                    return Err(PipelineError::AllProvidersFailed {
                        stage: Box::new(failed),
                    });
                }
            };
        }

        let response = UltraResponse::assemble(
            request,
            stages,
            synthesis,
            fallback_model,
            started.elapsed(),
        );

        info!(
            status = response.status.as_str(),
            degraded = response.degraded,
            unavailable = response.unavailable_models.len(),
            mocked = response.mocked_models.len(),
            total_latency_ms = response.total_latency_ms,
            "Ultra run complete"
        );
        Ok(response)
    }

    fn plan(&self, stage: Stage, request: &Request, deadline: Instant) -> DispatchPlan {
        DispatchPlan::new(stage, deadline).with_cache_policy(request.options().cache_policy)
    }

    /// Stage 1: every model answers the prompt independently
    async fn stage_initial(
        &self,
        request: &Request,
        deadline: Instant,
        progress: &dyn ProgressNotifier,
    ) -> StageResult {
        info!("Stage 1: Initial");
        progress.on_stage_start(Stage::Initial, request.model_ids().len());

        let plan = self.plan(Stage::Initial, request, deadline).with_params(
            GenerationParams::default().with_system_prompt(PromptTemplate::initial_system()),
        );
        let prompt = PromptTemplate::initial_query(request.prompt().content());
        let outcome = self
            .dispatcher
            .dispatch(request.model_ids(), &prompt, &plan, progress)
            .await;

        let stage = StageResult::completed(Stage::Initial, outcome.into_results());
        debug!(
            succeeded = stage.successes().count(),
            failed = stage.failures().count(),
            "Initial stage settled"
        );
        progress.on_stage_complete(&stage);
        stage
    }

    /// Stage 2: each survivor reads the others' answers and revises its own
    async fn stage_peer_review(
        &self,
        request: &Request,
        survivors: &[Survivor],
        deadline: Instant,
        progress: &dyn ProgressNotifier,
    ) -> StageResult {
        info!("Stage 2: Peer Review");

        let calls: Vec<(ModelId, String)> = survivors
            .iter()
            .enumerate()
            .map(|(i, own)| {
                let others: Vec<String> = survivors
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, s)| s.text.clone())
                    .collect();
                let labeled = PromptTemplate::anonymize(&others);
                let prompt = PromptTemplate::peer_review_prompt(
                    request.prompt().content(),
                    &own.text,
                    &labeled,
                );
                (own.model.clone(), prompt)
            })
            .collect();

        progress.on_stage_start(Stage::PeerReview, calls.len());

        let plan = self.plan(Stage::PeerReview, request, deadline).with_params(
            GenerationParams::default().with_system_prompt(PromptTemplate::peer_review_system()),
        );
        let outcome = self.dispatcher.dispatch_prompts(calls, &plan, progress).await;

        let mut stage = StageResult::completed(Stage::PeerReview, outcome.into_results())
            .with_survivors(survivors.iter().map(|s| s.model.clone()).collect());
        let failed = stage.failures().count();
        if failed > 0 {
            warn!(failed, "Some revisions failed; keeping their initial answers");
            stage = stage.with_note(format!(
                "{} revision(s) failed; initial answers kept",
                failed
            ));
        }

        progress.on_stage_complete(&stage);
        stage
    }

    /// Stage 3: the synthesizer folds the survivors into one answer
    ///
    /// On synthesizer failure the best survivor is returned instead and its
    /// model id is reported as the fallback.
    async fn stage_synthesis(
        &self,
        request: &Request,
        survivors: &[Survivor],
        deadline: Instant,
        progress: &dyn ProgressNotifier,
    ) -> Result<(StageResult, Option<ModelId>), PipelineError> {
        info!("Stage 3: Synthesis");
        progress.on_stage_start(Stage::Synthesis, 1);

        let revised = survivors.iter().any(|s| s.revised);
        let answers: Vec<(String, String)> = survivors
            .iter()
            .map(|s| (s.model.to_string(), s.text.clone()))
            .collect();
        let prompt = PromptTemplate::synthesis_prompt(
            request.prompt().content(),
            request.pattern(),
            &answers,
            revised,
        );

        let plan = self.plan(Stage::Synthesis, request, deadline).with_params(
            GenerationParams::default()
                .with_system_prompt(PromptTemplate::synthesis_system(request.pattern())),
        );
        let synthesizer = request.synthesizer_id().clone();
        let result = self
            .dispatcher
            .dispatch(std::slice::from_ref(&synthesizer), &prompt, &plan, progress)
            .await
            .into_results()
            .into_iter()
            .next()
            .unwrap_or_else(|| {
                ProviderResult::error(
                    synthesizer.clone(),
                    Stage::Synthesis,
                    ProviderErrorKind::ProviderUnavailable,
                    "synthesizer was not dispatched",
                    Duration::ZERO,
                )
            });

        if result.is_ok()
            && let Some(text) = result.text().map(str::to_string)
        {
            let stage = StageResult::completed(Stage::Synthesis, vec![result]).with_output(text);
            progress.on_stage_complete(&stage);
            return Ok((stage, None));
        }

        let reason = format!(
            "synthesizer_failed: {} ({})",
            result
                .error_kind()
                .unwrap_or(ProviderErrorKind::MalformedResponse),
            result.error_message().unwrap_or("no text returned")
        );
        let Some(best) = best_survivor(survivors) else {
            let stage = StageResult::completed(Stage::Synthesis, vec![result]).with_note(reason);
            return Err(PipelineError::AllProvidersFailed {
                stage: Box::new(stage),
            });
        };

        warn!(
            synthesizer = %synthesizer,
            fallback = %best.model,
            "Synthesizer failed, falling back to best surviving answer"
        );
        let stage = StageResult::completed(Stage::Synthesis, vec![result])
            .with_survivors(vec![best.model.clone()])
            .with_output(best.text.clone())
            .with_note(format!("{}; fell back to {}", reason, best.model));
        progress.on_stage_complete(&stage);
        Ok((stage, Some(best.model.clone())))
    }
}

/// Replace each survivor's answer with its revision when the revision succeeded
fn revise(survivors: Vec<Survivor>, stage: &StageResult) -> Vec<Survivor> {
    survivors
        .into_iter()
        .map(|initial| {
            stage
                .result_for(&initial.model)
                .and_then(|r| Survivor::from_result(r, true))
                .unwrap_or(initial)
        })
        .collect()
}
