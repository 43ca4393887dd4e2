//! Progress notification port
//!
//! Defines the interface for reporting progress during an Ultra run.

use ultra_domain::{ProviderResult, SkipReason, Stage, StageResult};

/// Callback for progress updates during pipeline execution
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, web UI, etc.)
pub trait ProgressNotifier: Send + Sync {
    /// Called when a stage starts
    fn on_stage_start(&self, stage: Stage, total_tasks: usize);

    /// Called when a single model call settles within a stage
    fn on_task_complete(&self, stage: Stage, result: &ProviderResult);

    /// Called when a stage completes
    fn on_stage_complete(&self, result: &StageResult);

    /// Called when the controller decides not to run a stage
    fn on_stage_skipped(&self, _stage: Stage, _reason: &SkipReason) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_stage_start(&self, _stage: Stage, _total_tasks: usize) {}
    fn on_task_complete(&self, _stage: Stage, _result: &ProviderResult) {}
    fn on_stage_complete(&self, _result: &StageResult) {}
}
