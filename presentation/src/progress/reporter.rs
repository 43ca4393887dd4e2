//! Progress reporting for Ultra execution

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::Mutex;
use ultra_application::ProgressNotifier;
use ultra_domain::{ProviderResult, ResultOrigin, SkipReason, Stage, StageResult};

/// Reports progress during an Ultra run with progress bars on stderr
pub struct ProgressReporter {
    multi: MultiProgress,
    stage_bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            stage_bar: Mutex::new(None),
        }
    }

    fn stage_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-")
    }

    fn stage_display_name(stage: Stage) -> String {
        format!("Stage {}: {}", stage.ordinal(), stage.display_name())
    }

    fn stage_short_name(stage: Stage) -> String {
        format!("Stage {}", stage.ordinal())
    }

    fn task_line(result: &ProviderResult) -> String {
        let tag = match result.origin {
            ResultOrigin::Live => "",
            ResultOrigin::Cached => " (cached)",
            ResultOrigin::Mock => " (mock)",
            ResultOrigin::ShortCircuit => " (circuit open)",
        };
        if result.is_ok() {
            format!("{} {}{}", "v".green(), result.model_id, tag)
        } else {
            let kind = result
                .error_kind()
                .map(|k| k.as_str())
                .unwrap_or("error");
            format!("{} {} [{}]{}", "x".red(), result.model_id, kind, tag)
        }
    }

    fn with_bar(&self, f: impl FnOnce(&mut Option<ProgressBar>)) {
        if let Ok(mut guard) = self.stage_bar.lock() {
            f(&mut guard);
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_stage_start(&self, stage: Stage, total_tasks: usize) {
        let pb = self.multi.add(ProgressBar::new(total_tasks as u64));
        pb.set_style(Self::stage_style());
        pb.set_prefix(Self::stage_display_name(stage));
        pb.set_message("Starting...");
        self.with_bar(|bar| *bar = Some(pb));
    }

    fn on_task_complete(&self, _stage: Stage, result: &ProviderResult) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.as_ref() {
                pb.set_message(Self::task_line(result));
                pb.inc(1);
            }
        });
    }

    fn on_stage_complete(&self, result: &StageResult) {
        self.with_bar(|bar| {
            if let Some(pb) = bar.take() {
                let ok = result.successes().count();
                pb.finish_with_message(format!(
                    "{} complete ({}/{} ok)",
                    Self::stage_short_name(result.stage).green(),
                    ok,
                    result.inputs.len()
                ));
            }
        });
    }

    fn on_stage_skipped(&self, stage: Stage, reason: &SkipReason) {
        let _ = self.multi.println(format!(
            "{} {} skipped: {}",
            "-".dimmed(),
            Self::stage_display_name(stage),
            reason.message()
        ));
    }
}

/// Simple text-based progress on stderr (no fancy UI)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_stage_start(&self, stage: Stage, total_tasks: usize) {
        eprintln!(
            "{} {} ({} tasks)",
            "->".cyan(),
            ProgressReporter::stage_display_name(stage).bold(),
            total_tasks
        );
    }

    fn on_task_complete(&self, _stage: Stage, result: &ProviderResult) {
        eprintln!("  {}", ProgressReporter::task_line(result));
    }

    fn on_stage_complete(&self, _result: &StageResult) {
        eprintln!();
    }

    fn on_stage_skipped(&self, stage: Stage, reason: &SkipReason) {
        eprintln!(
            "{} {} skipped: {}",
            "->".dimmed(),
            ProgressReporter::stage_display_name(stage),
            reason.message()
        );
    }
}
