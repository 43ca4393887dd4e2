//! Console output formatter for Ultra responses

use crate::output::formatter::OutputFormatter;
use colored::Colorize;
use ultra_domain::{Diagnostics, OutboundResponse, OutboundStatus, StageDiagnostics};

/// Formats Ultra responses for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Format the synthesis with everything the diagnostics block records
    pub fn format(response: &OutboundResponse) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Ultra Results"));
        output.push('\n');
        output.push_str(&format!(
            "{} {}\n",
            "Status:".cyan().bold(),
            Self::status_label(response.status)
        ));

        if let Some(error) = &response.error {
            output.push_str(&format!("{} {}\n", "Error:".red().bold(), error));
        }

        if let Some(diag) = &response.diagnostics {
            output.push_str(&Self::summary(diag));
            for stage in &diag.stages {
                output.push_str(&Self::stage_section(stage));
            }
        }

        if !response.synthesis.is_empty() {
            output.push_str(&Self::section_header("Ultra Synthesis"));
            output.push_str(&format!("\n{}\n", response.synthesis));
        }

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON (the outbound envelope)
    pub fn format_json(response: &OutboundResponse) -> String {
        serde_json::to_string_pretty(response).unwrap_or_else(|_| "{}".to_string())
    }

    /// Format synthesis only (concise output)
    pub fn format_synthesis_only(response: &OutboundResponse) -> String {
        if let Some(error) = &response.error {
            return format!("{} {}\n", "Error:".red().bold(), error);
        }

        let mut output = String::new();
        output.push_str(&format!("{}\n\n", "=== Ultra Synthesis ===".cyan().bold()));
        output.push_str(&response.synthesis);
        output.push('\n');

        if response.status == OutboundStatus::PartialSuccess {
            output.push_str(&format!("\n{}", Self::partial_note(response.diagnostics.as_ref())));
        }
        output
    }

    fn status_label(status: OutboundStatus) -> String {
        match status {
            OutboundStatus::Success => "success".green().bold().to_string(),
            OutboundStatus::PartialSuccess => "partial_success".yellow().bold().to_string(),
            OutboundStatus::Error => "error".red().bold().to_string(),
        }
    }

    fn partial_note(diag: Option<&Diagnostics>) -> String {
        let mut reasons = Vec::new();
        if let Some(diag) = diag {
            if !diag.unavailable_models.is_empty() {
                reasons.push(format!("unavailable: {}", join(&diag.unavailable_models)));
            }
            if !diag.mocked_models.is_empty() {
                reasons.push(format!("mocked: {}", join(&diag.mocked_models)));
            }
            if let Some(model) = &diag.fallback_model {
                reasons.push(format!("synthesis fell back to {}", model));
            }
        }
        let line = if reasons.is_empty() {
            "(partial success)".to_string()
        } else {
            format!("(partial success; {})", reasons.join("; "))
        };
        format!("{}\n", line.dimmed())
    }

    fn summary(diag: &Diagnostics) -> String {
        let mut output = String::new();
        if let Some(pattern) = diag.pattern {
            output.push_str(&format!("{} {}\n", "Pattern:".cyan().bold(), pattern));
        }
        if let Some(synthesizer) = &diag.synthesizer {
            output.push_str(&format!("{} {}\n", "Synthesizer:".cyan().bold(), synthesizer));
        }
        if let Some(fallback) = &diag.fallback_model {
            output.push_str(&format!(
                "{} synthesis degraded, used {}\n",
                "Fallback:".yellow().bold(),
                fallback
            ));
        }
        if !diag.unavailable_models.is_empty() {
            output.push_str(&format!(
                "{} {}\n",
                "Unavailable:".yellow().bold(),
                join(&diag.unavailable_models)
            ));
        }
        if !diag.mocked_models.is_empty() {
            output.push_str(&format!(
                "{} {}\n",
                "Mocked:".yellow().bold(),
                join(&diag.mocked_models)
            ));
        }
        output.push_str(&format!(
            "{} {} ms\n",
            "Latency:".cyan().bold(),
            diag.total_latency_ms
        ));
        output
    }

    fn stage_section(stage: &StageDiagnostics) -> String {
        let mut output = Self::section_header(stage.stage.display_name());

        if stage.skipped {
            output.push_str(&format!(
                "  {} {}\n",
                "skipped:".dimmed(),
                stage.skip_reason.as_deref().unwrap_or("no reason recorded")
            ));
            return output;
        }

        for model in &stage.succeeded {
            let mut tags = Vec::new();
            if stage.cache_hits.contains(model) {
                tags.push("cached");
            }
            if stage.mocked.contains(model) {
                tags.push("mock");
            }
            let suffix = if tags.is_empty() {
                String::new()
            } else {
                format!(" ({})", tags.join(", ")).dimmed().to_string()
            };
            output.push_str(&format!("  {} {}{}\n", "v".green(), model, suffix));
        }
        for failed in &stage.failed {
            output.push_str(&format!(
                "  {} {} [{}] {}\n",
                "x".red(),
                failed.model_id,
                failed.kind,
                failed.message.dimmed()
            ));
        }
        if let Some(note) = &stage.note {
            output.push_str(&format!("  {} {}\n", "note:".dimmed(), note));
        }
        output
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl OutputFormatter for ConsoleFormatter {
    fn format(&self, response: &OutboundResponse) -> String {
        Self::format(response)
    }

    fn format_json(&self, response: &OutboundResponse) -> String {
        Self::format_json(response)
    }

    fn format_synthesis_only(&self, response: &OutboundResponse) -> String {
        Self::format_synthesis_only(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ultra_domain::{
        AnalysisPattern, FailedModel, ModelId, OutputFormat, ProviderErrorKind, Stage,
    };

    fn partial() -> OutboundResponse {
        let mut response = OutboundResponse::failure("", None);
        response.status = OutboundStatus::PartialSuccess;
        response.synthesis = "Entropy measures disorder.".to_string();
        response.error = None;
        response.diagnostics = Some(Diagnostics {
            pattern: Some(AnalysisPattern::Confidence),
            synthesizer: Some(ModelId::new("A")),
            degraded: false,
            fallback_model: None,
            stages: vec![
                StageDiagnostics {
                    stage: Stage::Initial,
                    attempted: vec![ModelId::new("A"), ModelId::new("B")],
                    succeeded: vec![ModelId::new("A")],
                    failed: vec![FailedModel {
                        model_id: ModelId::new("B"),
                        kind: ProviderErrorKind::Timeout,
                        message: "request deadline elapsed".to_string(),
                    }],
                    cache_hits: vec![],
                    mocked: vec![],
                    short_circuited: vec![],
                    skipped: false,
                    skip_reason: None,
                    note: None,
                },
                StageDiagnostics {
                    stage: Stage::PeerReview,
                    attempted: vec![],
                    succeeded: vec![],
                    failed: vec![],
                    cache_hits: vec![],
                    mocked: vec![],
                    short_circuited: vec![],
                    skipped: true,
                    skip_reason: Some("fewer than two successful initial responses".into()),
                    note: None,
                },
            ],
            unavailable_models: vec![ModelId::new("B")],
            mocked_models: vec![],
            total_latency_ms: 1200,
        });
        response
    }

    fn plain() {
        colored::control::set_override(false);
    }

    #[test]
    fn test_synthesis_only_notes_partial_success() {
        plain();
        let text = ConsoleFormatter::format_synthesis_only(&partial());
        assert!(text.contains("Entropy measures disorder."));
        assert!(text.contains("unavailable: B"));
    }

    #[test]
    fn test_full_lists_stages_and_failures() {
        plain();
        let text = ConsoleFormatter::format(&partial());
        assert!(text.contains("partial_success"));
        assert!(text.contains("Initial Generation"));
        assert!(text.contains("[timeout]"));
        assert!(text.contains("skipped: fewer than two"));
        assert!(text.contains("Ultra Synthesis"));
    }

    #[test]
    fn test_error_envelope() {
        plain();
        let response = OutboundResponse::failure("All providers failed to respond", None);
        let text = ConsoleFormatter::format_synthesis_only(&response);
        assert!(text.contains("All providers failed"));
        let full = ConsoleFormatter::format(&response);
        assert!(full.contains("error"));
    }

    #[test]
    fn test_render_json_dispatch() {
        let json = ConsoleFormatter.render(&partial(), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["status"], "partial_success");
        assert_eq!(value["diagnostics"]["unavailable_models"][0], "B");
    }
}
