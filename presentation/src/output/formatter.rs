//! Output formatter trait

use ultra_domain::{OutboundResponse, OutputFormat};

/// Trait for formatting Ultra responses
pub trait OutputFormatter {
    /// Synthesis followed by per-stage diagnostics
    fn format(&self, response: &OutboundResponse) -> String;

    /// Format as JSON
    fn format_json(&self, response: &OutboundResponse) -> String;

    /// Format synthesis only (concise output)
    fn format_synthesis_only(&self, response: &OutboundResponse) -> String;

    /// Dispatch on the selected format
    fn render(&self, response: &OutboundResponse, format: OutputFormat) -> String {
        match format {
            OutputFormat::Full => self.format(response),
            OutputFormat::Synthesis => self.format_synthesis_only(response),
            OutputFormat::Json => self.format_json(response),
        }
    }
}
