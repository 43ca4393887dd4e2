//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use ultra_domain::{InboundOptions, InboundRequest, OutputFormat};

/// Output format for Ultra results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormatArg {
    /// Synthesis followed by per-stage diagnostics
    Full,
    /// Only the final synthesis
    Synthesis,
    /// The outbound JSON envelope
    Json,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Full => OutputFormat::Full,
            OutputFormatArg::Synthesis => OutputFormat::Synthesis,
            OutputFormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Cache policy override
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheArg {
    /// Read hits and store fresh results
    Use,
    /// Ignore cached results but store fresh ones
    Refresh,
    /// Neither read nor write the cache
    Bypass,
}

impl CacheArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheArg::Use => "use",
            CacheArg::Refresh => "refresh",
            CacheArg::Bypass => "bypass",
        }
    }
}

/// CLI arguments for ultra
#[derive(Parser, Debug)]
#[command(name = "ultra")]
#[command(author, version, about = "Ultra - one prompt, several LLMs, one synthesized answer")]
#[command(long_about = r#"
Ultra sends a prompt to several LLM providers and folds their answers into one.

The pipeline has three stages:
1. Initial Generation: every model answers the prompt in parallel
2. Peer Review: each model revises its answer after reading the others
3. Ultra Synthesis: the synthesizer model combines the surviving answers

Configuration files are loaded from (in priority order):
1. ULTRA_* environment variables
2. --config <path>     Explicit config file
3. ./ultra.toml        Project-level config
4. ~/.config/ultra/config.toml   Global config

Example:
  ultra "Define entropy"
  ultra -m openai:gpt-4o -m anthropic:claude-sonnet-4-5 --pattern critique "Is P = NP?"
  echo '{"prompt":"Define entropy","models":["A","B"],"synthesizer":"A"}' | ultra --request -
"#)]
pub struct Cli {
    /// The prompt to send (not required with --request)
    pub prompt: Option<String>,

    /// Models to consult (can be specified multiple times)
    #[arg(short, long = "model", value_name = "MODEL")]
    pub models: Vec<String>,

    /// Model that writes the final synthesis
    #[arg(short, long, value_name = "MODEL")]
    pub synthesizer: Option<String>,

    /// Analysis pattern (gut, confidence, critique, fact_check, perspective, scenario)
    #[arg(short, long, value_name = "PATTERN")]
    pub pattern: Option<String>,

    /// Read a JSON request from FILE, or from stdin with "-"
    #[arg(long, value_name = "FILE")]
    pub request: Option<PathBuf>,

    /// Overall deadline for the whole request in milliseconds
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Skip the peer review stage
    #[arg(long)]
    pub no_peer_review: bool,

    /// Cache policy for this request
    #[arg(long, value_enum, value_name = "POLICY")]
    pub cache: Option<CacheArg>,

    /// Output format (default from config, else synthesis)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormatArg>,

    /// List registered models and exit
    #[arg(long)]
    pub list_models: bool,

    /// Show configuration sources and the merged configuration, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Also write logs to FILE
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Whether the request is read from stdin
    pub fn request_from_stdin(&self) -> bool {
        self.request.as_deref().is_some_and(|p| p.as_os_str() == "-")
    }

    /// Overlay command-line flags onto `base` (a `--request` body or an empty request)
    ///
    /// Flags win over the body; fields neither sets stay empty so that
    /// configured defaults can fill them later.
    pub fn apply_to(&self, mut base: InboundRequest) -> InboundRequest {
        if let Some(prompt) = &self.prompt {
            base.prompt = prompt.clone();
        }
        if !self.models.is_empty() {
            base.models = self.models.clone();
        }
        if let Some(synthesizer) = &self.synthesizer {
            base.synthesizer = synthesizer.clone();
        }
        if let Some(pattern) = &self.pattern {
            base.pattern = Some(pattern.clone());
        }

        if self.timeout_ms.is_some() || self.no_peer_review || self.cache.is_some() {
            let options = base.options.get_or_insert_with(InboundOptions::default);
            if let Some(ms) = self.timeout_ms {
                options.timeout_ms = Some(ms);
            }
            if self.no_peer_review {
                options.peer_review = Some(false);
            }
            if let Some(cache) = self.cache {
                options.cache_policy = Some(cache.as_str().to_string());
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ultra").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_flags_build_inbound_request() {
        let cli = parse(&[
            "-m",
            "openai:gpt-4o",
            "-m",
            "ollama:llama3",
            "--synthesizer",
            "ollama:llama3",
            "--pattern",
            "critique",
            "--timeout-ms",
            "5000",
            "--no-peer-review",
            "--cache",
            "bypass",
            "Define entropy",
        ]);
        let inbound = cli.apply_to(InboundRequest::default());
        assert_eq!(inbound.prompt, "Define entropy");
        assert_eq!(inbound.models, vec!["openai:gpt-4o", "ollama:llama3"]);
        assert_eq!(inbound.synthesizer, "ollama:llama3");
        assert_eq!(inbound.pattern.as_deref(), Some("critique"));

        let options = inbound.options.unwrap();
        assert_eq!(options.timeout_ms, Some(5000));
        assert_eq!(options.peer_review, Some(false));
        assert_eq!(options.cache_policy.as_deref(), Some("bypass"));
        assert_eq!(options.include_diagnostics, None);
    }

    #[test]
    fn test_flags_override_request_body() {
        let body = InboundRequest {
            prompt: "from file".into(),
            models: vec!["A".into(), "B".into()],
            synthesizer: "A".into(),
            pattern: Some("gut".into()),
            options: Some(InboundOptions {
                timeout_ms: Some(100),
                ..Default::default()
            }),
        };
        let cli = parse(&["--request", "req.json", "--synthesizer", "B"]);
        let merged = cli.apply_to(body);
        assert_eq!(merged.prompt, "from file");
        assert_eq!(merged.models, vec!["A", "B"]);
        assert_eq!(merged.synthesizer, "B");
        assert_eq!(merged.options.unwrap().timeout_ms, Some(100));
        assert!(!cli.request_from_stdin());
    }

    #[test]
    fn test_no_flags_leave_options_unset() {
        let cli = parse(&["hello"]);
        let inbound = cli.apply_to(InboundRequest::default());
        assert!(inbound.options.is_none());
        assert!(inbound.models.is_empty());
        assert_eq!(cli.output, None);
    }

    #[test]
    fn test_stdin_request_and_output_format() {
        let cli = parse(&["--request", "-", "-o", "json", "-vv"]);
        assert!(cli.request_from_stdin());
        assert_eq!(cli.output, Some(OutputFormatArg::Json));
        assert_eq!(OutputFormat::from(OutputFormatArg::Json), OutputFormat::Json);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_unknown_cache_policy_is_rejected() {
        let result = Cli::try_parse_from(["ultra", "--cache", "sometimes", "x"]);
        assert!(result.is_err());
    }
}
