//! CLI entrypoint for Ultra
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use ultra_application::{NoProgress, RunUltraUseCase};
use ultra_domain::{InboundOptions, InboundRequest, OutputFormat};
use ultra_infrastructure::{Availability, ConfigLoader, ConfigValidationError, ProviderRegistry};
use ultra_presentation::{Cli, ConsoleFormatter, OutputFormatter, ProgressReporter};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = match init_logging(cli.verbose, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity level; `RUST_LOG` takes precedence
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("invalid log file path: {}", path.display()))?;
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .context("failed to initialize logging")?;

    Ok(guard)
}

async fn run(cli: Cli) -> Result<ExitCode> {
    info!("Starting Ultra");

    // === Configuration ===
    let file_config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_ref())
            .map_err(|e| anyhow!("failed to load configuration: {}", e))?
    };

    let issues = file_config.validate();
    for issue in issues.iter().filter(|i| !i.is_error()) {
        warn!("{}", issue.message);
    }
    if let Some(err) = ConfigValidationError::from_issues(&issues) {
        return Err(err.into());
    }

    if cli.no_color || !file_config.output.color {
        colored::control::set_override(false);
    }

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_ref());
        println!();
        println!("{}", file_config.to_display_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    // === Dependency Injection ===
    let registry = Arc::new(ProviderRegistry::from_config(
        &file_config.to_registry_config(),
    )?);

    if cli.list_models {
        print_models(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    let format: OutputFormat = cli
        .output
        .map(Into::into)
        .or(file_config.output.format)
        .unwrap_or_default();

    let inbound = build_request(&cli, format)?;
    let use_case = RunUltraUseCase::from_config(registry, &file_config.to_ultra_config());

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let show_progress = !cli.quiet && file_config.output.show_progress;
    let response = if show_progress {
        let progress = ProgressReporter::new();
        use_case.respond(inbound, &progress, &cancel).await
    } else {
        use_case.respond(inbound, &NoProgress, &cancel).await
    };

    print!("{}", ConsoleFormatter.render(&response, format));
    if format == OutputFormat::Json {
        println!();
    }

    Ok(if response.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// Assemble the inbound request from `--request` and the command-line flags
fn build_request(cli: &Cli, format: OutputFormat) -> Result<InboundRequest> {
    let base = match &cli.request {
        Some(path) => read_request(path, cli.request_from_stdin())?,
        None => InboundRequest::default(),
    };
    let mut inbound = cli.apply_to(base);

    if cli.request.is_none() && inbound.prompt.trim().is_empty() {
        bail!("A prompt is required. Pass it as an argument or use --request FILE.");
    }

    // The full view is built from diagnostics
    if format == OutputFormat::Full {
        inbound
            .options
            .get_or_insert_with(InboundOptions::default)
            .include_diagnostics
            .get_or_insert(true);
    }
    Ok(inbound)
}

fn read_request(path: &Path, from_stdin: bool) -> Result<InboundRequest> {
    let body = if from_stdin {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .context("failed to read request from stdin")?;
        body
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?
    };
    serde_json::from_str(&body).context("request is not valid JSON")
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling request");
            cancel.cancel();
        }
    });
}

fn print_models(registry: &ProviderRegistry) {
    let models = registry.models();
    if models.is_empty() {
        println!("No models registered. Add model names under [providers.<name>] in ultra.toml.");
        return;
    }
    println!("Registered models:");
    for model in models {
        let detail = match &model.availability {
            Availability::Unavailable(reason) => format!("unavailable: {}", reason),
            other => other.label().to_string(),
        };
        println!("  {:<40} {:<10} {}", model.model_id, model.provider, detail);
    }
}
