//! Flowgate CLI
//!
//! Loads a gateway configuration and exercises the routing engine against it:
//! validating the file, resolving flows for a sample request and sampling
//! endpoint selection.

mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use flowgate_config_file::{GatewayConfig, LogFormat, LoggingConfig};
use flowgate_core::HttpMethod;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "flowgate")]
#[command(about = "Flowgate - API gateway flow resolution and load balancing", long_about = None)]
struct Cli {
    /// Gateway configuration file (YAML, or TOML with a .toml extension)
    #[arg(long, global = true, env = "FLOWGATE_CONFIG", default_value = "~/.flowgate/gateway.yaml")]
    config: PathBuf,

    /// Log level or filter directive; overrides the configuration file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print collected Prometheus metrics after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate the configuration
    Validate,
    /// Resolve the flows a request would go through
    Resolve {
        #[arg(long)]
        api: String,

        /// Request path (HTTP mode)
        #[arg(long, conflicts_with = "channel", required_unless_present = "channel")]
        path: Option<String>,

        #[arg(long, requires = "path")]
        method: Option<HttpMethod>,

        /// Channel (message mode)
        #[arg(long)]
        channel: Option<String>,

        #[arg(long)]
        plan: Option<String>,

        /// Request header, as name=value
        #[arg(long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
    },
    /// Run endpoint selections and print the distribution
    Balance {
        #[arg(long)]
        api: String,

        /// Endpoint group or endpoint name; defaults to the first group
        #[arg(long)]
        group: Option<String>,

        #[arg(long, default_value = "100")]
        count: usize,
    },
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| format!("invalid header '{}', expected name=value", raw))
}

/// Text subscriber used until the configured one is installed
fn bootstrap_subscriber<W>(
    level: &str,
    writer: W,
) -> anyhow::Result<impl tracing::Subscriber + Send + Sync + 'static>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;
    Ok(FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .finish())
}

/// Load the configuration with logging already active
fn load_config(path: &Path, level_override: Option<&str>) -> anyhow::Result<GatewayConfig> {
    let bootstrap = bootstrap_subscriber(level_override.unwrap_or("info"), std::io::stderr)?;
    tracing::subscriber::with_default(bootstrap, || GatewayConfig::from_file(path))
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn init_logging(logging: &LoggingConfig, level_override: Option<&str>) -> anyhow::Result<()> {
    let level = level_override.unwrap_or(&logging.level);
    // RUST_LOG wins over both the flag and the file
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    match logging.format {
        LogFormat::Text => {
            let subscriber = FmtSubscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Json => {
            let subscriber = FmtSubscriber::builder()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config, cli.log_level.as_deref())?;
    config.merge_env();
    init_logging(&config.logging, cli.log_level.as_deref())?;

    let metrics = commands::metrics_if(cli.metrics)?;

    match cli.command {
        Commands::Validate => commands::validate(&config)?,
        Commands::Resolve {
            api,
            path,
            method,
            channel,
            plan,
            headers,
        } => {
            let request = commands::RequestSpec {
                path,
                method,
                channel,
                plan,
                headers,
            };
            commands::resolve(&config, &api, request, metrics.clone()).await?
        }
        Commands::Balance { api, group, count } => {
            commands::balance(&config, &api, group.as_deref(), count, metrics.clone())?
        }
    }

    if let Some(metrics) = metrics {
        print!("{}", metrics.gather_text()?);
    }

    Ok(())
}
