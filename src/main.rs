use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use scatter::{Entity, Scatter, Settings, TimeRange, TraceKind, TraceRequest};
use scatter_adapters::http::HttpSource;

#[derive(Parser, Debug)]
#[command(name = "scatter")]
#[command(about = "Windowed latency and status-rate statistics for a service dependency graph")]
struct Cli {
    /// Path to a TOML settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the graph and trace data service
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Region to query
    #[arg(long, global = true)]
    region: Option<String>,

    /// Worker threads per aggregation
    #[arg(long, global = true, conflicts_with = "shared_pool")]
    threads: Option<usize>,

    /// Run aggregations on a shared pool of this many workers
    #[arg(long, global = true)]
    shared_pool: Option<usize>,

    /// Log filter, e.g. "debug" or "scatter_core=debug" (default: RUST_LOG or info)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the nodes and edges active in a time range
    Entities {
        #[command(flatten)]
        range: RangeArgs,
    },

    /// Per-window histogram and status rates for one node or edge
    Statistics {
        /// Entity JSON: {"name": .., "type": ..} or [left, right]
        #[arg(short, long)]
        entity: String,

        #[command(flatten)]
        range: RangeArgs,

        /// Window length in seconds
        #[arg(short, long, default_value = "60")]
        duration: i64,
    },

    /// Traces of one node or edge, by status or response time
    Traces {
        /// "status" or "responsetime"
        kind: String,

        /// Entity JSON: {"name": .., "type": ..} or [left, right]
        #[arg(short, long)]
        entity: String,

        #[command(flatten)]
        range: RangeArgs,

        /// Minimum response time in seconds
        #[arg(long)]
        min: Option<f64>,

        /// Maximum response time in seconds
        #[arg(long)]
        max: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct RangeArgs {
    /// Start of the range, seconds since the Unix epoch
    #[arg(short, long)]
    start: i64,

    /// End of the range, seconds since the Unix epoch
    #[arg(long)]
    end: i64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;

    let settings = load_settings(&cli)?;
    let scatter = Scatter::connect(&settings).context("failed to create service")?;

    let result = run(&scatter, cli.command, cli.pretty);
    scatter.shutdown()?;
    result
}

/// Log to stderr so stdout carries only the JSON document.
fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid log filter")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {}", e))
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;

    if let Some(endpoint) = &cli.endpoint {
        settings.endpoint = endpoint.clone();
    }
    if let Some(region) = &cli.region {
        settings.region = region.clone();
    }
    if let Some(threads) = cli.threads {
        settings.window_threads = threads;
        settings.shared_pool_size = None;
    }
    if let Some(size) = cli.shared_pool {
        settings.shared_pool_size = Some(size);
    }

    settings.validate()?;
    Ok(settings)
}

fn run(scatter: &Scatter<HttpSource>, command: Command, pretty: bool) -> Result<()> {
    let output = match command {
        Command::Entities { range } => {
            let document = scatter.entities(range.start, range.end)?;
            render(&document, pretty)?
        }
        Command::Statistics {
            entity,
            range,
            duration,
        } => {
            let entity = Entity::parse(&entity)?;
            let document = scatter.statistics(&entity, range.start, range.end, duration)?;
            render(&document, pretty)?
        }
        Command::Traces {
            kind,
            entity,
            range,
            min,
            max,
        } => {
            let kind: TraceKind = kind.parse()?;
            let request = TraceRequest::new(
                Entity::parse(&entity)?,
                kind,
                TimeRange::new(range.start, range.end),
            )
            .response_time(min, max);
            let document = scatter.traces(&request)?;
            render(&document, pretty)?
        }
    };

    println!("{}", output);
    Ok(())
}

fn render<T: Serialize>(document: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(document)?
    } else {
        serde_json::to_string(document)?
    };
    Ok(json)
}
