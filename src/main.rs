//! Trawl main entry point
//!
//! Command-line interface for the batch URL fetcher and redirection
//! resolver.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use trawl::config::{read_config_file, Config};
use trawl::output::{print_summary, FetchRecord, JsonlReport, ResolveRecord, RunStatistics};

/// Trawl: a batch URL fetcher and redirection resolver
///
/// Reads URLs (one per line) from a file or stdin and runs them through a
/// throttled, per-domain-fair worker pool.
#[derive(Parser, Debug)]
#[command(name = "trawl")]
#[command(version)]
#[command(about = "A batch URL fetcher and redirection resolver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Write a JSONL report of all outcomes to this path
    #[arg(short, long, global = true, value_name = "REPORT")]
    output: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every URL once and classify the responses
    Fetch {
        /// File with one URL per line; stdin when omitted
        #[arg(value_name = "URLS")]
        input: Option<PathBuf>,
    },

    /// Resolve every URL's redirect chain to its final target
    Resolve {
        /// File with one URL per line; stdin when omitted
        #[arg(value_name = "URLS")]
        input: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let config = match &cli.config {
        Some(path) => {
            let loaded = read_config_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!(
                "Loaded configuration from {} (sha256 {})",
                path.display(),
                loaded.fingerprint
            );
            loaded.config
        }
        None => Config::default(),
    };

    match &cli.command {
        Command::Fetch { input } => {
            let urls = read_urls(input.as_deref()).context("failed to read input URLs")?;
            tracing::info!("Fetching {} URLs with {} workers", urls.len(), config.engine.threads);
            run_fetch(urls, &config, cli.output.as_deref())?;
        }
        Command::Resolve { input } => {
            let urls = read_urls(input.as_deref()).context("failed to read input URLs")?;
            tracing::info!("Resolving {} URLs with {} workers", urls.len(), config.engine.threads);
            run_resolve(urls, &config, cli.output.as_deref())?;
        }
    }

    Ok(())
}

/// Installs the tracing subscriber
///
/// Each `-v` raises this crate's level one notch (info, debug, trace) on
/// top of a `warn` baseline for everything else; `-vvv` opens the firehose
/// and `-q` drops to errors only.
fn init_tracing(verbose: u8, quiet: bool) {
    const LEVELS: [&str; 3] = ["info", "debug", "trace"];

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match LEVELS.get(usize::from(verbose)) {
            Some(level) => {
                EnvFilter::new(format!("warn,{}={level}", env!("CARGO_PKG_NAME")))
            }
            None => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .with_target(false)
        .init();
}

/// Reads URLs, one per line, from a file or stdin
fn read_urls(input: Option<&Path>) -> std::io::Result<Vec<String>> {
    let lines: Vec<String> = match input {
        Some(path) => std::fs::read_to_string(path)?
            .lines()
            .map(str::to_string)
            .collect(),
        None => {
            let stdin = std::io::stdin();
            stdin.lock().lines().collect::<Result<_, _>>()?
        }
    };

    Ok(lines
        .into_iter()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect())
}

/// Runs the fetch policy over the URLs and reports results
fn run_fetch(
    urls: Vec<String>,
    config: &Config,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut report = report_path.map(JsonlReport::create).transpose()?;
    let mut stats = RunStatistics::new();

    let outcomes = trawl::fetch_urls(urls, config)?;
    for outcome in outcomes {
        match &outcome.result {
            Ok(doc) => {
                stats.record(&outcome.domain, Some(doc.response.status), None);
            }
            Err(err) => {
                tracing::debug!(url = %outcome.url, error = %err, "fetch failed");
                stats.record(&outcome.domain, None, Some(err.kind()));
            }
        }
        if let Some(report) = report.as_mut() {
            report.write_record(&FetchRecord::from_outcome(&outcome))?;
        }
    }

    stats.finish();
    if let Some(report) = report.as_mut() {
        report.flush()?;
    }
    print_summary(&stats);
    Ok(())
}

/// Runs the resolve policy over the URLs and reports results
fn run_resolve(
    urls: Vec<String>,
    config: &Config,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    let mut report = report_path.map(JsonlReport::create).transpose()?;
    let mut stats = RunStatistics::new();

    let outcomes = trawl::resolve_urls(urls, config)?;
    for outcome in outcomes {
        match &outcome.result {
            Ok(stack) => {
                stats.record(
                    &outcome.domain,
                    stack.last().map(|step| step.status),
                    None,
                );
            }
            Err(err) => {
                tracing::debug!(url = %outcome.url, error = %err, "resolve failed");
                stats.record(&outcome.domain, None, Some(err.kind()));
            }
        }
        if let Some(report) = report.as_mut() {
            report.write_record(&ResolveRecord::from_outcome(&outcome))?;
        }
    }

    stats.finish();
    if let Some(report) = report.as_mut() {
        report.flush()?;
    }
    print_summary(&stats);
    Ok(())
}
