//! `router` - routes a free-text request to a handler and prints the final answer
//!
//! Configuration is loaded once; a configuration failure aborts before any
//! request is processed. Answers go to stdout, logs to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use console::Style;
use futures::stream::{self, StreamExt};
use router_core::config::{resolve_config_dir, RouterConfig};
use router_core::{Pipeline, PipelineContext};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::output::OutputFormatter;

mod cli;
mod output;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!(
            "{} v{} ({}, {})",
            Style::new().blue().apply_to("router"),
            env!("CARGO_PKG_VERSION"),
            env!("ROUTER_BUILD_COMMIT"),
            env!("ROUTER_BUILD_PROFILE")
        );
        return Ok(());
    }

    init_tracing(cli.verbose);

    let config_dir = resolve_config_dir(cli.config_dir.as_deref());
    let config = RouterConfig::load(&config_dir)
        .with_context(|| format!("Failed to load configuration from {}", config_dir.display()))?;

    let formatter = OutputFormatter::new();

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    // Wiring validates endpoints and credentials, so `check` goes through it too
    let ctx = PipelineContext::from_config(config.clone(), cancel).context("Failed to initialise pipeline")?;
    let pipeline = Pipeline::new(ctx);

    match cli.command {
        Some(Commands::Route { query }) => {
            let route = pipeline.route(&query.join(" ")).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&route)?);
            } else {
                formatter.print_route(&route);
            }
        }

        Some(Commands::Batch { file, concurrency }) => {
            run_batch(&pipeline, &file, concurrency as usize).await?;
        }

        Some(Commands::Check) => {
            formatter.print_config_summary(&config);
        }

        None if !cli.query.is_empty() => {
            let outcome = pipeline.run(&cli.query.join(" ")).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                formatter.print_outcome(&outcome);
            }
        }

        None => {
            anyhow::bail!("No request given. Try `router \"오늘 테슬라 주가 확인해봐\"` or `router --help`.");
        }
    }

    Ok(())
}

/// `RUST_LOG` wins; otherwise `--verbose` means debug and the default is warn.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling in-flight work");
            cancel.cancel();
        }
    });
}

/// One request per non-empty line, bounded concurrency, JSON lines in input order.
async fn run_batch(pipeline: &Pipeline, file: &std::path::Path, concurrency: usize) -> Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let requests: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    tracing::info!(requests = requests.len(), concurrency, "starting batch");

    let mut results: Vec<_> = stream::iter(requests.into_iter().enumerate())
        .map(|(index, request)| {
            let pipeline = pipeline.clone();
            async move { (index, pipeline.run(&request).await) }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    results.sort_by_key(|(index, _)| *index);
    for (_, outcome) in results {
        println!("{}", serde_json::to_string(&outcome)?);
    }
    Ok(())
}
