//! CLI argument parsing using clap 4.x derive macros

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Route a free-text request to the right handler and print the final answer
///
/// Works with any OpenAI-compatible endpoint (Ollama, vLLM, LM Studio, OpenAI).
/// Configuration is read from `prompts.yaml`, `routing_rules.yaml` and an
/// optional `router.toml` in the config directory.
#[derive(Parser, Debug)]
#[command(name = "router")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(disable_version_flag = true)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Request text (alternative to a subcommand)
    #[arg(num_args = 1..)]
    pub query: Vec<String>,

    /// Configuration directory (overrides ROUTER_CONFIG_DIR)
    #[arg(short, long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Print version information
    #[arg(long)]
    pub version: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify and resolve the intent without running a handler
    Route {
        /// The request text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },

    /// Run every non-empty line of a file as its own request
    Batch {
        /// File with one request per line
        file: PathBuf,

        /// Requests in flight at once
        #[arg(short = 'n', long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
        concurrency: u16,
    },

    /// Load and validate configuration, then print a summary
    Check,
}
