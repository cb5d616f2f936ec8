//! CLI for the graph-query-orchestrator binary.
//!
//! One entry point: a natural-language query, an optional candidate count,
//! and a config file path. There is no server mode and no subcommand tree —
//! this is a one-shot pipeline run per invocation.

use clap::Parser;
use std::path::PathBuf;

/// Orchestrates natural-language queries over a professional-network
/// knowledge graph.
#[derive(Parser, Debug)]
#[command(
    name = "graph-query-orchestrator",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Plans, executes, and synthesizes answers to graph-query questions",
    after_help = "EXAMPLES:\n    \
                  graph-query-orchestrator \"Find Python developers at Google\"\n    \
                  graph-query-orchestrator --count 10 \"Tell me about John Smith\"\n    \
                  graph-query-orchestrator --config my-orchestrator.toml \"Find startup founders\""
)]
pub struct Cli {
    /// Natural-language query to run against the graph.
    pub user_query: String,

    /// Number of candidates to return (1-10, default 5).
    #[arg(short = 'n', long = "count")]
    pub desired_count: Option<usize>,

    /// Path to the configuration file.
    #[arg(short, long, default_value = "orchestrator.toml")]
    pub config: PathBuf,

    /// Enable verbose (debug-level) logging regardless of RUST_LOG.
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parse CLI arguments from the process environment.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
