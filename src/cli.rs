//! Command-line interface for the rewrite engine.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "refactory")]
#[command(about = "Rewrite small Python functions and verify the rewrites", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the rule catalog
    Rules,
    /// Apply one rule to a file holding a single function and print the result
    Apply {
        file: PathBuf,
        #[arg(short, long)]
        rule: usize,
    },
    /// Print structural features of a corpus function as JSON
    Inspect {
        #[arg(short, long)]
        function: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Run one transformation session for a corpus function
    Verify {
        #[arg(short, long)]
        function: String,
        #[arg(short, long)]
        rule: usize,
        /// Time accepted rewrites
        #[arg(long)]
        profile: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Greedily rewrite corpus functions with the first accepted rule
    Optimize {
        /// Only this function (default: every function in the corpus)
        #[arg(short, long)]
        function: Option<String>,
        #[arg(long)]
        profile: bool,
        #[command(flatten)]
        engine: EngineArgs,
    },
}

#[derive(Args)]
pub struct EngineArgs {
    /// Corpus JSON file (default: the built-in reference functions)
    #[arg(long)]
    pub corpus: Option<PathBuf>,
    /// Engine config JSON file
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Wall-clock limit per run, in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// Evaluation steps per run
    #[arg(long)]
    pub max_steps: Option<u64>,
}
